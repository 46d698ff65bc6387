//! USDA (ASCII) file parser.
//!
//! Line-based reader that turns USDA text into a generic prim tree. It
//! understands the subset of the format written by this crate plus the
//! common hand-authored patterns:
//!
//! - layer header and metadata block
//! - `def`/`over`/`class` prims, with or without a type
//! - prim metadata (`apiSchemas`, `references`, `payload`, `kind`,
//!   `variantSets`, `variants`)
//! - attributes, including `uniform`, `.connect` and `.timeSamples`
//! - relationships, single target or list
//! - `variantSet` blocks
//! - values and arrays spanning several lines
//!
//! Values are kept as raw text and converted on demand with
//! [`parse_value`].

use std::collections::{BTreeMap, VecDeque};

use thiserror::Error;
use usdgen_math::DMat4;

use super::types::{compose_xform_ops, Specifier, XformOp};
use super::value::Value;

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Unclosed block starting at line {0}")]
    UnclosedBlock(usize),

    #[error("Unsupported value type: {0}")]
    UnsupportedType(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A reference or payload arc read from prim metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedArc {
    pub asset_path: String,
    pub prim_path: Option<String>,
}

/// An attribute as written in the file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedAttribute {
    pub name: String,
    pub type_name: String,
    pub uniform: bool,
    /// Raw default value text (`None` when only declared)
    pub default: Option<String>,
    /// Raw time sample values
    pub time_samples: Vec<(f64, String)>,
    pub connections: Vec<String>,
}

impl ParsedAttribute {
    /// Typed default value.
    pub fn value(&self) -> ParseResult<Option<Value>> {
        self.default
            .as_deref()
            .map(|raw| parse_value(&self.type_name, raw))
            .transpose()
    }

    /// Typed time samples.
    pub fn samples(&self) -> ParseResult<Vec<(f64, Value)>> {
        self.time_samples
            .iter()
            .map(|(t, raw)| Ok((*t, parse_value(&self.type_name, raw)?)))
            .collect()
    }
}

/// A relationship as written in the file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedRelationship {
    pub name: String,
    pub targets: Vec<String>,
}

/// A variant and the opinions inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedVariant {
    pub name: String,
    pub contents: ParsedPrim,
}

/// A variant set block.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedVariantSet {
    pub name: String,
    pub variants: Vec<ParsedVariant>,
}

/// A prim read from USDA.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedPrim {
    pub path: String,
    pub name: String,
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub api_schemas: Vec<String>,
    pub references: Vec<ParsedArc>,
    pub payloads: Vec<ParsedArc>,
    pub kind: Option<String>,
    pub variant_set_names: Vec<String>,
    pub variant_selections: BTreeMap<String, String>,
    /// Any other metadata, raw
    pub metadata: BTreeMap<String, String>,
    pub attributes: Vec<ParsedAttribute>,
    pub relationships: Vec<ParsedRelationship>,
    pub children: Vec<ParsedPrim>,
    pub variant_sets: Vec<ParsedVariantSet>,
}

impl ParsedPrim {
    fn new(path: String, name: &str, specifier: Specifier, type_name: Option<&str>) -> Self {
        Self {
            path,
            name: name.to_string(),
            specifier,
            type_name: type_name.map(str::to_string),
            api_schemas: Vec::new(),
            references: Vec::new(),
            payloads: Vec::new(),
            kind: None,
            variant_set_names: Vec::new(),
            variant_selections: BTreeMap::new(),
            metadata: BTreeMap::new(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            children: Vec::new(),
            variant_sets: Vec::new(),
        }
    }

    /// Whether the prim has the given schema type.
    pub fn is_a(&self, type_name: &str) -> bool {
        self.type_name.as_deref() == Some(type_name)
    }

    pub fn attribute(&self, name: &str) -> Option<&ParsedAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&ParsedRelationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Typed default value of an attribute, if authored.
    pub fn value(&self, name: &str) -> ParseResult<Option<Value>> {
        match self.attribute(name) {
            Some(attr) => attr.value(),
            None => Ok(None),
        }
    }

    /// Local transform composed from `xformOpOrder`.
    pub fn local_transform(&self) -> ParseResult<DMat4> {
        let order = match self.value("xformOpOrder")? {
            Some(Value::TokenArray(order)) => order,
            _ => return Ok(DMat4::IDENTITY),
        };

        let mut ops = Vec::with_capacity(order.len());
        for name in &order {
            let value = match self.attribute(name) {
                Some(attr) => match attr.value()? {
                    Some(v) => Some(v),
                    None => attr.samples()?.into_iter().next().map(|(_, v)| v),
                },
                None => None,
            };
            if let Some(op) = value.and_then(|v| XformOp::from_attr(name, &v)) {
                ops.push(op);
            }
        }
        Ok(compose_xform_ops(&ops))
    }

    fn attribute_entry(&mut self, name: &str, type_name: &str, uniform: bool) -> &mut ParsedAttribute {
        let idx = match self.attributes.iter().position(|a| a.name == name) {
            Some(idx) => idx,
            None => {
                self.attributes.push(ParsedAttribute {
                    name: name.to_string(),
                    type_name: type_name.to_string(),
                    uniform,
                    ..Default::default()
                });
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[idx]
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a ParsedPrim>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// A parsed layer: metadata plus root prims.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedLayer {
    /// Layer metadata, raw
    pub metadata: BTreeMap<String, String>,
    pub prims: Vec<ParsedPrim>,
}

impl ParsedLayer {
    pub fn default_prim(&self) -> Option<String> {
        self.metadata.get("defaultPrim").map(|v| unquote(v))
    }

    pub fn up_axis(&self) -> Option<String> {
        self.metadata.get("upAxis").map(|v| unquote(v))
    }

    pub fn meters_per_unit(&self) -> Option<f64> {
        self.metadata.get("metersPerUnit")?.trim().parse().ok()
    }

    /// `(startTimeCode, endTimeCode)` if both are authored.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let start = self.metadata.get("startTimeCode")?.trim().parse().ok()?;
        let end = self.metadata.get("endTimeCode")?.trim().parse().ok()?;
        Some((start, end))
    }

    /// Every prim, depth-first in file order.
    pub fn traverse(&self) -> Vec<&ParsedPrim> {
        let mut out = Vec::new();
        for prim in &self.prims {
            prim.collect(&mut out);
        }
        out
    }

    /// Look up a prim by absolute path.
    pub fn find(&self, path: &str) -> Option<&ParsedPrim> {
        let mut components = path.strip_prefix('/')?.split('/');
        let first = components.next()?;
        let mut prim = self.prims.iter().find(|p| p.name == first)?;
        for name in components {
            prim = prim.children.iter().find(|c| c.name == name)?;
        }
        Some(prim)
    }
}

/// Tracks nesting of `()`, `[]` and `{}` outside strings and asset paths.
#[derive(Default)]
struct Scanner {
    depth: i32,
    in_string: bool,
    in_asset: bool,
    escape: bool,
}

impl Scanner {
    /// Advance by one character; true if it closed the outermost group.
    fn step(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escape {
                self.escape = false;
            } else if c == '\\' {
                self.escape = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return false;
        }
        if self.in_asset {
            if c == '@' {
                self.in_asset = false;
            }
            return false;
        }
        match c {
            '"' => self.in_string = true,
            '@' => self.in_asset = true,
            '(' | '[' | '{' => self.depth += 1,
            ')' | ']' | '}' => {
                self.depth -= 1;
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }

    /// Feed a whole line; returns the byte offset just past the first
    /// character that closed the outermost group.
    fn feed(&mut self, line: &str) -> Option<usize> {
        let mut closed_at = None;
        for (i, c) in line.char_indices() {
            if self.step(c) && closed_at.is_none() {
                closed_at = Some(i + c.len_utf8());
            }
        }
        closed_at
    }

    fn is_balanced(&self) -> bool {
        self.depth <= 0 && !self.in_string && !self.in_asset
    }
}

/// USDA file parser.
pub struct UsdaParser {
    lines: VecDeque<(usize, String)>,
    current_line: usize,
}

impl UsdaParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> Self {
        let lines: VecDeque<_> = content
            .lines()
            .enumerate()
            .map(|(i, s)| (i + 1, s.to_string()))
            .collect();

        Self {
            lines,
            current_line: 0,
        }
    }

    /// Parse the whole layer.
    pub fn parse(&mut self) -> ParseResult<ParsedLayer> {
        let mut layer = ParsedLayer::default();
        self.parse_header(&mut layer)?;

        while let Some((line_num, line)) = self.next_significant() {
            let trimmed = line.trim();
            if !is_prim_header(trimmed) {
                return Err(ParseError::Parse {
                    line: line_num,
                    message: format!("Expected prim definition, found: {}", trimmed),
                });
            }
            let prim = self.parse_prim(trimmed, line_num, "")?;
            layer.prims.push(prim);
        }

        Ok(layer)
    }

    /// Pop the next line that is neither blank nor a comment.
    fn next_significant(&mut self) -> Option<(usize, String)> {
        while let Some((num, line)) = self.lines.pop_front() {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                self.current_line = num;
                return Some((num, line));
            }
        }
        None
    }

    fn parse_header(&mut self, layer: &mut ParsedLayer) -> ParseResult<()> {
        // Skip the `#usda 1.0` magic and leading comments
        while let Some((_, line)) = self.lines.front() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                self.lines.pop_front();
            } else {
                break;
            }
        }

        let starts_block = matches!(self.lines.front(), Some((_, l)) if l.trim().starts_with('('));
        if !starts_block {
            return Ok(());
        }

        let Some((line_num, line)) = self.next_significant() else {
            return Ok(());
        };
        let (block, rest) = self.read_group(line.trim().to_string(), line_num)?;
        if !rest.trim().is_empty() {
            return Err(ParseError::Parse {
                line: self.current_line,
                message: format!("Unexpected text after layer metadata: {}", rest.trim()),
            });
        }

        for entry in metadata_entries(strip_delimiters(&block)) {
            if let Some((key, value)) = entry.split_once('=') {
                layer
                    .metadata
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Ok(())
    }

    /// Read a bracketed group starting at `first`, which may span lines.
    ///
    /// Returns the group text (delimiters included) and whatever follows
    /// the closing delimiter on its line.
    fn read_group(&mut self, first: String, start_line: usize) -> ParseResult<(String, String)> {
        let mut scanner = Scanner::default();
        let mut text = String::new();
        let mut line = first;

        loop {
            if let Some(end) = scanner.feed(&line) {
                text.push_str(&line[..end]);
                return Ok((text, line[end..].to_string()));
            }
            text.push_str(&line);
            text.push('\n');

            line = match self.lines.pop_front() {
                Some((num, next)) => {
                    self.current_line = num;
                    next.trim().to_string()
                }
                None => return Err(ParseError::UnclosedBlock(start_line)),
            };
        }
    }

    /// Read a statement that may continue onto following lines while a
    /// group is open.
    fn read_statement(&mut self, first: String, start_line: usize) -> ParseResult<String> {
        let mut scanner = Scanner::default();
        scanner.feed(&first);
        let mut text = first;

        while !scanner.is_balanced() {
            let (num, line) = self
                .lines
                .pop_front()
                .ok_or(ParseError::UnclosedBlock(start_line))?;
            self.current_line = num;
            let trimmed = line.trim();
            scanner.feed(trimmed);
            text.push('\n');
            text.push_str(trimmed);
        }
        Ok(text)
    }

    /// Parse a prim starting at its `def Type "Name"` line.
    fn parse_prim(&mut self, header: &str, start_line: usize, parent_path: &str) -> ParseResult<ParsedPrim> {
        let (specifier, rest) = split_specifier(header).ok_or_else(|| ParseError::Parse {
            line: start_line,
            message: format!("Expected def, over or class: {}", header),
        })?;

        let quote_start = rest.find('"').ok_or_else(|| ParseError::Parse {
            line: start_line,
            message: format!("Expected quoted prim name: {}", header),
        })?;
        let type_name = rest[..quote_start].trim();
        let after_quote = &rest[quote_start + 1..];
        let quote_end = after_quote.find('"').ok_or_else(|| ParseError::Parse {
            line: start_line,
            message: format!("Unterminated prim name: {}", header),
        })?;
        let name = &after_quote[..quote_end];
        let remainder = after_quote[quote_end + 1..].trim().to_string();

        let path = format!("{}/{}", parent_path, name);
        let type_name = (!type_name.is_empty()).then_some(type_name);
        let mut prim = ParsedPrim::new(path, name, specifier, type_name);

        self.parse_opening(remainder, start_line, &mut prim)?;
        self.parse_body(&mut prim, start_line)?;
        Ok(prim)
    }

    /// Consume optional metadata and the opening brace of a prim or variant.
    fn parse_opening(&mut self, remainder: String, start_line: usize, prim: &mut ParsedPrim) -> ParseResult<()> {
        let mut rest = remainder;
        loop {
            if rest.is_empty() {
                rest = match self.next_significant() {
                    Some((_, line)) => line.trim().to_string(),
                    None => return Err(ParseError::UnclosedBlock(start_line)),
                };
            }

            if rest.starts_with('(') {
                let (block, after) = self.read_group(rest, start_line)?;
                parse_prim_metadata(strip_delimiters(&block), prim);
                rest = after.trim().to_string();
                continue;
            }

            if let Some(after) = rest.strip_prefix('{') {
                let after = after.trim();
                if !after.is_empty() {
                    self.lines.push_front((self.current_line, after.to_string()));
                }
                return Ok(());
            }

            return Err(ParseError::Parse {
                line: self.current_line,
                message: format!("Expected '{{' for {}", prim.path),
            });
        }
    }

    /// Parse properties, children and variant sets up to the closing brace.
    fn parse_body(&mut self, prim: &mut ParsedPrim, start_line: usize) -> ParseResult<()> {
        loop {
            let (line_num, line) = self
                .next_significant()
                .ok_or(ParseError::UnclosedBlock(start_line))?;

            let mut text = line.trim().to_string();
            if text == "}" {
                return Ok(());
            }

            // Single-line blocks: `{ double3 xformOp:translate = (0, 0, 0) }`
            if text.ends_with('}') && closes_enclosing_block(&text) {
                text.pop();
                self.lines.push_front((line_num, "}".to_string()));
                text = text.trim_end().to_string();
                if text.is_empty() {
                    continue;
                }
            }

            if is_prim_header(&text) {
                let child = self.parse_prim(&text, line_num, &prim.path)?;
                prim.children.push(child);
                continue;
            }

            if text.starts_with("variantSet ") {
                self.parse_variant_set(&text, line_num, prim)?;
                continue;
            }

            let statement = self.read_statement(text, line_num)?;
            parse_property(&statement, line_num, prim)?;
        }
    }

    /// Parse `variantSet "name" = { "a" { ... } ... }`.
    fn parse_variant_set(&mut self, header: &str, start_line: usize, prim: &mut ParsedPrim) -> ParseResult<()> {
        let name = first_quoted(header).ok_or_else(|| ParseError::Parse {
            line: start_line,
            message: format!("Expected variant set name: {}", header),
        })?;

        if !header.trim_end().ends_with('{') {
            match self.next_significant() {
                Some((_, line)) if line.trim() == "{" => {}
                Some((line, _)) => {
                    return Err(ParseError::Parse {
                        line,
                        message: format!("Expected '{{' for variant set {}", name),
                    })
                }
                None => return Err(ParseError::UnexpectedEof),
            }
        }

        let mut set = ParsedVariantSet {
            name,
            variants: Vec::new(),
        };

        loop {
            let (line_num, line) = self
                .next_significant()
                .ok_or(ParseError::UnclosedBlock(start_line))?;
            let trimmed = line.trim();
            if trimmed == "}" {
                break;
            }

            let variant_name = first_quoted(trimmed).ok_or_else(|| ParseError::Parse {
                line: line_num,
                message: format!("Expected variant name: {}", trimmed),
            })?;
            let remainder = after_first_quoted(trimmed).trim().to_string();

            let mut contents = ParsedPrim::new(prim.path.clone(), &variant_name, Specifier::Over, None);
            self.parse_opening(remainder, line_num, &mut contents)?;
            self.parse_body(&mut contents, line_num)?;
            set.variants.push(ParsedVariant {
                name: variant_name,
                contents,
            });
        }

        prim.variant_sets.push(set);
        Ok(())
    }
}

/// Parse a USDA string into a layer.
pub fn parse_usda(content: &str) -> ParseResult<ParsedLayer> {
    let mut parser = UsdaParser::new(content);
    parser.parse()
}

fn is_prim_header(line: &str) -> bool {
    split_specifier(line).is_some()
}

fn split_specifier(line: &str) -> Option<(Specifier, &str)> {
    if let Some(rest) = line.strip_prefix("def ") {
        Some((Specifier::Def, rest))
    } else if let Some(rest) = line.strip_prefix("over ") {
        Some((Specifier::Over, rest))
    } else {
        line.strip_prefix("class ").map(|rest| (Specifier::Class, rest))
    }
}

fn closes_enclosing_block(line: &str) -> bool {
    let mut scanner = Scanner::default();
    scanner.feed(line);
    scanner.depth < 0
}

/// Drop the outer delimiters of a group like `( ... )`.
fn strip_delimiters(group: &str) -> &str {
    let group = group.trim();
    let mut chars = group.chars();
    match (chars.next(), chars.next_back()) {
        (Some('(' | '[' | '{'), Some(')' | ']' | '}')) => &group[1..group.len() - 1],
        _ => group,
    }
}

/// Split metadata block contents into entries, one per line unless a
/// group continues onto following lines.
fn metadata_entries(inner: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut scanner = Scanner::default();

    for line in inner.lines() {
        let line = line.trim();
        if line.is_empty() && current.is_empty() {
            continue;
        }
        scanner.feed(line);
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
        if scanner.is_balanced() {
            entries.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        entries.push(current);
    }
    entries
}

fn strip_list_op(entry: &str) -> &str {
    let mut s = entry.trim();
    loop {
        let stripped = ["prepend ", "append ", "add ", "delete ", "reorder ", "custom "]
            .iter()
            .find_map(|p| s.strip_prefix(p));
        match stripped {
            Some(rest) => s = rest.trim_start(),
            None => return s,
        }
    }
}

fn parse_prim_metadata(inner: &str, prim: &mut ParsedPrim) {
    for entry in metadata_entries(inner) {
        let body = strip_list_op(&entry);
        let Some((key, value)) = body.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "apiSchemas" => prim.api_schemas.extend(parse_string_list(value)),
            "references" => prim.references.extend(parse_arcs(value)),
            "payload" => prim.payloads.extend(parse_arcs(value)),
            "kind" => prim.kind = Some(unquote(value)),
            "variantSets" => prim.variant_set_names.extend(parse_string_list(value)),
            "variants" => prim.variant_selections.extend(parse_variant_selections(value)),
            other => {
                prim.metadata.insert(other.to_string(), value.to_string());
            }
        }
    }
}

/// Split `name = value`, tolerating declarations without a value.
fn split_decl(rest: &str) -> (&str, Option<&str>) {
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '=' || c == '(')
        .unwrap_or(rest.len());
    let (name, after) = rest.split_at(end);
    match after.trim_start().strip_prefix('=') {
        Some(value) => (name, Some(value.trim())),
        None => (name, None),
    }
}

fn parse_property(statement: &str, line: usize, prim: &mut ParsedPrim) -> ParseResult<()> {
    let s = strip_list_op(statement);

    if let Some(rest) = s.strip_prefix("rel ") {
        let (name, value) = split_decl(rest);
        let targets = value.map(parse_targets).unwrap_or_default();
        match prim.relationships.iter_mut().find(|r| r.name == name) {
            Some(rel) => rel.targets = targets,
            None => prim.relationships.push(ParsedRelationship {
                name: name.to_string(),
                targets,
            }),
        }
        return Ok(());
    }

    let (uniform, s) = match s.strip_prefix("uniform ") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };

    let (type_name, rest) = s
        .split_once(char::is_whitespace)
        .ok_or_else(|| ParseError::Parse {
            line,
            message: format!("Expected attribute type and name: {}", statement),
        })?;
    let (decl_name, value) = split_decl(rest);
    if decl_name.is_empty() {
        return Err(ParseError::Parse {
            line,
            message: format!("Missing attribute name: {}", statement),
        });
    }

    let (name, suffix) = match decl_name.rsplit_once('.') {
        Some((name, suffix @ ("connect" | "timeSamples"))) => (name, Some(suffix)),
        _ => (decl_name, None),
    };

    let attr = prim.attribute_entry(name, type_name, uniform);
    match suffix {
        Some("connect") => attr.connections = value.map(parse_targets).unwrap_or_default(),
        Some(_) => attr.time_samples = parse_time_samples(value.unwrap_or(""), line)?,
        None => {
            attr.default = value
                .map(|v| first_value(v).to_string())
                .filter(|v| v != "None");
        }
    }
    Ok(())
}

/// The first complete value in `raw`, ignoring trailing attribute metadata.
fn first_value(raw: &str) -> &str {
    let raw = raw.trim();
    let mut scanner = Scanner::default();
    for (i, c) in raw.char_indices() {
        if c.is_whitespace() && scanner.is_balanced() {
            return &raw[..i];
        }
        scanner.step(c);
    }
    raw
}

/// Split `s` at top-level occurrences of `sep`.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut scanner = Scanner::default();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == sep && scanner.is_balanced() {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
            continue;
        }
        scanner.step(c);
    }
    parts.push(&s[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

fn parse_time_samples(raw: &str, line: usize) -> ParseResult<Vec<(f64, String)>> {
    let inner = strip_delimiters(raw);
    let mut samples = Vec::new();
    for entry in split_top_level(inner, ',') {
        let (time, value) = entry.split_once(':').ok_or_else(|| ParseError::Parse {
            line,
            message: format!("Invalid time sample: {}", entry),
        })?;
        let time = parse_f64(time)?;
        samples.push((time, first_value(value).to_string()));
    }
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(samples)
}

/// Extract paths between `<` and `>`.
fn parse_targets(raw: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '<' {
            let path: String = chars.by_ref().take_while(|&pc| pc != '>').collect();
            if !path.is_empty() {
                result.push(path);
            }
        }
    }
    result
}

/// Extract `@asset@` arcs with their optional `</Prim>` target.
fn parse_arcs(raw: &str) -> Vec<ParsedArc> {
    let mut arcs = Vec::new();
    let mut rest = raw;
    while let Some(start) = rest.find('@') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('@') else {
            break;
        };
        let asset_path = after[..end].to_string();
        rest = &after[end + 1..];

        let prim_path = match rest.strip_prefix('<') {
            Some(target) => {
                let close = target.find('>').unwrap_or(target.len());
                let path = target[..close].to_string();
                rest = target.get(close + 1..).unwrap_or("");
                Some(path)
            }
            None => None,
        };
        arcs.push(ParsedArc {
            asset_path,
            prim_path,
        });
    }
    arcs
}

fn parse_variant_selections(raw: &str) -> Vec<(String, String)> {
    let inner = strip_delimiters(raw);
    inner
        .lines()
        .flat_map(|line| line.split(';'))
        .filter_map(|entry| {
            let entry = entry.trim();
            let entry = entry.strip_prefix("string ").unwrap_or(entry);
            let (set, selection) = entry.split_once('=')?;
            Some((set.trim().to_string(), unquote(selection)))
        })
        .collect()
}

fn first_quoted(s: &str) -> Option<String> {
    parse_string_list(s).into_iter().next()
}

fn after_first_quoted(s: &str) -> &str {
    let mut quotes = s.match_indices('"').map(|(i, _)| i);
    match (quotes.next(), quotes.next()) {
        (Some(_), Some(end)) => &s[end + 1..],
        _ => "",
    }
}

/// Collect every double-quoted string in `raw`.
pub fn parse_string_list(raw: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '"' {
            continue;
        }
        let mut s = String::new();
        while let Some(sc) = chars.next() {
            match sc {
                '"' => break,
                '\\' => match chars.next() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(other) => s.push(other),
                    None => break,
                },
                _ => s.push(sc),
            }
        }
        result.push(s);
    }
    result
}

/// Remove surrounding quotes (single or triple) and process escapes.
pub fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(inner) = raw
        .strip_prefix("\"\"\"")
        .and_then(|r| r.strip_suffix("\"\"\""))
    {
        return inner.to_string();
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return parse_string_list(raw).into_iter().next().unwrap_or_default();
    }
    raw.to_string()
}

fn parse_f64(s: &str) -> ParseResult<f64> {
    let s = s.trim();
    s.parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber(s.to_string()))
}

fn parse_i32(s: &str) -> ParseResult<i32> {
    let s = s.trim();
    s.parse::<i32>()
        .map_err(|_| ParseError::InvalidNumber(s.to_string()))
}

/// Parse `(a, b, c)` into its components.
fn parse_tuple(raw: &str) -> ParseResult<Vec<f64>> {
    split_top_level(strip_delimiters(raw), ',')
        .into_iter()
        .map(parse_f64)
        .collect()
}

fn parse_fixed<const N: usize>(raw: &str) -> ParseResult<[f64; N]> {
    let parts = parse_tuple(raw)?;
    parts.try_into().map_err(|parts: Vec<f64>| ParseError::Parse {
        line: 0,
        message: format!("Expected {} components, got {}", N, parts.len()),
    })
}

fn to_f32<const N: usize>(v: [f64; N]) -> [f32; N] {
    v.map(|x| x as f32)
}

/// Convert raw value text to a typed [`Value`].
pub fn parse_value(type_name: &str, raw: &str) -> ParseResult<Value> {
    let raw = raw.trim();
    let value = match type_name {
        "bool" => Value::Bool(matches!(raw, "1" | "true")),
        "int" => Value::Int(parse_i32(raw)?),
        "float" | "half" => Value::Float(parse_f64(raw)? as f32),
        "double" => Value::Double(parse_f64(raw)?),
        "token" => Value::Token(unquote(raw)),
        "string" => Value::String(unquote(raw)),
        "asset" => Value::Asset(raw.trim_matches('@').to_string()),
        "int2" => {
            let [a, b] = parse_fixed::<2>(raw)?;
            Value::Int2([a as i32, b as i32])
        }
        "float2" => Value::Float2(to_f32(parse_fixed::<2>(raw)?)),
        "float3" | "point3f" | "vector3f" | "normal3f" => Value::Float3(to_f32(parse_fixed::<3>(raw)?)),
        "color3f" => Value::Color3f(to_f32(parse_fixed::<3>(raw)?)),
        "double3" => Value::Double3(parse_fixed::<3>(raw)?),
        "matrix4d" => {
            let rows = split_top_level(strip_delimiters(raw), ',');
            if rows.len() != 4 {
                return Err(ParseError::Parse {
                    line: 0,
                    message: format!("Expected 4 matrix rows, got {}", rows.len()),
                });
            }
            let mut m = [[0.0; 4]; 4];
            for (row, text) in m.iter_mut().zip(rows) {
                *row = parse_fixed::<4>(text)?;
            }
            Value::Matrix4d(m)
        }
        "int[]" => Value::IntArray(
            split_top_level(strip_delimiters(raw), ',')
                .into_iter()
                .map(parse_i32)
                .collect::<ParseResult<_>>()?,
        ),
        "point3f[]" | "float3[]" | "normal3f[]" | "vector3f[]" | "color3f[]" => {
            let items = split_top_level(strip_delimiters(raw), ',')
                .into_iter()
                .map(|t| parse_fixed::<3>(t).map(to_f32))
                .collect::<ParseResult<Vec<_>>>()?;
            if type_name == "point3f[]" {
                Value::Point3fArray(items)
            } else {
                Value::Float3Array(items)
            }
        }
        "token[]" => Value::TokenArray(parse_string_list(raw)),
        other => return Err(ParseError::UnsupportedType(other.to_string())),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use usdgen_math::DVec3;

    #[test]
    fn test_parse_simple_mesh() {
        let usda = r#"
def Mesh "Cube" {
    point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]
    int[] faceVertexCounts = [4]
    int[] faceVertexIndices = [0, 1, 2, 3]
}
"#;

        let layer = parse_usda(usda).unwrap();
        assert_eq!(layer.prims.len(), 1);

        let mesh = &layer.prims[0];
        assert!(mesh.is_a("Mesh"));
        assert_eq!(mesh.name, "Cube");
        match mesh.value("points").unwrap() {
            Some(Value::Point3fArray(points)) => assert_eq!(points.len(), 4),
            other => panic!("Expected points, got {:?}", other),
        }
        assert_eq!(
            mesh.value("faceVertexIndices").unwrap(),
            Some(Value::IntArray(vec![0, 1, 2, 3]))
        );
    }

    #[test]
    fn test_parse_xform_with_ops() {
        let usda = r#"
def Xform "Model" {
    double3 xformOp:translate = (1, 2, 3)
    float3 xformOp:scale = (2, 2, 2)
    uniform token[] xformOpOrder = ["xformOp:translate", "xformOp:scale"]
}
"#;

        let layer = parse_usda(usda).unwrap();
        let model = &layer.prims[0];
        let m = model.local_transform().unwrap();
        let translated = m.transform_point3(DVec3::ZERO);
        assert!((translated - DVec3::new(1.0, 2.0, 3.0)).length() < 0.001);
        assert!(model.attribute("xformOpOrder").unwrap().uniform);
    }

    #[test]
    fn test_parse_layer_metadata() {
        let usda = r#"#usda 1.0
(
    defaultPrim = "World"
    metersPerUnit = 0.01
    upAxis = "Y"
)

def Xform "World"
{
}
"#;
        let layer = parse_usda(usda).unwrap();
        assert_eq!(layer.default_prim().as_deref(), Some("World"));
        assert_eq!(layer.up_axis().as_deref(), Some("Y"));
        assert_eq!(layer.meters_per_unit(), Some(0.01));
        assert!(layer.prims[0].is_a("Xform"));
    }

    #[test]
    fn test_parse_multiline_metadata_and_arrays() {
        let usda = r#"#usda 1.0
def Xform "World"
{
    def Mesh "Ground" (
        prepend apiSchemas = ["MaterialBindingAPI"]
    )
    {
        int[] faceVertexIndices = [
            0, 1, 2,
            0, 2, 3
        ]
        rel material:binding = </Materials/Wood>
    }
}
"#;
        let layer = parse_usda(usda).unwrap();
        let ground = layer.find("/World/Ground").unwrap();
        assert_eq!(ground.api_schemas, vec!["MaterialBindingAPI"]);
        assert_eq!(
            ground.value("faceVertexIndices").unwrap(),
            Some(Value::IntArray(vec![0, 1, 2, 0, 2, 3]))
        );
        assert_eq!(
            ground.relationship("material:binding").unwrap().targets,
            vec!["/Materials/Wood"]
        );
    }

    #[test]
    fn test_parse_inline_reference() {
        let usda = r#"
def Xform "Lucy_0_0" (references = @./lucy_low.usda@</Lucy>) { double3 xformOp:translate = (0, 0, 5) }
"#;
        let layer = parse_usda(usda).unwrap();
        let lucy = &layer.prims[0];
        assert_eq!(lucy.references.len(), 1);
        assert_eq!(lucy.references[0].asset_path, "./lucy_low.usda");
        assert_eq!(lucy.references[0].prim_path.as_deref(), Some("/Lucy"));
        assert_eq!(
            lucy.value("xformOp:translate").unwrap(),
            Some(Value::Double3([0.0, 0.0, 5.0]))
        );
    }

    #[test]
    fn test_parse_connections_and_time_samples() {
        let usda = r#"
def Material "Red"
{
    token outputs:surface.connect = </Materials/Red/Shader.outputs:surface>

    def Camera "Cam"
    {
        float xformOp:rotateY.timeSamples = {
            0: 0,
            10: 90.5,
        }
    }
}
"#;
        let layer = parse_usda(usda).unwrap();
        let red = &layer.prims[0];
        let surface = red.attribute("outputs:surface").unwrap();
        assert_eq!(surface.connections, vec!["/Materials/Red/Shader.outputs:surface"]);
        assert!(surface.default.is_none());

        let cam = layer.find("/Red/Cam").unwrap();
        let samples = cam.attribute("xformOp:rotateY").unwrap().samples().unwrap();
        assert_eq!(samples, vec![(0.0, Value::Float(0.0)), (10.0, Value::Float(90.5))]);
    }

    #[test]
    fn test_parse_variant_sets() {
        let usda = r#"
def Xform "Asset" (
    variants = {
        string shading = "red"
    }
    prepend variantSets = "shading"
)
{
    variantSet "shading" = {
        "blue" {
            color3f inputs:diffuseColor = (0, 0, 1)
        }
        "red" {
            color3f inputs:diffuseColor = (1, 0, 0)
        }
    }
}
"#;
        let layer = parse_usda(usda).unwrap();
        let asset = &layer.prims[0];
        assert_eq!(asset.variant_set_names, vec!["shading"]);
        assert_eq!(asset.variant_selections.get("shading").map(String::as_str), Some("red"));

        let set = &asset.variant_sets[0];
        assert_eq!(set.variants.len(), 2);
        assert_eq!(
            set.variants[0].contents.value("inputs:diffuseColor").unwrap(),
            Some(Value::Color3f([0.0, 0.0, 1.0]))
        );
    }

    #[test]
    fn test_attribute_metadata_is_ignored() {
        let usda = r#"
def Mesh "M" {
    normal3f[] normals = [(0, 1, 0)] (
        interpolation = "constant"
    )
    float radius = 2 (doc = "x")
}
"#;
        let layer = parse_usda(usda).unwrap();
        let mesh = &layer.prims[0];
        assert_eq!(mesh.attribute("normals").unwrap().default.as_deref(), Some("[(0, 1, 0)]"));
        assert_eq!(mesh.value("radius").unwrap(), Some(Value::Float(2.0)));
    }

    #[test]
    fn test_parse_matrix() {
        let value = parse_value(
            "matrix4d",
            "( (1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (1, 2, 3, 1) )",
        )
        .unwrap();
        let m = value.as_matrix().unwrap();
        assert!((m.transform_point3(DVec3::ZERO) - DVec3::new(1.0, 2.0, 3.0)).length() < 1e-9);
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let usda = "def Xform \"World\"\n{\n    def Sphere \"S\"\n    {\n";
        assert!(matches!(parse_usda(usda), Err(ParseError::UnclosedBlock(_))));
    }

    #[test]
    fn test_invalid_number() {
        assert!(matches!(
            parse_value("double", "abc"),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_value("dictionary", "{}"),
            Err(ParseError::UnsupportedType(_))
        ));
    }
}
