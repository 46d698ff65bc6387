//! USDA serialization.
//!
//! Output is a pure function of the stage: layer metadata in a fixed order,
//! then prims, properties and children in authored order.

use std::fmt::Write;

use super::stage::{Stage, StageMetadata};
use super::types::{AssetRef, Attribute, Prim, Property, Relationship, VariantSet};
use super::value::{write_f64, write_quoted};

const INDENT: &str = "    ";

/// Serialize a stage to USDA text.
pub fn write_stage(stage: &Stage) -> String {
    let mut writer = UsdaWriter::default();
    writer.layer_header(&stage.metadata);
    for prim in stage.root_prims() {
        writer.out.push('\n');
        writer.prim(prim, 0);
    }
    writer.out
}

#[derive(Default)]
struct UsdaWriter {
    out: String,
}

impl UsdaWriter {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn layer_header(&mut self, meta: &StageMetadata) {
        self.out.push_str("#usda 1.0\n");

        let mut entries: Vec<String> = Vec::new();
        if let Some(doc) = &meta.doc {
            entries.push(format!("doc = {}", quoted(doc)));
        }
        if let Some(prim) = &meta.default_prim {
            entries.push(format!("defaultPrim = {}", quoted(prim)));
        }
        if let Some(end) = meta.end_time_code {
            entries.push(format!("endTimeCode = {}", number(end)));
        }
        if let Some(mpu) = meta.meters_per_unit {
            entries.push(format!("metersPerUnit = {}", number(mpu)));
        }
        if let Some(path) = &meta.render_settings_prim_path {
            entries.push(format!("renderSettingsPrimPath = {}", quoted(path.as_str())));
        }
        if let Some(start) = meta.start_time_code {
            entries.push(format!("startTimeCode = {}", number(start)));
        }
        if let Some(tcps) = meta.time_codes_per_second {
            entries.push(format!("timeCodesPerSecond = {}", number(tcps)));
        }
        if let Some(axis) = meta.up_axis {
            entries.push(format!("upAxis = {}", quoted(axis.token())));
        }

        if entries.is_empty() {
            return;
        }
        self.out.push_str("(\n");
        for entry in &entries {
            self.line(1, entry);
        }
        self.out.push_str(")\n");
    }

    fn prim(&mut self, prim: &Prim, depth: usize) {
        let mut header = String::from(prim.specifier.keyword());
        if let Some(type_name) = &prim.type_name {
            header.push(' ');
            header.push_str(type_name);
        }
        header.push(' ');
        header.push_str(&quoted(&prim.name));

        let metadata = prim_metadata_lines(prim);
        if metadata.is_empty() {
            self.line(depth, &header);
        } else {
            header.push_str(" (");
            self.line(depth, &header);
            for entry in &metadata {
                self.line(depth + 1, entry);
            }
            self.line(depth, ")");
        }
        self.line(depth, "{");
        self.prim_body(prim, depth + 1);
        self.line(depth, "}");
    }

    /// Properties, children and variant sets of a prim (or variant).
    fn prim_body(&mut self, prim: &Prim, depth: usize) {
        for property in &prim.properties {
            match property {
                Property::Attribute(attr) => self.attribute(attr, depth),
                Property::Relationship(rel) => self.relationship(rel, depth),
            }
        }

        let mut need_gap = !prim.properties.is_empty();
        for child in &prim.children {
            if need_gap {
                self.out.push('\n');
            }
            self.prim(child, depth);
            need_gap = true;
        }

        for set in &prim.variant_sets {
            if need_gap {
                self.out.push('\n');
            }
            self.variant_set(set, depth);
            need_gap = true;
        }
    }

    fn attribute(&mut self, attr: &Attribute, depth: usize) {
        let decl = if attr.uniform {
            format!("uniform {} {}", attr.type_name, attr.name)
        } else {
            format!("{} {}", attr.type_name, attr.name)
        };

        let declared_by_other_line =
            !attr.connections.is_empty() || !attr.time_samples.is_empty();
        match &attr.default {
            Some(value) => self.line(depth, &format!("{} = {}", decl, value)),
            None if !declared_by_other_line => self.line(depth, &decl),
            None => {}
        }

        if !attr.connections.is_empty() {
            let targets: Vec<String> = attr.connections.iter().map(|t| t.to_string()).collect();
            self.line(depth, &format!("{}.connect = {}", decl, target_list(&targets)));
        }

        if !attr.time_samples.is_empty() {
            self.line(depth, &format!("{}.timeSamples = {{", decl));
            for (time, value) in &attr.time_samples {
                self.line(depth + 1, &format!("{}: {},", number(*time), value));
            }
            self.line(depth, "}");
        }
    }

    fn relationship(&mut self, rel: &Relationship, depth: usize) {
        if rel.targets.is_empty() {
            self.line(depth, &format!("rel {}", rel.name));
            return;
        }
        let targets: Vec<String> = rel.targets.iter().map(|t| t.to_string()).collect();
        self.line(depth, &format!("rel {} = {}", rel.name, target_list(&targets)));
    }

    fn variant_set(&mut self, set: &VariantSet, depth: usize) {
        self.line(depth, &format!("variantSet {} = {{", quoted(&set.name)));
        for variant in &set.variants {
            self.line(depth + 1, &format!("{} {{", quoted(&variant.name)));
            self.prim_body(&variant.contents, depth + 2);
            self.line(depth + 1, "}");
        }
        self.line(depth, "}");
    }
}

fn prim_metadata_lines(prim: &Prim) -> Vec<String> {
    let meta = &prim.metadata;
    let mut lines = Vec::new();

    if !meta.api_schemas.is_empty() {
        lines.push(format!("prepend apiSchemas = {}", string_list(&meta.api_schemas)));
    }
    if let Some(kind) = &meta.kind {
        lines.push(format!("kind = {}", quoted(kind)));
    }
    if let Some(payload) = &meta.payload {
        lines.push(format!("prepend payload = {}", asset_ref(payload)));
    }
    match meta.references.as_slice() {
        [] => {}
        [single] => lines.push(format!("prepend references = {}", asset_ref(single))),
        many => {
            let refs: Vec<String> = many.iter().map(asset_ref).collect();
            lines.push(format!("prepend references = [{}]", refs.join(", ")));
        }
    }
    if !meta.variant_selections.is_empty() {
        lines.push("variants = {".to_string());
        for (set, selection) in &meta.variant_selections {
            lines.push(format!("{}string {} = {}", INDENT, set, quoted(selection)));
        }
        lines.push("}".to_string());
    }
    match meta.variant_set_names.as_slice() {
        [] => {}
        [single] => lines.push(format!("prepend variantSets = {}", quoted(single))),
        many => lines.push(format!("prepend variantSets = {}", string_list(many))),
    }

    lines
}

fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    // Writing into a String never fails
    let _ = write_quoted(&mut out, s);
    out
}

fn number(v: f64) -> String {
    let mut out = String::new();
    let _ = write_f64(&mut out, v);
    out
}

fn string_list(items: &[String]) -> String {
    let parts: Vec<String> = items.iter().map(|s| quoted(s)).collect();
    format!("[{}]", parts.join(", "))
}

fn target_list(targets: &[String]) -> String {
    match targets {
        [single] => format!("<{}>", single),
        many => {
            let wrapped: Vec<String> = many.iter().map(|t| format!("<{}>", t)).collect();
            format!("[{}]", wrapped.join(", "))
        }
    }
}

fn asset_ref(arc: &AssetRef) -> String {
    let mut out = format!("@{}@", arc.asset_path);
    if let Some(prim) = &arc.prim_path {
        let _ = write!(out, "<{}>", prim);
    }
    out
}
