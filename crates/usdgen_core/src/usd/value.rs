//! Typed attribute values and their USDA text representation.

use std::fmt::{self, Write};

use usdgen_math::{DMat4, DMat4Ext, DVec3};

/// A value that can be authored on an attribute.
///
/// Each variant maps to exactly one USD value type name.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    Token(String),
    String(String),
    Asset(String),
    Int2([i32; 2]),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Color3f([f32; 3]),
    Double3([f64; 3]),
    Matrix4d([[f64; 4]; 4]),
    IntArray(Vec<i32>),
    Point3fArray(Vec<[f32; 3]>),
    Float3Array(Vec<[f32; 3]>),
    TokenArray(Vec<String>),
}

impl Value {
    /// USD value type name used in the attribute declaration.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Token(_) => "token",
            Value::String(_) => "string",
            Value::Asset(_) => "asset",
            Value::Int2(_) => "int2",
            Value::Float2(_) => "float2",
            Value::Float3(_) => "float3",
            Value::Color3f(_) => "color3f",
            Value::Double3(_) => "double3",
            Value::Matrix4d(_) => "matrix4d",
            Value::IntArray(_) => "int[]",
            Value::Point3fArray(_) => "point3f[]",
            Value::Float3Array(_) => "float3[]",
            Value::TokenArray(_) => "token[]",
        }
    }

    /// Token value.
    pub fn token(value: impl Into<String>) -> Self {
        Value::Token(value.into())
    }

    /// Asset path value.
    pub fn asset(path: impl Into<String>) -> Self {
        Value::Asset(path.into())
    }

    /// Color value from RGB components in 0..1.
    pub fn color(rgb: [f32; 3]) -> Self {
        Value::Color3f(rgb)
    }

    /// Matrix value from a glam matrix.
    pub fn matrix(m: DMat4) -> Self {
        Value::Matrix4d(m.usd_rows())
    }

    /// Numeric value as f64 (scalars only).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Three-component value as a DVec3.
    pub fn as_dvec3(&self) -> Option<DVec3> {
        match self {
            Value::Float3(v) | Value::Color3f(v) => {
                Some(DVec3::new(v[0] as f64, v[1] as f64, v[2] as f64))
            }
            Value::Double3(v) => Some(DVec3::from(*v)),
            _ => None,
        }
    }

    /// Matrix value as a glam matrix.
    pub fn as_matrix(&self) -> Option<DMat4> {
        match self {
            Value::Matrix4d(rows) => Some(DMat4::from_usd_rows(*rows)),
            _ => None,
        }
    }

    /// String-like payload (token, string or asset).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Token(s) | Value::String(s) | Value::Asset(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<DVec3> for Value {
    fn from(v: DVec3) -> Self {
        Value::Double3(v.to_array())
    }
}

/// Write a float the way USDA does: shortest form, `inf`/`nan` spelled out.
pub fn write_f64(out: &mut impl Write, v: f64) -> fmt::Result {
    if v.is_nan() {
        out.write_str("nan")
    } else if v.is_infinite() {
        out.write_str(if v > 0.0 { "inf" } else { "-inf" })
    } else {
        write!(out, "{}", v)
    }
}

/// f32 variant of [`write_f64`]; keeps the f32 shortest representation.
pub fn write_f32(out: &mut impl Write, v: f32) -> fmt::Result {
    if v.is_nan() {
        out.write_str("nan")
    } else if v.is_infinite() {
        out.write_str(if v > 0.0 { "inf" } else { "-inf" })
    } else {
        write!(out, "{}", v)
    }
}

/// Write a double-quoted, escaped string.
pub fn write_quoted(out: &mut impl Write, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            _ => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

fn write_tuple<W: Write, T: Copy>(
    out: &mut W,
    items: &[T],
    mut each: impl FnMut(&mut W, T) -> fmt::Result,
) -> fmt::Result {
    out.write_char('(')?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        each(out, *item)?;
    }
    out.write_char(')')
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", if *v { 1 } else { 0 }),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write_f32(f, *v),
            Value::Double(v) => write_f64(f, *v),
            Value::Token(s) | Value::String(s) => write_quoted(f, s),
            Value::Asset(s) => write!(f, "@{}@", s),
            Value::Int2(v) => write_tuple(f, v, |out, x| write!(out, "{}", x)),
            Value::Float2(v) => write_tuple(f, v, |out, x| write_f32(out, x)),
            Value::Float3(v) | Value::Color3f(v) => write_tuple(f, v, |out, x| write_f32(out, x)),
            Value::Double3(v) => write_tuple(f, v, |out, x| write_f64(out, x)),
            Value::Matrix4d(rows) => {
                f.write_str("( ")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_tuple(f, row, |out, x| write_f64(out, x))?;
                }
                f.write_str(" )")
            }
            Value::IntArray(items) => {
                f.write_char('[')?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_char(']')
            }
            Value::Point3fArray(items) | Value::Float3Array(items) => {
                f.write_char('[')?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_tuple(f, v, |out, x| write_f32(out, x))?;
                }
                f.write_char(']')
            }
            Value::TokenArray(items) => {
                f.write_char('[')?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, v)?;
                }
                f.write_char(']')
            }
        }
    }
}
