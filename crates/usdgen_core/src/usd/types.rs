//! Scene description data model: prims, properties, xformOps, variants.
//!
//! These types hold authored opinions exactly as they will be written to
//! USDA. Nothing here performs composition.

use std::collections::BTreeMap;

use usdgen_math::{DMat4, DVec3, Vec3};

use super::path::{PrimPath, TargetPath};
use super::stage::{StageError, StageResult};
use super::value::Value;

/// How a prim spec is introduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Specifier {
    #[default]
    Def,
    Over,
    Class,
}

impl Specifier {
    /// Keyword used in USDA.
    pub fn keyword(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

/// An authored attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    /// Attribute name (may be namespaced, e.g. `inputs:intensity`)
    pub name: String,

    /// USD value type name (e.g. `float`, `color3f`, `token[]`)
    pub type_name: String,

    /// Uniform attributes cannot be animated
    pub uniform: bool,

    /// Default (non-time-varying) value
    pub default: Option<Value>,

    /// Time samples ordered by time code
    pub time_samples: Vec<(f64, Value)>,

    /// Connection sources (for shading outputs)
    pub connections: Vec<TargetPath>,
}

impl Attribute {
    /// Declare an attribute without a value.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            uniform: false,
            default: None,
            time_samples: Vec::new(),
            connections: Vec::new(),
        }
    }

    fn check_type(&self, value: &Value) -> StageResult<()> {
        if value.type_name() != self.type_name {
            return Err(StageError::TypeMismatch {
                attribute: self.name.clone(),
                expected: self.type_name.clone(),
                found: value.type_name().to_string(),
            });
        }
        Ok(())
    }

    /// Set the default value.
    pub fn set(&mut self, value: Value) -> StageResult<()> {
        self.check_type(&value)?;
        self.default = Some(value);
        Ok(())
    }

    /// Set a value at a time code, replacing any sample already at that time.
    pub fn set_at(&mut self, time: f64, value: Value) -> StageResult<()> {
        self.check_type(&value)?;
        if self.uniform {
            return Err(StageError::UniformTimeSample(self.name.clone()));
        }
        match self
            .time_samples
            .binary_search_by(|(t, _)| t.total_cmp(&time))
        {
            Ok(idx) => self.time_samples[idx].1 = value,
            Err(idx) => self.time_samples.insert(idx, (time, value)),
        }
        Ok(())
    }

    /// The default value, falling back to the earliest time sample.
    pub fn value(&self) -> Option<&Value> {
        self.default
            .as_ref()
            .or_else(|| self.time_samples.first().map(|(_, v)| v))
    }

    /// Held value at `time`: the latest sample at or before it, else the first.
    pub fn value_at(&self, time: f64) -> Option<&Value> {
        if self.time_samples.is_empty() {
            return self.default.as_ref();
        }
        self.time_samples
            .iter()
            .rev()
            .find(|(t, _)| *t <= time)
            .or_else(|| self.time_samples.first())
            .map(|(_, v)| v)
    }

    /// Whether the attribute has time samples.
    pub fn is_animated(&self) -> bool {
        !self.time_samples.is_empty()
    }
}

/// An authored relationship.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub targets: Vec<TargetPath>,
}

/// A prim property in authored order.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Attribute(Attribute),
    Relationship(Relationship),
}

impl Property {
    /// Property name.
    pub fn name(&self) -> &str {
        match self {
            Property::Attribute(a) => &a.name,
            Property::Relationship(r) => &r.name,
        }
    }
}

/// A reference or payload arc to an external layer.
/// Syntax: `@path/to/file.usda@</PrimPath>`
#[derive(Clone, Debug, PartialEq)]
pub struct AssetRef {
    /// Path to the external USD file (relative or absolute)
    pub asset_path: String,

    /// Optional prim path within the referenced file (e.g., "/Chair")
    pub prim_path: Option<PrimPath>,
}

impl AssetRef {
    /// Reference the default prim of `asset_path`.
    pub fn new(asset_path: impl Into<String>) -> Self {
        Self {
            asset_path: asset_path.into(),
            prim_path: None,
        }
    }
}

/// Prim-level metadata written in the parenthesised block after `def`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimMetadata {
    /// Applied API schemas (`prepend apiSchemas = [...]`)
    pub api_schemas: Vec<String>,

    /// Reference arcs (`prepend references = ...`)
    pub references: Vec<AssetRef>,

    /// Payload arc (`prepend payload = ...`)
    pub payload: Option<AssetRef>,

    /// Model kind (`kind = "component"`)
    pub kind: Option<String>,

    /// Variant set names (`prepend variantSets = [...]`)
    pub variant_set_names: Vec<String>,

    /// Variant selections (`variants = { string set = "name" }`)
    pub variant_selections: BTreeMap<String, String>,
}

impl PrimMetadata {
    /// Whether there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.api_schemas.is_empty()
            && self.references.is_empty()
            && self.payload.is_none()
            && self.kind.is_none()
            && self.variant_set_names.is_empty()
            && self.variant_selections.is_empty()
    }
}

/// A named variant: an opinion container applied when selected.
#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    pub name: String,

    /// Properties and child prims authored inside the variant
    pub contents: Prim,
}

/// A variant set on a prim.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantSet {
    pub name: String,
    pub variants: Vec<Variant>,
}

impl VariantSet {
    /// Look up a variant by name.
    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Mutable lookup by name.
    pub fn variant_mut(&mut self, name: &str) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| v.name == name)
    }
}

/// A prim spec and everything authored on it.
#[derive(Clone, Debug, PartialEq)]
pub struct Prim {
    /// Prim name (last component of its path)
    pub name: String,

    pub specifier: Specifier,

    /// Schema type (`Xform`, `Mesh`, `Camera`, ...); `None` for typeless prims
    pub type_name: Option<String>,

    pub metadata: PrimMetadata,

    /// Attributes and relationships in authored order
    pub properties: Vec<Property>,

    /// Child prims in authored order
    pub children: Vec<Prim>,

    pub variant_sets: Vec<VariantSet>,
}

impl Prim {
    /// Create an empty prim.
    pub fn new(name: impl Into<String>, specifier: Specifier, type_name: Option<&str>) -> Self {
        Self {
            name: name.into(),
            specifier,
            type_name: type_name.map(str::to_string),
            metadata: PrimMetadata::default(),
            properties: Vec::new(),
            children: Vec::new(),
            variant_sets: Vec::new(),
        }
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&Prim> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Find a direct child by name (mutable).
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Prim> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Get an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.properties.iter().find_map(|p| match p {
            Property::Attribute(a) if a.name == name => Some(a),
            _ => None,
        })
    }

    /// Get an attribute by name (mutable).
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.properties.iter_mut().find_map(|p| match p {
            Property::Attribute(a) if a.name == name => Some(a),
            _ => None,
        })
    }

    /// Get a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.properties.iter().find_map(|p| match p {
            Property::Relationship(r) if r.name == name => Some(r),
            _ => None,
        })
    }

    /// Declare an attribute, or return the existing one if the type matches.
    pub fn create_attribute(&mut self, name: &str, type_name: &str, uniform: bool) -> StageResult<&mut Attribute> {
        let idx = self.properties.iter().position(|p| p.name() == name);
        let idx = match idx {
            Some(idx) => idx,
            None => {
                let mut attr = Attribute::new(name, type_name);
                attr.uniform = uniform;
                self.properties.push(Property::Attribute(attr));
                self.properties.len() - 1
            }
        };

        if let Property::Attribute(attr) = &self.properties[idx] {
            if attr.type_name != type_name {
                return Err(StageError::TypeMismatch {
                    attribute: name.to_string(),
                    expected: attr.type_name.clone(),
                    found: type_name.to_string(),
                });
            }
        }

        match &mut self.properties[idx] {
            Property::Attribute(attr) => Ok(attr),
            Property::Relationship(_) => Err(StageError::PropertyKind(name.to_string())),
        }
    }

    /// Set an attribute's default value, declaring it with the value's type.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> StageResult<()> {
        let value = value.into();
        self.create_attribute(name, value.type_name(), false)?.set(value)
    }

    /// Set a uniform attribute's value.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<Value>) -> StageResult<()> {
        let value = value.into();
        self.create_attribute(name, value.type_name(), true)?.set(value)
    }

    /// Set an attribute value at a time code.
    pub fn set_at(&mut self, name: &str, time: f64, value: impl Into<Value>) -> StageResult<()> {
        let value = value.into();
        self.create_attribute(name, value.type_name(), false)?.set_at(time, value)
    }

    /// Author (or replace) a relationship's targets.
    pub fn set_relationship(&mut self, name: &str, targets: Vec<TargetPath>) -> StageResult<()> {
        match self.properties.iter_mut().find(|p| p.name() == name) {
            Some(Property::Relationship(rel)) => {
                rel.targets = targets;
                Ok(())
            }
            Some(Property::Attribute(_)) => Err(StageError::PropertyKind(name.to_string())),
            None => {
                self.properties.push(Property::Relationship(Relationship {
                    name: name.to_string(),
                    targets,
                }));
                Ok(())
            }
        }
    }

    /// Record an applied API schema (no duplicates).
    pub fn apply_api_schema(&mut self, schema: &str) {
        if !self.metadata.api_schemas.iter().any(|s| s == schema) {
            self.metadata.api_schemas.push(schema.to_string());
        }
    }

    /// The authored `xformOpOrder`.
    pub fn xform_op_order(&self) -> Vec<String> {
        match self.attribute("xformOpOrder").and_then(|a| a.value()) {
            Some(Value::TokenArray(order)) => order.clone(),
            _ => Vec::new(),
        }
    }

    fn push_xform_op_order(&mut self, op_name: &str) -> StageResult<()> {
        let mut order = self.xform_op_order();
        if !order.iter().any(|n| n == op_name) {
            order.push(op_name.to_string());
            self.set_uniform("xformOpOrder", Value::TokenArray(order))?;
        }
        Ok(())
    }

    /// Author an xformOp's default value and append it to `xformOpOrder`.
    pub fn add_xform_op(&mut self, op: XformOp) -> StageResult<()> {
        let name = op.attr_name();
        self.set(name, op.value())?;
        self.push_xform_op_order(name)
    }

    /// Author an xformOp value at a time code and append it to `xformOpOrder`.
    pub fn add_xform_op_sample(&mut self, op: XformOp, time: f64) -> StageResult<()> {
        let name = op.attr_name();
        self.set_at(name, time, op.value())?;
        self.push_xform_op_order(name)
    }

    /// Read the xformOps listed in `xformOpOrder` at a time code.
    ///
    /// Ops whose attribute is missing or has an unexpected type are skipped.
    pub fn xform_ops_at(&self, time: Option<f64>) -> Vec<XformOp> {
        self.xform_op_order()
            .iter()
            .filter_map(|name| {
                let attr = self.attribute(name)?;
                let value = match time {
                    Some(t) => attr.value_at(t),
                    None => attr.value(),
                }?;
                XformOp::from_attr(name, value)
            })
            .collect()
    }

    /// Local transform from the authored xformOps.
    pub fn local_transform(&self, time: Option<f64>) -> DMat4 {
        compose_xform_ops(&self.xform_ops_at(time))
    }

    /// Number of prims in this subtree (including `self`).
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Prim::subtree_len).sum::<usize>()
    }
}

/// Transform operation types authored as USD xformOps.
#[derive(Clone, Debug, PartialEq)]
pub enum XformOp {
    /// Translation (xformOp:translate, double3)
    Translate(DVec3),

    /// Rotation in degrees around X axis
    RotateX(f32),

    /// Rotation in degrees around Y axis
    RotateY(f32),

    /// Rotation in degrees around Z axis
    RotateZ(f32),

    /// Euler rotation XYZ in degrees
    RotateXYZ(Vec3),

    /// Scale (uniform or non-uniform)
    Scale(Vec3),

    /// Full 4x4 transform matrix
    Transform(DMat4),
}

impl XformOp {
    /// Attribute name of this op.
    pub fn attr_name(&self) -> &'static str {
        match self {
            XformOp::Translate(_) => "xformOp:translate",
            XformOp::RotateX(_) => "xformOp:rotateX",
            XformOp::RotateY(_) => "xformOp:rotateY",
            XformOp::RotateZ(_) => "xformOp:rotateZ",
            XformOp::RotateXYZ(_) => "xformOp:rotateXYZ",
            XformOp::Scale(_) => "xformOp:scale",
            XformOp::Transform(_) => "xformOp:transform",
        }
    }

    /// Value authored on the op attribute.
    pub fn value(&self) -> Value {
        match self {
            XformOp::Translate(t) => Value::from(*t),
            XformOp::RotateX(deg) | XformOp::RotateY(deg) | XformOp::RotateZ(deg) => Value::Float(*deg),
            XformOp::RotateXYZ(v) | XformOp::Scale(v) => Value::Float3(v.to_array()),
            XformOp::Transform(m) => Value::matrix(*m),
        }
    }

    /// Rebuild an op from its attribute name and value.
    pub fn from_attr(name: &str, value: &Value) -> Option<Self> {
        let op = match name {
            "xformOp:translate" => XformOp::Translate(value.as_dvec3()?),
            "xformOp:rotateX" => XformOp::RotateX(value.as_f64()? as f32),
            "xformOp:rotateY" => XformOp::RotateY(value.as_f64()? as f32),
            "xformOp:rotateZ" => XformOp::RotateZ(value.as_f64()? as f32),
            "xformOp:rotateXYZ" => XformOp::RotateXYZ(value.as_dvec3()?.as_vec3()),
            "xformOp:scale" => XformOp::Scale(value.as_dvec3()?.as_vec3()),
            "xformOp:transform" => XformOp::Transform(value.as_matrix()?),
            _ => return None,
        };
        Some(op)
    }

    /// Convert this operation to a transformation matrix.
    pub fn to_matrix(&self) -> DMat4 {
        match self {
            XformOp::Translate(t) => DMat4::from_translation(*t),
            XformOp::RotateX(deg) => DMat4::from_rotation_x((*deg as f64).to_radians()),
            XformOp::RotateY(deg) => DMat4::from_rotation_y((*deg as f64).to_radians()),
            XformOp::RotateZ(deg) => DMat4::from_rotation_z((*deg as f64).to_radians()),
            XformOp::RotateXYZ(euler) => {
                // rotateXYZ applies X first, then Y, then Z
                let e = euler.as_dvec3();
                DMat4::from_rotation_z(e.z.to_radians())
                    * DMat4::from_rotation_y(e.y.to_radians())
                    * DMat4::from_rotation_x(e.x.to_radians())
            }
            XformOp::Scale(s) => DMat4::from_scale(s.as_dvec3()),
            XformOp::Transform(m) => *m,
        }
    }
}

/// Combine a list of xformOps (in `xformOpOrder` order) into a single matrix.
pub fn compose_xform_ops(ops: &[XformOp]) -> DMat4 {
    let mut result = DMat4::IDENTITY;
    for op in ops {
        result *= op.to_matrix();
    }
    result
}
