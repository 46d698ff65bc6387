//! Prim paths (`/World/Cameras/Camera`).
//!
//! Only absolute prim paths are supported. Each component must be a USD
//! identifier: an ASCII letter or underscore followed by letters, digits
//! or underscores.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when validating a path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path must be absolute: '{0}'")]
    NotAbsolute(String),

    #[error("Invalid prim name '{name}' in path '{path}'")]
    InvalidName { path: String, name: String },

    #[error("Invalid property name '{0}'")]
    InvalidProperty(String),
}

/// Check whether `name` is a valid USD identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An absolute path identifying a prim on a stage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimPath(String);

impl PrimPath {
    /// Parse and validate an absolute prim path.
    pub fn new(path: impl AsRef<str>) -> Result<Self, PathError> {
        let path = path.as_ref();
        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| PathError::NotAbsolute(path.to_string()))?;

        if rest.is_empty() {
            return Err(PathError::InvalidName {
                path: path.to_string(),
                name: String::new(),
            });
        }

        for name in rest.split('/') {
            if !is_valid_identifier(name) {
                return Err(PathError::InvalidName {
                    path: path.to_string(),
                    name: name.to_string(),
                });
            }
        }

        Ok(Self(path.to_string()))
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last component (the prim name).
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Path components from the root down.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    /// Number of components (1 for root prims).
    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Parent prim path, or `None` for a root prim.
    pub fn parent(&self) -> Option<PrimPath> {
        let idx = self.0.rfind('/')?;
        if idx == 0 {
            None
        } else {
            Some(Self(self.0[..idx].to_string()))
        }
    }

    /// Every ancestor from the root prim down, excluding `self`.
    pub fn ancestors(&self) -> Vec<PrimPath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            out.push(path);
        }
        out.reverse();
        out
    }

    /// Append a child component.
    pub fn child(&self, name: &str) -> Result<PrimPath, PathError> {
        if !is_valid_identifier(name) {
            return Err(PathError::InvalidName {
                path: self.0.clone(),
                name: name.to_string(),
            });
        }
        Ok(Self(format!("{}/{}", self.0, name)))
    }

    /// Whether `self` is `other` or lies below it.
    pub fn has_prefix(&self, other: &PrimPath) -> bool {
        self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0[other.0.len()..].starts_with('/'))
    }
}

impl fmt::Display for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PrimPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for PrimPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for PrimPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A relationship or connection target: a prim, optionally with a property.
///
/// Written as `</Materials/Red>` or `</Materials/Red/Shader.outputs:surface>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetPath {
    pub prim: PrimPath,
    pub property: Option<String>,
}

impl TargetPath {
    /// Target a prim.
    pub fn prim(prim: PrimPath) -> Self {
        Self { prim, property: None }
    }

    /// Target a property on a prim (e.g. `outputs:surface`).
    pub fn property(prim: PrimPath, property: &str) -> Result<Self, PathError> {
        let valid = !property.is_empty() && property.split(':').all(is_valid_identifier);
        if !valid {
            return Err(PathError::InvalidProperty(property.to_string()));
        }
        Ok(Self {
            prim,
            property: Some(property.to_string()),
        })
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(prop) => write!(f, "{}.{}", self.prim, prop),
            None => write!(f, "{}", self.prim),
        }
    }
}

impl From<PrimPath> for TargetPath {
    fn from(prim: PrimPath) -> Self {
        Self::prim(prim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_path() {
        let path = PrimPath::new("/World/Cameras/Camera").unwrap();
        assert_eq!(path.name(), "Camera");
        assert_eq!(path.depth(), 3);
        assert_eq!(path.parent().unwrap().as_str(), "/World/Cameras");
    }

    #[test]
    fn test_root_prim_has_no_parent() {
        let path = PrimPath::new("/World").unwrap();
        assert!(path.parent().is_none());
        assert!(path.ancestors().is_empty());
    }

    #[test]
    fn test_ancestors_order() {
        let path = PrimPath::new("/A/B/C").unwrap();
        let names: Vec<_> = path.ancestors().iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["/A", "/A/B"]);
    }

    #[test]
    fn test_invalid_paths() {
        assert!(matches!(PrimPath::new("World"), Err(PathError::NotAbsolute(_))));
        assert!(PrimPath::new("/").is_err());
        assert!(PrimPath::new("/World//Sphere").is_err());
        assert!(PrimPath::new("/World/1Sphere").is_err());
        assert!(PrimPath::new("/World/My Sphere").is_err());
    }

    #[test]
    fn test_has_prefix() {
        let world = PrimPath::new("/World").unwrap();
        let sphere = PrimPath::new("/World/Sphere").unwrap();
        let other = PrimPath::new("/WorldTwo").unwrap();

        assert!(sphere.has_prefix(&world));
        assert!(world.has_prefix(&world));
        assert!(!other.has_prefix(&world));
    }

    #[test]
    fn test_property_target() {
        let shader = PrimPath::new("/Materials/Red/Shader").unwrap();
        let target = TargetPath::property(shader.clone(), "outputs:surface").unwrap();
        assert_eq!(target.to_string(), "/Materials/Red/Shader.outputs:surface");
        assert!(TargetPath::property(shader, "outputs::x").is_err());
    }
}
