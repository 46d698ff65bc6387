//! The in-memory scene container.
//!
//! A `Stage` owns a single layer: layer metadata plus an ordered tree of
//! root prims. Prims are addressed by [`PrimPath`] and must be defined
//! before anything is authored on them.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use usdgen_math::DMat4;

use super::path::{PathError, PrimPath};
use super::types::{Prim, Specifier};
use super::writer::write_stage;

/// Errors that can occur while authoring a stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("Prim not found: {0}")]
    PrimNotFound(String),

    #[error("Prim {path} is a {found}, expected {expected}")]
    WrongPrimType {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    #[error("Attribute '{attribute}' has type {expected}, got {found}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("Property '{0}' already exists as a different kind of property")]
    PropertyKind(String),

    #[error("Uniform attribute '{0}' cannot have time samples")]
    UniformTimeSample(String),

    #[error("Default prim must be a root prim, got {0}")]
    InvalidDefaultPrim(String),

    #[error("Variant set '{set}' not found on {path}")]
    VariantSetNotFound { path: String, set: String },

    #[error("Variant '{variant}' not found in variant set '{set}'")]
    VariantNotFound { set: String, variant: String },

    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Stage up axis (`upAxis` layer metadata).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

impl UpAxis {
    /// Token written to the layer.
    pub fn token(self) -> &'static str {
        match self {
            UpAxis::Y => "Y",
            UpAxis::Z => "Z",
        }
    }
}

/// Layer-level metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageMetadata {
    pub doc: Option<String>,
    pub default_prim: Option<String>,
    pub up_axis: Option<UpAxis>,
    pub meters_per_unit: Option<f64>,
    pub render_settings_prim_path: Option<PrimPath>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub time_codes_per_second: Option<f64>,
}

/// A scene container holding one layer of prims.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stage {
    pub metadata: StageMetadata,
    root_prims: Vec<Prim>,
}

impl Stage {
    /// Create a new, empty stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Root prims in authored order.
    pub fn root_prims(&self) -> &[Prim] {
        &self.root_prims
    }

    /// Define a prim (and any missing ancestors) and return it.
    ///
    /// Missing ancestors are defined as typeless `def` prims. If the prim
    /// already exists it keeps its contents; a non-empty `type_name`
    /// replaces its type.
    pub fn define_prim(&mut self, path: &PrimPath, type_name: &str) -> StageResult<&mut Prim> {
        let depth = path.depth();
        let mut siblings = &mut self.root_prims;
        for name in path.components().take(depth - 1) {
            let idx = ensure_child(siblings, name);
            siblings = &mut siblings[idx].children;
        }

        let idx = ensure_child(siblings, path.name());
        let prim = &mut siblings[idx];
        prim.specifier = Specifier::Def;
        if !type_name.is_empty() {
            prim.type_name = Some(type_name.to_string());
        }

        log::debug!("Defined {} {}", if type_name.is_empty() { "prim" } else { type_name }, path);
        Ok(prim)
    }

    /// Look up a prim by path.
    pub fn prim(&self, path: &PrimPath) -> Option<&Prim> {
        let mut components = path.components();
        let first = components.next()?;
        let mut prim = self.root_prims.iter().find(|p| p.name == first)?;
        for name in components {
            prim = prim.child(name)?;
        }
        Some(prim)
    }

    /// Look up a prim for authoring; it must already be defined.
    pub fn prim_mut(&mut self, path: &PrimPath) -> StageResult<&mut Prim> {
        let not_found = || StageError::PrimNotFound(path.to_string());

        let mut components = path.components();
        let first = components.next().ok_or_else(not_found)?;
        let mut prim = self
            .root_prims
            .iter_mut()
            .find(|p| p.name == first)
            .ok_or_else(not_found)?;
        for name in components {
            prim = prim.child_mut(name).ok_or_else(not_found)?;
        }
        Ok(prim)
    }

    /// Look up a prim and check its schema type.
    pub fn typed_prim(&self, path: &PrimPath, type_name: &str) -> StageResult<&Prim> {
        let prim = self
            .prim(path)
            .ok_or_else(|| StageError::PrimNotFound(path.to_string()))?;
        match prim.type_name.as_deref() {
            Some(t) if t == type_name => Ok(prim),
            other => Err(StageError::WrongPrimType {
                path: path.to_string(),
                expected: type_name.to_string(),
                found: other.unwrap_or("typeless prim").to_string(),
            }),
        }
    }

    /// Whether a prim exists at `path`.
    pub fn has_prim(&self, path: &PrimPath) -> bool {
        self.prim(path).is_some()
    }

    /// Set the default prim; it must be an existing root prim.
    pub fn set_default_prim(&mut self, path: &PrimPath) -> StageResult<()> {
        if path.depth() != 1 {
            return Err(StageError::InvalidDefaultPrim(path.to_string()));
        }
        if !self.has_prim(path) {
            return Err(StageError::PrimNotFound(path.to_string()));
        }
        self.metadata.default_prim = Some(path.name().to_string());
        Ok(())
    }

    /// Widen the stage time range to include `start..=end`.
    pub fn extend_time_range(&mut self, start: f64, end: f64) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.metadata.start_time_code = Some(match self.metadata.start_time_code {
            Some(s) => s.min(start),
            None => start,
        });
        self.metadata.end_time_code = Some(match self.metadata.end_time_code {
            Some(e) => e.max(end),
            None => end,
        });
    }

    /// Every prim with its path, depth-first in authored order.
    pub fn traverse(&self) -> Vec<(PrimPath, &Prim)> {
        let mut out = Vec::new();
        for root in &self.root_prims {
            // Names were validated when the prim was defined
            if let Ok(path) = PrimPath::new(format!("/{}", root.name)) {
                collect_prims(root, path, &mut out);
            }
        }
        out
    }

    /// Total number of prims on the stage.
    pub fn prim_count(&self) -> usize {
        self.root_prims.iter().map(Prim::subtree_len).sum()
    }

    /// Local-to-world transform of a prim (ancestors applied outermost).
    pub fn local_to_world(&self, path: &PrimPath, time: Option<f64>) -> StageResult<DMat4> {
        let mut world = DMat4::IDENTITY;
        for ancestor in path.ancestors() {
            if let Some(prim) = self.prim(&ancestor) {
                world *= prim.local_transform(time);
            }
        }
        let prim = self
            .prim(path)
            .ok_or_else(|| StageError::PrimNotFound(path.to_string()))?;
        Ok(world * prim.local_transform(time))
    }

    /// Serialize the stage to USDA text.
    pub fn export_to_string(&self) -> String {
        write_stage(self)
    }

    /// Write the stage as USDA to `path`, creating parent directories.
    ///
    /// Data is written to a sibling temporary file and renamed over the
    /// target, so a failed export never leaves a partial file behind.
    pub fn export<P: AsRef<Path>>(&self, path: P) -> StageResult<()> {
        let path = path.as_ref();
        let io_err = |source| StageError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let text = self.export_to_string();
        let tmp_path = temp_path_for(path);
        let write_result = fs::File::create(&tmp_path)
            .and_then(|mut file| {
                file.write_all(text.as_bytes())?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&tmp_path, path));

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_err(e));
        }

        log::info!("Stage exported to {}", path.display());
        Ok(())
    }
}

/// Index of child `name` in `siblings`, appending a typeless prim if missing.
fn ensure_child(siblings: &mut Vec<Prim>, name: &str) -> usize {
    match siblings.iter().position(|p| p.name == name) {
        Some(idx) => idx,
        None => {
            siblings.push(Prim::new(name, Specifier::Def, None));
            siblings.len() - 1
        }
    }
}

fn collect_prims<'a>(prim: &'a Prim, path: PrimPath, out: &mut Vec<(PrimPath, &'a Prim)>) {
    let children: Vec<_> = prim
        .children
        .iter()
        .filter_map(|c| path.child(&c.name).ok().map(|p| (p, c)))
        .collect();
    out.push((path, prim));
    for (child_path, child) in children {
        collect_prims(child, child_path, out);
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
