//! Read a USDA file back and summarise what it contains.
//!
//! Used to verify generated scenes: prim counts by category, world-space
//! positions of cameras and lights, every external asset path.

use std::path::Path;

use serde::Serialize;
use usdgen_math::{DMat4, DVec3};

use super::parser::{parse_usda, ParseResult, ParsedLayer, ParsedPrim};
use super::value::Value;

/// Geometry schema types counted as renderable geometry.
pub const GEOMETRY_TYPES: &[&str] = &[
    "Mesh",
    "Sphere",
    "Cube",
    "Cylinder",
    "Cone",
    "Capsule",
    "Plane",
    "Points",
    "BasisCurves",
];

/// UsdLux light types.
pub const LIGHT_TYPES: &[&str] = &[
    "DomeLight",
    "RectLight",
    "SphereLight",
    "DiskLight",
    "DistantLight",
    "CylinderLight",
];

/// One prim in a summary, with its world-space origin.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrimInfo {
    pub path: String,
    pub type_name: String,
    pub position: [f64; 3],
}

/// Contents of a USDA layer by category.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StageSummary {
    pub default_prim: Option<String>,
    pub up_axis: Option<String>,
    pub meters_per_unit: Option<f64>,
    pub time_range: Option<(f64, f64)>,
    pub prim_count: usize,
    pub cameras: Vec<PrimInfo>,
    pub lights: Vec<PrimInfo>,
    pub geometry: Vec<PrimInfo>,
    pub materials: Vec<String>,
    /// Prims carrying a reference or payload arc
    pub external_assets: Vec<PrimInfo>,
    pub render_settings: Vec<String>,
    /// Every asset path: asset-valued attributes plus arcs
    pub asset_paths: Vec<String>,
    pub triangle_count: usize,
}

impl StageSummary {
    /// Summarise a parsed layer.
    pub fn from_layer(layer: &ParsedLayer) -> ParseResult<Self> {
        let mut summary = StageSummary {
            default_prim: layer.default_prim(),
            up_axis: layer.up_axis(),
            meters_per_unit: layer.meters_per_unit(),
            time_range: layer.time_range(),
            ..Default::default()
        };

        for prim in &layer.prims {
            summary.process_prim(prim, DMat4::IDENTITY)?;
        }
        Ok(summary)
    }

    /// Number of dome (environment) lights.
    pub fn dome_light_count(&self) -> usize {
        self.lights.iter().filter(|l| l.type_name == "DomeLight").count()
    }

    /// Look up a camera by path.
    pub fn camera(&self, path: &str) -> Option<&PrimInfo> {
        self.cameras.iter().find(|c| c.path == path)
    }

    /// Process a prim recursively with its parent's world transform.
    fn process_prim(&mut self, prim: &ParsedPrim, parent_transform: DMat4) -> ParseResult<()> {
        let world_transform = parent_transform * prim.local_transform()?;
        self.prim_count += 1;

        let type_name = prim.type_name.as_deref().unwrap_or("");
        let info = || PrimInfo {
            path: prim.path.clone(),
            type_name: type_name.to_string(),
            position: world_transform.transform_point3(DVec3::ZERO).to_array(),
        };

        if type_name == "Camera" {
            self.cameras.push(info());
        } else if LIGHT_TYPES.contains(&type_name) {
            self.lights.push(info());
        } else if GEOMETRY_TYPES.contains(&type_name) {
            self.geometry.push(info());
            if type_name == "Mesh" {
                self.triangle_count += mesh_triangle_count(prim)?;
            }
        } else if type_name == "Material" {
            self.materials.push(prim.path.clone());
        } else if type_name == "RenderSettings" {
            self.render_settings.push(prim.path.clone());
        }

        if !prim.references.is_empty() || !prim.payloads.is_empty() {
            self.external_assets.push(info());
        }
        for arc in prim.references.iter().chain(&prim.payloads) {
            self.push_asset(&arc.asset_path);
        }
        for attr in prim.attributes.iter().filter(|a| a.type_name == "asset") {
            if let Some(Value::Asset(path)) = attr.value()? {
                self.push_asset(&path);
            }
        }

        for child in &prim.children {
            self.process_prim(child, world_transform)?;
        }
        Ok(())
    }

    fn push_asset(&mut self, path: &str) {
        if !self.asset_paths.iter().any(|p| p == path) {
            self.asset_paths.push(path.to_string());
        }
    }
}

/// Triangles after fan triangulation of every face.
fn mesh_triangle_count(prim: &ParsedPrim) -> ParseResult<usize> {
    match prim.value("faceVertexCounts")? {
        Some(Value::IntArray(counts)) => Ok(counts
            .iter()
            .map(|&n| (n.max(2) - 2) as usize)
            .sum()),
        _ => Ok(0),
    }
}

/// Read and parse a USDA file.
pub fn read_usda<P: AsRef<Path>>(path: P) -> ParseResult<ParsedLayer> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let layer = parse_usda(&content)?;
    log::debug!("Parsed {} root prims from {}", layer.prims.len(), path.display());
    Ok(layer)
}

/// Read a USDA file and summarise it.
pub fn inspect_usda<P: AsRef<Path>>(path: P) -> ParseResult<StageSummary> {
    let layer = read_usda(path)?;
    StageSummary::from_layer(&layer)
}

/// Summarise USDA text (useful for testing).
pub fn inspect_usda_from_string(content: &str) -> ParseResult<StageSummary> {
    let layer = parse_usda(content)?;
    StageSummary::from_layer(&layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let usda = r#"#usda 1.0
(
    defaultPrim = "World"
    upAxis = "Y"
)

def Xform "World"
{
    def Sphere "Sphere"
    {
        double radius = 2
    }

    def Scope "Cameras"
    {
        def Camera "Camera"
        {
            double3 xformOp:translate = (0, 5, 15)
            uniform token[] xformOpOrder = ["xformOp:translate"]
        }
    }
}

def "Environment"
{
    def DomeLight "DomeLight"
    {
        asset inputs:texture:file = @/tmp/env.exr@
    }
}
"#;
        let summary = inspect_usda_from_string(usda).unwrap();
        assert_eq!(summary.default_prim.as_deref(), Some("World"));
        assert_eq!(summary.geometry.len(), 1);
        assert_eq!(summary.cameras.len(), 1);
        assert_eq!(summary.dome_light_count(), 1);
        assert_eq!(summary.asset_paths, vec!["/tmp/env.exr"]);
        assert_eq!(summary.prim_count, 6);

        let cam = summary.camera("/World/Cameras/Camera").unwrap();
        assert_eq!(cam.position, [0.0, 5.0, 15.0]);
    }

    #[test]
    fn test_transformed_children() {
        let usda = r#"
def Xform "World" {
    double3 xformOp:translate = (10, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Mesh "Quad" {
        point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]
        int[] faceVertexCounts = [4]
        int[] faceVertexIndices = [0, 1, 2, 3]
    }
}
"#;
        let summary = inspect_usda_from_string(usda).unwrap();
        assert_eq!(summary.geometry[0].position, [10.0, 0.0, 0.0]);
        assert_eq!(summary.triangle_count, 2);
    }

    #[test]
    fn test_references_are_external_assets() {
        let usda = r#"
def Xform "World" {
    def Xform "Chair" (
        prepend references = @./chair.usd@
    )
    {
    }
}
"#;
        let summary = inspect_usda_from_string(usda).unwrap();
        assert_eq!(summary.external_assets.len(), 1);
        assert_eq!(summary.asset_paths, vec!["./chair.usd"]);
    }
}
