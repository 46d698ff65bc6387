//! Scene assembly: stage setup, geometry primitives and external assets.

use std::path::{Path, PathBuf};

use thiserror::Error;
use usdgen_math::DVec3;

use crate::materials::bind_material;
use crate::mesh::MeshData;
use crate::usd::{AssetRef, PathError, PrimPath, Stage, StageError, UpAxis, Value, XformOp};

/// Errors that can occur while assembling a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("Asset not found: {}", .0.display())]
    MissingAsset(PathBuf),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for scene assembly.
pub type SceneResult<T> = Result<T, SceneError>;

/// Resolve an existing file to an absolute path with forward slashes.
pub fn resolve_asset<P: AsRef<Path>>(path: P) -> SceneResult<String> {
    let path = path.as_ref();
    let absolute = path
        .canonicalize()
        .map_err(|_| SceneError::MissingAsset(path.to_path_buf()))?;
    if !absolute.is_file() {
        return Err(SceneError::MissingAsset(path.to_path_buf()));
    }
    let resolved = to_posix(&absolute);
    check_asset_path(&resolved)?;
    Ok(resolved)
}

/// Reject asset paths that cannot be written between `@` delimiters.
pub(crate) fn check_asset_path(asset_path: &str) -> SceneResult<()> {
    if asset_path.is_empty() || asset_path.contains('@') {
        return Err(SceneError::InvalidParameter(format!(
            "invalid asset path '{}'",
            asset_path
        )));
    }
    Ok(())
}

/// Render a path with forward slashes (and without a Windows verbatim prefix).
pub fn to_posix(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    match s.strip_prefix("//?/") {
        Some(stripped) => stripped.to_string(),
        None => s,
    }
}

/// Reject sizes that are not finite and positive.
pub(crate) fn check_positive(name: &str, value: f64) -> SceneResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SceneError::InvalidParameter(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

/// Where a primitive goes and what it is bound to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Placement {
    pub position: DVec3,
    pub material: Option<PrimPath>,
}

impl Placement {
    /// Place at `position` without a material.
    pub fn at(position: DVec3) -> Self {
        Self {
            position,
            material: None,
        }
    }

    /// Bind `material` to the primitive.
    pub fn with_material(mut self, material: PrimPath) -> Self {
        self.material = Some(material);
        self
    }
}

/// How an external asset is brought into the scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArcKind {
    #[default]
    Reference,
    Payload,
}

/// Builds a scene on a stage rooted at `/World`.
#[derive(Debug)]
pub struct SceneBuilder {
    stage: Stage,
    world: PrimPath,
}

impl SceneBuilder {
    /// A Y-up, centimetre-scale stage with `/World` as the default prim.
    pub fn new() -> SceneResult<Self> {
        Self::with_settings(UpAxis::Y, 0.01)
    }

    /// A new stage with the given up axis and units.
    pub fn with_settings(up_axis: UpAxis, meters_per_unit: f64) -> SceneResult<Self> {
        check_positive("metersPerUnit", meters_per_unit)?;

        let mut stage = Stage::new();
        stage.metadata.up_axis = Some(up_axis);
        stage.metadata.meters_per_unit = Some(meters_per_unit);

        let world = PrimPath::new("/World")?;
        stage.define_prim(&world, "Xform")?;
        stage.set_default_prim(&world)?;

        Ok(Self { stage, world })
    }

    /// The `/World` root path.
    pub fn world(&self) -> &PrimPath {
        &self.world
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    pub fn into_stage(self) -> Stage {
        self.stage
    }

    /// Add a sphere primitive.
    pub fn add_sphere(&mut self, path: &PrimPath, radius: f64, placement: &Placement) -> SceneResult<()> {
        check_positive("radius", radius)?;
        let r = radius as f32;

        let sphere = self.stage.define_prim(path, "Sphere")?;
        sphere.set("radius", radius)?;
        sphere.set("extent", Value::Float3Array(vec![[-r, -r, -r], [r, r, r]]))?;
        self.place(path, placement)
    }

    /// Add a cube primitive with edge length `size`.
    pub fn add_cube(&mut self, path: &PrimPath, size: f64, placement: &Placement) -> SceneResult<()> {
        check_positive("size", size)?;
        let h = (size * 0.5) as f32;

        let cube = self.stage.define_prim(path, "Cube")?;
        cube.set("size", size)?;
        cube.set("extent", Value::Float3Array(vec![[-h, -h, -h], [h, h, h]]))?;
        self.place(path, placement)
    }

    /// Add a square ground plane mesh spanning `-size..size` in X and Z.
    pub fn add_plane(&mut self, path: &PrimPath, size: f64, placement: &Placement) -> SceneResult<()> {
        check_positive("size", size)?;
        self.add_mesh(path, &MeshData::plane(size as f32), placement)
    }

    /// Add an arbitrary polygon mesh.
    pub fn add_mesh(&mut self, path: &PrimPath, mesh: &MeshData, placement: &Placement) -> SceneResult<()> {
        mesh.validate()
            .map_err(|e| SceneError::InvalidParameter(format!("{}: {}", path, e)))?;

        let prim = self.stage.define_prim(path, "Mesh")?;
        prim.set(
            "points",
            Value::Point3fArray(mesh.points.iter().map(|p| p.to_array()).collect()),
        )?;
        prim.set("faceVertexIndices", Value::IntArray(mesh.face_vertex_indices.clone()))?;
        prim.set("faceVertexCounts", Value::IntArray(mesh.face_vertex_counts.clone()))?;
        if let Some([min, max]) = mesh.extent() {
            prim.set("extent", Value::Float3Array(vec![min.to_array(), max.to_array()]))?;
        }
        self.place(path, placement)
    }

    /// Mount an external USD file as a reference or payload on an Xform.
    ///
    /// The asset path is authored as given; it is not resolved.
    pub fn add_external_asset(
        &mut self,
        path: &PrimPath,
        asset_path: &str,
        arc: ArcKind,
        placement: &Placement,
    ) -> SceneResult<()> {
        check_asset_path(asset_path)?;

        let prim = self.stage.define_prim(path, "Xform")?;
        let asset = AssetRef::new(asset_path);
        match arc {
            ArcKind::Reference => prim.metadata.references.push(asset),
            ArcKind::Payload => prim.metadata.payload = Some(asset),
        }
        self.place(path, placement)
    }

    /// Bind a material to an existing prim.
    pub fn bind_material(&mut self, prim: &PrimPath, material: &PrimPath) -> SceneResult<()> {
        bind_material(&mut self.stage, prim, material)?;
        Ok(())
    }

    fn place(&mut self, path: &PrimPath, placement: &Placement) -> SceneResult<()> {
        self.stage
            .prim_mut(path)?
            .add_xform_op(XformOp::Translate(placement.position))?;
        if let Some(material) = &placement.material {
            self.bind_material(path, material)?;
        }
        Ok(())
    }

    /// The stage as USDA text.
    pub fn to_usda(&self) -> String {
        self.stage.export_to_string()
    }

    /// Write the stage to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SceneResult<()> {
        self.stage.export(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::MaterialLibrary;

    fn path(s: &str) -> PrimPath {
        PrimPath::new(s).unwrap()
    }

    #[test]
    fn test_new_stage_settings() {
        let builder = SceneBuilder::new().unwrap();
        let meta = &builder.stage().metadata;
        assert_eq!(meta.default_prim.as_deref(), Some("World"));
        assert_eq!(meta.up_axis, Some(UpAxis::Y));
        assert_eq!(meta.meters_per_unit, Some(0.01));

        let text = builder.to_usda();
        assert!(text.contains("def Xform \"World\""));
    }

    #[test]
    fn test_add_sphere() {
        let mut builder = SceneBuilder::new().unwrap();
        let sphere = path("/World/Sphere");
        builder
            .add_sphere(&sphere, 2.0, &Placement::at(DVec3::new(0.0, 2.0, 0.0)))
            .unwrap();

        let prim = builder.stage().prim(&sphere).unwrap();
        assert_eq!(prim.type_name.as_deref(), Some("Sphere"));
        assert_eq!(prim.attribute("radius").unwrap().default, Some(Value::Double(2.0)));
        assert_eq!(prim.xform_op_order(), vec!["xformOp:translate"]);
    }

    #[test]
    fn test_add_plane_mesh() {
        let mut builder = SceneBuilder::new().unwrap();
        let ground = path("/World/Ground");
        builder.add_plane(&ground, 10.0, &Placement::default()).unwrap();

        let prim = builder.stage().prim(&ground).unwrap();
        assert_eq!(
            prim.attribute("faceVertexCounts").unwrap().default,
            Some(Value::IntArray(vec![3, 3]))
        );
        let text = builder.to_usda();
        assert!(text.contains("point3f[] points = [(-10, 0, -10), (10, 0, -10), (10, 0, 10), (-10, 0, 10)]"));
    }

    #[test]
    fn test_rejects_non_positive_sizes() {
        let mut builder = SceneBuilder::new().unwrap();
        let err = builder
            .add_cube(&path("/World/Cube"), 0.0, &Placement::default())
            .unwrap_err();
        assert!(matches!(err, SceneError::InvalidParameter(_)));
        assert!(builder.stage().prim(&path("/World/Cube")).is_none());
    }

    #[test]
    fn test_external_asset_arcs() {
        let mut builder = SceneBuilder::new().unwrap();
        builder
            .add_external_asset(&path("/World/Chair"), "./chair.usd", ArcKind::Reference, &Placement::default())
            .unwrap();
        builder
            .add_external_asset(&path("/World/Set"), "./set.usd", ArcKind::Payload, &Placement::default())
            .unwrap();

        let text = builder.to_usda();
        assert!(text.contains("prepend references = @./chair.usd@"));
        assert!(text.contains("prepend payload = @./set.usd@"));
    }

    #[test]
    fn test_binding_requires_material() {
        let mut builder = SceneBuilder::new().unwrap();
        let sphere = path("/World/Sphere");
        let placement = Placement::default().with_material(path("/Materials/Missing"));
        let err = builder.add_sphere(&sphere, 1.0, &placement).unwrap_err();
        assert!(matches!(err, SceneError::Stage(StageError::MaterialNotFound(_))));
    }

    #[test]
    fn test_binding_with_material() {
        let mut builder = SceneBuilder::new().unwrap();
        let library = MaterialLibrary::new(builder.stage_mut()).unwrap();
        let paint = library
            .create_car_paint(builder.stage_mut(), "BluePaint", [0.1, 0.2, 0.8])
            .unwrap();

        let sphere = path("/World/Sphere");
        builder
            .add_sphere(&sphere, 2.0, &Placement::default().with_material(paint))
            .unwrap();

        let prim = builder.stage().prim(&sphere).unwrap();
        assert_eq!(prim.metadata.api_schemas, vec!["MaterialBindingAPI"]);
        assert_eq!(
            prim.relationship("material:binding").unwrap().targets[0].to_string(),
            "/Materials/BluePaint"
        );
    }

    #[test]
    fn test_resolve_missing_asset() {
        let missing = std::env::temp_dir().join("usdgen_definitely_missing.exr");
        assert!(matches!(resolve_asset(&missing), Err(SceneError::MissingAsset(_))));
    }

    #[test]
    fn test_resolve_rejects_at_sign() {
        let dir = std::env::temp_dir().join(format!("usdgen_scene_at_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let hdri = dir.join("studio@2k.exr");
        std::fs::write(&hdri, b"exr").unwrap();

        assert!(matches!(resolve_asset(&hdri), Err(SceneError::InvalidParameter(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_to_posix() {
        assert_eq!(to_posix(Path::new("C:\\hdri\\studio.exr")), "C:/hdri/studio.exr");
        assert_eq!(to_posix(Path::new("/tmp/a.exr")), "/tmp/a.exr");
    }
}
