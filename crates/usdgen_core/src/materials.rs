//! Material library: UsdPreviewSurface, RenderMan and MaterialX materials.
//!
//! Every material lives at `/Materials/<name>` with a single `Shader`
//! child. The shader's `outputs:surface` is connected to the material's
//! `outputs:surface`.

use serde::{Deserialize, Serialize};

use crate::scene::{check_asset_path, check_positive, SceneResult};
use crate::usd::{PrimPath, Stage, StageError, StageResult, TargetPath, Value};

/// Shader id of the preview surface materials.
pub const PREVIEW_SURFACE: &str = "UsdPreviewSurface";

/// Shader id of RenderMan's surface shader.
pub const PXR_SURFACE: &str = "PxrSurface";

/// Named material presets, as used in scene configuration.
///
/// Unset parameters fall back to the preset's defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "preset", rename_all = "snake_case")]
pub enum MaterialPreset {
    CarPaint {
        color: Option<[f32; 3]>,
    },
    Glass {
        color: Option<[f32; 3]>,
        roughness: Option<f32>,
        ior: Option<f32>,
    },
    Plastic {
        color: Option<[f32; 3]>,
        roughness: Option<f32>,
    },
    Wood {
        color: Option<[f32; 3]>,
        roughness: Option<f32>,
    },
    RendermanMetal {
        diffuse: Option<[f32; 3]>,
        specular_edge: Option<[f32; 3]>,
        roughness: Option<f32>,
    },
    RendermanGlass {
        color: Option<[f32; 3]>,
        roughness: Option<f32>,
    },
    Materialx {
        file: String,
    },
}

/// Creates materials under a shared root scope.
#[derive(Clone, Debug)]
pub struct MaterialLibrary {
    root: PrimPath,
}

impl MaterialLibrary {
    /// Define the `/Materials` scope.
    pub fn new(stage: &mut Stage) -> SceneResult<Self> {
        Self::with_root(stage, PrimPath::new("/Materials")?)
    }

    /// Use a different root scope.
    pub fn with_root(stage: &mut Stage, root: PrimPath) -> SceneResult<Self> {
        stage.define_prim(&root, "Scope")?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &PrimPath {
        &self.root
    }

    /// Path a material named `name` would have.
    pub fn material_path(&self, name: &str) -> SceneResult<PrimPath> {
        Ok(self.root.child(name)?)
    }

    /// Define a material whose shader has the given id and inputs.
    ///
    /// Input names are given without the `inputs:` namespace.
    pub fn create_material(
        &self,
        stage: &mut Stage,
        name: &str,
        shader_id: &str,
        inputs: &[(&str, Value)],
    ) -> SceneResult<PrimPath> {
        let material_path = self.material_path(name)?;
        let shader_path = material_path.child("Shader")?;

        stage.define_prim(&material_path, "Material")?;

        let shader = stage.define_prim(&shader_path, "Shader")?;
        shader.set_uniform("info:id", Value::token(shader_id))?;
        for (input, value) in inputs {
            shader.set(&format!("inputs:{}", input), value.clone())?;
        }
        shader.create_attribute("outputs:surface", "token", false)?;

        let source = TargetPath::property(shader_path, "outputs:surface")?;
        let output = stage
            .prim_mut(&material_path)?
            .create_attribute("outputs:surface", "token", false)?;
        output.connections = vec![source];

        Ok(material_path)
    }

    /// Metallic paint with a clear coat.
    pub fn create_car_paint(&self, stage: &mut Stage, name: &str, color: [f32; 3]) -> SceneResult<PrimPath> {
        self.create_material(
            stage,
            name,
            PREVIEW_SURFACE,
            &[
                ("diffuseColor", Value::color(color)),
                ("metallic", Value::Float(1.0)),
                ("roughness", Value::Float(0.2)),
                ("clearcoat", Value::Float(0.5)),
                ("clearcoatRoughness", Value::Float(0.1)),
            ],
        )
    }

    pub fn create_glass(
        &self,
        stage: &mut Stage,
        name: &str,
        color: [f32; 3],
        roughness: f32,
        ior: f32,
    ) -> SceneResult<PrimPath> {
        check_positive("ior", ior as f64)?;
        self.create_material(
            stage,
            name,
            PREVIEW_SURFACE,
            &[
                ("diffuseColor", Value::color(color)),
                ("opacity", Value::Float(0.2)),
                ("ior", Value::Float(ior)),
                ("roughness", Value::Float(roughness)),
            ],
        )
    }

    pub fn create_plastic(&self, stage: &mut Stage, name: &str, color: [f32; 3], roughness: f32) -> SceneResult<PrimPath> {
        self.create_dielectric(stage, name, color, roughness)
    }

    pub fn create_wood(&self, stage: &mut Stage, name: &str, color: [f32; 3], roughness: f32) -> SceneResult<PrimPath> {
        self.create_dielectric(stage, name, color, roughness)
    }

    fn create_dielectric(&self, stage: &mut Stage, name: &str, color: [f32; 3], roughness: f32) -> SceneResult<PrimPath> {
        self.create_material(
            stage,
            name,
            PREVIEW_SURFACE,
            &[
                ("diffuseColor", Value::color(color)),
                ("metallic", Value::Float(0.0)),
                ("roughness", Value::Float(roughness)),
                ("specular", Value::Float(0.5)),
            ],
        )
    }

    /// PxrSurface metal; `specular_edge` drives both face and edge color.
    pub fn create_renderman_metal(
        &self,
        stage: &mut Stage,
        name: &str,
        diffuse: [f32; 3],
        specular_edge: [f32; 3],
        roughness: f32,
    ) -> SceneResult<PrimPath> {
        self.create_material(
            stage,
            name,
            PXR_SURFACE,
            &[
                ("diffuseColor", Value::color(diffuse)),
                ("specularFaceColor", Value::color(specular_edge)),
                ("specularEdgeColor", Value::color(specular_edge)),
                ("specularRoughness", Value::Float(roughness)),
                ("presence", Value::Float(1.0)),
            ],
        )
    }

    /// PxrSurface glass with a Beckmann specular model.
    pub fn create_renderman_glass(
        &self,
        stage: &mut Stage,
        name: &str,
        glass_color: [f32; 3],
        roughness: f32,
    ) -> SceneResult<PrimPath> {
        self.create_material(
            stage,
            name,
            PXR_SURFACE,
            &[
                ("glassColor", Value::color(glass_color)),
                ("specularModelType", Value::Int(1)),
                ("refractiveIndex", Value::Float(1.5)),
                ("specularRoughness", Value::Float(roughness)),
                ("presence", Value::Float(1.0)),
            ],
        )
    }

    /// A material whose shader points at a `.mtlx` document.
    pub fn create_materialx_reference(&self, stage: &mut Stage, name: &str, mtlx_path: &str) -> SceneResult<PrimPath> {
        check_asset_path(mtlx_path)?;
        self.create_material(
            stage,
            name,
            "MaterialX",
            &[("file", Value::asset(mtlx_path))],
        )
    }

    /// Create a material from a preset, filling in preset defaults.
    pub fn create_preset(&self, stage: &mut Stage, name: &str, preset: &MaterialPreset) -> SceneResult<PrimPath> {
        match preset {
            MaterialPreset::CarPaint { color } => {
                self.create_car_paint(stage, name, color.unwrap_or([0.1, 0.2, 0.8]))
            }
            MaterialPreset::Glass { color, roughness, ior } => self.create_glass(
                stage,
                name,
                color.unwrap_or([0.9, 0.9, 0.9]),
                roughness.unwrap_or(0.01),
                ior.unwrap_or(1.5),
            ),
            MaterialPreset::Plastic { color, roughness } => self.create_plastic(
                stage,
                name,
                color.unwrap_or([0.8, 0.2, 0.2]),
                roughness.unwrap_or(0.3),
            ),
            MaterialPreset::Wood { color, roughness } => self.create_wood(
                stage,
                name,
                color.unwrap_or([0.4, 0.2, 0.1]),
                roughness.unwrap_or(0.7),
            ),
            MaterialPreset::RendermanMetal {
                diffuse,
                specular_edge,
                roughness,
            } => self.create_renderman_metal(
                stage,
                name,
                diffuse.unwrap_or([0.1, 0.1, 0.1]),
                specular_edge.unwrap_or([1.0, 1.0, 1.0]),
                roughness.unwrap_or(0.1),
            ),
            MaterialPreset::RendermanGlass { color, roughness } => self.create_renderman_glass(
                stage,
                name,
                color.unwrap_or([0.7, 0.8, 1.0]),
                roughness.unwrap_or(0.02),
            ),
            MaterialPreset::Materialx { file } => self.create_materialx_reference(stage, name, file),
        }
    }
}

/// Bind `material` to `prim` through `MaterialBindingAPI`.
///
/// The material must already be defined as a `Material` prim.
pub fn bind_material(stage: &mut Stage, prim: &PrimPath, material: &PrimPath) -> StageResult<()> {
    let is_material = stage
        .prim(material)
        .is_some_and(|p| p.type_name.as_deref() == Some("Material"));
    if !is_material {
        return Err(StageError::MaterialNotFound(material.to_string()));
    }

    let target = stage.prim_mut(prim)?;
    target.apply_api_schema("MaterialBindingAPI");
    target.set_relationship("material:binding", vec![TargetPath::prim(material.clone())])
}
