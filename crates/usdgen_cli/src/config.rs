//! Scene configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. Built-in defaults
//! 2. `config/default.toml` (version controlled)
//! 3. `config/user.toml` (gitignored, user overrides)
//! 4. A file passed with `--config`
//! 5. Environment variables (`USDGEN_SECTION__KEY`)
//!
//! Command-line flags are applied on top by the caller.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use usdgen_core::camera::{CameraParams, OrbitParams, Projection};
use usdgen_core::lighting::{LightParams, LightShape, LightType, Shaping, Shadows};
use usdgen_core::materials::MaterialPreset;
use usdgen_core::usd::UpAxis;
use usdgen_math::{DVec3, Lens};

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main scene configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Materials defined before any geometry
    #[serde(default)]
    pub materials: Vec<MaterialConfig>,
    #[serde(default = "default_geometry")]
    pub geometry: Vec<GeometryConfig>,
    /// Direct lights under `/World/Lights`
    #[serde(default)]
    pub lights: Vec<LightConfig>,
    #[serde(default)]
    pub orbit: OrbitConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            stage: StageConfig::default(),
            camera: CameraConfig::default(),
            environment: EnvironmentConfig::default(),
            materials: Vec::new(),
            geometry: default_geometry(),
            lights: Vec::new(),
            orbit: OrbitConfig::default(),
            animation: AnimationConfig::default(),
            render: RenderConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Load and validate configuration from a config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P, extra: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::layered(config_dir, extra)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge every configuration layer without validating the result.
    ///
    /// Callers that apply further overrides (CLI flags) validate afterwards.
    pub fn layered<P: AsRef<Path>>(config_dir: P, extra: Option<&Path>) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::from(Serialized::defaults(SceneConfig::default()));

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // An explicitly requested file must exist
        if let Some(extra) = extra {
            if !extra.exists() {
                return Err(ConfigError::MissingFile(extra.to_path_buf()));
            }
            figment = figment.merge(Toml::file(extra));
        }

        // Environment variables override everything
        // USDGEN_CAMERA__FOCAL_LENGTH=50 -> camera.focal_length = 50
        figment = figment.merge(Env::prefixed("USDGEN_").split("__"));

        Ok(figment.extract()?)
    }

    /// Check settings that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.fov.is_some() && self.camera.focal_length.is_some() {
            return Err(ConfigError::Invalid(
                "camera.fov and camera.focal_length are mutually exclusive".to_string(),
            ));
        }
        if let Some(fov) = self.camera.fov {
            if !(fov > 0.0 && fov < 180.0) {
                return Err(ConfigError::Invalid(format!(
                    "camera.fov must be between 0 and 180 degrees, got {}",
                    fov
                )));
            }
        }
        if self.render.enabled && self.render.resolution.iter().any(|&v| v <= 0) {
            return Err(ConfigError::Invalid(format!(
                "render.resolution must be positive, got {:?}",
                self.render.resolution
            )));
        }
        if self.metadata.path.is_some() && self.metadata.resolution.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "metadata.resolution must be positive, got {:?}",
                self.metadata.resolution
            )));
        }
        if self.animation.enabled && self.animation.end < self.animation.start {
            return Err(ConfigError::Invalid(format!(
                "animation frame range {}..{} is empty",
                self.animation.start, self.animation.end
            )));
        }
        Ok(())
    }
}

fn default_geometry() -> Vec<GeometryConfig> {
    vec![GeometryConfig::default()]
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Target scene file
    pub path: PathBuf,
    /// Print the USDA text after saving
    pub print: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("outputs/scenes/scene.usda"),
            print: false,
        }
    }
}

/// Stage layer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            up_axis: UpAxis::Y,
            meters_per_unit: 0.01,
        }
    }
}

/// Main camera configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub name: String,
    /// Position [x, y, z]
    pub position: [f64; 3],
    /// Look-at target [x, y, z]
    pub target: Option<[f64; 3]>,
    pub projection: Projection,
    /// Focal length in mm (exclusive with `fov`)
    pub focal_length: Option<f64>,
    /// Horizontal field of view in degrees (exclusive with `focal_length`)
    pub fov: Option<f64>,
    pub horizontal_aperture: f64,
    pub vertical_aperture: f64,
    /// Near and far clipping distances
    pub clipping_range: [f32; 2],
}

impl Default for CameraConfig {
    fn default() -> Self {
        let lens = Lens::default();
        Self {
            name: "Camera".to_string(),
            position: [0.0, 5.0, 15.0],
            target: None,
            projection: Projection::Perspective,
            focal_length: None,
            fov: None,
            horizontal_aperture: lens.horizontal_aperture,
            vertical_aperture: lens.vertical_aperture,
            clipping_range: [0.1, 1000.0],
        }
    }
}

impl CameraConfig {
    /// Lens from the focal length or field of view.
    pub fn lens(&self) -> Lens {
        match (self.fov, self.focal_length) {
            (Some(fov), _) => Lens::from_horizontal_fov(fov, self.horizontal_aperture, self.vertical_aperture),
            (None, focal_length) => Lens {
                focal_length: focal_length.unwrap_or(Lens::default().focal_length),
                horizontal_aperture: self.horizontal_aperture,
                vertical_aperture: self.vertical_aperture,
            },
        }
    }

    pub fn to_params(&self) -> CameraParams {
        CameraParams {
            name: self.name.clone(),
            position: DVec3::from(self.position),
            target: self.target.map(DVec3::from),
            projection: self.projection,
            lens: self.lens(),
            clipping_range: self.clipping_range,
        }
    }
}

/// Environment (dome light) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// HDRI environment map; must exist when set
    pub hdri: Option<PathBuf>,
    pub intensity: f32,
    /// Dome rotation about Y in degrees
    pub rotation_y: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            hdri: None,
            intensity: 1.0,
            rotation_y: 0.0,
        }
    }
}

/// A material from the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    pub name: String,
    #[serde(flatten)]
    pub preset: MaterialPreset,
}

/// Primitive shapes and external assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeometryKind {
    Sphere {
        #[serde(default = "one")]
        radius: f64,
    },
    Cube {
        #[serde(default = "one")]
        size: f64,
    },
    Plane {
        #[serde(default = "ten")]
        size: f64,
    },
    /// External USD file mounted as a reference (or payload)
    Reference {
        asset: String,
        #[serde(default)]
        payload: bool,
    },
}

fn one() -> f64 {
    1.0
}

fn ten() -> f64 {
    10.0
}

/// A geometry prim under `/World`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: GeometryKind,
    #[serde(default)]
    pub position: [f64; 3],
    /// Material name (from `materials`) or absolute material path
    #[serde(default)]
    pub material: Option<String>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            name: "Sphere".to_string(),
            kind: GeometryKind::Sphere { radius: 1.0 },
            position: [0.0, 1.0, 0.0],
            material: None,
        }
    }
}

/// A direct light; unset fields use the light type's defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub light_type: LightType,
    #[serde(default)]
    pub intensity: Option<f32>,
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub position: Option<[f64; 3]>,
    /// XYZ Euler rotation in degrees
    #[serde(default)]
    pub rotation: Option<[f64; 3]>,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub radius: Option<f32>,
    #[serde(default)]
    pub length: Option<f32>,
    #[serde(default)]
    pub angle: Option<f32>,
    #[serde(default)]
    pub shaping: Option<Shaping>,
    #[serde(default)]
    pub shadows: Option<Shadows>,
}

impl LightConfig {
    pub fn to_params(&self) -> LightParams {
        let mut params = LightParams::new(self.light_type);
        if let Some(intensity) = self.intensity {
            params.intensity = intensity;
        }
        if let Some(color) = self.color {
            params.color = color;
        }
        if let Some(position) = self.position {
            params.position = DVec3::from(position);
        }
        if let Some(rotation) = self.rotation {
            params.rotation = DVec3::from(rotation);
        }

        params.shape = match params.shape {
            LightShape::Rect { width, height } => LightShape::Rect {
                width: self.width.unwrap_or(width),
                height: self.height.unwrap_or(height),
            },
            LightShape::Sphere { radius } => LightShape::Sphere {
                radius: self.radius.unwrap_or(radius),
            },
            LightShape::Disk { radius } => LightShape::Disk {
                radius: self.radius.unwrap_or(radius),
            },
            LightShape::Distant { angle } => LightShape::Distant {
                angle: self.angle.unwrap_or(angle),
            },
            LightShape::Cylinder { radius, length } => LightShape::Cylinder {
                radius: self.radius.unwrap_or(radius),
                length: self.length.unwrap_or(length),
            },
        };

        params.shaping = self.shaping;
        params.shadows = self.shadows;
        params
    }
}

/// Ring of static cameras around the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub enabled: bool,
    /// Center of the ring; defaults to the camera target or the origin
    pub target: Option<[f64; 3]>,
    pub radius: f64,
    pub height: f64,
    pub num_views: usize,
    pub focal_length: f64,
    pub prefix: String,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        let orbit = OrbitParams::default();
        Self {
            enabled: false,
            target: None,
            radius: orbit.radius,
            height: orbit.height,
            num_views: orbit.num_views,
            focal_length: orbit.focal_length,
            prefix: orbit.prefix,
        }
    }
}

/// Main camera animation along an orbit path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub enabled: bool,
    /// Orbit center; defaults to the camera target or the origin
    pub center: Option<[f64; 3]>,
    pub radius: f64,
    pub height: f64,
    pub start: i64,
    pub end: i64,
    pub fps: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            center: None,
            radius: 10.0,
            height: 10.0,
            start: 0,
            end: 119,
            fps: 24.0,
        }
    }
}

/// Render settings, product and AOVs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub resolution: [i32; 2],
    /// Image written by the render product; no product without it
    pub product_path: Option<PathBuf>,
    pub vars: Vec<RenderVarConfig>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            resolution: [512, 512],
            product_path: None,
            vars: Vec::new(),
        }
    }
}

/// One render var (AOV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderVarConfig {
    pub name: String,
    pub source_name: String,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default)]
    pub source_type: Option<String>,
}

fn default_data_type() -> String {
    "float".to_string()
}

/// Camera calibration export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// JSON file for the main camera's metadata; not exported without it
    pub path: Option<PathBuf>,
    pub resolution: [u32; 2],
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: None,
            resolution: [512, 512],
        }
    }
}
