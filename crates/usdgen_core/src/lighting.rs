//! Environment dome lighting and direct UsdLux lights.

use serde::{Deserialize, Serialize};
use usdgen_math::{euler_transform, DVec3};

use crate::scene::{check_asset_path, check_positive, SceneError, SceneResult};
use crate::usd::{PrimPath, Stage, Value, XformOp};

/// Dome light settings.
#[derive(Clone, Debug, PartialEq)]
pub struct DomeLightParams {
    pub name: String,

    /// Resolved HDRI path; the dome is untextured without one
    pub texture: Option<String>,

    pub intensity: f32,

    /// Rotation about Y in degrees; not authored when zero
    pub rotation_y: f32,
}

impl Default for DomeLightParams {
    fn default() -> Self {
        Self {
            name: "DomeLight".to_string(),
            texture: None,
            intensity: 1.0,
            rotation_y: 0.0,
        }
    }
}

/// Environment lighting rooted at `/Environment`.
#[derive(Clone, Debug)]
pub struct Environment {
    root: PrimPath,
}

impl Environment {
    pub fn new() -> SceneResult<Self> {
        Ok(Self::with_root(PrimPath::new("/Environment")?))
    }

    pub fn with_root(root: PrimPath) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PrimPath {
        &self.root
    }

    /// Add a dome light, textured with the HDRI when one is given.
    pub fn add_dome_light(&self, stage: &mut Stage, params: &DomeLightParams) -> SceneResult<PrimPath> {
        check_non_negative("intensity", params.intensity)?;
        if let Some(texture) = &params.texture {
            check_asset_path(texture)?;
        }

        let path = self.root.child(&params.name)?;
        let dome = stage.define_prim(&path, "DomeLight")?;
        if let Some(texture) = &params.texture {
            dome.set("inputs:texture:file", Value::asset(texture.as_str()))?;
        }
        dome.set("inputs:intensity", params.intensity)?;
        if params.rotation_y != 0.0 {
            dome.add_xform_op(XformOp::RotateY(params.rotation_y))?;
        }

        log::info!(
            "Dome light {} ({})",
            path,
            params.texture.as_deref().unwrap_or("untextured")
        );
        Ok(path)
    }
}

/// The direct light schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    Rect,
    Sphere,
    Disk,
    Distant,
    Cylinder,
}

impl LightType {
    /// UsdLux schema type name.
    pub fn schema(self) -> &'static str {
        match self {
            LightType::Rect => "RectLight",
            LightType::Sphere => "SphereLight",
            LightType::Disk => "DiskLight",
            LightType::Distant => "DistantLight",
            LightType::Cylinder => "CylinderLight",
        }
    }
}

/// Shape inputs of a light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightShape {
    Rect { width: f32, height: f32 },
    Sphere { radius: f32 },
    Disk { radius: f32 },
    Distant { angle: f32 },
    Cylinder { radius: f32, length: f32 },
}

impl LightShape {
    pub fn light_type(&self) -> LightType {
        match self {
            LightShape::Rect { .. } => LightType::Rect,
            LightShape::Sphere { .. } => LightType::Sphere,
            LightShape::Disk { .. } => LightType::Disk,
            LightShape::Distant { .. } => LightType::Distant,
            LightShape::Cylinder { .. } => LightType::Cylinder,
        }
    }

    fn inputs(&self) -> Vec<(&'static str, f32)> {
        match *self {
            LightShape::Rect { width, height } => vec![("inputs:width", width), ("inputs:height", height)],
            LightShape::Sphere { radius } | LightShape::Disk { radius } => vec![("inputs:radius", radius)],
            LightShape::Distant { angle } => vec![("inputs:angle", angle)],
            LightShape::Cylinder { radius, length } => {
                vec![("inputs:radius", radius), ("inputs:length", length)]
            }
        }
    }
}

impl From<LightType> for LightShape {
    fn from(light_type: LightType) -> Self {
        match light_type {
            LightType::Rect => LightShape::Rect {
                width: 5.0,
                height: 5.0,
            },
            LightType::Sphere => LightShape::Sphere { radius: 1.0 },
            LightType::Disk => LightShape::Disk { radius: 1.0 },
            LightType::Distant => LightShape::Distant { angle: 0.53 },
            LightType::Cylinder => LightShape::Cylinder {
                radius: 0.5,
                length: 5.0,
            },
        }
    }
}

/// Cone shaping (`ShapingAPI`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shaping {
    pub cone_angle: Option<f32>,
    #[serde(alias = "focus")]
    pub cone_softness: Option<f32>,
}

/// Shadow controls (`ShadowAPI`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shadows {
    pub enable: Option<bool>,
    pub color: Option<[f32; 3]>,
    pub distance: Option<f32>,
}

/// Everything authored on a direct light.
#[derive(Clone, Debug, PartialEq)]
pub struct LightParams {
    pub shape: LightShape,
    pub intensity: f32,
    pub color: [f32; 3],
    pub position: DVec3,
    /// XYZ Euler rotation in degrees
    pub rotation: DVec3,
    pub shaping: Option<Shaping>,
    pub shadows: Option<Shadows>,
}

impl LightParams {
    /// Defaults for a light type.
    pub fn new(light_type: LightType) -> Self {
        let (intensity, position, rotation) = match light_type {
            LightType::Rect => (10.0, DVec3::new(0.0, 5.0, -5.0), DVec3::new(0.0, 45.0, -45.0)),
            LightType::Sphere => (100.0, DVec3::new(0.0, 5.0, 0.0), DVec3::ZERO),
            LightType::Disk => (50.0, DVec3::new(0.0, 5.0, 0.0), DVec3::new(90.0, 0.0, 0.0)),
            LightType::Distant => (3000.0, DVec3::ZERO, DVec3::new(45.0, -45.0, 0.0)),
            LightType::Cylinder => (60.0, DVec3::new(0.0, 5.0, 0.0), DVec3::ZERO),
        };
        Self {
            shape: LightShape::from(light_type),
            intensity,
            color: [1.0, 1.0, 1.0],
            position,
            rotation,
            shaping: None,
            shadows: None,
        }
    }
}

/// Direct lights rooted at `/World/Lights`.
#[derive(Clone, Debug)]
pub struct LightManager {
    root: PrimPath,
}

impl LightManager {
    pub fn new() -> SceneResult<Self> {
        Ok(Self::with_root(PrimPath::new("/World/Lights")?))
    }

    pub fn with_root(root: PrimPath) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PrimPath {
        &self.root
    }

    /// Define a light at `<root>/<name>`.
    ///
    /// Placement is authored as a single `xformOp:transform`.
    pub fn add_light(&self, stage: &mut Stage, name: &str, params: &LightParams) -> SceneResult<PrimPath> {
        check_non_negative("intensity", params.intensity)?;
        let shape_inputs = params.shape.inputs();
        for (input, value) in &shape_inputs {
            check_positive(input, *value as f64)?;
        }

        let path = self.root.child(name)?;
        let light = stage.define_prim(&path, params.shape.light_type().schema())?;
        light.set("inputs:intensity", params.intensity)?;
        light.set("inputs:color", Value::color(params.color))?;
        for (input, value) in shape_inputs {
            light.set(input, value)?;
        }

        let transform = euler_transform(params.position, params.rotation, DVec3::ONE);
        light.add_xform_op(XformOp::Transform(transform))?;

        if let Some(shaping) = &params.shaping {
            light.apply_api_schema("ShapingAPI");
            if let Some(angle) = shaping.cone_angle {
                light.set("inputs:shaping:cone:angle", angle)?;
            }
            if let Some(softness) = shaping.cone_softness {
                light.set("inputs:shaping:cone:softness", softness)?;
            }
        }

        if let Some(shadows) = &params.shadows {
            light.apply_api_schema("ShadowAPI");
            if let Some(enable) = shadows.enable {
                light.set("inputs:shadow:enable", enable)?;
            }
            if let Some(color) = shadows.color {
                light.set("inputs:shadow:color", Value::color(color))?;
            }
            if let Some(distance) = shadows.distance {
                light.set("inputs:shadow:distance", distance)?;
            }
        }

        Ok(path)
    }

    pub fn add_rect_light(&self, stage: &mut Stage, name: &str) -> SceneResult<PrimPath> {
        self.add_light(stage, name, &LightParams::new(LightType::Rect))
    }

    pub fn add_sphere_light(&self, stage: &mut Stage, name: &str) -> SceneResult<PrimPath> {
        self.add_light(stage, name, &LightParams::new(LightType::Sphere))
    }

    pub fn add_disk_light(&self, stage: &mut Stage, name: &str) -> SceneResult<PrimPath> {
        self.add_light(stage, name, &LightParams::new(LightType::Disk))
    }

    pub fn add_distant_light(&self, stage: &mut Stage, name: &str) -> SceneResult<PrimPath> {
        self.add_light(stage, name, &LightParams::new(LightType::Distant))
    }

    pub fn add_cylinder_light(&self, stage: &mut Stage, name: &str) -> SceneResult<PrimPath> {
        self.add_light(stage, name, &LightParams::new(LightType::Cylinder))
    }
}

fn check_non_negative(name: &str, value: f32) -> SceneResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SceneError::InvalidParameter(format!(
            "{} must be non-negative, got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usdgen_math::DMat4Ext;

    #[test]
    fn test_dome_light_with_texture() {
        let mut stage = Stage::new();
        let env = Environment::new().unwrap();
        let params = DomeLightParams {
            texture: Some("/assets/hdri/studio.exr".to_string()),
            intensity: 2.0,
            ..Default::default()
        };
        let path = env.add_dome_light(&mut stage, &params).unwrap();
        assert_eq!(path.as_str(), "/Environment/DomeLight");

        let text = stage.export_to_string();
        assert!(text.contains("def \"Environment\""));
        assert!(text.contains("asset inputs:texture:file = @/assets/hdri/studio.exr@"));
        assert!(text.contains("float inputs:intensity = 2"));
        assert!(!text.contains("xformOp:rotateY"));
    }

    #[test]
    fn test_dome_light_untextured_rotated() {
        let mut stage = Stage::new();
        let env = Environment::new().unwrap();
        let params = DomeLightParams {
            rotation_y: 90.0,
            ..Default::default()
        };
        let path = env.add_dome_light(&mut stage, &params).unwrap();
        let dome = stage.prim(&path).unwrap();
        assert!(dome.attribute("inputs:texture:file").is_none());
        assert_eq!(dome.xform_op_order(), vec!["xformOp:rotateY"]);
    }

    #[test]
    fn test_dome_light_rejects_delimiter_in_texture() {
        let mut stage = Stage::new();
        let env = Environment::new().unwrap();
        let params = DomeLightParams {
            texture: Some("/assets/hdri/studio@2k.exr".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            env.add_dome_light(&mut stage, &params),
            Err(SceneError::InvalidParameter(_))
        ));
        assert!(stage.root_prims().is_empty());
    }

    #[test]
    fn test_light_defaults() {
        let rect = LightParams::new(LightType::Rect);
        assert_eq!(rect.intensity, 10.0);
        assert_eq!(rect.shape, LightShape::Rect { width: 5.0, height: 5.0 });

        let distant = LightParams::new(LightType::Distant);
        assert_eq!(distant.intensity, 3000.0);
        assert_eq!(distant.shape, LightShape::Distant { angle: 0.53 });
        assert_eq!(distant.position, DVec3::ZERO);
    }

    #[test]
    fn test_sphere_light_transform() {
        let mut stage = Stage::new();
        let lights = LightManager::new().unwrap();
        let path = lights.add_sphere_light(&mut stage, "Key").unwrap();
        assert_eq!(path.as_str(), "/World/Lights/Key");

        let light = stage.prim(&path).unwrap();
        assert_eq!(light.type_name.as_deref(), Some("SphereLight"));
        assert_eq!(light.xform_op_order(), vec!["xformOp:transform"]);
        let m = light.local_transform(None);
        assert!((m.translation() - DVec3::new(0.0, 5.0, 0.0)).length() < 1e-9);
        assert_eq!(
            light.attribute("inputs:radius").unwrap().default,
            Some(Value::Float(1.0))
        );
    }

    #[test]
    fn test_shaping_and_shadows() {
        let mut stage = Stage::new();
        let lights = LightManager::new().unwrap();
        let mut params = LightParams::new(LightType::Disk);
        params.shaping = Some(Shaping {
            cone_angle: Some(30.0),
            cone_softness: None,
        });
        params.shadows = Some(Shadows {
            enable: Some(true),
            color: Some([0.0, 0.0, 0.0]),
            distance: None,
        });
        let path = lights.add_light(&mut stage, "Spot", &params).unwrap();

        let light = stage.prim(&path).unwrap();
        assert_eq!(light.metadata.api_schemas, vec!["ShapingAPI", "ShadowAPI"]);
        assert!(light.attribute("inputs:shaping:cone:angle").is_some());
        assert!(light.attribute("inputs:shaping:cone:softness").is_none());
        assert_eq!(
            light.attribute("inputs:shadow:enable").unwrap().default,
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn test_rejects_bad_light_inputs() {
        let mut stage = Stage::new();
        let lights = LightManager::new().unwrap();
        let mut params = LightParams::new(LightType::Cylinder);
        params.shape = LightShape::Cylinder {
            radius: 0.0,
            length: 5.0,
        };
        assert!(lights.add_light(&mut stage, "Bad", &params).is_err());

        let mut params = LightParams::new(LightType::Rect);
        params.intensity = -1.0;
        assert!(lights.add_light(&mut stage, "Dark", &params).is_err());
        assert_eq!(stage.prim_count(), 0);
    }

    #[test]
    fn test_shaping_focus_alias() {
        let shaping: Shaping = serde_json::from_str(r#"{"focus": 0.4}"#).unwrap();
        assert_eq!(shaping.cone_softness, Some(0.4));
    }
}
