//! Camera authoring: single cameras, orbit rings and calibration metadata.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use usdgen_math::{ring_positions, DMat4Ext, DVec3, Lens, LookAt};

use crate::scene::{check_positive, SceneError, SceneResult};
use crate::usd::{PrimPath, Stage, Value, XformOp};

/// Camera projection mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

impl Projection {
    pub fn token(self) -> &'static str {
        match self {
            Projection::Perspective => "perspective",
            Projection::Orthographic => "orthographic",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "perspective" => Some(Projection::Perspective),
            "orthographic" => Some(Projection::Orthographic),
            _ => None,
        }
    }
}

/// Settings for one camera.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraParams {
    pub name: String,
    pub position: DVec3,

    /// Point to look at; without one only a translation is authored
    pub target: Option<DVec3>,

    pub projection: Projection,
    pub lens: Lens,

    /// Near and far clipping distances
    pub clipping_range: [f32; 2],
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            name: "Camera".to_string(),
            position: DVec3::new(0.0, 5.0, 15.0),
            target: None,
            projection: Projection::Perspective,
            lens: Lens::default(),
            clipping_range: [0.1, 1000.0],
        }
    }
}

/// A ring of cameras looking at a common target.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitParams {
    pub target: DVec3,
    pub radius: f64,
    /// Absolute camera height
    pub height: f64,
    pub num_views: usize,
    pub focal_length: f64,
    /// Cameras are named `<prefix>_<index>`
    pub prefix: String,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            target: DVec3::ZERO,
            radius: 10.0,
            height: 5.0,
            num_views: 8,
            focal_length: 35.0,
            prefix: "OrbitCam".to_string(),
        }
    }
}

/// Pixel size of the sensor in millimetres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicMetadata {
    pub focal_length_mm: f64,
    pub horizontal_aperture_mm: f64,
    pub vertical_aperture_mm: f64,
    pub pixel_size_mm: PixelSize,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub skew: f64,
    #[serde(rename = "K")]
    pub k: [[f64; 3]; 3],
}

/// Camera-to-world rotation and translation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicMetadata {
    #[serde(rename = "R")]
    pub r: [[f64; 3]; 3],
    #[serde(rename = "T")]
    pub t: [f64; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Calibration data for one camera, serialized as JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMetadata {
    pub intrinsic: IntrinsicMetadata,
    pub extrinsic: ExtrinsicMetadata,
    /// `P = K [R | T]`
    pub projection_matrix: [[f64; 4]; 3],
    pub resolution: Resolution,
    pub projection: Projection,
    pub clipping_range: [f64; 2],
}

/// Cameras rooted at `/World/Cameras`.
#[derive(Clone, Debug)]
pub struct CameraRig {
    root: PrimPath,
}

impl CameraRig {
    pub fn new() -> SceneResult<Self> {
        Ok(Self::with_root(PrimPath::new("/World/Cameras")?))
    }

    pub fn with_root(root: PrimPath) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PrimPath {
        &self.root
    }

    /// Define a camera at `<root>/<name>`.
    ///
    /// With a target the camera gets translate, rotateY, rotateX ops;
    /// otherwise only a translate op.
    pub fn add_camera(&self, stage: &mut Stage, params: &CameraParams) -> SceneResult<PrimPath> {
        validate_camera(params)?;

        let path = self.root.child(&params.name)?;
        let camera = stage.define_prim(&path, "Camera")?;

        camera.set("projection", Value::token(params.projection.token()))?;
        camera.set("horizontalAperture", params.lens.horizontal_aperture as f32)?;
        camera.set("verticalAperture", params.lens.vertical_aperture as f32)?;
        camera.set("clippingRange", Value::Float2(params.clipping_range))?;
        if params.projection == Projection::Perspective {
            camera.set("focalLength", params.lens.focal_length as f32)?;
        }

        camera.add_xform_op(XformOp::Translate(params.position))?;
        if let Some(target) = params.target {
            let (yaw, pitch) = LookAt::new(params.position, target).angles();
            camera.add_xform_op(XformOp::RotateY(yaw as f32))?;
            camera.add_xform_op(XformOp::RotateX(pitch as f32))?;
        }

        Ok(path)
    }

    /// Define `num_views` cameras evenly spaced on a circle around the target.
    pub fn generate_orbit_cameras(&self, stage: &mut Stage, orbit: &OrbitParams) -> SceneResult<Vec<PrimPath>> {
        if orbit.num_views == 0 {
            log::warn!("Orbit '{}' has no views; no cameras created", orbit.prefix);
            return Ok(Vec::new());
        }
        check_positive("orbit radius", orbit.radius)?;

        let lens = Lens {
            focal_length: orbit.focal_length,
            ..Lens::default()
        };
        ring_positions(orbit.target, orbit.radius, orbit.height, orbit.num_views)
            .into_iter()
            .enumerate()
            .map(|(i, position)| {
                let params = CameraParams {
                    name: format!("{}_{}", orbit.prefix, i),
                    position,
                    target: Some(orbit.target),
                    lens,
                    ..CameraParams::default()
                };
                self.add_camera(stage, &params)
            })
            .collect()
    }
}

fn validate_camera(params: &CameraParams) -> SceneResult<()> {
    check_positive("focal length", params.lens.focal_length)?;
    check_positive("horizontal aperture", params.lens.horizontal_aperture)?;
    check_positive("vertical aperture", params.lens.vertical_aperture)?;

    let [near, far] = params.clipping_range;
    if !(near > 0.0 && far > near) {
        return Err(SceneError::InvalidParameter(format!(
            "clipping range must satisfy 0 < near < far, got ({}, {})",
            near, far
        )));
    }
    if params.target == Some(params.position) {
        return Err(SceneError::InvalidParameter(format!(
            "camera '{}' cannot look at its own position",
            params.name
        )));
    }
    Ok(())
}

/// Compute calibration metadata for a camera on the stage.
///
/// Unauthored lens attributes use the USD camera schema fallbacks.
pub fn camera_metadata(stage: &Stage, camera: &PrimPath, resolution: [u32; 2]) -> SceneResult<CameraMetadata> {
    let [width, height] = resolution;
    if width == 0 || height == 0 {
        return Err(SceneError::InvalidParameter(format!(
            "resolution must be positive, got {}x{}",
            width, height
        )));
    }

    let prim = stage.typed_prim(camera, "Camera")?;
    let float_attr = |name: &str, fallback: f64| {
        prim.attribute(name)
            .and_then(|a| a.value())
            .and_then(Value::as_f64)
            .unwrap_or(fallback)
    };

    let lens = Lens {
        focal_length: float_attr("focalLength", 50.0),
        horizontal_aperture: float_attr("horizontalAperture", 20.955),
        vertical_aperture: float_attr("verticalAperture", 15.2908),
    };
    let projection = prim
        .attribute("projection")
        .and_then(|a| a.value())
        .and_then(Value::as_str)
        .and_then(Projection::from_token)
        .unwrap_or_default();
    let clipping_range = match prim.attribute("clippingRange").and_then(|a| a.value()) {
        Some(Value::Float2([near, far])) => [*near as f64, *far as f64],
        _ => [1.0, 1_000_000.0],
    };

    let intrinsics = lens.intrinsics(width, height);
    let k = intrinsics.matrix();

    let world = stage.local_to_world(camera, None)?;
    let r = world.rotation_block();
    let t = world.translation().to_array();

    let mut p = [[0.0; 4]; 3];
    for (i, row) in p.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = (0..3)
                .map(|m| k[i][m] * if j < 3 { r[m][j] } else { t[m] })
                .sum();
        }
    }

    Ok(CameraMetadata {
        intrinsic: IntrinsicMetadata {
            focal_length_mm: lens.focal_length,
            horizontal_aperture_mm: lens.horizontal_aperture,
            vertical_aperture_mm: lens.vertical_aperture,
            pixel_size_mm: PixelSize {
                x: intrinsics.pixel_size_x,
                y: intrinsics.pixel_size_y,
            },
            fx: intrinsics.fx,
            fy: intrinsics.fy,
            cx: intrinsics.cx,
            cy: intrinsics.cy,
            skew: intrinsics.skew,
            k,
        },
        extrinsic: ExtrinsicMetadata { r, t },
        projection_matrix: p,
        resolution: Resolution { width, height },
        projection,
        clipping_range,
    })
}

/// Write a camera's metadata as pretty-printed JSON.
pub fn export_camera_metadata<P: AsRef<Path>>(
    stage: &Stage,
    camera: &PrimPath,
    output_path: P,
    resolution: [u32; 2],
) -> SceneResult<CameraMetadata> {
    let metadata = camera_metadata(stage, camera, resolution)?;
    write_camera_metadata(&metadata, output_path)?;
    Ok(metadata)
}

/// Write already computed camera metadata as pretty JSON.
pub fn write_camera_metadata<P: AsRef<Path>>(metadata: &CameraMetadata, output_path: P) -> SceneResult<()> {
    let output_path = output_path.as_ref();
    let json = serde_json::to_string_pretty(metadata)?;

    let io_err = |source| SceneError::Io {
        path: output_path.to_path_buf(),
        source,
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(output_path, json).map_err(io_err)?;

    log::info!("Camera metadata exported to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_default_camera() {
        let mut stage = Stage::new();
        let rig = CameraRig::new().unwrap();
        let path = rig.add_camera(&mut stage, &CameraParams::default()).unwrap();
        assert_eq!(path.as_str(), "/World/Cameras/Camera");

        let cam = stage.prim(&path).unwrap();
        assert_eq!(cam.xform_op_order(), vec!["xformOp:translate"]);
        assert_eq!(
            cam.attribute("xformOp:translate").unwrap().default,
            Some(Value::Double3([0.0, 5.0, 15.0]))
        );
        assert_eq!(
            cam.attribute("focalLength").unwrap().default,
            Some(Value::Float(35.0))
        );
        assert_eq!(
            cam.attribute("clippingRange").unwrap().default,
            Some(Value::Float2([0.1, 1000.0]))
        );
    }

    #[test]
    fn test_look_at_ops() {
        let mut stage = Stage::new();
        let rig = CameraRig::new().unwrap();
        let params = CameraParams {
            position: DVec3::new(0.0, 5.0, 15.0),
            target: Some(DVec3::ZERO),
            ..Default::default()
        };
        let path = rig.add_camera(&mut stage, &params).unwrap();
        let cam = stage.prim(&path).unwrap();
        assert_eq!(
            cam.xform_op_order(),
            vec!["xformOp:translate", "xformOp:rotateY", "xformOp:rotateX"]
        );

        let pitch = cam.attribute("xformOp:rotateX").unwrap().value().unwrap().as_f64().unwrap();
        let expected = (-5.0f64 / (250.0f64).sqrt()).asin().to_degrees();
        assert!(approx(pitch, expected));

        // Camera -Z axis points at the target
        let world = stage.local_to_world(&path, None).unwrap();
        let forward = world.transform_vector3(DVec3::NEG_Z).normalize();
        let to_target = (DVec3::ZERO - params.position).normalize();
        assert!((forward - to_target).length() < 1e-5);
    }

    #[test]
    fn test_orthographic_skips_focal_length() {
        let mut stage = Stage::new();
        let rig = CameraRig::new().unwrap();
        let params = CameraParams {
            projection: Projection::Orthographic,
            ..Default::default()
        };
        let path = rig.add_camera(&mut stage, &params).unwrap();
        let cam = stage.prim(&path).unwrap();
        assert!(cam.attribute("focalLength").is_none());
        assert_eq!(
            cam.attribute("projection").unwrap().default,
            Some(Value::token("orthographic"))
        );
    }

    #[test]
    fn test_rejects_invalid_camera() {
        let mut stage = Stage::new();
        let rig = CameraRig::new().unwrap();
        let params = CameraParams {
            clipping_range: [10.0, 1.0],
            ..Default::default()
        };
        assert!(rig.add_camera(&mut stage, &params).is_err());

        let params = CameraParams {
            target: Some(DVec3::new(0.0, 5.0, 15.0)),
            ..Default::default()
        };
        assert!(rig.add_camera(&mut stage, &params).is_err());
    }

    #[test]
    fn test_orbit_cameras() {
        let mut stage = Stage::new();
        let rig = CameraRig::new().unwrap();
        let orbit = OrbitParams {
            num_views: 4,
            ..Default::default()
        };
        let paths = rig.generate_orbit_cameras(&mut stage, &orbit).unwrap();
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[3].as_str(), "/World/Cameras/OrbitCam_3");

        let first = stage.prim(&paths[0]).unwrap();
        let t = first.attribute("xformOp:translate").unwrap().value().unwrap().as_dvec3().unwrap();
        assert!((t - DVec3::new(10.0, 5.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_orbit_without_views() {
        let mut stage = Stage::new();
        let rig = CameraRig::new().unwrap();
        let orbit = OrbitParams {
            num_views: 0,
            ..Default::default()
        };
        assert!(rig.generate_orbit_cameras(&mut stage, &orbit).unwrap().is_empty());
        assert_eq!(stage.prim_count(), 0);
    }

    #[test]
    fn test_metadata_intrinsics() {
        let mut stage = Stage::new();
        let rig = CameraRig::new().unwrap();
        let path = rig.add_camera(&mut stage, &CameraParams::default()).unwrap();
        let meta = camera_metadata(&stage, &path, [512, 512]).unwrap();

        let px = 20.955f32 as f64 / 512.0;
        assert!(approx(meta.intrinsic.pixel_size_mm.x, px));
        assert!(approx(meta.intrinsic.fx, 35.0 / px));
        assert_eq!(meta.intrinsic.cx, 256.0);
        assert_eq!(meta.intrinsic.k[2], [0.0, 0.0, 1.0]);
        assert_eq!(meta.extrinsic.t, [0.0, 5.0, 15.0]);
        assert_eq!(meta.extrinsic.r, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

        // Identity rotation: P's last column is K * T
        assert!(approx(meta.projection_matrix[0][3], 256.0 * 15.0));
        assert!(approx(meta.projection_matrix[2][3], 15.0));
    }

    #[test]
    fn test_metadata_requires_camera() {
        let mut stage = Stage::new();
        let cube = PrimPath::new("/World/Cube").unwrap();
        stage.define_prim(&cube, "Cube").unwrap();
        assert!(camera_metadata(&stage, &cube, [512, 512]).is_err());
    }

    #[test]
    fn test_export_metadata_json() {
        let mut stage = Stage::new();
        let rig = CameraRig::new().unwrap();
        let path = rig.add_camera(&mut stage, &CameraParams::default()).unwrap();

        let out = std::env::temp_dir()
            .join(format!("usdgen_camera_meta_{}", std::process::id()))
            .join("camera.json");
        export_camera_metadata(&stage, &path, &out, [640, 480]).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["resolution"]["width"], 640);
        assert_eq!(json["projection"], "perspective");
        assert!(json["intrinsic"]["K"].is_array());
        assert!(json["extrinsic"]["R"].is_array());

        let _ = std::fs::remove_dir_all(out.parent().unwrap());
    }
}
