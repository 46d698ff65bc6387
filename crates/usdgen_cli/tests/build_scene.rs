//! Integration tests for scene assembly
//!
//! Each test builds into its own scratch directory and reads the result
//! back with the USDA reader.

use std::fs;
use std::path::PathBuf;

use usdgen_cli::assemble::{assemble, run_build};
use usdgen_cli::config::{
    GeometryConfig, GeometryKind, LightConfig, MaterialConfig, RenderVarConfig, SceneConfig,
};
use usdgen_core::lighting::LightType;
use usdgen_core::materials::MaterialPreset;
use usdgen_core::usd::{inspect_usda, read_usda};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("usdgen_it_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn config_writing_to(path: PathBuf) -> SceneConfig {
    let mut config = SceneConfig::default();
    config.output.path = path;
    config
}

#[test]
fn test_build_produces_scene_file() {
    let dir = scratch_dir("produces");
    let output = dir.join("scene.usda");
    let report = run_build(&config_writing_to(output.clone())).unwrap();

    assert_eq!(report.output, output);
    assert_eq!(report.camera.as_str(), "/World/Cameras/Camera");
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("#usda 1.0\n"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_exact_prim_counts() {
    let dir = scratch_dir("counts");
    let output = dir.join("scene.usda");

    let mut config = config_writing_to(output.clone());
    config.geometry = vec![
        GeometryConfig::default(),
        GeometryConfig {
            name: "Box".to_string(),
            kind: GeometryKind::Cube { size: 2.0 },
            position: [3.0, 1.0, 0.0],
            material: None,
        },
        GeometryConfig {
            name: "Ground".to_string(),
            kind: GeometryKind::Plane { size: 10.0 },
            position: [0.0, 0.0, 0.0],
            material: None,
        },
    ];
    run_build(&config).unwrap();

    let summary = inspect_usda(&output).unwrap();
    assert_eq!(summary.cameras.len(), 1);
    assert_eq!(summary.dome_light_count(), 1);
    assert_eq!(summary.lights.len(), 1);
    assert_eq!(summary.geometry.len(), 3);
    assert_eq!(summary.triangle_count, 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_hdri_writes_nothing() {
    let dir = scratch_dir("missing_hdri");
    let output = dir.join("scenes").join("scene.usda");

    let mut config = config_writing_to(output.clone());
    config.environment.hdri = Some(dir.join("does_not_exist.exr"));

    let err = run_build(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("does_not_exist.exr"));
    assert!(!output.exists());
    assert!(!dir.join("scenes").exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_hdri_with_asset_delimiter_writes_nothing() {
    let dir = scratch_dir("hdri_at");
    let hdri = dir.join("studio@2k.exr");
    fs::write(&hdri, b"exr").unwrap();
    let output = dir.join("scenes").join("scene.usda");

    let mut config = config_writing_to(output.clone());
    config.environment.hdri = Some(hdri);

    let err = run_build(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("studio@2k.exr"));
    assert!(!output.exists());
    assert!(!dir.join("scenes").exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_bad_metadata_resolution_writes_no_scene() {
    let dir = scratch_dir("metadata_resolution");
    let output = dir.join("scene.usda");

    let mut config = config_writing_to(output.clone());
    config.metadata.path = Some(dir.join("camera.json"));
    config.metadata.resolution = [0, 512];

    assert!(run_build(&config).is_err());
    assert!(!output.exists());
    assert!(!dir.join("camera.json").exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_metadata_write_failure_removes_scene() {
    let dir = scratch_dir("metadata_write");
    let output = dir.join("scene.usda");
    // A plain file where the metadata directory should go
    let blocker = dir.join("metadata");
    fs::write(&blocker, b"").unwrap();

    let mut config = config_writing_to(output.clone());
    config.metadata.path = Some(blocker.join("camera.json"));

    assert!(run_build(&config).is_err());
    assert!(!output.exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_rebuild_is_byte_identical() {
    let dir = scratch_dir("deterministic");
    let hdri = dir.join("studio.exr");
    fs::write(&hdri, b"not really an exr").unwrap();

    let mut config = config_writing_to(dir.join("a.usda"));
    config.environment.hdri = Some(hdri);
    config.camera.target = Some([0.0, 1.0, 0.0]);
    config.orbit.enabled = true;
    run_build(&config).unwrap();

    config.output.path = dir.join("b.usda");
    run_build(&config).unwrap();

    let a = fs::read(dir.join("a.usda")).unwrap();
    let b = fs::read(dir.join("b.usda")).unwrap();
    assert_eq!(a, b);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_defaults_when_options_omitted() {
    let dir = scratch_dir("defaults");
    let output = dir.join("scene.usda");
    run_build(&config_writing_to(output.clone())).unwrap();

    let summary = inspect_usda(&output).unwrap();
    assert_eq!(summary.default_prim.as_deref(), Some("World"));
    assert_eq!(summary.up_axis.as_deref(), Some("Y"));
    assert_eq!(summary.meters_per_unit, Some(0.01));
    assert!(summary.asset_paths.is_empty());

    let camera = summary.camera("/World/Cameras/Camera").unwrap();
    assert_eq!(camera.position, [0.0, 5.0, 15.0]);

    let layer = read_usda(&output).unwrap();
    let camera = layer.find("/World/Cameras/Camera").unwrap();
    assert!(camera.attribute("xformOp:rotateY").is_none());
    let dome = layer.find("/Environment/DomeLight").unwrap();
    assert!(dome.attribute("inputs:texture:file").is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_hdri_is_absolute_forward_slash_path() {
    let dir = scratch_dir("hdri_path");
    let hdri = dir.join("env.exr");
    fs::write(&hdri, b"exr").unwrap();

    let output = dir.join("scene.usda");
    let mut config = config_writing_to(output.clone());
    config.environment.hdri = Some(hdri.clone());
    run_build(&config).unwrap();

    let summary = inspect_usda(&output).unwrap();
    assert_eq!(summary.asset_paths.len(), 1);
    let asset = &summary.asset_paths[0];
    assert!(!asset.contains('\\'));
    assert!(asset.ends_with("env.exr"));
    assert!(PathBuf::from(asset).is_absolute());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_creates_parents_and_overwrites() {
    let dir = scratch_dir("parents");
    let output = dir.join("deep").join("nested").join("scene.usda");

    let mut config = config_writing_to(output.clone());
    run_build(&config).unwrap();
    assert!(output.exists());

    config.camera.position = [1.0, 2.0, 3.0];
    run_build(&config).unwrap();
    let summary = inspect_usda(&output).unwrap();
    assert_eq!(summary.cameras[0].position, [1.0, 2.0, 3.0]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_full_scene_features() {
    let dir = scratch_dir("full");
    let mut config = config_writing_to(dir.join("scene.usda"));
    config.camera.target = Some([0.0, 1.0, 0.0]);
    config.materials = vec![MaterialConfig {
        name: "Red".to_string(),
        preset: MaterialPreset::Plastic {
            color: Some([1.0, 0.0, 0.0]),
            roughness: None,
        },
    }];
    config.geometry[0].material = Some("Red".to_string());
    config.geometry.push(GeometryConfig {
        name: "Chair".to_string(),
        kind: GeometryKind::Reference {
            asset: "./assets/chair.usd".to_string(),
            payload: false,
        },
        position: [2.0, 0.0, 0.0],
        material: None,
    });
    config.lights = vec![LightConfig {
        name: "Key".to_string(),
        light_type: LightType::Rect,
        intensity: None,
        color: None,
        position: None,
        rotation: None,
        width: None,
        height: None,
        radius: None,
        length: None,
        angle: None,
        shaping: None,
        shadows: None,
    }];
    config.orbit.enabled = true;
    config.orbit.num_views = 4;
    config.animation.enabled = true;
    config.animation.start = 1;
    config.animation.end = 24;
    config.render.enabled = true;
    config.render.product_path = Some(dir.join("renders").join("beauty.exr"));
    config.render.vars = vec![RenderVarConfig {
        name: "Beauty".to_string(),
        source_name: "Ci".to_string(),
        data_type: "color3f".to_string(),
        source_type: Some("raw".to_string()),
    }];
    config.metadata.path = Some(dir.join("metadata").join("camera.json"));

    let report = run_build(&config).unwrap();
    assert!(report.metadata.as_ref().unwrap().exists());

    let summary = inspect_usda(&report.output).unwrap();
    assert_eq!(summary.cameras.len(), 5);
    assert_eq!(summary.lights.len(), 2);
    assert_eq!(summary.materials, vec!["/Materials/Red"]);
    assert_eq!(summary.external_assets.len(), 1);
    assert_eq!(summary.render_settings, vec!["/Render/Settings"]);
    assert_eq!(summary.time_range, Some((1.0, 24.0)));

    let layer = read_usda(&report.output).unwrap();
    let sphere = layer.find("/World/Sphere").unwrap();
    assert_eq!(sphere.api_schemas, vec!["MaterialBindingAPI"]);
    assert_eq!(
        sphere.relationship("material:binding").unwrap().targets,
        vec!["/Materials/Red"]
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_unknown_material_fails() {
    let mut config = SceneConfig::default();
    config.geometry[0].material = Some("Missing".to_string());
    assert!(assemble(&config).is_err());
}
