//! The scene assembly pipeline behind `usdgen build`.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use usdgen_core::animation::{animate_camera_path, generate_orbit_path};
use usdgen_core::camera::{camera_metadata, write_camera_metadata, CameraRig, OrbitParams};
use usdgen_core::lighting::{DomeLightParams, Environment, LightManager};
use usdgen_core::materials::MaterialLibrary;
use usdgen_core::render_settings::RenderSettingsManager;
use usdgen_core::scene::{resolve_asset, ArcKind, Placement, SceneBuilder};
use usdgen_core::usd::PrimPath;
use usdgen_math::DVec3;

use crate::config::{GeometryKind, SceneConfig};

/// A built scene before it is written.
#[derive(Debug)]
pub struct AssembledScene {
    pub builder: SceneBuilder,
    /// The main camera
    pub camera: PrimPath,
}

/// What a build wrote to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub output: PathBuf,
    pub camera: PrimPath,
    pub prim_count: usize,
    pub metadata: Option<PathBuf>,
}

/// Assemble the scene in memory.
///
/// The HDRI is resolved first, so a missing file fails before anything
/// else happens.
pub fn assemble(config: &SceneConfig) -> Result<AssembledScene> {
    let hdri = config
        .environment
        .hdri
        .as_ref()
        .map(|path| resolve_asset(path).with_context(|| format!("HDRI not usable: {}", path.display())))
        .transpose()?;

    let mut builder = SceneBuilder::with_settings(config.stage.up_axis, config.stage.meters_per_unit)
        .context("Failed to initialize stage")?;

    // Materials
    let mut materials = BTreeMap::new();
    if !config.materials.is_empty() {
        let library = MaterialLibrary::new(builder.stage_mut())?;
        for material in &config.materials {
            let path = library
                .create_preset(builder.stage_mut(), &material.name, &material.preset)
                .with_context(|| format!("Failed to create material '{}'", material.name))?;
            materials.insert(material.name.clone(), path);
        }
    }

    // Geometry
    for geometry in &config.geometry {
        let path = builder
            .world()
            .child(&geometry.name)
            .with_context(|| format!("Invalid geometry name '{}'", geometry.name))?;

        let mut placement = Placement::at(DVec3::from(geometry.position));
        if let Some(material) = &geometry.material {
            let material_path = match materials.get(material) {
                Some(path) => path.clone(),
                None => PrimPath::new(material)
                    .with_context(|| format!("Unknown material '{}' on {}", material, path))?,
            };
            placement = placement.with_material(material_path);
        }

        let result = match &geometry.kind {
            GeometryKind::Sphere { radius } => builder.add_sphere(&path, *radius, &placement),
            GeometryKind::Cube { size } => builder.add_cube(&path, *size, &placement),
            GeometryKind::Plane { size } => builder.add_plane(&path, *size, &placement),
            GeometryKind::Reference { asset, payload } => {
                let arc = if *payload { ArcKind::Payload } else { ArcKind::Reference };
                builder.add_external_asset(&path, asset, arc, &placement)
            }
        };
        result.with_context(|| format!("Failed to add {}", path))?;
    }

    // Cameras
    let rig = CameraRig::new()?;
    let camera = rig
        .add_camera(builder.stage_mut(), &config.camera.to_params())
        .context("Failed to add camera")?;

    let look_target = config.camera.target.map(DVec3::from).unwrap_or(DVec3::ZERO);
    if config.orbit.enabled {
        let orbit = OrbitParams {
            target: config.orbit.target.map(DVec3::from).unwrap_or(look_target),
            radius: config.orbit.radius,
            height: config.orbit.height,
            num_views: config.orbit.num_views,
            focal_length: config.orbit.focal_length,
            prefix: config.orbit.prefix.clone(),
        };
        let cameras = rig
            .generate_orbit_cameras(builder.stage_mut(), &orbit)
            .context("Failed to generate orbit cameras")?;
        log::info!("Added {} orbit cameras", cameras.len());
    }

    if config.animation.enabled {
        let animation = &config.animation;
        let center = animation.center.map(DVec3::from).unwrap_or(look_target);
        let path = generate_orbit_path(center, animation.radius, animation.height, animation.start, animation.end)?;
        animate_camera_path(builder.stage_mut(), &camera, &path).context("Failed to animate camera")?;
        builder.stage_mut().metadata.time_codes_per_second = Some(animation.fps);
    }

    // Lights
    if !config.lights.is_empty() {
        let lights = LightManager::new()?;
        for light in &config.lights {
            lights
                .add_light(builder.stage_mut(), &light.name, &light.to_params())
                .with_context(|| format!("Failed to add light '{}'", light.name))?;
        }
    }

    let dome = DomeLightParams {
        texture: hdri,
        intensity: config.environment.intensity,
        rotation_y: config.environment.rotation_y,
        ..Default::default()
    };
    Environment::new()?
        .add_dome_light(builder.stage_mut(), &dome)
        .context("Failed to add dome light")?;

    // Render settings
    if config.render.enabled {
        let render = RenderSettingsManager::new(builder.stage_mut())?;
        let mut vars = Vec::new();
        for var in &config.render.vars {
            vars.push(render.create_render_var(
                builder.stage_mut(),
                &var.name,
                &var.source_name,
                &var.data_type,
                var.source_type.as_deref(),
            )?);
        }

        let mut products = Vec::new();
        if let Some(product_path) = &config.render.product_path {
            products.push(render.create_render_product(builder.stage_mut(), "Product", &camera, product_path, &vars)?);
        }
        render
            .create_basic_render_settings(builder.stage_mut(), "Settings", &camera, config.render.resolution, &products)
            .context("Failed to create render settings")?;
    }

    Ok(AssembledScene { builder, camera })
}

/// Assemble the scene, write it and any camera metadata.
///
/// Camera metadata is computed before anything is saved. If the metadata
/// file cannot be written the scene file is removed again, so a failed
/// build leaves no scene behind.
pub fn run_build(config: &SceneConfig) -> Result<BuildReport> {
    let AssembledScene { builder, camera } = assemble(config)?;

    let metadata = match &config.metadata.path {
        Some(path) => {
            let metadata = camera_metadata(builder.stage(), &camera, config.metadata.resolution)
                .context("Failed to compute camera metadata")?;
            Some((path, metadata))
        }
        None => None,
    };

    let output = &config.output.path;
    builder
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some((path, metadata)) = &metadata {
        if let Err(e) = write_camera_metadata(metadata, path) {
            if let Err(remove_err) = fs::remove_file(output) {
                log::warn!("Could not remove {}: {}", output.display(), remove_err);
            }
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to export camera metadata to {}", path.display())));
        }
    }
    let metadata = metadata.map(|(path, _)| path.clone());

    if config.output.print {
        println!("{}", builder.to_usda());
    }

    Ok(BuildReport {
        output: output.clone(),
        camera,
        prim_count: builder.stage().prim_count(),
        metadata,
    })
}
