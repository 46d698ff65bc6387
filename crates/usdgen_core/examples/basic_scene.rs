//! Example: Build a small scene and write it as USDA.
//!
//! Run with: cargo run --example basic_scene -- [output.usda] [hdri.exr]

use std::env;

use usdgen_core::camera::{CameraParams, CameraRig};
use usdgen_core::lighting::{DomeLightParams, Environment};
use usdgen_core::materials::MaterialLibrary;
use usdgen_core::scene::{resolve_asset, Placement, SceneBuilder, SceneResult};
use usdgen_core::usd::{inspect_usda, PrimPath};
use usdgen_math::DVec3;

fn main() -> SceneResult<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let output = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("outputs/scenes/basic_scene.usda");
    let hdri = args.get(2).map(resolve_asset).transpose()?;

    let mut builder = SceneBuilder::new()?;

    let materials = MaterialLibrary::new(builder.stage_mut())?;
    let paint = materials.create_car_paint(builder.stage_mut(), "BluePaint", [0.1, 0.2, 0.8])?;

    let object_position = DVec3::new(0.0, 2.0, 0.0);
    builder.add_sphere(
        &PrimPath::new("/World/CarPaintSphere")?,
        2.0,
        &Placement::at(object_position).with_material(paint),
    )?;
    builder.add_plane(&PrimPath::new("/World/Ground")?, 10.0, &Placement::default())?;

    let camera = CameraParams {
        position: DVec3::new(0.0, 3.0, 10.0),
        target: Some(object_position),
        ..Default::default()
    };
    CameraRig::new()?.add_camera(builder.stage_mut(), &camera)?;

    let dome = DomeLightParams {
        texture: hdri,
        ..Default::default()
    };
    Environment::new()?.add_dome_light(builder.stage_mut(), &dome)?;

    builder.save(output)?;
    println!("Wrote {}", output);

    match inspect_usda(output) {
        Ok(summary) => {
            println!("\n=== {} ===", output);
            println!("Prims: {}", summary.prim_count);
            println!("Cameras: {}", summary.cameras.len());
            println!("Lights: {}", summary.lights.len());
            println!("Geometry: {}", summary.geometry.len());
            println!("Materials: {}", summary.materials.len());
            for cam in &summary.cameras {
                println!(
                    "  {} at ({:.2}, {:.2}, {:.2})",
                    cam.path, cam.position[0], cam.position[1], cam.position[2]
                );
            }
        }
        Err(e) => eprintln!("Failed to read back {}: {}", output, e),
    }

    Ok(())
}
