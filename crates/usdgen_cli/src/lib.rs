//! usdgen - assemble USDA scenes from configuration.
//!
//! The `usdgen` binary is a thin wrapper around [`run`]; the pipeline is
//! exposed here so it can be driven from tests.

pub mod assemble;
pub mod cli;
pub mod config;

use anyhow::{Context, Result};
use usdgen_core::usd::{inspect_usda, StageSummary};

use cli::{BuildArgs, Cli, Command, InspectArgs};
use config::SceneConfig;

/// Run a parsed command line.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Build(args) => build(args),
        Command::Inspect(args) => inspect(args),
    }
}

/// Load layered configuration, apply flags and build the scene.
pub fn build(args: &BuildArgs) -> Result<()> {
    let mut config = SceneConfig::layered(&args.config_dir, args.config.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let report = assemble::run_build(&config)?;
    log::info!(
        "Built {} prims, main camera {}",
        report.prim_count,
        report.camera
    );
    if let Some(metadata) = &report.metadata {
        log::info!("Camera metadata: {}", metadata.display());
    }
    Ok(())
}

/// Print a summary of a USDA file.
pub fn inspect(args: &InspectArgs) -> Result<()> {
    let summary = inspect_usda(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&args.file.display().to_string(), &summary);
    }
    Ok(())
}

fn print_summary(name: &str, summary: &StageSummary) {
    println!("=== {} ===", name);
    if let Some(prim) = &summary.default_prim {
        println!("Default prim: {}", prim);
    }
    if let Some(axis) = &summary.up_axis {
        println!("Up axis: {}", axis);
    }
    if let Some(mpu) = summary.meters_per_unit {
        println!("Meters per unit: {}", mpu);
    }
    if let Some((start, end)) = summary.time_range {
        println!("Time range: {} - {}", start, end);
    }
    println!("Prims: {}", summary.prim_count);
    println!("Triangles: {}", summary.triangle_count);

    let sections = [
        ("Cameras", &summary.cameras),
        ("Lights", &summary.lights),
        ("Geometry", &summary.geometry),
        ("External assets", &summary.external_assets),
    ];
    for (title, prims) in sections {
        println!("\n--- {} ({}) ---", title, prims.len());
        for prim in prims {
            println!(
                "  {} {} at ({:.2}, {:.2}, {:.2})",
                prim.type_name, prim.path, prim.position[0], prim.position[1], prim.position[2]
            );
        }
    }

    println!("\n--- Materials ({}) ---", summary.materials.len());
    for material in &summary.materials {
        println!("  {}", material);
    }
    if !summary.render_settings.is_empty() {
        println!("\n--- Render settings ---");
        for settings in &summary.render_settings {
            println!("  {}", settings);
        }
    }
    if !summary.asset_paths.is_empty() {
        println!("\n--- Asset paths ---");
        for asset in &summary.asset_paths {
            println!("  {}", asset);
        }
    }
}
