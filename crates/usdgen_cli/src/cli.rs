// cli.rs - Command-line interface definition
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::SceneConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "usdgen")]
#[command(about = "Procedural USDA scene assembly", long_about = None, version)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Assemble a scene and write it as USDA
    Build(BuildArgs),
    /// Summarise an existing USDA file
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Extra TOML config layered over config/default.toml and config/user.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding default.toml and user.toml
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Output scene path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// HDRI environment map for the dome light
    #[arg(long)]
    pub hdri: Option<PathBuf>,

    /// Dome light intensity
    #[arg(long)]
    pub hdri_intensity: Option<f32>,

    /// Camera position as X,Y,Z
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    pub camera_position: Option<[f64; 3]>,

    /// Point the camera looks at, as X,Y,Z
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    pub camera_target: Option<[f64; 3]>,

    /// Lens focal length in mm
    #[arg(long, conflicts_with = "fov")]
    pub focal_length: Option<f64>,

    /// Horizontal field of view in degrees
    #[arg(long)]
    pub fov: Option<f64>,

    /// Print the USDA text after saving
    #[arg(long)]
    pub print: bool,
}

impl BuildArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut SceneConfig) {
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if self.print {
            config.output.print = true;
        }
        if let Some(hdri) = &self.hdri {
            config.environment.hdri = Some(hdri.clone());
        }
        if let Some(intensity) = self.hdri_intensity {
            config.environment.intensity = intensity;
        }
        if let Some(position) = self.camera_position {
            config.camera.position = position;
        }
        if let Some(target) = self.camera_target {
            config.camera.target = Some(target);
        }
        // A lens given on the command line replaces whichever the config used
        if let Some(focal_length) = self.focal_length {
            config.camera.focal_length = Some(focal_length);
            config.camera.fov = None;
        }
        if let Some(fov) = self.fov {
            config.camera.fov = Some(fov);
            config.camera.focal_length = None;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// USDA file to read
    pub file: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse `X,Y,Z` into three floats.
pub fn parse_vec3(s: &str) -> Result<[f64; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected X,Y,Z but got '{}'", s));
    }
    let mut v = [0.0; 3];
    for (slot, part) in v.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", part))?;
        if !slot.is_finite() {
            return Err(format!("'{}' is not a finite number", part));
        }
    }
    Ok(v)
}
