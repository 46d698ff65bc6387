//! usdgen Core - Procedural USD scene assembly.
//!
//! This crate provides:
//!
//! - **USD authoring**: an in-memory `Stage`, USDA export and a USDA reader
//! - **Scene building**: geometry primitives, external assets, materials
//! - **Cameras and lights**: look-at cameras, orbit rings, dome and UsdLux lights
//! - **Rendering setup**: render settings, products and vars
//! - **Variants and animation**
//!
//! # Example
//!
//! ```ignore
//! use usdgen_core::scene::{Placement, SceneBuilder};
//! use usdgen_core::usd::PrimPath;
//!
//! let mut builder = SceneBuilder::new()?;
//! builder.add_sphere(&PrimPath::new("/World/Sphere")?, 2.0, &Placement::default())?;
//! builder.save("outputs/scenes/scene.usda")?;
//! ```

pub mod animation;
pub mod camera;
pub mod lighting;
pub mod materials;
pub mod mesh;
pub mod render_settings;
pub mod scene;
pub mod usd;
pub mod variants;

// Re-export commonly used types
pub use camera::{CameraParams, CameraRig, OrbitParams, Projection};
pub use lighting::{DomeLightParams, Environment, LightManager, LightParams, LightType};
pub use materials::{bind_material, MaterialLibrary, MaterialPreset};
pub use mesh::MeshData;
pub use render_settings::RenderSettingsManager;
pub use scene::{resolve_asset, ArcKind, Placement, SceneBuilder, SceneError, SceneResult};
pub use usd::{inspect_usda, PrimPath, Stage, StageError, UpAxis};
