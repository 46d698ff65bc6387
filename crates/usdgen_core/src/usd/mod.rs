//! USD scene description for usdgen.
//!
//! This module provides an in-memory stage that is authored prim by prim
//! and exported as USDA (ASCII) text, plus a parser to read USDA back.
//!
//! ## Supported USD Features
//!
//! - Typed and typeless prims with `def`/`over`/`class` specifiers
//! - Attributes (default values, time samples, connections) and relationships
//! - xformOps and `xformOpOrder`
//! - Applied API schemas, references, payloads and `kind`
//! - Variant sets with selections
//! - Layer metadata (`defaultPrim`, `upAxis`, `metersPerUnit`, time range)
//!
//! ## Not Supported
//!
//! - Binary `.usdc` format
//! - Composition: references and payloads are authored, never resolved
//!
//! # Example
//!
//! ```ignore
//! use usdgen_core::usd::{PrimPath, Stage};
//!
//! let mut stage = Stage::new();
//! stage.define_prim(&PrimPath::new("/World")?, "Xform")?;
//! stage.export("scene.usda")?;
//! ```

mod inspect;
mod parser;
mod path;
mod stage;
mod types;
mod value;
mod writer;

pub use inspect::*;
pub use parser::*;
pub use path::*;
pub use stage::*;
pub use types::*;
pub use value::*;
pub use writer::write_stage;
