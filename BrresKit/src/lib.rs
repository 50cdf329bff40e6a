#![allow(non_snake_case)]
//! # BrresKit
//!
//! A pure-Rust library for GameCube/Wii g3d model data.
//!
//! ## Supported Formats
//!
//! - **MDL0** - BRRES models: bones, vertex buffers, materials, meshes and render trees
//! - **GX registers** - BP/CP/XF register words decoded into fixed-function material state
//! - **Display lists** - GPU command streams for mesh topology and material setup
//! - **RHST** - Token-stream scene trees produced by content exporters
//!
//! ## Quick Start
//!
//! ### Reading a model
//!
//! ```no_run
//! use brreskit::formats::g3d::read_model;
//! use brreskit::transaction::{IoTransaction, TransactionSink};
//!
//! let data = std::fs::read("course.mdl0")?;
//! let mut tx = IoTransaction::new();
//! let model = read_model(&data, &mut tx)?;
//! println!("{}: {} meshes ({:?})", model.name, model.meshes.len(), tx.state());
//! # Ok::<(), brreskit::Error>(())
//! ```
//!
//! ### Rebuilding a model
//!
//! ```no_run
//! use brreskit::formats::g3d::{read_model, write_model};
//! use brreskit::transaction::IoTransaction;
//!
//! let data = std::fs::read("course.mdl0")?;
//! let model = read_model(&data, &mut IoTransaction::new())?;
//! std::fs::write("rebuilt.mdl0", write_model(&model)?)?;
//! # Ok::<(), brreskit::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use brreskit::prelude::*;
//!
//! let model = Model::new("empty");
//! assert!(model.meshes.is_empty());
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `brreskit` command-line binary

#[macro_use]
mod macros;

pub mod error;
pub mod formats;
pub mod transaction;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::transaction::{
        IoMessage, IoTransaction, MessageClass, TransactionSink, TransactionState,
    };

    // MDL0
    pub use crate::formats::g3d::{
        BatchInspectResult, Bone, Dictionary, GenericBuffer, Material, Model, Polygon,
        batch_inspect, find_mdl0_files, read_model, write_model,
    };

    // GX state and display lists
    pub use crate::formats::gpu::{DisplayListHandler, DisplayListWriter, run_display_list};
    pub use crate::formats::gx::{GxMaterial, VertexAttribute, VertexDescriptor};

    // RHST
    pub use crate::formats::rhst::{SceneTree, read_scene_tree, write_scene_tree};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
