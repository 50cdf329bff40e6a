//! BRRES g3d MDL0 models.
//!
//! MDL0 is a big-endian container of named sections. Each section is indexed
//! by a [`Dictionary`] and holds records that point at each other through
//! signed offsets.
//!
//! # Reading
//!
//! ```no_run
//! use brreskit::formats::g3d::read_model;
//! use brreskit::transaction::IoTransaction;
//!
//! let data = std::fs::read("model.mdl0")?;
//! let mut tx = IoTransaction::new();
//! let model = read_model(&data, &mut tx)?;
//! println!("{} bones, {} meshes", model.bones.len(), model.meshes.len());
//! # Ok::<(), brreskit::Error>(())
//! ```

pub mod batch;
pub mod bone;
pub mod buffer;
pub mod bytecode;
pub mod dictionary;
mod io;
pub mod material;
pub mod model;
pub mod polygon;
pub mod reader;
pub mod section;
pub mod writer;

pub use batch::{BatchInspectResult, Mdl0Report, batch_inspect, find_mdl0_files, inspect_file};
pub use bone::{Billboard, Bone, DrawCall, link_children, world_matrices};
pub use buffer::{BufferKind, GenericBuffer, VertexElement, VertexFormat, VertexQuantization};
pub use bytecode::{ByteCodeMethod, RenderCommand};
pub use dictionary::{Dictionary, DictionaryNode};
pub use material::{Material, Sampler};
pub use model::{EnvelopeMatrixMode, Model, ModelInfo, ScalingRule, TextureMatrixMode};
pub use polygon::{BufferPools, MeshBuffers, MeshDrawHandler, Polygon};
pub use reader::{read_header, read_model};
pub use writer::{refresh_bounds, write_model};
