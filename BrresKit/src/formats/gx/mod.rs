//! GX fixed-function data model.
//!
//! Hardware enums, vertex descriptors and indexed topology, and the
//! semantic material state reconstructed from register writes.

pub mod aabb;
pub mod enums;
pub mod material;
pub mod triangulate;
pub mod vertex;

pub use aabb::Aabb;
pub use enums::*;
pub use material::{
    AlphaComparison, AlphaStage, AlphaTestResult, AttenuationFunction, BlendMode, ChannelControl,
    ChannelData, Color, ColorS10, ColorStage, DstAlpha, GxMaterial, IndirectStage,
    KonstAlphaSel, KonstColorSel, RasOrder, SwapTableEntry, TevIndirect, TevStage, TexCoordGen,
    ZMode,
};
pub use triangulate::{primitive_stats, triangle_count, triangle_indices};
pub use vertex::{
    IndexedPrimitive, IndexedVertex, MatrixPrimitive, VatFormat, VertexAttribute,
    VertexAttributeTable, VertexAttributeType, VertexDescriptor,
};
