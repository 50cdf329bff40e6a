//! RHST scene trees.
//!
//! RHST is the little-endian token stream emitted by content exporters. A
//! stream holds a `head` dictionary with exporter metadata and a `body`
//! dictionary with bones, materials, meshes and weight matrices.
//!
//! ```no_run
//! use brreskit::formats::rhst::read_scene_tree;
//!
//! let data = std::fs::read("course.rhst")?;
//! let scene = read_scene_tree(&data)?;
//! println!("{} meshes from {}", scene.meshes.len(), scene.meta_data.exporter);
//! # Ok::<(), brreskit::Error>(())
//! ```

pub mod reader;
pub mod token;
pub mod writer;

pub use reader::read_scene_tree;
pub use token::{Token, TokenReader};
pub use writer::{TokenWriter, write_scene_tree};

use glam::{Vec2, Vec3, Vec4};
use serde::Serialize;

use crate::formats::gx::VertexAttribute;
use crate::formats::gx::vertex::VERTEX_ATTRIBUTE_COUNT;

/// Exporter information from the `head` dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetaData {
    pub exporter: String,
    pub format: String,
    pub exporter_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawCall {
    pub mat_index: i32,
    pub poly_index: i32,
    pub prio: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name: String,
    pub parent: i32,
    pub child: i32,
    pub scale: Vec3,
    pub rotate: Vec3,
    pub translate: Vec3,
    pub min: Vec3,
    pub max: Vec3,
    pub draw_calls: Vec<DrawCall>,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: -1,
            child: -1,
            scale: Vec3::ONE,
            rotate: Vec3::ZERO,
            translate: Vec3::ZERO,
            min: Vec3::ZERO,
            max: Vec3::ZERO,
            draw_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum WrapMode {
    #[default]
    Repeat,
    Mirror,
    Clamp,
}

impl WrapMode {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "repeat" => Some(Self::Repeat),
            "mirror" => Some(Self::Mirror),
            "clamp" => Some(Self::Clamp),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Repeat => "repeat",
            Self::Mirror => "mirror",
            Self::Clamp => "clamp",
        }
    }
}

/// Pixel engine preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Alpha tested cutout, spelled `outline` in the stream.
    Clip,
    Translucent,
}

impl AlphaMode {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "opaque" => Some(Self::Opaque),
            "outline" => Some(Self::Clip),
            "translucent" => Some(Self::Translucent),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
            Self::Clip => "outline",
            Self::Translucent => "translucent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    pub texture_name: String,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub show_front: bool,
    pub show_back: bool,
    pub alpha_mode: AlphaMode,
    pub lightset_index: i32,
    pub fog_index: i32,
    pub preset_path_mdl0mat: String,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            texture_name: String::new(),
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            show_front: true,
            show_back: false,
            alpha_mode: AlphaMode::Opaque,
            lightset_index: 0,
            fog_index: 0,
            preset_path_mdl0mat: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Topology {
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "triangles" => Some(Self::Triangles),
            "triangle_strips" => Some(Self::TriangleStrip),
            "triangle_fans" => Some(Self::TriangleFan),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Triangles => "triangles",
            Self::TriangleStrip => "triangle_strips",
            Self::TriangleFan => "triangle_fans",
        }
    }
}

/// A facepoint. Only the attributes named by the mesh's vertex descriptor
/// carry data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub colors: [Vec4; 2],
    pub uvs: [Vec2; 8],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Primitive {
    pub topology: Topology,
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatrixPrimitive {
    pub draw_matrices: Vec<i32>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mesh {
    pub name: String,
    pub current_matrix: i32,
    /// Bit `n` set when `facepoint_format[n]` is nonzero.
    pub vertex_descriptor: u32,
    pub matrix_primitives: Vec<MatrixPrimitive>,
}

impl Mesh {
    /// Attributes carried by each facepoint, in stream order.
    pub fn attributes(&self) -> impl Iterator<Item = VertexAttribute> + '_ {
        VertexAttribute::all().filter(|attr| self.has_attribute(*attr))
    }

    #[must_use]
    pub fn has_attribute(&self, attr: VertexAttribute) -> bool {
        self.vertex_descriptor & (1 << attr as u32) != 0
    }

    /// Total facepoints over every primitive.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.matrix_primitives
            .iter()
            .flat_map(|mp| &mp.primitives)
            .map(|p| p.vertices.len())
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Weight {
    pub bone_index: i32,
    pub influence: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeightMatrix {
    pub weights: Vec<Weight>,
}

/// Everything decoded from one RHST stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneTree {
    pub meta_data: MetaData,
    pub bones: Vec<Bone>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub weights: Vec<WeightMatrix>,
}

/// Number of entries in a mesh's `facepoint_format`.
pub const FACEPOINT_FORMAT_LEN: usize = VERTEX_ATTRIBUTE_COUNT as usize;
