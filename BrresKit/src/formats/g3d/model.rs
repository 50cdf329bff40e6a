//! In-memory MDL0 model.

use glam::{Vec2, Vec3};
use serde::Serialize;

use super::bone::Bone;
use super::buffer::{BufferKind, GenericBuffer, VertexQuantization};
use super::material::Material;
use super::polygon::{BufferPools, Polygon};
use crate::formats::gx::{Aabb, Color};

hw_enum! {
    /// How bone scale is inherited.
    #[derive(Default)]
    pub enum ScalingRule {
        #[default]
        Standard = 0,
        Softimage = 1,
        Maya = 2,
    }
}

hw_enum! {
    /// Texture matrix convention of the authoring tool.
    #[derive(Default)]
    pub enum TextureMatrixMode {
        #[default]
        Maya = 0,
        Softimage = 1,
        Max = 2,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum EnvelopeMatrixMode {
        #[default]
        Normal = 0,
        Approximation = 1,
        Precision = 2,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelInfo {
    pub scaling_rule: ScalingRule,
    pub texture_matrix_mode: TextureMatrixMode,
    pub envelope_matrix_mode: EnvelopeMatrixMode,
    /// Path of the file the model was exported from.
    pub source_location: String,
    pub aabb: Aabb,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Model {
    pub name: String,
    pub info: ModelInfo,
    pub bones: Vec<Bone>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Polygon>,
    pub positions: Vec<GenericBuffer<Vec3>>,
    pub normals: Vec<GenericBuffer<Vec3>>,
    pub colors: Vec<GenericBuffer<Color>>,
    pub texcoords: Vec<GenericBuffer<Vec2>>,
}

impl Model {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Names of the buffers in one pool, in pool order.
    #[must_use]
    pub fn buffer_names(&self, kind: BufferKind) -> Vec<&str> {
        match kind {
            BufferKind::Position => self.positions.iter().map(|b| b.name.as_str()).collect(),
            BufferKind::Normal => self.normals.iter().map(|b| b.name.as_str()).collect(),
            BufferKind::Color => self.colors.iter().map(|b| b.name.as_str()).collect(),
            BufferKind::TexCoord => self.texcoords.iter().map(|b| b.name.as_str()).collect(),
        }
    }

    /// Pool index of the buffer called `name`.
    #[must_use]
    pub fn buffer_index(&self, kind: BufferKind, name: &str) -> Option<usize> {
        self.buffer_names(kind).iter().position(|n| *n == name)
    }

    /// Total (vertex, triangle) counts over every mesh.
    #[must_use]
    pub fn stats(&self) -> (usize, usize) {
        self.meshes.iter().map(Polygon::stats).fold((0, 0), |(v, t), (mv, mt)| (v + mv, t + mt))
    }

    /// Bounds of every position buffer.
    #[must_use]
    pub fn compute_bounds(&self) -> Aabb {
        let mut bounds: Option<Aabb> = None;
        for buffer in &self.positions {
            let Some(b) = Aabb::from_points(buffer.entries.iter()) else {
                continue;
            };
            match bounds.as_mut() {
                Some(acc) => acc.expand_bound(&b),
                None => bounds = Some(b),
            }
        }
        bounds.unwrap_or_default()
    }
}

impl BufferPools for Model {
    fn buffer_at(&self, kind: BufferKind, index: usize) -> Option<(&str, VertexQuantization)> {
        match kind {
            BufferKind::Position => self.positions.get(index).map(|b| (b.name.as_str(), b.quantize)),
            BufferKind::Normal => self.normals.get(index).map(|b| (b.name.as_str(), b.quantize)),
            BufferKind::Color => self.colors.get(index).map(|b| (b.name.as_str(), b.quantize)),
            BufferKind::TexCoord => self.texcoords.get(index).map(|b| (b.name.as_str(), b.quantize)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::g3d::buffer::VertexFormat;
    use crate::formats::gx::ComponentType;

    fn positions(name: &str, points: &[Vec3]) -> GenericBuffer<Vec3> {
        let q = VertexQuantization::new(
            BufferKind::Position,
            1,
            VertexFormat::Generic(ComponentType::F32),
            0,
        );
        let mut buffer = GenericBuffer::new(name, q);
        buffer.entries = points.to_vec();
        buffer
    }

    #[test]
    fn test_buffer_lookup() {
        let mut model = Model::new("m");
        model.positions.push(positions("a", &[Vec3::ZERO]));
        model.positions.push(positions("b", &[Vec3::ONE]));
        assert_eq!(model.buffer_index(BufferKind::Position, "b"), Some(1));
        assert_eq!(model.buffer_index(BufferKind::Normal, "b"), None);
        assert_eq!(model.buffer_at(BufferKind::Position, 0).map(|(n, _)| n), Some("a"));
    }

    #[test]
    fn test_bounds_span_all_buffers() {
        let mut model = Model::new("m");
        model.positions.push(positions("a", &[Vec3::new(-1.0, 0.0, 0.0)]));
        model.positions.push(positions("b", &[Vec3::new(0.0, 2.0, 3.0)]));
        let bounds = model.compute_bounds();
        assert_eq!(bounds.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(0.0, 2.0, 3.0));
    }
}
