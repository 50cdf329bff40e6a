//! Expansion of indexed primitives into triangles.
//!
//! Strips alternate winding so every emitted triangle keeps the facing the
//! hardware would rasterize.

use super::enums::PrimitiveType;
use super::vertex::{IndexedPrimitive, MatrixPrimitive};

/// Triangles of a primitive as positions into its vertex list.
#[must_use]
pub fn triangle_indices(ty: PrimitiveType, vertex_count: usize) -> Vec<[usize; 3]> {
    let n = vertex_count;
    match ty {
        PrimitiveType::Triangles => (0..n / 3).map(|t| [t * 3, t * 3 + 1, t * 3 + 2]).collect(),
        PrimitiveType::TriangleStrip => (2..n)
            .map(|v| {
                if v % 2 == 1 {
                    [v - 2, v, v - 1]
                } else {
                    [v - 2, v - 1, v]
                }
            })
            .collect(),
        PrimitiveType::TriangleFan => (2..n).map(|v| [0, v - 1, v]).collect(),
        PrimitiveType::Quads | PrimitiveType::Quads2 => (0..n / 4)
            .flat_map(|q| {
                let b = q * 4;
                [[b, b + 1, b + 2], [b, b + 2, b + 3]]
            })
            .collect(),
        PrimitiveType::Lines | PrimitiveType::LineStrip | PrimitiveType::Points => Vec::new(),
    }
}

/// Number of triangles a primitive rasterizes.
#[must_use]
pub fn triangle_count(ty: PrimitiveType, vertex_count: usize) -> usize {
    let n = vertex_count;
    match ty {
        PrimitiveType::Triangles => n / 3,
        PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => n.saturating_sub(2),
        PrimitiveType::Quads | PrimitiveType::Quads2 => (n / 4) * 2,
        PrimitiveType::Lines | PrimitiveType::LineStrip | PrimitiveType::Points => 0,
    }
}

impl IndexedPrimitive {
    #[must_use]
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        triangle_indices(self.ty, self.vertices.len())
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        triangle_count(self.ty, self.vertices.len())
    }
}

/// (vertex count, triangle count) over a set of matrix primitives.
#[must_use]
pub fn primitive_stats(mps: &[MatrixPrimitive]) -> (usize, usize) {
    mps.iter()
        .flat_map(|mp| mp.primitives.iter())
        .fold((0, 0), |(v, t), p| (v + p.vertices.len(), t + p.triangle_count()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_winding_alternates() {
        let tris = triangle_indices(PrimitiveType::TriangleStrip, 5);
        assert_eq!(tris, vec![[0, 1, 2], [1, 3, 2], [2, 3, 4]]);
    }

    #[test]
    fn test_fan_and_quads() {
        assert_eq!(
            triangle_indices(PrimitiveType::TriangleFan, 4),
            vec![[0, 1, 2], [0, 2, 3]]
        );
        assert_eq!(
            triangle_indices(PrimitiveType::Quads, 4),
            vec![[0, 1, 2], [0, 2, 3]]
        );
        assert_eq!(triangle_count(PrimitiveType::Quads2, 8), 4);
    }

    #[test]
    fn test_degenerate_counts() {
        assert_eq!(triangle_count(PrimitiveType::TriangleStrip, 1), 0);
        assert!(triangle_indices(PrimitiveType::Triangles, 2).is_empty());
        assert_eq!(triangle_count(PrimitiveType::Lines, 6), 0);
    }
}
