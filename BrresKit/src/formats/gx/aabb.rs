use glam::Vec3;
use serde::Serialize;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Grow to include `other`.
    pub fn expand_bound(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Bounds of a point set; `None` when empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| {
            Self::new(acc.min.min(*p), acc.max.max(*p))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_bound() {
        let mut a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        a.expand_bound(&Aabb::new(Vec3::new(-1.0, 0.5, 0.0), Vec3::new(0.5, 2.0, 0.5)));
        assert_eq!(a.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(a.max, Vec3::new(1.0, 2.0, 1.0));
    }

    #[test]
    fn test_from_points() {
        let pts = [Vec3::new(1.0, -2.0, 3.0), Vec3::new(-1.0, 2.0, 0.0)];
        let b = Aabb::from_points(&pts).unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
        assert!(Aabb::from_points(&[]).is_none());
    }
}
