/// Glyph drawn for a point.
///
/// The discriminant is the shape index uploaded to the GPU; it must stay in
/// sync with the `SHAPE_*` constants in `points.wgsl`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u8)]
pub enum Shape {
    #[default]
    Circle = 0,
    Square = 1,
    Diamond = 2,
    TriangleUp = 3,
    TriangleDown = 4,
    Plus = 5,
}

impl Shape {
    pub const ALL: [Shape; 6] = [
        Shape::Circle,
        Shape::Square,
        Shape::Diamond,
        Shape::TriangleUp,
        Shape::TriangleDown,
        Shape::Plus,
    ];

    #[inline]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Out-of-range indices fall back to `Circle`.
    #[inline]
    pub fn from_index(i: u32) -> Self {
        Self::ALL.get(i as usize).copied().unwrap_or(Shape::Circle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        for s in Shape::ALL {
            assert_eq!(Shape::from_index(s.index()), s);
        }
        assert_eq!(Shape::from_index(99), Shape::Circle);
    }
}
