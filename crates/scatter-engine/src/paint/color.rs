/// Straight-alpha RGBA in display (gamma-encoded) space.
///
/// Point colors arrive as CSS strings and are display-encoded; the gamma path
/// linearizes them on the GPU. `Color` follows the same convention so clear
/// colors and point colors blend consistently in both pipeline modes.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Clamps all channels to [0, 1].
    #[inline]
    pub fn clamped(self) -> Self {
        Self::rgba(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    /// Raises RGB to `gamma`; alpha is untouched.
    ///
    /// With `gamma = 1.0` this is the identity, which is how the direct
    /// pipeline clears.
    #[inline]
    pub fn linearized(self, gamma: f32) -> Self {
        let c = self.clamped();
        Self::rgba(c.r.powf(gamma), c.g.powf(gamma), c.b.powf(gamma), c.a)
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color { r: self.r as f64, g: self.g as f64, b: self.b as f64, a: self.a as f64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linearized_raises_rgb_and_keeps_alpha() {
        let c = Color::rgba(0.5, 1.0, 0.0, 0.25).linearized(2.2);
        assert!((c.r - 0.5f32.powf(2.2)).abs() < 1e-6, "{c:?}");
        assert_eq!((c.g, c.b, c.a), (1.0, 0.0, 0.25));
    }

    #[test]
    fn linearized_clamps_out_of_range_channels() {
        assert_eq!(Color::rgba(-1.0, 2.0, 0.5, 3.0).linearized(1.0), Color::rgba(0.0, 1.0, 0.5, 1.0));
    }

    #[test]
    fn unit_gamma_is_identity() {
        let c = Color::rgba(0.3, 0.6, 0.9, 0.5);
        assert_eq!(c.linearized(1.0), c);
    }
}
