/// Pan/zoom affine applied on the GPU: `screen = p * k + (x, y)`.
///
/// Translation is in CSS pixels. The transform never triggers a restage; it is
/// uploaded as a uniform every frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ZoomTransform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl ZoomTransform {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, k: 1.0 };

    #[inline]
    pub const fn new(x: f32, y: f32, k: f32) -> Self {
        Self { x, y, k }
    }

    #[inline]
    pub fn apply(&self, p: [f32; 2]) -> [f32; 2] {
        [p[0] * self.k + self.x, p[1] * self.k + self.y]
    }

    /// Zooms by `factor` keeping the screen point `anchor` fixed.
    pub fn zoomed_at(&self, anchor: [f32; 2], factor: f32) -> Self {
        let k = (self.k * factor).clamp(0.01, 1000.0);
        let ratio = k / self.k;
        Self {
            x: anchor[0] - (anchor[0] - self.x) * ratio,
            y: anchor[1] - (anchor[1] - self.y) * ratio,
            k,
        }
    }

    #[inline]
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, k: self.k }
    }

    /// Carries the transform to a canvas scaled by `(sx, sy)`.
    ///
    /// The zoom factor is unitless and unchanged; the pan offset moves with the
    /// canvas so the same data lands on the same relative position.
    #[inline]
    pub fn rescaled(&self, sx: f32, sy: f32) -> Self {
        Self { x: self.x * sx, y: self.y * sy, k: self.k }
    }
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_points_alone() {
        assert_eq!(ZoomTransform::IDENTITY.apply([3.0, 4.0]), [3.0, 4.0]);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let t = ZoomTransform::new(10.0, -5.0, 1.5);
        let anchor = [120.0, 80.0];
        let z = t.zoomed_at(anchor, 2.0);

        // The data point under the anchor before zooming stays under it.
        let data = [(anchor[0] - t.x) / t.k, (anchor[1] - t.y) / t.k];
        let after = z.apply(data);
        assert!((after[0] - anchor[0]).abs() < 1e-3);
        assert!((after[1] - anchor[1]).abs() < 1e-3);
        assert_eq!(z.k, 3.0);
    }

    #[test]
    fn rescaled_moves_translation_only() {
        let t = ZoomTransform::new(10.0, 20.0, 2.0).rescaled(2.0, 0.5);
        assert_eq!(t, ZoomTransform::new(20.0, 10.0, 2.0));
    }
}
