/// Plot margins in CSS pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Margin {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margin {
    #[inline]
    pub const fn uniform(v: f32) -> Self {
        Self { top: v, right: v, bottom: v, left: v }
    }
}

impl Default for Margin {
    fn default() -> Self {
        Self::uniform(20.0)
    }
}

/// Canvas geometry supplied by the host each frame.
///
/// `width`/`height` are CSS (logical) pixels; the device pixel ratio travels
/// next to it in `ViewState`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlotConfig {
    pub width: f32,
    pub height: f32,
    pub margin: Margin,
}

impl PlotConfig {
    #[inline]
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height, margin: Margin::default() }
    }

    #[inline]
    pub fn with_margin(mut self, margin: Margin) -> Self {
        self.margin = margin;
        self
    }

    /// Drawable extent along x, never negative.
    #[inline]
    pub fn inner_width(&self) -> f32 {
        (self.width - self.margin.left - self.margin.right).max(0.0)
    }

    /// Drawable extent along y, never negative.
    #[inline]
    pub fn inner_height(&self) -> f32 {
        (self.height - self.margin.top - self.margin.bottom).max(0.0)
    }

    /// Same plot laid out on a canvas of another size.
    ///
    /// Horizontal margins follow the width ratio, vertical margins the height
    /// ratio, so the plot area keeps its relative placement.
    pub fn resized(&self, width: f32, height: f32) -> Self {
        let sx = if self.width > 0.0 { width / self.width } else { 1.0 };
        let sy = if self.height > 0.0 { height / self.height } else { 1.0 };
        Self {
            width,
            height,
            margin: Margin {
                top: self.margin.top * sy,
                right: self.margin.right * sx,
                bottom: self.margin.bottom * sy,
                left: self.margin.left * sx,
            },
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

/// Clamps a device pixel ratio to something usable; non-finite or
/// non-positive ratios fall back to 1.
#[inline]
pub fn sanitize_dpr(dpr: f32) -> f32 {
    if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 }
}
