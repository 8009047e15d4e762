use std::sync::Arc;

use super::Shape;

/// Label colors beyond this count are ignored by the pie glyph.
pub const MAX_LABELS: usize = 8;

/// Shared, immutable point list for one frame.
///
/// The renderer keeps the last live list for replay after context loss and for
/// export, so lists are reference counted rather than copied.
pub type PointSet = Arc<[PointRecord]>;

/// Approximate outline request.
///
/// The renderer does not draw true strokes; any positive width enables the
/// edge-darkening effect for the point.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f32,
}

/// One data point with its resolved styling.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    /// Stable identity across frames.
    pub id: u64,
    pub x: f64,
    pub y: f64,
    /// CSS colors, one per annotation label. More than one draws a pie glyph.
    pub colors: Vec<String>,
    pub shape: Shape,
    /// Sprite diameter in CSS pixels.
    pub size: f32,
    /// 0 hides the point entirely.
    pub opacity: f32,
    /// Smaller is nearer; nearer points are painted last.
    pub depth: f32,
    pub stroke: Option<Stroke>,
}

impl PointRecord {
    pub fn new(id: u64, x: f64, y: f64, color: impl Into<String>) -> Self {
        Self {
            id,
            x,
            y,
            colors: vec![color.into()],
            shape: Shape::Circle,
            size: 6.0,
            opacity: 1.0,
            depth: 0.5,
            stroke: None,
        }
    }

    #[inline]
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    #[inline]
    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    #[inline]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    #[inline]
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.colors = colors.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn with_stroke(mut self, color: impl Into<String>, width: f32) -> Self {
        self.stroke = Some(Stroke { color: color.into(), width });
        self
    }

    /// First label color; empty when the point carries no colors (renders white).
    #[inline]
    pub fn primary_color(&self) -> &str {
        self.colors.first().map(String::as_str).unwrap_or("")
    }

    /// Number of label slots the glyph uses, in `1..=MAX_LABELS`.
    #[inline]
    pub fn label_count(&self) -> usize {
        self.colors.len().clamp(1, MAX_LABELS)
    }

    /// Pie glyphs are only drawn for circles.
    #[inline]
    pub fn is_pie(&self) -> bool {
        self.shape == Shape::Circle && self.colors.len() > 1
    }

    /// Zero-opacity points are never uploaded.
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }

    #[inline]
    pub fn has_outline(&self) -> bool {
        self.stroke.as_ref().is_some_and(|s| s.width > 0.0)
    }
}
