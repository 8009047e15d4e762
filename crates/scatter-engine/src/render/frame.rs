use crate::coords::{sanitize_dpr, PlotConfig, Scales, ZoomTransform};
use crate::paint::Color;
use crate::scene::PointSet;

use super::buffers::Upload;
use super::pipeline::PipelineMode;

/// Everything about the view that the host supplies per frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewState {
    /// Data→pixel scales. Without them nothing is drawn.
    pub scales: Option<Scales>,
    pub transform: ZoomTransform,
    pub config: PlotConfig,
    pub device_pixel_ratio: f32,
}

impl ViewState {
    pub fn new(scales: Option<Scales>, config: PlotConfig) -> Self {
        Self { scales, transform: ZoomTransform::IDENTITY, config, device_pixel_ratio: 1.0 }
    }

    #[inline]
    pub fn with_transform(mut self, transform: ZoomTransform) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn with_device_pixel_ratio(mut self, dpr: f32) -> Self {
        self.device_pixel_ratio = dpr;
        self
    }

    #[inline]
    pub fn dpr(&self) -> f32 {
        sanitize_dpr(self.device_pixel_ratio)
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(None, PlotConfig::default())
    }
}

/// Per-frame switches.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderOptions {
    /// A selection overlay is showing; blending is disabled.
    pub selection_active: bool,
    /// Display-encoded background.
    pub clear_color: Color,
    /// Draw approximate outlines for points that request one.
    pub stroke: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { selection_active: false, clear_color: Color::WHITE, stroke: true }
    }
}

/// Last successfully submitted frame inputs, kept for replay and export.
#[derive(Debug, Clone)]
pub struct CachedFrame {
    pub points: PointSet,
    pub view: ViewState,
    pub options: RenderOptions,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SkipReason {
    /// Waiting for a context restore.
    ContextLost,
    /// No usable GPU; initialization failed.
    Unavailable,
    /// The view carried no scales.
    NoScales,
    /// The presentation target could not provide a frame this time.
    SurfaceUnavailable,
    /// Drawing failed on both pipelines; details were logged.
    RenderFailed,
}

/// What a `render` call did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    Drawn { points: usize, mode: PipelineMode, upload: Upload },
    /// Cleared with nothing to draw.
    Cleared { mode: PipelineMode },
    Skipped(SkipReason),
}

impl FrameOutcome {
    #[inline]
    pub fn is_presented(&self) -> bool {
        matches!(self, FrameOutcome::Drawn { .. } | FrameOutcome::Cleared { .. })
    }

    pub fn mode(&self) -> Option<PipelineMode> {
        match self {
            FrameOutcome::Drawn { mode, .. } | FrameOutcome::Cleared { mode } => Some(*mode),
            FrameOutcome::Skipped(_) => None,
        }
    }
}
