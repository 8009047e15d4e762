use crate::device::GpuInit;

use super::buffers::{MAX_POINTS, MIN_CAPACITY};
use super::shape::STROKE_WIDTH;

/// Display gamma used by the gamma-correct path.
pub const GAMMA: f32 = 2.2;

/// Renderer construction parameters.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Lowers the point cap; values above `MAX_POINTS` are ignored.
    pub max_points: usize,
    pub gamma: f32,
    /// Outline band in sprite units.
    pub stroke_width: f32,
    /// Buffers start at this capacity (rounded up to a power of two).
    pub initial_capacity: usize,
    pub gpu: GpuInit,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_points: MAX_POINTS,
            gamma: GAMMA,
            stroke_width: STROKE_WIDTH,
            initial_capacity: MIN_CAPACITY,
            gpu: GpuInit::default(),
        }
    }
}

impl RendererConfig {
    /// Gamma clamped to something `pow` can invert.
    pub(crate) fn effective_gamma(&self) -> f32 {
        if self.gamma.is_finite() && self.gamma > 0.0 { self.gamma } else { GAMMA }
    }
}
