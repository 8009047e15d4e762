use std::sync::Arc;

use anyhow::Result;
use winit::window::Window;

use super::{GpuContext, GpuInit};

/// Produces GPU contexts for a renderer.
///
/// The renderer acquires lazily: on first use and again after a context loss.
/// Nothing is acquired while the context is lost. A fresh context starts at
/// the canvas's current size; later changes arrive through the renderer's
/// `resize`.
pub trait ContextSource {
    fn acquire(&mut self) -> Result<GpuContext>;
}

/// Offscreen canvas of a fixed size. Used for tests and batch rendering.
#[derive(Debug, Clone)]
pub struct HeadlessSource {
    size: (u32, u32),
    init: GpuInit,
}

impl HeadlessSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_init(width, height, GpuInit::headless())
    }

    pub fn with_init(width: u32, height: u32, init: GpuInit) -> Self {
        Self { size: (width.max(1), height.max(1)), init }
    }
}

impl ContextSource for HeadlessSource {
    fn acquire(&mut self) -> Result<GpuContext> {
        let (w, h) = self.size;
        pollster::block_on(GpuContext::headless(w, h, &self.init))
    }
}

/// Swapchain of a winit window.
pub struct WindowSource {
    window: Arc<Window>,
    init: GpuInit,
}

impl WindowSource {
    pub fn with_init(window: Arc<Window>, init: GpuInit) -> Self {
        Self { window, init }
    }
}

impl ContextSource for WindowSource {
    fn acquire(&mut self) -> Result<GpuContext> {
        pollster::block_on(GpuContext::for_window(Arc::clone(&self.window), &self.init))
    }
}
