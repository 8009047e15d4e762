use std::sync::Arc;

use anyhow::Context;
use image::RgbaImage;

use crate::device::{ContextSource, ContextState, Lifecycle};
use crate::export::{ExportError, ExportRenderer};
use crate::scene::{PointRecord, PointSet};

use super::buffers::{PointBuffers, StageParams, StageReport};
use super::config::RendererConfig;
use super::frame::{CachedFrame, FrameOutcome, RenderOptions, SkipReason, ViewState};
use super::pipeline::{FallbackReason, ModeLatch, PipelineMode};
use super::readback;
use super::resources::{DrawStatus, GpuResources};

/// Scatter renderer bound to one canvas.
///
/// GPU state is created lazily from `S` on the first render and again after a
/// context restore. CPU staging, the pipeline mode latch and the last frame's
/// inputs outlive any single context.
///
/// `render` never fails: problems are logged and surface as a
/// [`FrameOutcome`].
pub struct ScatterRenderer<S: ContextSource> {
    source: S,
    config: RendererConfig,
    lifecycle: Lifecycle,
    latch: ModeLatch,
    buffers: PointBuffers,
    gpu: Option<GpuResources>,
    /// Physical size from a `resize` that arrived before any context existed.
    pending_size: Option<(u32, u32)>,
    cached: Option<CachedFrame>,
}

impl<S: ContextSource> ScatterRenderer<S> {
    pub fn new(source: S, config: RendererConfig) -> Self {
        let buffers = PointBuffers::with_capacity(config.initial_capacity);
        Self {
            source,
            config,
            lifecycle: Lifecycle::new(),
            latch: ModeLatch::new(),
            buffers,
            gpu: None,
            pending_size: None,
            cached: None,
        }
    }

    /// Draws `points` with the given view.
    ///
    /// The inputs are cached for [`replay`](Self::replay) and
    /// [`export`](Self::export). While the context is lost nothing is cached and
    /// nothing GPU-related is touched.
    pub fn render(&mut self, points: &PointSet, view: &ViewState, options: RenderOptions) -> FrameOutcome {
        match self.lifecycle.state() {
            ContextState::Lost => return FrameOutcome::Skipped(SkipReason::ContextLost),
            ContextState::Failed => return FrameOutcome::Skipped(SkipReason::Unavailable),
            ContextState::Live => {}
        }
        if self.gpu.as_ref().is_some_and(GpuResources::is_lost) {
            self.handle_loss();
            return FrameOutcome::Skipped(SkipReason::ContextLost);
        }

        self.cached = Some(CachedFrame { points: Arc::clone(points), view: *view, options });
        self.draw(points, view, &options)
    }

    fn draw(&mut self, points: &[PointRecord], view: &ViewState, options: &RenderOptions) -> FrameOutcome {
        let Some(scales) = view.scales else {
            return FrameOutcome::Skipped(SkipReason::NoScales);
        };
        if !self.ensure_gpu() {
            return FrameOutcome::Skipped(SkipReason::Unavailable);
        }

        let params = StageParams {
            device_pixel_ratio: view.dpr(),
            size_scale: 1.0,
            max_points: self.config.max_points,
        };
        let report = self.buffers.stage(points, &scales, &params);

        for attempt in 0..2 {
            let Some(gpu) = self.gpu.as_mut() else { break };
            match gpu.present(&self.buffers, report.upload, view, options, &self.config, &mut self.latch) {
                Ok(DrawStatus::Presented(mode)) => return outcome(&report, mode),
                Ok(DrawStatus::SurfaceSkipped) => {
                    return FrameOutcome::Skipped(SkipReason::SurfaceUnavailable);
                }
                Ok(DrawStatus::Lost) => {
                    self.handle_loss();
                    return FrameOutcome::Skipped(SkipReason::ContextLost);
                }
                Err(err) => {
                    log::error!("frame failed: {err:#}");
                    if attempt > 0 || gpu.mode() == PipelineMode::Direct {
                        break;
                    }
                    self.latch.fall_back(FallbackReason::RenderFailure);
                    if let Err(err) = gpu.use_direct() {
                        log::error!("direct pipeline unavailable: {err:#}");
                        break;
                    }
                }
            }
        }
        FrameOutcome::Skipped(SkipReason::RenderFailed)
    }

    fn ensure_gpu(&mut self) -> bool {
        if self.gpu.is_some() {
            return true;
        }
        let capacity = self.buffers.capacity();
        let built = self.source.acquire().and_then(|ctx| {
            let mut gpu = GpuResources::build(ctx, &mut self.latch, capacity)?;
            if let Some((w, h)) = self.pending_size.take() {
                gpu.resize(w, h, &mut self.latch)?;
            }
            Ok(gpu)
        });
        match built {
            Ok(gpu) => {
                self.gpu = Some(gpu);
                true
            }
            Err(err) => {
                if self.lifecycle.mark_failed() {
                    log::error!("GPU initialization failed, rendering disabled: {err:#}");
                }
                false
            }
        }
    }

    /// Sets the drawable size in physical pixels. Returns `false` while the
    /// context is not live.
    ///
    /// Frames are drawn at this size until the next resize. Without a context
    /// yet, the size is applied when the first render builds one.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.lifecycle.is_live() {
            return false;
        }
        let Some(gpu) = self.gpu.as_mut() else {
            self.pending_size = Some((width, height));
            return true;
        };
        if gpu.is_lost() {
            self.handle_loss();
            return false;
        }
        if let Err(err) = gpu.resize(width, height, &mut self.latch) {
            log::error!("resize to {width}x{height} failed: {err:#}");
            return false;
        }
        true
    }

    /// Host-reported context loss.
    pub fn on_context_lost(&mut self) {
        self.handle_loss();
    }

    /// Host-reported restore. Calls `schedule` once if there is a frame to
    /// replay; the host should then call [`replay`](Self::replay).
    pub fn on_context_restored(&mut self, schedule: impl FnOnce()) -> bool {
        if self.lifecycle.mark_restored(self.cached.is_some()) {
            schedule();
            return true;
        }
        false
    }

    /// Redraws the cached frame after a restore. `None` when no replay is pending.
    pub fn replay(&mut self) -> Option<FrameOutcome> {
        if !self.lifecycle.take_replay() {
            return None;
        }
        let frame = self.cached.clone()?;
        Some(self.render(&frame.points, &frame.view, frame.options))
    }

    fn handle_loss(&mut self) {
        if self.lifecycle.mark_lost() {
            self.reset_gpu();
        }
    }

    /// Drops every GPU handle; CPU staging survives but is re-sent in full.
    pub fn reset_gpu(&mut self) {
        self.gpu = None;
        self.buffers.invalidate();
    }

    /// Releases GPU resources and the cached frame. A later render starts over.
    pub fn dispose(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            gpu.destroy();
        }
        self.buffers.invalidate();
        self.cached = None;
    }

    /// Forces the next render to restage every point.
    ///
    /// Style signatures are sampled; hosts that change colors of unsampled
    /// points in place call this.
    pub fn invalidate_styles(&mut self) {
        self.buffers.invalidate();
    }

    /// Renders the last frame at another size in a separate GPU context.
    pub fn export(&self, width: f32, height: f32, dpr: f32) -> Result<RgbaImage, ExportError> {
        ExportRenderer::new(self.config.clone()).render_to_image(self.cached.as_ref(), width, height, dpr)
    }

    /// Reads the presented pixels back. Offscreen canvases only.
    pub fn read_pixels(&self) -> anyhow::Result<RgbaImage> {
        let gpu = self.gpu.as_ref().context("no GPU context; render first")?;
        let ctx = gpu.context();
        let texture = ctx
            .offscreen_texture()
            .context("window surfaces cannot be read back")?;
        readback::read_rgba8(ctx.device(), ctx.queue(), texture)
    }

    /// Points staged by the last render.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.buffers.count()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffers.capacity()
    }

    /// Latched pipeline mode; `None` before the first context.
    #[inline]
    pub fn mode(&self) -> Option<PipelineMode> {
        self.latch.mode()
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        self.latch.reason()
    }

    #[inline]
    pub fn state(&self) -> ContextState {
        self.lifecycle.state()
    }

    /// `true` while GPU resources exist.
    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    /// Physical size frames are drawn at; `None` until a context exists or a
    /// resize is pending.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.gpu.as_ref().map(|gpu| gpu.context().size()).or(self.pending_size)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn cached_frame(&self) -> Option<&CachedFrame> {
        self.cached.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Builds the context now and makes its first gamma frame fail validation.
    #[cfg(test)]
    fn fail_first_gamma_frame(&mut self) -> bool {
        if !self.ensure_gpu() {
            return false;
        }
        self.gpu.as_mut().is_some_and(GpuResources::fail_first_gamma_frame)
    }
}

fn outcome(report: &StageReport, mode: PipelineMode) -> FrameOutcome {
    if report.count == 0 {
        FrameOutcome::Cleared { mode }
    } else {
        FrameOutcome::Drawn { points: report.count, mode, upload: report.upload }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::coords::{PlotConfig, Scales};
    use crate::device::{GpuContext, GpuInit, HeadlessSource};
    use crate::render::Upload;

    /// Never yields a context and counts attempts.
    struct NoGpu {
        attempts: usize,
    }

    impl ContextSource for NoGpu {
        fn acquire(&mut self) -> anyhow::Result<GpuContext> {
            self.attempts += 1;
            bail!("no adapter")
        }
    }

    fn points() -> PointSet {
        vec![PointRecord::new(1, 0.0, 0.0, "red"), PointRecord::new(2, 1.0, 1.0, "blue")].into()
    }

    fn view(points: &PointSet) -> ViewState {
        let config = PlotConfig::new(64.0, 64.0);
        ViewState::new(Scales::fit(points, &config), config)
    }

    #[test]
    fn missing_scales_skip_before_touching_the_source() {
        let mut r = ScatterRenderer::new(NoGpu { attempts: 0 }, RendererConfig::default());
        let pts = points();
        let out = r.render(&pts, &ViewState::default(), RenderOptions::default());
        assert_eq!(out, FrameOutcome::Skipped(SkipReason::NoScales));
        assert_eq!(r.source().attempts, 0);
        assert!(r.cached_frame().is_some());
    }

    #[test]
    fn init_failure_is_terminal() {
        let mut r = ScatterRenderer::new(NoGpu { attempts: 0 }, RendererConfig::default());
        let pts = points();
        let v = view(&pts);
        assert_eq!(r.render(&pts, &v, RenderOptions::default()), FrameOutcome::Skipped(SkipReason::Unavailable));
        assert_eq!(r.state(), ContextState::Failed);
        assert_eq!(r.render(&pts, &v, RenderOptions::default()), FrameOutcome::Skipped(SkipReason::Unavailable));
        assert_eq!(r.source().attempts, 1);
        assert!(!r.resize(10, 10));
    }

    #[test]
    fn lost_renderer_caches_nothing_and_acquires_nothing() {
        let mut r = ScatterRenderer::new(NoGpu { attempts: 0 }, RendererConfig::default());
        r.on_context_lost();
        assert_eq!(r.state(), ContextState::Lost);

        let pts = points();
        let out = r.render(&pts, &view(&pts), RenderOptions::default());
        assert_eq!(out, FrameOutcome::Skipped(SkipReason::ContextLost));
        assert!(r.cached_frame().is_none());
        assert_eq!(r.source().attempts, 0);
        assert!(!r.resize(32, 32));
    }

    #[test]
    fn restore_without_a_frame_schedules_nothing() {
        let mut r = ScatterRenderer::new(NoGpu { attempts: 0 }, RendererConfig::default());
        r.on_context_lost();
        let mut scheduled = 0;
        assert!(!r.on_context_restored(|| scheduled += 1));
        assert_eq!(scheduled, 0);
        assert_eq!(r.state(), ContextState::Live);
        assert!(r.replay().is_none());
    }

    #[test]
    fn restore_with_a_frame_schedules_one_replay() {
        let mut r = ScatterRenderer::new(NoGpu { attempts: 0 }, RendererConfig::default());
        let pts = points();
        r.render(&pts, &ViewState::default(), RenderOptions::default());
        r.on_context_lost();

        let mut scheduled = 0;
        assert!(r.on_context_restored(|| scheduled += 1));
        assert!(!r.on_context_restored(|| scheduled += 1));
        assert_eq!(scheduled, 1);

        assert_eq!(r.replay(), Some(FrameOutcome::Skipped(SkipReason::NoScales)));
        assert!(r.replay().is_none());
    }

    #[test]
    fn export_without_a_frame_reports_no_data() {
        let r = ScatterRenderer::new(NoGpu { attempts: 0 }, RendererConfig::default());
        assert!(matches!(r.export(100.0, 100.0, 1.0), Err(ExportError::NoData)));
    }

    #[test]
    fn dispose_drops_the_cached_frame() {
        let mut r = ScatterRenderer::new(NoGpu { attempts: 0 }, RendererConfig::default());
        let pts = points();
        r.render(&pts, &ViewState::default(), RenderOptions::default());
        r.dispose();
        assert!(r.cached_frame().is_none());
        assert!(!r.has_gpu());
        assert!(r.read_pixels().is_err());
    }

    #[test]
    fn resize_before_first_render_is_held() {
        let mut r = ScatterRenderer::new(NoGpu { attempts: 0 }, RendererConfig::default());
        assert_eq!(r.canvas_size(), None);
        assert!(r.resize(96, 48));
        assert_eq!(r.canvas_size(), Some((96, 48)));
        assert_eq!(r.source().attempts, 0);
    }

    fn headless_gpu() -> bool {
        pollster::block_on(GpuContext::headless(4, 4, &GpuInit::headless()))
            .map(GpuContext::destroy)
            .is_ok()
    }

    #[test]
    fn failed_gamma_frame_latches_direct_and_retries_once() {
        if !headless_gpu() {
            return;
        }
        let mut r = ScatterRenderer::new(HeadlessSource::new(64, 64), RendererConfig::default());
        if !r.fail_first_gamma_frame() {
            // Adapter without a gamma path.
            return;
        }
        let pts = points();
        let v = view(&pts);

        match r.render(&pts, &v, RenderOptions::default()) {
            FrameOutcome::Drawn { points: 2, mode: PipelineMode::Direct, upload: Upload::Full } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(r.mode(), Some(PipelineMode::Direct));
        assert_eq!(r.fallback_reason(), Some(FallbackReason::RenderFailure));

        r.on_context_lost();
        assert!(r.on_context_restored(|| {}));
        assert_eq!(r.replay().and_then(|o| o.mode()), Some(PipelineMode::Direct));
    }
}
