mod common;

use scatter_engine::device::{ContextSource, ContextState, GpuContext, HeadlessSource, LossFlag};
use scatter_engine::render::{FrameOutcome, RenderOptions, RendererConfig, ScatterRenderer, SkipReason, Upload};

/// Headless canvas that counts acquisitions and keeps the last context's
/// device-lost flag.
struct CountingSource {
    inner: HeadlessSource,
    acquired: usize,
    loss: Option<LossFlag>,
}

impl CountingSource {
    fn new(side: u32) -> Self {
        Self { inner: HeadlessSource::new(side, side), acquired: 0, loss: None }
    }

    /// Signals loss the way the wgpu device-lost callback does.
    fn lose_device(&self) {
        if let Some(flag) = &self.loss {
            flag.raise();
        }
    }
}

impl ContextSource for CountingSource {
    fn acquire(&mut self) -> anyhow::Result<GpuContext> {
        self.acquired += 1;
        let ctx = self.inner.acquire()?;
        self.loss = Some(ctx.loss_flag().clone());
        Ok(ctx)
    }
}

#[test]
fn lost_context_is_rebuilt_lazily_and_replayed() {
    if !common::gpu_available() {
        return;
    }
    let mut r = ScatterRenderer::new(CountingSource::new(64), RendererConfig::default());
    let points = common::grid(200);
    let view = common::view(&points, 64.0);

    assert!(r.render(&points, &view, RenderOptions::default()).is_presented());
    assert_eq!(r.source().acquired, 1);

    r.on_context_lost();
    assert_eq!(r.state(), ContextState::Lost);
    assert!(!r.has_gpu());
    for _ in 0..3 {
        assert_eq!(
            r.render(&points, &view, RenderOptions::default()),
            FrameOutcome::Skipped(SkipReason::ContextLost)
        );
    }
    assert!(!r.resize(128, 128));
    assert_eq!(r.source().acquired, 1);
    assert_eq!(r.point_count(), 200);

    let mut scheduled = 0;
    assert!(r.on_context_restored(|| scheduled += 1));
    assert_eq!(scheduled, 1);
    // Nothing is rebuilt until the replayed frame asks for it.
    assert_eq!(r.source().acquired, 1);

    match r.replay() {
        Some(FrameOutcome::Drawn { points: 200, upload: Upload::Full, .. }) => {}
        other => panic!("unexpected replay outcome {other:?}"),
    }
    assert_eq!(r.source().acquired, 2);
    assert_eq!(r.state(), ContextState::Live);
}

#[test]
fn mode_latch_survives_a_context_loss() {
    if !common::gpu_available() {
        return;
    }
    let mut r = ScatterRenderer::new(CountingSource::new(32), RendererConfig::default());
    let points = common::grid(10);
    let view = common::view(&points, 32.0);

    let first = r.render(&points, &view, RenderOptions::default()).mode();
    r.on_context_lost();
    r.on_context_restored(|| {});
    let second = r.replay().and_then(|o| o.mode());
    assert_eq!(first, second);
    assert_eq!(r.mode(), first);
}

#[test]
fn identical_frames_skip_upload_and_empty_frames_clear() {
    if !common::gpu_available() {
        return;
    }
    let mut r = ScatterRenderer::new(CountingSource::new(32), RendererConfig::default());
    let points = common::grid(50);
    let view = common::view(&points, 32.0);

    assert!(matches!(
        r.render(&points, &view, RenderOptions::default()),
        FrameOutcome::Drawn { upload: Upload::Full, .. }
    ));
    assert!(matches!(
        r.render(&points, &view, RenderOptions::default()),
        FrameOutcome::Drawn { upload: Upload::None, .. }
    ));

    let empty = common::grid(0);
    let empty_view = common::view(&points, 32.0);
    assert!(matches!(r.render(&empty, &empty_view, RenderOptions::default()), FrameOutcome::Cleared { .. }));
    assert_eq!(r.point_count(), 0);
    assert_eq!(r.capacity(), 1024);
}

#[test]
fn device_lost_signal_short_circuits_into_lost() {
    if !common::gpu_available() {
        return;
    }
    let mut r = ScatterRenderer::new(CountingSource::new(32), RendererConfig::default());
    let points = common::grid(20);
    let view = common::view(&points, 32.0);
    assert!(r.render(&points, &view, RenderOptions::default()).is_presented());

    r.source().lose_device();
    assert_eq!(
        r.render(&points, &view, RenderOptions::default()),
        FrameOutcome::Skipped(SkipReason::ContextLost)
    );
    assert_eq!(r.state(), ContextState::Lost);
    assert!(!r.has_gpu());
    assert_eq!(r.source().acquired, 1);

    assert!(r.on_context_restored(|| {}));
    assert!(matches!(r.replay(), Some(FrameOutcome::Drawn { points: 20, upload: Upload::Full, .. })));
    assert_eq!(r.source().acquired, 2);
}

#[test]
fn device_lost_signal_stops_a_resize() {
    if !common::gpu_available() {
        return;
    }
    let mut r = ScatterRenderer::new(CountingSource::new(32), RendererConfig::default());
    let points = common::grid(20);
    let view = common::view(&points, 32.0);
    r.render(&points, &view, RenderOptions::default());

    r.source().lose_device();
    assert!(!r.resize(64, 64));
    assert_eq!(r.state(), ContextState::Lost);
    assert!(!r.has_gpu());
}

#[test]
fn resize_sets_the_drawable_size_across_renders() {
    if !common::gpu_available() {
        return;
    }
    let mut r = ScatterRenderer::new(CountingSource::new(64), RendererConfig::default());
    let points = common::grid(20);
    let view = common::view(&points, 64.0);

    r.render(&points, &view, RenderOptions::default());
    assert_eq!(r.canvas_size(), Some((64, 64)));

    assert!(r.resize(128, 96));
    assert!(r.render(&points, &view, RenderOptions::default()).is_presented());
    assert_eq!(r.canvas_size(), Some((128, 96)));
    let image = r.read_pixels().unwrap();
    assert_eq!(image.dimensions(), (128, 96));
}

#[test]
fn resize_before_the_first_frame_applies_on_build() {
    if !common::gpu_available() {
        return;
    }
    let mut r = ScatterRenderer::new(CountingSource::new(64), RendererConfig::default());
    assert!(r.resize(48, 80));
    assert_eq!(r.source().acquired, 0);

    let points = common::grid(20);
    let view = common::view(&points, 64.0);
    assert!(r.render(&points, &view, RenderOptions::default()).is_presented());
    assert_eq!(r.read_pixels().unwrap().dimensions(), (48, 80));
}

#[test]
fn zero_sized_canvas_skips_without_falling_back() {
    if !common::gpu_available() {
        return;
    }
    let mut r = ScatterRenderer::new(CountingSource::new(32), RendererConfig::default());
    let points = common::grid(20);
    let view = common::view(&points, 32.0);
    let mode = r.render(&points, &view, RenderOptions::default()).mode();
    let reason = r.fallback_reason();

    assert!(r.resize(0, 0));
    assert_eq!(
        r.render(&points, &view, RenderOptions::default()),
        FrameOutcome::Skipped(SkipReason::SurfaceUnavailable)
    );
    assert_eq!(r.mode(), mode);
    assert_eq!(r.fallback_reason(), reason);

    assert!(r.resize(32, 32));
    assert_eq!(r.render(&points, &view, RenderOptions::default()).mode(), mode);
}
