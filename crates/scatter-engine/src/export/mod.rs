//! Off-screen export at arbitrary resolution.
//!
//! An export never touches the live renderer: it opens its own headless GPU
//! context, stages the cached frame into fresh buffers, draws once through the
//! shared frame pipeline, reads the pixels back and tears the context down.

mod error;

pub use error::ExportError;

use image::RgbaImage;

use crate::coords::{sanitize_dpr, Scales};
use crate::device::GpuContext;
use crate::render::{
    read_rgba8, CachedFrame, DrawStatus, FallbackReason, GpuResources, ModeLatch, PipelineMode,
    PointBuffers, RendererConfig, StageParams, Upload, ViewState,
};

/// Largest export side in physical pixels.
pub const MAX_EXPORT_DIMENSION: u32 = 8192;

/// Largest export area in physical pixels.
pub const MAX_EXPORT_PIXELS: u64 = 268_435_456;

/// Checks a requested export size and returns the physical pixel size.
///
/// `width`/`height` are CSS pixels. The area limit is checked before the
/// per-axis one.
pub fn validate(width: f32, height: f32, dpr: f32) -> Result<(u32, u32), ExportError> {
    let invalid = ExportError::InvalidDimensions { width, height, dpr };
    if ![width, height, dpr].iter().all(|v| v.is_finite() && *v > 0.0) {
        return Err(invalid);
    }

    let pw = (f64::from(width) * f64::from(dpr)).round();
    let ph = (f64::from(height) * f64::from(dpr)).round();
    if pw < 1.0 || ph < 1.0 {
        return Err(invalid);
    }

    let pixels = pw * ph;
    if pixels > MAX_EXPORT_PIXELS as f64 {
        return Err(ExportError::AreaTooLarge { pixels: pixels as u64, max: MAX_EXPORT_PIXELS });
    }

    let (pw, ph) = (pw as u32, ph as u32);
    if pw > MAX_EXPORT_DIMENSION || ph > MAX_EXPORT_DIMENSION {
        return Err(ExportError::DimensionTooLarge { width: pw, height: ph, max: MAX_EXPORT_DIMENSION });
    }
    Ok((pw, ph))
}

/// Everything an export needs, derived from the live frame before any GPU work.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    /// Output size in physical pixels.
    pub physical: (u32, u32),
    pub view: ViewState,
    pub scales: Scales,
    pub stage: StageParams,
}

impl ExportPlan {
    /// Lays `frame` out on a `width`×`height` CSS px canvas.
    ///
    /// Margins and pan offsets follow the width/height ratios against the live
    /// canvas; sprite sizes follow the square root of the area ratio.
    pub fn new(
        frame: &CachedFrame,
        width: f32,
        height: f32,
        dpr: f32,
        max_points: usize,
    ) -> Result<Self, ExportError> {
        let physical = validate(width, height, dpr)?;

        let live = frame.view.config;
        let config = live.resized(width, height);
        let scales = Scales::fit(&frame.points, &config).ok_or(ExportError::NoData)?;

        let sx = ratio(width, live.width);
        let sy = ratio(height, live.height);
        let transform = frame.view.transform.rescaled(sx, sy);

        let view = ViewState {
            scales: Some(scales),
            transform,
            config,
            device_pixel_ratio: sanitize_dpr(dpr),
        };
        let stage = StageParams {
            device_pixel_ratio: view.dpr(),
            size_scale: (sx * sy).sqrt(),
            max_points,
        };

        Ok(Self { physical, view, scales, stage })
    }
}

fn ratio(target: f32, live: f32) -> f32 {
    if live > 0.0 && live.is_finite() { target / live } else { 1.0 }
}

/// Renders cached frames into images using a temporary GPU context.
#[derive(Debug, Clone, Default)]
pub struct ExportRenderer {
    config: RendererConfig,
}

impl ExportRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Draws `frame` at `width`×`height` CSS px and reads it back.
    ///
    /// All size checks run before a GPU context is requested.
    pub fn render_to_image(
        &self,
        frame: Option<&CachedFrame>,
        width: f32,
        height: f32,
        dpr: f32,
    ) -> Result<RgbaImage, ExportError> {
        let frame = frame.ok_or(ExportError::NoData)?;
        let plan = ExportPlan::new(frame, width, height, dpr, self.config.max_points)?;
        let (pw, ph) = plan.physical;
        log::info!("exporting {} points at {pw}x{ph}", frame.points.len());

        let ctx = pollster::block_on(GpuContext::headless(pw, ph, &self.config.gpu))
            .map_err(ExportError::gpu)?;

        let mut buffers = PointBuffers::with_capacity(self.config.initial_capacity);
        let report = buffers.stage(&frame.points, &plan.scales, &plan.stage);

        let mut latch = ModeLatch::new();
        let mut gpu = GpuResources::build(ctx, &mut latch, buffers.capacity()).map_err(ExportError::gpu)?;

        let result = self.draw(&mut gpu, &buffers, report.upload, &plan, frame, &mut latch);
        let image = result.and_then(|()| {
            let ctx = gpu.context();
            let texture = ctx
                .offscreen_texture()
                .ok_or_else(|| ExportError::Gpu("export context has no offscreen target".into()))?;
            read_rgba8(ctx.device(), ctx.queue(), texture).map_err(ExportError::gpu)
        });

        gpu.destroy();
        image
    }

    fn draw(
        &self,
        gpu: &mut GpuResources,
        buffers: &PointBuffers,
        upload: Upload,
        plan: &ExportPlan,
        frame: &CachedFrame,
        latch: &mut ModeLatch,
    ) -> Result<(), ExportError> {
        for attempt in 0..2 {
            match gpu.present(buffers, upload, &plan.view, &frame.options, &self.config, latch) {
                Ok(DrawStatus::Presented(mode)) => {
                    log::debug!("export drawn in {mode:?} mode");
                    return Ok(());
                }
                Ok(DrawStatus::Lost) => return Err(ExportError::Gpu("export context was lost".into())),
                Ok(DrawStatus::SurfaceSkipped) => {
                    return Err(ExportError::Gpu("export target produced no frame".into()));
                }
                Err(err) if attempt == 0 && gpu.mode() == PipelineMode::Gamma => {
                    log::warn!("gamma export failed, retrying direct: {err:#}");
                    latch.fall_back(FallbackReason::RenderFailure);
                    gpu.use_direct().map_err(ExportError::gpu)?;
                }
                Err(err) => return Err(ExportError::gpu(err)),
            }
        }
        Err(ExportError::Gpu("export draw failed".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::coords::{Margin, PlotConfig, ZoomTransform};
    use crate::render::RenderOptions;
    use crate::scene::PointRecord;

    fn frame() -> CachedFrame {
        let points: Arc<[PointRecord]> =
            vec![PointRecord::new(1, 0.0, 0.0, "red"), PointRecord::new(2, 10.0, 5.0, "blue")].into();
        let config = PlotConfig::new(400.0, 300.0).with_margin(Margin::uniform(20.0));
        let view = ViewState::new(Scales::fit(&points, &config), config)
            .with_transform(ZoomTransform::new(10.0, -6.0, 2.0));
        CachedFrame { points, view, options: RenderOptions::default() }
    }

    #[test]
    fn physical_size_rounds_css_times_dpr() {
        assert_eq!(validate(100.0, 50.0, 2.0).ok(), Some((200, 100)));
        assert_eq!(validate(100.4, 50.0, 1.0).ok(), Some((100, 50)));
        assert_eq!(validate(8192.0, 8192.0, 1.0).ok(), Some((8192, 8192)));
    }

    #[test]
    fn rejects_non_positive_and_non_finite_sizes() {
        for (w, h, dpr) in [(0.0, 10.0, 1.0), (10.0, -1.0, 1.0), (10.0, 10.0, f32::NAN), (0.2, 10.0, 1.0)] {
            assert!(
                matches!(validate(w, h, dpr), Err(ExportError::InvalidDimensions { .. })),
                "{w}x{h}@{dpr}"
            );
        }
    }

    #[test]
    fn rejects_a_side_over_the_limit() {
        match validate(9000.0, 100.0, 1.0) {
            Err(ExportError::DimensionTooLarge { width, height, max }) => {
                assert_eq!((width, height, max), (9000, 100, MAX_EXPORT_DIMENSION));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(validate(4100.0, 10.0, 2.0), Err(ExportError::DimensionTooLarge { .. })));
    }

    #[test]
    fn rejects_an_area_over_the_limit() {
        let err = validate(20_000.0, 20_000.0, 1.0).unwrap_err();
        assert!(matches!(err, ExportError::AreaTooLarge { pixels: 400_000_000, .. }));
        assert!(err.to_string().contains("268435456"));
    }

    #[test]
    fn plan_scales_pan_margins_and_sizes() {
        let f = frame();
        let plan = ExportPlan::new(&f, 800.0, 600.0, 1.0, 10).unwrap();
        assert_eq!(plan.physical, (800, 600));
        assert_eq!(plan.view.transform, ZoomTransform::new(20.0, -12.0, 2.0));
        assert_eq!(plan.view.config.margin, Margin::uniform(40.0));
        assert!((plan.stage.size_scale - 2.0).abs() < 1e-6);
        assert_eq!(plan.stage.max_points, 10);

        // The padded data extent fills the new margin box.
        let [x0, _] = plan.scales.project(0.0, 0.0);
        let [x1, _] = plan.scales.project(10.0, 0.0);
        assert!(x0 > 40.0 && x1 < 760.0);
    }

    #[test]
    fn plan_with_uneven_ratios() {
        let f = frame();
        let plan = ExportPlan::new(&f, 800.0, 300.0, 2.0, 10).unwrap();
        assert_eq!(plan.physical, (1600, 600));
        assert_eq!(plan.view.transform, ZoomTransform::new(20.0, -6.0, 2.0));
        assert!((plan.stage.size_scale - 2f32.sqrt()).abs() < 1e-6);
        assert_eq!(plan.stage.device_pixel_ratio, 2.0);
    }

    #[test]
    fn frame_without_finite_points_has_no_data() {
        let mut f = frame();
        f.points = vec![PointRecord::new(1, f64::NAN, 0.0, "red")].into();
        assert!(matches!(ExportPlan::new(&f, 100.0, 100.0, 1.0, 10), Err(ExportError::NoData)));
    }

    #[test]
    fn checks_run_before_any_gpu_work() {
        let exporter = ExportRenderer::default();
        assert!(matches!(exporter.render_to_image(None, 10.0, 10.0, 1.0), Err(ExportError::NoData)));
        let f = frame();
        assert!(matches!(
            exporter.render_to_image(Some(&f), 10_000.0, 10.0, 1.0),
            Err(ExportError::DimensionTooLarge { .. })
        ));
    }
}
