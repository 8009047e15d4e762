use anyhow::Result;

use crate::device::{GpuContext, GpuFrame, SurfaceErrorAction};

use super::buffers::{PointBuffers, Upload};
use super::common::PointUniform;
use super::config::RendererConfig;
use super::ctx::{RenderCtx, RenderTarget};
use super::frame::{RenderOptions, ViewState};
use super::gpu_buffers::GpuPointBuffers;
use super::labels::LABEL_TEXTURE_WIDTH;
use super::pipeline::{DrawParams, FallbackReason, FramePipeline, ModeLatch, PipelineMode};
use super::program::with_validation;
use super::targets::FrameTargets;

/// Result of one [`GpuResources::present`] call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum DrawStatus {
    Presented(PipelineMode),
    /// The surface had no frame to give; try again on the next redraw.
    SurfaceSkipped,
    /// The device went away while drawing.
    Lost,
}

/// Every GPU object tied to one context.
///
/// Live rendering and export both draw through this type, so the two paths
/// share pipeline selection, target management and upload rules. Dropping it
/// releases all handles at once.
pub(crate) struct GpuResources {
    ctx: GpuContext,
    pipeline: FramePipeline,
    /// Gamma mode only.
    targets: Option<FrameTargets>,
    points: GpuPointBuffers,
    /// Nothing uploaded yet; the first present sends every stream.
    fresh: bool,
    /// A gamma frame was submitted without validation errors.
    gamma_verified: bool,
    #[cfg(test)]
    fail_gamma_check: bool,
}

impl GpuResources {
    /// Builds pipelines for `ctx` in the mode the latch allows.
    ///
    /// A gamma pipeline that fails to build latches Direct and retries once.
    pub fn build(ctx: GpuContext, latch: &mut ModeLatch, capacity: usize) -> Result<Self> {
        let caps = ctx.capabilities();
        log::info!("rendering on '{}' ({:?})", caps.adapter_name, caps.backend);

        let mode = latch.decide(caps.supports_gamma());
        let pipeline = match FramePipeline::build(ctx.device(), ctx.format(), mode) {
            Ok(pipeline) => pipeline,
            Err(err) if mode == PipelineMode::Gamma => {
                log::warn!("gamma pipeline unavailable: {err:#}");
                latch.fall_back(FallbackReason::PipelineCreation);
                FramePipeline::build(ctx.device(), ctx.format(), PipelineMode::Direct)?
            }
            Err(err) => return Err(err),
        };
        let points = GpuPointBuffers::new(ctx.device(), capacity);

        Ok(Self {
            ctx,
            pipeline,
            targets: None,
            points,
            fresh: true,
            gamma_verified: false,
            #[cfg(test)]
            fail_gamma_check: false,
        })
    }

    #[inline]
    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    #[inline]
    pub fn mode(&self) -> PipelineMode {
        self.pipeline.mode()
    }

    pub fn is_lost(&self) -> bool {
        self.ctx.is_lost()
    }

    /// Resizes the presentation target and, in Gamma mode, the linear targets.
    pub fn resize(&mut self, width: u32, height: u32, latch: &mut ModeLatch) -> Result<()> {
        self.ctx.resize(width, height);
        self.sync_targets(latch)
    }

    /// Switches to the direct pipeline and releases gamma-only resources.
    pub fn use_direct(&mut self) -> Result<()> {
        if let Some(targets) = self.targets.take() {
            targets.destroy();
        }
        if self.pipeline.mode() == PipelineMode::Direct {
            return Ok(());
        }
        self.pipeline = FramePipeline::build(self.ctx.device(), self.ctx.format(), PipelineMode::Direct)?;
        Ok(())
    }

    /// Brings offscreen targets in line with the mode and canvas size.
    fn sync_targets(&mut self, latch: &mut ModeLatch) -> Result<()> {
        if latch.mode() == Some(PipelineMode::Direct) || self.pipeline.mode() == PipelineMode::Direct {
            return self.use_direct();
        }

        let (w, h) = self.ctx.size();
        // Minimized; keep what exists until a real size arrives.
        if w == 0 || h == 0 || self.targets.as_ref().is_some_and(|t| t.matches(w, h)) {
            return Ok(());
        }
        if let Some(old) = self.targets.take() {
            old.destroy();
        }
        match FrameTargets::create(self.ctx.device(), w, h) {
            Ok(targets) => {
                log::debug!("linear targets {w}x{h}");
                self.targets = Some(targets);
                Ok(())
            }
            Err(err) => {
                log::warn!("linear targets {w}x{h} unavailable: {err:#}");
                latch.fall_back(FallbackReason::TargetCreation);
                self.use_direct()
            }
        }
    }

    /// Uploads what `upload` names and draws one frame at the context's size.
    ///
    /// The first gamma frame runs inside a validation scope; an error there is
    /// returned so the caller can fall back to Direct.
    pub fn present(
        &mut self,
        cpu: &PointBuffers,
        upload: Upload,
        view: &ViewState,
        options: &RenderOptions,
        config: &RendererConfig,
        latch: &mut ModeLatch,
    ) -> Result<DrawStatus> {
        if self.ctx.is_lost() {
            return Ok(DrawStatus::Lost);
        }

        self.sync_targets(latch)?;

        let reallocated = self.points.ensure_capacity(self.ctx.device(), cpu.capacity());
        let upload = if reallocated || std::mem::take(&mut self.fresh) { Upload::Full } else { upload };
        self.points.upload(self.ctx.queue(), cpu, upload);

        let (w, h) = self.ctx.size();
        if w == 0 || h == 0 {
            return Ok(DrawStatus::SurfaceSkipped);
        }

        let frame = match self.ctx.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                return Ok(match self.ctx.handle_surface_error(err) {
                    SurfaceErrorAction::ContextLost => DrawStatus::Lost,
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        DrawStatus::SurfaceSkipped
                    }
                });
            }
        };

        let mode = self.pipeline.mode();
        let gamma = config.effective_gamma();
        let t = view.transform;
        let params = DrawParams {
            count: cpu.count() as u32,
            uniform: PointUniform {
                viewport: [w as f32, h as f32],
                translate: [t.x, t.y],
                scale: t.k,
                dpr: view.dpr(),
                gamma: mode.blend_gamma(gamma),
                stroke_width: if options.stroke { config.stroke_width.max(0.0) } else { 0.0 },
                label_tex_width: LABEL_TEXTURE_WIDTH,
                _pad: [0; 3],
            },
            clear_color: options.clear_color,
            selection_active: options.selection_active,
            gamma,
        };

        #[cfg(test)]
        let fail_check = std::mem::take(&mut self.fail_gamma_check);
        let Self { ctx, pipeline, targets, points, gamma_verified, .. } = self;
        if mode == PipelineMode::Gamma && !*gamma_verified {
            with_validation(ctx.device(), "gamma frame", || {
                #[cfg(test)]
                if fail_check {
                    create_invalid_texture(ctx.device());
                }
                encode_and_submit(ctx, pipeline, targets.as_ref(), points, frame, &params)
            })??;
            *gamma_verified = true;
        } else {
            encode_and_submit(ctx, pipeline, targets.as_ref(), points, frame, &params)?;
        }

        if ctx.is_lost() {
            return Ok(DrawStatus::Lost);
        }
        Ok(DrawStatus::Presented(mode))
    }

    /// Makes the next validated gamma frame record a validation error.
    /// Returns `false` when no such frame is still to come.
    #[cfg(test)]
    pub fn fail_first_gamma_frame(&mut self) -> bool {
        self.fail_gamma_check = self.mode() == PipelineMode::Gamma && !self.gamma_verified;
        self.fail_gamma_check
    }

    /// Releases GPU memory now instead of on drop.
    pub fn destroy(self) {
        if let Some(targets) = self.targets {
            targets.destroy();
        }
        self.ctx.destroy();
    }
}

fn encode_and_submit(
    ctx: &GpuContext,
    pipeline: &mut FramePipeline,
    targets: Option<&FrameTargets>,
    points: &GpuPointBuffers,
    mut frame: GpuFrame,
    params: &DrawParams,
) -> Result<()> {
    let rctx = RenderCtx::new(ctx.device(), ctx.queue(), ctx.format(), ctx.size());
    {
        let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
        pipeline.encode(&rctx, &mut target, targets, points, params)?;
    }
    ctx.submit(frame);
    Ok(())
}

#[cfg(test)]
fn create_invalid_texture(device: &wgpu::Device) {
    // Zero extents fail texture validation.
    let _texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("invalid texture"),
        size: wgpu::Extent3d { width: 0, height: 0, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
}
