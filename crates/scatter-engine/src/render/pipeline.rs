use anyhow::Result;
use wgpu::util::DeviceExt;

use crate::device::LINEAR_TARGET_FORMAT;
use crate::paint::Color;

use super::buffers::{position_layout, PointStyle};
use super::common::{
    straight_alpha_blend, texture_entry, uniform_entry, CompositeUniform, PointUniform, QuadVertex,
    QUAD_INDICES, QUAD_VERTICES,
};
use super::ctx::{RenderCtx, RenderTarget};
use super::gpu_buffers::GpuPointBuffers;
use super::program::{compile, with_validation};
use super::targets::{FrameTargets, DEPTH_FORMAT};

/// How frames are produced.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PipelineMode {
    /// Linear HDR offscreen pass, then a gamma-encoding composite.
    Gamma,
    /// One pass straight onto the presentation target.
    Direct,
}

impl PipelineMode {
    /// Exponent applied to colors before blending.
    #[inline]
    pub fn blend_gamma(self, gamma: f32) -> f32 {
        match self {
            PipelineMode::Gamma => gamma,
            PipelineMode::Direct => 1.0,
        }
    }
}

/// Why the gamma path was abandoned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FallbackReason {
    /// The adapter cannot render to or blend `Rgba16Float`.
    MissingCapability,
    /// Offscreen target allocation failed.
    TargetCreation,
    /// Shader or pipeline creation failed.
    PipelineCreation,
    /// A gamma frame raised a validation error.
    RenderFailure,
}

/// Session-wide mode decision. Gamma→Direct is one-way.
///
/// Survives context loss: a renderer that fell back keeps rendering direct on
/// every later context.
#[derive(Debug, Default)]
pub struct ModeLatch {
    mode: Option<PipelineMode>,
    reason: Option<FallbackReason>,
}

impl ModeLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first context was inspected.
    #[inline]
    pub fn mode(&self) -> Option<PipelineMode> {
        self.mode
    }

    #[inline]
    pub fn reason(&self) -> Option<FallbackReason> {
        self.reason
    }

    /// Picks the mode for a context with the given capability.
    pub fn decide(&mut self, supports_gamma: bool) -> PipelineMode {
        match self.mode {
            None if supports_gamma => {
                log::info!("using gamma-correct pipeline");
                self.mode = Some(PipelineMode::Gamma);
            }
            None | Some(PipelineMode::Gamma) if !supports_gamma => {
                self.fall_back(FallbackReason::MissingCapability);
            }
            _ => {}
        }
        self.mode.unwrap_or(PipelineMode::Direct)
    }

    /// Latches Direct. Returns `true` if this call changed the mode.
    pub fn fall_back(&mut self, reason: FallbackReason) -> bool {
        if self.mode == Some(PipelineMode::Direct) {
            return false;
        }
        log::warn!("falling back to direct rendering: {reason:?}");
        self.mode = Some(PipelineMode::Direct);
        self.reason = Some(reason);
        true
    }
}

/// Per-draw inputs of [`FramePipeline::encode`].
#[derive(Debug, Copy, Clone)]
pub struct DrawParams {
    pub count: u32,
    pub uniform: PointUniform,
    /// Display-encoded.
    pub clear_color: Color,
    /// Disables blending so the selection overlay reads crisp.
    pub selection_active: bool,
    /// Gamma of the linear pass; ignored in Direct mode.
    pub gamma: f32,
}

struct Composite {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform: wgpu::Buffer,
}

/// Everything needed to draw points for one context and output format.
///
/// Built by the same routine for live rendering and exports.
pub struct FramePipeline {
    mode: PipelineMode,
    format: wgpu::TextureFormat,

    blended: wgpu::RenderPipeline,
    opaque: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform: wgpu::Buffer,
    bind_group: Option<(u64, wgpu::BindGroup)>,

    quad_vbo: wgpu::Buffer,
    quad_ibo: wgpu::Buffer,

    /// Gamma path only.
    composite: Option<Composite>,
}

impl FramePipeline {
    /// Builds the pipelines for `format` in `mode`.
    ///
    /// In Gamma mode the point pipelines target `Rgba16Float` and a composite
    /// pipeline targets `format`; in Direct mode the point pipelines target
    /// `format` directly.
    pub fn build(device: &wgpu::Device, format: wgpu::TextureFormat, mode: PipelineMode) -> Result<Self> {
        let shader = compile(device, "scatter points shader", include_str!("shaders/points.wgsl"))?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scatter points bgl"),
            entries: &[
                uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX_FRAGMENT,
                    std::mem::size_of::<PointUniform>(),
                ),
                texture_entry(
                    1,
                    wgpu::ShaderStages::FRAGMENT,
                    wgpu::TextureSampleType::Float { filterable: false },
                ),
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scatter points pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let (point_format, depth_stencil) = match mode {
            PipelineMode::Gamma => (
                LINEAR_TARGET_FORMAT,
                Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
            ),
            PipelineMode::Direct => (format, None),
        };

        let make = |label: &str, blend: Option<wgpu::BlendState>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[QuadVertex::layout(), position_layout(), PointStyle::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: point_format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: depth_stencil.clone(),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let (blended, opaque) = with_validation(device, "scatter points pipeline", || {
            (
                make("scatter points pipeline (blended)", Some(straight_alpha_blend())),
                make("scatter points pipeline (opaque)", None),
            )
        })?;

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scatter points ubo"),
            size: std::mem::size_of::<PointUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scatter quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scatter quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let composite = match mode {
            PipelineMode::Gamma => Some(build_composite(device, format)?),
            PipelineMode::Direct => None,
        };

        log::debug!("built {mode:?} pipeline for {format:?}");

        Ok(Self {
            mode,
            format,
            blended,
            opaque,
            bind_group_layout,
            uniform,
            bind_group: None,
            quad_vbo,
            quad_ibo,
            composite,
        })
    }

    #[inline]
    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    #[inline]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Records the passes for one frame into `encoder`.
    ///
    /// `targets` must be `Some` in Gamma mode.
    pub fn encode(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        targets: Option<&FrameTargets>,
        points: &GpuPointBuffers,
        params: &DrawParams,
    ) -> Result<()> {
        debug_assert_eq!(ctx.surface_format, self.format, "pipeline built for another format");
        let (device, queue) = (ctx.device, ctx.queue);
        let (encoder, output) = (&mut *target.encoder, target.color_view);
        let gamma = params.gamma;
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&params.uniform));
        self.ensure_bind_group(device, points);

        let clear = params.clear_color.linearized(self.mode.blend_gamma(gamma)).to_wgpu();

        match self.mode {
            PipelineMode::Direct => {
                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("scatter direct pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: output,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });
                self.draw_points(&mut rpass, points, params);
            }
            PipelineMode::Gamma => {
                let targets = targets.ok_or_else(|| anyhow::anyhow!("gamma frame without offscreen targets"))?;
                let composite = self
                    .composite
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("gamma pipeline without composite stage"))?;

                {
                    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("scatter linear pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: targets.color_view(),
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(clear),
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: targets.depth_view(),
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Discard,
                            }),
                            stencil_ops: None,
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                        multiview_mask: None,
                    });
                    self.draw_points(&mut rpass, points, params);
                }

                queue.write_buffer(
                    &composite.uniform,
                    0,
                    bytemuck::bytes_of(&CompositeUniform { inv_gamma: 1.0 / gamma, _pad: [0.0; 3] }),
                );
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("scatter composite bind group"),
                    layout: &composite.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry { binding: 0, resource: composite.uniform.as_entire_binding() },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(targets.color_view()),
                        },
                    ],
                });

                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("scatter composite pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: output,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });
                rpass.set_pipeline(&composite.pipeline);
                rpass.set_bind_group(0, &bind_group, &[]);
                rpass.draw(0..3, 0..1);
            }
        }
        Ok(())
    }

    fn draw_points(&self, rpass: &mut wgpu::RenderPass<'_>, points: &GpuPointBuffers, params: &DrawParams) {
        if params.count == 0 {
            return;
        }
        let Some((_, bind_group)) = self.bind_group.as_ref() else { return };

        let pipeline = if params.selection_active { &self.opaque } else { &self.blended };
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
        rpass.set_vertex_buffer(1, points.positions().slice(..));
        rpass.set_vertex_buffer(2, points.styles().slice(..));
        rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..params.count);
    }

    fn ensure_bind_group(&mut self, device: &wgpu::Device, points: &GpuPointBuffers) {
        if self.bind_group.as_ref().is_some_and(|(g, _)| *g == points.generation()) {
            return;
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scatter points bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(points.label_view()),
                },
            ],
        });
        self.bind_group = Some((points.generation(), bind_group));
    }
}

fn build_composite(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Composite> {
    let shader = compile(device, "scatter composite shader", include_str!("shaders/composite.wgsl"))?;

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("scatter composite bgl"),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::FRAGMENT, std::mem::size_of::<CompositeUniform>()),
            texture_entry(
                1,
                wgpu::ShaderStages::FRAGMENT,
                wgpu::TextureSampleType::Float { filterable: false },
            ),
        ],
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scatter composite pipeline layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });

    let pipeline = with_validation(device, "scatter composite pipeline", || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scatter composite pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    })?;

    let uniform = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("scatter composite ubo"),
        size: std::mem::size_of::<CompositeUniform>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    Ok(Composite { pipeline, bind_group_layout, uniform })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_starts_gamma_when_capable() {
        let mut latch = ModeLatch::new();
        assert_eq!(latch.mode(), None);
        assert_eq!(latch.decide(true), PipelineMode::Gamma);
        assert_eq!(latch.reason(), None);
    }

    #[test]
    fn latch_starts_direct_without_capability() {
        let mut latch = ModeLatch::new();
        assert_eq!(latch.decide(false), PipelineMode::Direct);
        assert_eq!(latch.reason(), Some(FallbackReason::MissingCapability));
    }

    #[test]
    fn fallback_is_permanent() {
        let mut latch = ModeLatch::new();
        latch.decide(true);
        assert!(latch.fall_back(FallbackReason::TargetCreation));
        assert!(!latch.fall_back(FallbackReason::RenderFailure));
        assert_eq!(latch.reason(), Some(FallbackReason::TargetCreation));
        // A later, capable context does not bring gamma back.
        assert_eq!(latch.decide(true), PipelineMode::Direct);
    }

    #[test]
    fn gamma_context_replaced_by_incapable_one_falls_back() {
        let mut latch = ModeLatch::new();
        latch.decide(true);
        assert_eq!(latch.decide(false), PipelineMode::Direct);
        assert_eq!(latch.reason(), Some(FallbackReason::MissingCapability));
    }

    #[test]
    fn direct_mode_blends_in_display_space() {
        assert_eq!(PipelineMode::Direct.blend_gamma(2.2), 1.0);
        assert_eq!(PipelineMode::Gamma.blend_gamma(2.2), 2.2);
    }
}
