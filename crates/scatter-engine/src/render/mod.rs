//! GPU rendering subsystem.
//!
//! [`ScatterRenderer`] owns the per-canvas state and drives the pieces below:
//! - `buffers`/`labels`: CPU staging in painter's order plus the pie color block
//! - `gpu_buffers`: their wgpu mirror, grown but never shrunk
//! - `pipeline`: Gamma (linear target + composite) or Direct frame encoding
//! - `shape`: CPU copy of the glyph math in `shaders/points.wgsl`
//!
//! Convention:
//! - CPU positions are in CSS pixels (top-left origin, +Y down).
//! - The vertex shader applies pan/zoom and DPR, then converts to NDC.

mod buffers;
mod common;
mod config;
mod ctx;
mod frame;
mod gpu_buffers;
mod labels;
mod pipeline;
mod program;
mod readback;
mod renderer;
mod resources;
pub mod shape;
mod signature;
mod targets;

pub use buffers::{capacity_for, PointBuffers, PointStyle, StageParams, StageReport, Upload, MAX_POINTS, MIN_CAPACITY};
pub use common::{CompositeUniform, PointUniform};
pub use config::{RendererConfig, GAMMA};
pub use ctx::{RenderCtx, RenderTarget};
pub use frame::{CachedFrame, FrameOutcome, RenderOptions, SkipReason, ViewState};
pub use gpu_buffers::GpuPointBuffers;
pub use labels::{LabelBlock, LABEL_TEXTURE_WIDTH};
pub use pipeline::{DrawParams, FallbackReason, FramePipeline, ModeLatch, PipelineMode};
pub use program::{compile, with_validation};
pub use readback::read_rgba8;
pub use renderer::ScatterRenderer;
pub use signature::{DataSignature, StyleSignature};
pub use targets::{FrameTargets, DEPTH_FORMAT};

pub(crate) use resources::{DrawStatus, GpuResources};
