//! GPU device + presentation management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring a window surface or an offscreen target
//! - acquiring frames and providing encoders/views for rendering
//! - capability detection and the context lifecycle (loss, restore, failure)

mod caps;
mod context;
mod error;
mod frame;
mod init;
mod lifecycle;
mod source;

pub use caps::{Capabilities, LINEAR_TARGET_FORMAT};
pub use context::{GpuContext, Presentation, OFFSCREEN_FORMAT};
pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use init::GpuInit;
pub use lifecycle::{ContextState, Lifecycle, LossFlag};
pub use source::{ContextSource, HeadlessSource, WindowSource};
