//! Coordinate spaces consumed by the renderer.
//!
//! - Data space: `PointRecord::x/y`.
//! - CSS pixel space: output of [`Scales`], origin top-left, +Y down.
//! - Physical pixel space: CSS pixels × device pixel ratio, after the
//!   [`ZoomTransform`] is applied on the GPU.

mod scale;
mod transform;
mod viewport;

pub use scale::{Extent, LinearScale, Scales};
pub use transform::ZoomTransform;
pub use viewport::{sanitize_dpr, Margin, PlotConfig};
