//! Point records handed to the renderer by the upstream data pipeline.
//!
//! Responsibilities:
//! - the per-point input contract (`PointRecord`, `Shape`)
//! - deterministic paint ordering (`DepthKey`: far to near, then input order)

mod key;
mod point;
mod shape;

pub use key::DepthKey;
pub use point::{PointRecord, PointSet, Stroke, MAX_LABELS};
pub use shape::Shape;
