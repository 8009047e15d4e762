//! Scatter engine crate.
//!
//! GPU point-sprite rendering for interactive scatter plots of up to a million
//! points: staging in painter's order, a gamma-correct or direct frame path
//! chosen per adapter, recovery from context loss, and off-screen export.
//!
//! Hosts build a [`render::ScatterRenderer`] over a [`device::ContextSource`]
//! and call `render` from their redraw handler.

pub mod coords;
pub mod device;
pub mod export;
pub mod logging;
pub mod paint;
pub mod render;
pub mod scene;
