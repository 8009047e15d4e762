//! Color handling shared by the live and export renderers.
//!
//! Scope:
//! - `Color`: straight-alpha, display-encoded RGBA used for clear colors
//! - CSS color strings → normalized RGB, memoized process-wide

pub mod color;
mod named;
mod resolve;

pub use color::Color;
pub use resolve::{cache_len, clear_cache, parse_css_color, resolve_color, resolver, Resolver};
