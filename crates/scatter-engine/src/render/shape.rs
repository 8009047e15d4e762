//! CPU mirror of the fragment-stage glyph math in `points.wgsl`.
//!
//! Coordinates are in normalized sprite space: `[-1, 1]²`, +y up.

use std::f32::consts::TAU;

use crate::scene::{Shape, MAX_LABELS};

use super::labels::LABEL_TEXTURE_WIDTH;

/// Default outline band, in sprite units.
pub const STROKE_WIDTH: f32 = 0.15;

/// Diamonds are drawn larger so they read as the same size as other glyphs.
pub const DIAMOND_SIZE_FACTOR: f32 = 1.25;

pub const PLUS_HALF_THICKNESS: f32 = 0.35;

const SQRT3: f32 = 1.732_050_8;

/// Distance-like measure to the glyph edge; `>= 0` inside.
pub fn edge_distance(shape: Shape, p: [f32; 2]) -> f32 {
    let [x, y] = p;
    let (ax, ay) = (x.abs(), y.abs());
    match shape {
        Shape::Circle => 1.0 - (x * x + y * y).sqrt(),
        Shape::Square => 1.0 - ax.max(ay),
        Shape::Diamond => (1.0 - (SQRT3 * ax + ay)) * 0.5,
        Shape::TriangleUp => ((1.0 - (SQRT3 * ax + y)) * 0.5).min(y + 0.5),
        Shape::TriangleDown => ((1.0 - (SQRT3 * ax - y)) * 0.5).min(0.5 - y),
        Shape::Plus => {
            let vertical = (PLUS_HALF_THICKNESS - ax).min(1.0 - ay);
            let horizontal = (PLUS_HALF_THICKNESS - ay).min(1.0 - ax);
            vertical.max(horizontal)
        }
    }
}

#[inline]
pub fn contains(shape: Shape, p: [f32; 2]) -> bool {
    edge_distance(shape, p) >= 0.0
}

/// Inside the glyph and within `stroke_width` of its edge.
#[inline]
pub fn in_outline(shape: Shape, p: [f32; 2], stroke_width: f32) -> bool {
    let d = edge_distance(shape, p);
    d >= 0.0 && d < stroke_width
}

/// Pie slice under `p` for `n` labels, counted clockwise from 12 o'clock.
pub fn slice_index(p: [f32; 2], n: usize) -> usize {
    let n = n.clamp(1, MAX_LABELS);
    let mut angle = p[0].atan2(p[1]);
    if angle < 0.0 {
        angle += TAU;
    }
    ((angle / TAU * n as f32) as usize).min(n - 1)
}

/// Label texture coordinate of a slot's slice.
pub fn label_texel(slot: usize, slice: usize) -> (u32, u32) {
    let t = (slot * MAX_LABELS + slice) as u32;
    (t % LABEL_TEXTURE_WIDTH, t / LABEL_TEXTURE_WIDTH)
}

/// Side of the drawn quad for a staged size.
#[inline]
pub fn sprite_side(shape: Shape, size: f32) -> f32 {
    if shape == Shape::Diamond { size * DIAMOND_SIZE_FACTOR } else { size }
}

/// Whether a screen position falls on a glyph centered at `center`.
///
/// `size` and both positions share one pixel space; screen y grows downward.
pub fn hit(shape: Shape, size: f32, center: [f32; 2], cursor: [f32; 2]) -> bool {
    let half = sprite_side(shape, size) * 0.5;
    if half <= 0.0 {
        return false;
    }
    let p = [(cursor[0] - center[0]) / half, (center[1] - cursor[1]) / half];
    contains(shape, p)
}
