mod common;

use image::RgbaImage;
use scatter_engine::device::HeadlessSource;
use scatter_engine::paint::Color;
use scatter_engine::render::{PipelineMode, RenderOptions, RendererConfig, ScatterRenderer, GAMMA};
use scatter_engine::scene::PointRecord;

const SIDE: u32 = 64;

fn draw(point: PointRecord, options: RenderOptions) -> Option<(RgbaImage, PipelineMode)> {
    if !common::gpu_available() {
        return None;
    }
    let mut r = ScatterRenderer::new(HeadlessSource::new(SIDE, SIDE), RendererConfig::default());
    let points = common::single(point.with_size(24.0));
    let view = common::view(&points, SIDE as f32);
    let mode = r.render(&points, &view, options).mode().expect("frame was presented");
    Some((r.read_pixels().expect("offscreen readback"), mode))
}

fn center(img: &RgbaImage) -> [u8; 4] {
    img.get_pixel(SIDE / 2, SIDE / 2).0
}

fn close(actual: u8, expected: f32) -> bool {
    (actual as f32 - expected).abs() <= 2.5
}

#[test]
fn opaque_colors_survive_the_round_trip() {
    let Some((img, _)) = draw(PointRecord::new(1, 0.0, 0.0, "#808080"), RenderOptions::default()) else {
        return;
    };
    let [r, g, b, _] = center(&img);
    assert!(close(r, 128.0) && close(g, 128.0) && close(b, 128.0), "{r} {g} {b}");

    // Corners keep the white clear color.
    assert_eq!(img.get_pixel(0, 0).0[..3], [255, 255, 255]);
}

#[test]
fn translucent_blending_happens_in_the_mode_space() {
    let point = PointRecord::new(1, 0.0, 0.0, "black").with_opacity(0.5);
    let Some((img, mode)) = draw(point, RenderOptions::default()) else {
        return;
    };
    let expected = match mode {
        PipelineMode::Gamma => 0.5f32.powf(1.0 / GAMMA) * 255.0,
        PipelineMode::Direct => 127.5,
    };
    let [r, _, _, a] = center(&img);
    assert!(close(r, expected), "{mode:?}: got {r}, expected {expected}");
    assert_eq!(a, 255);
}

#[test]
fn selection_disables_blending() {
    let point = PointRecord::new(1, 0.0, 0.0, "black").with_opacity(0.5);
    let options = RenderOptions { selection_active: true, ..RenderOptions::default() };
    let Some((img, _)) = draw(point, options) else {
        return;
    };
    let [r, g, b, _] = center(&img);
    assert!(r < 3 && g < 3 && b < 3, "{r} {g} {b}");
}

#[test]
fn pie_slices_run_clockwise_from_noon() {
    let point = PointRecord::new(1, 0.0, 0.0, "red").with_colors(["red", "blue"]);
    let Some((img, _)) = draw(point, RenderOptions::default()) else {
        return;
    };
    let c = SIDE / 2;
    let right = img.get_pixel(c + 6, c).0;
    let left = img.get_pixel(c - 6, c).0;
    assert!(right[0] > 200 && right[2] < 50, "right half {right:?}");
    assert!(left[2] > 200 && left[0] < 50, "left half {left:?}");
}

#[test]
fn outlines_darken_the_rim_only() {
    let point = PointRecord::new(1, 0.0, 0.0, "white").with_stroke("black", 1.0);
    let options = RenderOptions { clear_color: Color::BLACK, ..RenderOptions::default() };
    let Some((img, _)) = draw(point, options) else {
        return;
    };
    let c = SIDE / 2;
    // Radius 12 px; the band covers roughly the outer 1.8 px.
    let rim = img.get_pixel(c + 11, c).0;
    let inside = img.get_pixel(c, c).0;
    assert!(close(inside[0], 255.0), "inside {inside:?}");
    assert!(close(rim[0], 127.5), "rim {rim:?}");
}
