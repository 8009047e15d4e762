mod common;

use scatter_engine::device::HeadlessSource;
use scatter_engine::export::{ExportError, MAX_EXPORT_DIMENSION};
use scatter_engine::render::{RenderOptions, RendererConfig, ScatterRenderer};
use scatter_engine::scene::PointRecord;

fn renderer() -> ScatterRenderer<HeadlessSource> {
    ScatterRenderer::new(HeadlessSource::new(64, 64), RendererConfig::default())
}

#[test]
fn export_before_any_render_has_no_data() {
    assert!(matches!(renderer().export(100.0, 100.0, 1.0), Err(ExportError::NoData)));
}

#[test]
fn oversized_exports_fail_before_gpu_work() {
    let mut r = renderer();
    let points = common::grid(4);
    let view = common::view(&points, 64.0);
    // Caches the frame even when no adapter exists.
    r.render(&points, &view, RenderOptions::default());

    let too_wide = r.export(MAX_EXPORT_DIMENSION as f32 + 1.0, 10.0, 1.0);
    assert!(matches!(too_wide, Err(ExportError::DimensionTooLarge { .. })));
    let too_big = r.export(20_000.0, 20_000.0, 1.0);
    let msg = too_big.unwrap_err().to_string();
    assert!(msg.contains("268435456"), "{msg}");
}

#[test]
fn export_renders_at_the_requested_size() {
    if !common::gpu_available() {
        return;
    }
    let mut r = renderer();
    let points = common::single(PointRecord::new(1, 0.0, 0.0, "black").with_size(20.0));
    let view = common::view(&points, 64.0);
    assert!(r.render(&points, &view, RenderOptions::default()).is_presented());
    let live_count = r.point_count();

    let img = r.export(128.0, 96.0, 2.0).expect("export");
    assert_eq!(img.dimensions(), (256, 192));
    // The point sits in the middle of the plot area.
    let [red, _, _, alpha] = img.get_pixel(128, 96).0;
    assert!(red < 10, "center {red}");
    assert_eq!(alpha, 255);
    assert_eq!(img.get_pixel(2, 2).0[..3], [255, 255, 255]);

    // The live renderer is untouched.
    assert_eq!(r.point_count(), live_count);
    assert!(r.read_pixels().is_ok());
}
