#![allow(dead_code)]

use std::sync::Arc;

use scatter_engine::coords::{PlotConfig, Scales};
use scatter_engine::device::{GpuContext, GpuInit};
use scatter_engine::render::ViewState;
use scatter_engine::scene::{PointRecord, PointSet};

/// `true` when a headless adapter can be opened; prints a skip note otherwise.
pub fn gpu_available() -> bool {
    match pollster::block_on(GpuContext::headless(4, 4, &GpuInit::headless())) {
        Ok(ctx) => {
            ctx.destroy();
            true
        }
        Err(err) => {
            eprintln!("skipping: no headless GPU adapter ({err:#})");
            false
        }
    }
}

/// A lone point is centered in the plot area by the padded extent.
pub fn single(record: PointRecord) -> PointSet {
    Arc::from(vec![record])
}

pub fn grid(n: usize) -> PointSet {
    (0..n)
        .map(|i| {
            let (x, y) = ((i % 32) as f64, (i / 32) as f64);
            PointRecord::new(i as u64, x, y, "steelblue").with_depth((i % 7) as f32 / 7.0)
        })
        .collect()
}

pub fn view(points: &PointSet, side: f32) -> ViewState {
    let config = PlotConfig::new(side, side);
    ViewState::new(Scales::fit(points, &config), config)
}
