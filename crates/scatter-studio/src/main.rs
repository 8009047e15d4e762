//! Scatter Studio: a thin window host for the scatter engine.
//!
//! Usage: `scatter-studio [POINT_COUNT]`
//!
//! Drag to pan, scroll to zoom. `E` exports a PNG at twice the window size,
//! `L`/`R` simulate a context loss and restore, `S` toggles selection mode.

use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use scatter_engine::coords::{PlotConfig, Scales, ZoomTransform};
use scatter_engine::device::WindowSource;
use scatter_engine::logging::{init_logging, LoggingConfig};
use scatter_engine::render::{FrameOutcome, RenderOptions, RendererConfig, ScatterRenderer, ViewState};
use scatter_engine::scene::{PointRecord, PointSet, Shape};

const DEFAULT_POINTS: usize = 100_000;

const PALETTE: [&str; 6] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "rebeccapurple"];

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let count = std::env::args()
        .nth(1)
        .map(|s| s.parse::<usize>())
        .transpose()
        .context("point count must be a non-negative integer")?
        .unwrap_or(DEFAULT_POINTS);

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut studio = Studio::new(synthetic_points(count));
    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;
    Ok(())
}

struct Studio {
    points: PointSet,
    window: Option<Arc<Window>>,
    renderer: Option<ScatterRenderer<WindowSource>>,

    transform: ZoomTransform,
    /// Physical pixels.
    cursor: PhysicalPosition<f64>,
    drag_from: Option<PhysicalPosition<f64>>,
    selection: bool,
    exports: u32,
}

impl Studio {
    fn new(points: PointSet) -> Self {
        log::info!("studio: {} synthetic points", points.len());
        Self {
            points,
            window: None,
            renderer: None,
            transform: ZoomTransform::IDENTITY,
            cursor: PhysicalPosition::new(0.0, 0.0),
            drag_from: None,
            selection: false,
            exports: 0,
        }
    }

    fn scale_factor(&self) -> f64 {
        self.window.as_ref().map_or(1.0, |w| w.scale_factor())
    }

    /// Canvas size in CSS pixels.
    fn css_size(&self) -> (f32, f32) {
        let Some(window) = self.window.as_ref() else { return (1.0, 1.0) };
        let size = window.inner_size().to_logical::<f32>(window.scale_factor());
        (size.width.max(1.0), size.height.max(1.0))
    }

    fn view(&self) -> ViewState {
        let (w, h) = self.css_size();
        let config = PlotConfig::new(w, h);
        ViewState::new(Scales::fit(&self.points, &config), config)
            .with_transform(self.transform)
            .with_device_pixel_ratio(self.scale_factor() as f32)
    }

    fn options(&self) -> RenderOptions {
        RenderOptions { selection_active: self.selection, ..RenderOptions::default() }
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn redraw(&mut self) {
        let view = self.view();
        let options = self.options();
        let Some(renderer) = self.renderer.as_mut() else { return };

        let outcome = match renderer.replay() {
            Some(outcome) => outcome,
            None => renderer.render(&self.points, &view, options),
        };
        match outcome {
            FrameOutcome::Drawn { points, mode, upload } => {
                log::trace!("drew {points} points ({mode:?}, upload {upload:?})");
            }
            FrameOutcome::Cleared { .. } => {}
            FrameOutcome::Skipped(reason) => log::debug!("frame skipped: {reason:?}"),
        }
    }

    fn export(&mut self) {
        let (w, h) = self.css_size();
        let Some(renderer) = self.renderer.as_ref() else { return };
        self.exports += 1;
        let path = format!("scatter-export-{}.png", self.exports);
        match renderer.export(w * 2.0, h * 2.0, 1.0) {
            Ok(image) => match image.save(&path) {
                Ok(()) => log::info!("exported {}x{} to {path}", image.width(), image.height()),
                Err(e) => log::error!("failed to write {path}: {e}"),
            },
            Err(e) => log::error!("export failed: {e}"),
        }
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::KeyE => self.export(),
            KeyCode::KeyS => {
                self.selection = !self.selection;
                self.request_redraw();
            }
            KeyCode::KeyL => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.on_context_lost();
                }
            }
            KeyCode::KeyR => {
                let window = self.window.clone();
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.on_context_restored(|| {
                        if let Some(w) = window {
                            w.request_redraw();
                        }
                    });
                }
            }
            KeyCode::Digit0 => {
                self.transform = ZoomTransform::IDENTITY;
                self.request_redraw();
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Scatter Studio")
            .with_inner_size(LogicalSize::new(1024.0, 720.0));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let config = RendererConfig::default();
        let source = WindowSource::with_init(Arc::clone(&window), config.gpu.clone());
        self.renderer = Some(ScatterRenderer::new(source, config));
        window.request_redraw();
        self.window = Some(window);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(mut renderer) = self.renderer.take() {
                    renderer.dispose();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
                self.request_redraw();
            }
            WindowEvent::ScaleFactorChanged { .. } => self.request_redraw(),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                if let Some(from) = self.drag_from {
                    let sf = self.scale_factor();
                    let dx = ((position.x - from.x) / sf) as f32;
                    let dy = ((position.y - from.y) / sf) as f32;
                    self.transform = self.transform.translated(dx, dy);
                    self.drag_from = Some(position);
                    self.request_redraw();
                }
            }
            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                self.drag_from = match state {
                    ElementState::Pressed => Some(self.cursor),
                    ElementState::Released => None,
                };
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 40.0) as f32,
                };
                let sf = self.scale_factor();
                let anchor = [(self.cursor.x / sf) as f32, (self.cursor.y / sf) as f32];
                self.transform = self.transform.zoomed_at(anchor, 1.1f32.powf(lines));
                self.request_redraw();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.on_key(event_loop, code);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

/// Xorshift64; enough for a reproducible demo cloud.
struct Rng(u64);

impl Rng {
    fn next_f64(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Sum of uniforms; close enough to a normal for clustering.
    fn gaussish(&mut self) -> f64 {
        (0..4).map(|_| self.next_f64()).sum::<f64>() - 2.0
    }
}

fn synthetic_points(count: usize) -> PointSet {
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    let centers: Vec<[f64; 2]> = (0..PALETTE.len())
        .map(|_| [rng.next_f64() * 100.0, rng.next_f64() * 100.0])
        .collect();

    (0..count)
        .map(|i| {
            let cluster = i % PALETTE.len();
            let [cx, cy] = centers[cluster];
            let x = cx + rng.gaussish() * 8.0;
            let y = cy + rng.gaussish() * 8.0;

            let mut p = PointRecord::new(i as u64, x, y, PALETTE[cluster])
                .with_shape(Shape::ALL[(i / 7) % Shape::ALL.len()])
                .with_size(4.0 + rng.next_f64() as f32 * 6.0)
                .with_opacity(0.85)
                .with_depth(rng.next_f64() as f32);
            if i % 50 == 0 {
                let colors = [cluster, (cluster + 1) % PALETTE.len(), (cluster + 2) % PALETTE.len()];
                p = p
                    .with_shape(Shape::Circle)
                    .with_size(12.0)
                    .with_colors(colors.map(|c| PALETTE[c]));
            }
            if i % 97 == 0 {
                p = p.with_stroke("black", 1.0);
            }
            p
        })
        .collect()
}
