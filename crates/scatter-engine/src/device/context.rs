use std::sync::Arc;

use anyhow::{Context, Result};
use winit::window::Window;

use super::{Capabilities, GpuFrame, GpuInit, LossFlag, SurfaceErrorAction};

/// Format of offscreen presentation targets. Read back as straight RGBA8.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Where finished frames land.
pub enum Presentation {
    /// Swapchain of a window.
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// Persistent texture, readable with `copy_texture_to_buffer`.
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// Owns wgpu core objects and the presentation target.
///
/// This type is the low-level rendering context:
/// - creates and stores Instance/Adapter/Device/Queue
/// - creates and configures the Surface (swapchain) or an offscreen texture
/// - acquires frames and provides an encoder + view for rendering
/// - forwards device loss into a [`LossFlag`]
pub struct GpuContext {
    /// Kept alive for the surface; wgpu requires the instance to outlive it.
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    presentation: Presentation,
    format: wgpu::TextureFormat,
    /// Current drawable size in physical pixels.
    size: (u32, u32),
    lost: LossFlag,
}

impl GpuContext {
    /// Creates a context rendering into an offscreen `Rgba8Unorm` texture.
    pub async fn headless(width: u32, height: u32, init: &GpuInit) -> Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "offscreen target has zero size");

        let instance = create_instance(init);
        let (adapter, device, queue, lost) = request_device(&instance, None, init).await?;

        let (texture, view) = create_offscreen(&device, width, height);

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            presentation: Presentation::Offscreen { texture, view },
            format: OFFSCREEN_FORMAT,
            size: (width, height),
            lost,
        })
    }

    /// Creates a context presenting to a window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn for_window(window: Arc<Window>, init: &GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = create_instance(init);
        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let (adapter, device, queue, lost) =
            request_device(&instance, Some(&surface), init).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&surface_caps, init.prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = choose_alpha_mode(&surface_caps, init.alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            presentation: Presentation::Surface { surface, config },
            format,
            size: (size.width, size.height),
            lost,
        })
    }

    /// Returns the presentation format.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::detect(&self.adapter)
    }

    /// `true` once wgpu reported the device lost.
    pub fn is_lost(&self) -> bool {
        self.lost.is_raised()
    }

    pub fn loss_flag(&self) -> &LossFlag {
        &self.lost
    }

    /// Offscreen target texture; `None` for window surfaces.
    pub fn offscreen_texture(&self) -> Option<&wgpu::Texture> {
        match &self.presentation {
            Presentation::Offscreen { texture, .. } => Some(texture),
            Presentation::Surface { .. } => None,
        }
    }

    /// Resizes the presentation target.
    ///
    /// wgpu does not support configuring a surface with a 0x0 size; in that case,
    /// only internal state is updated and configuration is deferred.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.size {
            return;
        }
        self.size = (width, height);
        if width == 0 || height == 0 {
            return;
        }

        match &mut self.presentation {
            Presentation::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            Presentation::Offscreen { texture, view } => {
                let (t, v) = create_offscreen(&self.device, width, height);
                texture.destroy();
                *texture = t;
                *view = v;
            }
        }
    }

    /// Acquires the next frame and creates an encoder.
    pub fn begin_frame(&self) -> std::result::Result<GpuFrame, wgpu::SurfaceError> {
        let (surface_texture, view) = match &self.presentation {
            Presentation::Surface { surface, .. } => {
                let st = surface.get_current_texture()?;
                let view = st.texture.create_view(&wgpu::TextureViewDescriptor::default());
                (Some(st), view)
            }
            Presentation::Offscreen { view, .. } => (None, view.clone()),
        };

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scatter frame encoder"),
            });

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
        })
    }

    /// Submits the recorded commands for the given frame and presents it.
    pub fn submit(&self, frame: GpuFrame) {
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        drop(frame.view);
        if let Some(st) = frame.surface_texture {
            st.present();
        }
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: wgpu::SurfaceError) -> SurfaceErrorAction {
        let action = SurfaceErrorAction::from_error(&err);
        if action == SurfaceErrorAction::Reconfigured {
            if let Presentation::Surface { surface, config } = &self.presentation {
                if self.size.0 > 0 && self.size.1 > 0 {
                    surface.configure(&self.device, config);
                }
            }
        }
        log::debug!("surface error {err:?} -> {action:?}");
        action
    }

    /// Releases GPU memory now instead of waiting for the last handle to drop.
    pub fn destroy(self) {
        if let Presentation::Offscreen { texture, .. } = &self.presentation {
            texture.destroy();
        }
        self.device.destroy();
    }
}

fn create_instance(init: &GpuInit) -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: init.backends,
        ..Default::default()
    })
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'static>>,
    init: &GpuInit,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue, LossFlag)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: init.power_preference,
            compatible_surface: surface,
            force_fallback_adapter: init.force_fallback_adapter,
        })
        .await
        .context("failed to find a suitable GPU adapter")?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("scatter-engine device"),
            required_features: init.required_features,
            required_limits: init.required_limits.clone().using_resolution(adapter.limits()),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")?;

    let lost = LossFlag::new();
    let flag = lost.clone();
    device.set_device_lost_callback(move |reason, message| {
        // Explicit `destroy()` also lands here; the owner is already gone then.
        if !matches!(reason, wgpu::DeviceLostReason::Destroyed) {
            log::warn!("wgpu device lost ({reason:?}): {message}");
            flag.raise();
        }
    });
    device.on_uncaptured_error(Arc::new(|err: wgpu::Error| {
        log::error!("uncaptured wgpu error: {err}");
    }));

    Ok((adapter, device, queue, lost))
}

fn create_offscreen(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("scatter offscreen target"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    caps.formats
        .iter()
        .copied()
        .find(|f| f.is_srgb() == prefer_srgb)
        .or_else(|| caps.formats.first().copied())
}

fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: Vec<wgpu::TextureFormat>) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            alpha_modes: vec![wgpu::CompositeAlphaMode::Opaque],
            ..Default::default()
        }
    }

    #[test]
    fn surface_format_follows_srgb_preference() {
        let c = caps(vec![
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ]);
        assert_eq!(choose_surface_format(&c, false), Some(wgpu::TextureFormat::Bgra8Unorm));
        assert_eq!(choose_surface_format(&c, true), Some(wgpu::TextureFormat::Bgra8UnormSrgb));

        let only_srgb = caps(vec![wgpu::TextureFormat::Rgba8UnormSrgb]);
        assert_eq!(choose_surface_format(&only_srgb, false), Some(wgpu::TextureFormat::Rgba8UnormSrgb));
        assert_eq!(choose_surface_format(&caps(vec![]), false), None);
    }

    #[test]
    fn unsupported_alpha_mode_falls_back() {
        let c = caps(vec![wgpu::TextureFormat::Bgra8Unorm]);
        assert_eq!(
            choose_alpha_mode(&c, Some(wgpu::CompositeAlphaMode::PreMultiplied)),
            wgpu::CompositeAlphaMode::Opaque
        );
    }
}
