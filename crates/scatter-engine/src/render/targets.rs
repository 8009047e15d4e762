use anyhow::Result;

use crate::device::LINEAR_TARGET_FORMAT;

use super::program::with_validation;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Offscreen attachments of the gamma path, sized to the physical canvas.
///
/// The depth attachment is declared for parity with the color target; the
/// point pipeline never tests or writes it.
pub struct FrameTargets {
    size: (u32, u32),
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl FrameTargets {
    pub fn create(device: &wgpu::Device, width: u32, height: u32) -> Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "frame targets need a non-empty canvas");
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };

        let (color, depth) = with_validation(device, "frame targets", || {
            let color = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("scatter linear color target"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: LINEAR_TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let depth = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("scatter depth target"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            (color, depth)
        })?;

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self { size: (width, height), color, color_view, depth, depth_view })
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    #[inline]
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.size == (width, height)
    }

    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn destroy(self) {
        self.color.destroy();
        self.depth.destroy();
    }
}
