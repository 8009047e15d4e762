use anyhow::{anyhow, ensure, Result};
use futures_intrusive::channel::shared::oneshot_channel;
use image::RgbaImage;

/// Align number to WebGPU's copy row alignment (256 bytes).
fn align_bpr(value: u32) -> u32 {
    value.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Copies an `Rgba8Unorm` texture into a tightly packed image.
///
/// Blocks until the copy completes. Only used by export and explicit pixel
/// reads, never on the live frame path.
pub fn read_rgba8(device: &wgpu::Device, queue: &wgpu::Queue, src: &wgpu::Texture) -> Result<RgbaImage> {
    let (width, height) = (src.width(), src.height());
    ensure!(width > 0 && height > 0, "readback size must be positive");
    ensure!(
        src.format() == wgpu::TextureFormat::Rgba8Unorm,
        "readback expects Rgba8Unorm, got {:?}",
        src.format()
    );
    ensure!(src.sample_count() == 1, "readback requires a single-sample texture");

    let tight_bpr = width * 4;
    let padded_bpr = align_bpr(tight_bpr);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("scatter readback staging"),
        size: padded_bpr as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("scatter readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: src,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| anyhow!("device poll failed during readback: {e}"))?;

    pollster::block_on(receiver.receive())
        .ok_or_else(|| anyhow!("map_async callback channel dropped"))?
        .map_err(|e| anyhow!("readback buffer mapping failed: {e}"))?;

    let mut tight = Vec::with_capacity(tight_bpr as usize * height as usize);
    {
        let data = slice.get_mapped_range();
        // Depad rows: keep tight_bpr bytes from each padded row.
        for row in data.chunks_exact(padded_bpr as usize) {
            tight.extend_from_slice(&row[..tight_bpr as usize]);
        }
    }
    staging.unmap();
    staging.destroy();

    RgbaImage::from_raw(width, height, tight).ok_or_else(|| anyhow!("readback produced a short buffer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_align_to_256_bytes() {
        assert_eq!(align_bpr(4), 256);
        assert_eq!(align_bpr(256), 256);
        assert_eq!(align_bpr(257 * 4), 1280);
    }
}
