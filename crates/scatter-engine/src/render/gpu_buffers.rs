use super::buffers::{PointBuffers, PointStyle, Upload};
use super::labels::{LabelBlock, LABEL_TEXTURE_WIDTH};

const LABEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// GPU mirror of [`PointBuffers`].
///
/// Buffers are sized by capacity and recreated only when it grows; otherwise
/// uploads are partial `write_buffer`/`write_texture` calls covering the
/// staged count.
pub struct GpuPointBuffers {
    capacity: usize,
    positions: wgpu::Buffer,
    styles: wgpu::Buffer,
    labels: wgpu::Texture,
    label_view: wgpu::TextureView,
    label_rows: u32,
    /// Bumped on reallocation so bind groups referencing the old texture are rebuilt.
    generation: u64,
}

impl GpuPointBuffers {
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let (positions, styles, labels, label_view, label_rows) = allocate(device, capacity);
        Self {
            capacity,
            positions,
            styles,
            labels,
            label_view,
            label_rows,
            generation: 0,
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn positions(&self) -> &wgpu::Buffer {
        &self.positions
    }

    pub fn styles(&self) -> &wgpu::Buffer {
        &self.styles
    }

    pub fn label_view(&self) -> &wgpu::TextureView {
        &self.label_view
    }

    /// Matches the CPU capacity. Returns `true` when storage was recreated, in
    /// which case everything must be uploaded again.
    pub fn ensure_capacity(&mut self, device: &wgpu::Device, capacity: usize) -> bool {
        if capacity == self.capacity {
            return false;
        }
        let (positions, styles, labels, label_view, label_rows) = allocate(device, capacity);
        self.positions.destroy();
        self.styles.destroy();
        self.labels.destroy();
        self.positions = positions;
        self.styles = styles;
        self.labels = labels;
        self.label_view = label_view;
        self.label_rows = label_rows;
        self.capacity = capacity;
        self.generation += 1;
        true
    }

    /// Copies the streams named by `upload` for the staged count.
    pub fn upload(&self, queue: &wgpu::Queue, cpu: &PointBuffers, upload: Upload) {
        let n = cpu.count();
        if n == 0 {
            return;
        }
        if matches!(upload, Upload::Positions | Upload::Full) {
            queue.write_buffer(&self.positions, 0, bytemuck::cast_slice(cpu.positions()));
        }
        if matches!(upload, Upload::Styles | Upload::Full) {
            queue.write_buffer(&self.styles, 0, bytemuck::cast_slice(cpu.styles()));
            self.upload_labels(queue, cpu);
        }
    }

    /// Only rows holding written pie slots are sent.
    fn upload_labels(&self, queue: &wgpu::Queue, cpu: &PointBuffers) {
        let rows = cpu.labels().rows_used().min(self.label_rows);
        if rows == 0 {
            return;
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.labels,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            cpu.labels().row_bytes(rows),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(LABEL_TEXTURE_WIDTH * 4),
                rows_per_image: Some(rows),
            },
            wgpu::Extent3d { width: LABEL_TEXTURE_WIDTH, height: rows, depth_or_array_layers: 1 },
        );
    }
}

fn allocate(
    device: &wgpu::Device,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::Buffer, wgpu::Texture, wgpu::TextureView, u32) {
    let positions = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("scatter position vbo"),
        size: (capacity * std::mem::size_of::<[f32; 2]>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let styles = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("scatter style vbo"),
        size: (capacity * std::mem::size_of::<PointStyle>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let rows = LabelBlock::rows_for(capacity);
    let labels = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("scatter label texture"),
        size: wgpu::Extent3d { width: LABEL_TEXTURE_WIDTH, height: rows, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: LABEL_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let label_view = labels.create_view(&wgpu::TextureViewDescriptor::default());

    (positions, styles, labels, label_view, rows)
}
