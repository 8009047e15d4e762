use crate::scene::MAX_LABELS;

/// Width of the label texture in texels.
pub const LABEL_TEXTURE_WIDTH: u32 = 4096;

/// CPU copy of the multi-label color texture.
///
/// Every point slot owns `MAX_LABELS` consecutive texels starting at
/// `slot * MAX_LABELS`, laid out row-major in a `LABEL_TEXTURE_WIDTH`-wide
/// RGBA8 texture. Only slots of pie points are meaningful.
#[derive(Debug, Default)]
pub struct LabelBlock {
    texels: Vec<[u8; 4]>,
    /// Highest slot (exclusive) written since the last reset.
    used_slots: usize,
}

impl LabelBlock {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut block = Self::default();
        block.resize(capacity);
        block
    }

    /// Texture rows needed for `capacity` point slots.
    pub fn rows_for(capacity: usize) -> u32 {
        let texels = capacity * MAX_LABELS;
        texels.div_ceil(LABEL_TEXTURE_WIDTH as usize).max(1) as u32
    }

    /// Reallocates for a new capacity, discarding contents.
    pub fn resize(&mut self, capacity: usize) {
        let rows = Self::rows_for(capacity) as usize;
        self.texels = vec![[0; 4]; rows * LABEL_TEXTURE_WIDTH as usize];
        self.used_slots = 0;
    }

    pub fn reset(&mut self) {
        self.used_slots = 0;
    }

    /// Writes the colors of one slot. Extra colors past `MAX_LABELS` are ignored.
    pub fn write(&mut self, slot: usize, colors: impl IntoIterator<Item = [u8; 4]>) {
        let base = slot * MAX_LABELS;
        for (i, c) in colors.into_iter().take(MAX_LABELS).enumerate() {
            if let Some(t) = self.texels.get_mut(base + i) {
                *t = c;
            }
        }
        self.used_slots = self.used_slots.max(slot + 1);
    }

    /// Rows touched by written slots; zero when no pie point was written.
    pub fn rows_used(&self) -> u32 {
        if self.used_slots == 0 {
            return 0;
        }
        Self::rows_for(self.used_slots)
    }

    pub fn total_rows(&self) -> u32 {
        (self.texels.len() / LABEL_TEXTURE_WIDTH as usize) as u32
    }

    /// Texel at a flat index.
    pub fn texel(&self, index: usize) -> Option<[u8; 4]> {
        self.texels.get(index).copied()
    }

    /// Bytes of the first `rows` rows, ready for `write_texture`.
    pub fn row_bytes(&self, rows: u32) -> &[u8] {
        let end = (rows as usize * LABEL_TEXTURE_WIDTH as usize).min(self.texels.len());
        bytemuck::cast_slice(&self.texels[..end])
    }
}
