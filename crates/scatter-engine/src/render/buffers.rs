use bytemuck::{Pod, Zeroable};

use crate::coords::Scales;
use crate::paint::{resolver, Resolver};
use crate::scene::{DepthKey, PointRecord, Shape};

use super::labels::LabelBlock;
use super::signature::{DataSignature, StyleSignature};

/// Hard cap on drawn points. Excess points are dropped in input order.
pub const MAX_POINTS: usize = 1_000_000;

/// Smallest buffer capacity ever allocated.
pub const MIN_CAPACITY: usize = 1024;

/// Upload slots checked before reusing the previous draw order.
const ORDER_CHECK_SLOTS: usize = 100;

/// Next power of two that holds `n` points, never below `MIN_CAPACITY`.
#[inline]
pub fn capacity_for(n: usize) -> usize {
    n.max(MIN_CAPACITY).next_power_of_two()
}

/// Per-point style stream (32 bytes, instance buffer slot 2).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PointStyle {
    /// Display-encoded RGB plus opacity.
    pub color: [f32; 4],
    /// Sprite diameter in physical px.
    pub size: f32,
    pub depth: f32,
    /// 1 for solid glyphs, 2..=8 for pies.
    pub label_count: u32,
    /// `Shape` index, plus `OUTLINE_BIT` when the edge is darkened.
    pub shape_code: u32,
}

impl PointStyle {
    pub const OUTLINE_BIT: u32 = 8;

    const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        2 => Float32x4, // color
        3 => Float32,   // size
        4 => Float32,   // depth
        5 => Uint32,    // label_count
        6 => Uint32     // shape_code
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointStyle>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        Shape::from_index(self.shape_code & 7)
    }

    #[inline]
    pub fn has_outline(&self) -> bool {
        self.shape_code & Self::OUTLINE_BIT != 0
    }
}

/// Position stream layout (instance buffer slot 1).
pub(crate) fn position_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRS,
    }
}

/// Inputs to staging that are not part of the point list.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StageParams {
    pub device_pixel_ratio: f32,
    /// Extra sprite scaling; 1 live, `√(area ratio)` for exports.
    pub size_scale: f32,
    /// Further limits `MAX_POINTS`; never raises it.
    pub max_points: usize,
}

impl Default for StageParams {
    fn default() -> Self {
        Self { device_pixel_ratio: 1.0, size_scale: 1.0, max_points: MAX_POINTS }
    }
}

/// Which CPU streams changed and must be copied to the GPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Upload {
    None,
    Positions,
    Styles,
    Full,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub upload: Upload,
    /// Points staged for drawing.
    pub count: usize,
    pub capacity: usize,
    /// Capacity grew during this call.
    pub grew: bool,
    /// Label texture rows to upload.
    pub label_rows: u32,
    /// Visible points dropped by the cap.
    pub dropped: usize,
}

/// CPU staging for the instance streams and label texture.
///
/// Slots are filled far→near so drawing in slot order paints nearer points
/// last. Staging is skipped entirely when the sampled signatures of the input
/// match the previous call.
#[derive(Debug)]
pub struct PointBuffers {
    capacity: usize,
    count: usize,
    positions: Vec<[f32; 2]>,
    styles: Vec<PointStyle>,
    labels: LabelBlock,
    /// Input index of the point in each slot.
    order: Vec<u32>,
    /// Point id in each slot, for order reuse checks.
    slot_ids: Vec<u64>,
    data_sig: Option<DataSignature>,
    style_sig: Option<StyleSignature>,
    full_pending: bool,
    warned_truncation: bool,
}

impl Default for PointBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl PointBuffers {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity_for(capacity);
        Self {
            capacity,
            count: 0,
            positions: vec![[0.0; 2]; capacity],
            styles: vec![PointStyle::zeroed(); capacity],
            labels: LabelBlock::with_capacity(capacity),
            order: Vec::new(),
            slot_ids: vec![0; capacity],
            data_sig: None,
            style_sig: None,
            full_pending: true,
            warned_truncation: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Staged positions in slot order.
    pub fn positions(&self) -> &[[f32; 2]] {
        &self.positions[..self.count]
    }

    /// Staged styles in slot order.
    pub fn styles(&self) -> &[PointStyle] {
        &self.styles[..self.count]
    }

    pub fn labels(&self) -> &LabelBlock {
        &self.labels
    }

    /// Input index per slot.
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    /// Forces the next `stage` to restage and upload everything.
    pub fn invalidate(&mut self) {
        self.full_pending = true;
    }

    pub fn stage(&mut self, points: &[PointRecord], scales: &Scales, params: &StageParams) -> StageReport {
        let mut colors = resolver();

        let data_sig = DataSignature::compute(points, scales);
        let style_sig = StyleSignature::compute(points, params, &mut colors);
        let data_dirty = self.data_sig.as_ref() != Some(&data_sig);
        let style_dirty = self.style_sig.as_ref() != Some(&style_sig);

        if !data_dirty && !style_dirty && !self.full_pending {
            return self.report(Upload::None, false, 0);
        }

        let limit = params.max_points.min(MAX_POINTS);
        let mut drawable = points
            .iter()
            .enumerate()
            .filter(|(_, p)| is_drawable(p))
            .map(|(i, _)| i as u32);
        let survivors: Vec<u32> = drawable.by_ref().take(limit).collect();
        let dropped = drawable.count();
        if dropped > 0 && !self.warned_truncation {
            log::debug!("{dropped} points over the {limit} point limit were not drawn");
            self.warned_truncation = true;
        }

        let grew = self.ensure_capacity(survivors.len());
        let reusable = !grew && !self.full_pending && survivors.len() == self.count;
        // A sampled depth change anywhere in the input needs a re-sort.
        let depths_kept = self.style_sig.as_ref().is_some_and(|old| old.same_depths(&style_sig));

        let upload = if reusable
            && !data_dirty
            && depths_kept
            && self.order_matches(points, true)
            && self.restage_styles(points, params, &mut colors)
        {
            Upload::Styles
        } else if reusable
            && !style_dirty
            && self.order_matches(points, false)
            && self.restage_positions(points, scales)
        {
            Upload::Positions
        } else {
            self.restage_full(points, &survivors, scales, params, &mut colors);
            Upload::Full
        };

        self.data_sig = Some(data_sig);
        self.style_sig = Some(style_sig);
        self.full_pending = false;
        self.report(upload, grew, dropped)
    }

    fn report(&self, upload: Upload, grew: bool, dropped: usize) -> StageReport {
        let label_rows = match upload {
            Upload::Styles | Upload::Full => self.labels.rows_used(),
            Upload::None | Upload::Positions => 0,
        };
        StageReport {
            upload,
            count: self.count,
            capacity: self.capacity,
            grew,
            label_rows,
            dropped,
        }
    }

    /// Grows every CPU array to hold `n` points. Returns `true` on growth.
    fn ensure_capacity(&mut self, n: usize) -> bool {
        let needed = capacity_for(n);
        if needed <= self.capacity {
            return false;
        }
        log::debug!("point capacity {} -> {needed}", self.capacity);
        self.capacity = needed;
        self.positions = vec![[0.0; 2]; needed];
        self.styles = vec![PointStyle::zeroed(); needed];
        self.slot_ids = vec![0; needed];
        self.labels.resize(needed);
        true
    }

    /// Sampled check that the previous slot order still describes `points`.
    fn order_matches(&self, points: &[PointRecord], check_depth: bool) -> bool {
        self.order
            .iter()
            .zip(&self.slot_ids)
            .zip(&self.styles)
            .take(ORDER_CHECK_SLOTS)
            .all(|((&i, &id), style)| {
                points.get(i as usize).is_some_and(|p| {
                    p.id == id && (!check_depth || p.depth.to_bits() == style.depth.to_bits())
                })
            })
    }

    /// Rewrites styles and labels in the existing order.
    ///
    /// Returns `false` if a slot's point is no longer drawable; the caller then
    /// falls back to a full restage.
    fn restage_styles(&mut self, points: &[PointRecord], params: &StageParams, colors: &mut Resolver) -> bool {
        self.labels.reset();
        for slot in 0..self.count {
            let Some(p) = points.get(self.order[slot] as usize).filter(|p| is_drawable(p)) else {
                return false;
            };
            self.styles[slot] = style_for(p, params, colors);
            self.slot_ids[slot] = p.id;
            if p.is_pie() {
                self.labels.write(slot, label_texels(p, colors));
            }
        }
        true
    }

    fn restage_positions(&mut self, points: &[PointRecord], scales: &Scales) -> bool {
        for slot in 0..self.count {
            let Some(p) = points.get(self.order[slot] as usize).filter(|p| is_drawable(p)) else {
                return false;
            };
            self.positions[slot] = scales.project(p.x, p.y);
        }
        true
    }

    fn restage_full(
        &mut self,
        points: &[PointRecord],
        survivors: &[u32],
        scales: &Scales,
        params: &StageParams,
        colors: &mut Resolver,
    ) {
        let mut keys: Vec<DepthKey> = survivors
            .iter()
            .map(|&i| DepthKey::new(points[i as usize].depth, i))
            .collect();
        // Ties break on input order, so the unstable sort is still stable.
        keys.sort_unstable();

        self.order.clear();
        self.order.extend(keys.iter().map(|k| k.order));
        self.count = self.order.len();
        self.labels.reset();

        for (slot, &i) in self.order.iter().enumerate() {
            let p = &points[i as usize];
            self.positions[slot] = scales.project(p.x, p.y);
            self.styles[slot] = style_for(p, params, colors);
            self.slot_ids[slot] = p.id;
            if p.is_pie() {
                self.labels.write(slot, label_texels(p, colors));
            }
        }
    }
}

/// Visible and placeable.
#[inline]
fn is_drawable(p: &PointRecord) -> bool {
    p.is_visible() && p.x.is_finite() && p.y.is_finite()
}

fn style_for(p: &PointRecord, params: &StageParams, colors: &mut Resolver) -> PointStyle {
    let [r, g, b] = colors.resolve(p.primary_color());
    let size = p.size * params.device_pixel_ratio * params.size_scale;
    let outline = if p.has_outline() { PointStyle::OUTLINE_BIT } else { 0 };
    PointStyle {
        color: [r, g, b, p.opacity.clamp(0.0, 1.0)],
        size: if size.is_finite() { size.max(0.0) } else { 0.0 },
        depth: p.depth,
        label_count: if p.is_pie() { p.label_count() as u32 } else { 1 },
        shape_code: p.shape.index() | outline,
    }
}

fn label_texels<'a>(p: &'a PointRecord, colors: &'a mut Resolver) -> impl Iterator<Item = [u8; 4]> + 'a {
    p.colors.iter().map(move |c| {
        let [r, g, b] = colors.resolve(c);
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(r), q(g), q(b), 255]
    })
}
