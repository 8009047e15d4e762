use crate::scene::PointRecord;

use super::PlotConfig;

/// Linear data→pixel mapping.
///
/// A degenerate domain (zero span) maps every value to the middle of the range.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LinearScale {
    pub domain: [f64; 2],
    pub range: [f64; 2],
}

impl LinearScale {
    #[inline]
    pub const fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        Self { domain, range }
    }

    #[inline]
    pub fn apply(&self, v: f64) -> f64 {
        let span = self.domain[1] - self.domain[0];
        if span == 0.0 || !span.is_finite() {
            return (self.range[0] + self.range[1]) * 0.5;
        }
        let t = (v - self.domain[0]) / span;
        self.range[0] + t * (self.range[1] - self.range[0])
    }

    fn bits(&self) -> [u64; 4] {
        [
            self.domain[0].to_bits(),
            self.domain[1].to_bits(),
            self.range[0].to_bits(),
            self.range[1].to_bits(),
        ]
    }
}

/// Bounding box of the finite point coordinates in data space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Extent {
    /// Returns `None` when no point has finite coordinates.
    pub fn of(points: &[PointRecord]) -> Option<Self> {
        let mut it = points.iter().filter(|p| p.x.is_finite() && p.y.is_finite());
        let first = it.next()?;
        let mut e = Extent { min_x: first.x, max_x: first.x, min_y: first.y, max_y: first.y };
        for p in it {
            e.min_x = e.min_x.min(p.x);
            e.max_x = e.max_x.max(p.x);
            e.min_y = e.min_y.min(p.y);
            e.max_y = e.max_y.max(p.y);
        }
        Some(e)
    }

    /// Grows each axis by `fraction` of its span on both sides.
    ///
    /// Zero-span axes are widened by one unit each way so they still map to a
    /// usable range.
    pub fn padded(&self, fraction: f64) -> Self {
        let pad = |lo: f64, hi: f64| {
            let span = hi - lo;
            if span > 0.0 { (lo - span * fraction, hi + span * fraction) } else { (lo - 1.0, hi + 1.0) }
        };
        let (min_x, max_x) = pad(self.min_x, self.max_x);
        let (min_y, max_y) = pad(self.min_y, self.max_y);
        Self { min_x, max_x, min_y, max_y }
    }
}

/// The pair of scales used to place points, in CSS pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Scales {
    pub x: LinearScale,
    pub y: LinearScale,
}

impl Scales {
    /// Padding added around the data extent on each axis.
    pub const DOMAIN_PADDING: f64 = 0.05;

    #[inline]
    pub const fn new(x: LinearScale, y: LinearScale) -> Self {
        Self { x, y }
    }

    /// Standard layout: padded data extent mapped into the margin box, y up.
    pub fn fit(points: &[PointRecord], config: &PlotConfig) -> Option<Self> {
        Extent::of(points).map(|e| Self::for_extent(e, config))
    }

    pub fn for_extent(extent: Extent, config: &PlotConfig) -> Self {
        let e = extent.padded(Self::DOMAIN_PADDING);
        let m = config.margin;
        let (left, top) = (m.left as f64, m.top as f64);
        let x = LinearScale::new([e.min_x, e.max_x], [left, left + config.inner_width() as f64]);
        let y = LinearScale::new([e.min_y, e.max_y], [top + config.inner_height() as f64, top]);
        Self { x, y }
    }

    #[inline]
    pub fn project(&self, x: f64, y: f64) -> [f32; 2] {
        [self.x.apply(x) as f32, self.y.apply(y) as f32]
    }

    /// Exact bit pattern of both scales; part of the data signature.
    pub fn fingerprint(&self) -> [u64; 8] {
        let [a, b, c, d] = self.x.bits();
        let [e, f, g, h] = self.y.bits();
        [a, b, c, d, e, f, g, h]
    }
}
