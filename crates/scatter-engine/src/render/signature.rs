use crate::coords::Scales;
use crate::paint::Resolver;
use crate::scene::PointRecord;

use super::buffers::StageParams;

/// Indices sampled for the data signature: first, middle, last.
fn data_samples(n: usize) -> [usize; 3] {
    [0, n / 2, n.saturating_sub(1)]
}

/// Indices sampled for the style signature: first, ⅓, ⅔, last.
fn style_samples(n: usize) -> [usize; 4] {
    [0, n / 3, 2 * n / 3, n.saturating_sub(1)]
}

/// Coordinates truncated to two decimals.
#[inline]
fn truncated(v: f64) -> i64 {
    if v.is_finite() { (v * 100.0).trunc() as i64 } else { i64::MIN }
}

/// Cheap fingerprint of what the position stream depends on.
///
/// Sampled, not exhaustive: a change confined to unsampled points with the
/// same count and scales is not detected. Hosts that mutate points in place
/// call `invalidate` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSignature {
    count: usize,
    samples: [(i64, i64); 3],
    scales: [u64; 8],
}

impl DataSignature {
    pub fn compute(points: &[PointRecord], scales: &Scales) -> Self {
        let n = points.len();
        let mut samples = [(0, 0); 3];
        if n > 0 {
            for (slot, i) in samples.iter_mut().zip(data_samples(n)) {
                let p = &points[i];
                *slot = (truncated(p.x), truncated(p.y));
            }
        }
        Self { count: n, samples, scales: scales.fingerprint() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StyleSample {
    id: u64,
    opacity: u32,
    depth: u32,
    color: [u32; 3],
}

/// Fingerprint of what the style stream (and therefore draw order) depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSignature {
    count: usize,
    samples: Vec<StyleSample>,
    dpr: u32,
    size_scale: u32,
}

impl StyleSignature {
    pub fn compute(points: &[PointRecord], params: &StageParams, colors: &mut Resolver) -> Self {
        let n = points.len();
        let samples = if n == 0 {
            Vec::new()
        } else {
            style_samples(n)
                .into_iter()
                .map(|i| {
                    let p = &points[i];
                    let [r, g, b] = colors.resolve(p.primary_color());
                    StyleSample {
                        id: p.id,
                        opacity: p.opacity.to_bits(),
                        depth: p.depth.to_bits(),
                        color: [r.to_bits(), g.to_bits(), b.to_bits()],
                    }
                })
                .collect()
        };
        Self {
            count: n,
            samples,
            dpr: params.device_pixel_ratio.to_bits(),
            size_scale: params.size_scale.to_bits(),
        }
    }

    /// `true` when the same points were sampled and none changed depth.
    pub fn same_depths(&self, other: &Self) -> bool {
        self.samples.len() == other.samples.len()
            && self
                .samples
                .iter()
                .zip(&other.samples)
                .all(|(a, b)| a.id == b.id && a.depth == b.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::PlotConfig;
    use crate::paint::resolver;

    fn points(n: usize) -> Vec<PointRecord> {
        (0..n).map(|i| PointRecord::new(i as u64, i as f64, (i * 2) as f64, "#336699")).collect()
    }

    fn scales(pts: &[PointRecord]) -> Scales {
        Scales::fit(pts, &PlotConfig::new(400.0, 300.0)).unwrap()
    }

    #[test]
    fn data_signature_ignores_sub_centesimal_moves() {
        let a = points(10);
        let mut b = a.clone();
        b[0].x += 0.001;
        let s = scales(&a);
        assert_eq!(DataSignature::compute(&a, &s), DataSignature::compute(&b, &s));

        b[9].y += 1.0;
        assert_ne!(DataSignature::compute(&a, &s), DataSignature::compute(&b, &s));
    }

    #[test]
    fn data_signature_tracks_scales_and_count() {
        let a = points(10);
        let s = scales(&a);
        let other = Scales::fit(&a, &PlotConfig::new(800.0, 300.0)).unwrap();
        assert_ne!(DataSignature::compute(&a, &s), DataSignature::compute(&a, &other));
        assert_ne!(DataSignature::compute(&a, &s), DataSignature::compute(&a[..9], &s));
    }

    #[test]
    fn sampled_depths_compare_separately_from_colors() {
        let a = points(300);
        let params = StageParams::default();
        let mut r = resolver();
        let base = StyleSignature::compute(&a, &params, &mut r);

        let mut recolored = a.clone();
        recolored[100].colors = vec!["red".into()];
        let other = StyleSignature::compute(&recolored, &params, &mut r);
        assert_ne!(base, other);
        assert!(base.same_depths(&other));

        let mut nearer = a.clone();
        nearer[100].depth = 0.0;
        assert!(!base.same_depths(&StyleSignature::compute(&nearer, &params, &mut r)));
        assert!(!base.same_depths(&StyleSignature::compute(&a[..10], &params, &mut r)));
    }

    #[test]
    fn style_signature_tracks_sampled_styles_and_params() {
        let a = points(12);
        let params = StageParams::default();
        let mut r = resolver();
        let base = StyleSignature::compute(&a, &params, &mut r);

        let mut b = a.clone();
        b[4].opacity = 0.5; // n / 3
        assert_ne!(base, StyleSignature::compute(&b, &params, &mut r));

        let mut c = a.clone();
        c[11].colors = vec!["red".into()];
        assert_ne!(base, StyleSignature::compute(&c, &params, &mut r));

        let hi_dpi = StageParams { device_pixel_ratio: 2.0, ..params };
        assert_ne!(base, StyleSignature::compute(&a, &hi_dpi, &mut r));
        assert_eq!(base, StyleSignature::compute(&a, &params, &mut r));
    }

    #[test]
    fn empty_input_has_stable_signatures() {
        let s = scales(&points(2));
        let mut r = resolver();
        assert_eq!(DataSignature::compute(&[], &s), DataSignature::compute(&[], &s));
        let p = StageParams::default();
        assert_eq!(StyleSignature::compute(&[], &p, &mut r), StyleSignature::compute(&[], &p, &mut r));
    }
}
