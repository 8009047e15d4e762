use core::cmp::Ordering;

/// Paint-order key for staged points.
///
/// Ordering rules:
/// 1) `depth`: descending (far points first, nearer points painted over them)
/// 2) `order`: ascending (input order for equal depth)
///
/// Depths are compared with `f32::total_cmp`, so NaN sorts as the farthest
/// value rather than poisoning the sort.
#[derive(Debug, Copy, Clone)]
pub struct DepthKey {
    pub depth: f32,
    pub order: u32,
}

impl DepthKey {
    #[inline]
    pub const fn new(depth: f32, order: u32) -> Self {
        Self { depth, order }
    }
}

impl Ord for DepthKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        match other.depth.total_cmp(&self.depth) {
            Ordering::Equal => self.order.cmp(&other.order),
            o => o,
        }
    }
}

impl PartialOrd for DepthKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DepthKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DepthKey {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farther_sorts_first() {
        let far = DepthKey::new(0.9, 1);
        let near = DepthKey::new(0.1, 0);
        assert!(far < near);
    }

    #[test]
    fn equal_depth_keeps_input_order() {
        let mut keys = vec![DepthKey::new(0.5, 2), DepthKey::new(0.5, 0), DepthKey::new(0.5, 1)];
        keys.sort_unstable();
        let order: Vec<u32> = keys.iter().map(|k| k.order).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn nan_depth_is_farthest() {
        let mut keys = vec![DepthKey::new(1.0, 0), DepthKey::new(f32::NAN, 1)];
        keys.sort_unstable();
        assert_eq!(keys[0].order, 1);
    }
}
