use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Availability of the GPU context behind a renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ContextState {
    /// Usable; GPU objects may or may not exist yet (they are built lazily).
    Live,
    /// The context was invalidated. Nothing touches the GPU until restored.
    Lost,
    /// Initialization failed. Every call is a no-op from here on.
    Failed,
}

/// Device-lost signal shared with the wgpu callback.
///
/// The callback may fire on a driver thread; the renderer polls the flag at the
/// start of each operation.
#[derive(Debug, Clone, Default)]
pub struct LossFlag(Arc<AtomicBool>);

impl LossFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Live/Lost/Failed state machine plus the pending-replay marker.
#[derive(Debug)]
pub struct Lifecycle {
    state: ContextState,
    replay_pending: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub const fn new() -> Self {
        Self { state: ContextState::Live, replay_pending: false }
    }

    #[inline]
    pub fn state(&self) -> ContextState {
        self.state
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.state == ContextState::Live
    }

    /// Returns `true` if this call moved the state to `Lost`.
    pub fn mark_lost(&mut self) -> bool {
        if self.state != ContextState::Live {
            return false;
        }
        log::warn!("GPU context lost; rendering suspended until restore");
        self.state = ContextState::Lost;
        self.replay_pending = false;
        true
    }

    /// Moves `Lost` back to `Live`.
    ///
    /// Returns `true` when a replay was scheduled, i.e. the host should be asked
    /// for one more frame. Restoring a context that was never lost does nothing.
    pub fn mark_restored(&mut self, has_cached_frame: bool) -> bool {
        if self.state != ContextState::Lost {
            return false;
        }
        log::info!("GPU context restored");
        self.state = ContextState::Live;
        self.replay_pending = has_cached_frame;
        has_cached_frame
    }

    /// Terminal; returns `true` the first time only.
    pub fn mark_failed(&mut self) -> bool {
        let first = self.state != ContextState::Failed;
        self.state = ContextState::Failed;
        self.replay_pending = false;
        first
    }

    /// Consumes the pending replay, if any.
    pub fn take_replay(&mut self) -> bool {
        std::mem::take(&mut self.replay_pending) && self.is_live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_then_restore_schedules_replay_once() {
        let mut lc = Lifecycle::new();
        assert!(lc.mark_lost());
        assert!(!lc.mark_lost());
        assert_eq!(lc.state(), ContextState::Lost);

        assert!(lc.mark_restored(true));
        assert!(lc.is_live());
        assert!(lc.take_replay());
        assert!(!lc.take_replay());
    }

    #[test]
    fn restore_without_cached_frame_does_not_replay() {
        let mut lc = Lifecycle::new();
        lc.mark_lost();
        assert!(!lc.mark_restored(false));
        assert!(!lc.take_replay());
    }

    #[test]
    fn restore_while_live_is_ignored() {
        let mut lc = Lifecycle::new();
        assert!(!lc.mark_restored(true));
        assert!(!lc.take_replay());
    }

    #[test]
    fn failed_is_terminal() {
        let mut lc = Lifecycle::new();
        assert!(lc.mark_failed());
        assert!(!lc.mark_failed());
        assert!(!lc.mark_lost());
        assert!(!lc.mark_restored(true));
        assert_eq!(lc.state(), ContextState::Failed);
    }

    #[test]
    fn loss_flag_is_shared_between_clones() {
        let flag = LossFlag::new();
        let seen_by_callback = flag.clone();
        assert!(!flag.is_raised());
        seen_by_callback.raise();
        assert!(flag.is_raised());
    }
}
