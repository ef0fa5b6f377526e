//! Call-counting wrapper around a tick timer.

use metaflux_core::{TickTimer, TimerId};
use std::collections::HashSet;
use std::time::Duration;

/// Records every arm/cancel passing through to the wrapped timer.
///
/// Scenarios assert on `max_live` to check that playback never keeps more
/// than one tick timer alive.
#[derive(Debug, Default)]
pub struct LedgerTimer<T: TickTimer> {
    inner: T,
    armed: u64,
    cancelled: u64,
    live: HashSet<TimerId>,
    max_live: usize,
}

impl<T: TickTimer> LedgerTimer<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            armed: 0,
            cancelled: 0,
            live: HashSet::new(),
            max_live: 0,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Total `arm` calls.
    pub fn armed(&self) -> u64 {
        self.armed
    }

    /// Total `cancel` calls, including repeats.
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    /// Timers armed and not yet cancelled.
    pub fn live(&self) -> usize {
        self.live.len()
    }

    /// Highest `live` count ever observed.
    pub fn max_live(&self) -> usize {
        self.max_live
    }
}

impl<T: TickTimer> TickTimer for LedgerTimer<T> {
    fn arm(&mut self, interval: Duration) -> TimerId {
        let id = self.inner.arm(interval);
        self.armed += 1;
        self.live.insert(id);
        self.max_live = self.max_live.max(self.live.len());
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.inner.cancel(id);
        self.cancelled += 1;
        self.live.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Sequential(u64);

    impl TickTimer for Sequential {
        fn arm(&mut self, _interval: Duration) -> TimerId {
            self.0 += 1;
            TimerId(self.0)
        }

        fn cancel(&mut self, _id: TimerId) {}
    }

    #[test]
    fn test_counts_arm_and_cancel() {
        let mut timer = LedgerTimer::new(Sequential::default());
        let a = timer.arm(Duration::from_millis(500));
        timer.cancel(a);
        timer.cancel(a);
        let _b = timer.arm(Duration::from_millis(500));

        assert_eq!(timer.armed(), 2);
        assert_eq!(timer.cancelled(), 2);
        assert_eq!(timer.live(), 1);
        assert_eq!(timer.max_live(), 1);
    }

    #[test]
    fn test_overlapping_timers_are_visible() {
        let mut timer = LedgerTimer::new(Sequential::default());
        timer.arm(Duration::from_millis(500));
        timer.arm(Duration::from_millis(500));
        assert_eq!(timer.max_live(), 2);
    }
}
