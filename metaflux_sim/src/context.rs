//! Simulation context implementing PlaybackContext for deterministic testing.

use async_trait::async_trait;
use metaflux_env::PlaybackContext;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulation context backed by a virtual clock and a seeded RNG.
///
/// This implements `PlaybackContext` using:
/// - A virtual clock that only moves when advanced
/// - A seeded ChaCha8 RNG for reproducible jitter
/// - Simulated sleep that advances virtual time and returns immediately
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Deterministic RNG for fault jitter and scripted user input
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = lock(&self.virtual_time_ns);
        *time += duration.as_nanos() as u64;
    }

    /// Moves virtual time forward to `time`; earlier targets are ignored.
    pub fn advance_to(&self, time: Duration) {
        let mut now = lock(&self.virtual_time_ns);
        *now = (*now).max(time.as_nanos() as u64);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *lock(&self.virtual_time_ns)
    }

    /// Returns the master seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draws a uniform value in `[0, upper)`; 0 when `upper` is 0.
    pub fn random_below(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        lock(&self.rng).gen_range(0..upper)
    }

    /// Draws a uniform value in `[low, high)`.
    pub fn random_range(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        lock(&self.rng).gen_range(low..high)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            rng: Arc::clone(&self.rng),
        }
    }
}

#[async_trait]
impl PlaybackContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        // Sleep is instantaneous in virtual time
        self.advance_time(duration);
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let _name = name.to_string();
        tokio::spawn(async move {
            future.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }

    #[test]
    fn test_advance_to_never_rewinds() {
        let ctx = SimContext::new(42);
        ctx.advance_to(Duration::from_secs(3));
        ctx.advance_to(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_sim_context_deterministic_rng() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);

        let a: Vec<u64> = (0..8).map(|_| ctx1.random_below(1000)).collect();
        let b: Vec<u64> = (0..8).map(|_| ctx2.random_below(1000)).collect();
        assert_eq!(a, b);
        assert_eq!(ctx1.random_below(0), 0);
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        // Both should see the same time
        assert_eq!(ctx1.now(), ctx2.now());
        assert_eq!(ctx2.seed(), 42);
    }

    #[tokio::test]
    async fn test_sleep_advances_virtual_clock() {
        let ctx = SimContext::new(7);
        ctx.sleep(Duration::from_secs(60)).await;
        assert_eq!(ctx.now(), Duration::from_secs(60));
    }
}
