//! Simulation context implementing OccucastContext for deterministic runs.

use async_trait::async_trait;
use occucast_env::OccucastContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Simulation context backed by deterministic time and RNG streams.
///
/// This implements `OccucastContext` using:
/// - A virtual clock that can be advanced manually
/// - Per-purpose ChaCha8 streams derived from one master seed
/// - Simulated sleep that advances virtual time
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time += duration.as_nanos() as u64;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Derives an independent RNG stream (human noise, planner faults, ...).
    pub fn rng_stream(&self, stream: u64) -> ChaCha8Rng {
        let combined_seed = self.seed.wrapping_mul(0x517cc1b727220a95) ^ stream;
        ChaCha8Rng::seed_from_u64(combined_seed)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
        }
    }
}

#[async_trait]
impl OccucastContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    /// Virtual time counted from the Unix epoch.
    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Sleeping only moves the virtual clock
        self.advance_time(duration);
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));

        assert_eq!(ctx.time_ns(), 1_500_000_000);
        assert_eq!(
            ctx.system_time().duration_since(UNIX_EPOCH).unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_rng_streams_are_deterministic() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);

        let a: u64 = ctx1.rng_stream(1).gen();
        let b: u64 = ctx2.rng_stream(1).gen();
        assert_eq!(a, b);

        let c: u64 = ctx1.rng_stream(2).gen();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_sleep_advances_virtual_clock() {
        let ctx = SimContext::new(7);
        ctx.sleep(Duration::from_millis(100)).await;
        assert_eq!(ctx.now(), Duration::from_millis(100));
        assert_eq!(ctx.seed(), 7);
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        // Both should see the same time
        assert_eq!(ctx1.now(), ctx2.now());
    }
}
