//! Core environment context trait for Occucast nodes.

use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// The clock and entropy seam between the prediction node and the world.
///
/// The node never reads the system clock directly, so the same runtime
/// code runs against the wall clock in production and against a manually
/// advanced virtual clock in the simulator.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and the system clock
/// - **Simulation**: `SimContext` - virtual clock advanced by the harness
#[async_trait]
pub trait OccucastContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Grid message stamps are expressed on this clock.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time, used for human-readable session logs.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
