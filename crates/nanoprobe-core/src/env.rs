//! Environment abstraction for deterministic testing.
//!
//! Decouples the reliable-transport state machine from system resources
//! (time, randomness) so it can be driven either by a live `tokio` clock in
//! production or a virtual one under `turmoil`/`tokio::time::pause()` in
//! tests, without the state machine itself ever calling into either.

use std::time::Duration;

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// Implementations MUST guarantee:
/// - `now()` never goes backwards within a single execution context.
/// - `random_bytes()` uses cryptographically secure entropy in production.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment: `std::time::Instant` in
    /// production, a virtual instant under simulation.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration. The only async method in this
    /// trait; driver code uses it, protocol logic never does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`, e.g. for a new session id.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
