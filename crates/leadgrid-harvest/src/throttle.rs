//! Minimum-interval pacing between external provider calls.
//!
//! Every provider call within a run is spaced at least `min_interval_ms`
//! apart. The pacer's last-call timestamp is plain unix-millis state so it
//! survives a round-trip through the checkpoint and composes with resume.
//!
//! Time is injected through [`Clock`] so the spacing property is testable
//! with a fake clock instead of real sleeps.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Source of wall-clock time and sleeping.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production clock: unix-epoch millis and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Deterministic clock for tests. Sleeping advances time instantly.
#[derive(Debug, Default)]
pub struct FakeClock {
    now_ms: AtomicU64,
}

impl FakeClock {
    #[must_use]
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
        std::future::ready(())
    }
}

/// Enforces the minimum wall-clock spacing between provider calls.
///
/// Owned by the orchestration run, not by the HTTP client, so the last-call
/// timestamp can be restored from a checkpoint before the first call of a
/// resumed run.
#[derive(Debug)]
pub struct Pacer {
    min_interval_ms: u64,
    last_call_ms: Option<u64>,
}

impl Pacer {
    #[must_use]
    pub fn new(min_interval_ms: u64) -> Self {
        Self::restore(min_interval_ms, None)
    }

    /// Rebuild a pacer from checkpointed state.
    #[must_use]
    pub fn restore(min_interval_ms: u64, last_call_ms: Option<u64>) -> Self {
        Self {
            min_interval_ms,
            last_call_ms,
        }
    }

    /// The timestamp of the most recent paced call, for checkpointing.
    #[must_use]
    pub fn last_call_ms(&self) -> Option<u64> {
        self.last_call_ms
    }

    /// Waits until at least the minimum interval has elapsed since the last
    /// paced call, then stamps the current call.
    pub async fn wait_turn<C: Clock>(&mut self, clock: &C) {
        if let Some(last) = self.last_call_ms {
            let elapsed = clock.now_ms().saturating_sub(last);
            if elapsed < self.min_interval_ms {
                clock
                    .sleep(Duration::from_millis(self.min_interval_ms - elapsed))
                    .await;
            }
        }
        self.last_call_ms = Some(clock.now_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_is_not_delayed() {
        let clock = FakeClock::starting_at(1_000);
        let mut pacer = Pacer::new(2_000);
        pacer.wait_turn(&clock).await;
        assert_eq!(clock.now_ms(), 1_000, "no sleep before the first call");
        assert_eq!(pacer.last_call_ms(), Some(1_000));
    }

    #[tokio::test]
    async fn consecutive_calls_are_spaced_by_the_minimum_interval() {
        let clock = FakeClock::starting_at(0);
        let mut pacer = Pacer::new(2_000);

        let mut stamps = Vec::new();
        for _ in 0..5 {
            pacer.wait_turn(&clock).await;
            stamps.push(clock.now_ms());
        }

        for pair in stamps.windows(2) {
            assert!(
                pair[1] - pair[0] >= 2_000,
                "gap {} below minimum interval",
                pair[1] - pair[0]
            );
        }
    }

    #[tokio::test]
    async fn elapsed_time_counts_toward_the_interval() {
        let clock = FakeClock::starting_at(0);
        let mut pacer = Pacer::new(2_000);
        pacer.wait_turn(&clock).await;

        clock.advance(1_500);
        pacer.wait_turn(&clock).await;
        // Only the 500ms remainder should have been slept.
        assert_eq!(clock.now_ms(), 2_000);
    }

    #[tokio::test]
    async fn no_wait_when_the_interval_already_passed() {
        let clock = FakeClock::starting_at(0);
        let mut pacer = Pacer::new(2_000);
        pacer.wait_turn(&clock).await;

        clock.advance(10_000);
        pacer.wait_turn(&clock).await;
        assert_eq!(clock.now_ms(), 10_000, "no sleep when already overdue");
    }

    #[tokio::test]
    async fn restored_pacer_respects_the_checkpointed_timestamp() {
        let clock = FakeClock::starting_at(1_000);
        let mut pacer = Pacer::restore(2_000, Some(500));
        pacer.wait_turn(&clock).await;
        // 500ms elapsed since the checkpointed call; 1500ms remained.
        assert_eq!(clock.now_ms(), 2_500);
    }
}
