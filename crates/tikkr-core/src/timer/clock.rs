//! Time sources for the engine.
//!
//! The countdown reads a monotonic millisecond counter; history timestamps
//! read the wall clock. Both come from one `Clock` so tests can drive them
//! together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;

    /// Current wall-clock time.
    fn wall_time(&self) -> DateTime<Utc>;
}

/// Process clock.
///
/// Built on `tokio::time::Instant`, so under a paused tokio test runtime it
/// follows the virtual clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-advanced clock. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct ManualClock {
    elapsed_ms: Arc<AtomicU64>,
    base: DateTime<Utc>,
}

impl ManualClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            elapsed_ms: Arc::new(AtomicU64::new(0)),
            base,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.elapsed_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.elapsed_ms.load(Ordering::SeqCst)
    }

    fn wall_time(&self) -> DateTime<Utc> {
        self.base + Duration::milliseconds(self.now_ms() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::default();
        let other = clock.clone();
        clock.advance_secs(3);
        assert_eq!(other.now_ms(), 3000);
        assert_eq!(
            other.wall_time() - clock.wall_time(),
            Duration::zero()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn system_clock_follows_paused_runtime() {
        let clock = SystemClock::new();
        tokio::time::advance(std::time::Duration::from_millis(1500)).await;
        assert_eq!(clock.now_ms(), 1500);
    }
}
