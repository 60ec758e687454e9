//! Wall-clock helpers and the injectable `Clock` used for TTL expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Current Unix time in milliseconds, saturating at `u64::MAX`.
pub fn current_unix_timestamp_ms() -> u64 {
    since_epoch().as_millis().try_into().unwrap_or(u64::MAX)
}

/// Current Unix time in whole seconds.
pub fn current_unix_timestamp() -> u64 {
    since_epoch().as_secs()
}

/// An entry expiring at `expires_unix_ms` is dead once `now_unix_ms` reaches it.
pub fn is_expired_unix_ms(expires_unix_ms: Option<u64>, now_unix_ms: u64) -> bool {
    expires_unix_ms.is_some_and(|deadline| deadline <= now_unix_ms)
}

/// Deadline `ttl` after `now_unix_ms`. `None` for a zero ttl.
pub fn expiry_after(now_unix_ms: u64, ttl: Duration) -> Option<u64> {
    let ttl_ms: u64 = ttl.as_millis().try_into().unwrap_or(u64::MAX);
    (ttl_ms > 0).then(|| now_unix_ms.saturating_add(ttl_ms))
}

/// Source of wall-clock time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_unix_ms(&self) -> u64;
}

/// Clock handle shared between stores and caches.
pub type SharedClock = Arc<dyn Clock>;

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_ms(&self) -> u64 {
        current_unix_timestamp_ms()
    }
}

/// Manually advanced clock for deterministic expiry tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_unix_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_unix_ms: u64) -> Self {
        Self {
            now_unix_ms: AtomicU64::new(start_unix_ms),
        }
    }

    pub fn advance_ms(&self, delta_ms: u64) {
        let _ = self
            .now_unix_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(delta_ms))
            });
    }

    pub fn set_unix_ms(&self, value: u64) {
        self.now_unix_ms.store(value, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix_ms(&self) -> u64 {
        self.now_unix_ms.load(Ordering::SeqCst)
    }
}
