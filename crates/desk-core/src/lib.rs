//! Shared building blocks for the portal crates: clocks and expiry helpers for
//! TTL logic, and the atomic write used when storing uploads.

pub mod atomic_io;
pub mod clock;

pub use atomic_io::write_bytes_atomic;
pub use clock::{
    current_unix_timestamp, current_unix_timestamp_ms, expiry_after, is_expired_unix_ms, Clock,
    ManualClock, SharedClock, SystemClock,
};
