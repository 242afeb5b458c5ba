use chrono::{DateTime, Utc};

/// Ambient wall-clock capability.
///
/// TOTP step derivation, TTL expiry checks, and session `last_seen` updates
/// all read the current time. Injecting it behind a trait lets tests drive
/// TOTP steps and expiries deterministically instead of racing the real
/// clock.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// A [`Clock`] backed by the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
