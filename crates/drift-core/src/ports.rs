//! Host ports consumed by the planning core.
//!
//! The core performs no I/O of its own; it is parameterized by the two
//! capabilities it actually needs -- hashing and wall-clock time. Surrounding
//! code (CLI, adapters, executors) owns everything else.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by a host port.
///
/// Port failures are propagated verbatim; the core never retries or masks
/// them.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The crypto port failed to produce a digest.
    #[error("crypto port failure: {0}")]
    Crypto(String),

    /// The clock port failed to produce an instant.
    #[error("clock port failure: {0}")]
    Clock(String),
}

/// Convenience alias for port-backed operations.
pub type Result<T> = std::result::Result<T, PortError>;

// ---------------------------------------------------------------------------
// Port traits
// ---------------------------------------------------------------------------

/// Deterministic hashing capability.
///
/// Implementations must return the same digest for the same input bytes.
pub trait CryptoPort {
    /// Hashes `data` and returns the lowercase hex digest.
    fn hash_hex(&self, data: &[u8]) -> Result<String>;
}

/// Wall-clock capability.
pub trait ClockPort {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

// Allow passing ports by reference.
impl<T: CryptoPort + ?Sized> CryptoPort for &T {
    fn hash_hex(&self, data: &[u8]) -> Result<String> {
        (**self).hash_hex(data)
    }
}

impl<T: ClockPort + ?Sized> ClockPort for &T {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

// ---------------------------------------------------------------------------
// Default implementations
// ---------------------------------------------------------------------------

/// SHA-256 implementation of [`CryptoPort`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Crypto;

impl CryptoPort for Sha256Crypto {
    fn hash_hex(&self, data: &[u8]) -> Result<String> {
        Ok(format!("{:x}", Sha256::digest(data)))
    }
}

/// System-clock implementation of [`ClockPort`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant. Intended for tests and replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Timestamp formatting
// ---------------------------------------------------------------------------

/// Formats an instant as an ISO-8601 UTC string with millisecond precision
/// (`2025-08-28T12:00:00.000Z`).
///
/// This is the canonical wire form for metadata timestamps and deployment
/// tags; [`parse_iso_millis`] accepts exactly the strings this produces.
pub fn iso_millis(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an ISO-8601 string, requiring that it round-trips through
/// [`iso_millis`] unchanged.
///
/// Returns `None` for unparsable input or for instants rendered in another
/// form (offset notation, missing milliseconds, extra precision).
pub fn parse_iso_millis(s: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc);
    if iso_millis(&parsed) == s {
        Some(parsed)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
