//! # Primitives
//!
//! Fixed constants for scanning and resolution.
//!
//! These are compiled-in defaults. The app layer may override the window and
//! concurrency limits through configuration, but never below 1.

/// Default narrow scan window, in log heights.
///
/// Recent activity is the common case; the window is sized so a single range
/// request stays inside what a typical ledger node serves in one call.
pub const NARROW_WINDOW: u64 = 500_000;

/// Default cap on in-flight authoritative point queries during one resolve.
pub const MAX_IN_FLIGHT_QUERIES: usize = 20;

/// Default interval between re-reads of a focused entity, in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 5_000;

/// Longest group name or content id a write may carry. Enforced when a
/// write is accepted, never when a log is decoded.
pub const MAX_TEXT_LENGTH: usize = 4096;
