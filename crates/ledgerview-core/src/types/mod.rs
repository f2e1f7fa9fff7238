//! # Core Type Definitions
//!
//! Identifiers and errors shared by every ledgerview module:
//! - Ledger identifiers (`Address`, `Uint256`)
//! - Tracked entities (`Entity`)
//! - Log ranges (`ScanWindow`)
//! - Error types (`ViewError`)
//!
//! ## Normalization Guarantees
//!
//! Equality is exact after normalization:
//! - Addresses are lowercased `0x` + 40 hex digits
//! - Integers are canonical 256-bit values regardless of decimal/hex spelling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// ADDRESS
// =============================================================================

/// A ledger account address, case-normalized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Number of hex digits after the `0x` prefix.
    pub const HEX_LEN: usize = 40;

    /// Parse and normalize an address.
    ///
    /// Accepts either case and surrounding whitespace. Rejects anything that
    /// is not `0x` followed by exactly 40 hex digits.
    pub fn parse(text: &str) -> Result<Self, ViewError> {
        let trimmed = text.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ViewError::InvalidIdentifier(format!("address '{}'", text)))?;

        if hex.len() != Self::HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ViewError::InvalidIdentifier(format!("address '{}'", text)));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Build the address whose low bytes hold `n`. Handy for fixtures.
    #[must_use]
    pub fn from_low_u64(n: u64) -> Self {
        Self(format!("0x{:040x}", n))
    }

    /// The all-zero address the ledger returns for "no such account".
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form: `0x1234…cdef`.
    #[must_use]
    pub fn short(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ViewError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

// =============================================================================
// UINT256
// =============================================================================

/// An unsigned 256-bit ledger integer (group ids, timestamps).
///
/// Stored big-endian so the derived `Ord` is numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uint256([u8; 32]);

impl Uint256 {
    pub const ZERO: Self = Self([0; 32]);

    /// Parse decimal text or `0x`-prefixed hex text.
    ///
    /// Leading zeros are accepted; values wider than 256 bits are rejected.
    pub fn parse(text: &str) -> Result<Self, ViewError> {
        let trimmed = text.trim();
        let (digits, radix) = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => (hex, 16u16),
            None => (trimmed, 10u16),
        };

        if digits.is_empty() {
            return Err(ViewError::InvalidIdentifier(format!("integer '{}'", text)));
        }

        let mut bytes = [0u8; 32];
        for ch in digits.chars() {
            let digit = ch
                .to_digit(u32::from(radix))
                .ok_or_else(|| ViewError::InvalidIdentifier(format!("integer '{}'", text)))?;

            let mut carry = digit as u16;
            for byte in bytes.iter_mut().rev() {
                let acc = u16::from(*byte) * radix + carry;
                *byte = (acc & 0xff) as u8;
                carry = acc >> 8;
            }
            if carry != 0 {
                return Err(ViewError::InvalidIdentifier(format!(
                    "integer '{}' exceeds 256 bits",
                    text
                )));
            }
        }

        Ok(Self(bytes))
    }

    /// Narrow to `u64` when the value fits.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[..24].iter().any(|&b| b != 0) {
            return None;
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[24..]);
        Some(u64::from_be_bytes(low))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl From<u64> for Uint256 {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Repeated long division by ten over the big-endian bytes.
        let mut work = self.0;
        let mut digits = Vec::new();
        loop {
            let mut rem: u16 = 0;
            let mut exhausted = true;
            for byte in &mut work {
                let acc = (rem << 8) | u16::from(*byte);
                *byte = (acc / 10) as u8;
                rem = acc % 10;
                if *byte != 0 {
                    exhausted = false;
                }
            }
            digits.push(char::from(b'0' + rem as u8));
            if exhausted {
                break;
            }
        }
        let text: String = digits.iter().rev().collect();
        f.write_str(&text)
    }
}

impl FromStr for Uint256 {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uint256 {
    type Error = ViewError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Uint256> for String {
    fn from(value: Uint256) -> Self {
        value.to_string()
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// An identifier tracked by a materialized view.
///
/// Ordering is total and deterministic, so entities can key `BTreeMap`s.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    /// A counterpart account (friends domain).
    Account { address: Address },
    /// A group (groups domain).
    Group { id: Uint256 },
    /// A single logged message (group messages domain).
    Message {
        group: Uint256,
        height: u64,
        log_index: u32,
    },
    /// A one-to-one chat session (sessions domain).
    Session { id: Uint256 },
}

impl Entity {
    #[must_use]
    pub fn account(address: Address) -> Self {
        Self::Account { address }
    }

    #[must_use]
    pub fn group(id: Uint256) -> Self {
        Self::Group { id }
    }

    #[must_use]
    pub fn session(id: Uint256) -> Self {
        Self::Session { id }
    }

    #[must_use]
    pub fn message(group: Uint256, height: u64, log_index: u32) -> Self {
        Self::Message {
            group,
            height,
            log_index,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account { address } => write!(f, "{}", address),
            Self::Group { id } => write!(f, "group #{}", id),
            Self::Message {
                group,
                height,
                log_index,
            } => write!(f, "message {}@{}:{}", group, height, log_index),
            Self::Session { id } => write!(f, "session #{}", id),
        }
    }
}

// =============================================================================
// SCAN WINDOW
// =============================================================================

/// An inclusive log-height range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWindow {
    from: u64,
    to: u64,
}

impl ScanWindow {
    /// Create a window, rejecting `from > to`.
    pub fn new(from: u64, to: u64) -> Result<Self, ViewError> {
        if from > to {
            return Err(ViewError::ScanFailed(format!(
                "inverted scan window [{}, {}]",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// The most recent `size` heights ending at `height`, clamped at genesis.
    #[must_use]
    pub const fn narrow(height: u64, size: u64) -> Self {
        Self {
            from: height.saturating_sub(size),
            to: height,
        }
    }

    /// Everything from genesis to `height`.
    #[must_use]
    pub const fn full(height: u64) -> Self {
        Self { from: 0, to: height }
    }

    #[must_use]
    pub const fn from(&self) -> u64 {
        self.from
    }

    #[must_use]
    pub const fn to(&self) -> u64 {
        self.to
    }

    /// Whether this window already starts at genesis.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.from == 0
    }

    #[must_use]
    pub const fn contains(&self, height: u64) -> bool {
        self.from <= height && height <= self.to
    }
}

impl fmt::Display for ScanWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced to callers of a view.
///
/// Scan and resolve failures are transient and caller-retryable; the view
/// that was installed before the failure stays installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// Height read or range query failed.
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    /// One or more authoritative point queries failed.
    #[error("Resolve failed: {failed} of {total} point queries failed")]
    ResolveFailed { failed: usize, total: usize },

    /// The live feed closed while the view was subscribed.
    #[error("Subscription lost: {0}")]
    SubscriptionLost(String),

    /// An identifier could not be normalized.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A write was rejected by the ledger.
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// Configuration is missing or out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
