//! Transaction commit timestamps attached to parts.

use std::fmt;

/// Number of low bits reserved for the logical counter.
const LOGICAL_BITS: u32 = 18;

/// Hybrid commit timestamp: physical milliseconds in the upper 46 bits and a
/// logical counter in the lower 18 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TxnTimestamp(u64);

impl TxnTimestamp {
    /// Least possible timestamp.
    pub const MIN: Self = Self(0);

    /// Construct a timestamp from its raw encoded form.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Construct a timestamp from physical milliseconds and a logical counter.
    #[inline]
    pub const fn from_parts(millis: u64, logical: u32) -> Self {
        Self((millis << LOGICAL_BITS) | (logical as u64 & ((1 << LOGICAL_BITS) - 1)))
    }

    /// Construct a timestamp at the start of the given unix second.
    #[inline]
    pub const fn from_unix_secs(secs: u64) -> Self {
        Self::from_parts(secs.saturating_mul(1000), 0)
    }

    /// Raw encoded value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Physical component in milliseconds.
    #[inline]
    pub const fn to_millis(self) -> u64 {
        self.0 >> LOGICAL_BITS
    }

    /// Physical component truncated to seconds.
    #[inline]
    pub const fn to_second(self) -> u64 {
        self.to_millis() / 1000
    }
}

impl From<u64> for TxnTimestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TxnTimestamp> for u64 {
    fn from(ts: TxnTimestamp) -> Self {
        ts.0
    }
}

impl fmt::Debug for TxnTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TxnTimestamp").field(&self.0).finish()
    }
}

impl fmt::Display for TxnTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
