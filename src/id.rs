use std::fmt;

use ulid::Ulid;

/// Identifier associated with a merge-tree table.
///
/// Background statistics and log events are keyed by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(Ulid);

impl TableId {
    /// Create a new identifier from a freshly generated ULID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Wrap an existing ULID.
    #[must_use]
    pub const fn from_ulid(value: Ulid) -> Self {
        Self(value)
    }

    /// Access the underlying ULID.
    #[must_use]
    pub const fn as_ulid(self) -> Ulid {
        self.0
    }
}

impl Default for TableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
