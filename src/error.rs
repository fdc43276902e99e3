//! Errors returned by the table.

use core::fmt;

/// Errors surfaced by [`PartitionedHashMap`](crate::PartitionedHashMap) operations.
///
/// Misuse that can be caught statically (wrong visitor reference kind,
/// incompatible key iterators) is a compile error instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableError {
    /// `insert` found the key already present; the table is unchanged.
    DuplicateKey,
    /// Storage could not grow. The table keeps its previous contents and
    /// layout, and every lock has been released.
    CapacityExhausted,
    /// Partition counts must be a power of two within the supported range.
    InvalidPartitionCount(usize),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::DuplicateKey => f.write_str("key already present"),
            TableError::CapacityExhausted => f.write_str("table capacity exhausted"),
            TableError::InvalidPartitionCount(n) => write!(
                f,
                "invalid partition count {n}: expected a power of two in 1..={}",
                crate::partition::MAX_PARTITIONS
            ),
        }
    }
}

impl std::error::Error for TableError {}

impl From<hashbrown::TryReserveError> for TableError {
    fn from(_: hashbrown::TryReserveError) -> Self {
        TableError::CapacityExhausted
    }
}

impl From<std::collections::TryReserveError> for TableError {
    fn from(_: std::collections::TryReserveError) -> Self {
        TableError::CapacityExhausted
    }
}
