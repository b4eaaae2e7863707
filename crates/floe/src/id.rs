use core::fmt;

use crate::layout::IdLayout;

/// A generated 63-bit, k-ordered identifier.
///
/// Carries the encoded word plus the absolute timestamp it was minted with,
/// so callers can key time-partitioned storage without re-deriving the
/// timestamp from the bit layout. Pure value: `Copy`, immutable, freely
/// shareable across threads.
///
/// Ordering compares the encoded word, which sorts IDs by timestamp first
/// (within backend clock resolution), then shard, then sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Id {
    value: u64,
    timestamp_millis: u64,
}

impl Id {
    /// Builds an `Id` from an already-encoded word and its timestamp.
    pub const fn from_parts(value: u64, timestamp_millis: u64) -> Self {
        Self {
            value,
            timestamp_millis,
        }
    }

    /// The encoded 63-bit word.
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Absolute timestamp in milliseconds since the Unix epoch, as observed
    /// by the issuing backend's clock.
    pub const fn timestamp_millis(&self) -> u64 {
        self.timestamp_millis
    }

    /// Decodes the logical shard id under the given layout.
    pub const fn shard_id(&self, layout: &IdLayout) -> u64 {
        layout.decode_shard_id(self.value)
    }

    /// Decodes the sequence under the given layout.
    pub const fn sequence(&self, layout: &IdLayout) -> u64 {
        layout.decode_sequence(self.value)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
