use core::ops::RangeInclusive;

use crate::error::BackendError;

/// One successful reply from the allocation routine.
///
/// The routine returns five non-negative integers in a fixed order; parsing
/// is positional, never by name, to match the routine's output contract:
///
/// ```text
/// [start_sequence, end_sequence, logical_shard_id, time_seconds, time_microseconds]
/// ```
///
/// The granted range is inclusive and may be *shorter* than the requested
/// batch when the counter was close to its wrap ceiling; callers must derive
/// the count from the range, not from what they asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// First sequence granted (inclusive).
    pub start_sequence: u64,
    /// Last sequence granted (inclusive).
    pub end_sequence: u64,
    /// The issuing node's pre-provisioned shard id. 0 means unprovisioned.
    pub logical_shard_id: u64,
    /// Backend wall clock, whole seconds since the Unix epoch.
    pub time_seconds: u64,
    /// Microsecond remainder of the backend wall clock.
    pub time_microseconds: u64,
}

const START_SEQUENCE_INDEX: usize = 0;
const END_SEQUENCE_INDEX: usize = 1;
const LOGICAL_SHARD_ID_INDEX: usize = 2;
const TIME_SECONDS_INDEX: usize = 3;
const TIME_MICROSECONDS_INDEX: usize = 4;

/// Number of integers in a well-formed reply.
pub const ALLOCATION_FIELD_COUNT: usize = 5;

impl Allocation {
    /// Parses a reply from the routine's positional integer list.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::MalformedResponse`] if fewer than
    /// [`ALLOCATION_FIELD_COUNT`] values are present or the granted range is
    /// inverted.
    pub fn from_values(values: &[u64]) -> Result<Self, BackendError> {
        if values.len() < ALLOCATION_FIELD_COUNT {
            return Err(BackendError::MalformedResponse {
                reason: format!(
                    "expected {ALLOCATION_FIELD_COUNT} values, got {}",
                    values.len()
                ),
            });
        }
        let allocation = Self {
            start_sequence: values[START_SEQUENCE_INDEX],
            end_sequence: values[END_SEQUENCE_INDEX],
            logical_shard_id: values[LOGICAL_SHARD_ID_INDEX],
            time_seconds: values[TIME_SECONDS_INDEX],
            time_microseconds: values[TIME_MICROSECONDS_INDEX],
        };
        if allocation.start_sequence > allocation.end_sequence {
            return Err(BackendError::MalformedResponse {
                reason: format!(
                    "inverted sequence range {}..={}",
                    allocation.start_sequence, allocation.end_sequence
                ),
            });
        }
        Ok(allocation)
    }

    /// Number of sequences granted.
    pub const fn count(&self) -> u64 {
        self.end_sequence - self.start_sequence + 1
    }

    /// The granted sequences, in order.
    pub const fn sequences(&self) -> RangeInclusive<u64> {
        self.start_sequence..=self.end_sequence
    }

    /// Backend clock truncated to milliseconds since the Unix epoch.
    ///
    /// Sub-millisecond precision is dropped so the value fits the timestamp
    /// field. `None` if the seconds value is so large the conversion to
    /// milliseconds overflows — a degenerate clock reading, not a usable
    /// timestamp.
    pub const fn timestamp_millis(&self) -> Option<u64> {
        match self.time_seconds.checked_mul(1000) {
            Some(millis) => millis.checked_add(self.time_microseconds / 1000),
            None => None,
        }
    }
}
