/// A convenient result alias, defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors the generator surfaces to callers.
///
/// Transient backend failures never appear here: they are logged and folded
/// into the retry loop, and total exhaustion is reported as an absent result
/// (`Ok(None)`) rather than an error. What remains are configuration faults
/// (construction-time) and validation faults (per call, never retried).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The timestamp, shard, and sequence bit widths do not total 63.
    #[error("timestamp ({timestamp_bits}) + shard ({shard_bits}) + sequence ({sequence_bits}) bits must total 63")]
    InvalidLayout {
        timestamp_bits: u8,
        shard_bits: u8,
        sequence_bits: u8,
    },

    /// A backend pool was constructed from an empty backend list.
    #[error("backend pool requires at least one backend")]
    EmptyPool,

    /// The allocation routine could not be read from the given resource.
    ///
    /// The generator is unusable without its routine, so this is fatal at
    /// construction time.
    #[error("failed to load allocation script: {0}")]
    ScriptLoad(#[from] std::io::Error),

    /// The requested batch size is outside `1..=max_sequence + 1`.
    #[error("batch size {requested} is outside 1..={max}")]
    InvalidBatchSize { requested: u64, max: u64 },

    /// A backend reported a logical shard id outside the configured bounds.
    ///
    /// A shard id of 0 means the node was never provisioned. Either way this
    /// is a node misconfiguration: encoding it would risk colliding with IDs
    /// from a correctly provisioned shard, so the whole call is aborted.
    #[error("logical shard id {shard_id} is outside {min}..={max}")]
    InvalidLogicalShardId { shard_id: u64, min: u64, max: u64 },
}

/// Failures reported by a [`SequenceBackend`] implementation.
///
/// The generator treats every variant as transient: the attempt is logged and
/// the retry loop moves on to the next backend.
///
/// [`SequenceBackend`]: crate::SequenceBackend
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackendError {
    /// An I/O failure while talking to the backend node.
    #[error("i/o error talking to backend: {0}")]
    Io(#[from] std::io::Error),

    /// The backend replied, but not with five non-negative integers in the
    /// expected order.
    #[error("malformed allocation response: {reason}")]
    MalformedResponse { reason: String },

    /// The backend reported an application-level error (for example, the
    /// rollover lock was held).
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_bounds() {
        let err = Error::InvalidBatchSize {
            requested: 5000,
            max: 4096,
        };
        assert_eq!(err.to_string(), "batch size 5000 is outside 1..=4096");

        let err = Error::InvalidLogicalShardId {
            shard_id: 0,
            min: 1,
            max: 1023,
        };
        assert_eq!(err.to_string(), "logical shard id 0 is outside 1..=1023");
    }

    #[test]
    fn backend_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
        let err = BackendError::from(io);
        assert!(matches!(err, BackendError::Io(_)));
    }
}
