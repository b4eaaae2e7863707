use crate::error::BackendError;
use crate::response::Allocation;
use crate::script::ScriptIdentity;

/// Parameters of one atomic allocation call, derived from the configured
/// [`IdLayout`] and the caller's batch size.
///
/// [`IdLayout`]: crate::IdLayout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocateRequest {
    /// Counter ceiling (inclusive); the counter wraps past it.
    pub max_sequence: u64,
    /// Smallest acceptable logical shard id.
    pub min_shard_id: u64,
    /// Largest acceptable logical shard id.
    pub max_shard_id: u64,
    /// Requested number of sequences. The grant may be shorter.
    pub batch_size: u64,
}

/// Result of one `allocate` call on a backend that was reachable.
///
/// "Routine not resident" is an expected, recoverable outcome — a node added
/// to the pool simply hasn't seen the script yet — so it is a variant here,
/// not a [`BackendError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocateOutcome {
    /// The routine ran and granted a sequence block.
    Allocated(Allocation),
    /// The node does not have a routine with the given identity resident.
    /// Install it and try again.
    NotInstalled,
}

/// One physical atomic-counter node.
///
/// Implementations adapt a concrete transport (a Redis client, a test
/// double, ...) to the two operations the generator needs. The crate never
/// depends on a specific network client; connection pooling, TLS, and
/// framing all live behind this trait.
///
/// # Atomicity
///
/// `allocate` must execute the routine as one indivisible operation on the
/// node: reading the clock, reading the shard id, and advancing the counter
/// may not interleave with another `allocate` on the same node. This is what
/// makes grants collision-free across a fleet of concurrent callers.
///
/// Both operations may block on network I/O; the generator bounds that with
/// its retry policy, not with cancellation.
pub trait SequenceBackend: Send + Sync {
    /// Idempotently registers the allocation routine on this node.
    ///
    /// Returns the node-computed content-hash identity of the routine.
    /// Installing an already-resident routine is not an error.
    ///
    /// # Errors
    ///
    /// Any [`BackendError`] is treated as transient by the generator.
    fn install_script(&self, source: &str) -> Result<String, BackendError>;

    /// Runs the allocation routine addressed by `script`.
    ///
    /// # Errors
    ///
    /// Transport and protocol failures only. A missing routine is reported
    /// as [`AllocateOutcome::NotInstalled`], not as an error.
    fn allocate(
        &self,
        script: &ScriptIdentity,
        request: &AllocateRequest,
    ) -> Result<AllocateOutcome, BackendError>;
}
