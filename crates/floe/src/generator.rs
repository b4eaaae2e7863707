use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::backend::{AllocateOutcome, AllocateRequest, SequenceBackend};
use crate::error::{BackendError, Error, Result};
use crate::id::Id;
use crate::layout::IdLayout;
use crate::pool::BackendPool;
use crate::response::Allocation;
use crate::script::{DEFAULT_ALLOCATION_SCRIPT, ScriptIdentity};

/// How many times a `generate_*` call tries before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Immutable generator configuration: the ID bit layout and the retry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    layout: IdLayout,
    max_attempts: u32,
}

impl GeneratorConfig {
    /// Configuration with the given layout and [`DEFAULT_MAX_ATTEMPTS`].
    pub const fn new(layout: IdLayout) -> Self {
        Self {
            layout,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides the retry bound. Specify 1 to try only once.
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// The configured bit layout.
    pub const fn layout(&self) -> &IdLayout {
        &self.layout
    }

    /// The configured retry bound.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Blocks the calling thread between retry attempts.
///
/// The generator sleeps only the thread that asked for an ID, never a shared
/// scheduler. Injectable so tests can assert the backoff schedule without
/// real sleeps.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper> Sleeper for Arc<S> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Default [`Sleeper`]: `std::thread::sleep`, skipping zero-length waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Generates k-ordered, globally unique 63-bit IDs from a pool of shared
/// atomic-counter backends.
///
/// Each call picks the next backend round-robin, asks it to atomically grant
/// a block of sequences along with its shard id and clock, and packs one ID
/// per granted sequence. Because the timestamp comes from the backend's own
/// clock, the backends act as a time oracle: keep their clocks synchronized
/// and IDs stay consistently orderable fleet-wide.
///
/// Transient failures (unreachable node, timeout, missing routine after a
/// reinstall) are retried against the next backend with quadratically
/// increasing sleeps — 0, 1, 4, 9, ... ms — so a struggling cluster sees
/// spread-out retries instead of a thundering herd. When every attempt is
/// exhausted the call returns `Ok(None)`: "no ID available now" is an
/// expected condition for the caller's own policy, not a program error.
///
/// The generator is `&self` throughout and safe to share across threads
/// behind an `Arc`.
pub struct IdGenerator {
    pool: BackendPool,
    config: GeneratorConfig,
    script: ScriptIdentity,
    sleeper: Box<dyn Sleeper>,
}

impl IdGenerator {
    /// Builds a generator using the bundled allocation routine
    /// ([`DEFAULT_ALLOCATION_SCRIPT`]).
    pub fn new(pool: BackendPool, config: GeneratorConfig) -> Self {
        Self::with_script(pool, config, DEFAULT_ALLOCATION_SCRIPT)
    }

    /// Builds a generator around a caller-supplied allocation routine.
    ///
    /// The source is treated as an opaque blob: it is hashed once here and
    /// addressed by that digest on every backend from then on.
    pub fn with_script(
        pool: BackendPool,
        config: GeneratorConfig,
        source: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            config,
            script: ScriptIdentity::new(source),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// Builds a generator with an allocation routine read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptLoad`] if the file cannot be read; the
    /// generator cannot function without its routine, so this fails fast.
    pub fn with_script_file(
        pool: BackendPool,
        config: GeneratorConfig,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::with_script(pool, config, source))
    }

    /// Replaces the backoff sleeper. Intended for tests and for embedding in
    /// environments with their own notion of blocking waits.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// The configuration this generator was built with.
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The identity of the allocation routine in use.
    pub const fn script(&self) -> &ScriptIdentity {
        &self.script
    }

    /// Generates a single ID.
    ///
    /// `Ok(None)` means all attempts were exhausted; try again later or
    /// escalate.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLogicalShardId`] if a backend reports an
    /// out-of-bounds shard id.
    pub fn generate_id(&self) -> Result<Option<Id>> {
        Ok(self
            .generate_batch_of(1)?
            .and_then(|ids| ids.into_iter().next()))
    }

    /// Generates the largest representable batch (`max_sequence + 1` IDs,
    /// fewer if the counter was near its wrap ceiling).
    ///
    /// # Errors
    ///
    /// See [`Self::generate_batch_of`].
    pub fn generate_batch(&self) -> Result<Option<Vec<Id>>> {
        self.generate_batch_of(self.config.layout.max_batch_size())
    }

    /// Generates up to `batch_size` IDs from a single atomic allocation.
    ///
    /// All IDs in the batch share one backend clock reading and shard id and
    /// carry consecutive sequences. The batch may be shorter than requested
    /// when the backend's counter wrapped mid-grant; it is never longer.
    ///
    /// `Ok(None)` means every attempt failed transiently; the condition is
    /// logged and the caller applies its own policy.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBatchSize`] immediately (no backend call, no retry)
    ///   if `batch_size` is outside `1..=max_sequence + 1`.
    /// - [`Error::InvalidLogicalShardId`] if a backend reports a shard id
    ///   outside the configured bounds. This aborts the whole call: it is a
    ///   node misconfiguration that retrying cannot fix, and masking it with
    ///   a success from a healthier node would hide the fault.
    pub fn generate_batch_of(&self, batch_size: u64) -> Result<Option<Vec<Id>>> {
        let layout = self.config.layout;
        let max = layout.max_batch_size();
        if batch_size == 0 || batch_size > max {
            return Err(Error::InvalidBatchSize {
                requested: batch_size,
                max,
            });
        }

        let request = AllocateRequest {
            max_sequence: layout.max_sequence(),
            min_shard_id: layout.min_shard_id(),
            max_shard_id: layout.max_shard_id(),
            batch_size,
        };

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                let backoff = u64::from((attempt - 1) * (attempt - 1));
                self.sleeper.sleep(Duration::from_millis(backoff));
            }

            let backend = self.pool.next();
            match self.allocate_with_install(backend.as_ref(), &request) {
                Ok(Some(allocation)) => {
                    let shard_id = allocation.logical_shard_id;
                    if shard_id < layout.min_shard_id() || shard_id > layout.max_shard_id() {
                        error!(
                            shard_id,
                            min = layout.min_shard_id(),
                            max = layout.max_shard_id(),
                            "backend reported an out-of-bounds logical shard id"
                        );
                        return Err(Error::InvalidLogicalShardId {
                            shard_id,
                            min: layout.min_shard_id(),
                            max: layout.max_shard_id(),
                        });
                    }
                    if allocation.end_sequence > layout.max_sequence() {
                        warn!(
                            attempt,
                            end_sequence = allocation.end_sequence,
                            max_sequence = layout.max_sequence(),
                            "backend granted sequences past the ceiling; discarding"
                        );
                        continue;
                    }
                    // A clock reading from before the custom epoch (or one
                    // that overflows milliseconds) cannot be packed into the
                    // timestamp field; treat it like any other broken reply.
                    let timestamp_millis = match allocation.timestamp_millis() {
                        Some(millis) if millis >= layout.epoch_millis() => millis,
                        _ => {
                            warn!(
                                attempt,
                                time_seconds = allocation.time_seconds,
                                epoch_millis = layout.epoch_millis(),
                                "backend clock reads outside the encodable range; discarding"
                            );
                            continue;
                        }
                    };
                    return Ok(Some(self.mint(&allocation, timestamp_millis)));
                }
                Ok(None) => {
                    warn!(
                        attempt,
                        script = %self.script,
                        "allocation routine still missing after reinstall"
                    );
                }
                Err(err) => {
                    warn!(attempt, error = %err, "allocation attempt failed");
                }
            }
        }

        error!(
            attempts = self.config.max_attempts,
            "no id generated; all attempts exhausted"
        );
        Ok(None)
    }

    /// Runs the routine on `backend`, installing it on a routine-missing
    /// reply and re-running once on the same backend. `Ok(None)` means the
    /// routine was still missing after the reinstall.
    fn allocate_with_install(
        &self,
        backend: &dyn SequenceBackend,
        request: &AllocateRequest,
    ) -> Result<Option<Allocation>, BackendError> {
        match backend.allocate(&self.script, request)? {
            AllocateOutcome::Allocated(allocation) => Ok(Some(allocation)),
            AllocateOutcome::NotInstalled => {
                backend.install_script(self.script.source())?;
                match backend.allocate(&self.script, request)? {
                    AllocateOutcome::Allocated(allocation) => Ok(Some(allocation)),
                    AllocateOutcome::NotInstalled => Ok(None),
                }
            }
        }
    }

    /// Packs one ID per granted sequence. The allocation and timestamp have
    /// already been bounds-checked.
    fn mint(&self, allocation: &Allocation, timestamp_millis: u64) -> Vec<Id> {
        let layout = &self.config.layout;
        allocation
            .sequences()
            .map(|sequence| {
                let value = layout.encode(timestamp_millis, allocation.logical_shard_id, sequence);
                Id::from_parts(value, timestamp_millis)
            })
            .collect()
    }
}
