//! In-process reference backend for `floe`.
//!
//! [`MemoryBackend`] implements the same atomic grant the bundled Lua routine
//! performs on a real counter service, guarded by a single mutex instead of a
//! script engine. It exists so the full generator stack — script
//! installation, round-robin selection, retries, encoding — can be exercised
//! end to end without a network, and doubles as a reference for writing real
//! transport adapters.
//!
//! One deliberate difference from the Lua routine: the routine holds a
//! rollover lock key for 1 ms after the counter wraps, refusing grants while
//! it is live. Here the mutex already serializes callers, so the lock is not
//! emulated; tests drive a [`ManualClock`] across wrap points instead.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use floe::{
    AllocateOutcome, AllocateRequest, Allocation, BackendError, ScriptIdentity, SequenceBackend,
};
use parking_lot::Mutex;

/// The backend node's own wall clock, as (whole seconds, microsecond
/// remainder). The generator stamps IDs with this clock, not the caller's.
pub trait BackendClock: Send + Sync {
    fn now(&self) -> (u64, u64);
}

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl BackendClock for SystemClock {
    fn now(&self) -> (u64, u64) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        (now.as_secs(), u64::from(now.subsec_micros()))
    }
}

/// A clock that only moves when told to. For tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new(seconds: u64, microseconds: u64) -> Self {
        Self {
            micros: AtomicU64::new(seconds * 1_000_000 + microseconds),
        }
    }

    pub fn set(&self, seconds: u64, microseconds: u64) {
        self.micros
            .store(seconds * 1_000_000 + microseconds, Ordering::Relaxed);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.micros.fetch_add(millis * 1000, Ordering::Relaxed);
    }
}

impl BackendClock for ManualClock {
    fn now(&self) -> (u64, u64) {
        let micros = self.micros.load(Ordering::Relaxed);
        (micros / 1_000_000, micros % 1_000_000)
    }
}

struct State {
    sequence: u64,
    logical_shard_id: u64,
    installed: HashSet<String>,
    failures_remaining: u32,
}

/// One simulated counter-service node.
///
/// Like a real node, it starts with no routine resident (`allocate` reports
/// `NotInstalled` until `install_script` runs) and carries a pre-provisioned
/// logical shard id. Shard id 0 models an unprovisioned node.
pub struct MemoryBackend<C = SystemClock> {
    state: Mutex<State>,
    clock: C,
}

impl MemoryBackend<SystemClock> {
    /// A node with the given shard id, using the real wall clock.
    pub fn new(logical_shard_id: u64) -> Self {
        Self::with_clock(logical_shard_id, SystemClock)
    }
}

impl<C: BackendClock> MemoryBackend<C> {
    /// A node with the given shard id and a caller-supplied clock.
    pub fn with_clock(logical_shard_id: u64, clock: C) -> Self {
        Self {
            state: Mutex::new(State {
                sequence: 0,
                logical_shard_id,
                installed: HashSet::new(),
                failures_remaining: 0,
            }),
            clock,
        }
    }

    /// Re-provisions the node's shard id. Setting 0 simulates a node that
    /// was never provisioned.
    pub fn set_logical_shard_id(&self, logical_shard_id: u64) {
        self.state.lock().logical_shard_id = logical_shard_id;
    }

    /// Makes the next `n` allocate calls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().failures_remaining = n;
    }

    /// The node's clock, so tests can drive time.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: BackendClock> SequenceBackend for MemoryBackend<C> {
    fn install_script(&self, source: &str) -> Result<String, BackendError> {
        let digest = ScriptIdentity::new(source).sha1_hex().to_owned();
        self.state.lock().installed.insert(digest.clone());
        Ok(digest)
    }

    fn allocate(
        &self,
        script: &ScriptIdentity,
        request: &AllocateRequest,
    ) -> Result<AllocateOutcome, BackendError> {
        if request.batch_size == 0 {
            return Err(BackendError::Backend("batch size must be positive".into()));
        }

        let mut state = self.state.lock();
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(BackendError::Backend("injected transient failure".into()));
        }
        if !state.installed.contains(script.sha1_hex()) {
            return Ok(AllocateOutcome::NotInstalled);
        }

        // Same grant-and-wrap step as resources/allocate.lua.
        let start = if state.sequence > request.max_sequence {
            0
        } else {
            state.sequence
        };
        let granted = request.batch_size.min(request.max_sequence - start + 1);
        let end = start + granted - 1;
        state.sequence = if end >= request.max_sequence { 0 } else { end + 1 };

        let (time_seconds, time_microseconds) = self.clock.now();
        let values = [
            start,
            end,
            state.logical_shard_id,
            time_seconds,
            time_microseconds,
        ];
        Ok(AllocateOutcome::Allocated(Allocation::from_values(&values)?))
    }
}
