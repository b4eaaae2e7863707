use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::SequenceBackend;
use crate::error::{Error, Result};

/// Fair round-robin selection over a fixed set of backend nodes.
///
/// Membership is fixed at construction: failover is the generator's retry
/// loop re-selecting on each attempt, and scaling out means building a new
/// pool. The cursor is a relaxed atomic increment, so `next()` is lock-free
/// and safe under concurrent callers; over any window of `len * k` calls
/// each backend is selected exactly `k` times.
pub struct BackendPool {
    backends: Vec<Arc<dyn SequenceBackend>>,
    cursor: AtomicUsize,
}

impl BackendPool {
    /// Builds a pool over the given backends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPool`] if `backends` is empty.
    pub fn new(backends: Vec<Arc<dyn SequenceBackend>>) -> Result<Self> {
        if backends.is_empty() {
            return Err(Error::EmptyPool);
        }
        Ok(Self {
            backends,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Returns the next backend in cyclic order.
    pub fn next(&self) -> &Arc<dyn SequenceBackend> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.backends.len();
        &self.backends[index]
    }

    /// Number of backends in the pool. Never zero.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AllocateOutcome, AllocateRequest};
    use crate::error::BackendError;
    use crate::script::ScriptIdentity;
    use std::thread;

    /// Inert backend used only to give the pool distinct entries.
    struct NullBackend;

    impl SequenceBackend for NullBackend {
        fn install_script(&self, _source: &str) -> Result<String, BackendError> {
            unimplemented!("pool tests never install")
        }

        fn allocate(
            &self,
            _script: &ScriptIdentity,
            _request: &AllocateRequest,
        ) -> Result<AllocateOutcome, BackendError> {
            unimplemented!("pool tests never allocate")
        }
    }

    fn pool_of(n: usize) -> (Vec<Arc<dyn SequenceBackend>>, BackendPool) {
        let backends: Vec<Arc<dyn SequenceBackend>> =
            (0..n).map(|_| Arc::new(NullBackend) as _).collect();
        let pool = BackendPool::new(backends.clone()).unwrap();
        (backends, pool)
    }

    fn index_of(backends: &[Arc<dyn SequenceBackend>], picked: &Arc<dyn SequenceBackend>) -> usize {
        backends
            .iter()
            .position(|b| Arc::ptr_eq(b, picked))
            .unwrap()
    }

    #[test]
    fn rejects_empty_pool() {
        assert!(matches!(BackendPool::new(vec![]), Err(Error::EmptyPool)));
    }

    #[test]
    fn cycles_fairly_in_order() {
        let (backends, pool) = pool_of(3);
        assert_eq!(pool.backend_count(), 3);

        // 6 sequential calls: each backend twice, in cyclic order.
        let picks: Vec<usize> = (0..6).map(|_| index_of(&backends, pool.next())).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn concurrent_selection_stays_balanced() {
        let (backends, pool) = pool_of(3);

        let mut counts = [0u64; 3];
        thread::scope(|s| {
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    s.spawn(|| {
                        let mut local = [0u64; 3];
                        for _ in 0..100 {
                            local[index_of(&backends, pool.next())] += 1;
                        }
                        local
                    })
                })
                .collect();
            for handle in handles {
                let local = handle.join().unwrap();
                for (total, n) in counts.iter_mut().zip(local) {
                    *total += n;
                }
            }
        });

        // 300 selections over 3 backends: exactly 100 each, no lost updates.
        assert_eq!(counts, [100, 100, 100]);
    }
}
