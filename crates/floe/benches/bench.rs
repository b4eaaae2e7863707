use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use floe::{
    AllocateOutcome, AllocateRequest, Allocation, BackendError, BackendPool, GeneratorConfig,
    IdGenerator, IdLayout, ScriptIdentity, SequenceBackend,
};

const EPOCH: u64 = 1455788600316;

/// In-process counter backend so the benchmark measures orchestration and
/// encoding, not a network.
struct CounterBackend {
    sequence: AtomicU64,
}

impl CounterBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sequence: AtomicU64::new(0),
        })
    }
}

impl SequenceBackend for CounterBackend {
    fn install_script(&self, source: &str) -> Result<String, BackendError> {
        Ok(ScriptIdentity::new(source).sha1_hex().to_owned())
    }

    fn allocate(
        &self,
        _script: &ScriptIdentity,
        request: &AllocateRequest,
    ) -> Result<AllocateOutcome, BackendError> {
        let start = self.sequence.fetch_add(request.batch_size, Ordering::Relaxed)
            % (request.max_sequence + 1);
        let granted = request.batch_size.min(request.max_sequence - start + 1);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before unix epoch");
        Ok(AllocateOutcome::Allocated(Allocation {
            start_sequence: start,
            end_sequence: start + granted - 1,
            logical_shard_id: 1,
            time_seconds: now.as_secs(),
            time_microseconds: u64::from(now.subsec_micros()),
        }))
    }
}

fn bench_encode(c: &mut Criterion) {
    let layout = IdLayout::new(EPOCH);
    let mut group = c.benchmark_group("layout");
    group.throughput(Throughput::Elements(1));
    group.bench_function("encode", |b| {
        b.iter(|| {
            black_box(layout.encode(
                black_box(1455788601500),
                black_box(3),
                black_box(42),
            ))
        })
    });
    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let pool = BackendPool::new(vec![CounterBackend::new() as Arc<dyn SequenceBackend>]).unwrap();
    let generator = IdGenerator::new(pool, GeneratorConfig::new(IdLayout::new(EPOCH)));

    let mut group = c.benchmark_group("generator");
    group.throughput(Throughput::Elements(1));
    group.bench_function("generate_id", |b| {
        b.iter(|| generator.generate_id().unwrap().unwrap())
    });
    group.throughput(Throughput::Elements(512));
    group.bench_function("generate_batch_of_512", |b| {
        b.iter(|| generator.generate_batch_of(512).unwrap().unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_generate);
criterion_main!(benches);
