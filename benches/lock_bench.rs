//! Benchmarks for lock round trips against the in-memory store

use criterion::{criterion_group, criterion_main, Criterion};
use redis_rwlock::{Config, LockService, MemoryStore};

fn lock_benchmarks(c: &mut Criterion) {
    let service = LockService::with_connector(Config::default(), MemoryStore::new()).unwrap();

    c.bench_function("write_lock_cycle", |b| {
        b.iter(|| {
            service.acquire_write("bench:write", "bench", 5).unwrap();
            service.release_write("bench:write", "bench").unwrap();
        })
    });

    c.bench_function("read_lock_cycle", |b| {
        b.iter(|| {
            service.acquire_read("bench:read").unwrap();
            service.release_read("bench:read").unwrap();
        })
    });
}

criterion_group!(benches, lock_benchmarks);
criterion_main!(benches);
