//! MurmurHash3 throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediaconv_hash::{Murmur3, Murmur3x64, Murmur3x86, HASH_SEED};
use rand::Rng;

/// Generate random data of the specified size.
fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

fn hash_with<H: Murmur3>(data: &[u8]) -> mediaconv_hash::PayloadHash {
    let mut state = H::with_seed(HASH_SEED);
    state.update(data);
    state.finish()
}

/// Benchmark one-shot hashing for both variants.
fn bench_oneshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("murmur3_oneshot");

    for size in [64, 4096, 1024 * 1024].iter() {
        let data = random_data(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("x64", size), &data, |b, data| {
            b.iter(|| black_box(hash_with::<Murmur3x64>(black_box(data))));
        });
        group.bench_with_input(BenchmarkId::new("x86", size), &data, |b, data| {
            b.iter(|| black_box(hash_with::<Murmur3x86>(black_box(data))));
        });
    }
    group.finish();
}

/// Benchmark incremental hashing with unaligned updates.
fn bench_incremental(c: &mut Criterion) {
    let mut group = c.benchmark_group("murmur3_incremental");
    let data = random_data(1024 * 1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for step in [7, 100, 4096].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(step), step, |b, &step| {
            b.iter(|| {
                let mut state = Murmur3x64::with_seed(HASH_SEED);
                for piece in data.chunks(step) {
                    state.update(piece);
                }
                black_box(state.finish())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_oneshot, bench_incremental);
criterion_main!(benches);
