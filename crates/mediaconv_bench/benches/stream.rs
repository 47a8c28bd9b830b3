//! Stream recording and chunking benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediaconv_core::{ChunkPolicy, MediaKind, StreamState};
use rand::Rng;

/// Generate random data of the specified size.
fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Benchmark recording a looping audio stream.
fn bench_record_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_record");
    let period: Vec<Bytes> = (0..32).map(|_| Bytes::from(random_data(2048))).collect();
    group.throughput(Throughput::Bytes(32 * 2048 * 8));

    for detect_loops in [false, true].iter() {
        group.bench_with_input(
            BenchmarkId::new("loops", detect_loops),
            detect_loops,
            |b, &detect_loops| {
                b.iter(|| {
                    let mut state = StreamState::new(detect_loops);
                    for _ in 0..8 {
                        for chunk in &period {
                            state.record(chunk.clone()).unwrap();
                        }
                    }
                    black_box(state.stream_hash())
                });
            },
        );
    }
    group.finish();
}

/// Benchmark content-defined chunking of a video source.
fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");
    group.sample_size(10);
    let data = random_data(32 * 1024 * 1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    let policies = [
        ("delivered", ChunkPolicy::default_for(MediaKind::Audio)),
        ("content_defined", ChunkPolicy::default_for(MediaKind::Video)),
    ];
    for (name, policy) in policies.iter() {
        group.bench_function(*name, |b| {
            b.iter(|| {
                let mut chunks = 0usize;
                policy
                    .split(&data[..], |_| {
                        chunks += 1;
                        Ok(())
                    })
                    .unwrap();
                black_box(chunks)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_record_loop, bench_chunking);
criterion_main!(benches);
