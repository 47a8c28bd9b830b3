//! FozDB storage engine benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediaconv_fozdb::{EntryName, FozDb, PayloadHash};
use rand::Rng;
use tempfile::TempDir;

/// Generate random data of the specified size.
fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

fn populated(count: usize, size: usize) -> (TempDir, FozDb) {
    let dir = TempDir::new().unwrap();
    let mut db = FozDb::open(&dir.path().join("bench.foz"), false, 4).unwrap();
    let data = random_data(size);
    for i in 0..count {
        db.write_entry_bytes(0, PayloadHash::new(i as u128), &data).unwrap();
    }
    (dir, db)
}

/// Benchmark appending new entries.
fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("fozdb_write");

    for size in [256, 16 * 1024, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let mut db = FozDb::open(&dir.path().join("bench.foz"), false, 4).unwrap();
            let data = random_data(size);
            let mut next = 0u128;

            b.iter(|| {
                next += 1;
                db.write_entry_bytes(1, PayloadHash::new(next), black_box(&data))
                    .unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark verified whole-payload reads.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("fozdb_read");

    for size in [256, 16 * 1024, 1024 * 1024].iter() {
        let (_dir, db) = populated(64, *size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut i = 0u128;
            b.iter(|| {
                i = (i + 1) % 64;
                black_box(db.read_entry(0, PayloadHash::new(i)).unwrap())
            });
        });
    }
    group.finish();
}

/// Benchmark opening (scanning) a database.
fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("fozdb_open");

    for count in [100, 10_000].iter() {
        let (dir, db) = populated(*count, 64);
        drop(db);
        let path = dir.path().join("bench.foz");
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| black_box(FozDb::open(&path, true, 4).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark compaction discarding every other entry.
fn bench_discard(c: &mut Criterion) {
    let mut group = c.benchmark_group("fozdb_discard");
    group.sample_size(10);

    for count in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_with_setup(
                || populated(count, 4096),
                |(_dir, mut db)| {
                    let names = (0..count)
                        .step_by(2)
                        .map(|i| EntryName::new(0, PayloadHash::new(i as u128)));
                    black_box(db.discard_entries(names).unwrap())
                },
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_open, bench_discard);
criterion_main!(benches);
