use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use isam::{FileConfig, Geometry, IndexedFile, KeyRangeMode, MemoryStore, Record};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn loaded(records: u64, capacity: usize) -> IndexedFile<MemoryStore> {
    let config = FileConfig::new().with_geometry(Geometry::new(10, 64, capacity));
    let mut file = IndexedFile::in_memory(config).unwrap();
    let g = *file.geometry();
    file.load_sorted((0..records).map(|i| Record::numbered(i, &g).unwrap()), 1.0)
        .unwrap();
    file
}

/// Binary search over primary zones of growing size
fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate");
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    for &records in &[1_000u64, 10_000, 100_000] {
        let file = loaded(records, 11);
        let keys: Vec<String> = (0..1_000)
            .map(|_| format!("{:010}", rng.gen_range(0..records)))
            .collect();

        group.bench_with_input(BenchmarkId::new("declared", records), &keys, |b, keys| {
            b.iter(|| {
                for key in keys {
                    black_box(file.locate(key.as_bytes()).unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("strict", records), &keys, |b, keys| {
            b.iter(|| {
                for key in keys {
                    black_box(file.locate_with(key.as_bytes(), KeyRangeMode::Strict).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Lookups that have to walk overflow chains
fn bench_lookup_overflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_overflow");

    let mut file = loaded(10_000, 11);
    let g = *file.geometry();
    let mut extra: Vec<u64> = (10_000..12_000).collect();
    extra.shuffle(&mut rand::rngs::StdRng::seed_from_u64(11));
    for &k in &extra {
        file.insert(Record::numbered(k, &g).unwrap()).unwrap();
    }

    group.bench_function("primary_hit", |b| {
        b.iter(|| black_box(file.get(b"0000005000").unwrap()));
    });

    group.bench_function("chain_tail", |b| {
        let last = format!("{:010}", extra[extra.len() - 1]);
        b.iter(|| black_box(file.get(last.as_bytes()).unwrap()));
    });

    group.finish();
}

/// Full interval listing
fn bench_list(c: &mut Criterion) {
    let file = loaded(50_000, 11);

    c.bench_function("list_10k", |b| {
        b.iter(|| {
            let count = file
                .list(b"0000010000", b"0000019999")
                .unwrap()
                .count();
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_locate, bench_lookup_overflow, bench_list);
criterion_main!(benches);
