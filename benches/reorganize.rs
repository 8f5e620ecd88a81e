use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use isam::{FileConfig, IndexedFile, MemoryStore, Record};

fn records(n: u64) -> Vec<Record> {
    let g = FileConfig::default().geometry;
    (0..n).map(|i| Record::numbered(i, &g).unwrap()).collect()
}

/// Bulk load at several fill rates
fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_sorted");
    let input = records(20_000);

    for &rate in &[0.5, 0.8, 1.0] {
        group.bench_with_input(BenchmarkId::from_parameter(rate), &rate, |b, &rate| {
            b.iter(|| {
                let mut file = IndexedFile::in_memory(FileConfig::default()).unwrap();
                black_box(file.load_sorted(input.iter().cloned(), rate).unwrap())
            });
        });
    }

    group.finish();
}

/// Reorganize a file with deletions and overflow
fn bench_reorganize(c: &mut Criterion) {
    let mut file = IndexedFile::in_memory(FileConfig::default()).unwrap();
    let g = *file.geometry();
    file.load_sorted(records(20_000), 1.0).unwrap();
    for i in (0..20_000).step_by(7) {
        file.delete(format!("{:010}", i).as_bytes()).unwrap();
    }
    for i in 20_000..21_000 {
        file.insert(Record::numbered(i, &g).unwrap()).unwrap();
    }
    let block_size = g.block_size();

    c.bench_function("reorganize_20k", |b| {
        b.iter(|| {
            let (_, stats) = file
                .reorganize_into(MemoryStore::new(block_size), 0.7)
                .unwrap();
            black_box(stats)
        });
    });
}

criterion_group!(benches, bench_load, bench_reorganize);
criterion_main!(benches);
