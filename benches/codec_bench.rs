use criterion::{criterion_group, criterion_main, Criterion};
use lpack::{Builder, Reader};
use rand::prelude::*;

fn seal_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("seal");

    group.bench_function("100_entries_1kb", |b| {
        b.iter_batched(
            || {
                let mut builder = Builder::new();
                builder.set_name("bench");
                for i in 0..100 {
                    builder.add_from_bytes(&format!("/entry{i}"), vec![7u8; 1024]);
                }
                builder
            },
            |builder| {
                let mut out = Vec::new();
                builder.write_to(&mut out).unwrap();
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn open_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("open");

    let pack = {
        let mut builder = Builder::new();
        builder.set_name("bench");
        for i in 0..100 {
            builder.add_from_bytes(&format!("/entry{i}"), vec![7u8; 1024]);
        }
        let mut out = Vec::new();
        builder.write_to(&mut out).unwrap();
        out
    };

    group.bench_function("ingest_100_entries", |b| {
        b.iter_batched(
            || pack.clone(),
            |bytes| {
                let mut reader = Reader::new();
                reader.add_from_bytes(bytes).unwrap();
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("open_random_entry", |b| {
        let mut reader = Reader::new();
        reader.add_from_bytes(pack.clone()).unwrap();
        let mut rng = thread_rng();
        b.iter(|| {
            let idx = rng.gen_range(0..100);
            let mut stream = reader.open(&format!("/entry{idx}")).unwrap();
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut stream, &mut buf).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, seal_bench, open_bench);
criterion_main!(benches);
