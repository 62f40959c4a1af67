//! Benchmarks for portdb ingest and pagination
//!
//! 1. Streaming decode throughput
//! 2. Upsert throughput (batched WAL sync)
//! 3. Page scans over memtable and SSTables

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use portdb::config::WalSyncStrategy;
use portdb::{CancelToken, Config, Engine, PortDetails, PortFeed};
use tempfile::TempDir;

fn synthetic_catalog(count: usize) -> Vec<u8> {
    let mut doc = String::from("{");
    for i in 0..count {
        if i > 0 {
            doc.push(',');
        }
        doc.push_str(&format!(
            r#""P{i:06}": {{"name": "Port {i}", "city": "City {i}", "country": "Country",
                "alias": [], "regions": [], "coordinates": [{i}.5, -{i}.25],
                "timezone": "UTC", "unlocs": ["P{i:06}"], "code": "{i}"}}"#
        ));
    }
    doc.push('}');
    doc.into_bytes()
}

fn details(i: usize) -> PortDetails {
    PortDetails {
        name: Some(format!("Port {}", i)),
        coordinates: Some([i as f64, -(i as f64)]),
        unlocs: vec![format!("P{:06}", i)],
        ..Default::default()
    }
}

fn open_engine(temp_dir: &TempDir, memtable_size_limit: usize) -> Engine {
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .memtable_size_limit(memtable_size_limit)
        .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 1000 })
        .build();
    Engine::open(config).unwrap()
}

/// Benchmark 1: Decode a whole catalog through the feed
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for count in [100usize, 10_000] {
        let input = synthetic_catalog(count);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            b.iter(|| {
                let feed = PortFeed::spawn(Cursor::new(input.clone()), CancelToken::new());
                black_box(feed.map(|p| p.unwrap()).count())
            });
        });
    }

    group.finish();
}

/// Benchmark 2: Upsert records into a fresh engine
fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");
    let count = 1_000;
    group.throughput(Throughput::Elements(count as u64));

    group.bench_function("batched_sync", |b| {
        b.iter(|| {
            let temp_dir = TempDir::new().unwrap();
            let engine = open_engine(&temp_dir, 64 * 1024 * 1024);
            let cancel = CancelToken::new();
            for i in 0..count {
                engine
                    .upsert(&cancel, &format!("P{:06}", i), &details(i))
                    .unwrap();
            }
            engine.close().unwrap();
        });
    });

    group.finish();
}

/// Benchmark 3: Page through a store spread over several SSTables
fn bench_list(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_engine(&temp_dir, 64 * 1024);
    let cancel = CancelToken::new();
    for i in 0..20_000 {
        engine
            .upsert(&cancel, &format!("P{:06}", (i * 7_919) % 20_000), &details(i))
            .unwrap();
    }

    let mut group = c.benchmark_group("list");
    for page_size in [10usize, 1_000] {
        group.throughput(Throughput::Elements(page_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(page_size),
            &page_size,
            |b, &page_size| {
                b.iter(|| black_box(engine.list(&cancel, "P010000", page_size).unwrap()));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_upsert, bench_list);
criterion_main!(benches);
