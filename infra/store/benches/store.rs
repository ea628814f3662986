use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nestkv_store::{Context, Prefix, PutOptions, Store};
use std::hint::black_box;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Benchmark: Prefix Derivation
// ============================================================================

fn bench_prefix(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix");

    group.bench_function("derive_depth_3", |b| {
        b.iter(|| black_box(Prefix::root().sub("tenants").sub("acme").keyspace("blobs")));
    });

    let prefix = Prefix::root().sub("tenants").sub("acme").keyspace("blobs");
    group.bench_function("add_remove", |b| {
        b.iter(|| {
            let physical = prefix.add(black_box("avatar-0001.png"));
            black_box(prefix.remove(&physical).is_some());
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Namespace Cache
// ============================================================================

fn bench_namespace(c: &mut Criterion) {
    let mut group = c.benchmark_group("namespace");

    let temp = TempDir::new().unwrap();
    let store = Store::builder().path(temp.path()).open().unwrap();
    let _warm = store.sub("tenants").keyspace("blobs");

    group.bench_function("cached_lookup", |b| {
        b.iter(|| black_box(store.sub("tenants").keyspace("blobs")));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Key Operations
// ============================================================================

fn bench_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("operations");
    group.measurement_time(Duration::from_secs(10));

    let temp = TempDir::new().unwrap();
    let store = Store::builder().path(temp.path()).open().unwrap();
    let kv = store.keyspace("bench");

    let sizes = [("64B", 64), ("4KB", 4 * 1024), ("64KB", 64 * 1024)];
    for (name, size) in sizes {
        let data = vec![0xa5u8; size];
        group.throughput(Throughput::Bytes(u64::try_from(size).unwrap_or(u64::MAX)));

        group.bench_with_input(BenchmarkId::new("put_replace", name), &data, |b, data| {
            b.iter(|| kv.put(PutOptions::new("hot", data).replace(true)).unwrap());
        });

        kv.put(PutOptions::new(name, &data).replace(true)).unwrap();
        group.bench_with_input(BenchmarkId::new("get", name), &name, |b, key| {
            b.iter(|| black_box(kv.get(key).unwrap()));
        });
    }

    group.bench_function("put_create_conflict", |b| {
        b.iter(|| black_box(kv.put(PutOptions::new("hot", b"x")).is_err()));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Listing
// ============================================================================

fn bench_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing");

    let temp = TempDir::new().unwrap();
    let store = Store::builder().path(temp.path()).open().unwrap();
    let kv = store.keyspace("list");
    let noise = store.keyspace("noise");
    for i in 0..10_000 {
        let key = format!("{i:05}");
        kv.put(PutOptions::new(&key, b"")).unwrap();
        noise.put(PutOptions::new(&key, b"")).unwrap();
    }

    group.throughput(Throughput::Elements(10_000));
    group.bench_function("list_all", |b| {
        b.iter(|| black_box(kv.list(&Context::background(), "").unwrap().count()));
    });
    group.bench_function("len", |b| {
        b.iter(|| black_box(kv.len().unwrap()));
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_prefix, bench_namespace, bench_operations, bench_listing);

criterion_main!(benches);
