//! Benchmarks for resource checksums and planning.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use quiver::migrate::{Plan, StateResources, index_checksum, migration_checksum, generate_migration_file};
use quiver::schema::{FieldDefinition, IndexDefinition, Schema};

/// Create an index with `count` top-level fields, every tenth one complex.
fn create_index(name: &str, count: usize) -> IndexDefinition {
    let mut index = IndexDefinition::new(name).field("id", FieldDefinition::string().key());
    for i in 0..count {
        let key = format!("field_{i}");
        index = if i % 10 == 0 {
            index.field(
                key,
                FieldDefinition::complex([
                    ("street", FieldDefinition::string().searchable()),
                    ("city", FieldDefinition::string().filterable().facetable()),
                    ("zip", FieldDefinition::string().filterable()),
                ]),
            )
        } else {
            index.field(key, FieldDefinition::double().filterable().sortable())
        };
    }
    index
}

/// Create a schema with `count` indexes of 50 fields each.
fn create_schema(count: usize) -> Schema {
    (0..count).fold(Schema::new(), |schema, i| {
        let name = format!("index_{i}");
        let index = create_index(&name, 50);
        schema.index(name, index)
    })
}

fn bench_index_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_checksum");

    for size in [10usize, 100, 500] {
        let index = create_index("hotels", size).build();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("fields", size), &index, |b, index| {
            b.iter(|| black_box(index_checksum(index)))
        });
    }

    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for size in [1usize, 10, 50] {
        let schema = create_schema(size);
        let state = StateResources::default();
        group.bench_with_input(BenchmarkId::new("indexes", size), &schema, |b, schema| {
            b.iter(|| black_box(Plan::compute(schema, &state)))
        });
    }

    group.finish();
}

fn bench_migration_checksum(c: &mut Criterion) {
    let schema = create_schema(10);
    let plan = Plan::compute(&schema, &StateResources::default()).unwrap();
    let file = generate_migration_file(&plan);

    c.bench_function("migration_checksum", |b| {
        b.iter(|| black_box(migration_checksum(&file)))
    });
}

criterion_group!(
    benches,
    bench_index_checksum,
    bench_plan,
    bench_migration_checksum
);
criterion_main!(benches);
