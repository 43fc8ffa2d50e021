//! Performance benchmark suite for codetrail
//!
//! - B1: Buffer dedup (one file re-reporting the same symbols and calls)
//! - B2: Merge of a populated buffer into a fresh graph
//! - B3: Fuzzy search over a few thousand qualified names
//!
//! Run with: cargo bench --bench perf_suite

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use codetrail::ingest::{ParseLocation, ParserClient, StorageParserClient};
use codetrail::model::{DefinitionKind, EdgeType, NameHierarchy, NodeType, DELIMITER_CXX};
use codetrail::{GraphStorage, IntermediateStorage, SearchIndex};

const SYMBOLS: usize = 500;

fn names() -> Vec<NameHierarchy> {
    (0..SYMBOLS)
        .map(|i| {
            NameHierarchy::parse(
                &format!("module{}::Type{}::method_{}", i % 10, i % 50, i),
                DELIMITER_CXX,
            )
        })
        .collect()
}

/// Reports every symbol `passes` times, each calling its successor.
fn fill(buffer: &mut IntermediateStorage, names: &[NameHierarchy], passes: usize) {
    let mut client = StorageParserClient::new(buffer, "bench.cpp");
    let file = client.on_file_start("bench.cpp", 1);
    for _ in 0..passes {
        let mut previous = None;
        for (line, name) in names.iter().enumerate() {
            let Some(id) = client.on_node(name, NodeType::Method, DefinitionKind::Explicit) else {
                continue;
            };
            let line = line as u32 + 1;
            client.on_source_location(id, &ParseLocation::new(file, line, 1, line, 30));
            if let Some(caller) = previous {
                client.on_edge(EdgeType::Call, caller, id);
            }
            previous = Some(id);
        }
    }
    client.on_file_finish(true, true);
}

/// B1: Buffer dedup
fn benchmark_b1_buffer_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("B1_Buffer_Dedup");
    let names = names();
    group.throughput(Throughput::Elements((SYMBOLS * 4) as u64));

    group.bench_function("four_passes", |b| {
        b.iter(|| {
            let mut buffer = IntermediateStorage::new();
            fill(&mut buffer, black_box(&names), 4);
            black_box(buffer.node_count())
        })
    });

    group.finish();
}

/// B2: Merge
fn benchmark_b2_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("B2_Merge");
    let names = names();
    let mut buffer = IntermediateStorage::new();
    fill(&mut buffer, &names, 1);

    group.bench_function("fresh_graph", |b| {
        b.iter_batched(
            || GraphStorage::open_in_memory().expect("open in-memory graph"),
            |mut graph| {
                let report = graph.merge_file("bench.cpp", black_box(&buffer));
                black_box(report.expect("merge"))
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// B3: Fuzzy search
fn benchmark_b3_fuzzy_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("B3_Fuzzy_Search");
    let mut index = SearchIndex::new(DELIMITER_CXX);
    for (i, name) in names().iter().enumerate() {
        index.add_name(name, i as i64 + 1);
    }

    for query in ["method_42", "m3Tymeth", "type"] {
        group.bench_function(query, |b| {
            b.iter(|| black_box(index.find_fuzzy_matches(black_box(query)).len()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_b1_buffer_dedup,
    benchmark_b2_merge,
    benchmark_b3_fuzzy_search
);
criterion_main!(benches);
