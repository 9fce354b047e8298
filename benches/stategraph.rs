//! Benchmarks for the core graph algorithms.
//!
//! Measures the two hot paths of the IR:
//! - Scope-nesting computation over wide and deeply nested states
//! - Structural lowering of loop regions into flat state machines
//! - Read/write-set inference with write masking

extern crate stategraph;

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use stategraph::prelude::*;

/// Builds a state with `width` parallel chains threaded through one map
/// scope.
fn wide_state(width: usize) -> DataflowState {
    let mut state = DataflowState::new("bench");
    let (entry, exit) = state.add_scope(
        "map",
        &["i"],
        Subset::parse("0:1023").unwrap(),
        ScheduleKind::Parallel,
    );
    for k in 0..width {
        let a = state.add_access(format!("in{k}"));
        let b = state.add_access(format!("out{k}"));
        let code = state.add_code(
            format!("work{k}"),
            CodeBlock::expression("out = x + 1"),
            vec!["x".to_string()],
            vec!["out".to_string()],
        );
        state
            .add_memlet_path(
                &[a, entry, code],
                Memlet::new(format!("in{k}"), Subset::parse("i").unwrap()),
                None,
                Some("x"),
            )
            .unwrap();
        state
            .add_memlet_path(
                &[code, exit, b],
                Memlet::new(format!("out{k}"), Subset::parse("i").unwrap()),
                Some("out"),
                None,
            )
            .unwrap();
    }
    state
}

/// Builds a graph with one counting loop per `count`, each with a body
/// state.
fn looped_graph(count: usize) -> (FlowGraph, Vec<RegionId>) {
    let mut graph = FlowGraph::new("bench");
    let mut regions = Vec::with_capacity(count);
    let mut prev: Option<NodeId> = None;
    for k in 0..count {
        let lp = graph
            .add_loop_region(
                FlowGraph::ROOT,
                format!("loop{k}"),
                LoopParams::for_loop("i", "i = 0", "i < 100", "i = i + 1"),
                k == 0,
            )
            .unwrap();
        graph.add_state(lp, "body", true).unwrap();
        let root = graph.region(FlowGraph::ROOT).unwrap();
        let block = root
            .block_ids()
            .find(|b| root.block(*b).and_then(ControlBlock::region_id) == Some(lp))
            .unwrap();
        if let Some(prev) = prev {
            graph
                .add_edge(FlowGraph::ROOT, prev, block, InterstateEdge::new())
                .unwrap();
        }
        prev = Some(block);
        regions.push(lp);
    }
    (graph, regions)
}

/// Benchmark scope-nesting computation on a 100-chain mapped state.
fn bench_scope_dict(c: &mut Criterion) {
    let state = wide_state(100);

    c.bench_function("scope_dict_wide_100", |b| {
        b.iter(|| {
            // Clone so every iteration recomputes rather than hitting the cache
            let state = state.clone();
            let scopes = state.scope_dict().unwrap().len();
            black_box(scopes)
        });
    });
}

/// Benchmark data-movement path expansion across the scope boundary.
fn bench_memlet_paths(c: &mut Criterion) {
    let state = wide_state(100);
    let edges: Vec<EdgeId> = state.edge_ids().collect();

    c.bench_function("memlet_paths_wide_100", |b| {
        b.iter(|| {
            let mut total = 0;
            for edge in &edges {
                total += state.memlet_path(black_box(*edge)).unwrap().len();
            }
            black_box(total)
        });
    });
}

/// Benchmark read/write-set inference with masking on a 100-chain state.
fn bench_read_write_sets(c: &mut Criterion) {
    let state = wide_state(100);

    c.bench_function("read_write_sets_wide_100", |b| {
        b.iter(|| {
            let (reads, writes) = state.read_and_write_sets().unwrap();
            black_box((reads.len(), writes.len()))
        });
    });
}

/// Benchmark lowering a chain of 20 loop regions into flat state machines.
fn bench_inline_loops(c: &mut Criterion) {
    c.bench_function("inline_loops_20", |b| {
        b.iter(|| {
            let (mut graph, regions) = looped_graph(20);
            for region in regions {
                assert!(graph.inline_loop(black_box(region)).unwrap());
            }
            black_box(graph.region_count())
        });
    });
}

/// Benchmark JSON round-tripping of a moderately sized graph.
fn bench_roundtrip(c: &mut Criterion) {
    let (graph, _) = looped_graph(10);
    let json = graph.to_json().unwrap();

    c.bench_function("json_roundtrip_10_loops", |b| {
        b.iter(|| {
            let reloaded = FlowGraph::from_json(black_box(&json)).unwrap();
            black_box(reloaded.region_count())
        });
    });
}

criterion_group!(
    benches,
    bench_scope_dict,
    bench_memlet_paths,
    bench_read_write_sets,
    bench_inline_loops,
    bench_roundtrip
);
criterion_main!(benches);
