use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nestgraph_core::hierarchy::GraphStore;
use nestgraph_core::properties::NodeId;

fn clustered_store(clusters: usize, per_cluster: usize) -> (GraphStore, Vec<NodeId>) {
    let store = GraphStore::new();
    let view = store.main_view();
    let mut groups = Vec::with_capacity(clusters);
    let mut leaves = Vec::new();
    for _ in 0..clusters {
        let members: Vec<NodeId> = (0..per_cluster)
            .map(|_| store.add_node(view, None).unwrap())
            .collect();
        leaves.extend(members.iter().copied());
        let g = store.group(view, &members).unwrap();
        store.retract(view, g).unwrap();
        groups.push(g);
    }
    for window in leaves.windows(2) {
        store.add_edge(view, window[0], window[1], 1.0, true).unwrap();
    }
    (store, groups)
}

fn bench_insertion(c: &mut Criterion) {
    c.bench_function("insert_1000_nodes", |b| {
        b.iter_batched(
            GraphStore::new,
            |store| {
                let view = store.main_view();
                for _ in 0..1000 {
                    store.add_node(view, None).unwrap();
                }
                store
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_expand_retract(c: &mut Criterion) {
    c.bench_function("expand_retract_cycle", |b| {
        let (store, groups) = clustered_store(16, 8);
        let view = store.main_view();
        b.iter(|| {
            for &g in &groups {
                store.expand(view, g).unwrap();
            }
            for &g in &groups {
                store.retract(view, g).unwrap();
            }
        });
    });
}

fn bench_containment(c: &mut Criterion) {
    c.bench_function("containment_queries", |b| {
        let (store, groups) = clustered_store(16, 8);
        let view = store.main_view();
        let reader = store.read();
        let nodes = reader.nodes(view).unwrap();
        b.iter(|| {
            let mut hits = 0usize;
            for &g in &groups {
                for &n in &nodes {
                    if reader.contains(view, g, n).unwrap() {
                        hits += 1;
                    }
                }
            }
            hits
        });
    });
}

criterion_group!(
    benches,
    bench_insertion,
    bench_expand_retract,
    bench_containment
);
criterion_main!(benches);
