//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use nestgraph_core::{
    hierarchy::GraphStore,
    properties::{NodeId, ViewId},
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times — subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Assert every view of the store passes the built-in invariant audit.
#[allow(dead_code)]
pub fn assert_consistent(store: &GraphStore) {
    let reader = store.read();
    for (view, _, _) in reader.views() {
        reader
            .built_in_test(view)
            .unwrap_or_else(|err| panic!("invariants violated in {view}: {err}"));
    }
}

/// Two retracted clusters with one crossing edge, plus a free node:
/// `g1{a, b}`, `g2{c, d}`, `x`, edge `a → c`.
#[allow(dead_code)]
pub fn two_cluster_store() -> (GraphStore, ViewId, [NodeId; 7]) {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    let c = store.add_node(view, None).unwrap();
    let d = store.add_node(view, None).unwrap();
    let x = store.add_node(view, None).unwrap();
    store.add_edge(view, a, c, 1.0, true).unwrap();
    let g1 = store.group(view, &[a, b]).unwrap();
    let g2 = store.group(view, &[c, d]).unwrap();
    store.retract(view, g1).unwrap();
    store.retract(view, g2).unwrap();
    (store, view, [a, b, c, d, x, g1, g2])
}
