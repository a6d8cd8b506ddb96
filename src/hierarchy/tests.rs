//! Tests for the hierarchical graph engine.

use super::*;
use crate::properties::{NodeId, NodePayload, ROOT_ID};

/// Build a store with two retracted clusters and one free node:
///
/// ```text
/// root ── g1 (enabled) ── {a, b}
///      ── g2 (enabled) ── {c, d}
///      ── x  (enabled)
/// ```
///
/// `a → c` crosses the clusters, so exactly one meta-edge g1 → g2 exists.
fn two_cluster_fixture() -> (GraphStore, [NodeId; 7]) {
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
    (store, [a, b, c, d, x, g1, g2])
}

fn assert_consistent(store: &GraphStore) {
    let reader = store.read();
    for (view, _, _) in reader.views() {
        reader
            .built_in_test(view)
            .unwrap_or_else(|err| panic!("invariants violated in {view}: {err}"));
    }
}

#[test]
fn test_insert_numbering() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    let a1 = store.add_node(view, Some(a)).unwrap();
    let a2 = store.add_node(view, Some(a)).unwrap();

    let reader = store.read();
    // Pre order: root(0), a(1), a1(2), a2(3), b(4).
    assert_eq!(reader.node(view, a).unwrap().pre(), 1);
    assert_eq!(reader.node(view, a1).unwrap().pre(), 2);
    assert_eq!(reader.node(view, a2).unwrap().pre(), 3);
    assert_eq!(reader.node(view, b).unwrap().pre(), 4);
    assert_eq!(reader.node(view, a).unwrap().size(), 2);
    assert_eq!(reader.node(view, a).unwrap().post(), 3);
    assert_eq!(reader.node(view, a1).unwrap().level(), 2);
    assert!(reader.contains(view, a, a2).unwrap());
    assert!(!reader.contains(view, a, b).unwrap());
    assert!(!reader.contains(view, a, a).unwrap(), "containment is strict");
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_new_node_enabled_unless_represented() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let a1 = store.add_node(view, Some(a)).unwrap();

    let reader = store.read();
    assert!(reader.is_enabled(view, a).unwrap());
    assert!(
        !reader.is_enabled(view, a1).unwrap(),
        "a child below an enabled node is represented by it"
    );
    assert_eq!(reader.counters(view).unwrap().nodes_enabled, 1);
    assert_eq!(reader.enabled_ancestor(view, a1).unwrap(), Some(a));
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_add_edge_duplicate_is_a_value_not_an_error() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    assert!(store.add_edge(view, a, b, 1.0, true).unwrap().is_some());
    assert!(
        store.add_edge(view, a, b, 2.0, true).unwrap().is_none(),
        "an edge between the same ordered pair already exists"
    );
    // The reverse direction is a different ordered pair.
    assert!(store.add_edge(view, b, a, 1.0, true).unwrap().is_some());

    let counters = store.read().counters(view).unwrap();
    assert_eq!(counters.edges_count_total, 2);
    assert_eq!(counters.edges_count_enabled, 2);
    assert_eq!(counters.mutual_edges_total, 1);
    assert_eq!(counters.mutual_edges_enabled, 1);
    assert_consistent(&store);
}

#[test]
fn test_self_loop_counts_once() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    store.add_edge(view, a, a, 1.0, true).unwrap();

    let reader = store.read();
    let counters = reader.counters(view).unwrap();
    assert_eq!(counters.edges_count_enabled, 1);
    assert_eq!(counters.mutual_edges_total, 0, "self-loops are not mutual");
    assert_eq!(reader.degrees(view, a).unwrap(), (1, 1, 0));
    assert_eq!(
        reader.meta_edge_count(view).unwrap(),
        0,
        "self-loops never aggregate"
    );
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_group_keeps_visible_set() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    let g = store.group(view, &[a, b]).unwrap();

    let reader = store.read();
    assert!(!reader.is_enabled(view, g).unwrap(), "a new cluster starts disabled");
    assert!(reader.is_enabled(view, a).unwrap());
    assert!(reader.is_enabled(view, b).unwrap());
    assert_eq!(reader.node(view, a).unwrap().parent(), Some(g));
    assert_eq!(reader.counters(view).unwrap().nodes_enabled, 2);
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_group_requires_common_parent() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    let b1 = store.add_node(view, Some(b)).unwrap();
    let err = store.group(view, &[a, b1]).unwrap_err();
    assert!(matches!(err, crate::NestGraphError::InvalidState(_)));
    assert_consistent(&store);
}

#[test]
fn test_retract_then_expand_restores_enablement() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    let x = store.add_node(view, None).unwrap();
    store.add_edge(view, a, x, 1.0, true).unwrap();
    let r = store.group(view, &[a, b]).unwrap();

    let before = store.read().counters(view).unwrap();
    store.retract(view, r).unwrap();
    {
        let reader = store.read();
        assert!(reader.is_enabled(view, r).unwrap());
        assert!(!reader.is_enabled(view, a).unwrap());
        assert_eq!(reader.counters(view).unwrap().nodes_enabled, 2);
        assert_eq!(
            reader.counters(view).unwrap().edges_count_enabled,
            0,
            "a's edge lost its enabled endpoint"
        );
        assert_eq!(reader.meta_edge_count(view).unwrap(), 1);
        let metas = reader.meta_edges(view).unwrap();
        assert_eq!((metas[0].source, metas[0].target), (r, x));
    }
    assert_consistent(&store);

    store.expand(view, r).unwrap();
    {
        let reader = store.read();
        assert!(!reader.is_enabled(view, r).unwrap());
        assert!(reader.is_enabled(view, a).unwrap());
        assert!(reader.is_enabled(view, b).unwrap());
        let after = reader.counters(view).unwrap();
        assert_eq!(after, before, "expand is the inverse of retract");
        assert_eq!(reader.meta_edge_count(view).unwrap(), 0);
    }
    assert_consistent(&store);
}

#[test]
fn test_expand_preconditions() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let err = store.expand(view, a).unwrap_err();
    assert!(matches!(err, crate::NestGraphError::InvalidState(_)));

    let b = store.add_node(view, None).unwrap();
    let g = store.group(view, &[a, b]).unwrap();
    // g is disabled, so expanding it is invalid too.
    let err = store.expand(view, g).unwrap_err();
    assert!(matches!(err, crate::NestGraphError::InvalidState(_)));
    assert_consistent(&store);
}

#[test]
fn test_group_then_ungroup_restores_structure() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    let x = store.add_node(view, None).unwrap();
    store.add_edge(view, a, b, 1.0, true).unwrap();
    store.add_edge(view, b, x, 1.0, true).unwrap();

    let before = store.read().counters(view).unwrap();
    let g = store.group(view, &[a, b]).unwrap();
    store.ungroup(view, g).unwrap();

    let reader = store.read();
    assert_eq!(reader.node(view, a).unwrap().parent(), Some(ROOT_ID));
    assert_eq!(reader.node(view, b).unwrap().parent(), Some(ROOT_ID));
    assert!(reader.is_enabled(view, a).unwrap());
    assert!(reader.is_enabled(view, b).unwrap());
    assert!(
        reader.node(view, g).is_err(),
        "the dissolved cluster is gone from the view"
    );
    assert!(
        reader.payload(g).is_none(),
        "the dissolved cluster is gone from the dictionary"
    );
    assert_eq!(reader.counters(view).unwrap(), before);
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_ungroup_expands_enabled_cluster_first() {
    let (store, [a, b, ..]) = two_cluster_fixture();
    let view = store.main_view();
    let g1 = store.read().node(view, a).unwrap().parent().unwrap();
    store.ungroup(view, g1).unwrap();

    let reader = store.read();
    assert!(reader.is_enabled(view, a).unwrap());
    assert!(reader.is_enabled(view, b).unwrap());
    assert_eq!(reader.node(view, a).unwrap().parent(), Some(ROOT_ID));
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_meta_edge_aggregates_crossing_edges() {
    let (store, [a, _b, _c, d, _x, g1, g2]) = two_cluster_fixture();
    let view = store.main_view();
    {
        let reader = store.read();
        assert_eq!(reader.meta_edge_count(view).unwrap(), 1);
        let metas = reader.meta_edges(view).unwrap();
        assert_eq!((metas[0].source, metas[0].target), (g1, g2));
        assert_eq!(metas[0].edge_count(), 1);
    }
    // A second crossing edge folds into the same meta-edge.
    store.add_edge(view, a, d, 2.0, true).unwrap();
    {
        let reader = store.read();
        assert_eq!(reader.meta_edge_count(view).unwrap(), 1);
        let metas = reader.meta_edges(view).unwrap();
        assert_eq!(metas[0].edge_count(), 2);
        assert_eq!(metas[0].weight, 3.0);
    }
    assert_consistent(&store);
}

#[test]
fn test_mutual_meta_edges() {
    let (store, [a, _b, c, _d, _x, _g1, _g2]) = two_cluster_fixture();
    let view = store.main_view();
    store.add_edge(view, c, a, 1.0, true).unwrap();

    let reader = store.read();
    assert_eq!(reader.meta_edge_count(view).unwrap(), 2);
    assert_eq!(reader.counters(view).unwrap().meta_mutual_edges_count, 1);
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_delete_edge_detaches_meta_edge() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    let x = store.add_node(view, None).unwrap();
    let edge = store.add_edge(view, a, x, 1.0, true).unwrap().unwrap();
    let g = store.group(view, &[a, b]).unwrap();
    store.retract(view, g).unwrap();
    assert_eq!(store.read().meta_edge_count(view).unwrap(), 1);

    store.delete_edge(view, edge).unwrap();
    let reader = store.read();
    assert_eq!(
        reader.meta_edge_count(view).unwrap(),
        0,
        "the aggregating meta-edge dies with its last edge"
    );
    assert_eq!(reader.counters(view).unwrap().edges_count_total, 0);
    drop(reader);
    assert_consistent(&store);

    // Deleting again is an invalid-state condition, not a silent no-op.
    let err = store.delete_edge(view, edge).unwrap_err();
    assert!(matches!(err, crate::NestGraphError::InvalidState(_)));
}

#[test]
fn test_delete_meta_edge_keeps_real_edges() {
    let (store, _) = two_cluster_fixture();
    let view = store.main_view();
    let mid = store.read().meta_edges(view).unwrap()[0].id;
    store.delete_meta_edge(view, mid).unwrap();

    let reader = store.read();
    assert_eq!(reader.meta_edge_count(view).unwrap(), 0);
    assert_eq!(
        reader.counters(view).unwrap().edges_count_total,
        1,
        "the aggregated real edge survives"
    );
}

#[test]
fn test_move_disabled_leaf_between_clusters() {
    let (store, [a, _b, _c, _d, _x, g1, g2]) = two_cluster_fixture();
    let view = store.main_view();
    let enabled_before = store.read().counters(view).unwrap().edges_count_enabled;

    // a is disabled, represented by g1; its edge feeds the g1 → g2 meta-edge.
    // Moving a into g2 turns that edge intra-cluster.
    store.move_to_group(view, a, g2).unwrap();

    let reader = store.read();
    assert_eq!(reader.node(view, a).unwrap().parent(), Some(g2));
    assert!(!reader.is_enabled(view, a).unwrap());
    assert_eq!(
        reader.meta_edge_count(view).unwrap(),
        0,
        "an intra-cluster edge aggregates nowhere"
    );
    assert_eq!(
        reader.counters(view).unwrap().edges_count_enabled,
        enabled_before
    );
    assert!(reader.contains(view, g2, a).unwrap());
    assert!(!reader.contains(view, g1, a).unwrap());
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_move_enabled_node_folds_into_destination() {
    let (store, [_a, _b, _c, _d, x, g1, _g2]) = two_cluster_fixture();
    let view = store.main_view();
    let y = store.add_node(view, None).unwrap();
    store.add_edge(view, x, y, 1.0, true).unwrap();
    assert_eq!(store.read().counters(view).unwrap().edges_count_enabled, 1);

    // x is enabled and moves under the enabled cluster g1: it disables and
    // its edge to y re-surfaces as a g1 → y meta-edge.
    store.move_to_group(view, x, g1).unwrap();

    let reader = store.read();
    assert!(!reader.is_enabled(view, x).unwrap());
    assert_eq!(reader.enabled_ancestor(view, x).unwrap(), Some(g1));
    assert_eq!(reader.counters(view).unwrap().edges_count_enabled, 0);
    let has_meta = reader
        .meta_edges(view)
        .unwrap()
        .iter()
        .any(|m| m.source == g1 && m.target == y);
    assert!(has_meta, "the folded edge must aggregate between g1 and y");
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_move_into_own_subtree_is_rejected() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let a1 = store.add_node(view, Some(a)).unwrap();
    let err = store.move_to_group(view, a, a1).unwrap_err();
    assert!(matches!(err, crate::NestGraphError::InvalidArgument(_)));
    let err = store.move_to_group(view, a, a).unwrap_err();
    assert!(matches!(err, crate::NestGraphError::InvalidArgument(_)));
    assert_consistent(&store);
}

#[test]
fn test_delete_node_removes_subtree_edges_and_dictionary_entries() {
    let (store, [a, _b, c, _d, x, g1, _g2]) = two_cluster_fixture();
    let view = store.main_view();
    store.add_edge(view, x, c, 1.0, true).unwrap();

    let removed = store.delete_node(view, g1).unwrap();
    assert_eq!(removed.len(), 3, "g1 plus its two members");
    assert!(removed.contains(&g1) && removed.contains(&a));

    let reader = store.read();
    assert!(reader.node(view, g1).is_err());
    assert!(reader.payload(a).is_none());
    assert!(
        reader.edge(reader.edges(view).unwrap()[0]).is_some(),
        "the x → c edge survives"
    );
    assert_eq!(reader.counters(view).unwrap().edges_count_total, 1);
    assert_eq!(reader.meta_edge_count(view).unwrap(), 1, "x → g2 remains");
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_flatten_materializes_meta_edges() {
    let (store, [_a, _b, _c, _d, x, g1, g2]) = two_cluster_fixture();
    let view = store.main_view();
    store.flatten(view).unwrap();

    let reader = store.read();
    let nodes = reader.nodes(view).unwrap();
    // Pre order of the fixture is x, g1(a, b), g2(c, d); only the enabled
    // representatives survive, in that order.
    assert_eq!(nodes, vec![x, g1, g2]);
    for &n in &nodes {
        assert_eq!(reader.node(view, n).unwrap().level(), 1);
        assert!(reader.is_enabled(view, n).unwrap());
    }
    assert_eq!(reader.meta_edge_count(view).unwrap(), 0);
    let edges = reader.edges(view).unwrap();
    assert_eq!(edges.len(), 1, "the g1 → g2 meta-edge became a real edge");
    let record = reader.edge(edges[0]).unwrap();
    assert_eq!((record.source, record.target), (g1, g2));
    assert_eq!(reader.counters(view).unwrap().edges_count_enabled, 1);
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_flatten_of_flat_view_is_a_noop() {
    let store = GraphStore::new();
    let view = store.main_view();
    let a = store.add_node(view, None).unwrap();
    let b = store.add_node(view, None).unwrap();
    store.add_edge(view, a, b, 1.0, true).unwrap();

    let before_nodes = store.read().nodes(view).unwrap();
    let before_counters = store.read().counters(view).unwrap();
    let before_version = store.version();
    store.flatten(view).unwrap();

    let reader = store.read();
    assert_eq!(reader.nodes(view).unwrap(), before_nodes);
    assert_eq!(reader.counters(view).unwrap(), before_counters);
    drop(reader);
    // The operation completed, so the version still moves.
    assert_ne!(store.version(), before_version);
    assert_consistent(&store);
}

#[test]
fn test_clear_edges_keeps_nodes() {
    let (store, _) = two_cluster_fixture();
    let view = store.main_view();
    let nodes_before = store.read().node_count(view).unwrap();
    store.clear_edges(view).unwrap();

    let reader = store.read();
    assert_eq!(reader.node_count(view).unwrap(), nodes_before);
    let counters = reader.counters(view).unwrap();
    assert_eq!(counters.edges_count_total, 0);
    assert_eq!(counters.meta_edges_count, 0);
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_clear_through_main_empties_everything() {
    let (store, _) = two_cluster_fixture();
    let secondary = store.create_view("working copy");
    let view = store.main_view();
    store.clear(view).unwrap();

    let reader = store.read();
    assert_eq!(reader.node_count(view).unwrap(), 0);
    assert_eq!(
        reader.node_count(secondary).unwrap(),
        0,
        "clearing the main view cascades everywhere"
    );
    assert_eq!(reader.counters(view).unwrap(), Default::default());
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_reset_view_to_leaves_and_top_nodes() {
    let (store, [a, b, c, d, x, g1, g2]) = two_cluster_fixture();
    let view = store.main_view();

    store.reset_view_to_leaves(view).unwrap();
    {
        let reader = store.read();
        for n in [a, b, c, d, x] {
            assert!(reader.is_enabled(view, n).unwrap(), "{n} is a leaf");
        }
        assert!(!reader.is_enabled(view, g1).unwrap());
        assert_eq!(reader.counters(view).unwrap().nodes_enabled, 5);
        assert_eq!(
            reader.meta_edge_count(view).unwrap(),
            0,
            "every edge endpoint is visible at leaf level"
        );
    }
    assert_consistent(&store);

    store.reset_view_to_top_nodes(view).unwrap();
    {
        let reader = store.read();
        for n in [g1, g2, x] {
            assert!(reader.is_enabled(view, n).unwrap());
        }
        assert_eq!(reader.counters(view).unwrap().nodes_enabled, 3);
        assert_eq!(reader.meta_edge_count(view).unwrap(), 1);
    }
    assert_consistent(&store);

    store.reset_view_to_level(view, 2).unwrap();
    {
        let reader = store.read();
        for n in [a, b, c, d, x] {
            assert!(reader.is_enabled(view, n).unwrap());
        }
        assert_eq!(reader.counters(view).unwrap().nodes_enabled, 5);
    }
    assert_consistent(&store);

    assert!(store.reset_view_to_level(view, 0).is_err());
    assert!(store.reset_view_to_level(view, 9).is_err());
}

#[test]
fn test_views_are_independent_projections() {
    let (store, [a, _b, _c, _d, x, g1, _g2]) = two_cluster_fixture();
    let main = store.main_view();
    let secondary = store.create_view("expanded copy");

    // Expanding g1 in the secondary view leaves the main view retracted.
    store.expand(secondary, g1).unwrap();
    {
        let reader = store.read();
        assert!(reader.is_enabled(main, g1).unwrap());
        assert!(!reader.is_enabled(secondary, g1).unwrap());
        assert!(reader.is_enabled(secondary, a).unwrap());
    }
    assert_consistent(&store);

    // A new edge lands in every view that holds both endpoints, counted
    // against each view's own enablement.
    store.add_edge(main, a, x, 1.0, true).unwrap();
    {
        let reader = store.read();
        assert_eq!(reader.counters(main).unwrap().edges_count_total, 2);
        assert_eq!(reader.counters(secondary).unwrap().edges_count_total, 2);
        assert_eq!(reader.counters(main).unwrap().edges_count_enabled, 0);
        assert_eq!(
            reader.counters(secondary).unwrap().edges_count_enabled,
            1,
            "a and x are both visible in the expanded copy"
        );
    }
    assert_consistent(&store);
}

#[test]
fn test_delete_through_main_cascades_to_views() {
    let (store, [a, _b, _c, _d, _x, g1, _g2]) = two_cluster_fixture();
    let main = store.main_view();
    let secondary = store.create_view("copy");

    store.delete_node(main, g1).unwrap();
    let reader = store.read();
    assert!(reader.node(secondary, g1).is_err());
    assert!(reader.node(secondary, a).is_err());
    assert!(reader.payload(a).is_none());
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_delete_through_secondary_view_is_local() {
    let (store, [a, _b, _c, _d, _x, g1, _g2]) = two_cluster_fixture();
    let main = store.main_view();
    let secondary = store.create_view("copy");

    store.delete_node(secondary, g1).unwrap();
    let reader = store.read();
    assert!(reader.node(secondary, a).is_err());
    assert!(reader.node(main, a).is_ok(), "the main view keeps its copy");
    assert!(reader.payload(a).is_some(), "the dictionary keeps the payload");
    drop(reader);
    assert_consistent(&store);
}

#[test]
fn test_update_payload_is_shared_across_views() {
    let store = GraphStore::new();
    let main = store.main_view();
    let a = store.add_node(main, None).unwrap();
    let secondary = store.create_view("copy");
    store
        .update_payload(a, NodePayload::labeled("hub"))
        .unwrap();

    let reader = store.read();
    assert_eq!(reader.payload(a).unwrap().label, "hub");
    assert!(reader.node(secondary, a).is_ok());
}

#[test]
fn test_enabled_subgraph_export() {
    let (store, _) = two_cluster_fixture();
    let view = store.main_view();
    let graph = store.read().enabled_subgraph(view).unwrap();
    // g1, g2, x enabled; one meta-edge between the clusters.
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 1);
}
