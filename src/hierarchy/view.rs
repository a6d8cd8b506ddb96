//! Views: independent tree/counter projections over the shared node/edge
//! universe.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::properties::{EdgeId, MetaEdge, NodeId, ViewId};

use super::TreeStructure;

/// Per-view aggregate counters, maintained incrementally by the edge
/// processor and the structure modifier. `edges_count_enabled` counts real
/// edges whose both endpoints are enabled; the mutual counters count node
/// pairs connected in both directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCounters {
    pub nodes_enabled: usize,
    pub edges_count_total: usize,
    pub edges_count_enabled: usize,
    pub mutual_edges_total: usize,
    pub mutual_edges_enabled: usize,
    pub meta_edges_count: usize,
    pub meta_mutual_edges_count: usize,
}

impl ViewCounters {
    pub(crate) fn reset(&mut self) {
        *self = ViewCounters::default();
    }

    pub(crate) fn reset_meta(&mut self) {
        self.meta_edges_count = 0;
        self.meta_mutual_edges_count = 0;
    }
}

/// One named projection of the graph: an independent positional tree index,
/// the aggregate counters, and the view-local meta-edge store.
///
/// Exactly one view is the main view; it anchors the canonical node/edge
/// dictionary owned by the graph instance, and deletions through it cascade
/// to every other view.
#[derive(Clone, Debug)]
pub struct View {
    id: ViewId,
    name: String,
    main: bool,
    pub(crate) tree: TreeStructure,
    pub(crate) counters: ViewCounters,
    pub(crate) meta_edges: BTreeMap<EdgeId, MetaEdge>,
    /// Which meta-edge currently aggregates a given real edge.
    pub(crate) edge_meta: BTreeMap<EdgeId, EdgeId>,
}

impl View {
    pub(crate) fn new<S: Into<String>>(id: ViewId, name: S, main: bool) -> View {
        View {
            id,
            name: name.into(),
            main,
            tree: TreeStructure::new(),
            counters: ViewCounters::default(),
            meta_edges: BTreeMap::new(),
            edge_meta: BTreeMap::new(),
        }
    }

    /// An independent copy of this projection under a new identity, used when
    /// a collaborator asks for a fresh view over the same universe.
    pub(crate) fn clone_as<S: Into<String>>(&self, id: ViewId, name: S) -> View {
        View {
            id,
            name: name.into(),
            main: false,
            tree: self.tree.clone(),
            counters: self.counters,
            meta_edges: self.meta_edges.clone(),
            edge_meta: self.edge_meta.clone(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_main_view(&self) -> bool {
        self.main
    }

    pub fn structure(&self) -> &TreeStructure {
        &self.tree
    }

    pub fn counters(&self) -> &ViewCounters {
        &self.counters
    }

    pub fn meta_edge(&self, id: EdgeId) -> Option<&MetaEdge> {
        self.meta_edges.get(&id)
    }

    pub fn meta_edges(&self) -> impl Iterator<Item = &MetaEdge> {
        self.meta_edges.values()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.tree.contains_id(id)
    }
}
