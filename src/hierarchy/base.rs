//! GraphStore: the graph instance facade.
//!
//! A [`GraphStore`] owns the node/edge dictionary (the arena), every view,
//! the reader/writer lock gating all structural access, the version counters,
//! and the outbound event channel. All mutation funnels through the structure
//! modifier under the write lock; events are published after the lock is
//! released, so handlers may re-enter for reads.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{mpsc::Receiver, Arc},
};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::{
    event::{EventBus, GraphEvent},
    properties::{
        EdgeId, EdgeKind, EdgeKindSet, EdgeRecord, GraphFactory, MetaEdge, NodeId, NodePayload,
        ViewId,
    },
    version::{GraphVersion, VersionToken},
    NestGraphError,
};

use super::{modifier::StructureModifier, processor, tree::TreeNode, View, ViewCounters};

/// The canonical node/edge dictionary plus the identity factory, owned by the
/// graph instance and anchored by its main view. Mutated only while the write
/// lock is held.
#[derive(Debug, Default)]
pub(crate) struct GraphArena {
    pub(crate) nodes: BTreeMap<NodeId, NodePayload>,
    pub(crate) edges: BTreeMap<EdgeId, EdgeRecord>,
    pub(crate) factory: GraphFactory,
}

#[derive(Debug)]
pub(crate) struct GraphCore {
    pub(crate) arena: GraphArena,
    pub(crate) views: BTreeMap<ViewId, View>,
    pub(crate) main_view: ViewId,
    pub(crate) next_view: u32,
}

impl GraphCore {
    pub(crate) fn new() -> GraphCore {
        let main = ViewId(0);
        let mut views = BTreeMap::new();
        views.insert(main, View::new(main, "main", true));
        GraphCore {
            arena: GraphArena::default(),
            views,
            main_view: main,
            next_view: 1,
        }
    }

    pub(crate) fn view(&self, id: ViewId) -> Result<&View, NestGraphError> {
        self.views
            .get(&id)
            .ok_or_else(|| NestGraphError::NotFound(format!("view {id} does not exist")))
    }
}

/// Which version counter a completed operation bumps.
#[derive(Clone, Copy)]
enum Category {
    Nodes,
    Edges,
    Both,
}

/// A mutable hierarchical graph with multi-view projections.
///
/// One global reentrant reader/writer lock serializes all structural access;
/// operations against a single instance are totally ordered by write-lock
/// acquisition. See the crate documentation for the full model.
pub struct GraphStore {
    core: Arc<RwLock<GraphCore>>,
    version: Arc<GraphVersion>,
    bus: Mutex<EventBus>,
}

impl Default for GraphStore {
    fn default() -> GraphStore {
        GraphStore::new()
    }
}

impl fmt::Display for GraphStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.core.read_recursive();
        write!(
            f,
            "GraphStore({} views, {} nodes, {} edges)",
            guard.views.len(),
            guard.arena.nodes.len(),
            guard.arena.edges.len()
        )
    }
}

impl GraphStore {
    pub fn new() -> GraphStore {
        GraphStore {
            core: Arc::new(RwLock::new(GraphCore::new())),
            version: Arc::new(GraphVersion::default()),
            bus: Mutex::new(EventBus::default()),
        }
    }

    pub(crate) fn from_core(core: GraphCore) -> GraphStore {
        GraphStore {
            core: Arc::new(RwLock::new(core)),
            version: Arc::new(GraphVersion::default()),
            bus: Mutex::new(EventBus::default()),
        }
    }

    /// The view created with the instance, owner of the canonical dictionary.
    pub fn main_view(&self) -> ViewId {
        self.core.read_recursive().main_view
    }

    /// Subscribe to structure change events. Events are delivered in
    /// operation completion order, after the write lock is released.
    pub fn subscribe(&self) -> Receiver<GraphEvent> {
        self.bus.lock().subscribe()
    }

    /// Current version counters, readable without taking the lock.
    pub fn version(&self) -> VersionToken {
        self.version.token()
    }

    /// Acquire the read lock (reentrant for readers) and expose the read API.
    pub fn read(&self) -> GraphReader<'_> {
        GraphReader {
            guard: self.core.read_recursive(),
            version: &self.version,
        }
    }

    fn mutate<T>(
        &self,
        view: ViewId,
        category: Category,
        f: impl FnOnce(&mut StructureModifier) -> Result<T, NestGraphError>,
    ) -> Result<T, NestGraphError> {
        let (out, events) = {
            let mut guard = self.core.write();
            let mut modifier = StructureModifier::new(&mut guard, view);
            let out = f(&mut modifier)?;
            let events = modifier.take_events();
            match category {
                Category::Nodes => {
                    self.version.bump_nodes();
                }
                Category::Edges => {
                    self.version.bump_edges();
                }
                Category::Both => {
                    self.version.bump_nodes();
                    self.version.bump_edges();
                }
            }
            (out, events)
        };
        self.bus.lock().dispatch(events);
        Ok(out)
    }

    /// Clone the main view's current projection under a new name.
    pub fn create_view<S: Into<String>>(&self, name: S) -> ViewId {
        let id = {
            let mut guard = self.core.write();
            let id = ViewId(guard.next_view);
            guard.next_view += 1;
            let main = guard.main_view;
            let cloned = guard
                .views
                .get(&main)
                .expect("the main view is always present")
                .clone_as(id, name);
            guard.views.insert(id, cloned);
            id
        };
        self.bus
            .lock()
            .dispatch(vec![GraphEvent::ViewCreated(id)]);
        id
    }

    /// Remove a non-main view.
    pub fn destroy_view(&self, view: ViewId) -> Result<(), NestGraphError> {
        {
            let mut guard = self.core.write();
            if view == guard.main_view {
                return Err(NestGraphError::InvalidArgument(
                    "the main view cannot be destroyed".into(),
                ));
            }
            if guard.views.remove(&view).is_none() {
                return Err(NestGraphError::NotFound(format!(
                    "view {view} does not exist"
                )));
            }
        }
        self.bus
            .lock()
            .dispatch(vec![GraphEvent::ViewDestroyed(view)]);
        Ok(())
    }

    /// Insert a fresh node under `parent` (the synthetic root when `None`).
    pub fn add_node(
        &self,
        view: ViewId,
        parent: Option<NodeId>,
    ) -> Result<NodeId, NestGraphError> {
        self.add_node_with(view, parent, NodePayload::default())
    }

    pub fn add_node_with(
        &self,
        view: ViewId,
        parent: Option<NodeId>,
        payload: NodePayload,
    ) -> Result<NodeId, NestGraphError> {
        self.mutate(view, Category::Nodes, |m| m.add_node(parent, payload))
    }

    /// Remove `node` and its descendants. Returns the removed ids.
    pub fn delete_node(&self, view: ViewId, node: NodeId) -> Result<Vec<NodeId>, NestGraphError> {
        self.mutate(view, Category::Both, |m| m.delete_node(node))
    }

    /// Register an edge between two nodes of `view`. `Ok(None)` means an edge
    /// between the same ordered pair already exists.
    pub fn add_edge(
        &self,
        view: ViewId,
        source: NodeId,
        target: NodeId,
        weight: f32,
        directed: bool,
    ) -> Result<Option<EdgeId>, NestGraphError> {
        self.mutate(view, Category::Edges, |m| {
            m.add_edge(source, target, weight, directed)
        })
    }

    pub fn delete_edge(&self, view: ViewId, edge: EdgeId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Edges, |m| m.delete_edge(edge))
    }

    pub fn delete_meta_edge(&self, view: ViewId, meta: EdgeId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Edges, |m| m.delete_meta_edge(meta))
    }

    /// Disable the cluster `node` and surface its direct children.
    pub fn expand(&self, view: ViewId, node: NodeId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.expand(node))
    }

    /// Re-enable the cluster `node` and sink its direct children.
    pub fn retract(&self, view: ViewId, node: NodeId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.retract(node))
    }

    /// Re-parent `node` under `group`, reconciling enablement and meta-edges.
    pub fn move_to_group(
        &self,
        view: ViewId,
        node: NodeId,
        group: NodeId,
    ) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.move_to_group(node, group))
    }

    /// Create a cluster node over `members` (which must share a parent) and
    /// move them into it. Returns the new cluster's id.
    pub fn group(&self, view: ViewId, members: &[NodeId]) -> Result<NodeId, NestGraphError> {
        self.mutate(view, Category::Both, |m| m.group(members))
    }

    /// Dissolve a cluster, lifting its children to its former parent.
    pub fn ungroup(&self, view: ViewId, group: NodeId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.ungroup(group))
    }

    /// Collapse the view's hierarchy to one level, materializing meta-edges
    /// into real edges. A view of height 1 is left untouched.
    pub fn flatten(&self, view: ViewId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.flatten())
    }

    /// Bulk removal of everything in `view` (and, through the main view, of
    /// everything everywhere).
    pub fn clear(&self, view: ViewId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.clear())
    }

    /// Remove every real edge, keeping nodes and enablement.
    pub fn clear_edges(&self, view: ViewId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Edges, |m| m.clear_edges())
    }

    pub fn reset_view_to_leaves(&self, view: ViewId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.reset_view_to_leaves())
    }

    pub fn reset_view_to_top_nodes(&self, view: ViewId) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.reset_view_to_top_nodes())
    }

    pub fn reset_view_to_level(&self, view: ViewId, level: usize) -> Result<(), NestGraphError> {
        self.mutate(view, Category::Both, |m| m.reset_view_to_level(level))
    }

    /// Replace a node's shared payload. Not a structural change: no version
    /// bump, no event.
    pub fn update_payload(
        &self,
        node: NodeId,
        payload: NodePayload,
    ) -> Result<(), NestGraphError> {
        let mut guard = self.core.write();
        match guard.arena.nodes.get_mut(&node) {
            Some(slot) => {
                *slot = payload;
                Ok(())
            }
            None => Err(NestGraphError::NotFound(format!(
                "node {node} is not in the dictionary"
            ))),
        }
    }

    /// Rebuild a store from a persisted snapshot. The tree topology is
    /// reconstructed from parent-pre plus insertion order, meta-edges are
    /// re-derived, and the recomputed counters are checked against the
    /// serialized ones.
    pub fn restore(snapshot: &crate::snapshot::GraphSnapshot) -> Result<GraphStore, NestGraphError> {
        crate::snapshot::restore(snapshot)
    }
}

/// The read API, holding the read lock for its lifetime.
///
/// Collections returned by value (`nodes`, `edges`, ...) may outlive the
/// guard; pair them with [`GraphReader::version_token`] and re-validate
/// against [`GraphStore::version`] before trusting them later.
pub struct GraphReader<'a> {
    guard: RwLockReadGuard<'a, GraphCore>,
    version: &'a GraphVersion,
}

impl GraphReader<'_> {
    pub fn view(&self, view: ViewId) -> Result<&View, NestGraphError> {
        self.guard.view(view)
    }

    pub fn views(&self) -> Vec<(ViewId, String, bool)> {
        self.guard
            .views
            .values()
            .map(|v| (v.id(), v.name().to_string(), v.is_main_view()))
            .collect()
    }

    pub fn version_token(&self) -> VersionToken {
        self.version.token()
    }

    pub fn node_count(&self, view: ViewId) -> Result<usize, NestGraphError> {
        Ok(self.view(view)?.structure().node_count())
    }

    pub fn edge_count(&self, view: ViewId) -> Result<usize, NestGraphError> {
        Ok(self.view(view)?.counters().edges_count_total)
    }

    pub fn meta_edge_count(&self, view: ViewId) -> Result<usize, NestGraphError> {
        Ok(self.view(view)?.counters().meta_edges_count)
    }

    pub fn counters(&self, view: ViewId) -> Result<ViewCounters, NestGraphError> {
        Ok(*self.view(view)?.counters())
    }

    pub fn height(&self, view: ViewId) -> Result<usize, NestGraphError> {
        Ok(self.view(view)?.structure().height())
    }

    /// Node ids of `view` in pre order.
    pub fn nodes(&self, view: ViewId) -> Result<Vec<NodeId>, NestGraphError> {
        Ok(self.view(view)?.structure().iter().map(|n| n.id()).collect())
    }

    pub fn node(&self, view: ViewId, node: NodeId) -> Result<&TreeNode, NestGraphError> {
        self.view(view)?.structure().require(node)
    }

    pub fn payload(&self, node: NodeId) -> Option<&NodePayload> {
        self.guard.arena.nodes.get(&node)
    }

    pub fn edge(&self, edge: EdgeId) -> Option<&EdgeRecord> {
        self.guard.arena.edges.get(&edge)
    }

    /// Real edge ids indexed in `view`, each once, in source pre order.
    pub fn edges(&self, view: ViewId) -> Result<Vec<EdgeId>, NestGraphError> {
        Ok(self
            .view(view)?
            .structure()
            .iter()
            .flat_map(|n| n.out_edges().values().copied())
            .collect())
    }

    /// Edge ids of `view` filtered by kind; including [`EdgeKind::Meta`] in
    /// the set selects the view's meta-edges as well.
    pub fn edges_of_kind(
        &self,
        view: ViewId,
        kinds: EdgeKindSet,
    ) -> Result<Vec<EdgeId>, NestGraphError> {
        let v = self.view(view)?;
        let mut out: Vec<EdgeId> = v
            .structure()
            .iter()
            .flat_map(|n| n.out_edges().values().copied())
            .filter(|eid| {
                self.guard
                    .arena
                    .edges
                    .get(eid)
                    .map(|e| kinds.contains(e.kind))
                    .unwrap_or(false)
            })
            .collect();
        if kinds.contains(EdgeKind::Meta) {
            out.extend(v.meta_edges().map(|m| m.id));
        }
        Ok(out)
    }

    pub fn meta_edges(&self, view: ViewId) -> Result<Vec<&MetaEdge>, NestGraphError> {
        Ok(self.view(view)?.meta_edges().collect())
    }

    pub fn meta_edge(&self, view: ViewId, meta: EdgeId) -> Result<Option<&MetaEdge>, NestGraphError> {
        Ok(self.view(view)?.meta_edge(meta))
    }

    pub fn children(&self, view: ViewId, node: NodeId) -> Result<Vec<NodeId>, NestGraphError> {
        let v = self.view(view)?;
        v.structure().require(node)?;
        Ok(v.structure().children(node).collect())
    }

    pub fn descendants(&self, view: ViewId, node: NodeId) -> Result<Vec<NodeId>, NestGraphError> {
        let v = self.view(view)?;
        v.structure().require(node)?;
        Ok(v.structure().descendants(node).collect())
    }

    pub fn ancestors(&self, view: ViewId, node: NodeId) -> Result<Vec<NodeId>, NestGraphError> {
        let v = self.view(view)?;
        v.structure().require(node)?;
        Ok(v.structure().ancestors(node).collect())
    }

    pub fn enabled_ancestor(
        &self,
        view: ViewId,
        node: NodeId,
    ) -> Result<Option<NodeId>, NestGraphError> {
        let v = self.view(view)?;
        v.structure().require(node)?;
        Ok(v.structure().enabled_ancestor(node))
    }

    /// O(1) strict containment via pre/post comparison.
    pub fn contains(
        &self,
        view: ViewId,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> Result<bool, NestGraphError> {
        Ok(self.view(view)?.structure().contains(ancestor, descendant))
    }

    pub fn is_enabled(&self, view: ViewId, node: NodeId) -> Result<bool, NestGraphError> {
        Ok(self.view(view)?.structure().require(node)?.is_enabled())
    }

    /// Enabled (in, out, mutual) degrees of a node.
    pub fn degrees(
        &self,
        view: ViewId,
        node: NodeId,
    ) -> Result<(usize, usize, usize), NestGraphError> {
        let n = self.view(view)?.structure().require(node)?;
        Ok((
            n.enabled_in_degree(),
            n.enabled_out_degree(),
            n.enabled_mutual_degree(),
        ))
    }

    /// Export the visible projection of `view` for external algorithm
    /// consumers: enabled nodes, real enabled-enabled edges, and meta-edges,
    /// weighted.
    pub fn enabled_subgraph(
        &self,
        view: ViewId,
    ) -> Result<petgraph::Graph<NodeId, f32>, NestGraphError> {
        let v = self.view(view)?;
        let tree = v.structure();
        let mut graph = petgraph::Graph::new();
        let mut indices = BTreeMap::new();
        for node in tree.iter().filter(|n| n.is_enabled()) {
            indices.insert(node.id(), graph.add_node(node.id()));
        }
        for node in tree.iter().filter(|n| n.is_enabled()) {
            for (&nbr, &eid) in node.out_edges() {
                let (Some(&s), Some(&t)) = (indices.get(&node.id()), indices.get(&nbr)) else {
                    continue;
                };
                let weight = self
                    .guard
                    .arena
                    .edges
                    .get(&eid)
                    .map(|e| e.weight)
                    .unwrap_or(0.0);
                graph.add_edge(s, t, weight);
            }
        }
        for meta in v.meta_edges() {
            let (Some(&s), Some(&t)) = (indices.get(&meta.source), indices.get(&meta.target))
            else {
                continue;
            };
            graph.add_edge(s, t, meta.weight);
        }
        Ok(graph)
    }

    /// Capture the persistence contract for the whole instance: per view the
    /// node positions/enablement/degrees and counters, plus the shared
    /// payloads and edges. Meta-edges are derived state and are not captured.
    pub fn snapshot(&self) -> Result<crate::snapshot::GraphSnapshot, NestGraphError> {
        crate::snapshot::capture(&self.guard)
    }

    /// Re-derive every invariant of `view` by brute force and report the
    /// first violation: positional consistency, enablement antichain, counter
    /// and degree consistency, and meta-edge aggregation state.
    pub fn built_in_test(&self, view: ViewId) -> Result<(), NestGraphError> {
        let v = self.view(view)?;
        v.structure().built_in_test()?;
        let (expected, degrees) = processor::derive_counters(v);
        if expected != *v.counters() {
            return Err(NestGraphError::Invariant(format!(
                "counter mismatch in {view}: expected {expected:?}, found {:?}",
                v.counters()
            )));
        }
        for node in v.structure().iter() {
            let oracle = degrees.get(&node.id()).copied().unwrap_or((0, 0, 0));
            let actual = (
                node.enabled_in_degree(),
                node.enabled_out_degree(),
                node.enabled_mutual_degree(),
            );
            if oracle != actual {
                return Err(NestGraphError::Invariant(format!(
                    "degree mismatch for {} in {view}: expected {oracle:?}, found {actual:?}",
                    node.id()
                )));
            }
        }
        let derived = processor::derive_meta_edges(v);
        let actual: BTreeMap<(NodeId, NodeId), BTreeSet<EdgeId>> = v
            .meta_edges()
            .map(|m| ((m.source, m.target), m.edges.clone()))
            .collect();
        if derived != actual {
            return Err(NestGraphError::Invariant(format!(
                "meta-edge aggregation mismatch in {view}: derived {} pairs, found {}",
                derived.len(),
                actual.len()
            )));
        }
        Ok(())
    }
}
