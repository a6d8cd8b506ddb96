//! [crate::properties] contains the basic building blocks for assembling and manipulating
//! [crate::hierarchy::GraphStore]s and associated structures: identities, payloads, edge
//! records, and the identity factory.

pub use enumset::EnumSet;
use enumset::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    ops::{Deref, DerefMut},
};

/// Identity of a node, stable for the lifetime of the graph instance.
///
/// `NodeId(0)` is reserved for the synthetic root present in every view; the
/// [`GraphFactory`] allocates user ids starting at 1.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// The synthetic root of every view's tree. Level 0, pre 0, never enabled.
pub const ROOT_ID: NodeId = NodeId(0);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identity of an edge. Real edges and meta-edges share one id space so that a
/// meta-edge can never be confused for the real edge it aggregates.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

impl Display for EdgeId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identity of a view. The main view is created with the graph instance and
/// always has id 0.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ViewId(pub u32);

impl Display for ViewId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Closed tag for the kind of an edge record.
///
/// `Proper` is a directed edge between two distinct nodes, `SelfLoop` starts
/// and ends on the same node, `Mixed` is the tag carried by undirected edges
/// living alongside directed ones, and `Meta` marks the synthetic aggregation
/// edges derived between enabled clusters.
#[derive(EnumSetType, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    Proper,
    SelfLoop,
    Mixed,
    Meta,
}

impl EdgeKind {
    /// The tag a freshly created real edge carries.
    pub fn for_endpoints(source: NodeId, target: NodeId, directed: bool) -> EdgeKind {
        if source == target {
            EdgeKind::SelfLoop
        } else if directed {
            EdgeKind::Proper
        } else {
            EdgeKind::Mixed
        }
    }
}

impl Display for EdgeKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            EdgeKind::Proper => write!(f, "proper"),
            EdgeKind::SelfLoop => write!(f, "self-loop"),
            EdgeKind::Mixed => write!(f, "mixed"),
            EdgeKind::Meta => write!(f, "meta"),
        }
    }
}

/// A set of [`EdgeKind`] tags, used by the read API to filter edge iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeKindSet(pub EnumSet<EdgeKind>);

impl EdgeKindSet {
    pub fn empty() -> EdgeKindSet {
        EdgeKindSet(EnumSet::empty())
    }

    /// Every kind, including meta-edges.
    pub fn full() -> EdgeKindSet {
        EdgeKindSet(EnumSet::all())
    }

    /// The kinds a real (non-meta) edge may carry.
    pub fn real() -> EdgeKindSet {
        EdgeKindSet(EdgeKind::Proper | EdgeKind::SelfLoop | EdgeKind::Mixed)
    }
}

impl Default for EdgeKindSet {
    fn default() -> EdgeKindSet {
        EdgeKindSet::real()
    }
}

impl From<EdgeKind> for EdgeKindSet {
    fn from(kind: EdgeKind) -> EdgeKindSet {
        EdgeKindSet(kind.into())
    }
}

impl Deref for EdgeKindSet {
    type Target = EnumSet<EdgeKind>;
    fn deref(&self) -> &EnumSet<EdgeKind> {
        &self.0
    }
}

impl DerefMut for EdgeKindSet {
    fn deref_mut(&mut self) -> &mut EnumSet<EdgeKind> {
        &mut self.0
    }
}

/// The payload shared by every view-local copy of a logical node. Views own
/// their node's tree position and enablement; the payload lives once, in the
/// dictionary owned by the graph instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePayload {
    pub label: String,
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub attributes: std::collections::BTreeMap<String, String>,
}

impl NodePayload {
    pub fn labeled<S: Into<String>>(label: S) -> NodePayload {
        NodePayload {
            label: label.into(),
            ..Default::default()
        }
    }
}

/// A real edge as registered in the dictionary: an ordered pair of node ids
/// plus weight, directedness, and its kind tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f32,
    pub directed: bool,
    pub kind: EdgeKind,
}

impl EdgeRecord {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, weight: f32, directed: bool) -> Self {
        EdgeRecord {
            id,
            source,
            target,
            weight,
            directed,
            kind: EdgeKind::for_endpoints(source, target, directed),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

impl Display for EdgeRecord {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} [{} -> {}]", self.id, self.source, self.target)
    }
}

/// A synthetic edge aggregating every real edge crossing between two enabled
/// clusters. Keyed by the ordered pair (source cluster, target cluster); its
/// weight is the sum of the aggregated edge weights. Meta-edges are derived
/// state: they are destroyed and re-derived as enablement changes and are
/// never persisted as primary edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f32,
    pub edges: BTreeSet<EdgeId>,
}

impl MetaEdge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        MetaEdge {
            id,
            source,
            target,
            weight: 0.0,
            edges: BTreeSet::new(),
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Add a real edge's contribution. Returns false if the edge was already
    /// aggregated here.
    pub(crate) fn absorb(&mut self, edge: EdgeId, weight: f32) -> bool {
        if self.edges.insert(edge) {
            self.weight += weight;
            true
        } else {
            false
        }
    }

    /// Remove a real edge's contribution. Returns true when the meta-edge no
    /// longer aggregates anything and should be destroyed.
    pub(crate) fn release(&mut self, edge: EdgeId, weight: f32) -> bool {
        if self.edges.remove(&edge) {
            self.weight -= weight;
        }
        self.edges.is_empty()
    }
}

impl Display for MetaEdge {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} [{} => {}; {} edges]",
            self.id,
            self.source,
            self.target,
            self.edges.len()
        )
    }
}

/// Allocates node and edge identities for one graph instance. Owned by the
/// instance and persisted with it, so restored graphs keep allocating ids that
/// never collide with the ones already in use. No process-wide state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphFactory {
    next_node: u32,
    next_edge: u32,
}

impl Default for GraphFactory {
    fn default() -> GraphFactory {
        // NodeId(0) is the synthetic root.
        GraphFactory {
            next_node: 1,
            next_edge: 0,
        }
    }
}

impl GraphFactory {
    pub fn new_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub fn new_edge(&mut self) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        id
    }
}
