//! The persistence contract.
//!
//! A [`GraphSnapshot`] captures, per view, every node's {id, enabled, pre,
//! parent-pre, enabled in/out/mutual degree} and the aggregate counters; per
//! edge {id, source-pre, target-pre (resolved in the main view), weight,
//! kind}; plus the shared payload dictionary and the identity factory. That
//! is sufficient to fully reconstruct the tree topology (parent-pre plus
//! insertion order rebuilds the pre numbering) and to re-derive the
//! meta-edges on load — meta-edges are never persisted as primary edges.
//!
//! [`restore`] recomputes the counters and degrees after rebuilding and
//! cross-checks them against the serialized values, so a snapshot produced by
//! an inconsistent writer is rejected instead of silently trusted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    hierarchy::{
        base::{GraphArena, GraphCore},
        processor::EdgeProcessor,
        GraphStore, View, ViewCounters,
    },
    properties::{
        EdgeId, EdgeKind, EdgeRecord, GraphFactory, NodeId, NodePayload, ViewId, ROOT_ID,
    },
    NestGraphError,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub enabled: bool,
    pub pre: usize,
    /// Pre position of the parent in the same view; 0 means the synthetic
    /// root.
    pub parent_pre: usize,
    pub enabled_in: usize,
    pub enabled_out: usize,
    pub enabled_mutual: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    /// Endpoint positions resolved in the main view's numbering.
    pub source_pre: usize,
    pub target_pre: usize,
    pub weight: f32,
    pub directed: bool,
    pub kind: EdgeKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub id: ViewId,
    pub name: String,
    pub main: bool,
    pub counters: ViewCounters,
    /// In pre order.
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub views: Vec<ViewSnapshot>,
    pub payloads: BTreeMap<NodeId, NodePayload>,
    pub edges: Vec<EdgeSnapshot>,
    pub factory: GraphFactory,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String, NestGraphError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<GraphSnapshot, NestGraphError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub(crate) fn capture(core: &GraphCore) -> Result<GraphSnapshot, NestGraphError> {
    let main = core.view(core.main_view)?;
    let views = core
        .views
        .values()
        .map(|v| {
            let tree = v.structure();
            ViewSnapshot {
                id: v.id(),
                name: v.name().to_string(),
                main: v.is_main_view(),
                counters: *v.counters(),
                nodes: tree
                    .iter()
                    .map(|n| NodeSnapshot {
                        id: n.id(),
                        enabled: n.is_enabled(),
                        pre: n.pre(),
                        parent_pre: n
                            .parent()
                            .and_then(|p| tree.node(p))
                            .map(|p| p.pre())
                            .unwrap_or(0),
                        enabled_in: n.enabled_in_degree(),
                        enabled_out: n.enabled_out_degree(),
                        enabled_mutual: n.enabled_mutual_degree(),
                    })
                    .collect(),
            }
        })
        .collect();
    let mut edges = Vec::with_capacity(core.arena.edges.len());
    for record in core.arena.edges.values() {
        let (Some(s), Some(t)) = (
            main.structure().node(record.source),
            main.structure().node(record.target),
        ) else {
            tracing::warn!(
                "skipping edge {} with an endpoint outside the main view",
                record.id
            );
            continue;
        };
        edges.push(EdgeSnapshot {
            id: record.id,
            source_pre: s.pre(),
            target_pre: t.pre(),
            weight: record.weight,
            directed: record.directed,
            kind: record.kind,
        });
    }
    Ok(GraphSnapshot {
        views,
        payloads: core.arena.nodes.clone(),
        edges,
        factory: core.arena.factory.clone(),
    })
}

pub(crate) fn restore(snapshot: &GraphSnapshot) -> Result<GraphStore, NestGraphError> {
    if snapshot.views.iter().filter(|v| v.main).count() != 1 {
        return Err(NestGraphError::Serialization(
            "a snapshot must contain exactly one main view".into(),
        ));
    }
    let mut views: BTreeMap<ViewId, View> = BTreeMap::new();
    let mut main_view = ViewId(0);
    let mut main_pre_to_id: BTreeMap<usize, NodeId> = BTreeMap::new();
    let mut next_view = 0u32;
    for vs in &snapshot.views {
        let mut view = View::new(vs.id, vs.name.clone(), vs.main);
        let mut pre_to_id = BTreeMap::from([(0usize, ROOT_ID)]);
        let mut ordered: Vec<&NodeSnapshot> = vs.nodes.iter().collect();
        ordered.sort_by_key(|n| n.pre);
        for ns in ordered {
            let parent = pre_to_id.get(&ns.parent_pre).copied().ok_or_else(|| {
                NestGraphError::Serialization(format!(
                    "node {} in view {} references unknown parent pre {}",
                    ns.id, vs.id, ns.parent_pre
                ))
            })?;
            view.tree.insert_as_child(ns.id, parent)?;
            let rebuilt_pre = view.tree.require(ns.id)?.pre();
            if rebuilt_pre != ns.pre {
                return Err(NestGraphError::Serialization(format!(
                    "node {} in view {} reconstructed at pre {rebuilt_pre}, expected {}",
                    ns.id, vs.id, ns.pre
                )));
            }
            if ns.enabled {
                if let Some(n) = view.tree.node_mut(ns.id) {
                    n.enabled = true;
                }
            }
            pre_to_id.insert(ns.pre, ns.id);
        }
        if vs.main {
            main_view = vs.id;
            main_pre_to_id = pre_to_id;
        }
        next_view = next_view.max(vs.id.0 + 1);
        views.insert(vs.id, view);
    }
    let mut arena = GraphArena {
        nodes: snapshot.payloads.clone(),
        edges: BTreeMap::new(),
        factory: snapshot.factory.clone(),
    };
    for es in &snapshot.edges {
        let resolve = |pre: usize| {
            main_pre_to_id.get(&pre).copied().ok_or_else(|| {
                NestGraphError::Serialization(format!(
                    "edge {} references unknown pre {pre} in the main view",
                    es.id
                ))
            })
        };
        let source = resolve(es.source_pre)?;
        let target = resolve(es.target_pre)?;
        arena.edges.insert(
            es.id,
            EdgeRecord {
                id: es.id,
                source,
                target,
                weight: es.weight,
                directed: es.directed,
                kind: es.kind,
            },
        );
    }
    let records: Vec<EdgeRecord> = arena.edges.values().cloned().collect();
    for view in views.values_mut() {
        for record in &records {
            if !view.tree.contains_id(record.source) || !view.tree.contains_id(record.target) {
                continue;
            }
            if let Some(n) = view.tree.node_mut(record.source) {
                n.out_edges.insert(record.target, record.id);
            }
            if let Some(n) = view.tree.node_mut(record.target) {
                n.in_edges.insert(record.source, record.id);
            }
        }
        let mut proc = EdgeProcessor {
            view,
            arena: &mut arena,
        };
        proc.rebuild_enabled_counters();
        proc.rebuild_meta_edges();
    }
    for vs in &snapshot.views {
        let view = views.get(&vs.id).ok_or_else(|| {
            NestGraphError::Serialization(format!("view {} vanished during restore", vs.id))
        })?;
        if *view.counters() != vs.counters {
            return Err(NestGraphError::Serialization(format!(
                "counters of view {} diverge after reconstruction: rebuilt {:?}, serialized {:?}",
                vs.id,
                view.counters(),
                vs.counters
            )));
        }
        for ns in &vs.nodes {
            let node = view.tree.require(ns.id)?;
            let rebuilt = (
                node.enabled_in_degree(),
                node.enabled_out_degree(),
                node.enabled_mutual_degree(),
            );
            if rebuilt != (ns.enabled_in, ns.enabled_out, ns.enabled_mutual) {
                return Err(NestGraphError::Serialization(format!(
                    "degrees of {} in view {} diverge after reconstruction",
                    ns.id, vs.id
                )));
            }
        }
    }
    Ok(GraphStore::from_core(GraphCore {
        arena,
        views,
        main_view,
        next_view,
    }))
}
