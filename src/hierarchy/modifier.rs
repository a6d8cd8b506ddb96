//! Structure modifier: the only entry point for structural mutation.
//!
//! Each public operation on [`crate::hierarchy::GraphStore`] constructs one
//! [`StructureModifier`] while the write lock is held, runs the operation's
//! fixed mutation sequence against the positional index and the edge
//! processor, and collects the resulting [`GraphEvent`]s. The store bumps the
//! version counters and publishes the events only after the lock has been
//! released.
//!
//! Validation happens before the first mutation of each operation, so a
//! returned error leaves the structure untouched. There is no rollback for a
//! failure in the middle of a mutation sequence; the lock discipline merely
//! guarantees that no other thread can observe the torn state.

use std::collections::BTreeSet;

use crate::{
    event::GraphEvent,
    properties::{EdgeId, EdgeRecord, NodeId, NodePayload, ViewId, ROOT_ID},
    NestGraphError,
};

use super::{
    base::{GraphArena, GraphCore},
    processor::EdgeProcessor,
    tree::TreeNode,
    TreeStructure, View,
};

pub(crate) struct StructureModifier<'a> {
    core: &'a mut GraphCore,
    view: ViewId,
    events: Vec<GraphEvent>,
}

impl<'a> StructureModifier<'a> {
    pub(crate) fn new(core: &'a mut GraphCore, view: ViewId) -> StructureModifier<'a> {
        StructureModifier {
            core,
            view,
            events: Vec::new(),
        }
    }

    pub(crate) fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    fn split(&mut self) -> Result<(&mut View, &mut GraphArena), NestGraphError> {
        let view = self.view;
        let GraphCore { arena, views, .. } = &mut *self.core;
        let view = views
            .get_mut(&view)
            .ok_or_else(|| NestGraphError::NotFound(format!("view {view} does not exist")))?;
        Ok((view, arena))
    }

    fn split_view(
        &mut self,
        view: ViewId,
    ) -> Result<(&mut View, &mut GraphArena), NestGraphError> {
        let GraphCore { arena, views, .. } = &mut *self.core;
        let view = views
            .get_mut(&view)
            .ok_or_else(|| NestGraphError::NotFound(format!("view {view} does not exist")))?;
        Ok((view, arena))
    }

    fn view_ids(&self) -> Vec<ViewId> {
        self.core.views.keys().copied().collect()
    }

    fn is_main(&self) -> bool {
        self.view == self.core.main_view
    }

    /// Drop dictionary entries (and their edges) for candidates no view
    /// references anymore. Returns the ids of the dropped edges.
    fn gc_dictionary(&mut self, candidates: &[NodeId]) -> Vec<EdgeId> {
        let mut dropped = Vec::new();
        for &id in candidates {
            if self.core.views.values().any(|v| v.contains_node(id)) {
                continue;
            }
            self.core.arena.nodes.remove(&id);
            let dead: Vec<EdgeId> = self
                .core
                .arena
                .edges
                .iter()
                .filter(|(_, e)| e.source == id || e.target == id)
                .map(|(eid, _)| *eid)
                .collect();
            for eid in dead {
                self.core.arena.edges.remove(&eid);
                dropped.push(eid);
            }
        }
        dropped
    }

    /// Insert a fresh node as a child of `parent` (the synthetic root when
    /// unspecified). The node starts enabled iff no enabled ancestor
    /// represents it.
    pub(crate) fn add_node(
        &mut self,
        parent: Option<NodeId>,
        payload: NodePayload,
    ) -> Result<NodeId, NestGraphError> {
        let parent = parent.unwrap_or(ROOT_ID);
        {
            let (view, _) = self.split()?;
            view.tree.require(parent)?;
        }
        let id = self.core.arena.factory.new_node();
        self.core.arena.nodes.insert(id, payload);
        let (view, _) = self.split()?;
        view.tree.insert_as_child(id, parent)?;
        let enabled = view.tree.enabled_ancestor(id).is_none();
        if let Some(n) = view.tree.node_mut(id) {
            n.enabled = enabled;
        }
        if enabled {
            view.counters.nodes_enabled += 1;
        }
        tracing::debug!("added {id} under {parent}");
        self.events
            .push(GraphEvent::NodesAdded(self.view, vec![id]));
        Ok(id)
    }

    /// Remove `node` and its descendants from the operating view. Through the
    /// main view the removal cascades to every view holding a copy; the
    /// dictionary drops whatever no view references afterwards.
    pub(crate) fn delete_node(&mut self, node: NodeId) -> Result<Vec<NodeId>, NestGraphError> {
        if node == ROOT_ID {
            return Err(NestGraphError::InvalidArgument(
                "the synthetic root cannot be deleted".into(),
            ));
        }
        let removed: Vec<NodeId> = {
            let (view, _) = self.split()?;
            view.tree.require(node)?;
            std::iter::once(node)
                .chain(view.tree.descendants(node))
                .collect()
        };
        let view_ids = if self.is_main() {
            self.view_ids()
        } else {
            vec![self.view]
        };
        for vid in view_ids {
            for &id in &removed {
                self.remove_single(vid, id)?;
            }
        }
        let dropped_edges = self.gc_dictionary(&removed);
        tracing::debug!("deleted {node} ({} nodes removed)", removed.len());
        self.events
            .push(GraphEvent::NodesRemoved(self.view, removed.clone()));
        if !dropped_edges.is_empty() {
            self.events
                .push(GraphEvent::EdgesRemoved(self.view, dropped_edges));
        }
        Ok(removed)
    }

    /// Remove one node from one view: meta-edges, counters, edge indices,
    /// then the tree record itself (children hop to its parent, which keeps
    /// the cascade safe when view topologies diverge).
    fn remove_single(&mut self, vid: ViewId, id: NodeId) -> Result<(), NestGraphError> {
        let (view, arena) = self.split_view(vid)?;
        if !view.tree.contains_id(id) {
            return Ok(());
        }
        let mut proc = EdgeProcessor { view, arena };
        proc.clear_meta_edges(id);
        let enabled = proc
            .view
            .tree
            .node(id)
            .map(|n| n.is_enabled())
            .unwrap_or(false);
        if enabled {
            proc.decrement_edges_counting(id, None);
            if let Some(n) = proc.view.tree.node_mut(id) {
                n.enabled = false;
            }
            proc.view.counters.nodes_enabled -= 1;
        }
        let touching: BTreeSet<EdgeId> = match proc.view.tree.node(id) {
            Some(n) => n
                .out_edges
                .values()
                .chain(n.in_edges.values())
                .copied()
                .collect(),
            None => BTreeSet::new(),
        };
        for eid in touching {
            if let Some(record) = proc.arena.edges.get(&eid).cloned() {
                proc.unindex_edge(&record);
            }
        }
        proc.view.tree.delete_only_self(id)?;
        Ok(())
    }

    /// Register and index a new edge. `Ok(None)` means an edge between the
    /// same ordered pair is already indexed, which is an expected outcome,
    /// not an error.
    pub(crate) fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        weight: f32,
        directed: bool,
    ) -> Result<Option<EdgeId>, NestGraphError> {
        {
            let (view, _) = self.split()?;
            let src = view.tree.require(source)?;
            view.tree.require(target)?;
            if src.out_edges().contains_key(&target) {
                return Ok(None);
            }
        }
        let id = self.core.arena.factory.new_edge();
        let record = EdgeRecord::new(id, source, target, weight, directed);
        self.core.arena.edges.insert(id, record.clone());
        for vid in self.view_ids() {
            let (view, arena) = self.split_view(vid)?;
            if !view.tree.contains_id(source) || !view.tree.contains_id(target) {
                continue;
            }
            let mut proc = EdgeProcessor { view, arena };
            proc.index_edge(&record);
        }
        tracing::debug!("added edge {record}");
        self.events
            .push(GraphEvent::EdgesAdded(self.view, vec![id]));
        Ok(Some(id))
    }

    /// Remove a real edge from the dictionary and from every view indexing
    /// it, withdrawing counters and meta-edge contributions.
    pub(crate) fn delete_edge(&mut self, edge: EdgeId) -> Result<(), NestGraphError> {
        let record = self
            .core
            .arena
            .edges
            .get(&edge)
            .cloned()
            .ok_or_else(|| NestGraphError::InvalidState(format!("edge {edge} is not indexed")))?;
        for vid in self.view_ids() {
            let (view, arena) = self.split_view(vid)?;
            let indexed = view
                .tree
                .node(record.source)
                .map(|n| n.out_edges().get(&record.target).copied() == Some(edge))
                .unwrap_or(false);
            if !indexed {
                continue;
            }
            let both_enabled = view
                .tree
                .node(record.source)
                .map(|n| n.is_enabled())
                .unwrap_or(false)
                && view
                    .tree
                    .node(record.target)
                    .map(|n| n.is_enabled())
                    .unwrap_or(false);
            let mut proc = EdgeProcessor { view, arena };
            if both_enabled {
                proc.uncount_enabled_edge(&record);
            }
            proc.unindex_edge(&record);
        }
        self.core.arena.edges.remove(&edge);
        self.events
            .push(GraphEvent::EdgesRemoved(self.view, vec![edge]));
        Ok(())
    }

    /// Destroy one meta-edge of the operating view without touching the real
    /// edges it aggregated.
    pub(crate) fn delete_meta_edge(&mut self, meta: EdgeId) -> Result<(), NestGraphError> {
        let (view, arena) = self.split()?;
        if !view.meta_edges.contains_key(&meta) {
            return Err(NestGraphError::InvalidState(format!(
                "meta-edge {meta} is not indexed"
            )));
        }
        let mut proc = EdgeProcessor { view, arena };
        proc.destroy_meta(meta);
        self.events.push(GraphEvent::MetaEdgesUpdated(self.view));
        Ok(())
    }

    /// Disable the cluster `node` and surface its direct children, migrating
    /// counters and meta-edges down to them.
    pub(crate) fn expand(&mut self, node: NodeId) -> Result<(), NestGraphError> {
        let children: Vec<NodeId> = {
            let (view, _) = self.split()?;
            let n = view.tree.require(node)?;
            if !n.is_enabled() {
                return Err(NestGraphError::InvalidState(format!(
                    "expand requires {node} to be enabled"
                )));
            }
            if n.is_leaf() {
                return Err(NestGraphError::InvalidState(format!(
                    "expand requires {node} to have children"
                )));
            }
            view.tree.children(node).collect()
        };
        let (view, arena) = self.split()?;
        let mut proc = EdgeProcessor { view, arena };
        proc.decrement_edges_counting(node, None);
        proc.clear_meta_edges(node);
        if let Some(n) = proc.view.tree.node_mut(node) {
            n.enabled = false;
        }
        proc.view.counters.nodes_enabled -= 1;
        for &child in &children {
            if let Some(n) = proc.view.tree.node_mut(child) {
                n.enabled = true;
            }
            proc.view.counters.nodes_enabled += 1;
            proc.increment_edges_counting(child, Some(node));
            proc.compute_meta_edges(child, child);
        }
        self.events.push(GraphEvent::Expanded(self.view, node));
        self.events.push(GraphEvent::MetaEdgesUpdated(self.view));
        Ok(())
    }

    /// Inverse of [`StructureModifier::expand`]: re-enable the cluster and
    /// sink its direct children, migrating counters and meta-edges up.
    pub(crate) fn retract(&mut self, node: NodeId) -> Result<(), NestGraphError> {
        let children: Vec<NodeId> = {
            let (view, _) = self.split()?;
            let n = view.tree.require(node)?;
            if n.is_enabled() {
                return Err(NestGraphError::InvalidState(format!(
                    "retract requires {node} to be disabled"
                )));
            }
            if n.is_leaf() {
                return Err(NestGraphError::InvalidState(format!(
                    "retract requires {node} to have children"
                )));
            }
            let children: Vec<NodeId> = view.tree.children(node).collect();
            if children.iter().any(|c| {
                !view
                    .tree
                    .node(*c)
                    .map(|n| n.is_enabled())
                    .unwrap_or(false)
            }) {
                return Err(NestGraphError::InvalidState(format!(
                    "retract requires every direct child of {node} to be enabled"
                )));
            }
            children
        };
        let (view, arena) = self.split()?;
        let mut proc = EdgeProcessor { view, arena };
        for &child in &children {
            proc.clear_meta_edges(child);
            proc.decrement_edges_counting(child, Some(node));
            if let Some(n) = proc.view.tree.node_mut(child) {
                n.enabled = false;
            }
            proc.view.counters.nodes_enabled -= 1;
        }
        if let Some(n) = proc.view.tree.node_mut(node) {
            n.enabled = true;
        }
        proc.view.counters.nodes_enabled += 1;
        proc.increment_edges_counting(node, None);
        proc.compute_meta_edges(node, node);
        self.events.push(GraphEvent::Retracted(self.view, node));
        self.events.push(GraphEvent::MetaEdgesUpdated(self.view));
        Ok(())
    }

    /// Re-parent `node` under `group`, reconciling enablement, counters, and
    /// meta-edges for the four possible visibility configurations before the
    /// physical move, then re-deriving aggregation at the destination.
    pub(crate) fn move_to_group(
        &mut self,
        node: NodeId,
        group: NodeId,
    ) -> Result<(), NestGraphError> {
        if node == ROOT_ID {
            return Err(NestGraphError::InvalidArgument(
                "the synthetic root cannot be moved".into(),
            ));
        }
        let (src_anc, dst_anc, node_enabled) = {
            let (view, _) = self.split()?;
            view.tree.require(node)?;
            view.tree.require(group)?;
            if node == group || view.tree.contains(node, group) {
                return Err(NestGraphError::InvalidArgument(format!(
                    "cannot move {node} into its own subtree"
                )));
            }
            (
                view.tree.enabled_ancestor(node),
                view.tree.enabled_ancestor_or_self(group),
                view.tree
                    .node(node)
                    .map(|n| n.is_enabled())
                    .unwrap_or(false),
            )
        };
        let (view, arena) = self.split()?;
        let mut proc = EdgeProcessor { view, arena };
        if src_anc.is_some() {
            // The subtree is represented above it: withdraw its real-edge
            // contributions from the aggregation without touching the edges
            // themselves; they re-aggregate at the destination.
            let members: Vec<NodeId> = std::iter::once(node)
                .chain(proc.view.tree.descendants(node))
                .collect();
            for m in members {
                let touching: BTreeSet<EdgeId> = match proc.view.tree.node(m) {
                    Some(n) => n
                        .out_edges
                        .values()
                        .chain(n.in_edges.values())
                        .copied()
                        .collect(),
                    None => BTreeSet::new(),
                };
                for eid in touching {
                    proc.remove_edge_from_meta_edge(eid);
                }
            }
        } else if node_enabled {
            if dst_anc.is_some() {
                // Destination sits under an enabled representative: fold the
                // node into it.
                proc.clear_meta_edges(node);
                proc.decrement_edges_counting(node, None);
                if let Some(n) = proc.view.tree.node_mut(node) {
                    n.enabled = false;
                }
                proc.view.counters.nodes_enabled -= 1;
            } else {
                proc.clear_meta_edges_out_of_range(node, group);
            }
        } else {
            let enabled_desc: Vec<NodeId> = proc
                .view
                .tree
                .descendants(node)
                .filter(|d| {
                    proc.view
                        .tree
                        .node(*d)
                        .map(|n| n.is_enabled())
                        .unwrap_or(false)
                })
                .collect();
            if dst_anc.is_some() {
                for d in enabled_desc {
                    proc.clear_meta_edges(d);
                    proc.decrement_edges_counting(d, None);
                    if let Some(n) = proc.view.tree.node_mut(d) {
                        n.enabled = false;
                    }
                    proc.view.counters.nodes_enabled -= 1;
                }
            } else {
                for d in enabled_desc {
                    proc.clear_meta_edges_out_of_range(d, group);
                }
            }
        }
        proc.view.tree.move_to(node, group)?;
        if let Some(anc) = proc.view.tree.enabled_ancestor_or_self(group) {
            proc.compute_meta_edges(node, anc);
        } else if proc
            .view
            .tree
            .node(node)
            .map(|n| n.is_enabled())
            .unwrap_or(false)
        {
            proc.compute_meta_edges(node, node);
        } else {
            let enabled_desc: Vec<NodeId> = proc
                .view
                .tree
                .descendants(node)
                .filter(|d| {
                    proc.view
                        .tree
                        .node(*d)
                        .map(|n| n.is_enabled())
                        .unwrap_or(false)
                })
                .collect();
            for d in enabled_desc {
                proc.compute_meta_edges(d, d);
            }
        }
        tracing::debug!("moved {node} under {group}");
        self.events
            .push(GraphEvent::NodesMoved(self.view, vec![node]));
        self.events.push(GraphEvent::MetaEdgesUpdated(self.view));
        Ok(())
    }

    /// Create a new cluster node under the members' common parent and move
    /// every member into it. The cluster starts disabled, so the visible set
    /// is unchanged.
    pub(crate) fn group(&mut self, members: &[NodeId]) -> Result<NodeId, NestGraphError> {
        if members.is_empty() {
            return Err(NestGraphError::InvalidArgument(
                "group requires at least one node".into(),
            ));
        }
        let parent = {
            let (view, _) = self.split()?;
            let mut common = None;
            for &m in members {
                if m == ROOT_ID {
                    return Err(NestGraphError::InvalidArgument(
                        "the synthetic root cannot be grouped".into(),
                    ));
                }
                let p = view.tree.require(m)?.parent();
                match common {
                    None => common = Some(p),
                    Some(c) if c == p => {}
                    Some(_) => {
                        return Err(NestGraphError::InvalidState(
                            "grouped nodes must share a common parent".into(),
                        ))
                    }
                }
            }
            common.flatten().unwrap_or(ROOT_ID)
        };
        let gid = self.core.arena.factory.new_node();
        self.core.arena.nodes.insert(gid, NodePayload::default());
        {
            let (view, _) = self.split()?;
            view.tree.insert_as_child(gid, parent)?;
        }
        self.events
            .push(GraphEvent::NodesAdded(self.view, vec![gid]));
        for &m in members {
            self.move_to_group(m, gid)?;
        }
        Ok(gid)
    }

    /// Dissolve a cluster: expand it if it is the enabled representative,
    /// move its children up to its former parent, and delete the empty shell.
    pub(crate) fn ungroup(&mut self, group: NodeId) -> Result<(), NestGraphError> {
        if group == ROOT_ID {
            return Err(NestGraphError::InvalidArgument(
                "the synthetic root cannot be ungrouped".into(),
            ));
        }
        let (enabled, leaf, parent) = {
            let (view, _) = self.split()?;
            let n = view.tree.require(group)?;
            (n.is_enabled(), n.is_leaf(), n.parent().unwrap_or(ROOT_ID))
        };
        if enabled && !leaf {
            self.expand(group)?;
        }
        let children: Vec<NodeId> = {
            let (view, _) = self.split()?;
            view.tree.children(group).collect()
        };
        for &c in &children {
            self.move_to_group(c, parent)?;
        }
        self.delete_node(group)?;
        Ok(())
    }

    /// Collapse the hierarchy of the operating view to a single level:
    /// meta-edges become real edges between the surviving representatives,
    /// every non-enabled node is deleted, and survivors are re-rooted at
    /// level 1. A view whose tree height is already 1 is left untouched.
    pub(crate) fn flatten(&mut self) -> Result<(), NestGraphError> {
        let (height, enabled, removed) = {
            let (view, _) = self.split()?;
            let enabled: Vec<NodeId> = view
                .tree
                .iter()
                .filter(|n| n.is_enabled())
                .map(|n| n.id())
                .collect();
            let removed: Vec<NodeId> = view
                .tree
                .iter()
                .filter(|n| !n.is_enabled())
                .map(|n| n.id())
                .collect();
            (view.tree.height(), enabled, removed)
        };
        if height <= 1 {
            return Ok(());
        }
        let created: Vec<EdgeRecord> = {
            let (view, arena) = self.split()?;
            let mut proc = EdgeProcessor { view, arena };
            let mut created = Vec::new();
            for &n in &enabled {
                created.extend(proc.flatten_node(n));
            }
            proc.clear_all_meta_edges();
            created
        };
        let mut added = Vec::new();
        for record in &created {
            self.core.arena.edges.insert(record.id, record.clone());
            let mut indexed = false;
            for vid in self.view_ids() {
                let (view, arena) = self.split_view(vid)?;
                if !view.tree.contains_id(record.source) || !view.tree.contains_id(record.target)
                {
                    continue;
                }
                let mut proc = EdgeProcessor { view, arena };
                indexed |= proc.index_edge(record);
            }
            if indexed {
                added.push(record.id);
            } else {
                // An equivalent real edge already exists everywhere.
                self.core.arena.edges.remove(&record.id);
            }
        }
        {
            let (view, arena) = self.split()?;
            let kept: Vec<(NodeId, NodeId, EdgeId)> = enabled
                .iter()
                .flat_map(|s| {
                    view.tree
                        .node(*s)
                        .map(|n| {
                            n.out_edges()
                                .iter()
                                .filter(|(t, _)| {
                                    view.tree
                                        .node(**t)
                                        .map(|tn| tn.is_enabled())
                                        .unwrap_or(false)
                                })
                                .map(|(t, e)| (*s, *t, *e))
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default()
                })
                .collect();
            view.tree = TreeStructure::from_top_level(&enabled);
            for &s in &enabled {
                if let Some(n) = view.tree.node_mut(s) {
                    n.enabled = true;
                }
            }
            for (s, t, e) in kept {
                if let Some(n) = view.tree.node_mut(s) {
                    n.out_edges.insert(t, e);
                }
                if let Some(n) = view.tree.node_mut(t) {
                    n.in_edges.insert(s, e);
                }
            }
            view.meta_edges.clear();
            view.edge_meta.clear();
            view.counters.reset();
            let mut proc = EdgeProcessor { view, arena };
            proc.rebuild_enabled_counters();
        }
        let dropped = self.gc_dictionary(&removed);
        tracing::debug!(
            "flattened view {} ({} survivors, {} removed)",
            self.view,
            enabled.len(),
            removed.len()
        );
        if !removed.is_empty() {
            self.events
                .push(GraphEvent::NodesRemoved(self.view, removed));
        }
        if !dropped.is_empty() {
            self.events.push(GraphEvent::EdgesRemoved(self.view, dropped));
        }
        if !added.is_empty() {
            self.events.push(GraphEvent::EdgesAdded(self.view, added));
        }
        self.events.push(GraphEvent::NodesMoved(self.view, enabled));
        self.events.push(GraphEvent::MetaEdgesUpdated(self.view));
        Ok(())
    }

    /// Bulk removal of everything reachable through the operating view, with
    /// a full counter reset. Through the main view this empties every view
    /// and the dictionary.
    pub(crate) fn clear(&mut self) -> Result<(), NestGraphError> {
        let removed: Vec<NodeId> = {
            let (view, _) = self.split()?;
            view.tree.iter().map(|n| n.id()).collect()
        };
        if self.is_main() {
            let edge_ids: Vec<EdgeId> = self.core.arena.edges.keys().copied().collect();
            for view in self.core.views.values_mut() {
                view.tree = TreeStructure::new();
                view.counters.reset();
                view.meta_edges.clear();
                view.edge_meta.clear();
            }
            self.core.arena.nodes.clear();
            self.core.arena.edges.clear();
            if !removed.is_empty() {
                self.events
                    .push(GraphEvent::NodesRemoved(self.view, removed));
            }
            if !edge_ids.is_empty() {
                self.events
                    .push(GraphEvent::EdgesRemoved(self.view, edge_ids));
            }
        } else {
            {
                let (view, _) = self.split()?;
                view.tree = TreeStructure::new();
                view.counters.reset();
                view.meta_edges.clear();
                view.edge_meta.clear();
            }
            let dropped = self.gc_dictionary(&removed);
            if !removed.is_empty() {
                self.events
                    .push(GraphEvent::NodesRemoved(self.view, removed));
            }
            if !dropped.is_empty() {
                self.events.push(GraphEvent::EdgesRemoved(self.view, dropped));
            }
        }
        Ok(())
    }

    /// Remove every real edge from the dictionary and every view, resetting
    /// edge counters and degrees. Nodes and enablement are untouched.
    pub(crate) fn clear_edges(&mut self) -> Result<(), NestGraphError> {
        let edge_ids: Vec<EdgeId> = self.core.arena.edges.keys().copied().collect();
        for vid in self.view_ids() {
            let (view, arena) = self.split_view(vid)?;
            let mut proc = EdgeProcessor { view, arena };
            proc.clear_all_meta_edges();
            let ids: Vec<NodeId> = proc.view.tree.iter().map(|n| n.id()).collect();
            for id in ids {
                if let Some(n) = proc.view.tree.node_mut(id) {
                    n.out_edges.clear();
                    n.in_edges.clear();
                    n.enabled_in_degree = 0;
                    n.enabled_out_degree = 0;
                    n.enabled_mutual_degree = 0;
                }
            }
            proc.view.counters.edges_count_total = 0;
            proc.view.counters.edges_count_enabled = 0;
            proc.view.counters.mutual_edges_total = 0;
            proc.view.counters.mutual_edges_enabled = 0;
        }
        self.core.arena.edges.clear();
        if !edge_ids.is_empty() {
            self.events
                .push(GraphEvent::EdgesRemoved(self.view, edge_ids));
        }
        self.events.push(GraphEvent::MetaEdgesUpdated(self.view));
        Ok(())
    }

    fn reset_enablement<F: Fn(&TreeNode) -> bool>(
        &mut self,
        pred: F,
    ) -> Result<(), NestGraphError> {
        let (view, arena) = self.split()?;
        let states: Vec<(NodeId, bool)> =
            view.tree.iter().map(|n| (n.id(), pred(n))).collect();
        for (id, enabled) in states {
            if let Some(n) = view.tree.node_mut(id) {
                n.enabled = enabled;
            }
        }
        let mut proc = EdgeProcessor { view, arena };
        proc.rebuild_enabled_counters();
        proc.rebuild_meta_edges();
        self.events.push(GraphEvent::ViewReset(self.view));
        self.events.push(GraphEvent::MetaEdgesUpdated(self.view));
        Ok(())
    }

    /// Enable exactly the leaves: the deepest flat rendition of the view.
    pub(crate) fn reset_view_to_leaves(&mut self) -> Result<(), NestGraphError> {
        self.reset_enablement(|n| n.is_leaf())
    }

    /// Enable exactly the top-level nodes.
    pub(crate) fn reset_view_to_top_nodes(&mut self) -> Result<(), NestGraphError> {
        self.reset_enablement(|n| n.level() == 1)
    }

    /// Enable the nodes at `level`, plus the leaves above it.
    pub(crate) fn reset_view_to_level(&mut self, level: usize) -> Result<(), NestGraphError> {
        let height = {
            let (view, _) = self.split()?;
            view.tree.height()
        };
        if level == 0 || level > height {
            return Err(NestGraphError::InvalidArgument(format!(
                "level {level} is outside the tree (height {height})"
            )));
        }
        self.reset_enablement(|n| n.level() == level || (n.is_leaf() && n.level() < level))
    }
}
