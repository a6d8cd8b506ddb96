//! Incremental maintenance of meta-edges and enabled-edge/degree counters.
//!
//! The [`EdgeProcessor`] is the only code that touches meta-edge aggregation
//! state and the enabled counters. It is constructed by the structure
//! modifier for the duration of one operation phase, borrowing the target
//! view and the shared dictionary.
//!
//! Aggregation is keyed by the ordered pair (source cluster, target cluster):
//! every real edge crossing between two distinct enabled representatives,
//! where at least one endpoint is not its own representative, contributes to
//! exactly one meta-edge. Accumulation is commutative, so any insertion order
//! over the same edge set derives the same meta-edge multiset.

use std::collections::{BTreeMap, BTreeSet};

use crate::properties::{EdgeId, EdgeRecord, MetaEdge, NodeId};

use super::{base::GraphArena, View};

pub(crate) struct EdgeProcessor<'a> {
    pub(crate) view: &'a mut View,
    pub(crate) arena: &'a mut GraphArena,
}

/// True when a real edge between `source` and `target`, represented by the
/// enabled nodes `src_rep` and `dst_rep`, belongs in a meta-edge. Edges whose
/// endpoints both represent themselves are visible as-is; edges whose
/// representatives coincide stay inside one cluster.
fn should_aggregate(source: NodeId, target: NodeId, src_rep: NodeId, dst_rep: NodeId) -> bool {
    src_rep != dst_rep && (src_rep != source || dst_rep != target)
}

impl EdgeProcessor<'_> {
    fn edge_weight(&self, edge: EdgeId) -> f32 {
        self.arena.edges.get(&edge).map(|e| e.weight).unwrap_or(0.0)
    }

    fn is_enabled(&self, node: NodeId) -> bool {
        self.view
            .tree
            .node(node)
            .map(|n| n.is_enabled())
            .unwrap_or(false)
    }

    /// Fold one real edge into the meta-edge from `src_rep` to `dst_rep`,
    /// creating the meta-edge if this is the first contribution.
    pub(crate) fn aggregate(&mut self, src_rep: NodeId, dst_rep: NodeId, edge: EdgeId) {
        let weight = self.edge_weight(edge);
        let existing = self
            .view
            .tree
            .node(src_rep)
            .and_then(|n| n.meta_out.get(&dst_rep).copied());
        match existing {
            Some(mid) => {
                if let Some(meta) = self.view.meta_edges.get_mut(&mid) {
                    if meta.absorb(edge, weight) {
                        self.view.edge_meta.insert(edge, mid);
                    }
                }
            }
            None => {
                let mid = self.arena.factory.new_edge();
                let mut meta = MetaEdge::new(mid, src_rep, dst_rep);
                meta.absorb(edge, weight);
                if let Some(n) = self.view.tree.node_mut(src_rep) {
                    n.meta_out.insert(dst_rep, mid);
                }
                if let Some(n) = self.view.tree.node_mut(dst_rep) {
                    n.meta_in.insert(src_rep, mid);
                }
                self.view.meta_edges.insert(mid, meta);
                self.view.edge_meta.insert(edge, mid);
                self.view.counters.meta_edges_count += 1;
                let reverse = self
                    .view
                    .tree
                    .node(dst_rep)
                    .map(|n| n.meta_out.contains_key(&src_rep))
                    .unwrap_or(false);
                if reverse {
                    self.view.counters.meta_mutual_edges_count += 1;
                }
            }
        }
    }

    /// Detach a real edge from whichever meta-edge aggregates it, destroying
    /// the meta-edge once it aggregates nothing.
    pub(crate) fn remove_edge_from_meta_edge(&mut self, edge: EdgeId) {
        let Some(mid) = self.view.edge_meta.remove(&edge) else {
            return;
        };
        let weight = self.edge_weight(edge);
        let empty = match self.view.meta_edges.get_mut(&mid) {
            Some(meta) => meta.release(edge, weight),
            None => {
                tracing::warn!("edge {edge} pointed at missing meta-edge {mid}");
                return;
            }
        };
        if empty {
            self.destroy_meta(mid);
        }
    }

    pub(crate) fn destroy_meta(&mut self, mid: EdgeId) {
        let Some(meta) = self.view.meta_edges.remove(&mid) else {
            return;
        };
        if let Some(n) = self.view.tree.node_mut(meta.source) {
            n.meta_out.remove(&meta.target);
        }
        if let Some(n) = self.view.tree.node_mut(meta.target) {
            n.meta_in.remove(&meta.source);
        }
        for edge in &meta.edges {
            self.view.edge_meta.remove(edge);
        }
        self.view.counters.meta_edges_count -= 1;
        let reverse = self
            .view
            .tree
            .node(meta.target)
            .map(|n| n.meta_out.contains_key(&meta.source))
            .unwrap_or(false);
        if reverse {
            self.view.counters.meta_mutual_edges_count -= 1;
        }
    }

    /// Remove every meta-edge whose origin or destination is `node`.
    pub(crate) fn clear_meta_edges(&mut self, node: NodeId) {
        let mids: Vec<EdgeId> = match self.view.tree.node(node) {
            Some(n) => n
                .meta_out
                .values()
                .chain(n.meta_in.values())
                .copied()
                .collect(),
            None => return,
        };
        for mid in mids {
            self.destroy_meta(mid);
        }
    }

    pub(crate) fn clear_all_meta_edges(&mut self) {
        let mids: Vec<EdgeId> = self.view.meta_edges.keys().copied().collect();
        for mid in mids {
            self.destroy_meta(mid);
        }
    }

    /// Drop only the meta-edges of `node` whose other endpoint now falls
    /// inside `boundary`'s subtree, keeping the rest of its aggregation.
    pub(crate) fn clear_meta_edges_out_of_range(&mut self, node: NodeId, boundary: NodeId) {
        let mids: Vec<EdgeId> = match self.view.tree.node(node) {
            Some(n) => {
                let out = n
                    .meta_out
                    .iter()
                    .filter(|(other, _)| {
                        **other == boundary || self.view.tree.contains(boundary, **other)
                    })
                    .map(|(_, mid)| *mid);
                let inn = n
                    .meta_in
                    .iter()
                    .filter(|(other, _)| {
                        **other == boundary || self.view.tree.contains(boundary, **other)
                    })
                    .map(|(_, mid)| *mid);
                out.chain(inn).collect()
            }
            None => return,
        };
        for mid in mids {
            self.destroy_meta(mid);
        }
    }

    /// Derive the meta-edges owed by `node`'s subtree, crediting them to
    /// `target` (the enabled node representing `node`): for every real edge
    /// leaving the subtree toward a node with an enabled representative,
    /// aggregate it between `target` and that representative. Self-loops at
    /// the cluster level are excluded.
    pub(crate) fn compute_meta_edges(&mut self, node: NodeId, target: NodeId) {
        let members: Vec<NodeId> = std::iter::once(node)
            .chain(self.view.tree.descendants(node))
            .collect();
        for m in members {
            let (out_pairs, in_pairs) = match self.view.tree.node(m) {
                Some(n) => (
                    n.out_edges
                        .iter()
                        .map(|(k, v)| (*k, *v))
                        .collect::<Vec<_>>(),
                    n.in_edges.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
                ),
                None => continue,
            };
            for (nbr, edge) in out_pairs {
                if nbr == node || self.view.tree.contains(node, nbr) {
                    continue;
                }
                let Some(rep) = self.view.tree.enabled_ancestor_or_self(nbr) else {
                    continue;
                };
                if should_aggregate(m, nbr, target, rep) {
                    self.aggregate(target, rep, edge);
                }
            }
            for (nbr, edge) in in_pairs {
                if nbr == node || self.view.tree.contains(node, nbr) {
                    continue;
                }
                let Some(rep) = self.view.tree.enabled_ancestor_or_self(nbr) else {
                    continue;
                };
                if should_aggregate(nbr, m, rep, target) {
                    self.aggregate(rep, target, edge);
                }
            }
        }
    }

    /// Fold `node`'s real-edge contributions into the enabled counters after
    /// its `enabled` flag was raised. Edges toward `excluded` are skipped to
    /// avoid double counting while a cluster representative is mid-handoff.
    pub(crate) fn increment_edges_counting(&mut self, node: NodeId, excluded: Option<NodeId>) {
        let (out_pairs, in_pairs) = match self.view.tree.node(node) {
            Some(n) => (
                n.out_edges.keys().copied().collect::<Vec<_>>(),
                n.in_edges.keys().copied().collect::<Vec<_>>(),
            ),
            None => return,
        };
        for nbr in out_pairs {
            if Some(nbr) == excluded {
                continue;
            }
            if nbr == node {
                // Self-loop: one enabled edge, both degree directions.
                self.view.counters.edges_count_enabled += 1;
                if let Some(n) = self.view.tree.node_mut(node) {
                    n.enabled_out_degree += 1;
                    n.enabled_in_degree += 1;
                }
                continue;
            }
            if !self.is_enabled(nbr) {
                continue;
            }
            self.view.counters.edges_count_enabled += 1;
            let mutual = self
                .view
                .tree
                .node(node)
                .map(|n| n.in_edges.contains_key(&nbr))
                .unwrap_or(false);
            if let Some(n) = self.view.tree.node_mut(node) {
                n.enabled_out_degree += 1;
            }
            if let Some(n) = self.view.tree.node_mut(nbr) {
                n.enabled_in_degree += 1;
            }
            if mutual {
                self.view.counters.mutual_edges_enabled += 1;
                if let Some(n) = self.view.tree.node_mut(node) {
                    n.enabled_mutual_degree += 1;
                }
                if let Some(n) = self.view.tree.node_mut(nbr) {
                    n.enabled_mutual_degree += 1;
                }
            }
        }
        for nbr in in_pairs {
            if Some(nbr) == excluded || nbr == node {
                continue;
            }
            if !self.is_enabled(nbr) {
                continue;
            }
            self.view.counters.edges_count_enabled += 1;
            if let Some(n) = self.view.tree.node_mut(node) {
                n.enabled_in_degree += 1;
            }
            if let Some(n) = self.view.tree.node_mut(nbr) {
                n.enabled_out_degree += 1;
            }
            // The mutual pair was already counted from the out direction.
        }
    }

    /// Exact mirror of [`EdgeProcessor::increment_edges_counting`], applied
    /// before `node`'s `enabled` flag is lowered.
    pub(crate) fn decrement_edges_counting(&mut self, node: NodeId, excluded: Option<NodeId>) {
        let (out_pairs, in_pairs) = match self.view.tree.node(node) {
            Some(n) => (
                n.out_edges.keys().copied().collect::<Vec<_>>(),
                n.in_edges.keys().copied().collect::<Vec<_>>(),
            ),
            None => return,
        };
        for nbr in out_pairs {
            if Some(nbr) == excluded {
                continue;
            }
            if nbr == node {
                self.view.counters.edges_count_enabled -= 1;
                if let Some(n) = self.view.tree.node_mut(node) {
                    n.enabled_out_degree -= 1;
                    n.enabled_in_degree -= 1;
                }
                continue;
            }
            if !self.is_enabled(nbr) {
                continue;
            }
            self.view.counters.edges_count_enabled -= 1;
            let mutual = self
                .view
                .tree
                .node(node)
                .map(|n| n.in_edges.contains_key(&nbr))
                .unwrap_or(false);
            if let Some(n) = self.view.tree.node_mut(node) {
                n.enabled_out_degree -= 1;
            }
            if let Some(n) = self.view.tree.node_mut(nbr) {
                n.enabled_in_degree -= 1;
            }
            if mutual {
                self.view.counters.mutual_edges_enabled -= 1;
                if let Some(n) = self.view.tree.node_mut(node) {
                    n.enabled_mutual_degree -= 1;
                }
                if let Some(n) = self.view.tree.node_mut(nbr) {
                    n.enabled_mutual_degree -= 1;
                }
            }
        }
        for nbr in in_pairs {
            if Some(nbr) == excluded || nbr == node {
                continue;
            }
            if !self.is_enabled(nbr) {
                continue;
            }
            self.view.counters.edges_count_enabled -= 1;
            if let Some(n) = self.view.tree.node_mut(node) {
                n.enabled_in_degree -= 1;
            }
            if let Some(n) = self.view.tree.node_mut(nbr) {
                n.enabled_out_degree -= 1;
            }
        }
    }

    /// Index a real edge on both endpoints of this view and fold it into the
    /// counters and meta-edge aggregation. Returns false when an edge between
    /// the same ordered pair is already indexed.
    pub(crate) fn index_edge(&mut self, edge: &EdgeRecord) -> bool {
        let duplicate = match self.view.tree.node(edge.source) {
            Some(n) => n.out_edges.contains_key(&edge.target),
            None => return false,
        };
        if duplicate || !self.view.tree.contains_id(edge.target) {
            return false;
        }
        let reverse = !edge.is_self_loop()
            && self
                .view
                .tree
                .node(edge.source)
                .map(|n| n.in_edges.contains_key(&edge.target))
                .unwrap_or(false);
        if let Some(n) = self.view.tree.node_mut(edge.source) {
            n.out_edges.insert(edge.target, edge.id);
        }
        if let Some(n) = self.view.tree.node_mut(edge.target) {
            n.in_edges.insert(edge.source, edge.id);
        }
        self.view.counters.edges_count_total += 1;
        if reverse {
            self.view.counters.mutual_edges_total += 1;
        }
        if self.is_enabled(edge.source) && self.is_enabled(edge.target) {
            self.count_enabled_edge(edge, reverse);
        }
        if let (Some(src_rep), Some(dst_rep)) = (
            self.view.tree.enabled_ancestor_or_self(edge.source),
            self.view.tree.enabled_ancestor_or_self(edge.target),
        ) {
            if should_aggregate(edge.source, edge.target, src_rep, dst_rep) {
                self.aggregate(src_rep, dst_rep, edge.id);
            }
        }
        true
    }

    fn count_enabled_edge(&mut self, edge: &EdgeRecord, reverse: bool) {
        self.view.counters.edges_count_enabled += 1;
        if let Some(n) = self.view.tree.node_mut(edge.source) {
            n.enabled_out_degree += 1;
        }
        if let Some(n) = self.view.tree.node_mut(edge.target) {
            n.enabled_in_degree += 1;
        }
        if reverse {
            self.view.counters.mutual_edges_enabled += 1;
            if let Some(n) = self.view.tree.node_mut(edge.source) {
                n.enabled_mutual_degree += 1;
            }
            if let Some(n) = self.view.tree.node_mut(edge.target) {
                n.enabled_mutual_degree += 1;
            }
        }
    }

    /// Withdraw an enabled edge's contribution from the counters. Must run
    /// while both directions are still indexed.
    pub(crate) fn uncount_enabled_edge(&mut self, edge: &EdgeRecord) {
        let reverse = !edge.is_self_loop()
            && self
                .view
                .tree
                .node(edge.source)
                .map(|n| n.in_edges.contains_key(&edge.target))
                .unwrap_or(false);
        self.view.counters.edges_count_enabled -= 1;
        if let Some(n) = self.view.tree.node_mut(edge.source) {
            n.enabled_out_degree -= 1;
            if edge.is_self_loop() {
                n.enabled_in_degree -= 1;
            }
        }
        if !edge.is_self_loop() {
            if let Some(n) = self.view.tree.node_mut(edge.target) {
                n.enabled_in_degree -= 1;
            }
        }
        if reverse {
            self.view.counters.mutual_edges_enabled -= 1;
            if let Some(n) = self.view.tree.node_mut(edge.source) {
                n.enabled_mutual_degree -= 1;
            }
            if let Some(n) = self.view.tree.node_mut(edge.target) {
                n.enabled_mutual_degree -= 1;
            }
        }
    }

    /// Remove a real edge from both endpoint indices and the totals, and
    /// detach it from any aggregating meta-edge. Enabled-counter withdrawal
    /// is the caller's responsibility (via [`EdgeProcessor::uncount_enabled_edge`]
    /// or a preceding `decrement_edges_counting`).
    pub(crate) fn unindex_edge(&mut self, edge: &EdgeRecord) {
        self.remove_edge_from_meta_edge(edge.id);
        if let Some(n) = self.view.tree.node_mut(edge.source) {
            n.out_edges.remove(&edge.target);
        }
        if let Some(n) = self.view.tree.node_mut(edge.target) {
            n.in_edges.remove(&edge.source);
        }
        self.view.counters.edges_count_total -= 1;
        let reverse = !edge.is_self_loop()
            && self
                .view
                .tree
                .node(edge.target)
                .map(|n| n.out_edges.contains_key(&edge.source))
                .unwrap_or(false);
        if reverse {
            self.view.counters.mutual_edges_total -= 1;
        }
    }

    /// Materialize `node`'s outgoing meta-edges into real edge records that
    /// connect the representatives directly, destroying the meta-edges. The
    /// returned records are not yet registered or indexed.
    pub(crate) fn flatten_node(&mut self, node: NodeId) -> Vec<EdgeRecord> {
        let pairs: Vec<(NodeId, EdgeId)> = match self.view.tree.node(node) {
            Some(n) => n.meta_out.iter().map(|(k, v)| (*k, *v)).collect(),
            None => return Vec::new(),
        };
        let mut created = Vec::with_capacity(pairs.len());
        for (dst, mid) in pairs {
            let weight = self
                .view
                .meta_edges
                .get(&mid)
                .map(|m| m.weight)
                .unwrap_or(0.0);
            self.destroy_meta(mid);
            let id = self.arena.factory.new_edge();
            created.push(EdgeRecord::new(id, node, dst, weight, true));
        }
        created
    }

    /// Recompute every enabled/total counter and degree from the indices.
    /// Used by the wholesale operations (resets, flatten, restore) where
    /// incremental bookkeeping has nothing to hold on to.
    pub(crate) fn rebuild_enabled_counters(&mut self) {
        let ids: Vec<NodeId> = self.view.tree.iter().map(|n| n.id()).collect();
        for id in &ids {
            if let Some(n) = self.view.tree.node_mut(*id) {
                n.enabled_in_degree = 0;
                n.enabled_out_degree = 0;
                n.enabled_mutual_degree = 0;
            }
        }
        let mut counters = self.view.counters;
        counters.nodes_enabled = 0;
        counters.edges_count_total = 0;
        counters.edges_count_enabled = 0;
        counters.mutual_edges_total = 0;
        counters.mutual_edges_enabled = 0;
        self.view.counters = counters;
        for id in &ids {
            if self.is_enabled(*id) {
                self.view.counters.nodes_enabled += 1;
            }
            let out_pairs: Vec<NodeId> = match self.view.tree.node(*id) {
                Some(n) => n.out_edges.keys().copied().collect(),
                None => continue,
            };
            for nbr in out_pairs {
                self.view.counters.edges_count_total += 1;
                let both_enabled = self.is_enabled(*id) && self.is_enabled(nbr);
                if both_enabled {
                    self.view.counters.edges_count_enabled += 1;
                    if let Some(n) = self.view.tree.node_mut(*id) {
                        n.enabled_out_degree += 1;
                    }
                    if let Some(n) = self.view.tree.node_mut(nbr) {
                        n.enabled_in_degree += 1;
                    }
                }
                let reverse = nbr != *id
                    && self
                        .view
                        .tree
                        .node(nbr)
                        .map(|n| n.out_edges.contains_key(id))
                        .unwrap_or(false);
                if reverse && *id < nbr {
                    self.view.counters.mutual_edges_total += 1;
                    if both_enabled {
                        self.view.counters.mutual_edges_enabled += 1;
                        if let Some(n) = self.view.tree.node_mut(*id) {
                            n.enabled_mutual_degree += 1;
                        }
                        if let Some(n) = self.view.tree.node_mut(nbr) {
                            n.enabled_mutual_degree += 1;
                        }
                    }
                }
            }
        }
    }

    /// Throw away all aggregation state and re-derive it from the enabled
    /// node set.
    pub(crate) fn rebuild_meta_edges(&mut self) {
        self.clear_all_meta_edges();
        let enabled: Vec<NodeId> = self
            .view
            .tree
            .iter()
            .filter(|n| n.is_enabled())
            .map(|n| n.id())
            .collect();
        for node in enabled {
            self.compute_meta_edges(node, node);
        }
    }
}

/// Brute-force recomputation of the counters and degrees a view ought to
/// carry, without touching the view. The meta counters are derived from the
/// view's meta-edge store. Test oracle for the incremental bookkeeping.
pub(crate) fn derive_counters(
    view: &View,
) -> (
    crate::hierarchy::ViewCounters,
    BTreeMap<NodeId, (usize, usize, usize)>,
) {
    let tree = view.structure();
    let mut counters = crate::hierarchy::ViewCounters::default();
    let mut degrees: BTreeMap<NodeId, (usize, usize, usize)> = BTreeMap::new();
    let enabled = |id: NodeId| tree.node(id).map(|n| n.is_enabled()).unwrap_or(false);
    for node in tree.iter() {
        degrees.entry(node.id()).or_insert((0, 0, 0));
        if node.is_enabled() {
            counters.nodes_enabled += 1;
        }
        for (&nbr, _) in node.out_edges() {
            counters.edges_count_total += 1;
            let both = node.is_enabled() && enabled(nbr);
            if both {
                counters.edges_count_enabled += 1;
                degrees.entry(node.id()).or_insert((0, 0, 0)).1 += 1;
                degrees.entry(nbr).or_insert((0, 0, 0)).0 += 1;
            }
            let reverse = nbr != node.id()
                && tree
                    .node(nbr)
                    .map(|n| n.out_edges().contains_key(&node.id()))
                    .unwrap_or(false);
            if reverse && node.id() < nbr {
                counters.mutual_edges_total += 1;
                if both {
                    counters.mutual_edges_enabled += 1;
                    degrees.entry(node.id()).or_insert((0, 0, 0)).2 += 1;
                    degrees.entry(nbr).or_insert((0, 0, 0)).2 += 1;
                }
            }
        }
    }
    counters.meta_edges_count = view.meta_edges().count();
    counters.meta_mutual_edges_count = view
        .meta_edges()
        .filter(|m| {
            view.meta_edges()
                .any(|other| other.source == m.target && other.target == m.source)
        })
        .count()
        / 2;
    (counters, degrees)
}

/// Brute-force derivation of the meta-edge multiset a view ought to carry,
/// aggregated by (source cluster, target cluster). Test oracle for the
/// incremental bookkeeping; the incremental and derived states must agree
/// after every operation.
pub(crate) fn derive_meta_edges(view: &View) -> BTreeMap<(NodeId, NodeId), BTreeSet<EdgeId>> {
    let mut derived: BTreeMap<(NodeId, NodeId), BTreeSet<EdgeId>> = BTreeMap::new();
    let tree = view.structure();
    let enabled: Vec<NodeId> = tree.iter().filter(|n| n.is_enabled()).map(|n| n.id()).collect();
    for &rep in &enabled {
        let members: Vec<NodeId> = std::iter::once(rep).chain(tree.descendants(rep)).collect();
        for m in members {
            let Some(record) = tree.node(m) else { continue };
            for (&nbr, &edge) in record.out_edges() {
                if nbr == rep || tree.contains(rep, nbr) {
                    continue;
                }
                let Some(other) = tree.enabled_ancestor_or_self(nbr) else {
                    continue;
                };
                if should_aggregate(m, nbr, rep, other) {
                    derived.entry((rep, other)).or_default().insert(edge);
                }
            }
        }
    }
    derived
}
