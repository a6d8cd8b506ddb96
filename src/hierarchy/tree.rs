//! Positional tree index over a forest rooted at a synthetic root.
//!
//! This module provides [`TreeStructure`], a flat, array-backed representation
//! of one view's hierarchy using depth-first pre-order numbering. Every node
//! carries its `pre` position, the count of its descendants (`size`), its
//! depth (`level`), and its parent handle; `post == pre + size` is maintained
//! as an invariant, which makes ancestry a pair of integer comparisons:
//!
//! > B is a descendant of A  ⇔  `A.pre < B.pre && B.pre <= A.post`
//!
//! Insertion, deletion, and reparenting renumber only the positions at or
//! after the mutation point. Positional lookup ([`TreeStructure::node_at`])
//! is O(1).

use std::collections::BTreeMap;

use crate::{
    properties::{EdgeId, NodeId, ROOT_ID},
    NestGraphError,
};

/// One view-local node record: tree position, enablement, degree counters,
/// and the four per-node edge indices (out, in, meta-out, meta-in), each
/// keyed by neighbor identity for O(log d) lookup.
#[derive(Clone, Debug)]
pub struct TreeNode {
    id: NodeId,
    pub(crate) pre: usize,
    pub(crate) size: usize,
    pub(crate) level: usize,
    pub(crate) parent: Option<NodeId>,
    pub(crate) enabled: bool,
    pub(crate) enabled_in_degree: usize,
    pub(crate) enabled_out_degree: usize,
    pub(crate) enabled_mutual_degree: usize,
    pub(crate) out_edges: BTreeMap<NodeId, EdgeId>,
    pub(crate) in_edges: BTreeMap<NodeId, EdgeId>,
    pub(crate) meta_out: BTreeMap<NodeId, EdgeId>,
    pub(crate) meta_in: BTreeMap<NodeId, EdgeId>,
}

impl TreeNode {
    fn new(id: NodeId, pre: usize, level: usize, parent: Option<NodeId>) -> TreeNode {
        TreeNode {
            id,
            pre,
            size: 0,
            level,
            parent,
            enabled: false,
            enabled_in_degree: 0,
            enabled_out_degree: 0,
            enabled_mutual_degree: 0,
            out_edges: BTreeMap::new(),
            in_edges: BTreeMap::new(),
            meta_out: BTreeMap::new(),
            meta_in: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn pre(&self) -> usize {
        self.pre
    }

    /// The largest pre among this node's descendants, `pre + size`.
    pub fn post(&self) -> usize {
        self.pre + self.size
    }

    /// Descendant count.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Depth from the synthetic root (which sits at level 0).
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_leaf(&self) -> bool {
        self.size == 0
    }

    pub fn enabled_in_degree(&self) -> usize {
        self.enabled_in_degree
    }

    pub fn enabled_out_degree(&self) -> usize {
        self.enabled_out_degree
    }

    pub fn enabled_mutual_degree(&self) -> usize {
        self.enabled_mutual_degree
    }

    /// Real outgoing edges, keyed by target node.
    pub fn out_edges(&self) -> &BTreeMap<NodeId, EdgeId> {
        &self.out_edges
    }

    /// Real incoming edges, keyed by source node.
    pub fn in_edges(&self) -> &BTreeMap<NodeId, EdgeId> {
        &self.in_edges
    }

    /// Meta-edges leaving this cluster, keyed by target cluster.
    pub fn meta_out(&self) -> &BTreeMap<NodeId, EdgeId> {
        &self.meta_out
    }

    /// Meta-edges entering this cluster, keyed by source cluster.
    pub fn meta_in(&self) -> &BTreeMap<NodeId, EdgeId> {
        &self.meta_in
    }
}

/// The positional index of one view: a pre-ordered array of node ids plus the
/// per-node records. All mutation goes through the structure modifier; the
/// public surface here is read-only apart from crate-internal hooks.
#[derive(Clone, Debug)]
pub struct TreeStructure {
    order: Vec<NodeId>,
    nodes: BTreeMap<NodeId, TreeNode>,
}

impl Default for TreeStructure {
    fn default() -> TreeStructure {
        TreeStructure::new()
    }
}

impl TreeStructure {
    pub fn new() -> TreeStructure {
        let root = TreeNode::new(ROOT_ID, 0, 0, None);
        TreeStructure {
            order: vec![ROOT_ID],
            nodes: BTreeMap::from([(ROOT_ID, root)]),
        }
    }

    /// Build a one-level tree: every id becomes a direct child of the root,
    /// in the given order. Used by flatten.
    pub(crate) fn from_top_level(ids: &[NodeId]) -> TreeStructure {
        let mut root = TreeNode::new(ROOT_ID, 0, 0, None);
        root.size = ids.len();
        let mut order = Vec::with_capacity(ids.len() + 1);
        order.push(ROOT_ID);
        let mut nodes = BTreeMap::from([(ROOT_ID, root)]);
        for (idx, &id) in ids.iter().enumerate() {
            order.push(id);
            nodes.insert(id, TreeNode::new(id, idx + 1, 1, Some(ROOT_ID)));
        }
        TreeStructure { order, nodes }
    }

    /// Number of nodes, excluding the synthetic root.
    pub fn node_count(&self) -> usize {
        self.order.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn require(&self, id: NodeId) -> Result<&TreeNode, NestGraphError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| NestGraphError::NotFound(format!("node {id} is not in this view")))
    }

    /// O(1) positional lookup.
    pub fn node_at(&self, pre: usize) -> Option<&TreeNode> {
        self.order.get(pre).and_then(|id| self.nodes.get(id))
    }

    pub fn root(&self) -> &TreeNode {
        self.nodes
            .get(&ROOT_ID)
            .expect("the synthetic root is always present")
    }

    /// Strict containment: true iff `descendant` lies inside `ancestor`'s
    /// subtree and the two are distinct.
    pub fn contains(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        match (self.nodes.get(&ancestor), self.nodes.get(&descendant)) {
            (Some(a), Some(d)) => a.pre < d.pre && d.pre <= a.post(),
            _ => false,
        }
    }

    /// Greatest level over all nodes; 0 for an empty tree.
    pub fn height(&self) -> usize {
        self.nodes.values().map(|n| n.level).max().unwrap_or(0)
    }

    /// Nearest strictly-enabled ancestor, walking the parent chain. The
    /// synthetic root is never enabled.
    pub fn enabled_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut cursor = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(pid) = cursor {
            let parent = self.nodes.get(&pid)?;
            if parent.enabled {
                return Some(pid);
            }
            cursor = parent.parent;
        }
        None
    }

    /// The node itself when enabled, otherwise the nearest enabled ancestor.
    pub fn enabled_ancestor_or_self(&self, id: NodeId) -> Option<NodeId> {
        match self.nodes.get(&id) {
            Some(node) if node.enabled => Some(id),
            Some(_) => self.enabled_ancestor(id),
            None => None,
        }
    }

    /// Direct children, in pre order.
    pub fn children(&self, id: NodeId) -> ChildrenIter<'_> {
        let (next, end) = self
            .nodes
            .get(&id)
            .map(|n| (n.pre + 1, n.post()))
            .unwrap_or((1, 0));
        ChildrenIter {
            tree: self,
            next,
            end,
        }
    }

    /// Strict descendants, in pre order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let (start, end) = self
            .nodes
            .get(&id)
            .map(|n| (n.pre + 1, n.post() + 1))
            .unwrap_or((0, 0));
        self.order[start..end].iter().copied()
    }

    /// Strict ancestors, nearest first, excluding the synthetic root.
    pub fn ancestors(&self, id: NodeId) -> AncestorIter<'_> {
        AncestorIter {
            tree: self,
            cursor: self.nodes.get(&id).and_then(|n| n.parent),
        }
    }

    /// All nodes in pre order, excluding the synthetic root.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.order.iter().skip(1).filter_map(|id| self.nodes.get(id))
    }

    fn renumber_from(&mut self, start: usize) {
        for pre in start..self.order.len() {
            let id = self.order[pre];
            self.nodes
                .get_mut(&id)
                .expect("every order entry has a node record")
                .pre = pre;
        }
    }

    /// Add `delta` to the size of `start` and every ancestor of `start`.
    fn shift_ancestor_sizes(&mut self, start: NodeId, delta: isize) {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let node = self
                .nodes
                .get_mut(&id)
                .expect("ancestor chain stays inside the view");
            node.size = (node.size as isize + delta) as usize;
            cursor = node.parent;
        }
    }

    /// Insert `id` as the last child of `parent`, renumbering everything at
    /// or after the insertion point and growing every ancestor's size.
    pub(crate) fn insert_as_child(
        &mut self,
        id: NodeId,
        parent: NodeId,
    ) -> Result<(), NestGraphError> {
        if self.nodes.contains_key(&id) {
            return Err(NestGraphError::InvalidArgument(format!(
                "node {id} is already in this view"
            )));
        }
        let (pos, level) = {
            let p = self.require(parent)?;
            (p.post() + 1, p.level + 1)
        };
        self.order.insert(pos, id);
        self.nodes.insert(id, TreeNode::new(id, pos, level, Some(parent)));
        self.shift_ancestor_sizes(parent, 1);
        self.renumber_from(pos);
        Ok(())
    }

    /// Remove `id` and its whole subtree. Returns the removed ids in pre
    /// order, `id` first.
    pub(crate) fn delete_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, NestGraphError> {
        if id == ROOT_ID {
            return Err(NestGraphError::InvalidArgument(
                "the synthetic root cannot be deleted".into(),
            ));
        }
        let (pre, post, parent) = {
            let n = self.require(id)?;
            (n.pre, n.post(), n.parent)
        };
        let removed: Vec<NodeId> = self.order[pre..=post].to_vec();
        for rid in &removed {
            self.nodes.remove(rid);
        }
        self.order.drain(pre..=post);
        if let Some(p) = parent {
            self.shift_ancestor_sizes(p, -(removed.len() as isize));
        }
        self.renumber_from(pre);
        Ok(removed)
    }

    /// Remove only `id`, re-parenting its children to its own parent and
    /// pulling its former descendants one level up.
    pub(crate) fn delete_only_self(&mut self, id: NodeId) -> Result<(), NestGraphError> {
        if id == ROOT_ID {
            return Err(NestGraphError::InvalidArgument(
                "the synthetic root cannot be deleted".into(),
            ));
        }
        let (pre, post, parent) = {
            let n = self.require(id)?;
            (n.pre, n.post(), n.parent)
        };
        let children: Vec<NodeId> = self.children(id).collect();
        let descendants: Vec<NodeId> = self.order[pre + 1..=post].to_vec();
        for did in descendants {
            if let Some(d) = self.nodes.get_mut(&did) {
                d.level -= 1;
            }
        }
        for cid in children {
            if let Some(c) = self.nodes.get_mut(&cid) {
                c.parent = parent;
            }
        }
        self.order.remove(pre);
        self.nodes.remove(&id);
        if let Some(p) = parent {
            self.shift_ancestor_sizes(p, -1);
        }
        self.renumber_from(pre);
        Ok(())
    }

    /// Reparent `id` (and its whole subtree, preserving relative order) as
    /// the last child of `new_parent`, recomputing every moved level.
    pub(crate) fn move_to(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), NestGraphError> {
        if id == ROOT_ID {
            return Err(NestGraphError::InvalidArgument(
                "the synthetic root cannot be moved".into(),
            ));
        }
        self.require(new_parent)?;
        if id == new_parent || self.contains(id, new_parent) {
            return Err(NestGraphError::InvalidArgument(format!(
                "moving {id} under {new_parent} would create a cycle"
            )));
        }
        let (pre, post, old_level, old_parent) = {
            let n = self.require(id)?;
            (n.pre, n.post(), n.level, n.parent)
        };
        let moved: Vec<NodeId> = self.order[pre..=post].to_vec();
        self.order.drain(pre..=post);
        if let Some(p) = old_parent {
            self.shift_ancestor_sizes(p, -(moved.len() as isize));
        }
        self.renumber_from(pre);

        let (pos, parent_level) = {
            let p = self.require(new_parent)?;
            (p.post() + 1, p.level)
        };
        self.order.splice(pos..pos, moved.iter().copied());
        self.shift_ancestor_sizes(new_parent, moved.len() as isize);
        let delta = parent_level as isize + 1 - old_level as isize;
        for mid in &moved {
            let n = self
                .nodes
                .get_mut(mid)
                .expect("moved ids keep their records");
            n.level = (n.level as isize + delta) as usize;
        }
        if let Some(n) = self.nodes.get_mut(&id) {
            n.parent = Some(new_parent);
        }
        self.renumber_from(pos.min(pre));
        Ok(())
    }

    /// Re-derive every positional invariant by brute force and report the
    /// first violation. Intended for tests and post-mutation auditing.
    pub fn built_in_test(&self) -> Result<(), NestGraphError> {
        let fail = |msg: String| Err(NestGraphError::Invariant(msg));
        if self.order.first() != Some(&ROOT_ID) {
            return fail("order[0] must be the synthetic root".into());
        }
        if self.order.len() != self.nodes.len() {
            return fail(format!(
                "order length {} != record count {}",
                self.order.len(),
                self.nodes.len()
            ));
        }
        for (pre, id) in self.order.iter().enumerate() {
            let Some(node) = self.nodes.get(id) else {
                return fail(format!("order entry {id} has no record"));
            };
            if node.pre != pre {
                return fail(format!("{id}: stored pre {} != position {pre}", node.pre));
            }
        }
        let root = self.root();
        if root.size != self.node_count() {
            return fail(format!(
                "root size {} != node count {}",
                root.size,
                self.node_count()
            ));
        }
        for node in self.nodes.values() {
            if node.post() >= self.order.len() {
                return fail(format!("{}: post {} out of range", node.id, node.post()));
            }
            let by_containment = self
                .nodes
                .values()
                .filter(|other| self.contains(node.id, other.id))
                .count();
            if by_containment != node.size {
                return fail(format!(
                    "{}: size {} != containment count {by_containment}",
                    node.id, node.size
                ));
            }
            if node.id == ROOT_ID {
                continue;
            }
            let Some(pid) = node.parent else {
                return fail(format!("{}: non-root without parent", node.id));
            };
            let Some(parent) = self.nodes.get(&pid) else {
                return fail(format!("{}: parent {pid} missing", node.id));
            };
            if !self.contains(pid, node.id) {
                return fail(format!("{}: not contained by parent {pid}", node.id));
            }
            if node.level != parent.level + 1 {
                return fail(format!(
                    "{}: level {} != parent level {} + 1",
                    node.id, node.level, parent.level
                ));
            }
            // The parent-chain walk must agree with pre/post containment.
            let mut chain = self.ancestors(node.id).collect::<Vec<_>>();
            chain.push(ROOT_ID);
            for anc in &chain {
                if !self.contains(*anc, node.id) {
                    return fail(format!("{}: ancestor {anc} fails containment", node.id));
                }
            }
            // Enablement is an antichain with respect to ancestry.
            if node.enabled && self.enabled_ancestor(node.id).is_some() {
                return fail(format!("{}: enabled below an enabled ancestor", node.id));
            }
        }
        Ok(())
    }
}

pub struct ChildrenIter<'a> {
    tree: &'a TreeStructure,
    next: usize,
    end: usize,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.next > self.end {
            return None;
        }
        let node = self.tree.node_at(self.next)?;
        self.next = node.post() + 1;
        Some(node.id)
    }
}

pub struct AncestorIter<'a> {
    tree: &'a TreeStructure,
    cursor: Option<NodeId>,
}

impl Iterator for AncestorIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cursor?;
        if id == ROOT_ID {
            return None;
        }
        self.cursor = self.tree.node(id).and_then(|n| n.parent);
        Some(id)
    }
}
