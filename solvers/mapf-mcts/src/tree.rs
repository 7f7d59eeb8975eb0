//! Append-only search-tree arena.
//!
//! Nodes live in a `Vec` and reference each other by index, so parent
//! links stay valid for the lifetime of the tree. Nothing is freed during
//! a search; the whole arena drops with the tree.

/// Index of a node within its owning [`Tree`].
pub type NodeId = usize;

/// Per-decision statistics of one tree node.
#[derive(Debug, Clone)]
pub struct Node {
    /// Action taken from the parent to enter this node; `None` for roots.
    pub action_id: Option<usize>,
    /// Parent node; `None` for roots.
    pub parent: Option<NodeId>,
    /// Agent whose action is committed at this node.
    pub agent_id: usize,
    pub visit_count: u32,
    pub total_value: f64,
    pub mean_value: f64,
    /// Child slot per action; empty until expanded.
    children: Vec<Option<NodeId>>,
    /// In-flight descents through this node within the current batch.
    virtual_count: u32,
    /// Expansion sites claimed by earlier descents of the current batch.
    picked_mask: Vec<bool>,
}

impl Node {
    fn new(
        parent: Option<NodeId>,
        action_id: Option<usize>,
        value: f64,
        num_actions: usize,
        agent_id: usize,
    ) -> Self {
        Self {
            action_id,
            parent,
            agent_id,
            visit_count: 1,
            total_value: value,
            mean_value: value,
            children: vec![None; num_actions],
            virtual_count: 0,
            picked_mask: vec![false; num_actions],
        }
    }

    /// Visit count inflated by in-batch virtual descents.
    pub fn adjusted_count(&self) -> u32 {
        self.visit_count + self.virtual_count
    }

    /// Whether an earlier descent of the current batch claimed `action`
    /// as its expansion site.
    pub fn picked(&self, action: usize) -> bool {
        self.picked_mask[action]
    }
}

/// A search tree with a stable, append-only node arena. Node 0 is the
/// tree's original root; the engine tracks the current root separately as
/// it advances per committed action.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Id of the original root node.
    pub const ROOT: NodeId = 0;

    /// A tree holding only a root for agent 0 with zero value.
    pub fn new(num_actions: usize) -> Self {
        Self { nodes: vec![Node::new(None, None, 0.0, num_actions, 0)] }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a child of `parent` under `action` with the given initial
    /// value and owning agent, and link it into the parent's slot.
    pub fn alloc(
        &mut self,
        parent: NodeId,
        action: usize,
        value: f64,
        num_actions: usize,
        agent_id: usize,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(Some(parent), Some(action), value, num_actions, agent_id));
        self.nodes[parent].children[action] = Some(id);
        id
    }

    /// Child of `id` under `action`, if expanded.
    pub fn child(&self, id: NodeId, action: usize) -> Option<NodeId> {
        self.nodes[id].children[action]
    }

    /// Fold `value` into the node's statistics.
    pub fn update_value(&mut self, id: NodeId, value: f64) {
        let node = &mut self.nodes[id];
        node.total_value += value;
        node.visit_count += 1;
        node.mean_value = node.total_value / node.visit_count as f64;
    }

    /// Fold `value` into the node and propagate through its ancestors,
    /// discounting by `gamma` once per level.
    pub fn update_value_batch(&mut self, id: NodeId, value: f64, gamma: f64) {
        let mut cursor = Some(id);
        let mut value = value;
        while let Some(id) = cursor {
            self.update_value(id, value);
            value *= gamma;
            cursor = self.nodes[id].parent;
        }
    }

    /// Mark `action` as claimed by an in-batch descent of `id`.
    pub fn mark_picked(&mut self, id: NodeId, action: usize) {
        self.nodes[id].picked_mask[action] = true;
    }

    /// Count one in-batch descent through `id`.
    pub fn bump_virtual(&mut self, id: NodeId) {
        self.nodes[id].virtual_count += 1;
    }

    /// Clear virtual-loss state on `id` and every descendant.
    pub fn zero_virtual(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id];
            node.virtual_count = 0;
            node.picked_mask.iter_mut().for_each(|p| *p = false);
            stack.extend(node.children.iter().flatten());
        }
    }

    /// Refresh `mean_value` from the totals on `id` and every descendant.
    /// Used after merging parallel trees.
    pub fn recompute_mean(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id];
            node.mean_value = node.total_value / node.visit_count as f64;
            stack.extend(node.children.iter().flatten());
        }
    }

    /// Action of the most-visited child; ties break to the lowest action
    /// index. `None` when no child exists.
    pub fn pick_most_visited(&self, id: NodeId) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_count: i64 = -1;
        for (action, child) in self.nodes[id].children.iter().enumerate() {
            if let Some(child) = *child {
                let count = self.nodes[child].visit_count as i64;
                if count > best_count {
                    best = Some(action);
                    best_count = count;
                }
            }
        }
        best
    }

    /// Accumulate the subtree of `other` rooted at `from` into the subtree
    /// rooted at `into`: visit counts and totals add at matching nodes;
    /// children missing here are materialized with zero value and the
    /// auxiliary child's agent before accumulating.
    pub fn absorb(&mut self, into: NodeId, other: &Tree, from: NodeId) {
        let source = other.node(from);
        self.nodes[into].visit_count += source.visit_count;
        self.nodes[into].total_value += source.total_value;
        let num_actions = source.children.len();
        for action in 0..num_actions {
            if let Some(aux_child) = other.child(from, action) {
                let target = match self.child(into, action) {
                    Some(existing) => existing,
                    None => self.alloc(
                        into,
                        action,
                        0.0,
                        num_actions,
                        other.node(aux_child).agent_id,
                    ),
                };
                self.absorb(target, other, aux_child);
            }
        }
    }
}
