//! In-memory dependency graph.
//!
//! Nodes live in an arena indexed by [`NodeId`]; a name index maps each
//! hierarchical name to its id. Edges hold plain ids, so register feedback
//! loops need no shared ownership. The graph only grows: there is no node or
//! edge removal.
//!
//! Each graph carries a process-unique id and a version bumped on every
//! mutation. Caches key on both, so results computed on one graph are never
//! served for another or for an earlier state of the same graph.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::expr::Expr;
use crate::models::{Edge, Node, NodeId, NodeKind, SrcLoc, Width};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

fn next_graph_id() -> u64 {
    NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub struct DependencyGraph {
    id: u64,
    nodes: Vec<Node>,
    name_to_id: IndexMap<String, NodeId>,
    edges: Vec<Edge>,
    version: u64,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        DependencyGraph::with_capacity(0, 0)
    }
}

impl Clone for DependencyGraph {
    /// A clone can diverge from its source, so it gets its own id.
    fn clone(&self) -> Self {
        DependencyGraph {
            id: next_graph_id(),
            nodes: self.nodes.clone(),
            name_to_id: self.name_to_id.clone(),
            edges: self.edges.clone(),
            version: self.version,
        }
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        DependencyGraph {
            id: next_graph_id(),
            nodes: Vec::with_capacity(nodes),
            name_to_id: IndexMap::with_capacity(nodes),
            edges: Vec::with_capacity(edges),
            version: 0,
        }
    }

    /// Process-unique identity of this graph instance.
    pub fn graph_id(&self) -> u64 {
        self.id
    }

    /// Return the id for `hier_name`, creating the node on first sight.
    ///
    /// A repeated call never creates a second node. It may still refine the
    /// existing one: a strictly higher-ranked width replaces the stored width,
    /// and an `internal` placeholder adopts a concrete kind.
    pub fn add_node(&mut self, hier_name: &str, kind: NodeKind, width: Width) -> NodeId {
        if let Some(&id) = self.name_to_id.get(hier_name) {
            let node = &mut self.nodes[id.index()];
            if width.outranks(&node.width) {
                node.width = width;
            }
            if node.kind == NodeKind::Internal && kind != NodeKind::Internal {
                node.kind = kind;
            }
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, hier_name, kind, width));
        self.name_to_id.insert(hier_name.to_string(), id);
        self.version += 1;
        id
    }

    /// Append an edge. Parallel edges between the same pair are kept.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        is_seq: bool,
        cond: Option<Expr>,
        src_loc: Option<SrcLoc>,
    ) {
        if src.index() >= self.nodes.len() || dst.index() >= self.nodes.len() {
            tracing::warn!("Dropping edge {src}->{dst}: endpoint outside graph");
            return;
        }
        self.edges.push(Edge {
            src,
            dst,
            is_seq,
            cond,
            src_loc,
        });
        self.version += 1;
    }

    pub fn get_node_id(&self, hier_name: &str) -> Option<NodeId> {
        self.name_to_id.get(hier_name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Mutable access counts as a change.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.version += 1;
        self.nodes.get_mut(id.index())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Mutable access counts as a change.
    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        self.version += 1;
        &mut self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Bumped on every node/edge insert and every mutable node access.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Apply `width` if it outranks the stored one. Returns whether it did.
    pub fn refine_width(&mut self, id: NodeId, width: Width) -> bool {
        match self.node_mut(id) {
            Some(node) if width.outranks(&node.width) => {
                node.width = width;
                true
            }
            _ => false,
        }
    }

    /// Record that a clocked assignment writes `id`.
    pub fn mark_sequential(&mut self, id: NodeId, clock: Option<&str>) {
        if let Some(node) = self.node_mut(id) {
            node.seq = true;
            if let Some(clock) = clock {
                node.clock = Some(clock.to_string());
            }
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Dependency graph: {} nodes, {} edges",
            self.nodes.len(),
            self.edges.len()
        )
    }
}
