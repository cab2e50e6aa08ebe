//! Path queries over a built dependency graph.
//!
//! The engine borrows the graph immutably and builds its adjacency lists on
//! first use. While an engine is alive the graph cannot change, so the cached
//! adjacency always matches the graph it was built from.

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet, VecDeque};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{RtlfpError, RtlfpResult};
use crate::models::{Node, NodeId, NodeKind};
use crate::query::guards::{
    clamp_depth, clamp_paths, truncate_pattern, DCACHE_QUERY_DEPTH, DEFAULT_QUERY_DEPTH,
    MAX_CONE_NODES, MAX_RENDERED_PATHS, MSHR_QUERY_DEPTH, PRESET_QUERY_PATHS,
};
use crate::store::graph::DependencyGraph;

pub type NodePath = Vec<NodeId>;

/// How targets reached from several sources are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// One search from all sources with a shared visited set. Each node is
    /// reached once, so each target appears in at most one path.
    #[default]
    FirstReach,
    /// An independent search per source. A target reachable from two sources
    /// is reported once for each.
    PerSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryLimits {
    /// Longest accepted path, counted in nodes.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// `None` reports every path found; an explicit limit is capped at
    /// `MAX_QUERY_PATHS`.
    #[serde(default)]
    pub max_paths: Option<usize>,
}

fn default_max_depth() -> usize {
    DEFAULT_QUERY_DEPTH
}

impl Default for QueryLimits {
    fn default() -> Self {
        QueryLimits {
            max_depth: DEFAULT_QUERY_DEPTH,
            max_paths: None,
        }
    }
}

impl QueryLimits {
    pub fn new(max_depth: usize, max_paths: Option<usize>) -> Self {
        QueryLimits {
            max_depth,
            max_paths,
        }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

const MSHR_META_MARKERS: &[&str] = &["MSHR.meta_", "MSHR.request_"];
const ROB_COMMIT_PREFIX: &str = "work@Rob.io_commit_";
const DCACHE_RESP_DATA: &str = "dcache.io_lsu_resp_0_bits_data";
const ROB_COMMIT_UOP: &str = "Rob.io_commit_uops_0";

pub fn pred_hier_contains(needle: &str) -> impl Fn(&Node) -> bool {
    let needle = truncate_pattern(needle).to_string();
    move |node: &Node| node.hier_name.contains(needle.as_str())
}

pub fn pred_hier_startswith(prefix: &str) -> impl Fn(&Node) -> bool {
    let prefix = truncate_pattern(prefix).to_string();
    move |node: &Node| node.hier_name.starts_with(prefix.as_str())
}

/// Regex search over the hierarchical name.
pub fn pred_name_regex(pattern: &str) -> RtlfpResult<impl Fn(&Node) -> bool> {
    let re = Regex::new(truncate_pattern(pattern))
        .map_err(|e| RtlfpError::Config(format!("invalid node regex '{pattern}': {e}")))?;
    Ok(move |node: &Node| re.is_match(&node.hier_name))
}

pub fn pred_arch_visible(node: &Node) -> bool {
    node.is_arch_visible
}

pub fn pred_micro_state(node: &Node) -> bool {
    node.is_micro_state
}

pub fn pred_mshr_meta(node: &Node) -> bool {
    MSHR_META_MARKERS.iter().any(|m| node.hier_name.contains(m))
}

pub fn pred_rob_commit_arch(node: &Node) -> bool {
    node.hier_name.starts_with(ROB_COMMIT_PREFIX) && node.is_arch_visible
}

pub fn pred_dcache_resp_data(node: &Node) -> bool {
    node.hier_name.contains(DCACHE_RESP_DATA)
}

pub fn pred_rob_commit_wdata(node: &Node) -> bool {
    node.hier_name.contains(ROB_COMMIT_UOP) && node.hier_name.contains("data")
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetQuery {
    /// MSHR metadata/request state to architecturally visible ROB commit.
    MshrToRobCommit,
    /// Data cache load response to ROB commit data.
    DcacheToRobData,
}

impl PresetQuery {
    pub const ALL: [PresetQuery; 2] = [PresetQuery::MshrToRobCommit, PresetQuery::DcacheToRobData];

    pub fn name(self) -> &'static str {
        match self {
            PresetQuery::MshrToRobCommit => "mshr_to_rob_commit",
            PresetQuery::DcacheToRobData => "dcache_to_rob_data",
        }
    }

    pub fn limits(self) -> QueryLimits {
        match self {
            PresetQuery::MshrToRobCommit => {
                QueryLimits::new(MSHR_QUERY_DEPTH, Some(PRESET_QUERY_PATHS))
            }
            PresetQuery::DcacheToRobData => {
                QueryLimits::new(DCACHE_QUERY_DEPTH, Some(PRESET_QUERY_PATHS))
            }
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        PresetQuery::ALL.into_iter().find(|p| p.name() == name)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct QueryEngine<'g> {
    graph: &'g DependencyGraph,
    policy: PathPolicy,
    forward: OnceCell<Vec<Vec<NodeId>>>,
    backward: OnceCell<Vec<Vec<NodeId>>>,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        QueryEngine {
            graph,
            policy: PathPolicy::default(),
            forward: OnceCell::new(),
            backward: OnceCell::new(),
        }
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn graph(&self) -> &'g DependencyGraph {
        self.graph
    }

    pub fn policy(&self) -> PathPolicy {
        self.policy
    }

    fn forward(&self) -> &[Vec<NodeId>] {
        self.forward.get_or_init(|| {
            let mut adj = vec![Vec::new(); self.graph.node_count()];
            for edge in self.graph.edges() {
                adj[edge.src.index()].push(edge.dst);
            }
            tracing::debug!("Built forward adjacency over {} edges", self.graph.edge_count());
            adj
        })
    }

    fn backward(&self) -> &[Vec<NodeId>] {
        self.backward.get_or_init(|| {
            let mut adj = vec![Vec::new(); self.graph.node_count()];
            for edge in self.graph.edges() {
                adj[edge.dst.index()].push(edge.src);
            }
            adj
        })
    }

    pub fn find_nodes(&self, pred: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        self.graph
            .nodes()
            .iter()
            .filter(|n| pred(n))
            .map(|n| n.id)
            .collect()
    }

    /// Multi-source breadth-first path search.
    ///
    /// A path is recorded when its last node is a target and is not extended
    /// further; other branches keep going. A node is queued at most once per
    /// search. Paths longer than `max_depth` nodes are dropped without
    /// stopping the search, and enumeration ends after `max_paths` results.
    pub fn bfs_paths(
        &self,
        sources: &[NodeId],
        targets: &[NodeId],
        max_depth: usize,
        max_paths: Option<usize>,
        policy: PathPolicy,
    ) -> Vec<NodePath> {
        if sources.is_empty() || targets.is_empty() {
            return Vec::new();
        }
        let max_depth = clamp_depth(max_depth);
        let max_paths = clamp_paths(max_paths);
        let targets: HashSet<NodeId> = targets.iter().copied().collect();

        let mut seen = HashSet::new();
        let sources: Vec<NodeId> = sources
            .iter()
            .copied()
            .filter(|s| s.index() < self.graph.node_count() && seen.insert(*s))
            .collect();

        let paths = match policy {
            PathPolicy::FirstReach => {
                self.search(&sources, &targets, max_depth, max_paths)
            }
            PathPolicy::PerSource => {
                let mut paths = Vec::new();
                for &source in &sources {
                    if paths.len() >= max_paths {
                        break;
                    }
                    let budget = max_paths - paths.len();
                    paths.extend(self.search(&[source], &targets, max_depth, budget));
                }
                paths
            }
        };
        tracing::debug!(
            "Path search: {} sources, {} targets, {} paths",
            sources.len(),
            targets.len(),
            paths.len()
        );
        paths
    }

    fn search(
        &self,
        sources: &[NodeId],
        targets: &HashSet<NodeId>,
        max_depth: usize,
        max_paths: usize,
    ) -> Vec<NodePath> {
        let adj = self.forward();
        let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
        let mut visited: HashSet<NodeId> = sources.iter().copied().collect();
        let mut queue: VecDeque<(NodeId, usize)> = sources.iter().map(|&s| (s, 1)).collect();
        let mut paths = Vec::new();

        while let Some((node, len)) = queue.pop_front() {
            if paths.len() >= max_paths {
                break;
            }
            if len > max_depth {
                continue;
            }
            if targets.contains(&node) {
                paths.push(unwind(&parent, node));
                continue;
            }
            for &next in &adj[node.index()] {
                if visited.insert(next) {
                    parent.insert(next, node);
                    queue.push_back((next, len + 1));
                }
            }
        }
        paths
    }

    pub fn query_custom(
        &self,
        source_pred: impl Fn(&Node) -> bool,
        target_pred: impl Fn(&Node) -> bool,
        limits: QueryLimits,
    ) -> Vec<NodePath> {
        let sources = self.find_nodes(source_pred);
        let targets = self.find_nodes(target_pred);
        self.bfs_paths(
            &sources,
            &targets,
            limits.max_depth,
            limits.max_paths,
            self.policy,
        )
    }

    pub fn query_preset(&self, preset: PresetQuery) -> Vec<NodePath> {
        let limits = preset.limits();
        match preset {
            PresetQuery::MshrToRobCommit => {
                self.query_custom(pred_mshr_meta, pred_rob_commit_arch, limits)
            }
            PresetQuery::DcacheToRobData => {
                self.query_custom(pred_dcache_resp_data, pred_rob_commit_wdata, limits)
            }
        }
    }

    pub fn query_mshr_to_rob_commit(&self) -> Vec<NodePath> {
        self.query_preset(PresetQuery::MshrToRobCommit)
    }

    pub fn query_dcache_to_rob_data(&self) -> Vec<NodePath> {
        self.query_preset(PresetQuery::DcacheToRobData)
    }

    /// Every node `target` transitively depends on, nearest first, starting
    /// with `target` itself. With `stop_at_state` the walk includes but does
    /// not expand registers and primary inputs.
    pub fn backward_cone(&self, target: NodeId, stop_at_state: bool) -> Vec<NodeId> {
        if target.index() >= self.graph.node_count() {
            return Vec::new();
        }
        let adj = self.backward();
        let mut visited = HashSet::from([target]);
        let mut queue = VecDeque::from([target]);
        let mut cone = Vec::new();

        while let Some(node) = queue.pop_front() {
            cone.push(node);
            if cone.len() >= MAX_CONE_NODES {
                tracing::warn!("Backward cone of {target} truncated at {MAX_CONE_NODES} nodes");
                break;
            }
            if stop_at_state && node != target && self.is_state_boundary(node) {
                continue;
            }
            for &prev in &adj[node.index()] {
                if visited.insert(prev) {
                    queue.push_back(prev);
                }
            }
        }
        cone
    }

    fn is_state_boundary(&self, id: NodeId) -> bool {
        self.graph
            .node(id)
            .is_some_and(|n| matches!(n.kind, NodeKind::Reg | NodeKind::Input) || n.seq)
    }

    pub fn path_names(&self, path: &[NodeId]) -> Vec<&'g str> {
        path.iter()
            .filter_map(|&id| self.graph.node(id))
            .map(|n| n.hier_name.as_str())
            .collect()
    }

    /// One line per path, `a -> b -> c`, at most `limit` of them.
    pub fn render_paths(&self, paths: &[NodePath], limit: usize) -> String {
        let limit = limit.min(MAX_RENDERED_PATHS);
        let mut lines = Vec::with_capacity(paths.len().min(limit) + 1);
        for (i, path) in paths.iter().take(limit).enumerate() {
            lines.push(format!(
                "[{}] ({} nodes) {}",
                i + 1,
                path.len(),
                self.path_names(path).join(" -> ")
            ));
        }
        if paths.len() > limit {
            lines.push(format!("... {} more", paths.len() - limit));
        }
        lines.join("\n")
    }
}

fn unwind(parent: &HashMap<NodeId, NodeId>, end: NodeId) -> NodePath {
    let mut path = vec![end];
    let mut cur = end;
    while let Some(&prev) = parent.get(&cur) {
        path.push(prev);
        cur = prev;
    }
    path.reverse();
    path
}
