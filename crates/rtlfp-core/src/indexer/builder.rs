//! Dependency graph construction from frontend events.
//!
//! Per-module work (name qualification, placeholder generation, edge records)
//! runs on a rayon pool with one task per module. The resulting fragments are
//! merged into the graph serially in module order, so node ids and edge order
//! do not depend on the worker count.

use std::time::Instant;

use rayon::prelude::*;

use crate::expr::Expr;
use crate::models::{
    split_hier_name, DesignEvents, ModuleEvents, NodeId, NodeKind, PortDirection, SrcLoc, Width,
    HIER_SEPARATOR,
};
use crate::store::graph::DependencyGraph;

use super::width::resolve_widths;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub modules: usize,
    pub nodes: usize,
    pub edges: usize,
    pub unresolved_refs: usize,
    pub inherited_widths: usize,
    pub fallback_widths: usize,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// Per-module fragments
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct NodeRecord {
    name: String,
    kind: NodeKind,
    width: Width,
}

#[derive(Debug)]
struct EdgeRecord {
    src: String,
    dst: String,
    is_seq: bool,
    cond: Option<Expr>,
    src_loc: Option<SrcLoc>,
}

#[derive(Debug, Default)]
struct ModuleFragment {
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    seq_writes: Vec<(String, Option<String>)>,
    bindings: Vec<(String, String)>,
    unresolved: usize,
}

struct FragmentBuilder<'m> {
    module: &'m ModuleEvents,
    fragment: ModuleFragment,
}

impl<'m> FragmentBuilder<'m> {
    fn new(module: &'m ModuleEvents) -> Self {
        FragmentBuilder {
            module,
            fragment: ModuleFragment::default(),
        }
    }

    fn placeholder(&mut self) -> String {
        let n = self.fragment.unresolved;
        self.fragment.unresolved += 1;
        let name = if self.module.module_path.is_empty() {
            format!("__unresolved_{n}")
        } else {
            format!("{}{HIER_SEPARATOR}__unresolved_{n}", self.module.module_path)
        };
        tracing::debug!("Unresolved reference in {}: using {name}", self.module.module_path);
        name
    }

    /// Full names pass through; bare leaf names are scoped to `scope`.
    fn qualify(&mut self, name: &str, scope: &str) -> String {
        if name.is_empty() {
            self.placeholder()
        } else if name.contains(HIER_SEPARATOR) || scope.is_empty() {
            name.to_string()
        } else {
            format!("{scope}{HIER_SEPARATOR}{name}")
        }
    }

    fn verbatim(&mut self, name: &str) -> String {
        if name.is_empty() {
            self.placeholder()
        } else {
            name.to_string()
        }
    }

    fn node(&mut self, name: &str, kind: NodeKind, width: Width) {
        self.fragment.nodes.push(NodeRecord {
            name: name.to_string(),
            kind,
            width,
        });
    }

    fn edge(&mut self, src: &str, dst: &str) {
        self.fragment.edges.push(EdgeRecord {
            src: src.to_string(),
            dst: dst.to_string(),
            is_seq: false,
            cond: None,
            src_loc: None,
        });
    }

    fn build(mut self) -> ModuleFragment {
        let module = self.module;

        for decl in &module.declarations {
            let name = self.verbatim(&decl.hier_name);
            self.node(&name, decl.kind, decl.declared_width());
        }

        for binding in &module.bindings {
            let port = self.verbatim(&binding.port);
            let kind = match binding.direction {
                PortDirection::Input => NodeKind::Input,
                PortDirection::Output => NodeKind::Output,
                PortDirection::Inout => NodeKind::Inout,
            };
            self.node(&port, kind, Width::unknown());

            // Child side first: its declaration is the more specific width.
            let conns = [binding.low_conn.as_deref(), binding.high_conn.as_deref()];
            for (is_high, conn) in [false, true].into_iter().zip(conns) {
                let Some(conn) = conn.filter(|c| !c.is_empty()) else {
                    continue;
                };
                let conn = conn.to_string();
                self.node(&conn, NodeKind::Internal, Width::unknown());
                self.fragment.bindings.push((port.clone(), conn.clone()));
                // Data flows high -> port -> low for inputs, the reverse for
                // outputs, and both ways for inouts.
                let into_port = match binding.direction {
                    PortDirection::Input => is_high,
                    PortDirection::Output => !is_high,
                    PortDirection::Inout => true,
                };
                let out_of_port = match binding.direction {
                    PortDirection::Input => !is_high,
                    PortDirection::Output => is_high,
                    PortDirection::Inout => true,
                };
                if into_port {
                    self.edge(&conn, &port);
                }
                if out_of_port {
                    self.edge(&port, &conn);
                }
            }
        }

        for dep in &module.dependencies {
            let dst = self.verbatim(&dep.dst);
            self.node(&dst, NodeKind::Internal, Width::unknown());
            if dep.is_seq {
                self.fragment.seq_writes.push((dst.clone(), dep.clock.clone()));
            }
            let scope = split_hier_name(&dst).0.to_string();
            let scope = if scope.is_empty() {
                module.module_path.clone()
            } else {
                scope
            };
            for leaf in dep.expr.references() {
                let src = self.qualify(leaf, &scope);
                self.node(&src, NodeKind::Internal, Width::unknown());
                self.fragment.edges.push(EdgeRecord {
                    src,
                    dst: dst.clone(),
                    is_seq: dep.is_seq,
                    cond: dep.cond.clone(),
                    src_loc: dep.src_loc.clone(),
                });
            }
        }

        self.fragment
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GraphBuilder {
    workers: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        GraphBuilder { workers: 4 }
    }
}

impl GraphBuilder {
    pub fn new(workers: usize) -> Self {
        GraphBuilder {
            workers: workers.max(1),
        }
    }

    pub fn build(&self, events: &DesignEvents) -> DependencyGraph {
        self.build_with_report(events).0
    }

    pub fn build_with_report(&self, events: &DesignEvents) -> (DependencyGraph, BuildReport) {
        let start = Instant::now();
        let fragments = self.build_fragments(events);

        let node_hint: usize = fragments.iter().map(|f| f.nodes.len()).sum();
        let edge_hint: usize = fragments.iter().map(|f| f.edges.len()).sum();
        let mut graph = DependencyGraph::with_capacity(node_hint, edge_hint);
        let mut bindings: Vec<(NodeId, NodeId)> = Vec::new();
        let mut report = BuildReport {
            modules: events.modules.len(),
            ..BuildReport::default()
        };

        for fragment in fragments {
            report.unresolved_refs += fragment.unresolved;
            merge_fragment(&mut graph, fragment, &mut bindings);
        }

        let widths = resolve_widths(&mut graph, &bindings);
        report.inherited_widths = widths.inherited;
        report.fallback_widths = widths.fallback;
        report.nodes = graph.node_count();
        report.edges = graph.edge_count();
        report.elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "Built dependency graph: {} modules, {} nodes, {} edges, {} unresolved refs in {}ms",
            report.modules,
            report.nodes,
            report.edges,
            report.unresolved_refs,
            report.elapsed_ms
        );
        (graph, report)
    }

    fn build_fragments(&self, events: &DesignEvents) -> Vec<ModuleFragment> {
        let sequential = || {
            events
                .modules
                .iter()
                .map(|m| FragmentBuilder::new(m).build())
                .collect::<Vec<_>>()
        };
        if self.workers <= 1 || events.modules.len() <= 1 {
            return sequential();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(|| {
                events
                    .modules
                    .par_iter()
                    .map(|m| FragmentBuilder::new(m).build())
                    .collect()
            }),
            Err(e) => {
                tracing::warn!("Failed to build module thread pool, running serially: {e}");
                sequential()
            }
        }
    }
}

fn merge_fragment(
    graph: &mut DependencyGraph,
    fragment: ModuleFragment,
    bindings: &mut Vec<(NodeId, NodeId)>,
) {
    for record in &fragment.nodes {
        graph.add_node(&record.name, record.kind, record.width);
    }
    for record in fragment.edges {
        let (Some(src), Some(dst)) = (graph.get_node_id(&record.src), graph.get_node_id(&record.dst))
        else {
            continue;
        };
        graph.add_edge(src, dst, record.is_seq, record.cond, record.src_loc);
    }
    for (name, clock) in &fragment.seq_writes {
        if let Some(id) = graph.get_node_id(name) {
            graph.mark_sequential(id, clock.as_deref());
        }
    }
    for (a, b) in &fragment.bindings {
        if let (Some(a), Some(b)) = (graph.get_node_id(a), graph.get_node_id(b)) {
            bindings.push((a, b));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::frontend::{Frontend, ToyFrontend, TOY_DCACHE_PATH, TOY_MSHRS_PATH};
    use crate::models::{Declaration, Dependency, PortBinding, WidthSource};

    fn assign(dst: &str, expr: Expr) -> Dependency {
        Dependency {
            dst: dst.to_string(),
            expr,
            is_seq: false,
            clock: None,
            cond: None,
            src_loc: None,
        }
    }

    fn module(path: &str) -> ModuleEvents {
        ModuleEvents {
            module_path: path.to_string(),
            ..ModuleEvents::default()
        }
    }

    fn has_edge(g: &DependencyGraph, src: &str, dst: &str) -> bool {
        let (Some(s), Some(d)) = (g.get_node_id(src), g.get_node_id(dst)) else {
            return false;
        };
        g.edges().iter().any(|e| e.src == s && e.dst == d)
    }

    #[test]
    fn test_toy_graph() {
        let events = ToyFrontend.design_events().unwrap();
        let (g, report) = GraphBuilder::new(2).build_with_report(&events);
        let va = format!("{TOY_DCACHE_PATH}.va");
        let set_idx = format!("{TOY_DCACHE_PATH}.dcache_set_idx");
        let used = format!("{TOY_MSHRS_PATH}.mshr_used");
        let full = format!("{TOY_MSHRS_PATH}.dcache_mshr_full");

        assert!(has_edge(&g, &va, &set_idx));
        assert!(has_edge(&g, &used, &full));
        assert!(has_edge(&g, &used, &used));
        assert_eq!(report.unresolved_refs, 0);

        let used_node = g.node(g.get_node_id(&used).unwrap()).unwrap();
        assert!(used_node.seq);
        assert_eq!(used_node.kind, NodeKind::Reg);
        assert_eq!(used_node.width, Width::range(3));
        assert!(g.nodes().iter().all(|n| n.width.is_known()));
    }

    #[test]
    fn test_one_edge_per_leaf() {
        let mut m = module("top");
        m.dependencies.push(assign(
            "top.y",
            Expr::Xor(vec![Expr::slice("a", 3, 0), Expr::bit("a", 5), Expr::id("b")]),
        ));
        let g = GraphBuilder::new(1).build(&DesignEvents { modules: vec![m] });
        assert_eq!(g.node_count(), 3);
        // Two references to `a` produce two parallel edges.
        assert_eq!(g.edge_count(), 3);
        assert!(has_edge(&g, "top.b", "top.y"));
    }

    #[test]
    fn test_constants_create_no_nodes() {
        let mut m = module("top");
        m.dependencies.push(assign("top.k", Expr::constant(7)));
        let g = GraphBuilder::default().build(&DesignEvents { modules: vec![m] });
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_empty_reference_becomes_placeholder() {
        let mut m = module("top.core");
        m.dependencies.push(assign("top.core.y", Expr::id("")));
        let (g, report) = GraphBuilder::new(1).build_with_report(&DesignEvents { modules: vec![m] });
        assert_eq!(report.unresolved_refs, 1);
        assert!(has_edge(&g, "top.core.__unresolved_0", "top.core.y"));
    }

    #[test]
    fn test_port_binding_directions() {
        let mut m = module("top.core");
        m.bindings.push(PortBinding {
            port: "top.core.io_in".to_string(),
            direction: PortDirection::Input,
            high_conn: Some("top.req".to_string()),
            low_conn: Some("top.core.req_q".to_string()),
        });
        m.bindings.push(PortBinding {
            port: "top.core.io_out".to_string(),
            direction: PortDirection::Output,
            high_conn: Some("top.resp".to_string()),
            low_conn: Some("top.core.resp_q".to_string()),
        });
        m.bindings.push(PortBinding {
            port: "top.core.io_bus".to_string(),
            direction: PortDirection::Inout,
            high_conn: Some("top.bus".to_string()),
            low_conn: None,
        });
        let g = GraphBuilder::new(1).build(&DesignEvents { modules: vec![m] });

        assert!(has_edge(&g, "top.req", "top.core.io_in"));
        assert!(has_edge(&g, "top.core.io_in", "top.core.req_q"));
        assert!(!has_edge(&g, "top.core.io_in", "top.req"));

        assert!(has_edge(&g, "top.core.resp_q", "top.core.io_out"));
        assert!(has_edge(&g, "top.core.io_out", "top.resp"));
        assert!(!has_edge(&g, "top.resp", "top.core.io_out"));

        assert!(has_edge(&g, "top.bus", "top.core.io_bus"));
        assert!(has_edge(&g, "top.core.io_bus", "top.bus"));
    }

    #[test]
    fn test_bound_net_inherits_port_width() {
        let mut child = module("top.core");
        child.declarations.push(Declaration {
            hier_name: "top.core.io_addr".to_string(),
            kind: NodeKind::Input,
            typespec_width: Some(40),
            range_width: None,
        });
        child.bindings.push(PortBinding {
            port: "top.core.io_addr".to_string(),
            direction: PortDirection::Input,
            high_conn: Some("top.addr".to_string()),
            low_conn: None,
        });
        let g = GraphBuilder::new(1).build(&DesignEvents {
            modules: vec![child],
        });
        let addr = g.node(g.get_node_id("top.addr").unwrap()).unwrap();
        assert_eq!(addr.width, Width::inherited(40));
        let port = g.node(g.get_node_id("top.core.io_addr").unwrap()).unwrap();
        assert_eq!(port.width.source, WidthSource::Typespec);
    }

    #[test]
    fn test_worker_count_does_not_change_graph() {
        let modules: Vec<ModuleEvents> = (0..8)
            .map(|i| {
                let mut m = module(&format!("top.u{i}"));
                m.dependencies.push(assign(
                    &format!("top.u{i}.y"),
                    Expr::binary(Expr::Add, Expr::id("a"), Expr::id(format!("top.u{}.y", (i + 1) % 8))),
                ));
                m
            })
            .collect();
        let events = DesignEvents { modules };
        let serial = GraphBuilder::new(1).build(&events);
        let parallel = GraphBuilder::new(4).build(&events);
        let names = |g: &DependencyGraph| g.nodes().iter().map(|n| n.hier_name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&serial), names(&parallel));
        assert_eq!(serial.edge_count(), parallel.edge_count());
    }

    #[test]
    fn test_rebuild_is_idempotent_on_names() {
        let events = ToyFrontend.design_events().unwrap();
        let mut doubled = events.clone();
        doubled.modules.extend(events.modules.clone());
        let once = GraphBuilder::new(1).build(&events);
        let twice = GraphBuilder::new(1).build(&doubled);
        assert_eq!(once.node_count(), twice.node_count());
        for node in once.nodes() {
            let other = twice.node(twice.get_node_id(&node.hier_name).unwrap()).unwrap();
            assert_eq!(node.width, other.width);
        }
    }
}
