//! Plain-text graph dump and per-module edge statistics for debugging.

use std::io::{self, Write};

use crate::store::graph::DependencyGraph;

/// Write one `NODE` line per node followed by one `EDGE` line per edge.
pub fn write_debug_dump<W: Write>(graph: &DependencyGraph, out: &mut W) -> io::Result<()> {
    for node in graph.nodes() {
        writeln!(
            out,
            "NODE {} {} kind={} width={} arch_visible={}",
            node.id, node.hier_name, node.kind, node.width, node.is_arch_visible
        )?;
    }
    for edge in graph.edges() {
        let cond = edge
            .cond
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "None".to_string());
        writeln!(
            out,
            "EDGE {}->{} seq={} cond={}",
            edge.src, edge.dst, edge.is_seq, cond
        )?;
    }
    Ok(())
}

pub fn render_debug_dump(graph: &DependencyGraph) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_debug_dump(graph, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleEdgeStats {
    pub nodes: usize,
    pub in_edges: usize,
    pub out_edges: usize,
}

/// Count nodes whose name contains `module_substr` and the edges entering
/// and leaving them. Edges internal to the module count both ways.
pub fn module_edge_stats(graph: &DependencyGraph, module_substr: &str) -> ModuleEdgeStats {
    let member: Vec<bool> = graph
        .nodes()
        .iter()
        .map(|n| n.hier_name.contains(module_substr))
        .collect();
    let mut stats = ModuleEdgeStats {
        nodes: member.iter().filter(|m| **m).count(),
        ..ModuleEdgeStats::default()
    };
    for edge in graph.edges() {
        if member[edge.src.index()] {
            stats.out_edges += 1;
        }
        if member[edge.dst.index()] {
            stats.in_edges += 1;
        }
    }
    stats
}

pub fn render_module_edge_stats(graph: &DependencyGraph, module_substr: &str) -> String {
    let stats = module_edge_stats(graph, module_substr);
    format!(
        "module '{module_substr}': nodes={}, in_edges={}, out_edges={}",
        stats.nodes, stats.in_edges, stats.out_edges
    )
}
