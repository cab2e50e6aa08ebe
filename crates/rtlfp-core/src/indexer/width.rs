//! Width resolution across port bindings.
//!
//! A node with no width from its own declaration inherits one from the
//! signals it is bound to. Inheritance follows bindings transitively and is
//! guarded against binding cycles. Whatever remains unknown afterwards gets
//! the one-bit fallback.

use std::collections::{HashMap, HashSet};

use crate::models::{NodeId, Width, WidthSource};
use crate::store::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WidthReport {
    pub inherited: usize,
    pub fallback: usize,
}

struct WidthResolver<'g> {
    graph: &'g DependencyGraph,
    partners: HashMap<NodeId, Vec<NodeId>>,
    resolved: HashMap<NodeId, Width>,
    resolving: HashSet<NodeId>,
    cycle_hits: usize,
}

impl<'g> WidthResolver<'g> {
    fn new(graph: &'g DependencyGraph, bindings: &[(NodeId, NodeId)]) -> Self {
        let mut partners: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &(a, b) in bindings {
            if a == b {
                continue;
            }
            partners.entry(a).or_default().push(b);
            partners.entry(b).or_default().push(a);
        }
        WidthResolver {
            graph,
            partners,
            resolved: HashMap::new(),
            resolving: HashSet::new(),
            cycle_hits: 0,
        }
    }

    /// Best width for `id`: its own declared width, else the first partner
    /// that resolves to something stronger than the fallback.
    fn resolve(&mut self, id: NodeId) -> Width {
        if let Some(width) = self.resolved.get(&id) {
            return *width;
        }
        let own = match self.graph.node(id) {
            Some(node) => node.width,
            None => return Width::unknown(),
        };
        if own.source >= WidthSource::Inherited {
            return own;
        }
        if !self.resolving.insert(id) {
            self.cycle_hits += 1;
            return Width::unknown();
        }
        let hits_before = self.cycle_hits;

        let partners = self.partners.get(&id).cloned().unwrap_or_default();
        let mut inherited = None;
        for partner in partners {
            let width = self.resolve(partner);
            if let (Some(bits), true) = (width.bits, width.source >= WidthSource::Inherited) {
                inherited = Some(Width::inherited(bits));
                break;
            }
        }
        self.resolving.remove(&id);

        // A miss that ran into a node still on the stack may succeed later.
        let width = inherited.unwrap_or(own);
        if inherited.is_some() || self.cycle_hits == hits_before {
            self.resolved.insert(id, width);
        }
        width
    }
}

/// Inherit widths over `bindings` (pairs of bound node ids), then give every
/// still-unknown node the fallback width.
pub fn resolve_widths(graph: &mut DependencyGraph, bindings: &[(NodeId, NodeId)]) -> WidthReport {
    let updates: Vec<(NodeId, Width)> = {
        let mut resolver = WidthResolver::new(graph, bindings);
        let pending: Vec<NodeId> = graph
            .nodes()
            .iter()
            .filter(|n| n.width.source < WidthSource::Inherited)
            .map(|n| n.id)
            .collect();
        pending
            .into_iter()
            .map(|id| (id, resolver.resolve(id)))
            .filter(|(_, w)| w.source == WidthSource::Inherited)
            .collect()
    };

    let mut report = WidthReport::default();
    for (id, width) in updates {
        if graph.refine_width(id, width) {
            report.inherited += 1;
        }
    }
    let unknown: Vec<NodeId> = graph
        .nodes()
        .iter()
        .filter(|n| !n.width.is_known())
        .map(|n| n.id)
        .collect();
    for id in unknown {
        if graph.refine_width(id, Width::fallback()) {
            report.fallback += 1;
        }
    }
    tracing::debug!(
        "Width resolution: {} inherited, {} fallback",
        report.inherited,
        report.fallback
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeKind;

    fn width_of(g: &DependencyGraph, name: &str) -> Width {
        g.node(g.get_node_id(name).unwrap()).unwrap().width
    }

    #[test]
    fn test_inherits_across_chain() {
        let mut g = DependencyGraph::new();
        let port = g.add_node("top.core.io_addr", NodeKind::Input, Width::typespec(40));
        let wire = g.add_node("top.addr_w", NodeKind::Net, Width::unknown());
        let inner = g.add_node("top.core.lsu.io_addr", NodeKind::Input, Width::unknown());
        let report = resolve_widths(&mut g, &[(inner, wire), (wire, port)]);
        assert_eq!(report.inherited, 2);
        assert_eq!(width_of(&g, "top.addr_w"), Width::inherited(40));
        assert_eq!(width_of(&g, "top.core.lsu.io_addr"), Width::inherited(40));
        assert_eq!(width_of(&g, "top.core.io_addr"), Width::typespec(40));
    }

    #[test]
    fn test_binding_cycle_terminates_with_fallback() {
        let mut g = DependencyGraph::new();
        let a = g.add_node("top.a", NodeKind::Net, Width::unknown());
        let b = g.add_node("top.b", NodeKind::Net, Width::unknown());
        let c = g.add_node("top.c", NodeKind::Net, Width::unknown());
        let report = resolve_widths(&mut g, &[(a, b), (b, c), (c, a)]);
        assert_eq!(report.inherited, 0);
        assert_eq!(report.fallback, 3);
        for name in ["top.a", "top.b", "top.c"] {
            assert_eq!(width_of(&g, name), Width::fallback());
        }
    }

    #[test]
    fn test_cycle_with_declared_member() {
        let mut g = DependencyGraph::new();
        let a = g.add_node("top.a", NodeKind::Net, Width::unknown());
        let b = g.add_node("top.b", NodeKind::Net, Width::unknown());
        let c = g.add_node("top.c", NodeKind::Reg, Width::range(5));
        resolve_widths(&mut g, &[(a, b), (b, c), (c, a)]);
        assert_eq!(width_of(&g, "top.a").bits, Some(5));
        assert_eq!(width_of(&g, "top.b").bits, Some(5));
        assert_eq!(width_of(&g, "top.c"), Width::range(5));
    }

    #[test]
    fn test_declared_width_is_not_overridden() {
        let mut g = DependencyGraph::new();
        let a = g.add_node("top.a", NodeKind::Net, Width::range(3));
        let b = g.add_node("top.b", NodeKind::Net, Width::typespec(64));
        resolve_widths(&mut g, &[(a, b)]);
        assert_eq!(width_of(&g, "top.a"), Width::range(3));
    }

    #[test]
    fn test_unbound_unknown_gets_fallback() {
        let mut g = DependencyGraph::new();
        g.add_node("top.lonely", NodeKind::Internal, Width::unknown());
        let report = resolve_widths(&mut g, &[]);
        assert_eq!(report.fallback, 1);
        assert_eq!(width_of(&g, "top.lonely"), Width::fallback());
    }
}
