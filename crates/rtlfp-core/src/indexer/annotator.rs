//! Post-build annotation pass: micro-state and architectural visibility.

use regex::Regex;

use crate::config::{RuleKind, VisibilityRule};
use crate::errors::{RtlfpError, RtlfpResult};
use crate::models::Node;
use crate::store::graph::DependencyGraph;

const HOST_MARKERS: &[&str] = &["tohost", "auto_tohost"];
const COMMIT_MARKERS: &[&str] = &["io_commit_", "_rob_io_commit_", "io_ifu_commit_"];
const MEMORY_PORT_MARKER: &str = "io_mem_";
const AXI_MARKER: &str = "axi4";
const AXI_ADDR_MARKER: &str = "_bits_addr";
const CLOCK_RESET_MARKERS: &[&str] = &["clock", "clk", "reset", "rst"];

#[derive(Debug, Clone)]
enum CompiledRule {
    Prefix(String),
    Substr(String),
    Regex(Regex),
}

impl CompiledRule {
    fn matches(&self, name: &str) -> bool {
        match self {
            CompiledRule::Prefix(p) => name.starts_with(p.as_str()),
            CompiledRule::Substr(s) => name.contains(s.as_str()),
            CompiledRule::Regex(re) => re.is_match(name),
        }
    }
}

/// Built-in visibility heuristics plus user rules, compiled once.
#[derive(Debug, Clone, Default)]
pub struct ArchVisibility {
    rules: Vec<CompiledRule>,
}

impl ArchVisibility {
    /// Compile user rules. Rules with an empty value are skipped; an invalid
    /// regex is a configuration error.
    pub fn compile(rules: &[VisibilityRule]) -> RtlfpResult<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.value.is_empty() {
                continue;
            }
            compiled.push(match rule.kind {
                RuleKind::Prefix => CompiledRule::Prefix(rule.value.clone()),
                RuleKind::Substr => CompiledRule::Substr(rule.value.clone()),
                RuleKind::Regex => CompiledRule::Regex(Regex::new(&rule.value).map_err(|e| {
                    RtlfpError::Config(format!("invalid visibility regex '{}': {e}", rule.value))
                })?),
            });
        }
        Ok(ArchVisibility { rules: compiled })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn is_visible(&self, hier_name: &str) -> bool {
        builtin_visible(hier_name) || self.rules.iter().any(|r| r.matches(hier_name))
    }
}

/// Host interface, commit ports and memory-side address ports.
fn builtin_visible(name: &str) -> bool {
    HOST_MARKERS.iter().any(|m| name.contains(m))
        || COMMIT_MARKERS.iter().any(|m| name.contains(m))
        || name.contains(MEMORY_PORT_MARKER)
        || (name.contains(AXI_MARKER) && name.contains(AXI_ADDR_MARKER))
}

/// Sequentially written storage wider than one bit that is not a clock or
/// reset.
pub fn is_micro_state(node: &Node) -> bool {
    if !node.kind.is_storage() || !node.seq {
        return false;
    }
    if !matches!(node.width.bits, Some(bits) if bits > 1) {
        return false;
    }
    let lower = node.hier_name.to_lowercase();
    !CLOCK_RESET_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn annotate_micro_state(graph: &mut DependencyGraph) -> usize {
    let mut count = 0;
    for node in graph.nodes_mut() {
        node.is_micro_state = is_micro_state(node);
        count += node.is_micro_state as usize;
    }
    count
}

pub fn annotate_arch_visible(graph: &mut DependencyGraph, visibility: &ArchVisibility) -> usize {
    let mut count = 0;
    for node in graph.nodes_mut() {
        node.is_arch_visible = visibility.is_visible(&node.hier_name);
        count += node.is_arch_visible as usize;
    }
    count
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub micro_state: usize,
    pub arch_visible: usize,
}

/// Run both passes. Re-running recomputes flags from scratch.
pub fn annotate(graph: &mut DependencyGraph, visibility: &ArchVisibility) -> AnnotationSummary {
    let summary = AnnotationSummary {
        micro_state: annotate_micro_state(graph),
        arch_visible: annotate_arch_visible(graph, visibility),
    };
    tracing::info!(
        "Annotated {} micro-state and {} arch-visible nodes ({} user rules)",
        summary.micro_state,
        summary.arch_visible,
        visibility.rule_count()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeKind, Width};

    fn flags(g: &DependencyGraph, name: &str) -> (bool, bool) {
        let node = g.node(g.get_node_id(name).unwrap()).unwrap();
        (node.is_micro_state, node.is_arch_visible)
    }

    #[test]
    fn test_micro_state_rules() {
        let mut g = DependencyGraph::new();
        let written = [
            g.add_node("top.rob.head", NodeKind::Reg, Width::range(6)),
            g.add_node("top.rob.valid", NodeKind::Reg, Width::range(1)),
            g.add_node("top.rob.count", NodeKind::Net, Width::range(6)),
            g.add_node("top.rob.reset_sync", NodeKind::Reg, Width::range(2)),
            g.add_node("top.ClkDiv.ratio", NodeKind::Logic, Width::range(4)),
            g.add_node("top.rob.entries", NodeKind::Memory, Width::typespec(64)),
            g.add_node("top.rob.tmp", NodeKind::Logic, Width::fallback()),
        ];
        for id in written {
            g.mark_sequential(id, Some("top.clock"));
        }
        g.add_node("top.rob.comb_sum", NodeKind::Logic, Width::range(8));

        assert_eq!(annotate_micro_state(&mut g), 2);
        assert!(flags(&g, "top.rob.head").0);
        assert!(flags(&g, "top.rob.entries").0);
        assert!(!flags(&g, "top.rob.valid").0);
        assert!(!flags(&g, "top.rob.count").0);
        assert!(!flags(&g, "top.rob.reset_sync").0);
        assert!(!flags(&g, "top.ClkDiv.ratio").0);
        assert!(!flags(&g, "top.rob.tmp").0);
        assert!(!flags(&g, "top.rob.comb_sum").0);
    }

    #[test]
    fn test_builtin_visibility() {
        let vis = ArchVisibility::default();
        assert!(vis.is_visible("TestHarness.chiptop.system.tohost"));
        assert!(vis.is_visible("work@Rob.io_commit_valids_0"));
        assert!(vis.is_visible("core.rob_io_ifu_commit_valid"));
        assert!(vis.is_visible("tile.io_mem_0_a_bits_address"));
        assert!(vis.is_visible("mem_axi4_0_aw_bits_addr"));
        assert!(!vis.is_visible("mem_axi4_0_aw_bits_data"));
        assert!(!vis.is_visible("work@MSHR.meta_tag"));
    }

    #[test]
    fn test_user_rules() {
        let vis = ArchVisibility::compile(&[
            VisibilityRule::new(RuleKind::Prefix, "DigitalTop.tile.core.csr"),
            VisibilityRule::new(RuleKind::Substr, ""),
            VisibilityRule::new(RuleKind::Regex, r"io_dmem_(req|resp)"),
        ])
        .unwrap();
        assert_eq!(vis.rule_count(), 2);
        assert!(vis.is_visible("DigitalTop.tile.core.csr_mstatus"));
        assert!(!vis.is_visible("x.DigitalTop.tile.core.csr_mstatus"));
        // Regex rules match anywhere in the name.
        assert!(vis.is_visible("tile.lsu.io_dmem_resp_valid"));
        assert!(!vis.is_visible("tile.lsu.io_dmem_nack"));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let err = ArchVisibility::compile(&[VisibilityRule::new(RuleKind::Regex, "(unclosed")])
            .unwrap_err();
        assert!(matches!(err, RtlfpError::Config(_)));
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let mut g = DependencyGraph::new();
        g.add_node("work@Rob.io_commit_uops_0_pdst", NodeKind::Output, Width::range(7));
        let tag = g.add_node("work@MSHR.meta_tag", NodeKind::Reg, Width::range(20));
        g.mark_sequential(tag, None);
        let vis = ArchVisibility::default();
        let first = annotate(&mut g, &vis);
        let second = annotate(&mut g, &vis);
        assert_eq!(first, second);
        assert_eq!(first, AnnotationSummary { micro_state: 1, arch_visible: 1 });
        assert_eq!(flags(&g, "work@Rob.io_commit_uops_0_pdst"), (false, true));
        assert_eq!(flags(&g, "work@MSHR.meta_tag"), (true, false));
    }
}
