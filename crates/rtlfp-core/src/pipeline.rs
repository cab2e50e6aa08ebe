//! End-to-end compile flow: frontend -> graph -> annotate -> extract ->
//! synthesize, plus the preset path queries over the annotated graph.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AnalysisConfig;
use crate::errors::RtlfpResult;
use crate::indexer::annotator::{annotate, AnnotationSummary, ArchVisibility};
use crate::indexer::builder::{BuildReport, GraphBuilder};
use crate::indexer::frontend::Frontend;
use crate::models::{DesignSignal, Fingerprint, Node};
use crate::patterns::targets::TargetSelector;
use crate::patterns::PatternExtractor;
use crate::query::engine::{NodePath, PresetQuery, QueryEngine};
use crate::query::guards::{MAX_RENDERED_PATHS, PRESET_QUERY_PATHS};
use crate::query::planner::{CacheMode, QueryPlanner};
use crate::store::dump::render_module_edge_stats;
use crate::store::graph::DependencyGraph;
use crate::synth::artifacts::ArtifactBundle;
use crate::synth::constraints::{ConstraintSynthesizer, Synthesis};

/// Module whose edge counts are logged after every build.
const DEBUG_EDGE_MODULE: &str = "mshrs";

#[derive(Debug, Clone)]
pub struct PresetOutcome {
    pub preset: PresetQuery,
    pub paths: usize,
    pub cache: CacheMode,
    /// Human-readable listing of the first paths.
    pub rendered: String,
}

#[derive(Debug)]
pub struct CompileOutput {
    pub graph: DependencyGraph,
    pub build: BuildReport,
    pub annotation: AnnotationSummary,
    pub fingerprints: Vec<Fingerprint>,
    pub synthesis: Synthesis,
    pub presets: Vec<PresetOutcome>,
}

impl CompileOutput {
    pub fn artifacts(&self) -> RtlfpResult<ArtifactBundle> {
        ArtifactBundle::render(&self.fingerprints, &self.synthesis)
    }

    /// Render and write the artifacts under `prefix`.
    pub fn write_artifacts(&self, prefix: &Path) -> RtlfpResult<Vec<PathBuf>> {
        self.artifacts()?.write(prefix)
    }
}

/// Owns the compiled configuration and a query planner shared by every
/// graph it builds. Planner entries are keyed per graph instance.
pub struct FingerprintCompiler {
    config: AnalysisConfig,
    visibility: ArchVisibility,
    extractor: PatternExtractor,
    planner: QueryPlanner,
}

impl FingerprintCompiler {
    /// Fails only when a visibility rule regex does not compile.
    pub fn new(config: AnalysisConfig) -> RtlfpResult<Self> {
        let visibility = ArchVisibility::compile(&config.arch_visible_rules)?;
        Ok(FingerprintCompiler {
            config,
            visibility,
            extractor: PatternExtractor::new(),
            planner: QueryPlanner::default(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn build_graph(
        &self,
        frontend: &dyn Frontend,
    ) -> RtlfpResult<(DependencyGraph, BuildReport, AnnotationSummary)> {
        let events = frontend.design_events()?;
        let (mut graph, report) = GraphBuilder::new(self.config.workers).build_with_report(&events);
        let annotation = annotate(&mut graph, &self.visibility);
        tracing::debug!("{}", render_module_edge_stats(&graph, DEBUG_EDGE_MODULE));
        Ok((graph, report, annotation))
    }

    /// Select candidates by the configured globs and run their recognizers.
    pub fn extract(&self, signals: &[DesignSignal]) -> Vec<Fingerprint> {
        let targets = TargetSelector::new(&self.config.signal_patterns).select_targets(signals);
        self.extractor.extract_all(&targets)
    }

    pub fn run_presets(&self, graph: &DependencyGraph) -> Vec<PresetOutcome> {
        let engine = QueryEngine::new(graph).with_policy(self.config.path_policy);
        PresetQuery::ALL
            .into_iter()
            .map(|preset| {
                let (paths, cache) = self.planner.run_preset(&engine, preset);
                tracing::info!(
                    "Preset {}: {} paths ({})",
                    preset.name(),
                    paths.len(),
                    cache.as_str()
                );
                PresetOutcome {
                    preset,
                    paths: paths.len(),
                    cache,
                    rendered: engine.render_paths(&paths, PRESET_QUERY_PATHS),
                }
            })
            .collect()
    }

    /// Path query between two predicates under the configured limits and
    /// policy.
    pub fn query(
        &self,
        graph: &DependencyGraph,
        source_pred: impl Fn(&Node) -> bool,
        target_pred: impl Fn(&Node) -> bool,
    ) -> (Vec<NodePath>, String) {
        let engine = QueryEngine::new(graph).with_policy(self.config.path_policy);
        let paths = engine.query_custom(source_pred, target_pred, self.config.limits);
        let rendered = engine.render_paths(&paths, MAX_RENDERED_PATHS);
        (paths, rendered)
    }

    pub fn run(&self, frontend: &dyn Frontend) -> RtlfpResult<CompileOutput> {
        let started = Instant::now();
        tracing::info!("Compiling fingerprints from frontend '{}'", frontend.name());

        let (graph, build, annotation) = self.build_graph(frontend)?;
        let presets = self.run_presets(&graph);

        let signals = frontend.signals()?;
        let fingerprints = self.extract(&signals);
        let synthesis = ConstraintSynthesizer::new().synthesize(&fingerprints);

        tracing::info!(
            "Compile finished in {:.1}ms: {}, {} fingerprints",
            started.elapsed().as_secs_f64() * 1000.0,
            graph.summary(),
            fingerprints.len()
        );
        Ok(CompileOutput {
            graph,
            build,
            annotation,
            fingerprints,
            synthesis,
            presets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleKind, VisibilityRule};
    use crate::errors::RtlfpError;
    use crate::expr::Expr;
    use crate::indexer::frontend::{ToyFrontend, TOY_DCACHE_PATH, TOY_MSHRS_PATH};
    use crate::models::{Dependency, DesignEvents, FingerprintType, ModuleEvents};
    use crate::query::engine::{pred_hier_contains, PathPolicy};

    #[test]
    fn test_toy_end_to_end() {
        let compiler = FingerprintCompiler::new(AnalysisConfig::default()).unwrap();
        let out = compiler.run(&ToyFrontend).unwrap();

        let types: Vec<FingerprintType> = out.fingerprints.iter().map(|f| f.ftype()).collect();
        assert_eq!(types, vec![FingerprintType::Mapping, FingerprintType::Queue]);
        assert_eq!(out.fingerprints[0].path(), TOY_DCACHE_PATH);
        assert_eq!(out.fingerprints[1].path(), TOY_MSHRS_PATH);

        let headers = out
            .synthesis
            .smt_lines
            .iter()
            .filter(|l| l.starts_with("; Mapping constraints"))
            .count();
        assert_eq!(headers, 1);
        assert_eq!(out.synthesis.mapping_count(), 1);
        assert_eq!(out.synthesis.queue_count(), 1);
        assert_eq!(out.synthesis.witnesses.len(), 2);

        assert!(out.graph.node_count() > 0);
        assert_eq!(out.build.nodes, out.graph.node_count());
        assert_eq!(out.presets.len(), 2);
    }

    #[test]
    fn test_presets_cached_per_graph() {
        let compiler = FingerprintCompiler::new(AnalysisConfig::default()).unwrap();
        let (graph, _, _) = compiler.build_graph(&ToyFrontend).unwrap();
        let first = compiler.run_presets(&graph);
        let second = compiler.run_presets(&graph);
        assert!(first.iter().all(|p| p.cache == CacheMode::Miss));
        assert!(second.iter().all(|p| p.cache == CacheMode::Hit));

        // An identical rebuild is a different graph and is queried afresh.
        let rebuilt = compiler.run(&ToyFrontend).unwrap();
        assert!(rebuilt.presets.iter().all(|p| p.cache == CacheMode::Miss));
        assert_eq!(compiler.planner().stats().hits, 2);
    }

    /// Two one-edge modules with the same node names; only `forward` flows
    /// from MSHR metadata into commit.
    struct TwoNodeDesign {
        forward: bool,
    }

    impl Frontend for TwoNodeDesign {
        fn name(&self) -> &str {
            "two_node"
        }

        fn signals(&self) -> RtlfpResult<Vec<DesignSignal>> {
            Ok(Vec::new())
        }

        fn design_events(&self) -> RtlfpResult<DesignEvents> {
            let (src, dst) = if self.forward {
                ("work@MSHR.meta_tag", "work@Rob.io_commit_valid")
            } else {
                ("work@Rob.io_commit_valid", "work@MSHR.meta_tag")
            };
            Ok(DesignEvents {
                modules: vec![ModuleEvents {
                    module_path: "work@Top".to_string(),
                    dependencies: vec![Dependency {
                        dst: dst.to_string(),
                        expr: Expr::id(src),
                        is_seq: false,
                        clock: None,
                        cond: None,
                        src_loc: None,
                    }],
                    ..ModuleEvents::default()
                }],
            })
        }
    }

    #[test]
    fn test_equal_shaped_designs_do_not_share_paths() {
        let compiler = FingerprintCompiler::new(AnalysisConfig::default()).unwrap();
        let forward = compiler.run(&TwoNodeDesign { forward: true }).unwrap();
        let reversed = compiler.run(&TwoNodeDesign { forward: false }).unwrap();
        assert_eq!(forward.graph.version(), reversed.graph.version());

        let mshr = |out: &CompileOutput| {
            out.presets
                .iter()
                .find(|p| p.preset == PresetQuery::MshrToRobCommit)
                .map(|p| (p.paths, p.cache))
                .unwrap()
        };
        assert_eq!(mshr(&forward), (1, CacheMode::Miss));
        assert_eq!(mshr(&reversed), (0, CacheMode::Miss));
    }

    #[test]
    fn test_invalid_rule_is_config_error() {
        let config = AnalysisConfig {
            arch_visible_rules: vec![VisibilityRule::new(RuleKind::Regex, "(")],
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            FingerprintCompiler::new(config),
            Err(RtlfpError::Config(_))
        ));
    }

    #[test]
    fn test_custom_query_uses_config() {
        let config = AnalysisConfig {
            path_policy: PathPolicy::PerSource,
            ..AnalysisConfig::default()
        };
        let compiler = FingerprintCompiler::new(config).unwrap();
        let (graph, _, _) = compiler.build_graph(&ToyFrontend).unwrap();
        let (paths, rendered) = compiler.query(
            &graph,
            pred_hier_contains(".va"),
            pred_hier_contains("dcache_set_idx"),
        );
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 2);
        assert!(rendered.starts_with("[1] (2 nodes)"));
    }

    #[test]
    fn test_write_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = FingerprintCompiler::new(AnalysisConfig::default()).unwrap();
        let out = compiler.run(&ToyFrontend).unwrap();
        let written = out.write_artifacts(&dir.path().join("toy")).unwrap();
        assert_eq!(written.len(), 4);

        let csv = std::fs::read_to_string(dir.path().join("toy.witness.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("fp_type,path,params"));
        assert!(lines.next().unwrap().starts_with("Mapping,"));
        assert!(lines.next().unwrap().starts_with("Queue,"));
    }
}
