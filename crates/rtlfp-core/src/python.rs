//! PyO3 bindings. Results cross the boundary as JSON strings.

use std::path::Path;

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use crate::config::AnalysisConfig;
use crate::errors::RtlfpResult;
use crate::indexer::frontend::{Frontend, JsonEventFrontend, ToyFrontend};
use crate::pipeline::FingerprintCompiler;
use crate::query::guards;
use crate::store::dump::render_debug_dump;
use crate::synth::artifacts::render_fingerprints;

fn load_config(config_json: Option<&str>) -> RtlfpResult<AnalysisConfig> {
    match config_json {
        Some(raw) => AnalysisConfig::from_json_str(raw),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Events directory when given, the toy design otherwise.
fn make_frontend(events_dir: Option<&str>) -> Box<dyn Frontend> {
    match events_dir {
        Some(dir) => Box::new(JsonEventFrontend::new(dir)),
        None => Box::new(ToyFrontend),
    }
}

#[pyfunction]
#[pyo3(signature = (config_json=None, events_dir=None))]
pub fn extract_fingerprints(config_json: Option<&str>, events_dir: Option<&str>) -> PyResult<String> {
    let compiler = FingerprintCompiler::new(load_config(config_json)?)?;
    let frontend = make_frontend(events_dir);
    let fingerprints = compiler.extract(&frontend.signals()?);
    Ok(render_fingerprints(&fingerprints)?)
}

/// Run the full compile and write the artifacts under `prefix`. Returns the
/// written file paths.
#[pyfunction]
#[pyo3(signature = (prefix, config_json=None, events_dir=None))]
pub fn compile_artifacts(
    py: Python<'_>,
    prefix: &str,
    config_json: Option<&str>,
    events_dir: Option<&str>,
) -> PyResult<Vec<String>> {
    let config = load_config(config_json)?;
    let written = py.allow_threads(|| -> RtlfpResult<_> {
        let compiler = FingerprintCompiler::new(config)?;
        let output = compiler.run(make_frontend(events_dir).as_ref())?;
        output.write_artifacts(Path::new(prefix))
    })?;
    Ok(written
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect())
}

#[pyfunction]
#[pyo3(signature = (events_dir=None, workers=4))]
pub fn graph_dump(events_dir: Option<&str>, workers: usize) -> PyResult<String> {
    let config = AnalysisConfig {
        workers,
        ..AnalysisConfig::default()
    };
    let compiler = FingerprintCompiler::new(config)?;
    let (graph, _, _) = compiler.build_graph(make_frontend(events_dir).as_ref())?;
    Ok(render_debug_dump(&graph))
}

#[pymodule]
fn rtlfp_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("MAX_QUERY_DEPTH", guards::MAX_QUERY_DEPTH)?;
    m.add("MAX_QUERY_PATHS", guards::MAX_QUERY_PATHS)?;
    m.add("DEFAULT_QUERY_DEPTH", guards::DEFAULT_QUERY_DEPTH)?;

    m.add_function(wrap_pyfunction!(extract_fingerprints, m)?)?;
    m.add_function(wrap_pyfunction!(compile_artifacts, m)?)?;
    m.add_function(wrap_pyfunction!(graph_dump, m)?)?;
    Ok(())
}
