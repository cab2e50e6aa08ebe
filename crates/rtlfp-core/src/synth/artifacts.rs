//! Rendering of the persisted artifacts and writing them under a prefix.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::RtlfpResult;
use crate::models::{Fingerprint, Witness};
use crate::synth::constraints::Synthesis;

#[derive(Serialize)]
struct FingerprintsDoc<'a> {
    fingerprints: &'a [Fingerprint],
}

pub fn render_fingerprints(fingerprints: &[Fingerprint]) -> RtlfpResult<String> {
    Ok(serde_json::to_string_pretty(&FingerprintsDoc { fingerprints })?)
}

pub fn render_constraints(synthesis: &Synthesis) -> String {
    synthesis.smt_lines.join("\n")
}

pub fn render_params(synthesis: &Synthesis) -> RtlfpResult<String> {
    Ok(serde_json::to_string_pretty(&synthesis.params)?)
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// `fp_type,path,params` rows with `params` as compact JSON.
pub fn render_witness_csv(witnesses: &[Witness]) -> RtlfpResult<String> {
    let mut out = String::from("fp_type,path,params\n");
    for w in witnesses {
        let params = serde_json::to_string(&w.params)?;
        out.push_str(&format!(
            "{},{},{}\n",
            csv_field(w.fp_type.as_str()),
            csv_field(&w.path),
            csv_field(&params)
        ));
    }
    Ok(out)
}

/// Everything a compile run persists, already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    pub fingerprints_json: String,
    pub constraints: String,
    pub params_json: String,
    /// `None` when there are no witnesses; no table is written then.
    pub witness_csv: Option<String>,
}

impl ArtifactBundle {
    pub fn render(fingerprints: &[Fingerprint], synthesis: &Synthesis) -> RtlfpResult<Self> {
        let witness_csv = if synthesis.witnesses.is_empty() {
            None
        } else {
            Some(render_witness_csv(&synthesis.witnesses)?)
        };
        Ok(ArtifactBundle {
            fingerprints_json: render_fingerprints(fingerprints)?,
            constraints: render_constraints(synthesis),
            params_json: render_params(synthesis)?,
            witness_csv,
        })
    }

    /// Write `<prefix>.fingerprints.json`, `.constraints.smt2`,
    /// `.params.json` and `.witness.csv`. Returns the written paths.
    pub fn write(&self, prefix: &Path) -> RtlfpResult<Vec<PathBuf>> {
        let with_suffix = |suffix: &str| {
            let mut name = prefix.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        let mut outputs = vec![
            (with_suffix(".fingerprints.json"), &self.fingerprints_json),
            (with_suffix(".constraints.smt2"), &self.constraints),
            (with_suffix(".params.json"), &self.params_json),
        ];
        if let Some(csv) = &self.witness_csv {
            outputs.push((with_suffix(".witness.csv"), csv));
        }

        let mut written = Vec::with_capacity(outputs.len());
        for (path, content) in outputs {
            fs::write(&path, content)?;
            written.push(path);
        }
        tracing::info!("Wrote {} artifacts under {}", written.len(), prefix.display());
        Ok(written)
    }
}
