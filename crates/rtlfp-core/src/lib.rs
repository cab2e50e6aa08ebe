//! Fingerprint core: micro-architectural fingerprints from RTL dependency
//! structure.
//!
//! A [`indexer::frontend::Frontend`] reports declarations, port bindings and
//! leaf assignments per module. The builder merges them into one signal-level
//! dependency graph, the annotator marks micro-state and architecturally
//! visible nodes, the query engine searches dependency paths between them,
//! and the pattern extractors recognize set-index mappings and queue
//! capacities, which the synthesizer turns into constraint skeletons,
//! parameter domains and witnesses.
//!
//! With the `python` feature the crate also builds as a Python extension
//! module (`rtlfp_core`).

pub mod config;
pub mod errors;
pub mod expr;
pub mod indexer;
pub mod models;
pub mod patterns;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod synth;

#[cfg(feature = "python")]
mod python;
