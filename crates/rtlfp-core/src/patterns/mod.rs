//! Mechanism recognizers and their dispatch.
//!
//! Each recognizer is a pure function of a signal and its driving
//! expression. A recognizer that is not sure returns `None`; fingerprints are
//! never produced from partial evidence.

pub mod arbiter;
pub mod mapping;
pub mod prediction;
pub mod queue;
pub mod targets;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::models::{DesignSignal, Fingerprint};

use self::arbiter::ArbiterPattern;
use self::mapping::MappingPattern;
use self::prediction::PredictionPattern;
use self::queue::QueuePattern;
use self::targets::TargetSet;

pub trait PatternRecognizer: Send + Sync {
    fn mechanism(&self) -> Mechanism;

    fn extract(&self, signal: &DesignSignal, expr: &Expr) -> Option<Fingerprint>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    Mapping,
    Queue,
    Prediction,
    Arbiter,
}

impl Mechanism {
    pub const ALL: [Mechanism; 4] = [
        Mechanism::Mapping,
        Mechanism::Queue,
        Mechanism::Prediction,
        Mechanism::Arbiter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mechanism::Mapping => "mapping",
            Mechanism::Queue => "queue",
            Mechanism::Prediction => "prediction",
            Mechanism::Arbiter => "arbiter",
        }
    }

    /// Parse a configuration tag. Unknown tags are `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        Mechanism::ALL.into_iter().find(|m| m.as_str() == tag)
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone)]
pub struct PatternExtractor {
    mapping: MappingPattern,
    queue: QueuePattern,
    prediction: PredictionPattern,
    arbiter: ArbiterPattern,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recognizer(&self, mech: Mechanism) -> &dyn PatternRecognizer {
        match mech {
            Mechanism::Mapping => &self.mapping,
            Mechanism::Queue => &self.queue,
            Mechanism::Prediction => &self.prediction,
            Mechanism::Arbiter => &self.arbiter,
        }
    }

    pub fn extract(&self, mech: Mechanism, signal: &DesignSignal) -> Option<Fingerprint> {
        let expr = signal.expression.as_ref()?;
        self.recognizer(mech).extract(signal, expr)
    }

    /// Dispatch on a configuration tag.
    pub fn extract_for_mech(&self, mech: &str, signal: &DesignSignal) -> Option<Fingerprint> {
        match Mechanism::parse(mech) {
            Some(mech) => self.extract(mech, signal),
            None => {
                tracing::debug!("Unknown mechanism tag '{mech}', skipping {}", signal.name);
                None
            }
        }
    }

    /// Run every selected signal through its mechanism, in selection order.
    pub fn extract_all(&self, targets: &TargetSet<'_>) -> Vec<Fingerprint> {
        let mut fingerprints = Vec::new();
        for (mech, signals) in targets {
            for signal in signals {
                if let Some(fp) = self.extract_for_mech(mech, signal) {
                    fingerprints.push(fp);
                }
            }
        }
        tracing::info!("Extracted {} fingerprints", fingerprints.len());
        fingerprints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::frontend::{Frontend, ToyFrontend};
    use crate::models::FingerprintType;
    use crate::patterns::targets::TargetSelector;
    use indexmap::IndexMap;

    #[test]
    fn test_mechanism_parse() {
        assert_eq!(Mechanism::parse("queue"), Some(Mechanism::Queue));
        assert_eq!(Mechanism::parse("Queue"), None);
        assert_eq!(Mechanism::parse("cache"), None);
        assert_eq!(Mechanism::Arbiter.to_string(), "arbiter");
    }

    #[test]
    fn test_dispatch_declines_without_evidence() {
        let extractor = PatternExtractor::new();
        let with_expr = DesignSignal::new("x", "top", Some(ToyFrontend::mshr_full_expr()));
        let without = DesignSignal::new("x", "top", None);
        assert!(extractor.extract_for_mech("queue", &with_expr).is_some());
        assert!(extractor.extract_for_mech("queue", &without).is_none());
        assert!(extractor.extract_for_mech("prediction", &with_expr).is_none());
        assert!(extractor.extract_for_mech("arbiter", &with_expr).is_none());
        assert!(extractor.extract_for_mech("nonsense", &with_expr).is_none());
        // The set-index expression is not a queue.
        let set_idx = DesignSignal::new("x", "top", Some(ToyFrontend::set_index_expr()));
        assert!(extractor.extract_for_mech("queue", &set_idx).is_none());
    }

    #[test]
    fn test_toy_extraction() {
        let signals = ToyFrontend.signals().unwrap();
        let mut patterns = IndexMap::new();
        patterns.insert("mapping".to_string(), vec!["*set_idx*".to_string()]);
        patterns.insert("queue".to_string(), vec!["*mshr_full*".to_string()]);
        let targets = TargetSelector::new(&patterns).select_targets(&signals);
        let fps = PatternExtractor::new().extract_all(&targets);
        let types: Vec<FingerprintType> = fps.iter().map(|f| f.ftype()).collect();
        assert_eq!(types, vec![FingerprintType::Mapping, FingerprintType::Queue]);
    }
}
