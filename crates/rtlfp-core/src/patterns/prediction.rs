//! Branch-predictor index derivation. Not recognized yet; always declines.

use crate::expr::Expr;
use crate::models::{DesignSignal, Fingerprint};

use super::{Mechanism, PatternRecognizer};

#[derive(Debug, Default, Clone, Copy)]
pub struct PredictionPattern;

impl PatternRecognizer for PredictionPattern {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Prediction
    }

    // TODO: recognize `pht_index = pc ^ ghist` folds and report history length.
    fn extract(&self, _signal: &DesignSignal, _expr: &Expr) -> Option<Fingerprint> {
        None
    }
}
