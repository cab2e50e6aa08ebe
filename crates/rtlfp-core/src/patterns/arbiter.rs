//! Round-robin and fixed-priority arbitration. Not recognized yet; always
//! declines.

use crate::expr::Expr;
use crate::models::{DesignSignal, Fingerprint};

use super::{Mechanism, PatternRecognizer};

#[derive(Debug, Default, Clone, Copy)]
pub struct ArbiterPattern;

impl PatternRecognizer for ArbiterPattern {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Arbiter
    }

    fn extract(&self, _signal: &DesignSignal, _expr: &Expr) -> Option<Fingerprint> {
        None
    }
}
