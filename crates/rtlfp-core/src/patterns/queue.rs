//! Resource-queue capacity recognition for `full = (counter == N)` flags.

use crate::expr::Expr;
use crate::models::{DesignSignal, Evidence, Fingerprint, QueueAttrs};

use super::{Mechanism, PatternRecognizer};

/// The only occupancy counter name recognized.
pub const QUEUE_COUNTER: &str = "mshr_used";

const QUEUE_CONF: f64 = 0.95;
const QUEUE_IMPACT: f64 = 0.6;

#[derive(Debug, Default, Clone, Copy)]
pub struct QueuePattern;

impl QueuePattern {
    pub fn attrs_for(expr: &Expr) -> Option<QueueAttrs> {
        let Expr::Eq(lhs, rhs) = expr else {
            return None;
        };
        match (lhs.as_ref(), rhs.as_ref()) {
            (Expr::Id(counter), Expr::Const(cap)) if counter == QUEUE_COUNTER => {
                Some(QueueAttrs {
                    cap: *cap,
                    hwm: cap.checked_sub(1)?,
                    counter: QUEUE_COUNTER.to_string(),
                })
            }
            _ => None,
        }
    }
}

impl PatternRecognizer for QueuePattern {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Queue
    }

    fn extract(&self, signal: &DesignSignal, expr: &Expr) -> Option<Fingerprint> {
        let attrs = Self::attrs_for(expr)?;
        Some(Fingerprint::new(
            &signal.module_path,
            Evidence::Queue(attrs),
            QUEUE_CONF,
            QUEUE_IMPACT,
        ))
    }
}
