//! Cache/TLB set-index recognition.
//!
//! Collects, per address base, the bit positions that feed an index
//! expression through linear operators only, then reads line size and set
//! count off the contributing range.

use std::collections::{BTreeSet, HashMap};

use crate::expr::{Expr, Index};
use crate::models::{DesignSignal, Evidence, Fingerprint, MappingAttrs};

use super::{Mechanism, PatternRecognizer};

/// Address bases in priority order.
pub const ADDR_BASE_PRIORITY: [&str; 3] = ["va", "addr", "paddr"];

const CONF_DIRECT: f64 = 0.85;
const CONF_XOR_FOLDED: f64 = 0.9;
const MAPPING_IMPACT: f64 = 0.7;

/// Highest address bit position considered.
const MAX_ADDR_BIT: u32 = 63;

/// A non-linear operator, or a bit position outside a 64-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Unsupported;

type BitsByBase<'e> = HashMap<&'e str, BTreeSet<u32>>;

fn visit<'e>(expr: &'e Expr, bits: &mut BitsByBase<'e>) -> Result<(), Unsupported> {
    match expr {
        Expr::Const(_) => Ok(()),
        Expr::Bit {
            base,
            index: Index::Const(i),
        } if *i <= MAX_ADDR_BIT => {
            bits.entry(base.as_str()).or_default().insert(*i);
            Ok(())
        }
        Expr::Slice {
            base,
            hi: Index::Const(hi),
            lo: Index::Const(lo),
        } if (*lo).max(*hi) <= MAX_ADDR_BIT => {
            let (lo, hi) = ((*lo).min(*hi), (*lo).max(*hi));
            bits.entry(base.as_str()).or_default().extend(lo..=hi);
            Ok(())
        }
        Expr::Xor(items) | Expr::Concat(items) => {
            items.iter().try_for_each(|item| visit(item, bits))
        }
        Expr::Replicate { value, .. } => visit(value, bits),
        // An offset added to an address does not change which bits index.
        Expr::Add(lhs, rhs) | Expr::Sub(lhs, rhs) => {
            visit(lhs, bits)?;
            visit(rhs, bits)
        }
        _ => Err(Unsupported),
    }
}

fn collect_linear_bits(expr: &Expr) -> Option<BitsByBase<'_>> {
    let mut bits = BitsByBase::new();
    visit(expr, &mut bits).ok()?;
    Some(bits)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MappingPattern;

impl MappingPattern {
    pub fn attrs_for(expr: &Expr) -> Option<MappingAttrs> {
        let Some(by_base) = collect_linear_bits(expr) else {
            tracing::debug!("Mapping: unsupported index expression {}", expr.op_name());
            return None;
        };
        let (base, bits) = ADDR_BASE_PRIORITY
            .iter()
            .find_map(|b| by_base.get(b).map(|bits| (*b, bits)))?;
        let lo = *bits.first()?;
        let hi = *bits.last()?;

        let line_size = 1u64.checked_shl(lo)?;
        let sets = 1u64.checked_shl((hi - lo).checked_add(1)?)?;
        let index_bits: Vec<u32> = (lo..=hi).collect();
        let xor_bits: Vec<u32> = bits
            .iter()
            .copied()
            .filter(|b| *b < lo || *b > hi)
            .collect();

        Some(MappingAttrs {
            line_size,
            sets,
            index_bits,
            xor_bits,
            addr_base: base.to_string(),
            ways: 1,
            repl: "unknown".to_string(),
        })
    }
}

impl PatternRecognizer for MappingPattern {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Mapping
    }

    fn extract(&self, signal: &DesignSignal, expr: &Expr) -> Option<Fingerprint> {
        let attrs = Self::attrs_for(expr)?;
        let conf = if attrs.xor_bits.is_empty() {
            CONF_DIRECT
        } else {
            CONF_XOR_FOLDED
        };
        Some(Fingerprint::new(
            &signal.module_path,
            Evidence::Mapping(attrs),
            conf,
            MAPPING_IMPACT,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::frontend::ToyFrontend;
    use crate::models::FingerprintType;

    fn signal() -> DesignSignal {
        DesignSignal::new("dcache_set_idx", "top.dcache", None)
    }

    #[test]
    fn test_toy_set_index() {
        let fp = MappingPattern
            .extract(&signal(), &ToyFrontend::set_index_expr())
            .unwrap();
        assert_eq!(fp.ftype(), FingerprintType::Mapping);
        assert_eq!(fp.path(), "top.dcache");
        assert_eq!(fp.conf(), 0.85);
        assert_eq!(fp.impact(), 0.7);
        let Evidence::Mapping(attrs) = fp.evidence() else {
            panic!("expected mapping evidence");
        };
        assert_eq!(attrs.line_size, 64);
        assert_eq!(attrs.sets, 64);
        assert_eq!(attrs.index_bits, vec![6, 7, 8, 9, 10, 11]);
        assert!(attrs.xor_bits.is_empty());
        assert_eq!(attrs.addr_base, "va");
        assert_eq!(attrs.ways, 1);
        assert_eq!(attrs.repl, "unknown");
    }

    #[test]
    fn test_base_priority() {
        let expr = Expr::Concat(vec![Expr::slice("paddr", 13, 12), Expr::slice("addr", 9, 6)]);
        let attrs = MappingPattern::attrs_for(&expr).unwrap();
        assert_eq!(attrs.addr_base, "addr");
        assert_eq!(attrs.line_size, 64);
        assert_eq!(attrs.sets, 16);
    }

    #[test]
    fn test_offset_addition_is_linear() {
        let expr = Expr::binary(Expr::Add, Expr::slice("va", 12, 6), Expr::constant(1));
        let attrs = MappingPattern::attrs_for(&expr).unwrap();
        assert_eq!(attrs.index_bits, (6..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_unknown_base_declines() {
        let expr = Expr::slice("pc", 11, 6);
        assert!(MappingPattern.extract(&signal(), &expr).is_none());
    }

    #[test]
    fn test_non_linear_rejected_anywhere() {
        let cases = vec![
            Expr::Xor(vec![
                Expr::slice("va", 11, 6),
                Expr::binary(Expr::Mul, Expr::bit("va", 3), Expr::constant(3)),
            ]),
            Expr::Xor(vec![
                Expr::slice("va", 11, 6),
                Expr::cond(Expr::id("sel"), Expr::bit("va", 12), Expr::bit("va", 13)),
            ]),
            Expr::Concat(vec![Expr::slice("va", 11, 6), Expr::bit("va", Expr::id("i"))]),
            Expr::binary(Expr::Shl, Expr::slice("va", 11, 6), Expr::id("amt")),
            Expr::id("va"),
        ];
        for expr in cases {
            assert!(
                MappingPattern.extract(&signal(), &expr).is_none(),
                "accepted {expr}"
            );
        }
    }

    #[test]
    fn test_oversized_range_declines() {
        let expr = Expr::Xor(vec![Expr::bit("va", 0), Expr::bit("va", 70)]);
        assert!(MappingPattern::attrs_for(&expr).is_none());
    }
}
