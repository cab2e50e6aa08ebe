//! Constraint skeletons, parameter domains and witnesses from fingerprints.

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::models::{
    AttrMap, Evidence, Fingerprint, FingerprintType, MappingAttrs, QueueAttrs, Witness,
};

/// Base of the deterministic probe address pair.
pub const PROBE_BASE: u64 = 0x8000_0000;

/// mechanism -> path -> parameters.
pub type ParamsDoc = IndexMap<String, IndexMap<String, Value>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesis {
    pub smt_lines: Vec<String>,
    pub params: ParamsDoc,
    pub witnesses: Vec<Witness>,
}

impl Synthesis {
    pub fn mapping_count(&self) -> usize {
        self.params.get("mapping").map_or(0, |m| m.len())
    }

    pub fn queue_count(&self) -> usize {
        self.params.get("queue").map_or(0, |m| m.len())
    }
}

/// `"[hi:lo]"` over the index bits, `"[]"` when there are none.
pub fn index_range(index_bits: &[u32]) -> String {
    match (index_bits.iter().min(), index_bits.iter().max()) {
        (Some(lo), Some(hi)) => format!("[{hi}:{lo}]"),
        _ => "[]".to_string(),
    }
}

/// Two addresses sharing line alignment and every contributing index bit:
/// the second differs only above the highest contributing bit.
pub fn probe_pair(attrs: &MappingAttrs) -> (u64, u64) {
    let top = attrs
        .index_bits
        .iter()
        .chain(attrs.xor_bits.iter())
        .copied()
        .max();
    let addr1 = top
        .and_then(|t| 1u64.checked_shl(t + 1))
        .and_then(|stride| PROBE_BASE.checked_add(stride))
        .unwrap_or(PROBE_BASE);
    (PROBE_BASE, addr1)
}

fn bv64(value: u64) -> String {
    format!("#x{value:016x}")
}

fn format_bits(bits: &[u32]) -> String {
    let items: Vec<String> = bits.iter().map(|b| b.to_string()).collect();
    format!("[{}]", items.join(", "))
}

#[derive(Debug, Default)]
pub struct ConstraintSynthesizer {
    out: Synthesis,
    mapping_ordinal: usize,
}

impl ConstraintSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `fingerprints` in order. Types without a rule are skipped.
    pub fn synthesize(mut self, fingerprints: &[Fingerprint]) -> Synthesis {
        for fp in fingerprints {
            match fp.evidence() {
                Evidence::Mapping(attrs) => self.add_mapping(fp.path(), attrs),
                Evidence::Queue(attrs) => self.add_queue(fp.path(), attrs),
                Evidence::Prediction(_) | Evidence::Arbiter(_) => {
                    tracing::debug!("No constraint rule for {} at {}", fp.ftype(), fp.path());
                }
            }
        }
        tracing::info!(
            "Synthesized {} constraint lines, {} witnesses",
            self.out.smt_lines.len(),
            self.out.witnesses.len()
        );
        self.out
    }

    /// Insert under `mech`, suffixing `#<n>` when the path is already taken.
    /// Only the params document carries the suffix; witnesses keep the
    /// fingerprint path.
    fn insert_params(&mut self, mech: &str, path: &str, value: Value) {
        let section = self.out.params.entry(mech.to_string()).or_default();
        let mut key = path.to_string();
        let mut n = 2;
        while section.contains_key(&key) {
            key = format!("{path}#{n}");
            n += 1;
        }
        section.insert(key, value);
    }

    fn add_mapping(&mut self, path: &str, attrs: &MappingAttrs) {
        let k = self.mapping_ordinal;
        self.mapping_ordinal += 1;
        let (a0, a1) = (format!("A0_{k}"), format!("A1_{k}"));
        let mask = bv64(attrs.line_size.saturating_sub(1));
        let zero = bv64(0);

        self.out.smt_lines.extend([
            format!("; Mapping constraints for {path}"),
            format!(
                "; addr_base = {}, index_bits = {}, xor_bits = {}",
                attrs.addr_base,
                format_bits(&attrs.index_bits),
                format_bits(&attrs.xor_bits)
            ),
            format!("(declare-fun {a0} () (_ BitVec 64))"),
            format!("(declare-fun {a1} () (_ BitVec 64))"),
            format!("(assert (= (bvand {a0} {mask}) {zero}))"),
            format!("(assert (= (bvand {a1} {mask}) {zero}))"),
            format!("; TODO: add set_idx({a0}) == set_idx({a1}) constraint using index_bits/xor_bits"),
        ]);

        let (addr0, addr1) = probe_pair(attrs);
        self.insert_params(
            "mapping",
            path,
            json!({
                "line_size": attrs.line_size,
                "sets": attrs.sets,
                "index_bits": attrs.index_bits,
                "index_range": index_range(&attrs.index_bits),
                "xor_bits": attrs.xor_bits,
                "addr_base": attrs.addr_base,
                "probes": [{"addr0": addr0, "addr1": addr1}],
            }),
        );
        let mut params = AttrMap::new();
        params.insert("addr0".to_string(), json!(addr0));
        params.insert("addr1".to_string(), json!(addr1));
        self.out.witnesses.push(Witness {
            fp_type: FingerprintType::Mapping,
            path: path.to_string(),
            params,
        });
    }

    fn add_queue(&mut self, path: &str, attrs: &QueueAttrs) {
        self.out.smt_lines.extend([
            format!("; Queue constraints for {path}"),
            format!("; cap = {}, hwm = {}", attrs.cap, attrs.hwm),
        ]);
        self.insert_params("queue", path, json!({"cap": attrs.cap, "hwm": attrs.hwm}));
        let mut params = AttrMap::new();
        params.insert("cap".to_string(), json!(attrs.cap));
        params.insert("hwm".to_string(), json!(attrs.hwm));
        self.out.witnesses.push(Witness {
            fp_type: FingerprintType::Queue,
            path: path.to_string(),
            params,
        });
    }
}
