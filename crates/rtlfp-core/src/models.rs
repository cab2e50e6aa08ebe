//! Shared typed models used across indexing, annotation, query, pattern and
//! synthesis layers.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Hierarchy separator inside a `hier_name`.
pub const HIER_SEPARATOR: char = '.';

/// Split `work@Rob.io_commit_valid` into (`work@Rob`, `io_commit_valid`).
/// A name without a separator has an empty module path.
pub fn split_hier_name(hier_name: &str) -> (&str, &str) {
    match hier_name.rfind(HIER_SEPARATOR) {
        Some(pos) => (&hier_name[..pos], &hier_name[pos + 1..]),
        None => ("", hier_name),
    }
}

// ---------------------------------------------------------------------------
// 1. Node identity and kind
// ---------------------------------------------------------------------------

/// Dense arena index of a graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Input,
    Output,
    Inout,
    Net,
    Reg,
    Logic,
    Memory,
    Internal,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::Inout => "inout",
            NodeKind::Net => "net",
            NodeKind::Reg => "reg",
            NodeKind::Logic => "logic",
            NodeKind::Memory => "memory",
            NodeKind::Internal => "internal",
        }
    }

    /// Kinds that can hold state across a clock edge.
    pub fn is_storage(self) -> bool {
        matches!(self, NodeKind::Reg | NodeKind::Logic | NodeKind::Memory)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// 2. Width
// ---------------------------------------------------------------------------

/// Where a width value came from. Variants are ordered weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidthSource {
    Unknown,
    Fallback,
    Inherited,
    Range,
    Typespec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Width {
    pub bits: Option<u32>,
    pub source: WidthSource,
}

impl Width {
    pub const fn unknown() -> Self {
        Width {
            bits: None,
            source: WidthSource::Unknown,
        }
    }

    /// One bit, at the weakest concrete rank.
    pub const fn fallback() -> Self {
        Width {
            bits: Some(1),
            source: WidthSource::Fallback,
        }
    }

    /// Concrete width from `source`. Zero is not a width and yields unknown.
    pub fn from_source(source: WidthSource, bits: u32) -> Self {
        if bits == 0 || source == WidthSource::Unknown {
            return Width::unknown();
        }
        Width {
            bits: Some(bits),
            source,
        }
    }

    pub fn typespec(bits: u32) -> Self {
        Width::from_source(WidthSource::Typespec, bits)
    }

    pub fn range(bits: u32) -> Self {
        Width::from_source(WidthSource::Range, bits)
    }

    pub fn inherited(bits: u32) -> Self {
        Width::from_source(WidthSource::Inherited, bits)
    }

    pub fn is_known(&self) -> bool {
        self.bits.is_some()
    }

    /// Whether `self` should replace `current` on a node.
    pub fn outranks(&self, current: &Width) -> bool {
        self.source > current.source
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bits {
            Some(bits) => write!(f, "{bits}"),
            None => f.write_str("unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Graph records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrcLoc {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SrcLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A signal in the dependency graph.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub hier_name: String,
    pub kind: NodeKind,
    pub width: Width,
    pub module_path: String,
    pub signal_name: String,
    /// Written by at least one sequential assignment.
    pub seq: bool,
    pub clock: Option<String>,
    pub is_arch_visible: bool,
    pub is_micro_state: bool,
}

impl Node {
    pub fn new(id: NodeId, hier_name: &str, kind: NodeKind, width: Width) -> Self {
        let (module_path, signal_name) = split_hier_name(hier_name);
        Node {
            id,
            hier_name: hier_name.to_string(),
            kind,
            width,
            module_path: module_path.to_string(),
            signal_name: signal_name.to_string(),
            seq: false,
            clock: None,
            is_arch_visible: false,
            is_micro_state: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Edge {
    pub src: NodeId,
    pub dst: NodeId,
    pub is_seq: bool,
    pub cond: Option<Expr>,
    pub src_loc: Option<SrcLoc>,
}

// ---------------------------------------------------------------------------
// 4. Frontend records
// ---------------------------------------------------------------------------

/// A named signal and the expression driving it, as selected for pattern
/// extraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignSignal {
    pub name: String,
    pub module_path: String,
    #[serde(default)]
    pub expression: Option<Expr>,
}

impl DesignSignal {
    pub fn new(name: &str, module_path: &str, expression: Option<Expr>) -> Self {
        DesignSignal {
            name: name.to_string(),
            module_path: module_path.to_string(),
            expression,
        }
    }

    pub fn hier_name(&self) -> String {
        if self.module_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}{HIER_SEPARATOR}{}", self.module_path, self.name)
        }
    }
}

/// One port, net, register or memory cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub hier_name: String,
    pub kind: NodeKind,
    /// Flattened width of the declared type (typedefs, packed structs).
    #[serde(default)]
    pub typespec_width: Option<u32>,
    /// Width from the declaration's own `[msb:lsb]` ranges.
    #[serde(default)]
    pub range_width: Option<u32>,
}

impl Declaration {
    /// Width from the strongest source the declaration itself carries.
    pub fn declared_width(&self) -> Width {
        match (self.typespec_width, self.range_width) {
            (Some(bits), _) if bits > 0 => Width::typespec(bits),
            (_, Some(bits)) if bits > 0 => Width::range(bits),
            _ => Width::unknown(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

/// Connection of a module port to the parent-side (`high_conn`) and
/// child-side (`low_conn`) signals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortBinding {
    pub port: String,
    pub direction: PortDirection,
    #[serde(default)]
    pub high_conn: Option<String>,
    #[serde(default)]
    pub low_conn: Option<String>,
}

/// One leaf assignment, continuous or procedural.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub dst: String,
    pub expr: Expr,
    #[serde(default)]
    pub is_seq: bool,
    #[serde(default)]
    pub clock: Option<String>,
    #[serde(default)]
    pub cond: Option<Expr>,
    #[serde(default)]
    pub src_loc: Option<SrcLoc>,
}

/// Everything a frontend reports for one module instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleEvents {
    pub module_path: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(default)]
    pub bindings: Vec<PortBinding>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignEvents {
    pub modules: Vec<ModuleEvents>,
}

// ---------------------------------------------------------------------------
// 5. Fingerprints and witnesses
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FingerprintType {
    Mapping,
    Queue,
    Prediction,
    Arbiter,
}

impl FingerprintType {
    pub fn as_str(self) -> &'static str {
        match self {
            FingerprintType::Mapping => "Mapping",
            FingerprintType::Queue => "Queue",
            FingerprintType::Prediction => "Prediction",
            FingerprintType::Arbiter => "Arbiter",
        }
    }
}

impl fmt::Display for FingerprintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type AttrMap = IndexMap<String, serde_json::Value>;

/// Cache/TLB set-index function recovered from an index expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingAttrs {
    pub line_size: u64,
    pub sets: u64,
    pub index_bits: Vec<u32>,
    pub xor_bits: Vec<u32>,
    pub addr_base: String,
    pub ways: u32,
    pub repl: String,
}

/// Resource queue capacity and the occupancy at which it reports full.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAttrs {
    pub cap: i64,
    pub hwm: i64,
    pub counter: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Evidence {
    Mapping(MappingAttrs),
    Queue(QueueAttrs),
    Prediction(AttrMap),
    Arbiter(AttrMap),
}

impl Evidence {
    pub fn ftype(&self) -> FingerprintType {
        match self {
            Evidence::Mapping(_) => FingerprintType::Mapping,
            Evidence::Queue(_) => FingerprintType::Queue,
            Evidence::Prediction(_) => FingerprintType::Prediction,
            Evidence::Arbiter(_) => FingerprintType::Arbiter,
        }
    }
}

/// A recognized mechanism instance. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct Fingerprint {
    path: String,
    evidence: Evidence,
    conf: f64,
    impact: f64,
}

impl Fingerprint {
    pub fn new(path: &str, evidence: Evidence, conf: f64, impact: f64) -> Self {
        Fingerprint {
            path: path.to_string(),
            evidence,
            conf: conf.clamp(0.0, 1.0),
            impact: impact.clamp(0.0, 1.0),
        }
    }

    pub fn ftype(&self) -> FingerprintType {
        self.evidence.ftype()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    pub fn conf(&self) -> f64 {
        self.conf
    }

    pub fn impact(&self) -> f64 {
        self.impact
    }
}

#[derive(Serialize)]
struct FingerprintRecord<'a> {
    #[serde(rename = "type")]
    ftype: FingerprintType,
    path: &'a str,
    conf: f64,
    impact: f64,
    attrs: &'a Evidence,
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FingerprintRecord {
            ftype: self.ftype(),
            path: &self.path,
            conf: self.conf,
            impact: self.impact,
            attrs: &self.evidence,
        }
        .serialize(serializer)
    }
}

/// Concrete example inputs demonstrating a fingerprint's behavior.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Witness {
    pub fp_type: FingerprintType,
    pub path: String,
    pub params: AttrMap,
}
