//! Frontends: sources of design signals and declaration/dependency events.
//!
//! Any type implementing [`Frontend`] can feed the graph builder and the
//! pattern extractors. Elaboration-tool-backed frontends live outside this
//! crate; the two implementations here are a fixed toy design and a reader
//! for pre-flattened JSON-lines event dumps.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::errors::{RtlfpError, RtlfpResult};
use crate::expr::Expr;
use crate::models::{
    split_hier_name, Declaration, Dependency, DesignEvents, DesignSignal, ModuleEvents,
    NodeKind, PortBinding,
};

pub trait Frontend {
    fn name(&self) -> &str;

    /// Named signals with their driving expressions.
    fn signals(&self) -> RtlfpResult<Vec<DesignSignal>>;

    /// Declaration, binding and dependency events grouped per module.
    fn design_events(&self) -> RtlfpResult<DesignEvents>;
}

// ---------------------------------------------------------------------------
// Toy frontend
// ---------------------------------------------------------------------------

pub const TOY_DCACHE_PATH: &str = "DigitalTop.tile_prci_domain.boom_tile.dcache";
pub const TOY_MSHRS_PATH: &str = "DigitalTop.tile_prci_domain.boom_tile.dcache.mshrs";

/// A two-signal design that exercises the whole pipeline:
///
/// ```text
/// dcache_set_idx   = va[11:6] ^ {6{va[7]}}
/// dcache_mshr_full = (mshr_used == 4)
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ToyFrontend;

impl ToyFrontend {
    pub fn set_index_expr() -> Expr {
        Expr::Xor(vec![
            Expr::slice("va", 11, 6),
            Expr::replicate(Expr::bit("va", 7), 6),
        ])
    }

    pub fn mshr_full_expr() -> Expr {
        Expr::binary(Expr::Eq, Expr::id("mshr_used"), Expr::constant(4))
    }
}

fn declare(module_path: &str, name: &str, kind: NodeKind, range_width: u32) -> Declaration {
    Declaration {
        hier_name: format!("{module_path}.{name}"),
        kind,
        typespec_width: None,
        range_width: Some(range_width),
    }
}

impl Frontend for ToyFrontend {
    fn name(&self) -> &str {
        "toy"
    }

    fn signals(&self) -> RtlfpResult<Vec<DesignSignal>> {
        Ok(vec![
            DesignSignal::new(
                "dcache_set_idx",
                TOY_DCACHE_PATH,
                Some(Self::set_index_expr()),
            ),
            DesignSignal::new(
                "dcache_mshr_full",
                TOY_MSHRS_PATH,
                Some(Self::mshr_full_expr()),
            ),
        ])
    }

    fn design_events(&self) -> RtlfpResult<DesignEvents> {
        let dcache = ModuleEvents {
            module_path: TOY_DCACHE_PATH.to_string(),
            declarations: vec![
                declare(TOY_DCACHE_PATH, "va", NodeKind::Input, 40),
                declare(TOY_DCACHE_PATH, "dcache_set_idx", NodeKind::Net, 6),
            ],
            bindings: Vec::new(),
            dependencies: vec![Dependency {
                dst: format!("{TOY_DCACHE_PATH}.dcache_set_idx"),
                expr: Self::set_index_expr(),
                is_seq: false,
                clock: None,
                cond: None,
                src_loc: None,
            }],
        };
        let mshrs = ModuleEvents {
            module_path: TOY_MSHRS_PATH.to_string(),
            declarations: vec![
                declare(TOY_MSHRS_PATH, "clock", NodeKind::Input, 1),
                declare(TOY_MSHRS_PATH, "mshr_used", NodeKind::Reg, 3),
                declare(TOY_MSHRS_PATH, "dcache_mshr_full", NodeKind::Output, 1),
            ],
            bindings: Vec::new(),
            dependencies: vec![
                Dependency {
                    dst: format!("{TOY_MSHRS_PATH}.dcache_mshr_full"),
                    expr: Self::mshr_full_expr(),
                    is_seq: false,
                    clock: None,
                    cond: None,
                    src_loc: None,
                },
                Dependency {
                    dst: format!("{TOY_MSHRS_PATH}.mshr_used"),
                    expr: Expr::binary(Expr::Add, Expr::id("mshr_used"), Expr::constant(1)),
                    is_seq: true,
                    clock: Some(format!("{TOY_MSHRS_PATH}.clock")),
                    cond: Some(Expr::id("io_req_valid")),
                    src_loc: None,
                },
            ],
        };
        Ok(DesignEvents {
            modules: vec![dcache, mshrs],
        })
    }
}

// ---------------------------------------------------------------------------
// JSON-lines event frontend
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventLine {
    Module { module_path: String },
    Declare(Declaration),
    Bind(PortBinding),
    Assign(Dependency),
}

/// Reads every `*.jsonl` file under a directory. Each file holds one module:
/// an optional leading `{"event": "module", "module_path": ...}` line (the
/// file stem is used otherwise) followed by `declare`, `bind` and `assign`
/// events, one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonEventFrontend {
    root: PathBuf,
}

impl JsonEventFrontend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonEventFrontend { root: root.into() }
    }

    fn event_files(&self) -> RtlfpResult<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(RtlfpError::frontend(
                self.root.display().to_string(),
                "event directory not found",
            ));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                RtlfpError::frontend(self.root.display().to_string(), e.to_string())
            })?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("jsonl")
            {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    fn load_module(path: &Path) -> RtlfpResult<ModuleEvents> {
        let content = fs::read_to_string(path)
            .map_err(|e| RtlfpError::frontend(path.display().to_string(), e.to_string()))?;
        let mut module = ModuleEvents {
            module_path: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..ModuleEvents::default()
        };
        for (lineno, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: EventLine = serde_json::from_str(trimmed).map_err(|e| {
                RtlfpError::frontend(format!("{}:{}", path.display(), lineno + 1), e.to_string())
            })?;
            match event {
                EventLine::Module { module_path } => module.module_path = module_path,
                EventLine::Declare(decl) => module.declarations.push(decl),
                EventLine::Bind(binding) => module.bindings.push(binding),
                EventLine::Assign(dep) => module.dependencies.push(dep),
            }
        }
        Ok(module)
    }
}

impl Frontend for JsonEventFrontend {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn signals(&self) -> RtlfpResult<Vec<DesignSignal>> {
        let events = self.design_events()?;
        let signals = events
            .modules
            .iter()
            .flat_map(|m| m.dependencies.iter())
            .map(|dep| {
                let (module_path, name) = split_hier_name(&dep.dst);
                DesignSignal::new(name, module_path, Some(dep.expr.clone()))
            })
            .collect::<Vec<_>>();
        tracing::info!("Frontend {}: extracted {} candidate signals", self.name(), signals.len());
        Ok(signals)
    }

    fn design_events(&self) -> RtlfpResult<DesignEvents> {
        let modules = self
            .event_files()?
            .iter()
            .map(|path| Self::load_module(path))
            .collect::<RtlfpResult<Vec<_>>>()?;
        tracing::debug!("Frontend {}: loaded {} module event files", self.name(), modules.len());
        Ok(DesignEvents { modules })
    }
}
