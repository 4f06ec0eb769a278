//! SV-001: Data model: vault config, script records, parameters, executable units.
//!
//! Everything that is persisted (vault.yaml, catalog.yaml) or shipped to a target
//! (ExecutableUnit, UnitResult) derives Serialize/Deserialize.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Reserved name of the master (local) node. Matched, never resolved.
pub const MASTER: &str = "master";

/// Alias for every known agent plus the master.
pub const ALL: &str = "all";

/// Alias for every known agent, master excluded.
pub const ALL_AGENTS: &str = "all agents";

/// Comment given to records adopted from disk without a metadata block.
pub const DISCOVERED_COMMENT: &str = "discovered in the script directory";

// ============================================================================
// vault.yaml
// ============================================================================

/// Root configuration of a script vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable vault name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Directory holding one body file per script, relative to the vault file
    #[serde(default = "default_script_dir")]
    pub script_dir: String,

    /// Catalog document path, relative to the vault file
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Extension adopted by the synchronizer when scanning for orphan bodies
    #[serde(default = "default_scan_extension")]
    pub scan_extension: String,

    /// Version-control mirror backing the script directory
    #[serde(default)]
    pub mirror: MirrorKind,

    /// Fleet membership (order-preserving)
    #[serde(default)]
    pub agents: IndexMap<String, Agent>,
}

fn default_script_dir() -> String {
    "scripts".to_string()
}

fn default_catalog() -> String {
    "catalog.yaml".to_string()
}

fn default_scan_extension() -> String {
    "rhai".to_string()
}

/// A registered agent node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Network address (IP or DNS)
    pub addr: String,

    /// SSH user
    #[serde(default = "default_user")]
    pub user: String,

    /// Path to SSH private key
    #[serde(default)]
    pub ssh_key: Option<String>,

    /// Offline agents stay listed but have no execution channel
    #[serde(default = "default_true")]
    pub online: bool,

    /// Command that runs the unit executor on the agent
    #[serde(default = "default_remote_command")]
    pub remote_command: String,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_true() -> bool {
    true
}

fn default_remote_command() -> String {
    "scriptvault exec-unit".to_string()
}

/// Which mirror records script directory changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorKind {
    #[default]
    Journal,
    Git,
    None,
}

// ============================================================================
// Scripts
// ============================================================================

/// Interpreter kind declared by a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpreter {
    /// Shell-style body; the first line may declare its own interpreter.
    Shebang,
    /// Embedded rhai engine.
    Engine,
    /// Body file vanished from the script directory.
    SourceMissing,
}

impl Interpreter {
    /// Parse a user- or metadata-supplied interpreter name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "shebang" | "shell" => Some(Self::Shebang),
            "engine" | "rhai" => Some(Self::Engine),
            "source_missing" => Some(Self::SourceMissing),
            _ => None,
        }
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shebang => write!(f, "shebang"),
            Self::Engine => write!(f, "engine"),
            Self::SourceMissing => write!(f, "source_missing"),
        }
    }
}

/// One named run parameter. Declared parameters usually carry no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Parse `NAME=VALUE`; a bare `NAME` yields a null value.
    pub fn parse_assignment(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((name, value)) => Self::new(name.trim(), Some(value.to_string())),
            None => Self::new(raw.trim(), None),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value.as_deref().unwrap_or(""))
    }
}

/// Ordered parameters bound to a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(Vec<Parameter>);

impl ParameterSet {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self(params)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.0.iter()
    }

    /// Lookup map; when names repeat, the last value wins.
    pub fn to_map(&self) -> IndexMap<String, Option<String>> {
        let mut map = IndexMap::new();
        for p in &self.0 {
            map.insert(p.name.clone(), p.value.clone());
        }
        map
    }
}

/// Where an imported script came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub catalog: String,
    pub id: String,
    #[serde(default)]
    pub imported_at: Option<String>,
}

/// Declaration kept aside while a script's body is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorDeclaration {
    pub display_name: String,
    pub interpreter: Interpreter,
    pub non_administer_executable: bool,
    pub restricted_to_master: bool,
    #[serde(default)]
    pub declared_parameters: Vec<Parameter>,
    #[serde(default)]
    pub origin: Option<Origin>,
}

/// Catalog entry for one stored script. `id` is also its file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub comment: String,
    pub interpreter: Interpreter,
    #[serde(default)]
    pub non_administer_executable: bool,
    #[serde(default)]
    pub restricted_to_master: bool,
    #[serde(default)]
    pub declared_parameters: Vec<Parameter>,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<Box<PriorDeclaration>>,
    /// Script source, loaded on request only.
    #[serde(skip)]
    pub body: Option<String>,
}

impl ScriptRecord {
    /// Available, unrestricted record with no declared parameters.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        interpreter: Interpreter,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            comment: comment.into(),
            interpreter,
            non_administer_executable: false,
            restricted_to_master: false,
            declared_parameters: Vec::new(),
            available: true,
            origin: None,
            prior: None,
            body: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        !self.available && self.interpreter == Interpreter::SourceMissing
    }

    /// Unavailable placeholder with the same id and comment. The current
    /// declaration moves into `prior`.
    pub fn to_missing_placeholder(&self) -> Self {
        let prior = PriorDeclaration {
            display_name: self.display_name.clone(),
            interpreter: self.interpreter,
            non_administer_executable: self.non_administer_executable,
            restricted_to_master: self.restricted_to_master,
            declared_parameters: self.declared_parameters.clone(),
            origin: self.origin.clone(),
        };
        Self {
            id: self.id.clone(),
            display_name: self.id.clone(),
            comment: self.comment.clone(),
            interpreter: Interpreter::SourceMissing,
            non_administer_executable: false,
            restricted_to_master: false,
            declared_parameters: Vec::new(),
            available: false,
            origin: None,
            prior: Some(Box::new(prior)),
            body: None,
        }
    }

    /// Mark available again, restoring a stashed declaration if there is one.
    pub fn restore_available(&mut self) {
        if let Some(prior) = self.prior.take() {
            let prior = *prior;
            self.display_name = prior.display_name;
            self.interpreter = prior.interpreter;
            self.non_administer_executable = prior.non_administer_executable;
            self.restricted_to_master = prior.restricted_to_master;
            self.declared_parameters = prior.declared_parameters;
            self.origin = prior.origin;
        }
        self.available = true;
    }
}

/// The catalog document: script metadata keyed by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: String,
    #[serde(default)]
    pub scripts: IndexMap<String, ScriptRecord>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            scripts: IndexMap::new(),
        }
    }
}

// ============================================================================
// Embedded metadata
// ============================================================================

/// Contents of a `BEGIN META ... END META` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

// ============================================================================
// Executable units
// ============================================================================

/// Build/launcher context a caller may attach to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    pub name: String,
    pub number: u64,
    #[serde(default)]
    pub workspace: Option<PathBuf>,
}

/// How a unit is executed on its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// External process chosen from the body's shebang line.
    Shell,
    /// In-process rhai evaluation. `master_context` binds build/launcher handles.
    Engine { master_context: bool },
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell => write!(f, "shell"),
            Self::Engine { master_context: true } => write!(f, "engine(master)"),
            Self::Engine { master_context: false } => write!(f, "engine"),
        }
    }
}

/// One run's payload: body, parameters, and strategy. Shipped to targets as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableUnit {
    pub script_id: String,
    pub strategy: Strategy,
    pub master_only: bool,
    pub body: String,
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default)]
    pub build: Option<BuildContext>,
}

/// What a target reports back after running a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitResult {
    /// Shell: exit status was zero. Engine: evaluation finished without error.
    pub success: bool,
    /// Everything the strategy wrote to its output sink.
    pub output: String,
    /// Engine return value, rendered as text.
    #[serde(default)]
    pub value: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
