//! SV-003: vault.yaml parsing and validation.
//!
//! Parses vault.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Name, script_dir and catalog must not be empty
//! - Agent names must not shadow the reserved target names
//! - Every agent needs an address

use super::error::{Error, Result};
use super::types::*;
use std::path::{Path, PathBuf};

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a vault.yaml file from disk.
pub fn parse_vault_file(path: &Path) -> Result<VaultConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse_vault(&content)
}

/// Parse a vault.yaml from a string.
pub fn parse_vault(yaml: &str) -> Result<VaultConfig> {
    serde_yaml_ng::from_str(yaml).map_err(|e| Error::Config(format!("YAML parse error: {}", e)))
}

/// True if `name` is one of the reserved target names.
pub fn is_reserved_target(name: &str) -> bool {
    name == MASTER || name.eq_ignore_ascii_case(ALL) || name.eq_ignore_ascii_case(ALL_AGENTS)
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_vault(config: &VaultConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", config.version),
        });
    }

    if config.name.is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    }

    if config.script_dir.trim().is_empty() {
        errors.push(ValidationError {
            message: "script_dir must not be empty".to_string(),
        });
    }

    if config.catalog.trim().is_empty() {
        errors.push(ValidationError {
            message: "catalog must not be empty".to_string(),
        });
    }

    if config.scan_extension.trim().is_empty() {
        errors.push(ValidationError {
            message: "scan_extension must not be empty".to_string(),
        });
    }

    for (name, agent) in &config.agents {
        if is_reserved_target(name) {
            errors.push(ValidationError {
                message: format!("agent '{}' uses a reserved target name", name),
            });
        }
        if agent.addr.trim().is_empty() {
            errors.push(ValidationError {
                message: format!("agent '{}' has no addr", name),
            });
        }
    }

    errors
}

/// Resolve a vault-relative path against the directory holding vault.yaml.
pub fn vault_relative(vault_file: &Path, rel: &str) -> PathBuf {
    let base = vault_file.parent().unwrap_or_else(|| Path::new("."));
    let rel = Path::new(rel);
    if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        base.join(rel)
    }
}
