//! SV-005: Embedded metadata blocks.
//!
//! A script body may carry `BEGIN META { ...json... } END META` anywhere in its text,
//! usually inside a comment. Only the first block counts.

use super::error::{Error, Result};
use super::types::{Interpreter, Parameter, ScriptMeta};
use regex::Regex;
use std::sync::LazyLock;

const META_PATTERN: &str = r"(?s)BEGIN META(.+?)END META";

static META_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(META_PATTERN));

/// Extract the metadata block of a body.
///
/// `Ok(None)` when there is no block; `Err(Error::Metadata)` when a block exists
/// but does not hold a valid document.
pub fn extract(body: &str) -> Result<Option<ScriptMeta>> {
    let pattern = META_RE
        .as_ref()
        .map_err(|e| Error::Metadata(e.to_string()))?;
    let Some(caps) = pattern.captures(body) else {
        return Ok(None);
    };
    let inner = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    let meta: ScriptMeta =
        serde_json::from_str(inner).map_err(|e| Error::Metadata(e.to_string()))?;
    Ok(Some(meta))
}

impl ScriptMeta {
    /// Declared interpreter; absent means the engine.
    pub fn interpreter_kind(&self) -> Result<Interpreter> {
        match self.interpreter.as_deref() {
            None => Ok(Interpreter::Engine),
            Some(raw) => match Interpreter::parse(raw) {
                Some(Interpreter::SourceMissing) | None => {
                    Err(Error::Metadata(format!("unknown interpreter '{}'", raw)))
                }
                Some(kind) => Ok(kind),
            },
        }
    }

    /// Declared parameter names as value-less parameters.
    pub fn declared_parameters(&self) -> Vec<Parameter> {
        self.parameters
            .iter()
            .map(|name| Parameter::new(name.clone(), None))
            .collect()
    }
}
