//! SV-006: Repository synchronizer: reconcile the script directory with the catalog.
//!
//! Pass 1 adopts body files the catalog does not know yet. Pass 2 checks every
//! catalog record against the directory: present bodies are marked available,
//! vanished bodies turn the record into an unavailable placeholder. The caller
//! persists the catalog afterwards.

use super::error::Result;
use super::meta;
use super::repository::is_flat_name;
use super::types::{Catalog, Interpreter, ScriptRecord, DISCOVERED_COMMENT};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Body files adopted into the catalog.
    pub adopted: Vec<String>,
    /// Records whose body vanished.
    pub missing: Vec<String>,
    /// Records whose body came back.
    pub restored: Vec<String>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.adopted.is_empty() && self.missing.is_empty() && self.restored.is_empty()
    }
}

/// Run both passes over `catalog`.
pub fn reconcile(script_dir: &Path, extension: &str, catalog: &mut Catalog) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for path in list_script_files(script_dir, extension)? {
        let Some(id) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if catalog.contains(&id) {
            continue;
        }
        let record = adopt(&id, &path);
        info!(script = %id, interpreter = %record.interpreter, "adopted script from disk");
        catalog.upsert(record);
        report.adopted.push(id);
    }

    let ids = catalog.ids();
    for id in ids {
        // ids that are not plain file names never resolve inside the directory
        let exists = is_flat_name(&id) && script_dir.join(&id).exists();
        let Some(record) = catalog.get_mut(&id) else {
            continue;
        };
        if exists {
            if !record.available || record.prior.is_some() {
                record.restore_available();
                debug!(script = %id, "script source is back");
                report.restored.push(id);
            }
        } else if !record.is_missing() {
            info!(
                dir = %script_dir.display(),
                script = %id,
                "script source is not available"
            );
            let placeholder = record.to_missing_placeholder();
            catalog.upsert(placeholder);
            report.missing.push(id);
        }
    }

    Ok(report)
}

/// Body files ending in `.{extension}`, sorted by name. A missing directory has none.
pub fn list_script_files(script_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    debug!(dir = %script_dir.display(), "listing script files");
    let entries = match std::fs::read_dir(script_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(&suffix) && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Build a catalog record for an orphan body, from its metadata block when it has one.
fn adopt(id: &str, path: &Path) -> ScriptRecord {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) => {
            warn!(script = %id, error = %e, "cannot read orphan body, adopting without metadata");
            return discovered(id);
        }
    };

    let meta = match meta::extract(&body) {
        Ok(Some(meta)) => meta,
        Ok(None) => return discovered(id),
        Err(e) => {
            warn!(script = %id, error = %e, "ignoring metadata block");
            return discovered(id);
        }
    };

    let interpreter = match meta.interpreter_kind() {
        Ok(kind) => kind,
        Err(e) => {
            warn!(script = %id, error = %e, "ignoring metadata block");
            return discovered(id);
        }
    };

    let mut record = ScriptRecord::new(
        id,
        meta.name.clone().unwrap_or_else(|| id.to_string()),
        interpreter,
        meta.comment.clone().unwrap_or_default(),
    );
    record.declared_parameters = meta.declared_parameters();
    record
}

fn discovered(id: &str) -> ScriptRecord {
    ScriptRecord::new(id, id, Interpreter::Engine, DISCOVERED_COMMENT)
}
