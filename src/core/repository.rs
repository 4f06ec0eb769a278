//! SV-010: Script repository: bodies on disk, records in the catalog, history in the mirror.
//!
//! Saving always runs in the same order: write the body, update the mirror, upsert
//! the record, persist the catalog. A failure at any step leaves the later steps
//! undone.

use super::catalog::{load_catalog, save_catalog};
use super::error::{Error, Result};
use super::meta;
use super::parser::vault_relative;
use super::sync::{self, SyncReport};
use super::types::*;
use crate::mirror::{self, journal::now_iso8601, Mirror};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Turn a user-supplied name into a script id (and file name).
pub fn normalize_id(name: &str) -> String {
    name.replace(' ', "_").trim().to_string()
}

/// Normalize `name` and require that it names a file directly inside the script
/// directory.
pub fn script_id(name: &str) -> Result<String> {
    let id = normalize_id(name);
    if is_flat_name(&id) {
        Ok(id)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// A single plain path component: no separators, no `.`/`..`, not absolute.
pub(crate) fn is_flat_name(id: &str) -> bool {
    if id.is_empty() || id.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn check_flat(id: &str) -> Result<()> {
    if is_flat_name(id) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(id.to_string()))
    }
}

/// Everything needed to store one script.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub id: String,
    pub display_name: Option<String>,
    pub comment: String,
    pub interpreter: Interpreter,
    pub non_administer_executable: bool,
    pub restricted_to_master: bool,
    pub declared_parameters: Vec<Parameter>,
    pub origin: Option<Origin>,
    pub body: String,
}

impl SaveRequest {
    pub fn new(id: impl Into<String>, interpreter: Interpreter, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            comment: String::new(),
            interpreter,
            non_administer_executable: false,
            restricted_to_master: false,
            declared_parameters: Vec::new(),
            origin: None,
            body: body.into(),
        }
    }
}

/// A script fetched from a remote catalog.
#[derive(Debug, Clone)]
pub struct RemoteScript {
    pub id: String,
    pub body: String,
}

/// Source of scripts that can be imported by id.
pub trait RemoteCatalog {
    /// Name recorded in the origin of imported scripts.
    fn name(&self) -> &str;

    fn fetch(&self, id: &str) -> Result<RemoteScript>;
}

/// Remote catalog backed by a plain directory of bodies.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    name: String,
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

impl RemoteCatalog for DirectoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, id: &str) -> Result<RemoteScript> {
        check_flat(id)?;
        let path = self.dir.join(id);
        let body = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ScriptNotFound(format!("{} in catalog '{}'", id, self.name))
            } else {
                Error::Io(e)
            }
        })?;
        Ok(RemoteScript {
            id: id.to_string(),
            body,
        })
    }
}

/// The script directory, its catalog document, and its mirror.
pub struct Repository {
    script_dir: PathBuf,
    catalog_path: PathBuf,
    scan_extension: String,
    mirror: Box<dyn Mirror>,
}

impl Repository {
    pub fn new(
        script_dir: impl Into<PathBuf>,
        catalog_path: impl Into<PathBuf>,
        scan_extension: impl Into<String>,
        mirror: Box<dyn Mirror>,
    ) -> Self {
        Self {
            script_dir: script_dir.into(),
            catalog_path: catalog_path.into(),
            scan_extension: scan_extension.into(),
            mirror,
        }
    }

    /// Open the repository a vault file describes, with its configured mirror.
    pub fn open(vault_file: &Path, config: &VaultConfig) -> Result<Self> {
        let script_dir = vault_relative(vault_file, &config.script_dir);
        let catalog_path = vault_relative(vault_file, &config.catalog);
        let mirror = mirror::open(config.mirror, &script_dir)?;
        Ok(Self::new(
            script_dir,
            catalog_path,
            config.scan_extension.clone(),
            mirror,
        ))
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        load_catalog(&self.catalog_path)
    }

    /// Store a script body and its record.
    pub fn save(&self, catalog: &mut Catalog, req: SaveRequest) -> Result<ScriptRecord> {
        let id = script_id(&req.id)?;

        self.write_body(&id, &req.body)?;
        self.mirror.add_or_update(&id)?;

        let record = ScriptRecord {
            display_name: req.display_name.unwrap_or_else(|| id.clone()),
            non_administer_executable: req.non_administer_executable,
            restricted_to_master: req.restricted_to_master,
            declared_parameters: req.declared_parameters,
            origin: req.origin,
            ..ScriptRecord::new(id.clone(), String::new(), req.interpreter, req.comment)
        };
        catalog.upsert(record.clone());
        save_catalog(&self.catalog_path, catalog)?;
        info!(script = %id, interpreter = %record.interpreter, "saved script");
        Ok(record)
    }

    /// Delete a script's body and record. Returns whether the catalog knew it.
    pub fn delete(&self, catalog: &mut Catalog, id: &str) -> Result<bool> {
        let id = script_id(id)?;

        let path = self.script_dir.join(&id);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(script = %id, "no body to delete");
            }
            Err(e) => return Err(e.into()),
        }
        self.mirror.remove(&id)?;

        let known = catalog.remove(&id).is_some();
        save_catalog(&self.catalog_path, catalog)?;
        info!(script = %id, known, "deleted script");
        Ok(known)
    }

    /// Store a local file under its normalized file name. An existing record keeps
    /// its declaration; a placeholder left by reconcile becomes available again.
    pub fn upload(
        &self,
        catalog: &mut Catalog,
        source: &Path,
        interpreter: Interpreter,
        non_administer_executable: bool,
    ) -> Result<ScriptRecord> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let id = script_id(&file_name)
            .map_err(|_| Error::InvalidIdentifier(source.display().to_string()))?;

        let body = std::fs::read_to_string(source)?;
        self.write_body(&id, &body)?;
        self.mirror.add_or_update(&id)?;

        let record = match catalog.get(&id) {
            Some(existing) if !existing.available || existing.prior.is_some() => {
                let mut record = existing.clone();
                record.restore_available();
                if record.interpreter == Interpreter::SourceMissing {
                    record.interpreter = interpreter;
                    record.non_administer_executable = non_administer_executable;
                }
                catalog.upsert(record.clone());
                record
            }
            Some(existing) => existing.clone(),
            None => {
                let mut record = ScriptRecord::new(id.clone(), id.clone(), interpreter, "");
                record.non_administer_executable = non_administer_executable;
                catalog.upsert(record.clone());
                record
            }
        };
        save_catalog(&self.catalog_path, catalog)?;
        info!(script = %id, source = %source.display(), "uploaded script");
        Ok(record)
    }

    /// Fetch a script by id from `remote` and save it with its origin.
    pub fn import(
        &self,
        catalog: &mut Catalog,
        remote: &dyn RemoteCatalog,
        id: &str,
    ) -> Result<ScriptRecord> {
        let fetched = remote.fetch(id)?;
        let meta = match meta::extract(&fetched.body) {
            Ok(meta) => meta.unwrap_or_default(),
            Err(e) => {
                warn!(script = %id, error = %e, "ignoring metadata of imported script");
                ScriptMeta::default()
            }
        };
        let interpreter = meta.interpreter_kind().unwrap_or(Interpreter::Engine);

        let req = SaveRequest {
            display_name: meta.name.clone(),
            comment: meta.comment.clone().unwrap_or_default(),
            declared_parameters: meta.declared_parameters(),
            origin: Some(Origin {
                catalog: remote.name().to_string(),
                id: fetched.id.clone(),
                imported_at: Some(now_iso8601()),
            }),
            ..SaveRequest::new(fetched.id.clone(), interpreter, fetched.body)
        };
        self.save(catalog, req)
    }

    /// Snapshot of one record, optionally with its body.
    pub fn load(&self, catalog: &Catalog, id: &str, with_body: bool) -> Result<ScriptRecord> {
        check_flat(id)?;
        let mut record = catalog
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ScriptNotFound(id.to_string()))?;
        if with_body {
            let path = self.script_dir.join(id);
            match std::fs::read_to_string(&path) {
                Ok(body) => record.body = Some(body),
                Err(e) => warn!(script = %id, error = %e, "script source is not available"),
            }
        }
        Ok(record)
    }

    /// Reconcile the catalog with the script directory and persist it when it changed.
    pub fn reconcile(&self, catalog: &mut Catalog) -> Result<SyncReport> {
        let report = sync::reconcile(&self.script_dir, &self.scan_extension, catalog)?;
        if !report.is_noop() {
            save_catalog(&self.catalog_path, catalog)?;
        }
        Ok(report)
    }

    pub fn reset_mirror(&self) -> Result<()> {
        info!(dir = %self.script_dir.display(), "resetting mirror");
        self.mirror.reset_to_known_good()
    }

    fn write_body(&self, id: &str, body: &str) -> Result<()> {
        std::fs::create_dir_all(&self.script_dir)?;
        std::fs::write(self.script_dir.join(id), body)?;
        Ok(())
    }
}
