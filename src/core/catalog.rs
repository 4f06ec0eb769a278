//! SV-004: Catalog document: load, save (atomic), upsert/remove by id.

use super::error::{Error, Result};
use super::types::{Catalog, ScriptRecord};
use std::path::Path;

impl Catalog {
    pub fn get(&self, id: &str) -> Option<&ScriptRecord> {
        self.scripts.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ScriptRecord> {
        self.scripts.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.scripts.contains_key(id)
    }

    /// Insert or replace the whole record stored under `record.id`.
    /// Existing ids keep their position.
    pub fn upsert(&mut self, mut record: ScriptRecord) {
        record.body = None;
        self.scripts.insert(record.id.clone(), record);
    }

    /// Remove a record, preserving the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<ScriptRecord> {
        self.scripts.shift_remove(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.scripts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

/// Load the catalog. A missing file is an empty catalog.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Ok(Catalog::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Catalog(format!("cannot read {}: {}", path.display(), e)))?;
    let catalog: Catalog = serde_yaml_ng::from_str(&content)
        .map_err(|e| Error::Catalog(format!("invalid catalog {}: {}", path.display(), e)))?;
    Ok(catalog)
}

/// Save the catalog atomically (write to temp, then rename).
pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Catalog(format!("cannot create dir {}: {}", parent.display(), e))
            })?;
        }
    }

    let yaml = serde_yaml_ng::to_string(catalog)?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, &yaml)
        .map_err(|e| Error::Catalog(format!("cannot write {}: {}", tmp_path.display(), e)))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        Error::Catalog(format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })?;

    Ok(())
}
