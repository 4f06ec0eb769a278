//! SV-031: Journal mirror: content-addressed snapshots plus a JSONL event log.
//!
//! Layout under the script directory:
//!
//! ```text
//! .journal/objects/<blake3 hex>   body snapshots
//! .journal/events.jsonl           one timestamped event per line
//! ```

use super::Mirror;
use crate::core::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const JOURNAL_DIR: &str = ".journal";

/// A recorded change to the script directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEvent {
    Added { id: String, hash: String },
    Removed { id: String },
    Reset { restored: usize, deleted: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: JournalEvent,
}

/// Journal kept inside the script directory.
#[derive(Debug, Clone)]
pub struct JournalMirror {
    script_dir: PathBuf,
    root: PathBuf,
}

impl JournalMirror {
    pub fn open(script_dir: &Path) -> Result<Self> {
        let root = script_dir.join(JOURNAL_DIR);
        std::fs::create_dir_all(root.join("objects")).map_err(|e| {
            Error::mirror(
                root.display().to_string(),
                format!("cannot create journal: {}", e),
            )
        })?;
        Ok(Self {
            script_dir: script_dir.to_path_buf(),
            root,
        })
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join("events.jsonl")
    }

    fn object_path(&self, hash: &str) -> PathBuf {
        let hex = hash.strip_prefix("blake3:").unwrap_or(hash);
        self.root.join("objects").join(hex)
    }

    fn append(&self, event: JournalEvent) -> Result<()> {
        let path = self.events_path();
        let te = TimestampedEvent {
            ts: now_iso8601(),
            event,
        };
        let json = serde_json::to_string(&te)?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                Error::mirror(
                    path.display().to_string(),
                    format!("cannot open event log: {}", e),
                )
            })?;
        writeln!(file, "{}", json)
            .map_err(|e| Error::mirror(path.display().to_string(), format!("write error: {}", e)))
    }

    /// All events in log order. Unreadable lines are skipped.
    pub fn events(&self) -> Result<Vec<TimestampedEvent>> {
        let path = self.events_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::mirror(
                    path.display().to_string(),
                    format!("cannot read event log: {}", e),
                ))
            }
        };

        let mut events = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(ev) => events.push(ev),
                Err(e) => warn!(line = n + 1, error = %e, "skipping unreadable journal line"),
            }
        }
        Ok(events)
    }

    /// Last recorded hash per id; `None` for ids whose last event is a removal.
    pub fn known_state(&self) -> Result<IndexMap<String, Option<String>>> {
        let mut state = IndexMap::new();
        for te in self.events()? {
            match te.event {
                JournalEvent::Added { id, hash } => {
                    state.insert(id, Some(hash));
                }
                JournalEvent::Removed { id } => {
                    state.insert(id, None);
                }
                JournalEvent::Reset { .. } => {}
            }
        }
        Ok(state)
    }
}

impl Mirror for JournalMirror {
    fn add_or_update(&self, id: &str) -> Result<()> {
        let path = self.script_dir.join(id);
        let content = std::fs::read(&path)
            .map_err(|e| Error::mirror(id, format!("cannot read {}: {}", path.display(), e)))?;
        let hash = hash_bytes(&content);

        let object = self.object_path(&hash);
        if !object.exists() {
            std::fs::write(&object, &content)
                .map_err(|e| Error::mirror(id, format!("cannot store snapshot: {}", e)))?;
        }

        debug!(script = id, %hash, "journal add");
        self.append(JournalEvent::Added {
            id: id.to_string(),
            hash,
        })
    }

    fn remove(&self, id: &str) -> Result<()> {
        debug!(script = id, "journal remove");
        self.append(JournalEvent::Removed { id: id.to_string() })
    }

    fn reset_to_known_good(&self) -> Result<()> {
        let mut restored = 0;
        let mut deleted = 0;

        for (id, hash) in self.known_state()? {
            let path = self.script_dir.join(&id);
            match hash {
                Some(hash) => {
                    let current = std::fs::read(&path).ok().map(|c| hash_bytes(&c));
                    if current.as_deref() == Some(hash.as_str()) {
                        continue;
                    }
                    let object = self.object_path(&hash);
                    std::fs::copy(&object, &path).map_err(|e| {
                        Error::mirror(&id, format!("cannot restore {}: {}", hash, e))
                    })?;
                    restored += 1;
                }
                None => {
                    if path.exists() {
                        std::fs::remove_file(&path)
                            .map_err(|e| Error::mirror(&id, format!("cannot delete: {}", e)))?;
                        deleted += 1;
                    }
                }
            }
        }

        info!(restored, deleted, "journal reset");
        self.append(JournalEvent::Reset { restored, deleted })
    }
}

/// BLAKE3 of raw bytes. Returns `"blake3:{hex}"`.
pub fn hash_bytes(content: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(content).to_hex())
}

/// ISO 8601 UTC timestamp, second precision.
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_epoch(secs)
}

fn format_epoch(secs: u64) -> String {
    let days = secs / 86400;
    let time_secs = secs % 86400;
    let (hours, minutes, seconds) = (time_secs / 3600, (time_secs % 3600) / 60, time_secs % 60);

    let mut y = 1970i64;
    let mut remaining = days as i64;
    loop {
        let year_days = if is_leap(y) { 366 } else { 365 };
        if remaining < year_days {
            break;
        }
        remaining -= year_days;
        y += 1;
    }
    let feb = if is_leap(y) { 29 } else { 28 };
    let month_days = [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut m = 12;
    for (i, &md) in month_days.iter().enumerate() {
        if remaining < md {
            m = i + 1;
            break;
        }
        remaining -= md;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        y,
        m,
        remaining + 1,
        hours,
        minutes,
        seconds
    )
}

fn is_leap(y: i64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}
