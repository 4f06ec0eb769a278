//! Version-control mirrors of the script directory.
//!
//! Every body write or delete is followed by a mirror update. A failed update is
//! fatal to the save/delete that triggered it and is never repaired automatically.

pub mod git;
pub mod journal;

use crate::core::error::Result;
use crate::core::types::MirrorKind;
use std::path::Path;

/// History kept alongside the script directory.
pub trait Mirror {
    /// Record the current content of `id`.
    fn add_or_update(&self, id: &str) -> Result<()>;

    /// Record that `id` was deleted.
    fn remove(&self, id: &str) -> Result<()>;

    /// Bring the script directory back to the last recorded state.
    fn reset_to_known_good(&self) -> Result<()>;
}

/// Mirror that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMirror;

impl Mirror for NoMirror {
    fn add_or_update(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    fn reset_to_known_good(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the configured mirror for `script_dir`.
pub fn open(kind: MirrorKind, script_dir: &Path) -> Result<Box<dyn Mirror>> {
    match kind {
        MirrorKind::Journal => Ok(Box::new(journal::JournalMirror::open(script_dir)?)),
        MirrorKind::Git => Ok(Box::new(git::GitMirror::open(script_dir)?)),
        MirrorKind::None => Ok(Box::new(NoMirror)),
    }
}
