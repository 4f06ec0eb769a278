//! SV-032: Git mirror: drives the `git` binary inside the script directory.

use super::Mirror;
use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const AUTHOR: [&str; 4] = [
    "-c",
    "user.name=scriptvault",
    "-c",
    "user.email=scriptvault@localhost",
];

/// Git repository rooted at the script directory.
#[derive(Debug, Clone)]
pub struct GitMirror {
    dir: PathBuf,
}

impl GitMirror {
    /// Open the repository, running `git init` the first time.
    pub fn open(script_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(script_dir).map_err(|e| {
            Error::mirror(
                script_dir.display().to_string(),
                format!("cannot create dir: {}", e),
            )
        })?;
        let mirror = Self {
            dir: script_dir.to_path_buf(),
        };
        if !script_dir.join(".git").exists() {
            mirror.git(".", &["init", "-q"])?;
        }
        Ok(mirror)
    }

    fn git(&self, subject: &str, args: &[&str]) -> Result<String> {
        debug!(dir = %self.dir.display(), ?args, "git");
        let output = Command::new("git")
            .current_dir(&self.dir)
            .args(AUTHOR)
            .args(args)
            .output()
            .map_err(|e| Error::mirror(subject, format!("cannot run git: {}", e)))?;

        if !output.status.success() {
            return Err(Error::mirror(
                subject,
                format!(
                    "git {} exited {}: {}",
                    args.first().copied().unwrap_or_default(),
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn commit(&self, id: &str, message: &str) -> Result<()> {
        self.git(id, &["commit", "-q", "--allow-empty", "-m", message])
            .map(|_| ())
    }
}

impl Mirror for GitMirror {
    fn add_or_update(&self, id: &str) -> Result<()> {
        self.git(id, &["add", "--", id])?;
        self.commit(id, &format!("update {}", id))
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.git(id, &["rm", "-q", "--cached", "--ignore-unmatch", "--", id])?;
        self.commit(id, &format!("remove {}", id))
    }

    fn reset_to_known_good(&self) -> Result<()> {
        self.git(".", &["reset", "-q", "--hard", "HEAD"]).map(|_| ())
    }
}
