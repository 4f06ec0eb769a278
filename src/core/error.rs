//! SV-002: Error taxonomy shared by dispatch, sync, and the script repository.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid script id: '{0}' must not be empty")]
    InvalidIdentifier(String),

    #[error("could not figure out how to run a '{interpreter}' script (master only: {master_only})")]
    UnsupportedInterpreterCombination {
        interpreter: String,
        master_only: bool,
    },

    #[error("script '{id}' may only run on master, refusing target '{target}'")]
    MasterOnly { id: String, target: String },

    #[error("script not found: {0}")]
    ScriptNotFound(String),

    #[error("script source unavailable: {0}")]
    BodyUnavailable(String),

    #[error("execution on '{target}' failed: {message}")]
    RemoteInvocation { target: String, message: String },

    #[error("execution on '{target}' was interrupted")]
    Interrupted { target: String },

    #[error("I/O error: failed to update mirror for '{path}': {message}")]
    MirrorSync { path: String, message: String },

    #[error("invalid metadata block: {0}")]
    Metadata(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn remote(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteInvocation {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn mirror(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MirrorSync {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for errors raised while a unit was running (as opposed to before it started).
    pub fn is_run_failure(&self) -> bool {
        matches!(self, Self::RemoteInvocation { .. } | Self::Interrupted { .. })
    }
}
