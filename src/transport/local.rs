//! SV-020: Local execution channel: runs units in this process.

use super::Channel;
use crate::core::error::Result;
use crate::core::types::{ExecutableUnit, UnitResult};
use crate::runtime;

/// Channel to the node this process runs on.
#[derive(Debug, Clone)]
pub struct LocalChannel {
    node: String,
}

impl LocalChannel {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }
}

impl Channel for LocalChannel {
    fn node(&self) -> &str {
        &self.node
    }

    fn call(&self, unit: &ExecutableUnit) -> Result<UnitResult> {
        runtime::execute(unit, &self.node)
    }
}
