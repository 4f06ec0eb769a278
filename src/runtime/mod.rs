//! Target-side execution: runs an ExecutableUnit on the node that received it.
//!
//! Two strategies:
//! 1. shell: external process picked from the body's shebang line
//! 2. engine: in-process rhai evaluation with parameters bound as variables

pub mod engine;
pub mod shell;

use crate::core::error::Result;
use crate::core::types::{ExecutableUnit, Strategy, UnitResult};
use tracing::debug;

/// Execute a unit on this node. `node` is the name the unit was dispatched to.
pub fn execute(unit: &ExecutableUnit, node: &str) -> Result<UnitResult> {
    debug!(script = %unit.script_id, strategy = %unit.strategy, node, "executing unit");
    match unit.strategy {
        Strategy::Shell => {
            let mut sink = Vec::new();
            let success = shell::run(unit, node, &mut sink)?;
            Ok(UnitResult {
                success,
                output: String::from_utf8_lossy(&sink).to_string(),
                value: None,
            })
        }
        Strategy::Engine { .. } => Ok(engine::run(unit, node)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ParameterSet;

    fn unit(strategy: Strategy, body: &str) -> ExecutableUnit {
        ExecutableUnit {
            script_id: "t".into(),
            strategy,
            master_only: false,
            body: body.into(),
            parameters: ParameterSet::default(),
            build: None,
        }
    }

    #[test]
    fn test_sv013_engine_dispatch() {
        let r = execute(
            &unit(
                Strategy::Engine {
                    master_context: false,
                },
                "print(\"via engine\");",
            ),
            "master",
        )
        .unwrap();
        assert!(r.success);
        assert_eq!(r.output, "via engine\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_sv013_shell_dispatch() {
        let r = execute(&unit(Strategy::Shell, "#!/bin/bash\necho via shell"), "master").unwrap();
        assert!(r.success);
        assert_eq!(r.output, "via shell\n");
        assert!(r.value.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_sv013_shell_exit_status() {
        let r = execute(&unit(Strategy::Shell, "#!/bin/bash\nexit 1"), "master").unwrap();
        assert!(!r.success);
    }
}
