//! SV-008: Dispatch aggregation: alias resolution, sequential fan-out, report.
//!
//! A run resolves its target alias against a snapshot of fleet membership, then
//! executes the unit on each target strictly in order. Each target's output lands
//! in its own labelled block:
//!
//! ```text
//! ___________________________________________
//! [master]:
//! <output>
//! ___________________________________________
//! ```

use super::error::{Error, Result};
use super::types::{ExecutableUnit, ScriptRecord, ALL, ALL_AGENTS, MASTER};
use crate::transport::{Fleet, RemoteExecutor};
use tracing::{debug, info, warn};

/// Line printed before every target block and once after the last.
pub const SEPARATOR: &str = "___________________________________________";

/// Expand an alias into concrete target names, given the known agents.
///
/// `master` is matched exactly; `all` and `all agents` ignore case. Anything else
/// is taken literally, without checking that such a node exists.
pub fn resolve_targets(alias: &str, agents: &[String]) -> Vec<String> {
    if alias == MASTER {
        return vec![MASTER.to_string()];
    }
    if alias.eq_ignore_ascii_case(ALL_AGENTS) {
        return agents.iter().filter(|a| *a != MASTER).cloned().collect();
    }
    if alias.eq_ignore_ascii_case(ALL) {
        let mut targets = agents.to_vec();
        if !targets.iter().any(|a| a == MASTER) {
            targets.push(MASTER.to_string());
        }
        return targets;
    }
    vec![alias.to_string()]
}

/// Targets an operator may pick for `record`.
pub fn selectable_targets(record: &ScriptRecord, fleet: &dyn Fleet) -> Vec<String> {
    let mut targets = vec![MASTER.to_string()];
    if record.restricted_to_master {
        return targets;
    }
    targets.push(ALL.to_string());
    targets.push(ALL_AGENTS.to_string());
    for name in fleet.agent_names() {
        if !targets.contains(&name) {
            targets.push(name);
        }
    }
    targets
}

/// Run `unit` on every target `alias` names and return the combined report.
///
/// A master-only unit is refused before anything runs if any resolved target is
/// not the master. The first failing target aborts the whole run.
pub fn run(alias: &str, unit: &ExecutableUnit, fleet: &dyn Fleet) -> Result<String> {
    let targets = resolve_targets(alias, &fleet.agent_names());
    debug!(alias, ?targets, "resolved targets");

    if unit.master_only {
        if let Some(target) = targets.iter().find(|t| *t != MASTER) {
            return Err(Error::MasterOnly {
                id: unit.script_id.clone(),
                target: target.clone(),
            });
        }
    }

    let executor = RemoteExecutor::new(fleet);
    let mut report = String::new();
    for target in &targets {
        info!(node = %target, script = %unit.script_id, "dispatching");
        let output = executor.execute(target, unit).inspect_err(|e| {
            if e.is_run_failure() {
                warn!(node = %target, script = %unit.script_id, error = %e, "run aborted");
            }
        })?;
        push_block(&mut report, target, &output);
    }
    report.push_str(SEPARATOR);
    report.push('\n');
    Ok(report)
}

fn push_block(report: &mut String, target: &str, output: &str) {
    report.push_str(SEPARATOR);
    report.push('\n');
    report.push_str(&format!("[{}]:\n", target));
    report.push_str(output);
    if !output.is_empty() && !output.ends_with('\n') {
        report.push('\n');
    }
}
