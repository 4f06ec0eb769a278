//! SV-011: Shell strategy: run a body as an external process.
//!
//! The interpreter comes from the body's shebang line. Interpreters that need a flag
//! to accept source code as an argument get it appended. Without a shebang the
//! platform default shell is used as is.

use crate::core::error::{Error, Result};
use crate::core::types::ExecutableUnit;
use std::io::Write;
use std::process::{Command, Stdio};

/// Flags that make an interpreter read its program from the next argument.
const INTERPRETER_FLAGS: &[(&str, &str)] = &[("bash", "-c"), ("ruby", "-e"), ("python", "-c")];

/// Platform default shell of the executing node.
pub fn default_shell() -> &'static str {
    if cfg!(windows) {
        "sh"
    } else {
        "/bin/sh"
    }
}

/// Interpreter plus flags for a body.
pub fn interpreter_command(body: &str) -> Vec<String> {
    if body.starts_with("#!") && body.contains('\n') {
        let first_line = body.split('\n').next().unwrap_or_default();
        let declared = first_line.strip_prefix("#!").unwrap_or(first_line).trim();
        let mut command: Vec<String> = declared.split(' ').map(str::to_string).collect();
        command.extend(inferred_flags(declared));
        command
    } else {
        vec![default_shell().to_string()]
    }
}

fn inferred_flags(declared: &str) -> Vec<String> {
    INTERPRETER_FLAGS
        .iter()
        .filter(|(name, flag)| declared.contains(name) && !declared.contains(flag))
        .map(|(_, flag)| flag.to_string())
        .collect()
}

/// Full command line: interpreter, flags, then the body as last argument.
pub fn command_line(body: &str) -> Vec<String> {
    let mut command = interpreter_command(body);
    command.push(body.to_string());
    command
}

/// Launch the unit's body on this node, streaming its output into `sink`.
///
/// Stdout and stderr share one pipe, so the sink sees lines in the order the
/// process wrote them. Returns whether the process exited with status zero.
/// Failing to launch or to wait for the process is an error, not a `false`, and so
/// is termination by a signal.
pub fn run(unit: &ExecutableUnit, node: &str, sink: &mut dyn Write) -> Result<bool> {
    let command = command_line(&unit.body);
    let (program, args) = command
        .split_first()
        .ok_or_else(|| Error::remote(node, "empty command line"))?;

    let work_dir = unit
        .build
        .as_ref()
        .and_then(|b| b.workspace.clone())
        .unwrap_or_else(std::env::temp_dir);

    let (mut reader, writer) = std::io::pipe()
        .map_err(|e| Error::remote(node, format!("cannot create output pipe: {}", e)))?;
    let err_writer = writer
        .try_clone()
        .map_err(|e| Error::remote(node, format!("cannot create output pipe: {}", e)))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(&work_dir)
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(err_writer);
    for (name, value) in unit.parameters.to_map() {
        cmd.env(name, value.unwrap_or_default());
    }

    let spawned = cmd.spawn();
    // the reader only sees EOF once our copies of the write end are closed
    drop(cmd);
    let mut child = spawned.map_err(|e| {
        let _ = writeln!(sink, "Error {}", e);
        Error::remote(node, format!("failed to launch {}: {}", program, e))
    })?;

    std::io::copy(&mut reader, sink)
        .map_err(|e| Error::remote(node, format!("output read error: {}", e)))?;
    let status = child
        .wait()
        .map_err(|e| Error::remote(node, format!("wait error: {}", e)))?;

    if status.code().is_none() {
        return Err(Error::Interrupted {
            target: node.to_string(),
        });
    }
    Ok(status.success())
}
