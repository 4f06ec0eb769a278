//! SV-021: SSH execution channel.
//!
//! Uses the `ssh` binary directly: no libssh2 dependency. The unit travels as JSON
//! on stdin to the agent's `exec-unit` command, which answers with a JSON
//! `UnitResult` on stdout.

use super::Channel;
use crate::core::error::{Error, Result};
use crate::core::types::{Agent, ExecutableUnit, UnitResult};
use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Channel to an agent reachable over SSH.
#[derive(Debug, Clone)]
pub struct SshChannel {
    node: String,
    agent: Agent,
}

impl SshChannel {
    pub fn new(node: impl Into<String>, agent: Agent) -> Self {
        Self {
            node: node.into(),
            agent,
        }
    }

    /// The ssh invocation, without stdio wiring.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(["-o", "BatchMode=yes"])
            .args(["-o", "ConnectTimeout=5"])
            .args(["-o", "StrictHostKeyChecking=accept-new"]);

        if let Some(ref key) = self.agent.ssh_key {
            cmd.args(["-i", &expand_key(key)]);
        }

        cmd.arg(format!("{}@{}", self.agent.user, self.agent.addr));
        cmd.args(self.agent.remote_command.split_whitespace());
        cmd.args(["--node", &self.node]);
        cmd
    }
}

impl Channel for SshChannel {
    fn node(&self) -> &str {
        &self.node
    }

    fn call(&self, unit: &ExecutableUnit) -> Result<UnitResult> {
        let payload = serde_json::to_vec(unit)?;

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::remote(
                    &self.node,
                    format!("failed to spawn ssh to {}: {}", self.agent.addr, e),
                )
            })?;

        if let Some(ref mut stdin) = child.stdin {
            stdin
                .write_all(&payload)
                .map_err(|e| Error::remote(&self.node, format!("stdin write error: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::remote(&self.node, format!("ssh wait error: {}", e)))?;

        read_output(&self.node, &output)
    }
}

/// Check how ssh exited, then decode the reply it printed.
///
/// Termination by a signal is an interrupt; any other non-zero exit is a channel
/// failure carrying ssh's stderr.
pub fn read_output(node: &str, output: &Output) -> Result<UnitResult> {
    let Some(code) = output.status.code() else {
        return Err(Error::Interrupted {
            target: node.to_string(),
        });
    };
    if code != 0 {
        return Err(Error::remote(
            node,
            format!(
                "exit code {}: {}",
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    parse_reply(node, &output.stdout)
}

/// Decode the agent's reply.
pub fn parse_reply(node: &str, stdout: &[u8]) -> Result<UnitResult> {
    serde_json::from_slice(stdout)
        .map_err(|e| Error::remote(node, format!("unreadable reply: {}", e)))
}

/// Expand a leading `~/` to the home directory.
fn expand_key(key: &str) -> String {
    if let Some(rest) = key.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home, rest);
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent {
            addr: "10.0.0.5".into(),
            user: "ops".into(),
            ssh_key: Some("/keys/id_ed25519".into()),
            online: true,
            remote_command: "/usr/local/bin/scriptvault exec-unit".into(),
        }
    }

    #[test]
    fn test_sv021_ssh_key_expansion() {
        let expanded = expand_key("~/.ssh/id_ed25519");
        assert!(expanded.contains(".ssh/id_ed25519"));
        if std::env::var("HOME").is_ok() {
            assert!(!expanded.starts_with('~'));
        }
        assert_eq!(expand_key("/etc/key"), "/etc/key");
    }

    #[test]
    fn test_sv021_command_line() {
        let ch = SshChannel::new("web1", agent());
        let cmd = ch.command();
        assert_eq!(cmd.get_program(), "ssh");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        let tail = &args[args.len() - 5..];
        assert_eq!(
            tail,
            &[
                "ops@10.0.0.5",
                "/usr/local/bin/scriptvault",
                "exec-unit",
                "--node",
                "web1"
            ]
        );
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == "/keys/id_ed25519"));
    }

    #[test]
    fn test_sv021_parse_reply() {
        let reply = br#"{"success":false,"output":"boom\n","value":null}"#;
        let r = parse_reply("web1", reply).unwrap();
        assert!(!r.success);
        assert_eq!(r.output, "boom\n");

        let err = parse_reply("web1", b"Permission denied").unwrap_err();
        assert!(matches!(err, Error::RemoteInvocation { ref target, .. } if target == "web1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_sv021_exit_status_classification() {
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        let output = |raw: i32, stdout: &[u8], stderr: &[u8]| Output {
            status: ExitStatus::from_raw(raw),
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
        };

        let ok = output(0, br#"{"success":true,"output":"up\n","value":null}"#, b"");
        assert_eq!(read_output("web1", &ok).unwrap().output, "up\n");

        // SIGKILL
        let killed = output(9, b"", b"");
        assert!(matches!(
            read_output("web1", &killed),
            Err(Error::Interrupted { ref target }) if target == "web1"
        ));

        let refused = output(255 << 8, b"", b"Connection refused\n");
        let err = read_output("web1", &refused).unwrap_err();
        assert!(matches!(err, Error::RemoteInvocation { .. }));
        assert!(err.to_string().contains("exit code 255: Connection refused"));
    }
}
