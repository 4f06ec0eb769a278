//! SV-022: Transport: execution channels, fleet membership, RemoteExecutor.

pub mod local;
pub mod ssh;

use crate::core::error::Result;
use crate::core::types::{Agent, ExecutableUnit, UnitResult, VaultConfig, MASTER};
use indexmap::IndexMap;
use local::LocalChannel;
use ssh::SshChannel;
use tracing::{debug, warn};

/// A route to one node that can run units.
pub trait Channel {
    /// Name of the node behind the channel.
    fn node(&self) -> &str;

    /// Run the unit and block until it finished.
    fn call(&self, unit: &ExecutableUnit) -> Result<UnitResult>;
}

/// Live fleet membership.
pub trait Fleet {
    /// Names of all known agents, in a stable order.
    fn agent_names(&self) -> Vec<String>;

    /// Channel for a node, or None when it is unknown or offline.
    fn channel(&self, name: &str) -> Option<Box<dyn Channel>>;
}

/// Fleet built from the agents declared in vault.yaml.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    agents: IndexMap<String, Agent>,
}

impl Inventory {
    pub fn new(agents: IndexMap<String, Agent>) -> Self {
        Self { agents }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(config.agents.clone())
    }
}

impl Fleet for Inventory {
    fn agent_names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    fn channel(&self, name: &str) -> Option<Box<dyn Channel>> {
        let agent = self.agents.get(name)?;
        if !agent.online {
            return None;
        }
        if is_local_addr(&agent.addr) {
            Some(Box::new(LocalChannel::new(name)))
        } else {
            Some(Box::new(SshChannel::new(name, agent.clone())))
        }
    }
}

/// Sends units to named targets.
pub struct RemoteExecutor<'a> {
    fleet: &'a dyn Fleet,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(fleet: &'a dyn Fleet) -> Self {
        Self { fleet }
    }

    /// Run `unit` on `target` and return its captured output.
    ///
    /// The master name always maps to the local channel. Any other name without a
    /// live channel produces empty output.
    pub fn execute(&self, target: &str, unit: &ExecutableUnit) -> Result<String> {
        let channel: Box<dyn Channel> = if target == MASTER {
            Box::new(LocalChannel::new(MASTER))
        } else {
            match self.fleet.channel(target) {
                Some(channel) => channel,
                None => {
                    warn!(node = target, script = %unit.script_id, "no live channel, skipping target");
                    return Ok(String::new());
                }
            }
        };

        debug!(node = channel.node(), script = %unit.script_id, "sending unit");
        let result = channel.call(unit)?;
        if !result.success {
            debug!(node = target, script = %unit.script_id, "unit reported failure");
        }
        Ok(result.output)
    }
}

/// Check if an address is this machine.
pub fn is_local_addr(addr: &str) -> bool {
    if addr == "127.0.0.1" || addr == "localhost" || addr == "::1" {
        return true;
    }
    if let Ok(hostname) = std::fs::read_to_string("/etc/hostname") {
        if addr == hostname.trim() {
            return true;
        }
    }
    false
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeFleet, Reply};
    use super::*;
    use crate::core::error::Error;
    use crate::core::types::{ParameterSet, Strategy};

    fn unit(body: &str) -> ExecutableUnit {
        ExecutableUnit {
            script_id: "t.rhai".into(),
            strategy: Strategy::Engine {
                master_context: false,
            },
            master_only: false,
            body: body.into(),
            parameters: ParameterSet::default(),
            build: None,
        }
    }

    fn agent(addr: &str, online: bool) -> Agent {
        Agent {
            addr: addr.into(),
            user: "root".into(),
            ssh_key: None,
            online,
            remote_command: "scriptvault exec-unit".into(),
        }
    }

    #[test]
    fn test_sv022_local_detection() {
        assert!(is_local_addr("127.0.0.1"));
        assert!(is_local_addr("localhost"));
        assert!(is_local_addr("::1"));
        assert!(!is_local_addr("192.168.1.100"));
        assert!(!is_local_addr("10.0.0.1"));
    }

    #[test]
    fn test_sv022_master_runs_locally_without_registration() {
        let fleet = FakeFleet::new(&[]);
        let exec = RemoteExecutor::new(&fleet);
        let out = exec.execute(MASTER, &unit("print(node);")).unwrap();
        assert_eq!(out, "master\n");
        assert!(fleet.calls().is_empty());
    }

    #[test]
    fn test_sv022_unknown_target_is_silent_noop() {
        let fleet = FakeFleet::new(&["web1"]);
        let exec = RemoteExecutor::new(&fleet);
        let out = exec.execute("ghost", &unit("print(1);")).unwrap();
        assert_eq!(out, "");
        assert!(fleet.calls().is_empty());
    }

    #[test]
    fn test_sv022_remote_output_and_failure() {
        let fleet = FakeFleet::new(&["web1", "web2"])
            .reply("web1", Reply::Output("up 3 days\n"))
            .reply("web2", Reply::Fail("connection reset"));
        let exec = RemoteExecutor::new(&fleet);
        assert_eq!(exec.execute("web1", &unit("")).unwrap(), "up 3 days\n");
        let err = exec.execute("web2", &unit("")).unwrap_err();
        assert!(matches!(err, Error::RemoteInvocation { .. }));
        assert_eq!(fleet.calls(), vec!["web1", "web2"]);
    }

    #[test]
    fn test_sv022_inventory_channels() {
        let mut agents = IndexMap::new();
        agents.insert("local".to_string(), agent("127.0.0.1", true));
        agents.insert("remote".to_string(), agent("10.9.9.9", true));
        agents.insert("down".to_string(), agent("10.9.9.10", false));
        let inv = Inventory::new(agents);

        assert_eq!(inv.agent_names(), vec!["local", "remote", "down"]);
        assert_eq!(inv.channel("local").unwrap().node(), "local");
        assert_eq!(inv.channel("remote").unwrap().node(), "remote");
        assert!(inv.channel("down").is_none());
        assert!(inv.channel("ghost").is_none());
    }

    #[test]
    fn test_sv022_inventory_local_agent_executes() {
        let mut agents = IndexMap::new();
        agents.insert("box".to_string(), agent("localhost", true));
        let inv = Inventory::new(agents);
        let exec = RemoteExecutor::new(&inv);
        let out = exec.execute("box", &unit("print(\"on \" + node);")).unwrap();
        assert_eq!(out, "on box\n");
    }
}
