//! Chaos agent (Pumba) configuration.

use std::net::IpAddr;
use std::time::Duration;

use super::{Role, RoleConfig, VolumeBinding};
use crate::engine::DEFAULT_SOCKET;
use crate::pumba::{FaultProfile, NetemCommand, PUMBA_IMAGE, TC_IMAGE};

/// Pumba container injecting a network fault into one target container.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosAgentConfig {
    /// Name of the agent container itself.
    pub name: String,
    /// Pumba image reference.
    pub image: String,
    /// Helper image providing `tc`.
    pub tc_image: String,
    /// Engine socket on the host, mounted read-only into the agent.
    pub engine_socket: String,
    /// Pumba log level.
    pub log_level: String,
    /// How long the fault stays active.
    pub duration: Duration,
    /// Container the fault is installed in.
    pub target_container: String,
    /// Only traffic towards these IPs is affected, in this order.
    pub target_ips: Vec<IpAddr>,
    /// Fault to apply.
    pub fault: FaultProfile,
}

impl ChaosAgentConfig {
    /// Agent isolating `target_container` from `target_ips` with 100% loss
    /// for 100 minutes.
    pub fn new(name: &str, target_container: &str, target_ips: Vec<IpAddr>) -> Self {
        Self {
            name: name.into(),
            image: PUMBA_IMAGE.into(),
            tc_image: TC_IMAGE.into(),
            engine_socket: DEFAULT_SOCKET.into(),
            log_level: "debug".into(),
            duration: Duration::from_secs(100 * 60),
            target_container: target_container.into(),
            target_ips,
            fault: FaultProfile::partition(),
        }
    }

    /// Set the Pumba image.
    pub fn image(mut self, image: &str) -> Self {
        self.image = image.into();
        self
    }

    /// Set the `tc` helper image.
    pub fn tc_image(mut self, image: &str) -> Self {
        self.tc_image = image.into();
        self
    }

    /// Set the host engine socket path.
    pub fn engine_socket(mut self, socket: &str) -> Self {
        self.engine_socket = socket.into();
        self
    }

    /// Set how long the fault stays active.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the fault profile.
    pub fn fault(mut self, fault: FaultProfile) -> Self {
        self.fault = fault;
        self
    }

    /// The Pumba invocation this agent runs.
    pub fn command(&self) -> NetemCommand {
        NetemCommand::new(&self.target_container, self.duration)
            .log_level(&self.log_level)
            .targets(self.target_ips.iter().copied())
            .tc_image(Some(&self.tc_image))
            .profile(self.fault.clone())
    }

    /// Build the role configuration.
    pub fn build(&self) -> RoleConfig {
        let socket = self
            .engine_socket
            .strip_prefix("unix://")
            .unwrap_or(&self.engine_socket);

        RoleConfig::new(&self.name, Role::ChaosAgent, &self.image, self.command().build_args())
            .with_binds(vec![VolumeBinding::read_only(socket, DEFAULT_SOCKET)])
    }
}
