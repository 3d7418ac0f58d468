//! Role configuration builders.
//!
//! Pure, deterministic translations from a typed topology description into
//! an image reference plus the argument and environment lists the node
//! binary (or the chaos tool) understands. Nothing here talks to the engine.
//!
//! - [`EntryNodeConfig`]: autopeering bootstrap node, no plugins, no peers.
//! - [`PeerConfig`]: full node, optionally running the coordinator.
//! - [`ChaosAgentConfig`]: Pumba container injecting network faults.

mod chaos_agent;
mod entry_node;
mod peer;

pub use chaos_agent::ChaosAgentConfig;
pub use entry_node::EntryNodeConfig;
pub use peer::{CoordinatorConfig, EntryNodeRef, PeerConfig, SnapshotConfig, SnapshotLoad};

use std::fmt;

use crate::engine::{ContainerSpec, PortBinding};

/// Default autopeering port nodes listen on.
pub const AUTOPEERING_PORT: u16 = 14626;

/// Default HTTP API port of a node.
pub const API_PORT: u16 = 14265;

/// Plugins an entry node never runs.
pub const ENTRY_NODE_DISABLED_PLUGINS: &[&str] = &[
    "dashboard",
    "gossip",
    "snapshot",
    "tangle",
    "warpsync",
    "urts",
    "webapi",
    "mqtt",
    "prometheus",
    "coordinator",
];

/// Which part a container plays in the test topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Autopeering bootstrap node.
    EntryNode,
    /// Ordinary or coordinator-enabled ledger node.
    Peer {
        /// Whether the coordinator plugin is enabled.
        coordinator: bool,
    },
    /// Fault-injection agent.
    ChaosAgent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::EntryNode => f.write_str("entry-node"),
            Role::Peer { coordinator: false } => f.write_str("peer"),
            Role::Peer { coordinator: true } => f.write_str("coordinator"),
            Role::ChaosAgent => f.write_str("chaos-agent"),
        }
    }
}

/// Named volume mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    /// Volume name or host path.
    pub source: String,
    /// Mount point inside the container.
    pub target: String,
    /// Mount read-only.
    pub read_only: bool,
}

impl VolumeBinding {
    /// Read-write mount.
    pub fn read_write(source: &str, target: &str) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    /// Read-only mount.
    pub fn read_only(source: &str, target: &str) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: true,
        }
    }
}

impl fmt::Display for VolumeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.read_only { "ro" } else { "rw" };
        write!(f, "{}:{}:{}", self.source, self.target, mode)
    }
}

/// Extra host-side bindings supplied at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostBindings {
    /// Additional mounts.
    pub binds: Vec<VolumeBinding>,
    /// Host port publications.
    pub port_bindings: Vec<PortBinding>,
}

impl HostBindings {
    /// Publish `container_port` (e.g. `14265/tcp`) on `host_port`.
    pub fn publish(mut self, container_port: &str, host_port: u16) -> Self {
        self.port_bindings.push(PortBinding {
            container_port: container_port.into(),
            host_ip: None,
            host_port,
        });
        self
    }

    /// Add a mount.
    pub fn bind(mut self, binding: VolumeBinding) -> Self {
        self.binds.push(binding);
        self
    }
}

/// A built, immutable container configuration for one role.
///
/// Consumed by [`crate::Container::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleConfig {
    name: String,
    role: Role,
    image: String,
    args: Vec<String>,
    env: Vec<String>,
    exposed_ports: Vec<String>,
    binds: Vec<VolumeBinding>,
    port_bindings: Vec<PortBinding>,
}

impl RoleConfig {
    pub(crate) fn new(name: &str, role: Role, image: &str, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            role,
            image: image.into(),
            args,
            env: Vec::new(),
            exposed_ports: Vec::new(),
            binds: Vec::new(),
            port_bindings: Vec::new(),
        }
    }

    pub(crate) fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    pub(crate) fn with_exposed_ports(mut self, ports: Vec<String>) -> Self {
        self.exposed_ports = ports;
        self
    }

    pub(crate) fn with_binds(mut self, binds: Vec<VolumeBinding>) -> Self {
        self.binds = binds;
        self
    }

    pub(crate) fn with_port_bindings(mut self, port_bindings: Vec<PortBinding>) -> Self {
        self.port_bindings = port_bindings;
        self
    }

    /// Container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role tag.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Image reference.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Command-line arguments, in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Environment in `KEY=value` form.
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Exposed ports in `<port>/<proto>` form.
    pub fn exposed_ports(&self) -> &[String] {
        &self.exposed_ports
    }

    /// Mounts.
    pub fn binds(&self) -> &[VolumeBinding] {
        &self.binds
    }

    /// Host port publications.
    pub fn port_bindings(&self) -> &[PortBinding] {
        &self.port_bindings
    }

    /// Values of every `--<flag>=<value>` argument matching `flag`.
    pub fn flag_values<'a>(&'a self, flag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.args.iter().filter_map(move |arg| {
            arg.strip_prefix(flag)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }

    /// Merge creation-time host bindings and produce the engine spec.
    pub fn into_spec(self, host: Option<HostBindings>) -> (String, ContainerSpec) {
        let mut binds = self.binds;
        let mut port_bindings = self.port_bindings;
        if let Some(host) = host {
            binds.extend(host.binds);
            port_bindings.extend(host.port_bindings);
        }

        let spec = ContainerSpec {
            image: self.image,
            cmd: self.args,
            env: self.env,
            exposed_ports: self.exposed_ports,
            binds: binds.iter().map(ToString::to_string).collect(),
            port_bindings,
        };
        (self.name, spec)
    }
}
