//! Peer and coordinator configuration.

use std::fmt;

use super::{Role, RoleConfig, VolumeBinding, API_PORT, AUTOPEERING_PORT};
use crate::engine::PortBinding;

/// How the node loads its initial ledger state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLoad {
    /// Load a global snapshot file at the given milestone index.
    Global {
        /// Path of the global snapshot inside the container.
        path: String,
        /// Milestone index the snapshot was taken at.
        index: u64,
    },
    /// Load the local snapshot only.
    Local,
}

/// Snapshot settings of a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Load mode.
    pub load: SnapshotLoad,
    /// Path of the local snapshot file inside the container.
    pub local_path: String,
}

impl SnapshotConfig {
    /// Global `snapshot.csv` at index 0 plus the given local snapshot path.
    pub fn global(local_path: &str) -> Self {
        Self {
            load: SnapshotLoad::Global {
                path: "snapshot.csv".into(),
                index: 0,
            },
            local_path: local_path.into(),
        }
    }

    /// Local snapshot only.
    pub fn local(local_path: &str) -> Self {
        Self {
            load: SnapshotLoad::Local,
            local_path: local_path.into(),
        }
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match &self.load {
            SnapshotLoad::Global { path, index } => {
                args.push("--snapshots.loadType=global".into());
                args.push(format!("--snapshots.global.path={}", path));
                args.push(format!("--snapshots.global.index={}", index));
            }
            SnapshotLoad::Local => {
                args.push("--snapshots.loadType=local".into());
            }
        }
        args.push(format!("--snapshots.local.path={}", self.local_path));
        args
    }
}

/// Public identity and address of the entry node a peer bootstraps from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryNodeRef {
    /// Base58 autopeering public key of the entry node.
    pub public_key: String,
    /// Hostname or IP the entry node is reachable at.
    pub host: String,
    /// Autopeering port of the entry node.
    pub port: u16,
}

impl EntryNodeRef {
    /// Entry node on the default autopeering port.
    pub fn new(public_key: &str, host: &str) -> Self {
        Self {
            public_key: public_key.into(),
            host: host.into(),
            port: AUTOPEERING_PORT,
        }
    }
}

impl fmt::Display for EntryNodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.public_key, self.host, self.port)
    }
}

/// Coordinator parameters. Supplying these turns a peer into the
/// network's milestone issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Coordinator address milestones are signed with.
    pub address: String,
    /// Coordinator seed, passed as `COO_SEED` in the environment.
    pub seed: String,
    /// Seconds between milestones.
    pub interval_secs: u64,
    /// Signature security level.
    pub security_level: u8,
    /// Depth of the coordinator Merkle tree.
    pub merkle_tree_depth: u8,
    /// Proof-of-work difficulty (minimum weight magnitude).
    pub mwm: u32,
}

impl CoordinatorConfig {
    fn build_args(&self) -> Vec<String> {
        vec![
            format!("--coordinator.mwm={}", self.mwm),
            format!("--coordinator.address={}", self.address),
            format!("--coordinator.intervalSeconds={}", self.interval_secs),
            format!("--coordinator.securityLevel={}", self.security_level),
            format!("--coordinator.merkleTreeDepth={}", self.merkle_tree_depth),
        ]
    }
}

/// Full ledger node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Container name.
    pub name: String,
    /// Node image reference.
    pub image: String,
    /// Node log level.
    pub log_level: String,
    /// Plugins to disable.
    pub disabled_plugins: Vec<String>,
    /// Plugins to enable on top of the defaults.
    pub enabled_plugins: Vec<String>,
    /// Snapshot settings.
    pub snapshot: SnapshotConfig,
    /// HTTP API port inside the container.
    pub api_port: u16,
    /// Host port the API is published on, if any.
    pub published_api_port: Option<u16>,
    /// Base58 autopeering seed of this node.
    pub autopeering_seed: String,
    /// Entry node to bootstrap autopeering from.
    pub entry_node: EntryNodeRef,
    /// Coordinator settings; `None` for an ordinary peer.
    pub coordinator: Option<CoordinatorConfig>,
    /// Shared assets volume.
    pub assets: Option<VolumeBinding>,
}

impl PeerConfig {
    /// Ordinary peer with debug logging, the default API port, a global
    /// snapshot and no shared volume.
    pub fn new(name: &str, image: &str, autopeering_seed: &str, entry_node: EntryNodeRef) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            log_level: "debug".into(),
            disabled_plugins: Vec::new(),
            enabled_plugins: Vec::new(),
            snapshot: SnapshotConfig::global("/assets/export.bin"),
            api_port: API_PORT,
            published_api_port: None,
            autopeering_seed: autopeering_seed.into(),
            entry_node,
            coordinator: None,
            assets: None,
        }
    }

    /// Set the log level.
    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the disabled plugin set.
    pub fn disabled_plugins<I, S>(mut self, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_plugins = plugins.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the extra enabled plugin set.
    pub fn enabled_plugins<I, S>(mut self, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_plugins = plugins.into_iter().map(Into::into).collect();
        self
    }

    /// Set the snapshot settings.
    pub fn snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Set the API port inside the container.
    pub fn api_port(mut self, port: u16) -> Self {
        self.api_port = port;
        self
    }

    /// Publish the API port on the host.
    pub fn publish_api(mut self, host_port: u16) -> Self {
        self.published_api_port = Some(host_port);
        self
    }

    /// Run the coordinator plugin with the given parameters.
    pub fn coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Mount the shared assets volume.
    pub fn assets(mut self, volume: VolumeBinding) -> Self {
        self.assets = Some(volume);
        self
    }

    fn enabled_plugin_list(&self) -> String {
        let mut plugins = self.enabled_plugins.clone();
        if self.coordinator.is_some() {
            plugins.push("Coordinator".into());
        }
        plugins.join(",")
    }

    /// Build the command-line arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--logger.level={}", self.log_level),
            format!("--node.disablePlugins={}", self.disabled_plugins.join(",")),
            format!("--node.enablePlugins={}", self.enabled_plugin_list()),
        ];

        if let Some(coordinator) = &self.coordinator {
            args.extend(coordinator.build_args());
        }

        args.extend(self.snapshot.build_args());
        args.push(format!("--httpAPI.bindAddress=0.0.0.0:{}", self.api_port));
        args.push(format!("--autopeering.seed=base58:{}", self.autopeering_seed));
        args.push(format!("--autopeering.entryNodes={}", self.entry_node));
        args
    }

    /// Build the role configuration.
    pub fn build(&self) -> RoleConfig {
        let role = Role::Peer {
            coordinator: self.coordinator.is_some(),
        };
        let api_port = format!("{}/tcp", self.api_port);

        let env = self
            .coordinator
            .iter()
            .map(|c| format!("COO_SEED={}", c.seed))
            .collect();

        let port_bindings = self
            .published_api_port
            .map(|host_port| PortBinding {
                container_port: api_port.clone(),
                host_ip: None,
                host_port,
            })
            .into_iter()
            .collect();

        RoleConfig::new(&self.name, role, &self.image, self.build_args())
            .with_env(env)
            .with_exposed_ports(vec![api_port])
            .with_binds(self.assets.iter().cloned().collect())
            .with_port_bindings(port_bindings)
    }
}
