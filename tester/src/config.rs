//! Configuration loading for ledger-tester.
//!
//! Configuration is loaded from a TOML file. Every field has a default, so
//! an empty file (or [`HarnessConfig::default`]) describes a local Docker
//! setup running `hornet:dev` nodes.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::deadline::{CallPolicy, StopTimeout};
use crate::engine::DEFAULT_SOCKET;
use crate::error::ConfigError;
use crate::pumba::{PUMBA_IMAGE, TC_IMAGE};
use crate::roles::{API_PORT, AUTOPEERING_PORT, ENTRY_NODE_DISABLED_PLUGINS};

/// Root configuration for a test run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarnessConfig {
    /// Engine connection settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Images used for each role.
    #[serde(default)]
    pub images: ImagesConfig,
    /// Run network settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Shared assets volume.
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Node settings shared by entry node and peers.
    #[serde(default)]
    pub node: NodeConfig,
}

/// Engine connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Control socket path (default: /var/run/docker.sock).
    #[serde(default = "default_socket")]
    pub socket: String,
    /// Per-call timeout in seconds, 0 for unbounded (default: 60).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Stop grace period in seconds (default: 180).
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

/// Image configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    /// Ledger node image (default: hornet:dev).
    #[serde(default = "default_node_image")]
    pub node: String,
    /// Chaos agent image (default: gaiaadm/pumba:0.7.2).
    #[serde(default = "default_chaos_image")]
    pub chaos: String,
    /// Image providing `tc` for the chaos agent (default: gaiadocker/iproute2).
    #[serde(default = "default_tc_image")]
    pub tc: String,
}

/// Run network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Prefix of the per-run network name (default: tester).
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

/// Assets volume configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Named volume holding snapshots and other test assets.
    #[serde(default = "default_assets_volume")]
    pub volume: String,
    /// Mount point inside node containers (default: /assets).
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
}

/// Node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Node log level (default: debug).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// HTTP API port inside the container (default: 14265).
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Autopeering port of the entry node (default: 14626).
    #[serde(default = "default_autopeering_port")]
    pub autopeering_port: u16,
    /// Plugins the entry node disables.
    #[serde(default = "default_entry_node_disabled_plugins")]
    pub entry_node_disabled_plugins: Vec<String>,
}

fn default_socket() -> String {
    DEFAULT_SOCKET.to_string()
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_stop_timeout_secs() -> u64 {
    180 // 3 minutes
}

fn default_node_image() -> String {
    "hornet:dev".to_string()
}

fn default_chaos_image() -> String {
    PUMBA_IMAGE.to_string()
}

fn default_tc_image() -> String {
    TC_IMAGE.to_string()
}

fn default_name_prefix() -> String {
    "tester".to_string()
}

fn default_assets_volume() -> String {
    "hornet-testing-assets".to_string()
}

fn default_mount_path() -> String {
    "/assets".to_string()
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_api_port() -> u16 {
    API_PORT
}

fn default_autopeering_port() -> u16 {
    AUTOPEERING_PORT
}

fn default_entry_node_disabled_plugins() -> Vec<String> {
    ENTRY_NODE_DISABLED_PLUGINS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            call_timeout_secs: default_call_timeout_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            node: default_node_image(),
            chaos: default_chaos_image(),
            tc: default_tc_image(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            volume: default_assets_volume(),
            mount_path: default_mount_path(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_port: default_api_port(),
            autopeering_port: default_autopeering_port(),
            entry_node_disabled_plugins: default_entry_node_disabled_plugins(),
        }
    }
}

impl EngineConfig {
    /// Call policy described by `call_timeout_secs`.
    pub fn call_policy(&self) -> CallPolicy {
        match self.call_timeout_secs {
            0 => CallPolicy::unbounded(),
            secs => CallPolicy::with_timeout(Duration::from_secs(secs)),
        }
    }

    /// Stop grace period described by `stop_timeout_secs`.
    pub fn stop_timeout(&self) -> StopTimeout {
        let grace = Duration::from_secs(self.stop_timeout_secs);
        if grace == StopTimeout::Default.grace() {
            StopTimeout::Default
        } else {
            StopTimeout::Explicit(grace)
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
