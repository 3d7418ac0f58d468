//! Entry node configuration.

use super::{Role, RoleConfig, ENTRY_NODE_DISABLED_PLUGINS};

/// Bootstrap-only node that peers use as their autopeering rendezvous.
///
/// Always runs with the entry-node plugin set disabled and an empty
/// entry-node list, so it never tries to bootstrap into itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryNodeConfig {
    /// Container name.
    pub name: String,
    /// Node image reference.
    pub image: String,
    /// Node log level.
    pub log_level: String,
    /// Plugins to disable.
    pub disabled_plugins: Vec<String>,
    /// Base58 autopeering seed.
    pub seed: String,
}

impl EntryNodeConfig {
    /// Entry node with the default disabled plugin set and debug logging.
    pub fn new(name: &str, image: &str, seed: &str) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            log_level: "debug".into(),
            disabled_plugins: ENTRY_NODE_DISABLED_PLUGINS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            seed: seed.into(),
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

    /// Build the command-line arguments.
    pub fn build_args(&self) -> Vec<String> {
        vec![
            format!("--logger.level={}", self.log_level),
            format!("--node.disablePlugins={}", self.disabled_plugins.join(",")),
            "--autopeering.entryNodes=".into(),
            format!("--autopeering.seed=base58:{}", self.seed),
        ]
    }

    /// Build the role configuration.
    pub fn build(&self) -> RoleConfig {
        RoleConfig::new(&self.name, Role::EntryNode, &self.image, self.build_args())
    }
}
