//! Test network orchestration.
//!
//! [`TestNetwork`] owns one isolated run: a uniquely named engine network
//! plus every container deployed into it. Nodes join the run network before
//! they start, so their addresses on it are known as soon as `start`
//! returns. Chaos agents stay outside the network and reach their targets
//! through the engine socket.
//!
//! Container names are global on the engine, so every container a run
//! creates is named `<run id>-<name>`. Lookups take the plain name.

use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::container::Container;
use crate::deadline::CallPolicy;
use crate::engine::SharedEngine;
use crate::error::{HarnessError, Result};
use crate::network;
use crate::roles::{
    ChaosAgentConfig, EntryNodeConfig, EntryNodeRef, PeerConfig, Role, RoleConfig, VolumeBinding,
};

/// Name of the entry node within a run.
pub const ENTRY_NODE_NAME: &str = "entry_node";

/// One isolated multi-node test run.
pub struct TestNetwork {
    engine: SharedEngine,
    config: HarnessConfig,
    run_id: String,
    policy: CallPolicy,
    entry_node: Option<EntryNodeRef>,
    nodes: Vec<Container>,
    agents: Vec<Container>,
}

impl TestNetwork {
    /// Create the run network `<prefix>-<uuid>`.
    pub async fn new(engine: SharedEngine, config: &HarnessConfig) -> Result<Self> {
        let run_id = format!(
            "{}-{}",
            config.network.name_prefix,
            uuid::Uuid::new_v4().as_simple()
        );
        let policy = config.engine.call_policy();

        policy
            .run("network create", async {
                engine
                    .create_network(&run_id)
                    .await
                    .map_err(|source| HarnessError::Engine {
                        op: "network create",
                        id: run_id.clone(),
                        source,
                    })
            })
            .await?;
        info!(network = %run_id, "created run network");

        Ok(Self {
            engine,
            config: config.clone(),
            run_id,
            policy,
            entry_node: None,
            nodes: Vec::new(),
            agents: Vec::new(),
        })
    }

    /// Unique id of this run, also the name of its network.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Name of the run network.
    pub fn network(&self) -> &str {
        &self.run_id
    }

    /// Settings this run was created with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Reference peers use to reach the entry node, once deployed.
    pub fn entry_node(&self) -> Option<&EntryNodeRef> {
        self.entry_node.as_ref()
    }

    /// Engine-side container name for `name` in this run.
    pub fn container_name(&self, name: &str) -> String {
        format!("{}-{}", self.run_id, name)
    }

    /// Deployed node (entry node or peer) by name.
    pub fn container(&self, name: &str) -> Option<&Container> {
        let scoped = self.container_name(name);
        self.nodes.iter().find(|c| c.name() == scoped)
    }

    fn node(&self, name: &str) -> Result<&Container> {
        self.container(name)
            .ok_or_else(|| HarnessError::ContainerNotFound {
                name: name.to_string(),
            })
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut Container> {
        let scoped = self.container_name(name);
        self.nodes
            .iter_mut()
            .find(|c| c.name() == scoped)
            .ok_or_else(|| HarnessError::ContainerNotFound {
                name: name.to_string(),
            })
    }

    /// Create, optionally attach, then start. A container that fails to
    /// attach or start is removed again before the error is returned.
    async fn launch(&self, role: RoleConfig, attach: bool) -> Result<Container> {
        let mut container =
            Container::create_with_policy(&self.engine, role, None, self.policy.clone()).await?;

        let started = async {
            if attach {
                container.connect_to_network(&self.run_id).await?;
            }
            container.start().await
        }
        .await;

        if let Err(e) = started {
            let name = container.name().to_string();
            if let Err(cleanup) = container.remove().await {
                warn!(container = %name, error = %cleanup, "failed to remove container after failed launch");
            }
            return Err(e);
        }
        Ok(container)
    }

    /// Deploy the entry node with the given autopeering identity.
    ///
    /// `public_key` must be the key derived from `seed`; peers deployed
    /// afterwards bootstrap from it, addressing it by its container name.
    pub async fn deploy_entry_node(&mut self, seed: &str, public_key: &str) -> Result<&Container> {
        let host = self.container_name(ENTRY_NODE_NAME);
        let role = EntryNodeConfig::new(&host, &self.config.images.node, seed)
            .log_level(&self.config.node.log_level)
            .disabled_plugins(self.config.node.entry_node_disabled_plugins.iter().cloned())
            .build();

        let container = self.launch(role, true).await?;
        info!(container = %host, network = %self.run_id, "entry node deployed");

        let mut entry = EntryNodeRef::new(public_key, &host);
        entry.port = self.config.node.autopeering_port;
        self.entry_node = Some(entry);

        self.nodes.push(container);
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    /// Peer configuration prefilled from the run settings and the deployed
    /// entry node.
    pub fn peer_config(&self, name: &str, seed: &str) -> Result<PeerConfig> {
        let entry = self
            .entry_node
            .clone()
            .ok_or_else(|| HarnessError::ContainerNotFound {
                name: ENTRY_NODE_NAME.to_string(),
            })?;

        Ok(PeerConfig::new(name, &self.config.images.node, seed, entry)
            .log_level(&self.config.node.log_level)
            .api_port(self.config.node.api_port)
            .assets(VolumeBinding::read_write(
                &self.config.assets.volume,
                &self.config.assets.mount_path,
            )))
    }

    /// Deploy a peer (or the coordinator) into the run network.
    pub async fn deploy_peer(&mut self, mut config: PeerConfig) -> Result<&Container> {
        config.name = self.container_name(&config.name);
        let container = self.launch(config.build(), true).await?;
        info!(
            container = %config.name,
            coordinator = config.coordinator.is_some(),
            network = %self.run_id,
            "peer deployed"
        );

        self.nodes.push(container);
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    /// Start a chaos agent. It does not join the run network.
    pub async fn deploy_chaos_agent(&mut self, mut config: ChaosAgentConfig) -> Result<&Container> {
        config.name = self.container_name(&config.name);
        debug!(command = %config.command().build_command(), "chaos agent command");
        let container = self.launch(config.build(), false).await?;
        info!(
            container = %config.name,
            target = %config.target_container,
            targets = config.target_ips.len(),
            "chaos agent deployed"
        );

        self.agents.push(container);
        Ok(&self.agents[self.agents.len() - 1])
    }

    /// Address of a deployed node on the run network.
    pub async fn ip_of(&self, name: &str) -> Result<IpAddr> {
        self.node(name)?.ip(&self.run_id).await
    }

    /// Addresses of every deployed peer on the run network, in deployment
    /// order. The entry node is not included.
    pub async fn peer_ips(&self) -> Result<Vec<IpAddr>> {
        let peers = self
            .nodes
            .iter()
            .filter(|c| matches!(c.role(), Some(Role::Peer { .. })));
        network::collect_ips(peers, &self.run_id).await
    }

    /// Current logs of a deployed node.
    pub async fn logs_of(&self, name: &str) -> Result<String> {
        self.node(name)?.log_snapshot().await
    }

    /// Stop a node with the configured grace period.
    pub async fn stop_node(&mut self, name: &str) -> Result<()> {
        let timeout = self.config.engine.stop_timeout();
        self.node_mut(name)?.stop(timeout).await
    }

    /// Start a previously stopped node again.
    pub async fn start_node(&mut self, name: &str) -> Result<()> {
        self.node_mut(name)?.start().await
    }

    /// Drop all traffic between `target` and `peers` for `duration`.
    ///
    /// Agents are named `pumba-<target>-<n>`, `n` counting agents in this
    /// run, so a target can be partitioned more than once.
    pub async fn partition(
        &mut self,
        target: &str,
        peers: &[&str],
        duration: Duration,
    ) -> Result<&Container> {
        let name = format!("pumba-{}-{}", target, self.agents.len() + 1);
        let agent = {
            let target = self.node(target)?;
            let peers = peers
                .iter()
                .map(|name| self.node(name))
                .collect::<Result<Vec<_>>>()?;

            network::partition(&name, target, peers, &self.run_id, duration)
                .await?
                .image(&self.config.images.chaos)
                .tc_image(&self.config.images.tc)
                .engine_socket(&self.config.engine.socket)
        };

        self.deploy_chaos_agent(agent).await
    }

    /// Remove every container and the run network.
    ///
    /// Keeps going after individual failures and returns the first one.
    pub async fn teardown(self) -> Result<()> {
        let mut first_error = None;

        for container in self.agents.into_iter().chain(self.nodes) {
            let name = container.name().to_string();
            if let Err(e) = container.remove().await {
                warn!(container = %name, error = %e, "failed to remove container");
                first_error = first_error.or(Some(e));
            }
        }

        let removed = self
            .policy
            .run("network remove", async {
                self.engine
                    .remove_network(&self.run_id)
                    .await
                    .map_err(|source| HarnessError::Engine {
                        op: "network remove",
                        id: self.run_id.clone(),
                        source,
                    })
            })
            .await;
        match removed {
            Ok(()) => info!(network = %self.run_id, "run network removed"),
            Err(e) => {
                warn!(network = %self.run_id, error = %e, "failed to remove run network");
                first_error = first_error.or(Some(e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use crate::roles::CoordinatorConfig;
    use std::sync::Arc;

    const ENTRY_SEED: &str = "YVnQ4X7KsW1PqA6n9aZhRkSgM3tJdCy2BoUe8fLxHwV";
    const ENTRY_KEY: &str = "H3dt2WgyrtYHMvAwmGLRxB6c6LrsemaTnf7uCQkFKgUH";

    async fn setup() -> (MockEngine, TestNetwork) {
        let mock = MockEngine::new();
        let shared: SharedEngine = Arc::new(mock.clone());
        let net = TestNetwork::new(shared, &HarnessConfig::default())
            .await
            .unwrap();
        (mock, net)
    }

    async fn with_peers(names: &[&str]) -> (MockEngine, TestNetwork) {
        let (mock, mut net) = setup().await;
        net.deploy_entry_node(ENTRY_SEED, ENTRY_KEY).await.unwrap();
        for name in names {
            let config = net.peer_config(name, "PEERSEED").unwrap();
            net.deploy_peer(config).await.unwrap();
        }
        (mock, net)
    }

    #[tokio::test]
    async fn new_creates_unique_run_network() {
        let (mock, net) = setup().await;
        assert!(net.run_id().starts_with("tester-"));
        assert!(mock.network_names().contains(&net.run_id().to_string()));

        let (_other_mock, other) = setup().await;
        assert_ne!(net.run_id(), other.run_id());
    }

    #[tokio::test]
    async fn entry_node_is_attached_and_running() {
        let (mock, mut net) = setup().await;
        let host = format!("{}-entry_node", net.run_id());
        let entry = net.deploy_entry_node(ENTRY_SEED, ENTRY_KEY).await.unwrap();
        assert_eq!(entry.name(), host);

        let specs = mock.created_specs();
        assert!(specs[0]
            .1
            .cmd
            .contains(&format!("--autopeering.seed=base58:{}", ENTRY_SEED)));
        assert!(net.ip_of(ENTRY_NODE_NAME).await.is_ok());
        assert_eq!(
            net.entry_node().unwrap().to_string(),
            format!("{}@{}:14626", ENTRY_KEY, host)
        );
    }

    #[tokio::test]
    async fn peer_config_requires_entry_node() {
        let (_mock, net) = setup().await;
        let err = net.peer_config("peer-1", "SEED").unwrap_err();
        assert!(err.to_string().contains("entry_node"));
    }

    #[tokio::test]
    async fn peers_bootstrap_from_entry_node() {
        let (mock, net) = with_peers(&["peer-1"]).await;
        let specs = mock.created_specs();
        let (name, spec) = &specs[1];

        assert_eq!(name, &net.container_name("peer-1"));
        assert!(spec.cmd.contains(&format!(
            "--autopeering.entryNodes={}@{}:14626",
            ENTRY_KEY,
            net.container_name(ENTRY_NODE_NAME)
        )));
        assert_eq!(spec.binds, vec!["hornet-testing-assets:/assets:rw"]);
        assert!(net.container("peer-1").is_some());
    }

    #[tokio::test]
    async fn peer_ips_follow_deployment_order() {
        let (_mock, net) = with_peers(&["peer-1", "peer-2", "peer-3"]).await;
        let ips = net.peer_ips().await.unwrap();

        assert_eq!(ips.len(), 3);
        assert_eq!(ips[0], net.ip_of("peer-1").await.unwrap());
        assert_eq!(ips[2], net.ip_of("peer-3").await.unwrap());
        assert!(!ips.contains(&net.ip_of(ENTRY_NODE_NAME).await.unwrap()));
    }

    #[tokio::test]
    async fn coordinator_peer_is_deployed_with_seed() {
        let (mock, mut net) = with_peers(&[]).await;
        let config = net
            .peer_config("coo", "COOSEED")
            .unwrap()
            .coordinator(CoordinatorConfig {
                address: "JFQ999".into(),
                seed: "COO_SECRET".into(),
                interval_secs: 10,
                security_level: 2,
                merkle_tree_depth: 8,
                mwm: 5,
            });
        net.deploy_peer(config).await.unwrap();

        let specs = mock.created_specs();
        assert_eq!(specs[1].1.env, vec!["COO_SEED=COO_SECRET"]);
    }

    #[tokio::test]
    async fn unknown_node_is_not_found() {
        let (_mock, net) = with_peers(&["peer-1"]).await;
        let err = net.ip_of("peer-9").await.unwrap_err();
        assert!(matches!(err, HarnessError::ContainerNotFound { .. }));
        assert!(net.logs_of("peer-9").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn logs_of_reads_snapshot() {
        let (mock, net) = with_peers(&["peer-1"]).await;
        mock.push_log(net.container("peer-1").unwrap().id(), b"synced\n");
        assert_eq!(net.logs_of("peer-1").await.unwrap(), "synced\n");
    }

    #[tokio::test]
    async fn partition_targets_peer_ips() {
        let (mock, mut net) = with_peers(&["peer-1", "peer-2", "peer-3"]).await;
        let peer_2 = net.ip_of("peer-2").await.unwrap();
        let peer_3 = net.ip_of("peer-3").await.unwrap();
        let target = net.container_name("peer-1");
        let agent_name = net.container_name("pumba-peer-1-1");

        let agent = net
            .partition("peer-1", &["peer-2", "peer-3"], Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(agent.name(), agent_name);
        assert_eq!(agent.role(), Some(Role::ChaosAgent));

        let specs = mock.created_specs();
        let (_, spec) = specs.last().unwrap();
        assert_eq!(spec.image, "gaiaadm/pumba:0.7.2");
        assert!(spec.cmd.contains(&"--duration=1m".to_string()));
        assert!(spec.cmd.contains(&format!("--target={}", peer_2)));
        assert!(spec.cmd.contains(&format!("--target={}", peer_3)));
        assert_eq!(spec.cmd.last(), Some(&target));
    }

    #[tokio::test]
    async fn repeated_partitions_of_one_target_get_distinct_agents() {
        let (mock, mut net) = with_peers(&["peer-1", "peer-2"]).await;
        for _ in 0..2 {
            net.partition("peer-1", &["peer-2"], Duration::from_secs(60))
                .await
                .unwrap();
        }

        let names = mock.container_names();
        assert!(names.contains(&net.container_name("pumba-peer-1-1")));
        assert!(names.contains(&net.container_name("pumba-peer-1-2")));
    }

    #[tokio::test]
    async fn runs_sharing_an_engine_do_not_collide() {
        let mock = MockEngine::new();
        let shared: SharedEngine = Arc::new(mock.clone());
        let config = HarnessConfig::default();

        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut net = TestNetwork::new(shared.clone(), &config).await.unwrap();
            net.deploy_entry_node(ENTRY_SEED, ENTRY_KEY).await.unwrap();
            let peer = net.peer_config("peer-1", "PEERSEED").unwrap();
            net.deploy_peer(peer).await.unwrap();
            net.partition("peer-1", &["entry_node"], Duration::from_secs(60))
                .await
                .unwrap();
            runs.push(net);
        }

        assert_eq!(mock.container_names().len(), 6);
        assert_ne!(
            runs[0].container("peer-1").unwrap().id(),
            runs[1].container("peer-1").unwrap().id()
        );
        assert_ne!(runs[0].entry_node(), runs[1].entry_node());

        for net in runs {
            net.teardown().await.unwrap();
        }
        assert!(mock.container_names().is_empty());
    }

    #[tokio::test]
    async fn partition_with_unknown_peer_deploys_nothing() {
        let (mock, mut net) = with_peers(&["peer-1"]).await;
        let before = mock.created_specs().len();

        let err = net
            .partition("peer-1", &["ghost"], Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(mock.created_specs().len(), before);
    }

    #[tokio::test]
    async fn stop_and_restart_node() {
        let (mock, mut net) = with_peers(&["peer-1"]).await;
        net.stop_node("peer-1").await.unwrap();
        assert_eq!(mock.stop_graces(), vec![Duration::from_secs(180)]);
        assert!(matches!(
            net.ip_of("peer-1").await.unwrap_err(),
            HarnessError::AddressUnassigned { .. }
        ));

        net.start_node("peer-1").await.unwrap();
        assert!(net.ip_of("peer-1").await.is_ok());
    }

    #[tokio::test]
    async fn failed_start_removes_container() {
        let (mock, mut net) = with_peers(&[]).await;
        mock.fail_next("start_container", 500, "port is already allocated");

        let config = net.peer_config("peer-1", "SEED").unwrap();
        let err = net.deploy_peer(config).await.unwrap_err();
        assert!(matches!(err, HarnessError::Engine { op: "start", .. }));
        assert!(!mock.container_names().contains(&net.container_name("peer-1")));
        assert!(net.container("peer-1").is_none());
    }

    #[tokio::test]
    async fn missing_image_fails_deploy() {
        let (mock, mut net) = setup().await;
        mock.remove_image("hornet:dev");

        let err = net
            .deploy_entry_node(ENTRY_SEED, ENTRY_KEY)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Create { .. }));
        assert!(net.entry_node().is_none());
    }

    #[tokio::test]
    async fn teardown_removes_everything() {
        let (mock, mut net) = with_peers(&["peer-1", "peer-2"]).await;
        net.partition("peer-1", &["peer-2"], Duration::from_secs(60))
            .await
            .unwrap();
        let network = net.network().to_string();

        net.teardown().await.unwrap();
        assert!(mock.container_names().is_empty());
        assert!(!mock.network_names().contains(&network));
    }

    #[tokio::test]
    async fn teardown_continues_past_failures() {
        let (mock, net) = with_peers(&["peer-1", "peer-2"]).await;
        let entry = net.container_name(ENTRY_NODE_NAME);
        mock.fail_next("remove_container", 500, "driver failed");

        let err = net.teardown().await.unwrap_err();
        assert!(matches!(err, HarnessError::Engine { op: "remove", .. }));
        // First removal failed; the rest went through.
        assert_eq!(mock.container_names(), vec![entry]);
    }
}
