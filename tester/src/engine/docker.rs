//! Docker backend via the bollard API client.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::models::{EndpointSettings, HostConfig};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, DisconnectNetworkOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    ContainerId, ContainerSpec, Engine, EngineLogStream, Inspection, ListedContainer, SharedEngine,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, HarnessError};

/// Default Docker control socket.
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Upper bound for bollard's HTTP client. Per-call deadlines live in
/// `CallPolicy`; this only has to outlast the longest stop grace period.
const CLIENT_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Connect to the engine socket named in `config` and verify it answers.
///
/// No authentication and no API version negotiation. A failure here is
/// meant to abort the run.
pub async fn connect(config: &EngineConfig) -> Result<SharedEngine, HarnessError> {
    let engine = DockerEngine::connect(&config.socket).await?;
    Ok(Arc::new(engine))
}

/// Connect to the default local socket.
pub async fn connect_local() -> Result<SharedEngine, HarnessError> {
    connect(&EngineConfig::default()).await
}

/// [`Engine`] implementation backed by a local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Bind to a Unix socket path (with or without `unix://`) and ping it.
    pub async fn connect(socket: &str) -> Result<Self, HarnessError> {
        let connection_error = |source: EngineError| HarnessError::Connection {
            socket: socket.to_string(),
            source,
        };

        let docker = Docker::connect_with_unix(socket, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            .map_err(|e| connection_error(e.into()))?;
        let engine = Self { docker };
        engine.ping().await.map_err(connection_error)?;

        info!(socket, "connected to docker engine");
        Ok(engine)
    }

    /// Wrap an already configured bollard client.
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

/// Translate a [`ContainerSpec`] into bollard's create body.
/// Grace period in whole seconds as the engine API takes it, rounded up
/// so a sub-second grace never becomes an immediate kill.
fn stop_grace_secs(grace: Duration) -> i64 {
    let secs = if grace.subsec_nanos() == 0 {
        grace.as_secs()
    } else {
        grace.as_secs().saturating_add(1)
    };
    i64::try_from(secs).unwrap_or(i64::MAX)
}

/// Forced so containers that already exited still leave the network.
fn disconnect_options(id: &ContainerId) -> DisconnectNetworkOptions<String> {
    DisconnectNetworkOptions {
        container: id.to_string(),
        force: true,
    }
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    let exposed_ports = (!spec.exposed_ports.is_empty()).then(|| {
        spec.exposed_ports
            .iter()
            .map(|port| (port.clone(), HashMap::new()))
            .collect::<HashMap<_, _>>()
    });

    let mut port_bindings: HashMap<String, Option<Vec<bollard::models::PortBinding>>> =
        HashMap::new();
    for binding in &spec.port_bindings {
        port_bindings
            .entry(binding.container_port.clone())
            .or_default()
            .get_or_insert_with(Vec::new)
            .push(bollard::models::PortBinding {
                host_ip: binding.host_ip.clone(),
                host_port: Some(binding.host_port.to_string()),
            });
    }

    let host_config = HostConfig {
        binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        cmd: Some(spec.cmd.clone()),
        env: (!spec.env.is_empty()).then(|| spec.env.clone()),
        exposed_ports,
        host_config: Some(host_config),
        ..Default::default()
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec,
    ) -> Result<ContainerId, EngineError> {
        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), container_config(spec))
            .await?;

        for warning in &response.warnings {
            debug!(container = name, %warning, "engine warning on create");
        }

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), EngineError> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<(), EngineError> {
        let options = StopContainerOptions {
            t: stop_grace_secs(grace),
        };
        self.docker
            .stop_container(id.as_str(), Some(options))
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), EngineError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id.as_str(), Some(options))
            .await?;
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<Inspection, EngineError> {
        let response = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await?;

        let state = response.state.unwrap_or_default();
        let networks: BTreeMap<String, String> = response
            .network_settings
            .and_then(|settings| settings.networks)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, endpoint)| (name, endpoint.ip_address.unwrap_or_default()))
            .collect();

        Ok(Inspection {
            id: response.id.unwrap_or_else(|| id.to_string()),
            name: response
                .name
                .map(|name| name.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            running: state.running.unwrap_or(false),
            exit_code: state.exit_code.unwrap_or_default(),
            networks,
        })
    }

    async fn list_containers(&self) -> Result<Vec<ListedContainer>, EngineError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .filter_map(|summary| {
                summary.id.map(|id| ListedContainer {
                    id: ContainerId::new(id),
                    names: summary.names.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn create_network(&self, name: &str) -> Result<String, EngineError> {
        let options = CreateNetworkOptions {
            name: name.to_string(),
            check_duplicate: true,
            driver: "bridge".to_string(),
            ..Default::default()
        };
        self.docker.create_network(options).await?;
        Ok(name.to_string())
    }

    async fn remove_network(&self, network: &str) -> Result<(), EngineError> {
        self.docker.remove_network(network).await?;
        Ok(())
    }

    async fn connect_network(&self, network: &str, id: &ContainerId) -> Result<(), EngineError> {
        let options = ConnectNetworkOptions {
            container: id.to_string(),
            endpoint_config: EndpointSettings::default(),
        };
        self.docker.connect_network(network, options).await?;
        Ok(())
    }

    async fn disconnect_network(
        &self,
        network: &str,
        id: &ContainerId,
    ) -> Result<(), EngineError> {
        self.docker
            .disconnect_network(network, disconnect_options(id))
            .await?;
        Ok(())
    }

    fn logs(&self, id: &ContainerId, follow: bool) -> EngineLogStream {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow,
            timestamps: false,
            ..Default::default()
        };

        self.docker
            .logs(id.as_str(), Some(options))
            .map(|chunk| {
                chunk
                    .map(|output| output.into_bytes().to_vec())
                    .map_err(EngineError::from)
            })
            .boxed()
    }
}
