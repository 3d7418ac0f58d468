//! Mock engine for testing.
//!
//! Keeps containers and networks in memory and answers with the same status
//! codes Docker uses, so orchestration code can be exercised without a
//! daemon. Also records stop grace periods and supports injected failures.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{ContainerId, ContainerSpec, Engine, EngineLogStream, Inspection, ListedContainer};
use crate::error::EngineError;

/// Network every new container joins, mirroring Docker's default bridge.
const DEFAULT_NETWORK: &str = "bridge";

/// In-memory [`Engine`].
///
/// Clones share state, so a test can keep a clone for assertions while the
/// harness owns another behind a `SharedEngine`.
#[derive(Debug, Default, Clone)]
pub struct MockEngine {
    inner: Arc<Mutex<MockEngineInner>>,
}

#[derive(Debug, Default)]
struct MockEngineInner {
    unreachable: bool,
    latency: Option<Duration>,
    next_id: u64,
    containers: BTreeMap<String, MockContainer>,
    networks: BTreeMap<String, MockNetwork>,
    missing_images: Vec<String>,
    failures: HashMap<&'static str, EngineError>,
    stop_graces: Vec<Duration>,
    created_specs: Vec<(String, ContainerSpec)>,
}

#[derive(Debug)]
struct MockContainer {
    id: ContainerId,
    name: String,
    running: bool,
    exit_code: i64,
    next_exit_code: i64,
    /// Network name -> assigned address (empty while stopped).
    networks: BTreeMap<String, String>,
    logs: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct MockNetwork {
    subnet: u8,
    next_host: u8,
}

fn status(status: u16, message: impl Into<String>) -> EngineError {
    EngineError::Status {
        status,
        message: message.into(),
    }
}

impl MockEngine {
    /// Create an empty engine with only the default bridge network.
    pub fn new() -> Self {
        let engine = Self::default();
        engine.inner().networks.insert(
            DEFAULT_NETWORK.to_string(),
            MockNetwork {
                subnet: 17,
                next_host: 2,
            },
        );
        engine
    }

    fn inner(&self) -> MutexGuard<'_, MockEngineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail as if the control socket were gone.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner().unreachable = unreachable;
    }

    /// Delay every call by `latency` before it is answered.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.inner().latency = latency;
    }

    /// Make `create_container` fail with "No such image" for `image`.
    pub fn remove_image(&self, image: &str) {
        self.inner().missing_images.push(image.to_string());
    }

    /// Cause the next call of `op` (e.g. `"start_container"`) to fail.
    pub fn fail_next(&self, op: &'static str, status_code: u16, message: &str) {
        self.inner().failures.insert(op, status(status_code, message));
    }

    /// Exit code the container reports after its next stop.
    pub fn set_exit_code(&self, id: &ContainerId, code: i64) {
        if let Some(container) = self.inner().containers.get_mut(id.as_str()) {
            container.next_exit_code = code;
        }
    }

    /// Append a chunk to a container's log buffer.
    pub fn push_log(&self, id: &ContainerId, chunk: &[u8]) {
        if let Some(container) = self.inner().containers.get_mut(id.as_str()) {
            container.logs.push(chunk.to_vec());
        }
    }

    /// Grace periods passed to every `stop_container` call, in order.
    pub fn stop_graces(&self) -> Vec<Duration> {
        self.inner().stop_graces.clone()
    }

    /// Names and specs of every successful `create_container` call.
    pub fn created_specs(&self) -> Vec<(String, ContainerSpec)> {
        self.inner().created_specs.clone()
    }

    /// Names of all containers that currently exist.
    pub fn container_names(&self) -> Vec<String> {
        self.inner()
            .containers
            .values()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Names of all networks that currently exist.
    pub fn network_names(&self) -> Vec<String> {
        self.inner().networks.keys().cloned().collect()
    }

    /// Run a container directly, bypassing create/start. Returns its id.
    pub fn seed_running(&self, name: &str) -> ContainerId {
        let mut inner = self.inner();
        let id = inner.allocate_id();
        inner.containers.insert(
            id.to_string(),
            MockContainer {
                id: id.clone(),
                name: name.to_string(),
                running: true,
                exit_code: 0,
                next_exit_code: 0,
                networks: BTreeMap::new(),
                logs: Vec::new(),
            },
        );
        id
    }

    async fn enter(&self, op: &'static str) -> Result<(), EngineError> {
        let latency = self.inner().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.inner();
        if inner.unreachable {
            return Err(status(503, "cannot connect to the engine socket"));
        }
        if let Some(error) = inner.failures.remove(op) {
            return Err(error);
        }
        Ok(())
    }
}

impl MockEngineInner {
    fn allocate_id(&mut self) -> ContainerId {
        self.next_id += 1;
        ContainerId::new(format!("{:064x}", 0x5eed_0000_u64 + self.next_id))
    }

    fn container(&mut self, id: &ContainerId) -> Result<&mut MockContainer, EngineError> {
        self.containers
            .get_mut(id.as_str())
            .ok_or_else(|| status(404, format!("No such container: {}", id)))
    }

    fn assign_address(&mut self, network: &str) -> String {
        match self.networks.get_mut(network) {
            Some(net) => {
                let host = net.next_host;
                net.next_host = net.next_host.wrapping_add(1);
                format!("172.{}.0.{}", net.subnet, host)
            }
            None => String::new(),
        }
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.enter("ping").await
    }

    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec,
    ) -> Result<ContainerId, EngineError> {
        self.enter("create_container").await?;
        let mut inner = self.inner();

        if inner.missing_images.contains(&spec.image) {
            return Err(status(404, format!("No such image: {}", spec.image)));
        }
        if inner.containers.values().any(|c| c.name == name) {
            return Err(status(
                409,
                format!("Conflict. The container name \"/{}\" is already in use", name),
            ));
        }

        let id = inner.allocate_id();
        let mut networks = BTreeMap::new();
        networks.insert(DEFAULT_NETWORK.to_string(), String::new());
        inner.containers.insert(
            id.to_string(),
            MockContainer {
                id: id.clone(),
                name: name.to_string(),
                running: false,
                exit_code: 0,
                next_exit_code: 0,
                networks,
                logs: Vec::new(),
            },
        );
        inner.created_specs.push((name.to_string(), spec.clone()));
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), EngineError> {
        self.enter("start_container").await?;
        let mut inner = self.inner();

        let attached: Vec<String> = {
            let container = inner.container(id)?;
            if container.running {
                return Err(status(304, "container already started"));
            }
            container.networks.keys().cloned().collect()
        };

        let addresses: Vec<(String, String)> = attached
            .into_iter()
            .map(|network| {
                let address = inner.assign_address(&network);
                (network, address)
            })
            .collect();

        let container = inner.container(id)?;
        container.running = true;
        container.exit_code = 0;
        container.networks.extend(addresses);
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<(), EngineError> {
        self.enter("stop_container").await?;
        let mut inner = self.inner();
        inner.stop_graces.push(grace);

        let container = inner.container(id)?;
        if !container.running {
            return Err(status(304, "container already stopped"));
        }
        container.running = false;
        container.exit_code = container.next_exit_code;
        container.networks.values_mut().for_each(String::clear);
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), EngineError> {
        self.enter("remove_container").await?;
        let mut inner = self.inner();
        inner
            .containers
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| status(404, format!("No such container: {}", id)))
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<Inspection, EngineError> {
        self.enter("inspect_container").await?;
        let mut inner = self.inner();
        let container = inner.container(id)?;

        Ok(Inspection {
            id: container.id.to_string(),
            name: container.name.clone(),
            running: container.running,
            exit_code: container.exit_code,
            networks: container.networks.clone(),
        })
    }

    async fn list_containers(&self) -> Result<Vec<ListedContainer>, EngineError> {
        self.enter("list_containers").await?;
        let inner = self.inner();

        Ok(inner
            .containers
            .values()
            .filter(|c| c.running)
            .map(|c| ListedContainer {
                id: c.id.clone(),
                names: vec![format!("/{}", c.name)],
            })
            .collect())
    }

    async fn create_network(&self, name: &str) -> Result<String, EngineError> {
        self.enter("create_network").await?;
        let mut inner = self.inner();

        if inner.networks.contains_key(name) {
            return Err(status(409, format!("network with name {} already exists", name)));
        }
        let subnet = 18 + inner.networks.len() as u8;
        inner.networks.insert(
            name.to_string(),
            MockNetwork {
                subnet,
                next_host: 2,
            },
        );
        Ok(name.to_string())
    }

    async fn remove_network(&self, network: &str) -> Result<(), EngineError> {
        self.enter("remove_network").await?;
        let mut inner = self.inner();

        if !inner.networks.contains_key(network) {
            return Err(status(404, format!("network {} not found", network)));
        }
        if inner
            .containers
            .values()
            .any(|c| c.networks.contains_key(network))
        {
            return Err(status(
                403,
                format!("error while removing network: network {} has active endpoints", network),
            ));
        }
        inner.networks.remove(network);
        Ok(())
    }

    async fn connect_network(&self, network: &str, id: &ContainerId) -> Result<(), EngineError> {
        self.enter("connect_network").await?;
        let mut inner = self.inner();

        if !inner.networks.contains_key(network) {
            return Err(status(404, format!("network {} not found", network)));
        }
        let running = {
            let container = inner.container(id)?;
            if container.networks.contains_key(network) {
                return Err(status(
                    403,
                    format!("endpoint with name {} already exists in network {}", container.name, network),
                ));
            }
            container.running
        };

        let address = if running {
            inner.assign_address(network)
        } else {
            String::new()
        };
        inner
            .container(id)?
            .networks
            .insert(network.to_string(), address);
        Ok(())
    }

    async fn disconnect_network(
        &self,
        network: &str,
        id: &ContainerId,
    ) -> Result<(), EngineError> {
        self.enter("disconnect_network").await?;
        let mut inner = self.inner();

        if !inner.networks.contains_key(network) {
            return Err(status(404, format!("network {} not found", network)));
        }
        let container = inner.container(id)?;
        container
            .networks
            .remove(network)
            .map(|_| ())
            .ok_or_else(|| {
                status(
                    404,
                    format!("container {} is not connected to network {}", id, network),
                )
            })
    }

    fn logs(&self, id: &ContainerId, _follow: bool) -> EngineLogStream {
        let chunks: Vec<Result<Vec<u8>, EngineError>> = match self.inner().containers.get(id.as_str())
        {
            Some(container) => container.logs.iter().cloned().map(Ok).collect(),
            None => vec![Err(status(404, format!("No such container: {}", id)))],
        };
        stream::iter(chunks).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let engine = MockEngine::new();
        let spec = ContainerSpec {
            image: "hornet:dev".into(),
            ..Default::default()
        };
        engine.create_container("peer-1", &spec).await.unwrap();

        let err = engine.create_container("peer-1", &spec).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn addresses_assigned_on_start_and_cleared_on_stop() {
        let engine = MockEngine::new();
        let id = engine
            .create_container("peer-1", &ContainerSpec::default())
            .await
            .unwrap();

        let before = engine.inspect_container(&id).await.unwrap();
        assert_eq!(before.networks["bridge"], "");

        engine.start_container(&id).await.unwrap();
        let running = engine.inspect_container(&id).await.unwrap();
        assert_eq!(running.networks["bridge"], "172.17.0.2");

        engine
            .stop_container(&id, Duration::from_secs(1))
            .await
            .unwrap();
        let stopped = engine.inspect_container(&id).await.unwrap();
        assert_eq!(stopped.networks["bridge"], "");
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let engine = MockEngine::new();
        engine.fail_next("ping", 500, "boom");

        assert!(engine.ping().await.is_err());
        assert!(engine.ping().await.is_ok());
    }

    #[tokio::test]
    async fn network_with_endpoints_cannot_be_removed() {
        let engine = MockEngine::new();
        engine.create_network("tangle").await.unwrap();
        let id = engine
            .create_container("peer-1", &ContainerSpec::default())
            .await
            .unwrap();
        engine.connect_network("tangle", &id).await.unwrap();

        let err = engine.remove_network("tangle").await.unwrap_err();
        assert_eq!(err.status(), Some(403));

        engine.disconnect_network("tangle", &id).await.unwrap();
        engine.remove_network("tangle").await.unwrap();
    }

    #[tokio::test]
    async fn logs_of_unknown_container_fail() {
        let engine = MockEngine::new();
        let mut logs = engine.logs(&ContainerId::new("missing"), false);
        let first = logs.next().await.unwrap();
        assert!(first.unwrap_err().is_not_found());
    }
}
