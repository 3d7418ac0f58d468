//! Container engine abstraction.
//!
//! The harness talks to the engine exclusively through the [`Engine`] trait
//! so that the orchestration layer can run against Docker or an in-memory
//! mock.
//!
//! # Design
//!
//! - One connection per test run, shared as [`SharedEngine`] by every
//!   container handle created through it.
//! - The trait speaks engine-neutral types ([`ContainerSpec`],
//!   [`Inspection`], [`ListedContainer`]) so backends translate at the edge.
//! - Errors come back as [`EngineError`] and are wrapped with operation
//!   context by the caller.

mod docker;
mod mock;

pub use docker::{connect, connect_local, DockerEngine, DEFAULT_SOCKET};
pub use mock::MockEngine;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::EngineError;

/// Engine connection shared read-only across container handles.
pub type SharedEngine = Arc<dyn Engine>;

/// Raw log chunks as produced by an engine backend.
pub type EngineLogStream = BoxStream<'static, Result<Vec<u8>, EngineError>>;

/// Identifier the engine assigned to a container.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wrap an engine-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 12-character short form used in engine CLIs and logs.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerId({})", self.short())
    }
}

/// Publish a container port on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Container port with protocol, e.g. `14265/tcp`.
    pub container_port: String,
    /// Host interface to bind, `None` for all interfaces.
    pub host_ip: Option<String>,
    /// Host port to bind.
    pub host_port: u16,
}

/// Everything the engine needs to create a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image reference.
    pub image: String,
    /// Command-line arguments passed to the image entrypoint.
    pub cmd: Vec<String>,
    /// Environment variables in `KEY=value` form.
    pub env: Vec<String>,
    /// Exposed ports in `<port>/<proto>` form.
    pub exposed_ports: Vec<String>,
    /// Volume and bind mounts in `<source>:<target>:<mode>` form.
    pub binds: Vec<String>,
    /// Host port publications.
    pub port_bindings: Vec<PortBinding>,
}

/// Snapshot of a container's state as reported by the engine.
///
/// Never cached: every call to `inspect` re-fetches it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    /// Container id.
    pub id: String,
    /// Container name without the leading `/`.
    pub name: String,
    /// Whether the main process is running.
    pub running: bool,
    /// Exit code of the main process (0 while running or never started).
    pub exit_code: i64,
    /// Attached networks mapped to the address assigned in each.
    /// The address is empty until the container runs.
    pub networks: BTreeMap<String, String>,
}

/// Entry of the engine's container list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedContainer {
    /// Container id.
    pub id: ContainerId,
    /// Names as reported by the engine; the first is the primary name.
    pub names: Vec<String>,
}

/// Container engine operations used by the harness.
///
/// Implementations must tolerate concurrent calls from independent
/// container handles.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Check that the engine answers on its control channel.
    async fn ping(&self) -> Result<(), EngineError>;

    /// Create a container and return the id the engine assigned.
    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec,
    ) -> Result<ContainerId, EngineError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), EngineError>;

    /// Stop a container, killing it once `grace` elapses.
    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<(), EngineError>;

    /// Force-remove a container, killing it first if it runs.
    async fn remove_container(&self, id: &ContainerId) -> Result<(), EngineError>;

    /// Inspect a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<Inspection, EngineError>;

    /// List running containers.
    async fn list_containers(&self) -> Result<Vec<ListedContainer>, EngineError>;

    /// Create a virtual network and return its identifier.
    async fn create_network(&self, name: &str) -> Result<String, EngineError>;

    /// Remove a virtual network.
    async fn remove_network(&self, network: &str) -> Result<(), EngineError>;

    /// Attach a container to a network.
    async fn connect_network(&self, network: &str, id: &ContainerId) -> Result<(), EngineError>;

    /// Detach a container from a network, forcing removal of its endpoint.
    async fn disconnect_network(&self, network: &str, id: &ContainerId)
        -> Result<(), EngineError>;

    /// Combined stdout/stderr since container start.
    ///
    /// With `follow` the stream stays open until the container exits.
    fn logs(&self, id: &ContainerId, follow: bool) -> EngineLogStream;
}
