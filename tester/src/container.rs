//! Container handle.
//!
//! A [`Container`] pairs the shared engine connection with the id of one
//! container the engine created. It only exists once creation succeeded, so
//! there is no handle with an unset id, and [`Container::remove`] consumes
//! it. Operations are async remote calls bounded by the handle's
//! [`CallPolicy`].
//!
//! ```text
//! create ──> Created ──start──> Running ──stop──> Stopped
//!               │                  │                 │
//!               └──────────────────┴──── remove ─────┘
//! ```

use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use std::fmt;
use std::net::IpAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, info};

use crate::deadline::{CallPolicy, StopTimeout};
use crate::engine::{ContainerId, Inspection, SharedEngine};
use crate::error::{EngineError, HarnessError, Result};
use crate::network;
use crate::roles::{HostBindings, Role, RoleConfig};

/// Lifecycle position of a live container handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Created but never started.
    Created,
    /// Started and not stopped since.
    Running,
    /// Stopped; may be started again or removed.
    Stopped,
}

/// What is left of a container after [`Container::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedContainer {
    /// Id the container had.
    pub id: ContainerId,
    /// Name the container had.
    pub name: String,
}

/// Handle to one container on the engine.
///
/// A handle must not be mutated from several tasks at once; distinct
/// handles sharing one engine may be used concurrently.
pub struct Container {
    engine: SharedEngine,
    id: ContainerId,
    name: String,
    role: Option<Role>,
    state: ContainerState,
    policy: CallPolicy,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("state", &self.state)
            .finish()
    }
}

impl Container {
    /// Create a container from a role configuration with the default call
    /// policy.
    ///
    /// `host` bindings are added to the ones the role already carries.
    /// Engine errors (missing image, name or port conflict) are returned
    /// as [`HarnessError::Create`] without retrying.
    pub async fn create(
        engine: &SharedEngine,
        config: RoleConfig,
        host: Option<HostBindings>,
    ) -> Result<Self> {
        Self::create_with_policy(engine, config, host, CallPolicy::default()).await
    }

    /// Create a container under an explicit call policy.
    pub async fn create_with_policy(
        engine: &SharedEngine,
        config: RoleConfig,
        host: Option<HostBindings>,
        policy: CallPolicy,
    ) -> Result<Self> {
        let role = config.role();
        let (name, spec) = config.into_spec(host);
        debug!(container = %name, %role, image = %spec.image, "creating container");

        let id = policy
            .run("create", async {
                engine
                    .create_container(&name, &spec)
                    .await
                    .map_err(|source| HarnessError::Create {
                        name: name.clone(),
                        source,
                    })
            })
            .await?;

        info!(container = %name, id = %id.short(), %role, "container created");

        Ok(Self {
            engine: engine.clone(),
            id,
            name,
            role: Some(role),
            state: ContainerState::Created,
            policy,
        })
    }

    /// Bind a handle to a container that already exists.
    pub(crate) fn attach(
        engine: &SharedEngine,
        id: ContainerId,
        name: &str,
        state: ContainerState,
        policy: CallPolicy,
    ) -> Self {
        Self {
            engine: engine.clone(),
            id,
            name: name.to_string(),
            role: None,
            state,
            policy,
        }
    }

    /// Replace the call policy used for subsequent operations.
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Engine-assigned id. Never changes for the life of the handle.
    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role the container was created for; `None` for reattached handles.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Last lifecycle transition performed through this handle.
    pub fn state(&self) -> ContainerState {
        self.state
    }

    /// Call policy of this handle.
    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    fn engine_error(&self, op: &'static str) -> impl FnOnce(EngineError) -> HarnessError + '_ {
        move |source| HarnessError::Engine {
            op,
            id: self.id.to_string(),
            source,
        }
    }

    /// Start the container.
    ///
    /// Not idempotent: starting a running container returns the engine's
    /// error.
    pub async fn start(&mut self) -> Result<()> {
        debug!(container = %self.name, "starting container");
        self.policy
            .run("start", async {
                self.engine
                    .start_container(&self.id)
                    .await
                    .map_err(self.engine_error("start"))
            })
            .await?;

        self.state = ContainerState::Running;
        info!(container = %self.name, id = %self.id.short(), "container started");
        Ok(())
    }

    /// Stop the container gracefully; the engine kills it once the grace
    /// period elapses.
    pub async fn stop(&mut self, timeout: StopTimeout) -> Result<()> {
        let grace = timeout.grace();
        debug!(container = %self.name, ?grace, "stopping container");

        self.policy
            .extended_by(grace)
            .run("stop", async {
                self.engine
                    .stop_container(&self.id, grace)
                    .await
                    .map_err(self.engine_error("stop"))
            })
            .await?;

        self.state = ContainerState::Stopped;
        info!(container = %self.name, id = %self.id.short(), "container stopped");
        Ok(())
    }

    /// Force-remove the container, killing it first if it runs.
    pub async fn remove(self) -> Result<RemovedContainer> {
        debug!(container = %self.name, state = ?self.state, "removing container");
        self.policy
            .run("remove", async {
                self.engine
                    .remove_container(&self.id)
                    .await
                    .map_err(self.engine_error("remove"))
            })
            .await?;

        info!(container = %self.name, id = %self.id.short(), "container removed");
        Ok(RemovedContainer {
            id: self.id,
            name: self.name,
        })
    }

    /// Fresh inspection snapshot.
    pub async fn inspect(&self) -> Result<Inspection> {
        self.policy
            .run("inspect", async {
                self.engine
                    .inspect_container(&self.id)
                    .await
                    .map_err(|source| HarnessError::Inspect {
                        id: self.id.clone(),
                        source,
                    })
            })
            .await
    }

    /// Exit code of the container's main process.
    pub async fn exit_status(&self) -> Result<i64> {
        Ok(self.inspect().await?.exit_code)
    }

    /// Address of the container in `network`.
    pub async fn ip(&self, network: &str) -> Result<IpAddr> {
        let inspection = self.inspect().await?;
        network::ip_on(&inspection, network)
    }

    /// Attach the container to `network` at runtime.
    pub async fn connect_to_network(&self, network: &str) -> Result<()> {
        debug!(container = %self.name, network, "connecting to network");
        self.policy
            .run("network connect", async {
                self.engine
                    .connect_network(network, &self.id)
                    .await
                    .map_err(self.engine_error("network connect"))
            })
            .await
    }

    /// Detach the container from `network`, forcing endpoint removal.
    pub async fn disconnect_from_network(&self, network: &str) -> Result<()> {
        debug!(container = %self.name, network, "disconnecting from network");
        self.policy
            .run("network disconnect", async {
                self.engine
                    .disconnect_network(network, &self.id)
                    .await
                    .map_err(self.engine_error("network disconnect"))
            })
            .await
    }

    /// Live stdout/stderr stream from container start.
    ///
    /// The stream follows the container until the engine closes it or the
    /// handle's cancel signal fires. Dropping it releases the connection.
    pub fn logs(&self) -> LogStream {
        LogStream::new(
            self.engine.logs(&self.id, true),
            self.id.to_string(),
            &self.policy,
        )
    }

    /// Logs available right now, collected into a string.
    pub async fn log_snapshot(&self) -> Result<String> {
        let mut stream = LogStream::new(
            self.engine.logs(&self.id, false),
            self.id.to_string(),
            &self.policy,
        );

        self.policy
            .run("logs", async {
                let mut logs = String::new();
                while let Some(chunk) = stream.next().await {
                    logs.push_str(&String::from_utf8_lossy(&chunk?));
                }
                Ok::<_, HarnessError>(logs)
            })
            .await
    }
}

/// Combined stdout/stderr of a container as raw byte chunks.
pub struct LogStream {
    inner: BoxStream<'static, Result<Vec<u8>>>,
}

impl LogStream {
    fn new(
        raw: crate::engine::EngineLogStream,
        id: String,
        policy: &CallPolicy,
    ) -> Self {
        let mapped = raw.map(move |chunk| {
            chunk.map_err(|source| HarnessError::Engine {
                op: "logs",
                id: id.clone(),
                source,
            })
        });

        let inner = match policy.cancel_signal().cloned() {
            Some(signal) => mapped
                .take_until(async move { signal.cancelled().await })
                .boxed(),
            None => mapped.boxed(),
        };
        Self { inner }
    }
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream").finish_non_exhaustive()
    }
}

impl Stream for LogStream {
    type Item = Result<Vec<u8>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}
