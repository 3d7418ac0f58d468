//! Error types for ledger-tester.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::ContainerId;

/// Errors reported by a container engine backend.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Docker API error, passed through verbatim.
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Engine answered with an error status.
    #[error("engine responded {status}: {message}")]
    Status {
        /// HTTP-style status code (404 not found, 409 conflict, ...).
        status: u16,
        /// Message returned by the engine.
        message: String,
    },
}

impl EngineError {
    /// Status code of the engine response, if the engine answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Docker(bollard::errors::Error::DockerResponseServerError {
                status_code,
                ..
            }) => Some(*status_code),
            EngineError::Docker(_) => None,
            EngineError::Status { status, .. } => Some(*status),
        }
    }

    /// True if the engine reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Main error type for harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The engine control channel is unreachable. Fatal for the run.
    #[error("cannot reach container engine at {socket}: {source}")]
    Connection {
        /// Socket path that was dialled.
        socket: String,
        /// Underlying engine error.
        source: EngineError,
    },

    /// Container creation was rejected by the engine.
    #[error("failed to create container {name}: {source}")]
    Create {
        /// Requested container name.
        name: String,
        /// Underlying engine error.
        source: EngineError,
    },

    /// No container with the given name exists.
    #[error("could not find container with name '{name}'")]
    ContainerNotFound {
        /// The name that was searched for.
        name: String,
    },

    /// The container is not attached to the given network.
    #[error("container {container} is not attached to network '{network}'")]
    NetworkNotFound {
        /// Requested network name.
        network: String,
        /// Container name or id.
        container: String,
    },

    /// The container is attached but has no address yet (not running).
    #[error("container {container} has no address in network '{network}' yet")]
    AddressUnassigned {
        /// Requested network name.
        network: String,
        /// Container name or id.
        container: String,
    },

    /// Inspection failed, usually because the container vanished.
    #[error("failed to inspect container {id}: {source}")]
    Inspect {
        /// Container id.
        id: ContainerId,
        /// Underlying engine error.
        source: EngineError,
    },

    /// Any other engine call on an existing container failed.
    #[error("{op} failed for {id}: {source}")]
    Engine {
        /// Operation name.
        op: &'static str,
        /// Target id (container or network).
        id: String,
        /// Underlying engine error.
        source: EngineError,
    },

    /// The call did not finish within its deadline.
    #[error("{op} timed out after {after:?}")]
    Timeout {
        /// Operation name.
        op: &'static str,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The call was cancelled by its cancel handle.
    #[error("{op} cancelled")]
    Cancelled {
        /// Operation name.
        op: &'static str,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl HarnessError {
    /// True for "does not exist" conditions: a missing container, a missing
    /// network attachment, or an engine 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            HarnessError::ContainerNotFound { .. } | HarnessError::NetworkNotFound { .. } => true,
            HarnessError::Create { source, .. }
            | HarnessError::Inspect { source, .. }
            | HarnessError::Engine { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
