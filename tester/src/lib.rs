//! # ledger-tester
//!
//! Docker-based integration test harness for distributed-ledger networks.
//!
//! This crate provisions and tears down isolated containers playing the
//! parts of a test topology:
//! - Entry node the other nodes bootstrap autopeering from
//! - Peers, one of which may act as the milestone coordinator
//! - Pumba chaos agents that inject network faults between nodes
//!
//! ```no_run
//! use ledger_tester::{engine, HarnessConfig, TestNetwork};
//!
//! # async fn run() -> ledger_tester::Result<()> {
//! let config = HarnessConfig::default();
//! let engine = engine::connect(&config.engine).await?;
//! let mut net = TestNetwork::new(engine, &config).await?;
//!
//! net.deploy_entry_node("ENTRY_SEED", "ENTRY_PUBLIC_KEY").await?;
//! let peer = net.peer_config("peer-1", "PEER_SEED")?;
//! net.deploy_peer(peer).await?;
//!
//! net.teardown().await
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod container;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod harness;
pub mod logging;
pub mod network;
pub mod pumba;
pub mod resolver;
pub mod roles;

pub use config::HarnessConfig;
pub use container::{Container, ContainerState, LogStream, RemovedContainer};
pub use deadline::{CallPolicy, CancelHandle, CancelSignal, StopTimeout};
pub use engine::{ContainerId, Engine, SharedEngine};
pub use error::{ConfigError, EngineError, HarnessError, Result};
pub use harness::TestNetwork;
pub use resolver::resolve;
