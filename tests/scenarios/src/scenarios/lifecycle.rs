//! Container lifecycle against a live engine.

use futures_util::StreamExt;
use ledger_tester::roles::EntryNodeConfig;
use ledger_tester::{engine, resolve, Container, ContainerState, StopTimeout};
use serial_test::serial;
use std::time::{Duration, Instant};

use crate::{load_config, ENTRY_NODE_SEED};

fn entry_node(name: &str) -> ledger_tester::roles::RoleConfig {
    let config = load_config().unwrap();
    EntryNodeConfig::new(name, &config.images.node, ENTRY_NODE_SEED).build()
}

/// Create, start and remove; afterwards the name no longer resolves.
#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn create_start_remove_then_resolve_fails() {
    ledger_tester::logging::init_tracing();
    let engine = engine::connect(&load_config().unwrap().engine).await.unwrap();

    let mut node = Container::create(&engine, entry_node("lifecycle-entry"), None)
        .await
        .unwrap();
    node.start().await.unwrap();

    let resolved = resolve(&engine, "lifecycle-entry").await.unwrap();
    assert_eq!(resolved.id(), node.id());
    assert_eq!(resolved.state(), ContainerState::Running);

    node.remove().await.unwrap();
    let err = resolve(&engine, "lifecycle-entry").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("lifecycle-entry"));
}

/// An explicit five second grace period bounds the stop.
#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn explicit_stop_timeout_is_honoured() {
    ledger_tester::logging::init_tracing();
    let engine = engine::connect(&load_config().unwrap().engine).await.unwrap();

    let mut node = Container::create(&engine, entry_node("lifecycle-stop"), None)
        .await
        .unwrap();
    node.start().await.unwrap();

    let started = Instant::now();
    node.stop(StopTimeout::Explicit(Duration::from_secs(5)))
        .await
        .unwrap();
    // Engine round trips on top of the grace period.
    assert!(started.elapsed() < Duration::from_secs(15));
    assert_eq!(node.state(), ContainerState::Stopped);

    let status = node.exit_status().await.unwrap();
    tracing::info!(status, "entry node exit status");

    node.remove().await.unwrap();
}

/// Logs stream from container start.
#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn logs_start_streaming_after_start() {
    ledger_tester::logging::init_tracing();
    let engine = engine::connect(&load_config().unwrap().engine).await.unwrap();

    let mut node = Container::create(&engine, entry_node("lifecycle-logs"), None)
        .await
        .unwrap();
    node.start().await.unwrap();

    let mut logs = node.logs();
    let first = tokio::time::timeout(Duration::from_secs(30), logs.next())
        .await
        .expect("no log output within 30s");
    assert!(!first.unwrap().unwrap().is_empty());
    drop(logs);

    assert!(!node.log_snapshot().await.unwrap().is_empty());
    node.remove().await.unwrap();
}
