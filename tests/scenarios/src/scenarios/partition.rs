//! Network isolation through a Pumba chaos agent.

use ledger_tester::ContainerState;
use serial_test::serial;
use std::time::Duration;

use crate::{start_run, ENTRY_NODE_PUBLIC_KEY, ENTRY_NODE_SEED};

/// A partition agent runs against the other peers' addresses and is
/// cleaned up by teardown.
#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn partition_agent_targets_peers() {
    let mut net = start_run().await.unwrap();
    net.deploy_entry_node(ENTRY_NODE_SEED, ENTRY_NODE_PUBLIC_KEY)
        .await
        .unwrap();

    for (name, seed) in [
        ("peer-1", "6DXwtFRy4F3JVWWsb3GgqQEiwmdVpTkWkBbCcc6X1F2W"),
        ("peer-2", "8Yf6y8RN2QqXGkb7j8sLxJ6rCmN5wZ7vBGPchd5yMT2e"),
        ("peer-3", "3a5rrwJuVTeFPdBRh8A3Pyb2dbT3DrGzm2LqzGGVGQSK"),
    ] {
        let config = net.peer_config(name, seed).unwrap();
        net.deploy_peer(config).await.unwrap();
    }

    let agent = net
        .partition("peer-1", &["peer-2", "peer-3"], Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(agent.state(), ContainerState::Running);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let logs = agent.log_snapshot().await.unwrap();
    assert!(!logs.is_empty());

    net.teardown().await.unwrap();
}
