//! Entry node plus peers on one run network.

use ledger_tester::harness::ENTRY_NODE_NAME;
use ledger_tester::roles::CoordinatorConfig;
use serial_test::serial;
use std::time::Duration;

use crate::{start_run, ENTRY_NODE_PUBLIC_KEY, ENTRY_NODE_SEED};

/// Every node gets a distinct address on the run network.
#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn peers_get_addresses_on_run_network() {
    let mut net = start_run().await.unwrap();
    net.deploy_entry_node(ENTRY_NODE_SEED, ENTRY_NODE_PUBLIC_KEY)
        .await
        .unwrap();

    for (name, seed) in [
        ("peer-1", "6DXwtFRy4F3JVWWsb3GgqQEiwmdVpTkWkBbCcc6X1F2W"),
        ("peer-2", "8Yf6y8RN2QqXGkb7j8sLxJ6rCmN5wZ7vBGPchd5yMT2e"),
    ] {
        let config = net.peer_config(name, seed).unwrap();
        net.deploy_peer(config).await.unwrap();
    }

    let ips = net.peer_ips().await.unwrap();
    assert_eq!(ips.len(), 2);
    assert_ne!(ips[0], ips[1]);
    assert!(!ips.contains(&net.ip_of(ENTRY_NODE_NAME).await.unwrap()));

    net.teardown().await.unwrap();
}

/// The coordinator peer starts issuing and logs it.
#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn coordinator_peer_starts() {
    let mut net = start_run().await.unwrap();
    net.deploy_entry_node(ENTRY_NODE_SEED, ENTRY_NODE_PUBLIC_KEY)
        .await
        .unwrap();

    let config = net
        .peer_config("coo", "DD5a4HuyrHHrwxGxQzLiKAoKuUVbwxbY8CHwTdxWhBPk")
        .unwrap()
        .coordinator(CoordinatorConfig {
            address: "EQSAUZXULTTYZCLNJNTXQTQHOMOFZERHTCGTXOLTVAHKSA9OGAZDEKECURBRIXIJWNPFCQIOVFVVXJVD9"
                .into(),
            seed: "PEUNYKCIQFSHWVGAJFWCOJVMKBVPDNRAAVLCSNNCVMNXIRSEKATSYVHAMNLHFQGKIMBTLDNSTLAEKMWOV"
                .into(),
            interval_secs: 10,
            security_level: 2,
            merkle_tree_depth: 8,
            mwm: 5,
        });
    net.deploy_peer(config).await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    let logs = net.logs_of("coo").await.unwrap();
    assert!(logs.contains("Coordinator"));

    net.teardown().await.unwrap();
}
