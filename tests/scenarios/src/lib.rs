//! # tester-scenarios
//!
//! End-to-end scenarios for ledger-tester against a live Docker daemon.
//!
//! Every scenario is `#[ignore]`d so `cargo test` stays hermetic. Run them
//! with `cargo test -p tester-scenarios -- --ignored` on a host that has the
//! node image (`hornet:dev` by default) and the `hornet-testing-assets`
//! volume. `LEDGER_TESTER_CONFIG` may point at a TOML file overriding the
//! defaults.

#![warn(missing_docs)]
#![warn(clippy::all)]

use ledger_tester::{engine, HarnessConfig, Result, TestNetwork};
use std::path::Path;

pub mod scenarios;

/// Autopeering seed of the entry node used by the scenarios.
pub const ENTRY_NODE_SEED: &str = "Dz2i3yM8F4Z5nH4iQvLLnGdNkFqBrJ7r1ZycHgw3mDs8";

/// Public key derived from [`ENTRY_NODE_SEED`].
pub const ENTRY_NODE_PUBLIC_KEY: &str = "4H6WV54tB29u8xCcEaMGQMn37LFvM1ynNpp27TTXaqNM";

/// Settings from `LEDGER_TESTER_CONFIG`, or the defaults.
pub fn load_config() -> Result<HarnessConfig> {
    match std::env::var_os("LEDGER_TESTER_CONFIG") {
        Some(path) => Ok(HarnessConfig::from_file(Path::new(&path))?),
        None => Ok(HarnessConfig::default()),
    }
}

/// Connect to Docker and create a fresh run network.
pub async fn start_run() -> Result<TestNetwork> {
    ledger_tester::logging::init_tracing();
    let config = load_config()?;
    let engine = engine::connect(&config.engine).await?;
    TestNetwork::new(engine, &config).await
}
