//! Address discovery and fault composition helpers.

use std::net::IpAddr;
use std::time::Duration;

use crate::container::Container;
use crate::engine::Inspection;
use crate::error::{HarnessError, Result};
use crate::pumba::FaultProfile;
use crate::roles::ChaosAgentConfig;

/// Address of a container in `network`, taken from an inspection snapshot.
///
/// Distinguishes "not attached" ([`HarnessError::NetworkNotFound`]) from
/// "attached but no address yet" ([`HarnessError::AddressUnassigned`]).
pub fn ip_on(inspection: &Inspection, network: &str) -> Result<IpAddr> {
    let container = if inspection.name.is_empty() {
        inspection.id.clone()
    } else {
        inspection.name.clone()
    };

    let address = inspection
        .networks
        .get(network)
        .ok_or_else(|| HarnessError::NetworkNotFound {
            network: network.to_string(),
            container: container.clone(),
        })?;

    address
        .parse()
        .map_err(|_| HarnessError::AddressUnassigned {
            network: network.to_string(),
            container,
        })
}

/// Addresses of several containers in one network, in input order.
///
/// Fails on the first container that has no address there.
pub async fn collect_ips<'a, I>(containers: I, network: &str) -> Result<Vec<IpAddr>>
where
    I: IntoIterator<Item = &'a Container>,
{
    let mut ips = Vec::new();
    for container in containers {
        ips.push(container.ip(network).await?);
    }
    Ok(ips)
}

/// Chaos agent `name` cutting `target` off from `peers` for `duration`.
pub async fn partition<'a, I>(
    name: &str,
    target: &Container,
    peers: I,
    network: &str,
    duration: Duration,
) -> Result<ChaosAgentConfig>
where
    I: IntoIterator<Item = &'a Container>,
{
    let ips = collect_ips(peers, network).await?;
    Ok(ChaosAgentConfig::new(name, target.name(), ips)
        .duration(duration)
        .fault(FaultProfile::partition()))
}
