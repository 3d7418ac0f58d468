//! Lookup of containers the harness did not create itself.

use tracing::debug;

use crate::container::{Container, ContainerState};
use crate::deadline::CallPolicy;
use crate::engine::{ListedContainer, SharedEngine};
use crate::error::{HarnessError, Result};

/// Docker reports names with a leading `/`.
fn primary_name(listed: &ListedContainer) -> Option<&str> {
    listed
        .names
        .first()
        .map(|name| name.strip_prefix('/').unwrap_or(name))
}

/// Handle for the running container whose primary name is exactly `name`.
pub async fn resolve(engine: &SharedEngine, name: &str) -> Result<Container> {
    resolve_with_policy(engine, name, CallPolicy::default()).await
}

/// [`resolve`] under an explicit call policy, which the returned handle
/// keeps.
pub async fn resolve_with_policy(
    engine: &SharedEngine,
    name: &str,
    policy: CallPolicy,
) -> Result<Container> {
    let listed = policy
        .run("list", async {
            engine
                .list_containers()
                .await
                .map_err(|source| HarnessError::Engine {
                    op: "list",
                    id: name.to_string(),
                    source,
                })
        })
        .await?;

    let found = listed
        .into_iter()
        .find(|container| primary_name(container) == Some(name))
        .ok_or_else(|| HarnessError::ContainerNotFound {
            name: name.to_string(),
        })?;

    debug!(container = name, id = %found.id.short(), "resolved running container");
    Ok(Container::attach(
        engine,
        found.id,
        name,
        ContainerState::Running,
        policy,
    ))
}
