use tracing::{debug, info, warn};

use crate::error::GmpError;
use crate::gmp::{name_filter, GmpClient, GmpStream, NewTarget, ResourceKind};
use crate::types::Resource;

/// How to react when no resource carries the wanted name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupMode {
    /// Take the first row of an unfiltered listing.
    #[default]
    Fallback,
    /// Fail without a second query.
    Strict,
}

/// Find a port list or scan config by exact name.
pub async fn resolve_named<S: GmpStream>(
    client: &mut GmpClient<S>,
    kind: ResourceKind,
    name: &str,
    mode: LookupMode,
) -> Result<Resource, GmpError> {
    let named = client.list(kind, Some(&name_filter(name))).await?;
    if let Some(found) = named.into_iter().find(|r| r.name == name) {
        debug!(kind = kind.label(), id = %found.id, "resolved by name");
        return Ok(found);
    }

    let not_found = || GmpError::NotFound {
        kind: kind.label(),
        name: name.to_string(),
    };
    if mode == LookupMode::Strict {
        return Err(not_found());
    }

    let any = client.list(kind, None).await?;
    let first = any.into_iter().next().ok_or_else(not_found)?;
    warn!(
        kind = kind.label(),
        wanted = name,
        using = %first.name,
        "no exact match, falling back to first available"
    );
    Ok(first)
}

/// Outcome of resolving the scan target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub id: String,
    pub created: bool,
}

/// Reuse the target called `target.name`, or create it.
pub async fn resolve_or_create_target<S: GmpStream>(
    client: &mut GmpClient<S>,
    target: &NewTarget<'_>,
) -> Result<ResolvedTarget, GmpError> {
    let existing = client
        .list(ResourceKind::Target, Some(&name_filter(target.name)))
        .await?;
    if let Some(found) = existing.into_iter().find(|r| r.name == target.name) {
        info!(id = %found.id, target_name = target.name, "reusing existing target");
        return Ok(ResolvedTarget {
            id: found.id,
            created: false,
        });
    }

    let id = client.create_target(target).await?;
    info!(%id, hosts = target.hosts, "created target");
    Ok(ResolvedTarget { id, created: true })
}
