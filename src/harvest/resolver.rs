//! Resource resolution
//!
//! Maps a user-supplied resource string (channel id, handle or legacy user
//! name) to a canonical channel id by trying lookup strategies in order.

use crate::client::{Executor, Operation, RejectKind};
use crate::collector::lookup_str;
use crate::config::Endpoints;
use crate::HarvestError;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// One way of looking a channel up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveStrategy {
    /// The resource already is a channel id
    Id,

    /// Lookup by handle (`@name`)
    CustomName,

    /// Lookup by legacy user name
    Username,
}

impl ResolveStrategy {
    /// Direct id, then custom name, then user name
    pub fn default_order() -> Vec<Self> {
        vec![Self::Id, Self::CustomName, Self::Username]
    }

    /// Query parameter carrying the resource for this strategy
    pub fn param(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CustomName => "forHandle",
            Self::Username => "forUsername",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CustomName => "custom-name",
            Self::Username => "username",
        }
    }

    /// Returns true if the strategy can be tried for `resource` at all
    ///
    /// Direct lookup only applies to strings shaped like a channel id.
    pub fn applies_to(&self, resource: &str) -> bool {
        match self {
            Self::Id => looks_like_channel_id(resource),
            Self::CustomName => !resource.trim_start_matches('@').is_empty(),
            Self::Username => {
                !resource.is_empty() && !resource.starts_with('@') && !resource.contains(' ')
            }
        }
    }
}

impl fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Channel ids are `UC` followed by 22 URL-safe base64 characters
fn looks_like_channel_id(resource: &str) -> bool {
    resource.len() == 24
        && resource.starts_with("UC")
        && resource
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub channel_id: String,
    pub strategy: ResolveStrategy,
    /// Channel record as returned by the lookup
    pub record: Value,
}

/// Resolves `resource` to a channel id
///
/// Strategies are tried in the given order. A lookup that returns no match, or
/// that the API rejects as not found or malformed, moves on to the next
/// strategy. Quota exhaustion and every other failure abort resolution.
///
/// # Returns
///
/// * `Ok(Resolved)` - The first strategy that matched
/// * `Err(HarvestError::NotFound)` - No strategy matched
pub async fn resolve(
    executor: &mut Executor,
    endpoints: &Endpoints,
    resource: &str,
    strategies: &[ResolveStrategy],
) -> Result<Resolved, HarvestError> {
    let resource = resource.trim();
    let mut tried = Vec::new();

    for strategy in strategies {
        if !strategy.applies_to(resource) {
            tracing::debug!("Strategy {} does not apply to '{}'", strategy, resource);
            continue;
        }
        tried.push(strategy.name());

        let value = match strategy {
            ResolveStrategy::Username => resource.trim_start_matches('@'),
            _ => resource,
        };
        let operation = Operation::new(&endpoints.channels)
            .param("part", "snippet,contentDetails,statistics")
            .param(strategy.param(), value);

        let response = match executor.execute(&operation).await {
            Ok(response) => response,
            Err(HarvestError::Rejected {
                kind: RejectKind::NotFound | RejectKind::BadRequest,
                reason,
                ..
            }) => {
                tracing::debug!("Strategy {} rejected for '{}': {}", strategy, resource, reason);
                continue;
            }
            Err(err) => return Err(err),
        };

        let items = match response.get("items") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(HarvestError::MalformedResponse {
                    operation: operation.to_string(),
                    reason: "'items' is not an array".to_string(),
                })
            }
        };

        let found = items
            .into_iter()
            .find_map(|item| lookup_str(&item, "id").map(str::to_string).map(|id| (id, item)));

        match found {
            Some((channel_id, record)) => {
                tracing::info!(
                    "Resolved '{}' to channel {} via {}",
                    resource,
                    channel_id,
                    strategy
                );
                return Ok(Resolved {
                    channel_id,
                    strategy: *strategy,
                    record,
                });
            }
            None => tracing::debug!("Strategy {} found nothing for '{}'", strategy, resource),
        }
    }

    Err(HarvestError::NotFound {
        resource: resource.to_string(),
        tried: if tried.is_empty() {
            "no applicable strategy".to_string()
        } else {
            tried.join(", ")
        },
    })
}
