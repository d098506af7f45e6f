//! Backoff request executor
//!
//! Runs one logical API call against the active session and recovers from the
//! two failure classes the remote API produces:
//!
//! | Failure | Recovery |
//! |---------|----------|
//! | Quota (429, 403 quota reason) | Bench key, rotate, rebuild session, retry |
//! | Transient (5xx, timeout, connect) | Retry same key with jittered backoff |
//! | Rejected (400, 401, 403, 404) | Fail immediately |
//! | Malformed body | Fail immediately |

use crate::client::{BackoffPolicy, CallError, DataSource, Operation, Session};
use crate::keys::KeyPool;
use crate::HarvestError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Counters reported in the run summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Requests actually sent
    pub calls: u64,

    /// Transient failures that were retried
    pub retries: u64,

    /// Key switches caused by quota errors
    pub rotations: u64,
}

/// How one key's attempt at a call ended, when it did not succeed
enum KeyFailure {
    Quota {
        status: u16,
        reason: String,
        retry_after: Option<Duration>,
    },
    Fatal(HarvestError),
}

/// Executes calls with key rotation and retry
pub struct Executor {
    pool: KeyPool,
    source: Arc<dyn DataSource>,
    policy: BackoffPolicy,
    default_cooldown: Option<Duration>,
    session: Option<Session>,
    stats: ExecutorStats,
}

impl Executor {
    /// Creates an executor that owns the key pool for the run
    pub fn new(pool: KeyPool, source: Arc<dyn DataSource>, policy: BackoffPolicy) -> Self {
        Self {
            pool,
            source,
            policy,
            default_cooldown: None,
            session: None,
            stats: ExecutorStats::default(),
        }
    }

    /// Cooldown applied after a quota error that carries no `Retry-After`
    pub fn with_default_cooldown(mut self, cooldown: Option<Duration>) -> Self {
        self.default_cooldown = cooldown;
        self
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats
    }

    /// Label of the key bound to the current session
    pub fn active_label(&self) -> Option<&str> {
        self.session.as_ref().map(Session::label)
    }

    /// Executes one call
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - Decoded response body
    /// * `Err(HarvestError::QuotaExhausted)` - Every key hit its quota
    /// * `Err(HarvestError::RequestFailed)` - Transient retries ran out
    /// * `Err(HarvestError::Rejected)` - The API refused the call
    /// * `Err(HarvestError::MalformedResponse)` - The body could not be decoded
    pub async fn execute(&mut self, operation: &Operation) -> Result<Value, HarvestError> {
        let mut tried: Vec<usize> = Vec::new();

        loop {
            let key = if tried.is_empty() {
                self.pool.next_available()?
            } else {
                match self.pool.rotate(&tried) {
                    Ok(key) => key,
                    Err(err) => {
                        tracing::error!(
                            "No untried key left while executing {} ({} hit quota)",
                            operation,
                            tried.len()
                        );
                        return Err(err);
                    }
                }
            };

            let rebuild = self
                .session
                .as_ref()
                .map_or(true, |session| session.key_index() != key.index());
            if rebuild {
                tracing::info!("Opening session with key '{}'", key.label());
                self.session = Some(Session::open(key, Arc::clone(&self.source)));
            }

            match self.call_with_backoff(operation).await {
                Ok(value) => return Ok(value),
                Err(KeyFailure::Fatal(err)) => return Err(err),
                Err(KeyFailure::Quota {
                    status,
                    reason,
                    retry_after,
                }) => {
                    let (index, label) = match self.session.as_ref() {
                        Some(session) => (session.key_index(), session.label().to_string()),
                        None => {
                            return Err(HarvestError::QuotaExhausted {
                                keys: self.pool.len(),
                            })
                        }
                    };
                    tracing::warn!(
                        "Key '{}' hit quota on {} (HTTP {}: {})",
                        label,
                        operation,
                        status,
                        reason
                    );

                    self.pool
                        .mark_exhausted(&label, retry_after.or(self.default_cooldown));
                    self.stats.rotations += 1;
                    tried.push(index);
                }
            }
        }
    }

    /// Sends the call on the current session, retrying transient failures
    async fn call_with_backoff(&mut self, operation: &Operation) -> Result<Value, KeyFailure> {
        let mut backoff = self.policy.schedule();

        loop {
            let session = match self.session.as_ref() {
                Some(session) => session,
                None => {
                    return Err(KeyFailure::Fatal(HarvestError::QuotaExhausted {
                        keys: self.pool.len(),
                    }))
                }
            };

            self.stats.calls += 1;
            let error = match session.call(operation).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match error {
                CallError::Quota {
                    status,
                    reason,
                    retry_after,
                } => {
                    return Err(KeyFailure::Quota {
                        status,
                        reason,
                        retry_after,
                    })
                }
                CallError::Transient { status, reason } => match backoff.next_delay() {
                    Some(delay) => {
                        self.stats.retries += 1;
                        tracing::warn!(
                            "Transient failure on {} ({}{}), retry {} in {:?}",
                            operation,
                            status.map(|s| format!("HTTP {}: ", s)).unwrap_or_default(),
                            reason,
                            backoff.attempts(),
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(KeyFailure::Fatal(HarvestError::RequestFailed {
                            operation: operation.to_string(),
                            reason,
                            attempts: backoff.attempts(),
                        }))
                    }
                },
                CallError::Rejected { kind, reason, .. } => {
                    return Err(KeyFailure::Fatal(HarvestError::Rejected {
                        operation: operation.to_string(),
                        kind,
                        reason,
                    }))
                }
                CallError::Malformed { reason } => {
                    return Err(KeyFailure::Fatal(HarvestError::MalformedResponse {
                        operation: operation.to_string(),
                        reason,
                    }))
                }
            }
        }
    }
}
