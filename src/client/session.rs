use crate::client::{CallError, DataSource, Operation};
use crate::keys::ActiveKey;
use serde_json::Value;
use std::sync::Arc;

/// A data source bound to exactly one key
///
/// Sessions are cheap; the executor builds a new one whenever the key pool
/// hands out a different key.
pub struct Session {
    key: ActiveKey,
    source: Arc<dyn DataSource>,
}

impl Session {
    pub fn open(key: ActiveKey, source: Arc<dyn DataSource>) -> Self {
        Self { key, source }
    }

    pub fn label(&self) -> &str {
        self.key.label()
    }

    /// Position of the bound key in the pool
    pub fn key_index(&self) -> usize {
        self.key.index()
    }

    /// Sends one call authenticated with the bound key
    pub async fn call(&self, operation: &Operation) -> Result<Value, CallError> {
        tracing::debug!("[{}] {}", self.key.label(), operation);
        self.source.call(self.key.token(), operation).await
    }
}
