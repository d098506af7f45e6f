//! In-process data sources for unit tests

use crate::client::{CallError, DataSource, Operation};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

type Handler = dyn Fn(&str, &Operation, usize) -> Result<Value, CallError> + Send + Sync;

/// Data source driven by a closure
///
/// The closure receives the token, the operation and the zero-based index of
/// the call. Every call is logged for later inspection.
pub(crate) struct ScriptedSource {
    handler: Box<Handler>,
    log: Mutex<Vec<(String, Operation)>>,
}

impl ScriptedSource {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Operation, usize) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        }
    }

    /// `(token, operation)` for every call so far
    pub(crate) fn calls(&self) -> Vec<(String, Operation)> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn tokens(&self) -> Vec<String> {
        self.calls().into_iter().map(|(token, _)| token).collect()
    }

    pub(crate) fn calls_to(&self, endpoint: &str) -> Vec<Operation> {
        self.calls()
            .into_iter()
            .filter(|(_, op)| op.endpoint() == endpoint)
            .map(|(_, op)| op)
            .collect()
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn call(&self, token: &str, operation: &Operation) -> Result<Value, CallError> {
        let index = {
            let mut log = self.log.lock().unwrap();
            log.push((token.to_string(), operation.clone()));
            log.len() - 1
        };
        (self.handler)(token, operation, index)
    }
}

pub(crate) fn quota_error() -> CallError {
    CallError::Quota {
        status: 403,
        reason: "quotaExceeded".to_string(),
        retry_after: None,
    }
}

pub(crate) fn server_error() -> CallError {
    CallError::Transient {
        status: Some(503),
        reason: "backendError".to_string(),
    }
}
