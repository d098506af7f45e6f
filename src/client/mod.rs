//! Client module for talking to the remote data API
//!
//! This module contains everything between "make this call" and "here is the
//! decoded JSON", including:
//! - Describing calls as endpoint + parameters
//! - The data source seam and its HTTP implementation
//! - Classifying failures into quota, transient and rejected
//! - Sessions bound to one active key
//! - Exponential backoff with jitter
//! - The executor that rotates keys and retries

mod backoff;
mod executor;
mod operation;
mod session;
mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::{Backoff, BackoffPolicy};
pub use executor::{Executor, ExecutorStats};
pub use operation::Operation;
pub use session::Session;
pub use source::{
    build_http_client, classify_status, error_reason, CallError, DataSource, HttpSource,
    RejectKind,
};
