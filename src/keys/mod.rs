//! API key management
//!
//! This module owns the credentials a harvest run may use and tracks which of
//! them are currently benched by quota errors.
//!
//! # Components
//!
//! - `Credential`: one labelled token and its exhaustion state
//! - `KeyPool`: ordered set of credentials with priority-order selection
//! - `ActiveKey`: snapshot of the key selected for the next call

mod credential;
mod pool;

pub use credential::{ActiveKey, Credential, Exhaustion};
pub use pool::KeyPool;
