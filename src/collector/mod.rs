//! Paginated collection over cursor-based endpoints
//!
//! This module drives repeated calls through the executor, following the
//! continuation cursor each response carries, and hands back items in server
//! order. Only the item list and the cursor are modelled; items themselves pass
//! through as opaque JSON.

mod page;
mod paginator;

pub use page::{lookup, lookup_str, Cursor, ItemsAndCursor, Page, PageExtractor};
pub use paginator::Paginator;
