//! Output module for harvest summaries and database statistics
//!
//! This module handles:
//! - Printing the summary of a finished run
//! - Reading per-sink statistics back from the database

pub mod stats;

pub use stats::{load_statistics, print_statistics, print_summary, HarvestStatistics, SinkCounts};
