//! Integration tests for quota-harvester
//!
//! These tests run the real HTTP data source against wiremock servers.

mod executor_tests;
mod harvest_tests;
