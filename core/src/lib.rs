//! Outbound statistics reporting: SQL aggregation over sends and
//! responses, the account → channel → activity hierarchy, and the HTTP API
//! that serves both.

pub mod api;
pub mod clock;
pub mod config;
pub mod demo;
pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod insights;
pub mod rates;
pub mod records;
pub mod report;
pub mod sql;
pub mod store;
pub mod types;
