//! routemetrics gateway library entry.
//!
//! Hosts the metrics core inside an axum server: strict YAML config, shared
//! state owning the registry and route table, the metrics middleware, and the
//! operational endpoints. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod demo;
pub mod middleware;
pub mod ops;
pub mod router;
