//! Top-level facade crate for routemetrics.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use routemetrics_core::*;
}

pub mod gateway {
    pub use routemetrics_gateway::*;
}
