//! Staking status reporter for autonomous agent services.
//!
//! One invocation resolves the locally stored service configuration, connects
//! to the first reachable RPC endpoint, reads the staking contract's view
//! surface, derives epoch KPI progress, and renders a terminal report.

pub mod chain;
pub mod contracts;
pub mod descriptor;
pub mod error;
pub mod evaluator;
pub mod render;

pub mod config {
    pub mod chains;
}
