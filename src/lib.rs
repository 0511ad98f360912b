//! Multi-tenant loan-lead management core: a disbursement ledger inside
//! each lead, a status state machine derived from the amounts, a
//! fail-closed hierarchical scope resolver, and the dashboard and
//! commission reports built on top.
//!
//! The entry points live in [`services`]; persistence in [`db`]; shared
//! domain types in [`types`]. Callers construct an [`state::AppState`],
//! resolve the acting [`types::Principal`], and call service functions.

pub mod db;
pub mod error;
pub mod migrations;
pub mod services;
pub mod state;
pub mod types;
pub mod util;

#[cfg(test)]
mod testutil;

pub use error::{ApiResponse, CoreError};
pub use state::AppState;
pub use types::{LeadStatus, Principal, Role, Scope};

/// Initialize env_logger once for binaries and examples. Reads
/// `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
