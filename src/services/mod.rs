//! Service layer: scope resolution, the ledger engine, lead operations,
//! and the reporting reads. Each function takes `AppState` plus the
//! acting [`Principal`](crate::types::Principal) and returns
//! [`CoreError`](crate::error::CoreError) for the boundary to map.

pub mod dashboard;
pub mod ledger;
pub mod leads;
pub mod reports;
pub mod scope;
