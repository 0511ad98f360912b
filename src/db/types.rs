//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Database not initialized")]
    NotOpen,
}

/// A row from the `leads` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLead {
    pub id: String,
    pub lead_code: String,
    pub customer_name: String,
    pub loan_account_no: Option<String>,
    pub bank_name: Option<String>,
    pub agent_id: String,
    pub status: String,
    pub loan_amount: f64,
    pub disbursed_amount: f64,
    pub commission_amount: f64,
    pub commission_percentage: f64,
    pub status_notes: Option<String>,
    pub status_updated_by: Option<String>,
    pub status_updated_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `disbursements` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDisbursement {
    pub id: String,
    pub lead_id: String,
    pub seq: i64,
    pub amount: f64,
    pub date: String,
    pub utr: String,
    pub bank_ref: Option<String>,
    pub commission: f64,
    pub gst: f64,
    pub net_commission: f64,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub managed_by_kind: Option<String>,
    pub managed_by: Option<String>,
    pub franchise_owned: Option<String>,
    pub created_at: String,
}

/// A row from the `franchises` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFranchise {
    pub id: String,
    pub name: String,
    pub regional_manager: Option<String>,
    pub created_at: String,
}

/// A row from the `relationship_managers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbRelationshipManager {
    pub id: String,
    pub name: String,
    pub regional_manager: Option<String>,
    pub owner_user_id: Option<String>,
    pub created_at: String,
}

/// A row from the `lead_notes` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLeadNote {
    pub id: String,
    pub lead_id: String,
    pub content: String,
    pub note_type: String,
    pub created_by: Option<String>,
    pub created_at: String,
}

/// A row from the `audit_log` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAuditEntry {
    pub id: String,
    pub actor_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before_json: Option<String>,
    pub after_json: Option<String>,
    pub created_at: String,
}

/// One disbursement entry joined with its owning lead and agent, as
/// produced for the commission report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCommissionRow {
    pub entry_id: String,
    pub lead_id: String,
    pub lead_code: String,
    pub customer_name: String,
    pub bank_name: Option<String>,
    pub agent_id: String,
    pub agent_name: Option<String>,
    pub amount: f64,
    pub date: String,
    pub utr: String,
    pub commission: f64,
    pub gst: f64,
    pub net_commission: f64,
}
