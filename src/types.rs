//! Domain types shared across the ledger, scope, and reporting services.
//!
//! All externally visible structs serialize camelCase. Dates and
//! timestamps are ISO-8601 strings so SQLite TEXT comparison and
//! lexicographic range filters agree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Roles and principals
// ---------------------------------------------------------------------------

/// Organizational role of an acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    Franchise,
    RelationshipManager,
    RegionalManager,
    AccountsManager,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Franchise => "franchise",
            Role::RelationshipManager => "relationship_manager",
            Role::RegionalManager => "regional_manager",
            Role::AccountsManager => "accounts_manager",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "agent" => Some(Role::Agent),
            "franchise" => Some(Role::Franchise),
            "relationship_manager" => Some(Role::RelationshipManager),
            "regional_manager" => Some(Role::RegionalManager),
            "accounts_manager" => Some(Role::AccountsManager),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

/// The authenticated actor a request runs as. Every core operation takes
/// this explicitly; there is no ambient identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Principal {
            id: id.into(),
            role,
        }
    }
}

// ---------------------------------------------------------------------------
// Lead status state machine
// ---------------------------------------------------------------------------

/// Lead lifecycle status.
///
/// `Approved` and `DisbursementInProgress` are pre-disbursement states:
/// viewable and status-updatable by accountants but not eligible for
/// ledger mutation. The remaining four form the accountant-allowed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Approved,
    DisbursementInProgress,
    Sanctioned,
    PartialDisbursed,
    Disbursed,
    Completed,
}

/// Statuses eligible for ledger mutation (add/edit/delete disbursement).
pub const ACCOUNTANT_ALLOWED_STATUSES: [LeadStatus; 4] = [
    LeadStatus::Sanctioned,
    LeadStatus::PartialDisbursed,
    LeadStatus::Disbursed,
    LeadStatus::Completed,
];

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Approved => "approved",
            LeadStatus::DisbursementInProgress => "disbursement_in_progress",
            LeadStatus::Sanctioned => "sanctioned",
            LeadStatus::PartialDisbursed => "partial_disbursed",
            LeadStatus::Disbursed => "disbursed",
            LeadStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<LeadStatus> {
        match s {
            "approved" => Some(LeadStatus::Approved),
            "disbursement_in_progress" => Some(LeadStatus::DisbursementInProgress),
            "sanctioned" => Some(LeadStatus::Sanctioned),
            "partial_disbursed" => Some(LeadStatus::PartialDisbursed),
            "disbursed" => Some(LeadStatus::Disbursed),
            "completed" => Some(LeadStatus::Completed),
            _ => None,
        }
    }

    /// Single source of truth for the status/amount relationship.
    ///
    /// Reapplied in full after every ledger mutation so the status never
    /// drifts from the aggregates.
    pub fn for_amounts(disbursed_amount: f64, loan_amount: f64) -> LeadStatus {
        if disbursed_amount <= 0.0 {
            LeadStatus::Sanctioned
        } else if disbursed_amount >= loan_amount {
            LeadStatus::Completed
        } else {
            LeadStatus::PartialDisbursed
        }
    }

    /// Whether ledger mutations are permitted at this status.
    pub fn is_accountant_allowed(&self) -> bool {
        ACCOUNTANT_ALLOWED_STATUSES.contains(self)
    }

    /// Broader set accountants may view, annotate, and status-update.
    pub fn is_accountant_accessible(&self) -> bool {
        matches!(
            self,
            LeadStatus::Approved | LeadStatus::DisbursementInProgress
        ) || self.is_accountant_allowed()
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Identities reachable from the acting principal. Computed per request,
/// never cached — correctness requires the current hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSet {
    pub agent_ids: HashSet<String>,
    pub relationship_manager_user_ids: HashSet<String>,
    pub franchise_user_ids: HashSet<String>,
    pub regional_manager_ids: HashSet<String>,
}

impl ScopeSet {
    /// The fail-closed result: zero accessible records.
    pub fn empty() -> ScopeSet {
        ScopeSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.agent_ids.is_empty()
            && self.relationship_manager_user_ids.is_empty()
            && self.franchise_user_ids.is_empty()
            && self.regional_manager_ids.is_empty()
    }
}

/// Outcome of scope resolution for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// No filtering applies (super admin).
    Unrestricted,
    Restricted(ScopeSet),
}

impl Scope {
    /// Whether a lead owned by `agent_id` is visible under this scope.
    pub fn allows_agent(&self, agent_id: &str) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::Restricted(set) => set.agent_ids.contains(agent_id),
        }
    }

    /// The agent-id filter to intersect lead queries with, or `None`
    /// when unrestricted.
    pub fn agent_filter(&self) -> Option<&HashSet<String>> {
        match self {
            Scope::Unrestricted => None,
            Scope::Restricted(set) => Some(&set.agent_ids),
        }
    }
}

// ---------------------------------------------------------------------------
// Disbursement inputs
// ---------------------------------------------------------------------------

/// Input for adding a disbursement entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDisbursement {
    pub amount: f64,
    pub date: String,
    pub utr: String,
    #[serde(default)]
    pub bank_ref: Option<String>,
    #[serde(default)]
    pub commission: Option<f64>,
    #[serde(default)]
    pub gst: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Sparse patch for editing a disbursement entry. Unset fields retain
/// their prior values; `netCommission` is always re-derived from the
/// resulting commission and GST.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementPatch {
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub utr: Option<String>,
    pub bank_ref: Option<String>,
    pub commission: Option<f64>,
    pub gst: Option<f64>,
    pub notes: Option<String>,
}

impl DisbursementPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.date.is_none()
            && self.utr.is_none()
            && self.bank_ref.is_none()
            && self.commission.is_none()
            && self.gst.is_none()
            && self.notes.is_none()
    }
}

// ---------------------------------------------------------------------------
// Summaries and pagination
// ---------------------------------------------------------------------------

/// Snapshot of a lead's financial position returned by ledger mutations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: String,
    pub approved_amount: f64,
    pub total_disbursed: f64,
    pub remaining_amount: f64,
    pub status: LeadStatus,
}

/// Financial summary for a single lead detail view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub loan_amount: f64,
    pub total_disbursed: f64,
    pub remaining_amount: f64,
    pub commission_percentage: f64,
    pub calculated_commission: f64,
    pub total_commission: f64,
    pub total_gst: f64,
    pub net_commission: f64,
}

/// Fold over a lead's disbursement history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total_entries: usize,
    pub total_disbursed: f64,
    pub total_commission: f64,
    pub total_gst: f64,
    pub net_commission: f64,
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationMeta {
    pub fn new(total_items: u64, page: u32, limit: u32) -> PaginationMeta {
        let limit = limit.max(1);
        let total_pages = ((total_items + limit as u64 - 1) / limit as u64) as u32;
        PaginationMeta {
            current_page: page,
            total_pages,
            total_items,
            has_next_page: (page as u64) * (limit as u64) < total_items,
            has_prev_page: page > 1,
        }
    }
}
