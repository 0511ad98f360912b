//! Commission report: one row per disbursement entry across the
//! in-scope leads, with totals computed over the full filtered set so
//! they never change with the page size.

use serde::{Deserialize, Serialize};

use crate::db::{CommissionFilter, DbCommissionRow};
use crate::error::CoreError;
use crate::services::scope::resolve_scope;
use crate::state::AppState;
use crate::types::{LeadStatus, PaginationMeta, Principal, ACCOUNTANT_ALLOWED_STATUSES};

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    20
}

/// Query parameters for the commission report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionReportQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
}

impl Default for CommissionReportQuery {
    fn default() -> Self {
        CommissionReportQuery {
            page: default_page(),
            limit: default_limit(),
            status: None,
            start_date: None,
            end_date: None,
            bank: None,
            agent_name: None,
        }
    }
}

/// Totals over the full filtered set, not the returned page.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionTotals {
    pub total_entries: usize,
    pub total_disbursed: f64,
    pub gross_commission: f64,
    pub total_gst: f64,
    pub net_commission: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionReport {
    pub entries: Vec<DbCommissionRow>,
    pub totals: CommissionTotals,
    pub pagination: PaginationMeta,
}

fn fold_totals(rows: &[DbCommissionRow]) -> CommissionTotals {
    let mut totals = CommissionTotals {
        total_entries: rows.len(),
        ..Default::default()
    };
    for row in rows {
        totals.total_disbursed += row.amount;
        totals.gross_commission += row.commission;
        totals.total_gst += row.gst;
        totals.net_commission += row.net_commission;
    }
    totals
}

/// Build the commission report for the principal's scope.
///
/// The store returns the unpaginated filtered set; totals come from that
/// set and only the listed page is sliced out of it.
pub fn commission_report(
    state: &AppState,
    principal: &Principal,
    query: &CommissionReportQuery,
) -> Result<CommissionReport, CoreError> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 200);

    let statuses: Vec<LeadStatus> = match query.status {
        Some(status) => {
            if !status.is_accountant_allowed() {
                return Err(CoreError::Validation(format!(
                    "Invalid status filter: {}",
                    status.as_str()
                )));
            }
            vec![status]
        }
        None => ACCOUNTANT_ALLOWED_STATUSES.to_vec(),
    };

    state.with_db(|db| {
        let scope = resolve_scope(db, principal);

        let filter = CommissionFilter {
            statuses: &statuses,
            agent_ids: scope.agent_filter(),
            start_date: query.start_date.as_deref(),
            end_date: query.end_date.as_deref(),
            bank: query.bank.as_deref(),
            agent_name: query.agent_name.as_deref(),
        };
        let rows = db.commission_entries(&filter)?;
        let totals = fold_totals(&rows);
        let total_items = rows.len() as u64;

        let start = (page as usize - 1).saturating_mul(limit as usize);
        let entries: Vec<DbCommissionRow> = rows
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();

        Ok(CommissionReport {
            entries,
            totals,
            pagination: PaginationMeta::new(total_items, page, limit),
        })
    })
}
