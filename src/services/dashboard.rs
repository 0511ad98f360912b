//! Dashboard aggregation: the lead-level financial fold, the most
//! recent leads, and global disbursement stats, all restricted to the
//! acting principal's scope.

use serde::Serialize;

use crate::db::{DbLead, LeadFilter};
use crate::error::CoreError;
use crate::services::scope::resolve_scope;
use crate::state::AppState;
use crate::types::{Principal, ACCOUNTANT_ALLOWED_STATUSES};
use crate::util::{month_start, next_month_start};

/// Fold over every in-scope lead in the ledger-eligible statuses.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_approved_amount: f64,
    pub total_disbursed_amount: f64,
    pub total_remaining_amount: f64,
    pub total_commission: f64,
    pub total_loans: u64,
    pub active_leads: u64,
    pub completed_leads: u64,
}

/// Entry-level stats across the same scope.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementStats {
    pub total_entries: u64,
    pub total_amount: f64,
    pub this_month_amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub stats: DashboardStats,
    pub recent_leads: Vec<DbLead>,
    pub disbursements: DisbursementStats,
}

const RECENT_LEADS: usize = 5;

fn fold_stats(leads: &[DbLead]) -> DashboardStats {
    let mut stats = DashboardStats::default();
    for lead in leads {
        stats.total_approved_amount += lead.loan_amount;
        stats.total_disbursed_amount += lead.disbursed_amount;
        stats.total_remaining_amount += lead.loan_amount - lead.disbursed_amount;
        stats.total_commission += lead.commission_amount;
        stats.total_loans += 1;
        if lead.disbursed_amount >= lead.loan_amount {
            stats.completed_leads += 1;
        } else {
            stats.active_leads += 1;
        }
    }
    stats
}

/// The accounts dashboard. An empty restricted scope produces all-zero
/// stats and an empty recent list rather than an error.
pub fn dashboard_summary(
    state: &AppState,
    principal: &Principal,
) -> Result<DashboardSummary, CoreError> {
    state.with_db(|db| {
        let scope = resolve_scope(db, principal);
        let agent_ids = scope.agent_filter();

        let filter = LeadFilter {
            statuses: &ACCOUNTANT_ALLOWED_STATUSES,
            agent_ids,
            ..Default::default()
        };
        // Full in-scope set: the fold needs every lead, not a page.
        let leads = db.list_leads(&filter, "created_at", true, None, None)?;
        let stats = fold_stats(&leads);

        let (total_entries, total_amount, this_month_amount) = db.disbursement_stats(
            agent_ids,
            &ACCOUNTANT_ALLOWED_STATUSES,
            &month_start(),
            &next_month_start(),
        )?;

        let mut recent_leads = leads;
        recent_leads.truncate(RECENT_LEADS);

        Ok(DashboardSummary {
            stats,
            recent_leads,
            disbursements: DisbursementStats {
                total_entries,
                total_amount,
                this_month_amount,
            },
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::state_with_hierarchy;
    use crate::types::Role;

    #[test]
    fn test_summary_folds_in_scope_leads() {
        let (state, _dir) = state_with_hierarchy();
        let p = Principal::new("acct-1", Role::AccountsManager);
        let summary = dashboard_summary(&state, &p).expect("summary");

        // In scope and ledger-eligible: l-f1 (100k/0) and l-r1 (200k/50k).
        // l-f2 is still 'approved', l-o1 is out of scope.
        assert_eq!(summary.stats.total_loans, 2);
        assert_eq!(summary.stats.total_approved_amount, 300_000.0);
        assert_eq!(summary.stats.total_disbursed_amount, 50_000.0);
        assert_eq!(summary.stats.total_remaining_amount, 250_000.0);
        assert_eq!(summary.stats.total_commission, 5_000.0);
        assert_eq!(summary.stats.active_leads, 2);
        assert_eq!(summary.stats.completed_leads, 0);

        assert_eq!(summary.recent_leads.len(), 2);
        assert_eq!(summary.disbursements.total_entries, 1);
        assert_eq!(summary.disbursements.total_amount, 50_000.0);
    }

    #[test]
    fn test_empty_scope_yields_zero_stats() {
        let (state, _dir) = state_with_hierarchy();
        let p = Principal::new("acct-empty", Role::AccountsManager);
        let summary = dashboard_summary(&state, &p).expect("summary");

        assert_eq!(summary.stats.total_loans, 0);
        assert_eq!(summary.stats.total_approved_amount, 0.0);
        assert!(summary.recent_leads.is_empty());
        assert_eq!(summary.disbursements.total_entries, 0);
        assert_eq!(summary.disbursements.this_month_amount, 0.0);
    }

    #[test]
    fn test_super_admin_sees_everything() {
        let (state, _dir) = state_with_hierarchy();
        let p = Principal::new("root", Role::SuperAdmin);
        let summary = dashboard_summary(&state, &p).expect("summary");

        // l-o1 joins the fold for an unrestricted principal.
        assert_eq!(summary.stats.total_loans, 3);
        assert_eq!(summary.stats.total_approved_amount, 450_000.0);
        assert_eq!(summary.disbursements.total_entries, 2);
        assert_eq!(summary.disbursements.total_amount, 70_000.0);
    }
}
