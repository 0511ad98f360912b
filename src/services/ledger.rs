//! Ledger engine — add/edit/delete disbursement entries on a lead,
//! plus the pure history and detail reads.
//!
//! Every mutation takes the acting principal explicitly, serializes on
//! the per-lead lock, runs inside a single transaction, re-derives the
//! lead's aggregates by folding the full entry list, reapplies the
//! status rule, and writes an audit entry. A failed validation rolls
//! the transaction back; no partial state survives.

use serde::Serialize;

use crate::db::{DbAuditEntry, DbDisbursement, DbLead, LedgerDb};
use crate::error::CoreError;
use crate::services::scope::{ensure_lead_access, resolve_scope};
use crate::state::AppState;
use crate::types::{
    DisbursementPatch, FinancialSummary, HistorySummary, LeadStatus, LeadSummary, NewDisbursement,
    Principal, ACCOUNTANT_ALLOWED_STATUSES,
};
use crate::util::{new_id, now_rfc3339};

/// Result of a successful add.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDisbursementResult {
    pub lead: LeadSummary,
    pub disbursement: DbDisbursement,
}

/// Result of a successful edit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDisbursementResult {
    pub lead: LeadSummary,
    pub updated_disbursement: DbDisbursement,
}

/// Result of a successful delete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDisbursementResult {
    pub lead: LeadSummary,
    pub deleted_entry: DbDisbursement,
}

/// A lead's disbursement history with its fold.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementHistory {
    pub lead_id: String,
    pub customer_name: String,
    pub loan_amount: f64,
    pub history: Vec<DbDisbursement>,
    pub summary: HistorySummary,
}

/// Lead detail view with the derived financial summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetails {
    pub lead: DbLead,
    pub financial_summary: FinancialSummary,
}

fn allowed_statuses_list() -> String {
    ACCOUNTANT_ALLOWED_STATUSES
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn lead_summary(lead_id: &str, loan_amount: f64, disbursed: f64, status: LeadStatus) -> LeadSummary {
    LeadSummary {
        id: lead_id.to_string(),
        approved_amount: loan_amount,
        total_disbursed: disbursed,
        remaining_amount: loan_amount - disbursed,
        status,
    }
}

/// Load the lead and enforce scope plus ledger-mutation eligibility.
fn load_mutable_lead(
    db: &LedgerDb,
    principal: &Principal,
    lead_id: &str,
    operation: &str,
) -> Result<(DbLead, LeadStatus), CoreError> {
    let lead = db
        .get_lead(lead_id)?
        .ok_or_else(|| CoreError::NotFound("Lead not found".to_string()))?;

    let scope = resolve_scope(db, principal);
    ensure_lead_access(&scope, &lead.agent_id)?;

    let status = LeadStatus::parse(&lead.status).ok_or_else(|| {
        CoreError::InvalidState(format!("Lead has unknown status: {}", lead.status))
    })?;
    if !status.is_accountant_allowed() {
        return Err(CoreError::InvalidState(format!(
            "Cannot {operation} for this lead status. Current status: {}. Allowed statuses: {}",
            lead.status,
            allowed_statuses_list()
        )));
    }
    Ok((lead, status))
}

fn write_audit(
    db: &LedgerDb,
    principal: &Principal,
    action: &str,
    lead_id: &str,
    before: Option<&DbDisbursement>,
    after: Option<&DbDisbursement>,
) -> Result<(), CoreError> {
    let entry = DbAuditEntry {
        id: new_id(),
        actor_id: principal.id.clone(),
        action: action.to_string(),
        entity_type: "lead".to_string(),
        entity_id: lead_id.to_string(),
        before_json: before.and_then(|e| serde_json::to_string(e).ok()),
        after_json: after.and_then(|e| serde_json::to_string(e).ok()),
        created_at: now_rfc3339(),
    };
    db.insert_audit_entry(&entry)?;
    Ok(())
}

/// Re-derive aggregates from the full entry list and reapply the status
/// rule. Returns the new `(disbursed, commission, status)`.
fn resum_and_apply(
    db: &LedgerDb,
    lead_id: &str,
    loan_amount: f64,
) -> Result<(f64, f64, LeadStatus), CoreError> {
    let (disbursed, commission) = db.sum_disbursements(lead_id)?;
    let status = LeadStatus::for_amounts(disbursed, loan_amount);
    db.update_lead_aggregates(lead_id, disbursed, commission, status, &now_rfc3339())?;
    Ok((disbursed, commission, status))
}

/// Add a disbursement entry to a lead.
pub fn add_disbursement(
    state: &AppState,
    principal: &Principal,
    lead_id: &str,
    input: NewDisbursement,
) -> Result<AddDisbursementResult, CoreError> {
    if input.date.trim().is_empty() || input.utr.trim().is_empty() {
        return Err(CoreError::Validation(
            "Amount, date, and UTR are required".to_string(),
        ));
    }
    if input.amount <= 0.0 {
        return Err(CoreError::Validation(
            "Disbursement amount must be greater than 0".to_string(),
        ));
    }

    let lock = state.lead_lock(lead_id);
    let _guard = lock.lock();

    state.with_db(|db| {
        let (lead, _) = load_mutable_lead(db, principal, lead_id, "add disbursement")?;

        let remaining = lead.loan_amount - lead.disbursed_amount;
        if input.amount > remaining {
            return Err(CoreError::LimitExceeded(format!(
                "Disbursement amount cannot exceed remaining amount. Maximum allowed: {remaining}"
            )));
        }

        db.with_transaction(|db| {
            let commission = input.commission.unwrap_or(0.0);
            let gst = input.gst.unwrap_or(0.0);
            let entry = DbDisbursement {
                id: new_id(),
                lead_id: lead.id.clone(),
                seq: db.next_disbursement_seq(&lead.id)?,
                amount: input.amount,
                date: input.date.clone(),
                utr: input.utr.clone(),
                bank_ref: input.bank_ref.clone(),
                commission,
                gst,
                net_commission: commission - gst,
                notes: input.notes.clone(),
                created_by: Some(principal.id.clone()),
                updated_by: None,
                created_at: now_rfc3339(),
                updated_at: None,
            };
            db.insert_disbursement(&entry)?;

            let (disbursed, _, status) = resum_and_apply(db, &lead.id, lead.loan_amount)?;
            write_audit(db, principal, "disbursement_added", &lead.id, None, Some(&entry))?;

            log::info!(
                "Disbursement added to lead {}: amount {}, new total {}",
                lead.id,
                entry.amount,
                disbursed
            );
            Ok(AddDisbursementResult {
                lead: lead_summary(&lead.id, lead.loan_amount, disbursed, status),
                disbursement: entry,
            })
        })
    })
}

/// Edit an existing entry. Only the fields present in `patch` change;
/// `net_commission` is re-derived from the resulting commission/GST.
pub fn edit_disbursement(
    state: &AppState,
    principal: &Principal,
    lead_id: &str,
    entry_id: &str,
    patch: DisbursementPatch,
) -> Result<EditDisbursementResult, CoreError> {
    let lock = state.lead_lock(lead_id);
    let _guard = lock.lock();

    state.with_db(|db| {
        let (lead, _) = load_mutable_lead(db, principal, lead_id, "edit disbursement")?;

        let original = db
            .get_disbursement(&lead.id, entry_id)?
            .ok_or_else(|| CoreError::NotFound("Disbursement entry not found".to_string()))?;

        let commission = patch.commission.unwrap_or(original.commission);
        let gst = patch.gst.unwrap_or(original.gst);
        let updated = DbDisbursement {
            amount: patch.amount.unwrap_or(original.amount),
            date: patch.date.clone().unwrap_or_else(|| original.date.clone()),
            utr: patch.utr.clone().unwrap_or_else(|| original.utr.clone()),
            bank_ref: patch.bank_ref.clone().or_else(|| original.bank_ref.clone()),
            commission,
            gst,
            net_commission: commission - gst,
            notes: patch.notes.clone().or_else(|| original.notes.clone()),
            updated_by: Some(principal.id.clone()),
            updated_at: Some(now_rfc3339()),
            ..original.clone()
        };

        if updated.amount <= 0.0 {
            return Err(CoreError::Validation(
                "Disbursement amount must be greater than 0".to_string(),
            ));
        }
        if updated.utr.trim().is_empty() {
            return Err(CoreError::Validation("UTR is required".to_string()));
        }

        db.with_transaction(|db| {
            db.update_disbursement(&updated)?;

            // Validate after the tentative update; Err rolls it back.
            let (disbursed, _) = db.sum_disbursements(&lead.id)?;
            if disbursed > lead.loan_amount {
                return Err(CoreError::LimitExceeded(format!(
                    "Edit would cause over-disbursement. Maximum allowed: {}",
                    lead.loan_amount
                )));
            }

            let (disbursed, _, status) = resum_and_apply(db, &lead.id, lead.loan_amount)?;
            write_audit(
                db,
                principal,
                "disbursement_updated",
                &lead.id,
                Some(&original),
                Some(&updated),
            )?;

            Ok(EditDisbursementResult {
                lead: lead_summary(&lead.id, lead.loan_amount, disbursed, status),
                updated_disbursement: updated,
            })
        })
    })
}

/// Delete an entry. Deleting the last entry brings the lead back to
/// `sanctioned`.
pub fn delete_disbursement(
    state: &AppState,
    principal: &Principal,
    lead_id: &str,
    entry_id: &str,
) -> Result<DeleteDisbursementResult, CoreError> {
    let lock = state.lead_lock(lead_id);
    let _guard = lock.lock();

    state.with_db(|db| {
        let (lead, _) = load_mutable_lead(db, principal, lead_id, "delete disbursement")?;

        let entry = db
            .get_disbursement(&lead.id, entry_id)?
            .ok_or_else(|| CoreError::NotFound("Disbursement entry not found".to_string()))?;

        db.with_transaction(|db| {
            db.delete_disbursement(&lead.id, &entry.id)?;
            let (disbursed, _, status) = resum_and_apply(db, &lead.id, lead.loan_amount)?;
            write_audit(
                db,
                principal,
                "disbursement_deleted",
                &lead.id,
                Some(&entry),
                None,
            )?;

            Ok(DeleteDisbursementResult {
                lead: lead_summary(&lead.id, lead.loan_amount, disbursed, status),
                deleted_entry: entry,
            })
        })
    })
}

/// A lead's disbursement history plus the fold over its entries.
/// Pure read; missing numeric fields count as zero.
pub fn disbursement_history(
    state: &AppState,
    principal: &Principal,
    lead_id: &str,
) -> Result<DisbursementHistory, CoreError> {
    state.with_db(|db| {
        let (lead, _) = load_mutable_lead(db, principal, lead_id, "access disbursement history")?;

        let history = db.list_disbursements(&lead.id)?;
        let total_disbursed: f64 = history.iter().map(|e| e.amount).sum();
        let total_commission: f64 = history.iter().map(|e| e.commission).sum();
        let total_gst: f64 = history.iter().map(|e| e.gst).sum();

        Ok(DisbursementHistory {
            lead_id: lead.id.clone(),
            customer_name: lead.customer_name.clone(),
            loan_amount: lead.loan_amount,
            summary: HistorySummary {
                total_entries: history.len(),
                total_disbursed,
                total_commission,
                total_gst,
                net_commission: total_commission - total_gst,
            },
            history,
        })
    })
}

/// Single-lead detail view. Viewing tolerates the broader accessible
/// status set; out-of-scope direct access is denied.
pub fn lead_details(
    state: &AppState,
    principal: &Principal,
    lead_id: &str,
) -> Result<LeadDetails, CoreError> {
    state.with_db(|db| {
        let lead = db
            .get_lead(lead_id)?
            .ok_or_else(|| CoreError::NotFound("Approved lead not found".to_string()))?;

        let scope = resolve_scope(db, principal);
        ensure_lead_access(&scope, &lead.agent_id)?;

        let status = LeadStatus::parse(&lead.status).ok_or_else(|| {
            CoreError::InvalidState(format!("Lead has unknown status: {}", lead.status))
        })?;
        if !status.is_accountant_accessible() {
            return Err(CoreError::NotFound("Approved lead not found".to_string()));
        }

        let entries = db.list_disbursements(&lead.id)?;
        let total_commission: f64 = entries.iter().map(|e| e.commission).sum();
        let total_gst: f64 = entries.iter().map(|e| e.gst).sum();

        Ok(LeadDetails {
            financial_summary: FinancialSummary {
                loan_amount: lead.loan_amount,
                total_disbursed: lead.disbursed_amount,
                remaining_amount: lead.loan_amount - lead.disbursed_amount,
                commission_percentage: lead.commission_percentage,
                calculated_commission: lead.commission_amount,
                total_commission,
                total_gst,
                net_commission: total_commission - total_gst,
            },
            lead,
        })
    })
}
