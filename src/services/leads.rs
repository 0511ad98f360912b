//! Lead-facing operations for the accounts surface: the scoped lead
//! list, explicit status updates, and notes.

use serde::{Deserialize, Serialize};

use crate::db::{DbAuditEntry, DbLead, DbLeadNote, LeadFilter};
use crate::error::CoreError;
use crate::services::scope::{ensure_lead_access, resolve_scope};
use crate::state::AppState;
use crate::types::{
    LeadStatus, PaginationMeta, Principal, Scope, ACCOUNTANT_ALLOWED_STATUSES,
};
use crate::util::{new_id, now_rfc3339};

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    10
}
fn default_sort_by() -> String {
    "created_at".to_string()
}
fn default_sort_desc() -> bool {
    true
}

/// Query parameters for the scoped lead list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_desc")]
    pub sort_desc: bool,
}

impl Default for LeadListQuery {
    fn default() -> Self {
        LeadListQuery {
            page: default_page(),
            limit: default_limit(),
            status: None,
            search: None,
            bank: None,
            start_date: None,
            end_date: None,
            sort_by: default_sort_by(),
            sort_desc: default_sort_desc(),
        }
    }
}

/// One page of scoped leads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListPage {
    pub leads: Vec<DbLead>,
    pub pagination: PaginationMeta,
}

/// Input for an explicit status update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: LeadStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Result of a status update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResult {
    pub lead_id: String,
    pub previous_status: String,
    pub new_status: LeadStatus,
    pub notes: Option<String>,
}

/// Leads visible under the principal's scope, filtered and paginated.
///
/// Defaults to the ledger-eligible statuses; the two pre-disbursement
/// states only show up when named explicitly in the `status` filter.
/// An empty restricted scope short-circuits to an empty page without
/// touching the leads table.
pub fn list_leads(
    state: &AppState,
    principal: &Principal,
    query: &LeadListQuery,
) -> Result<LeadListPage, CoreError> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);

    state.with_db(|db| {
        let scope = resolve_scope(db, principal);
        if let Scope::Restricted(set) = &scope {
            if set.agent_ids.is_empty() {
                return Ok(LeadListPage {
                    leads: Vec::new(),
                    pagination: PaginationMeta::new(0, page, limit),
                });
            }
        }

        let statuses: Vec<LeadStatus> = match query.status {
            Some(status) => {
                if !status.is_accountant_accessible() {
                    return Err(CoreError::Validation(format!(
                        "Invalid status filter: {}",
                        status.as_str()
                    )));
                }
                vec![status]
            }
            None => ACCOUNTANT_ALLOWED_STATUSES.to_vec(),
        };

        let filter = LeadFilter {
            statuses: &statuses,
            agent_ids: scope.agent_filter(),
            search: query.search.as_deref(),
            bank: query.bank.as_deref(),
            start_date: query.start_date.as_deref(),
            end_date: query.end_date.as_deref(),
        };

        let total = db.count_leads(&filter)?;
        let leads = db.list_leads(
            &filter,
            &query.sort_by,
            query.sort_desc,
            Some(u64::from(page - 1) * u64::from(limit)),
            Some(u64::from(limit)),
        )?;

        Ok(LeadListPage {
            leads,
            pagination: PaginationMeta::new(total, page, limit),
        })
    })
}

/// Explicitly move a lead to another status, recording who did it and
/// why. The target must come from the allowed set; the current status
/// only needs to be accessible, so pre-disbursement leads can be pushed
/// into the ledger-eligible lifecycle.
pub fn update_lead_status(
    state: &AppState,
    principal: &Principal,
    lead_id: &str,
    update: &StatusUpdate,
) -> Result<StatusUpdateResult, CoreError> {
    if !update.status.is_accountant_allowed() {
        let allowed = ACCOUNTANT_ALLOWED_STATUSES
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CoreError::Validation(format!(
            "Invalid status: {}. Allowed statuses: {allowed}",
            update.status.as_str()
        )));
    }

    let lock = state.lead_lock(lead_id);
    let _guard = lock.lock();

    state.with_db(|db| {
        let lead = db
            .get_lead(lead_id)?
            .ok_or_else(|| CoreError::NotFound("Lead not found".to_string()))?;

        let scope = resolve_scope(db, principal);
        ensure_lead_access(&scope, &lead.agent_id)?;

        let current = LeadStatus::parse(&lead.status).ok_or_else(|| {
            CoreError::InvalidState(format!("Lead has unknown status: {}", lead.status))
        })?;
        if !current.is_accountant_accessible() {
            return Err(CoreError::InvalidState(format!(
                "Cannot update status from {}",
                lead.status
            )));
        }

        db.with_transaction(|db| {
            let now = now_rfc3339();
            db.set_lead_status(
                &lead.id,
                update.status,
                update.notes.as_deref(),
                &principal.id,
                &now,
            )?;

            if let Some(notes) = update.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                db.insert_lead_note(&DbLeadNote {
                    id: new_id(),
                    lead_id: lead.id.clone(),
                    content: notes.to_string(),
                    note_type: "status_change".to_string(),
                    created_by: Some(principal.id.clone()),
                    created_at: now.clone(),
                })?;
            }

            db.insert_audit_entry(&DbAuditEntry {
                id: new_id(),
                actor_id: principal.id.clone(),
                action: "status_updated".to_string(),
                entity_type: "lead".to_string(),
                entity_id: lead.id.clone(),
                before_json: Some(format!("{{\"status\":\"{}\"}}", lead.status)),
                after_json: Some(format!("{{\"status\":\"{}\"}}", update.status.as_str())),
                created_at: now,
            })?;

            log::info!(
                "Lead {} status updated by {}: {} -> {}",
                lead.id,
                principal.id,
                lead.status,
                update.status.as_str()
            );
            Ok(StatusUpdateResult {
                lead_id: lead.id.clone(),
                previous_status: lead.status.clone(),
                new_status: update.status,
                notes: update.notes.clone(),
            })
        })
    })
}

/// Attach a free-form note to an accessible lead.
pub fn add_lead_note(
    state: &AppState,
    principal: &Principal,
    lead_id: &str,
    content: &str,
) -> Result<DbLeadNote, CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::Validation("Note content is required".to_string()));
    }

    state.with_db(|db| {
        let lead = db
            .get_lead(lead_id)?
            .ok_or_else(|| CoreError::NotFound("Lead not found".to_string()))?;

        let scope = resolve_scope(db, principal);
        ensure_lead_access(&scope, &lead.agent_id)?;

        let status = LeadStatus::parse(&lead.status).ok_or_else(|| {
            CoreError::InvalidState(format!("Lead has unknown status: {}", lead.status))
        })?;
        if !status.is_accountant_accessible() {
            return Err(CoreError::InvalidState(format!(
                "Cannot add note for this lead status: {}",
                lead.status
            )));
        }

        let note = DbLeadNote {
            id: new_id(),
            lead_id: lead.id,
            content: content.trim().to_string(),
            note_type: "general".to_string(),
            created_by: Some(principal.id.clone()),
            created_at: now_rfc3339(),
        };
        db.insert_lead_note(&note)?;
        Ok(note)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::state_with_hierarchy;
    use crate::types::Role;

    fn accountant() -> Principal {
        Principal::new("acct-1", Role::AccountsManager)
    }

    #[test]
    fn test_list_is_scoped_to_hierarchy() {
        let (state, _dir) = state_with_hierarchy();
        let page = list_leads(&state, &accountant(), &LeadListQuery::default()).expect("list");

        // agent-f and agent-r are in scope; agent-other is not. l-f2 is
        // still 'approved' and stays out of the default listing.
        assert_eq!(page.leads.len(), 2);
        assert!(page.leads.iter().all(|l| l.agent_id != "agent-other"));
        assert_eq!(page.pagination.total_items, 2);

        let all = list_leads(
            &state,
            &Principal::new("root", Role::SuperAdmin),
            &LeadListQuery::default(),
        )
        .expect("list");
        assert_eq!(all.pagination.total_items, 3);
    }

    #[test]
    fn test_default_list_excludes_pre_approval_statuses() {
        let (state, _dir) = state_with_hierarchy();
        let page = list_leads(&state, &accountant(), &LeadListQuery::default()).expect("list");
        assert!(page.leads.iter().all(|l| {
            LeadStatus::parse(&l.status)
                .map(|s| s.is_accountant_allowed())
                .unwrap_or(false)
        }));
        assert!(!page.leads.iter().any(|l| l.id == "l-f2"));

        // Naming a pre-disbursement status explicitly still works.
        let query = LeadListQuery {
            status: Some(LeadStatus::Approved),
            ..Default::default()
        };
        let approved = list_leads(&state, &accountant(), &query).expect("list");
        assert_eq!(approved.leads.len(), 1);
        assert_eq!(approved.leads[0].id, "l-f2");
    }

    #[test]
    fn test_list_empty_scope_short_circuits() {
        let (state, _dir) = state_with_hierarchy();
        let p = Principal::new("acct-empty", Role::AccountsManager);
        let page = list_leads(&state, &p, &LeadListQuery::default()).expect("list");
        assert!(page.leads.is_empty());
        assert_eq!(page.pagination.total_items, 0);
    }

    #[test]
    fn test_list_status_and_search_filters() {
        let (state, _dir) = state_with_hierarchy();
        let query = LeadListQuery {
            status: Some(LeadStatus::Sanctioned),
            ..Default::default()
        };
        let page = list_leads(&state, &accountant(), &query).expect("list");
        assert!(page.leads.iter().all(|l| l.status == "sanctioned"));

        let query = LeadListQuery {
            search: Some("ravi".to_string()),
            ..Default::default()
        };
        let page = list_leads(&state, &accountant(), &query).expect("list");
        assert_eq!(page.leads.len(), 1);
        assert_eq!(page.leads[0].customer_name, "Ravi Kumar");
    }

    #[test]
    fn test_list_pagination_meta() {
        let (state, _dir) = state_with_hierarchy();
        let query = LeadListQuery {
            limit: 1,
            ..Default::default()
        };
        let page = list_leads(&state, &accountant(), &query).expect("list");
        assert_eq!(page.leads.len(), 1);
        assert_eq!(page.pagination.total_pages, 2);
        assert!(page.pagination.has_next_page);
        assert!(!page.pagination.has_prev_page);
    }

    #[test]
    fn test_status_update_from_pre_approval() {
        let (state, _dir) = state_with_hierarchy();
        let update = StatusUpdate {
            status: LeadStatus::Sanctioned,
            notes: Some("Sanction letter received".to_string()),
        };
        // l-f2 is 'approved': accessible, so it can be moved into the
        // ledger-eligible lifecycle.
        let result = update_lead_status(&state, &accountant(), "l-f2", &update).expect("update");
        assert_eq!(result.previous_status, "approved");
        assert_eq!(result.new_status, LeadStatus::Sanctioned);

        let count = state
            .with_db(|db| Ok(db.count_lead_notes("l-f2")?))
            .expect("notes");
        assert_eq!(count, 1);
        let audits = state
            .with_db(|db| Ok(db.count_audit_entries("l-f2")?))
            .expect("audit");
        assert_eq!(audits, 1);
    }

    #[test]
    fn test_status_update_rejects_disallowed_target() {
        let (state, _dir) = state_with_hierarchy();
        let update = StatusUpdate {
            status: LeadStatus::Approved,
            notes: None,
        };
        assert!(matches!(
            update_lead_status(&state, &accountant(), "l-f1", &update),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_status_update_denied_out_of_scope() {
        let (state, _dir) = state_with_hierarchy();
        let update = StatusUpdate {
            status: LeadStatus::Disbursed,
            notes: None,
        };
        assert!(matches!(
            update_lead_status(&state, &accountant(), "l-o1", &update),
            Err(CoreError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_add_note_validation_and_scope() {
        let (state, _dir) = state_with_hierarchy();
        let note = add_lead_note(&state, &accountant(), "l-f1", "Follow up on UTR").expect("note");
        assert_eq!(note.note_type, "general");

        assert!(matches!(
            add_lead_note(&state, &accountant(), "l-f1", "   "),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            add_lead_note(&state, &accountant(), "l-o1", "peek"),
            Err(CoreError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_add_note_requires_eligible_status() {
        let (state, _dir) = state_with_hierarchy();

        // 'approved' is in the accessible set, so pre-disbursement leads
        // can still take notes.
        assert!(add_lead_note(&state, &accountant(), "l-f2", "docs pending").is_ok());

        // A status outside the lifecycle rejects the note.
        state
            .with_db(|db| {
                db.conn_ref()
                    .execute("UPDATE leads SET status = 'rejected' WHERE id = 'l-f1'", [])
                    .map_err(|e| CoreError::Db(crate::db::DbError::Sqlite(e)))?;
                Ok(())
            })
            .expect("set status");
        assert!(matches!(
            add_lead_note(&state, &accountant(), "l-f1", "note"),
            Err(CoreError::InvalidState(_))
        ));
    }
}
