//! Scope resolution — walks the organizational hierarchy to compute the
//! set of identities the acting principal may see or mutate.
//!
//! Regional Manager → franchises and relationship managers under it →
//! agents under those. The walk is recomputed on every request so it
//! reflects the current hierarchy, never a stale snapshot.
//!
//! Fail-closed: any lookup failure while walking degrades to the empty
//! scope. A broken reference must never widen financial access.

use std::collections::HashSet;

use crate::db::{DbError, LedgerDb};
use crate::error::CoreError;
use crate::types::{Principal, Role, Scope, ScopeSet};

/// Compute the scope for the acting principal.
///
/// Never errors: resolution failures log a warning and come back as the
/// empty restricted scope.
pub fn resolve_scope(db: &LedgerDb, principal: &Principal) -> Scope {
    match principal.role {
        Role::SuperAdmin => Scope::Unrestricted,
        Role::RegionalManager => restricted(regional_manager_scope(db, &principal.id), principal),
        Role::AccountsManager => restricted(accountant_scope(db, &principal.id), principal),
        Role::Agent => {
            let mut set = ScopeSet::empty();
            set.agent_ids.insert(principal.id.clone());
            Scope::Restricted(set)
        }
        Role::Franchise => restricted(franchise_scope(db, &principal.id), principal),
        Role::RelationshipManager => {
            restricted(relationship_manager_scope(db, &principal.id), principal)
        }
    }
}

fn restricted(result: Result<ScopeSet, DbError>, principal: &Principal) -> Scope {
    match result {
        Ok(set) => Scope::Restricted(set),
        Err(e) => {
            log::warn!(
                "Scope resolution failed for {} ({}): {e}. Degrading to empty scope.",
                principal.id,
                principal.role.as_str()
            );
            Scope::Restricted(ScopeSet::empty())
        }
    }
}

/// A regional manager sees itself plus the franchises and relationship
/// managers assigned to it.
fn regional_manager_scope(db: &LedgerDb, rm_user_id: &str) -> Result<ScopeSet, DbError> {
    let rm_ids = vec![rm_user_id.to_string()];
    build_from_rm_set(db, rm_ids)
}

/// An accountant's scope starts at its assigned Regional Managers. An
/// empty assignment set means zero accessible records, never
/// unrestricted access.
fn accountant_scope(db: &LedgerDb, accountant_user_id: &str) -> Result<ScopeSet, DbError> {
    let rm_ids = db.accountant_assigned_rm_ids(accountant_user_id)?;
    if rm_ids.is_empty() {
        return Ok(ScopeSet::empty());
    }
    build_from_rm_set(db, rm_ids)
}

/// Walk down from a Regional-Manager id set to franchises, relationship
/// managers, agents, and franchise-owner users.
fn build_from_rm_set(db: &LedgerDb, rm_ids: Vec<String>) -> Result<ScopeSet, DbError> {
    let franchise_ids = db.franchise_ids_under(&rm_ids)?;
    let rm_records = db.relationship_managers_under(&rm_ids)?;

    let rm_record_ids: Vec<String> = rm_records.iter().map(|(id, _)| id.clone()).collect();
    let rm_owner_ids: HashSet<String> = rm_records
        .into_iter()
        .filter_map(|(_, owner)| owner)
        .collect();

    let agent_ids: HashSet<String> = db
        .agent_ids_managed_by(&franchise_ids, &rm_record_ids)?
        .into_iter()
        .collect();
    let franchise_user_ids: HashSet<String> = db
        .franchise_owner_user_ids(&franchise_ids)?
        .into_iter()
        .collect();

    Ok(ScopeSet {
        agent_ids,
        relationship_manager_user_ids: rm_owner_ids,
        franchise_user_ids,
        regional_manager_ids: rm_ids.into_iter().collect(),
    })
}

/// A franchise-role user sees the agents its owned franchise manages.
fn franchise_scope(db: &LedgerDb, user_id: &str) -> Result<ScopeSet, DbError> {
    let mut set = ScopeSet::empty();
    set.franchise_user_ids.insert(user_id.to_string());

    if let Some(franchise_id) = db.franchise_owned_by_user(user_id)? {
        let agents = db.agent_ids_managed_by(&[franchise_id], &[])?;
        set.agent_ids.extend(agents);
    }
    Ok(set)
}

/// A relationship-manager-role user sees the agents under the RM
/// records it owns.
fn relationship_manager_scope(db: &LedgerDb, user_id: &str) -> Result<ScopeSet, DbError> {
    let mut set = ScopeSet::empty();
    set.relationship_manager_user_ids.insert(user_id.to_string());

    let rm_record_ids = db.rm_record_ids_owned_by(user_id)?;
    if !rm_record_ids.is_empty() {
        let agents = db.agent_ids_managed_by(&[], &rm_record_ids)?;
        set.agent_ids.extend(agents);
    }
    Ok(set)
}

/// Deny direct resource access when the lead's owning agent falls
/// outside the resolved scope.
pub fn ensure_lead_access(scope: &Scope, lead_agent_id: &str) -> Result<(), CoreError> {
    if scope.allows_agent(lead_agent_id) {
        Ok(())
    } else {
        Err(CoreError::AccessDenied(
            "Access denied. Lead is outside your assigned hierarchy.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::seeded_db;

    #[test]
    fn test_super_admin_unrestricted() {
        let db = seeded_db();
        let scope = resolve_scope(&db, &Principal::new("root", Role::SuperAdmin));
        assert_eq!(scope, Scope::Unrestricted);
    }

    #[test]
    fn test_accountant_hierarchy_walk() {
        let db = seeded_db();
        let scope = resolve_scope(&db, &Principal::new("acct-1", Role::AccountsManager));

        let set = match scope {
            Scope::Restricted(set) => set,
            Scope::Unrestricted => panic!("accountant must be restricted"),
        };
        // Agents reachable through both link kinds
        assert!(set.agent_ids.contains("agent-f"));
        assert!(set.agent_ids.contains("agent-r"));
        assert!(!set.agent_ids.contains("agent-other"));
        assert!(set.franchise_user_ids.contains("fr-owner-1"));
        assert!(set.relationship_manager_user_ids.contains("rm-owner-1"));
        assert!(set.regional_manager_ids.contains("rm-user-1"));
    }

    #[test]
    fn test_accountant_without_assignments_is_fail_closed() {
        let db = seeded_db();
        let scope = resolve_scope(&db, &Principal::new("acct-empty", Role::AccountsManager));
        assert_eq!(scope, Scope::Restricted(ScopeSet::empty()));

        // Missing profile entirely: also empty, never unrestricted.
        let scope = resolve_scope(&db, &Principal::new("ghost", Role::AccountsManager));
        assert_eq!(scope, Scope::Restricted(ScopeSet::empty()));
    }

    #[test]
    fn test_regional_manager_scope() {
        let db = seeded_db();
        let scope = resolve_scope(&db, &Principal::new("rm-user-1", Role::RegionalManager));
        let set = match scope {
            Scope::Restricted(set) => set,
            Scope::Unrestricted => panic!("rm must be restricted"),
        };
        assert!(set.regional_manager_ids.contains("rm-user-1"));
        assert!(set.agent_ids.contains("agent-f"));
        assert!(set.agent_ids.contains("agent-r"));
    }

    #[test]
    fn test_agent_self_scope() {
        let db = seeded_db();
        let scope = resolve_scope(&db, &Principal::new("agent-f", Role::Agent));
        assert!(scope.allows_agent("agent-f"));
        assert!(!scope.allows_agent("agent-r"));
    }

    #[test]
    fn test_franchise_scope_covers_managed_agents() {
        let db = seeded_db();
        let scope = resolve_scope(&db, &Principal::new("fr-owner-1", Role::Franchise));
        assert!(scope.allows_agent("agent-f"));
        assert!(!scope.allows_agent("agent-r"));
    }

    #[test]
    fn test_relationship_manager_scope_covers_managed_agents() {
        let db = seeded_db();
        let scope = resolve_scope(&db, &Principal::new("rm-owner-1", Role::RelationshipManager));
        assert!(scope.allows_agent("agent-r"));
        assert!(!scope.allows_agent("agent-f"));
    }

    #[test]
    fn test_ensure_lead_access() {
        let mut set = ScopeSet::empty();
        set.agent_ids.insert("a1".into());
        let scope = Scope::Restricted(set);
        assert!(ensure_lead_access(&scope, "a1").is_ok());
        assert!(matches!(
            ensure_lead_access(&scope, "a2"),
            Err(CoreError::AccessDenied(_))
        ));
    }
}
