//! Shared test fixtures: a small organizational hierarchy with leads in
//! several statuses, used by the db and service tests.

use tempfile::TempDir;

use crate::db::{
    DbDisbursement, DbFranchise, DbLead, DbRelationshipManager, DbUser, LedgerDb,
};
use crate::state::AppState;
use crate::types::NewDisbursement;

const T0: &str = "2026-01-01T00:00:00Z";

/// A bare sanctioned lead with no disbursements yet.
pub fn lead_row(id: &str, agent_id: &str, loan_amount: f64) -> DbLead {
    DbLead {
        id: id.to_string(),
        lead_code: format!("T-{id}"),
        customer_name: "Test Customer".to_string(),
        loan_account_no: None,
        bank_name: None,
        agent_id: agent_id.to_string(),
        status: "sanctioned".to_string(),
        loan_amount,
        disbursed_amount: 0.0,
        commission_amount: 0.0,
        commission_percentage: 0.0,
        status_notes: None,
        status_updated_by: None,
        status_updated_at: None,
        created_by: None,
        created_at: T0.to_string(),
        updated_at: T0.to_string(),
    }
}

/// A disbursement entry row with zero commission/GST.
pub fn entry_row(id: &str, lead_id: &str, amount: f64, date: &str) -> DbDisbursement {
    DbDisbursement {
        id: id.to_string(),
        lead_id: lead_id.to_string(),
        seq: 1,
        amount,
        date: date.to_string(),
        utr: format!("UTR-{id}"),
        bank_ref: None,
        commission: 0.0,
        gst: 0.0,
        net_commission: 0.0,
        notes: None,
        created_by: Some("acct-1".to_string()),
        updated_by: None,
        created_at: T0.to_string(),
        updated_at: None,
    }
}

/// Service-level input for an add-disbursement call.
pub fn new_entry(amount: f64) -> NewDisbursement {
    NewDisbursement {
        amount,
        date: "2026-03-01".to_string(),
        utr: "UTR-TEST-1".to_string(),
        bank_ref: None,
        commission: None,
        gst: None,
        notes: None,
    }
}

fn user(id: &str, role: &str) -> DbUser {
    DbUser {
        id: id.to_string(),
        name: format!("User {id}"),
        email: None,
        role: role.to_string(),
        managed_by_kind: None,
        managed_by: None,
        franchise_owned: None,
        created_at: T0.to_string(),
    }
}

fn agent(id: &str, kind: &str, managed_by: &str) -> DbUser {
    DbUser {
        managed_by_kind: Some(kind.to_string()),
        managed_by: Some(managed_by.to_string()),
        ..user(id, "agent")
    }
}

/// Hierarchy under regional manager `rm-user-1`:
///
/// ```text
/// rm-user-1 ── fr-1 (owner fr-owner-1) ── agent-f
///          └── rmr-1 (owner rm-owner-1) ── agent-r
/// rm-user-2 ── fr-other ── agent-other          (out of scope)
/// ```
///
/// Accountant `acct-1` is assigned to rm-user-1; `acct-empty` has a
/// profile but no assignments. Leads l-f1/l-f2 belong to agent-f,
/// l-r1 to agent-r (with one February entry), l-o1 to agent-other.
fn seed(db: &LedgerDb) {
    db.insert_user(&user("rm-user-1", "regional_manager")).expect("user");
    db.insert_user(&user("rm-user-2", "regional_manager")).expect("user");
    db.insert_user(&user("rm-owner-1", "relationship_manager")).expect("user");
    db.insert_user(&DbUser {
        franchise_owned: Some("fr-1".to_string()),
        ..user("fr-owner-1", "franchise")
    })
    .expect("user");
    db.insert_user(&agent("agent-f", "franchise", "fr-1")).expect("user");
    db.insert_user(&agent("agent-r", "relationship_manager", "rmr-1")).expect("user");
    db.insert_user(&agent("agent-other", "franchise", "fr-other")).expect("user");
    db.insert_user(&user("acct-1", "accounts_manager")).expect("user");
    db.insert_user(&user("acct-empty", "accounts_manager")).expect("user");

    db.insert_franchise(&DbFranchise {
        id: "fr-1".to_string(),
        name: "North Franchise".to_string(),
        regional_manager: Some("rm-user-1".to_string()),
        created_at: T0.to_string(),
    })
    .expect("franchise");
    db.insert_franchise(&DbFranchise {
        id: "fr-other".to_string(),
        name: "South Franchise".to_string(),
        regional_manager: Some("rm-user-2".to_string()),
        created_at: T0.to_string(),
    })
    .expect("franchise");

    db.insert_relationship_manager(&DbRelationshipManager {
        id: "rmr-1".to_string(),
        name: "North RM Desk".to_string(),
        regional_manager: Some("rm-user-1".to_string()),
        owner_user_id: Some("rm-owner-1".to_string()),
        created_at: T0.to_string(),
    })
    .expect("rm");

    db.insert_accountant("acct-1", "Primary Accountant", T0).expect("accountant");
    db.insert_accountant("acct-empty", "Unassigned Accountant", T0).expect("accountant");
    db.assign_regional_manager("acct-1", "rm-user-1").expect("assign");

    // Leads. l-f1 is the mutation target of most ledger tests; l-f2 is
    // still pre-approval; l-r1 and l-o1 carry existing entries.
    db.insert_lead(&DbLead {
        customer_name: "Ravi Kumar".to_string(),
        lead_code: "LL-001".to_string(),
        bank_name: Some("HDFC".to_string()),
        created_at: "2026-01-10T09:00:00Z".to_string(),
        ..lead_row("l-f1", "agent-f", 100_000.0)
    })
    .expect("lead");
    db.insert_lead(&DbLead {
        customer_name: "Meena Devi".to_string(),
        lead_code: "LL-002".to_string(),
        bank_name: Some("HDFC".to_string()),
        status: "approved".to_string(),
        created_at: "2026-01-12T09:00:00Z".to_string(),
        ..lead_row("l-f2", "agent-f", 80_000.0)
    })
    .expect("lead");
    db.insert_lead(&DbLead {
        customer_name: "Suresh Patel".to_string(),
        lead_code: "LL-003".to_string(),
        bank_name: Some("ICICI".to_string()),
        status: "partial_disbursed".to_string(),
        disbursed_amount: 50_000.0,
        commission_amount: 5_000.0,
        created_at: "2026-01-20T09:00:00Z".to_string(),
        ..lead_row("l-r1", "agent-r", 200_000.0)
    })
    .expect("lead");
    db.insert_lead(&DbLead {
        customer_name: "Outside Customer".to_string(),
        lead_code: "XX-100".to_string(),
        bank_name: Some("SBI".to_string()),
        status: "partial_disbursed".to_string(),
        disbursed_amount: 20_000.0,
        created_at: "2026-01-05T09:00:00Z".to_string(),
        ..lead_row("l-o1", "agent-other", 150_000.0)
    })
    .expect("lead");

    db.insert_disbursement(&DbDisbursement {
        commission: 5_000.0,
        gst: 500.0,
        net_commission: 4_500.0,
        ..entry_row("e-r1", "l-r1", 50_000.0, "2026-02-15")
    })
    .expect("entry");
    db.insert_disbursement(&entry_row("e-o1", "l-o1", 20_000.0, "2026-01-05"))
        .expect("entry");
}

/// In-memory database pre-loaded with the fixture hierarchy.
pub fn seeded_db() -> LedgerDb {
    let db = LedgerDb::open_in_memory().expect("open");
    seed(&db);
    db
}

/// On-disk state pre-loaded with the fixture hierarchy, for service
/// tests that go through [`AppState`].
pub fn state_with_hierarchy() -> (AppState, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = AppState::open_at(dir.path().join("ledger.db")).expect("open");
    state
        .with_db(|db| {
            seed(db);
            Ok(())
        })
        .expect("seed");
    (state, dir)
}
