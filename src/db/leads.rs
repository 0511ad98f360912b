//! Lead table queries: CRUD, filtered listing, and aggregate folds.

use std::collections::HashSet;

use rusqlite::{params, params_from_iter, Row, ToSql};

use super::{DbError, DbLead, LedgerDb};
use crate::types::LeadStatus;

/// Filter for lead listing and counting. Every field intersects.
#[derive(Debug, Default)]
pub struct LeadFilter<'a> {
    pub statuses: &'a [LeadStatus],
    /// Owning-agent restriction from the resolved scope. `None` means
    /// unrestricted; an empty set matches nothing.
    pub agent_ids: Option<&'a HashSet<String>>,
    /// Case-insensitive substring over customer name, lead code, and
    /// loan account number.
    pub search: Option<&'a str>,
    pub bank: Option<&'a str>,
    /// Inclusive created-at range bounds (ISO-8601 strings).
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
}

/// Sort fields accepted by [`LedgerDb::list_leads`]. Anything else falls
/// back to `created_at`.
const SORTABLE_COLUMNS: &[&str] = &[
    "created_at",
    "loan_amount",
    "disbursed_amount",
    "customer_name",
];

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<DbLead> {
    Ok(DbLead {
        id: row.get(0)?,
        lead_code: row.get(1)?,
        customer_name: row.get(2)?,
        loan_account_no: row.get(3)?,
        bank_name: row.get(4)?,
        agent_id: row.get(5)?,
        status: row.get(6)?,
        loan_amount: row.get(7)?,
        disbursed_amount: row.get(8)?,
        commission_amount: row.get(9)?,
        commission_percentage: row.get(10)?,
        status_notes: row.get(11)?,
        status_updated_by: row.get(12)?,
        status_updated_at: row.get(13)?,
        created_by: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

const LEAD_COLUMNS: &str = "id, lead_code, customer_name, loan_account_no, bank_name, agent_id,
        status, loan_amount, disbursed_amount, commission_amount, commission_percentage,
        status_notes, status_updated_by, status_updated_at, created_by, created_at, updated_at";

/// Build the WHERE clause and parameter list for a filter.
fn build_where(filter: &LeadFilter<'_>) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut bind: Vec<Box<dyn ToSql>> = Vec::new();

    if !filter.statuses.is_empty() {
        let marks = vec!["?"; filter.statuses.len()].join(", ");
        clauses.push(format!("status IN ({marks})"));
        for status in filter.statuses {
            bind.push(Box::new(status.as_str().to_string()));
        }
    }

    if let Some(agent_ids) = filter.agent_ids {
        if agent_ids.is_empty() {
            // Restricted scope with no agents matches nothing.
            clauses.push("1 = 0".to_string());
        } else {
            let marks = vec!["?"; agent_ids.len()].join(", ");
            clauses.push(format!("agent_id IN ({marks})"));
            for id in agent_ids {
                bind.push(Box::new(id.clone()));
            }
        }
    }

    if let Some(search) = filter.search {
        let pattern = format!("%{}%", search);
        clauses.push(
            "(customer_name LIKE ? COLLATE NOCASE
              OR lead_code LIKE ? COLLATE NOCASE
              OR loan_account_no LIKE ? COLLATE NOCASE)"
                .to_string(),
        );
        bind.push(Box::new(pattern.clone()));
        bind.push(Box::new(pattern.clone()));
        bind.push(Box::new(pattern));
    }

    if let Some(bank) = filter.bank {
        clauses.push("bank_name = ?".to_string());
        bind.push(Box::new(bank.to_string()));
    }

    if let Some(start) = filter.start_date {
        clauses.push("created_at >= ?".to_string());
        bind.push(Box::new(start.to_string()));
    }
    if let Some(end) = filter.end_date {
        clauses.push("created_at <= ?".to_string());
        bind.push(Box::new(end.to_string()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (where_sql, bind)
}

impl LedgerDb {
    pub fn insert_lead(&self, lead: &DbLead) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO leads (id, lead_code, customer_name, loan_account_no, bank_name,
                agent_id, status, loan_amount, disbursed_amount, commission_amount,
                commission_percentage, status_notes, status_updated_by, status_updated_at,
                created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                lead.id,
                lead.lead_code,
                lead.customer_name,
                lead.loan_account_no,
                lead.bank_name,
                lead.agent_id,
                lead.status,
                lead.loan_amount,
                lead.disbursed_amount,
                lead.commission_amount,
                lead.commission_percentage,
                lead.status_notes,
                lead.status_updated_by,
                lead.status_updated_at,
                lead.created_by,
                lead.created_at,
                lead.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_lead(&self, id: &str) -> Result<Option<DbLead>, DbError> {
        let mut stmt = self
            .conn_ref()
            .prepare(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], lead_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Persist re-derived aggregates and status after a ledger mutation.
    pub fn update_lead_aggregates(
        &self,
        id: &str,
        disbursed_amount: f64,
        commission_amount: f64,
        status: LeadStatus,
        updated_at: &str,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE leads
             SET disbursed_amount = ?2, commission_amount = ?3, status = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                id,
                disbursed_amount,
                commission_amount,
                status.as_str(),
                updated_at
            ],
        )?;
        Ok(())
    }

    /// Explicit status update, recording who changed it and why.
    pub fn set_lead_status(
        &self,
        id: &str,
        status: LeadStatus,
        notes: Option<&str>,
        updated_by: &str,
        updated_at: &str,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE leads
             SET status = ?2, status_notes = ?3, status_updated_by = ?4,
                 status_updated_at = ?5, updated_at = ?5
             WHERE id = ?1",
            params![id, status.as_str(), notes, updated_by, updated_at],
        )?;
        Ok(())
    }

    /// Filtered, sorted, paginated lead listing.
    ///
    /// `limit = None` returns the full filtered set (used by the
    /// dashboard fold, which needs every in-scope lead).
    pub fn list_leads(
        &self,
        filter: &LeadFilter<'_>,
        sort_by: &str,
        sort_desc: bool,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Vec<DbLead>, DbError> {
        let (where_sql, bind) = build_where(filter);
        let sort_col = if SORTABLE_COLUMNS.contains(&sort_by) {
            sort_by
        } else {
            "created_at"
        };
        let direction = if sort_desc { "DESC" } else { "ASC" };
        let limit_sql = match (skip, limit) {
            (_, None) => String::new(),
            (None, Some(n)) => format!(" LIMIT {n}"),
            (Some(s), Some(n)) => format!(" LIMIT {n} OFFSET {s}"),
        };

        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM leads{where_sql}
             ORDER BY {sort_col} {direction}{limit_sql}"
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind.iter().map(|b| b.as_ref())), lead_from_row)?;

        let mut leads = Vec::new();
        for row in rows {
            leads.push(row?);
        }
        Ok(leads)
    }

    pub fn count_leads(&self, filter: &LeadFilter<'_>) -> Result<u64, DbError> {
        let (where_sql, bind) = build_where(filter);
        let sql = format!("SELECT COUNT(*) FROM leads{where_sql}");
        let count: i64 = self.conn_ref().query_row(
            &sql,
            params_from_iter(bind.iter().map(|b| b.as_ref())),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn insert_lead_note(&self, note: &super::DbLeadNote) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO lead_notes (id, lead_id, content, note_type, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                note.id,
                note.lead_id,
                note.content,
                note.note_type,
                note.created_by,
                note.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn count_lead_notes(&self, lead_id: &str) -> Result<u64, DbError> {
        let count: i64 = self.conn_ref().query_row(
            "SELECT COUNT(*) FROM lead_notes WHERE lead_id = ?1",
            params![lead_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{lead_row, seeded_db};

    #[test]
    fn test_insert_and_get_round_trip() {
        let db = LedgerDb::open_in_memory().expect("open");
        let lead = lead_row("l1", "a1", 100_000.0);
        db.insert_lead(&lead).expect("insert");

        let got = db.get_lead("l1").expect("get").expect("present");
        assert_eq!(got.customer_name, lead.customer_name);
        assert_eq!(got.loan_amount, 100_000.0);
        assert_eq!(got.status, "sanctioned");

        assert!(db.get_lead("missing").expect("get").is_none());
    }

    #[test]
    fn test_list_filters_by_status_and_agent() {
        let db = seeded_db();
        let allowed = crate::types::ACCOUNTANT_ALLOWED_STATUSES;

        let mut agents = std::collections::HashSet::new();
        agents.insert("agent-f".to_string());

        let filter = LeadFilter {
            statuses: &allowed,
            agent_ids: Some(&agents),
            ..Default::default()
        };
        let leads = db
            .list_leads(&filter, "created_at", true, None, None)
            .expect("list");
        assert!(!leads.is_empty());
        assert!(leads.iter().all(|l| l.agent_id == "agent-f"));

        let empty: std::collections::HashSet<String> = Default::default();
        let filter = LeadFilter {
            statuses: &allowed,
            agent_ids: Some(&empty),
            ..Default::default()
        };
        assert!(db
            .list_leads(&filter, "created_at", true, None, None)
            .expect("list")
            .is_empty());
    }

    #[test]
    fn test_search_matches_customer_and_code() {
        let db = seeded_db();
        let filter = LeadFilter {
            search: Some("ravi"),
            ..Default::default()
        };
        let leads = db
            .list_leads(&filter, "created_at", true, None, None)
            .expect("list");
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].customer_name, "Ravi Kumar");

        let filter = LeadFilter {
            search: Some("LL-00"),
            ..Default::default()
        };
        let by_code = db
            .list_leads(&filter, "created_at", true, None, None)
            .expect("list");
        assert!(by_code.len() >= 2);
    }

    #[test]
    fn test_pagination_and_count_agree() {
        let db = seeded_db();
        let filter = LeadFilter::default();
        let total = db.count_leads(&filter).expect("count");
        let page1 = db
            .list_leads(&filter, "created_at", true, Some(0), Some(2))
            .expect("list");
        assert_eq!(page1.len() as u64, total.min(2));
    }
}
