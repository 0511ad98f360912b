//! Disbursement entry rows. Entries are owned by their lead and ordered
//! by `seq` (insertion order), never mutated outside the lead's
//! mutation API.

use std::collections::HashSet;

use rusqlite::{params, params_from_iter, Row, ToSql};

use super::{DbCommissionRow, DbDisbursement, DbError, LedgerDb};
use crate::types::LeadStatus;

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<DbDisbursement> {
    Ok(DbDisbursement {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        seq: row.get(2)?,
        amount: row.get(3)?,
        date: row.get(4)?,
        utr: row.get(5)?,
        bank_ref: row.get(6)?,
        commission: row.get(7)?,
        gst: row.get(8)?,
        net_commission: row.get(9)?,
        notes: row.get(10)?,
        created_by: row.get(11)?,
        updated_by: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

const ENTRY_COLUMNS: &str = "id, lead_id, seq, amount, date, utr, bank_ref, commission, gst,
        net_commission, notes, created_by, updated_by, created_at, updated_at";

/// Filter for flattened commission-report rows.
#[derive(Debug, Default)]
pub struct CommissionFilter<'a> {
    pub statuses: &'a [LeadStatus],
    pub agent_ids: Option<&'a HashSet<String>>,
    /// Inclusive entry-date range bounds.
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
    pub bank: Option<&'a str>,
    pub agent_name: Option<&'a str>,
}

impl LedgerDb {
    pub fn insert_disbursement(&self, entry: &DbDisbursement) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO disbursements (id, lead_id, seq, amount, date, utr, bank_ref,
                commission, gst, net_commission, notes, created_by, updated_by,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                entry.id,
                entry.lead_id,
                entry.seq,
                entry.amount,
                entry.date,
                entry.utr,
                entry.bank_ref,
                entry.commission,
                entry.gst,
                entry.net_commission,
                entry.notes,
                entry.created_by,
                entry.updated_by,
                entry.created_at,
                entry.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Overwrite an entry in place. Identity (`id`, `lead_id`, `seq`,
    /// `created_by`, `created_at`) is preserved by the caller.
    pub fn update_disbursement(&self, entry: &DbDisbursement) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE disbursements
             SET amount = ?3, date = ?4, utr = ?5, bank_ref = ?6, commission = ?7,
                 gst = ?8, net_commission = ?9, notes = ?10, updated_by = ?11,
                 updated_at = ?12
             WHERE id = ?1 AND lead_id = ?2",
            params![
                entry.id,
                entry.lead_id,
                entry.amount,
                entry.date,
                entry.utr,
                entry.bank_ref,
                entry.commission,
                entry.gst,
                entry.net_commission,
                entry.notes,
                entry.updated_by,
                entry.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn delete_disbursement(&self, lead_id: &str, entry_id: &str) -> Result<(), DbError> {
        self.conn_ref().execute(
            "DELETE FROM disbursements WHERE id = ?1 AND lead_id = ?2",
            params![entry_id, lead_id],
        )?;
        Ok(())
    }

    pub fn get_disbursement(
        &self,
        lead_id: &str,
        entry_id: &str,
    ) -> Result<Option<DbDisbursement>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM disbursements WHERE id = ?1 AND lead_id = ?2"
        ))?;
        let mut rows = stmt.query_map(params![entry_id, lead_id], entry_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// A lead's full history in insertion order.
    pub fn list_disbursements(&self, lead_id: &str) -> Result<Vec<DbDisbursement>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM disbursements WHERE lead_id = ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![lead_id], entry_from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Next insertion-order position for a lead's history.
    pub fn next_disbursement_seq(&self, lead_id: &str) -> Result<i64, DbError> {
        let max: i64 = self.conn_ref().query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM disbursements WHERE lead_id = ?1",
            params![lead_id],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    /// Full resum of a lead's ledger: `(total_amount, total_commission)`.
    ///
    /// Aggregates are always re-derived from this fold rather than
    /// patched incrementally, so prior drift cannot survive a mutation.
    pub fn sum_disbursements(&self, lead_id: &str) -> Result<(f64, f64), DbError> {
        self.conn_ref()
            .query_row(
                "SELECT COALESCE(SUM(amount), 0), COALESCE(SUM(commission), 0)
                 FROM disbursements WHERE lead_id = ?1",
                params![lead_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(DbError::Sqlite)
    }

    /// Flattened commission rows (one per entry) across in-scope leads,
    /// newest entry date first. Unpaginated: the caller pages in memory
    /// so report totals and the listed page come from the same set.
    pub fn commission_entries(
        &self,
        filter: &CommissionFilter<'_>,
    ) -> Result<Vec<DbCommissionRow>, DbError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut bind: Vec<Box<dyn ToSql>> = Vec::new();

        if !filter.statuses.is_empty() {
            let marks = vec!["?"; filter.statuses.len()].join(", ");
            clauses.push(format!("l.status IN ({marks})"));
            for status in filter.statuses {
                bind.push(Box::new(status.as_str().to_string()));
            }
        }
        if let Some(agent_ids) = filter.agent_ids {
            if agent_ids.is_empty() {
                clauses.push("1 = 0".to_string());
            } else {
                let marks = vec!["?"; agent_ids.len()].join(", ");
                clauses.push(format!("l.agent_id IN ({marks})"));
                for id in agent_ids {
                    bind.push(Box::new(id.clone()));
                }
            }
        }
        if let Some(start) = filter.start_date {
            clauses.push("d.date >= ?".to_string());
            bind.push(Box::new(start.to_string()));
        }
        if let Some(end) = filter.end_date {
            clauses.push("d.date <= ?".to_string());
            bind.push(Box::new(end.to_string()));
        }
        if let Some(bank) = filter.bank {
            clauses.push("l.bank_name = ?".to_string());
            bind.push(Box::new(bank.to_string()));
        }
        if let Some(agent_name) = filter.agent_name {
            clauses.push("u.name = ?".to_string());
            bind.push(Box::new(agent_name.to_string()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT d.id, d.lead_id, l.lead_code, l.customer_name, l.bank_name,
                    l.agent_id, u.name, d.amount, d.date, d.utr, d.commission,
                    d.gst, d.net_commission
             FROM disbursements d
             JOIN leads l ON l.id = d.lead_id
             LEFT JOIN users u ON u.id = l.agent_id{where_sql}
             ORDER BY d.date DESC, d.seq DESC"
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(bind.iter().map(|b| b.as_ref())),
            |row| {
                Ok(DbCommissionRow {
                    entry_id: row.get(0)?,
                    lead_id: row.get(1)?,
                    lead_code: row.get(2)?,
                    customer_name: row.get(3)?,
                    bank_name: row.get(4)?,
                    agent_id: row.get(5)?,
                    agent_name: row.get(6)?,
                    amount: row.get(7)?,
                    date: row.get(8)?,
                    utr: row.get(9)?,
                    commission: row.get(10)?,
                    gst: row.get(11)?,
                    net_commission: row.get(12)?,
                })
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Global disbursement stats for the dashboard:
    /// `(entry_count, total_amount, this_month_amount)`.
    pub fn disbursement_stats(
        &self,
        agent_ids: Option<&HashSet<String>>,
        statuses: &[LeadStatus],
        month_start: &str,
        next_month_start: &str,
    ) -> Result<(u64, f64, f64), DbError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut bind: Vec<Box<dyn ToSql>> = Vec::new();

        if !statuses.is_empty() {
            let marks = vec!["?"; statuses.len()].join(", ");
            clauses.push(format!("l.status IN ({marks})"));
            for status in statuses {
                bind.push(Box::new(status.as_str().to_string()));
            }
        }
        if let Some(agent_ids) = agent_ids {
            if agent_ids.is_empty() {
                return Ok((0, 0.0, 0.0));
            }
            let marks = vec!["?"; agent_ids.len()].join(", ");
            clauses.push(format!("l.agent_id IN ({marks})"));
            for id in agent_ids {
                bind.push(Box::new(id.clone()));
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        bind.push(Box::new(month_start.to_string()));
        bind.push(Box::new(next_month_start.to_string()));

        let sql = format!(
            "SELECT COUNT(*), COALESCE(SUM(d.amount), 0),
                    COALESCE(SUM(CASE WHEN d.date >= ? AND d.date < ? THEN d.amount ELSE 0 END), 0)
             FROM disbursements d
             JOIN leads l ON l.id = d.lead_id{where_sql}"
        );
        // Placeholders bind left to right across the whole statement, so
        // the SELECT's month bounds go before the WHERE params.
        let mut ordered: Vec<&dyn ToSql> = Vec::with_capacity(bind.len());
        let bounds_start = bind.len() - 2;
        ordered.push(bind[bounds_start].as_ref());
        ordered.push(bind[bounds_start + 1].as_ref());
        for b in &bind[..bounds_start] {
            ordered.push(b.as_ref());
        }

        let (count, total, this_month): (i64, f64, f64) = self.conn_ref().query_row(
            &sql,
            params_from_iter(ordered),
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok((count as u64, total, this_month))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{entry_row, lead_row, seeded_db};
    use crate::types::ACCOUNTANT_ALLOWED_STATUSES;

    #[test]
    fn test_entry_round_trip_and_order() {
        let db = super::LedgerDb::open_in_memory().expect("open");
        db.insert_lead(&lead_row("l1", "a1", 100_000.0)).expect("lead");

        for (i, amount) in [10_000.0, 20_000.0].iter().enumerate() {
            let mut entry = entry_row("e", "l1", *amount, "2026-03-10");
            entry.id = format!("e{}", i + 1);
            entry.seq = (i + 1) as i64;
            db.insert_disbursement(&entry).expect("insert");
        }

        let entries = db.list_disbursements("l1").expect("list");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "e1");
        assert_eq!(entries[1].id, "e2");
        assert_eq!(db.next_disbursement_seq("l1").expect("seq"), 3);

        let (amount, commission) = db.sum_disbursements("l1").expect("sum");
        assert_eq!(amount, 30_000.0);
        assert_eq!(commission, 0.0);
    }

    #[test]
    fn test_commission_entries_date_filter() {
        let db = seeded_db();
        let filter = CommissionFilter {
            statuses: &ACCOUNTANT_ALLOWED_STATUSES,
            start_date: Some("2026-02-01"),
            end_date: Some("2026-02-28"),
            ..Default::default()
        };
        let rows = db.commission_entries(&filter).expect("entries");
        assert!(!rows.is_empty());
        assert!(rows
            .iter()
            .all(|r| r.date.as_str() >= "2026-02-01" && r.date.as_str() <= "2026-02-28"));
    }

    #[test]
    fn test_commission_entries_empty_scope() {
        let db = seeded_db();
        let empty: std::collections::HashSet<String> = Default::default();
        let filter = CommissionFilter {
            statuses: &ACCOUNTANT_ALLOWED_STATUSES,
            agent_ids: Some(&empty),
            ..Default::default()
        };
        assert!(db.commission_entries(&filter).expect("entries").is_empty());
    }
}
