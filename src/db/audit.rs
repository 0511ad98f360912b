//! Append-only audit log. Every ledger mutation and explicit status
//! update records actor, entity, and before/after snapshots.

use rusqlite::{params, params_from_iter, ToSql};

use super::{DbAuditEntry, DbError, LedgerDb};

/// Filter for audit-trail reads.
#[derive(Debug, Default)]
pub struct AuditFilter<'a> {
    pub action: Option<&'a str>,
    pub entity_type: Option<&'a str>,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
}

impl LedgerDb {
    pub fn insert_audit_entry(&self, entry: &DbAuditEntry) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO audit_log (id, actor_id, action, entity_type, entity_id,
                before_json, after_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                entry.actor_id,
                entry.action,
                entry.entity_type,
                entry.entity_id,
                entry.before_json,
                entry.after_json,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    /// Newest-first audit entries, optionally filtered.
    pub fn list_audit_entries(
        &self,
        filter: &AuditFilter<'_>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<DbAuditEntry>, DbError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut bind: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(action) = filter.action {
            clauses.push("action = ?".to_string());
            bind.push(Box::new(action.to_string()));
        }
        if let Some(entity_type) = filter.entity_type {
            clauses.push("entity_type = ?".to_string());
            bind.push(Box::new(entity_type.to_string()));
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

        let sql = format!(
            "SELECT id, actor_id, action, entity_type, entity_id, before_json,
                    after_json, created_at
             FROM audit_log{where_sql}
             ORDER BY created_at DESC
             LIMIT {limit} OFFSET {skip}"
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(bind.iter().map(|b| b.as_ref())),
            |row| {
                Ok(DbAuditEntry {
                    id: row.get(0)?,
                    actor_id: row.get(1)?,
                    action: row.get(2)?,
                    entity_type: row.get(3)?,
                    entity_id: row.get(4)?,
                    before_json: row.get(5)?,
                    after_json: row.get(6)?,
                    created_at: row.get(7)?,
                })
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn count_audit_entries(&self, entity_id: &str) -> Result<u64, DbError> {
        let count: i64 = self.conn_ref().query_row(
            "SELECT COUNT(*) FROM audit_log WHERE entity_id = ?1",
            params![entity_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
