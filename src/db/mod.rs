//! SQLite-backed persistence for leads, the disbursement ledger, and the
//! organizational hierarchy.
//!
//! The database lives at `~/.leadledger/leadledger.db`. Every ledger
//! mutation runs inside a single transaction via [`LedgerDb::with_transaction`]
//! so a failed validation never leaves partial state behind.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod audit;
pub mod disbursements;
pub mod leads;
pub mod org;
pub mod types;

pub use audit::AuditFilter;
pub use disbursements::CommissionFilter;
pub use leads::LeadFilter;
pub use types::*;

/// Connection wrapper for the lead/ledger store.
///
/// Intentionally not `Clone` or `Sync`; it is held behind a mutex in
/// `AppState` so callers serialize access.
pub struct LedgerDb {
    conn: Connection,
}

impl LedgerDb {
    /// Direct access to the connection for one-off queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at the default path and apply
    /// pending schema migrations.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path, creating parent directories
    /// as needed. Tests point this at a tempdir.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL keeps concurrent readers off the writers' backs
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Open an in-memory database with the schema applied. Test helper.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.leadledger/leadledger.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".leadledger").join("leadledger.db"))
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    /// `BEGIN IMMEDIATE` takes the write lock up front so the mutation
    /// cannot deadlock against a later writer.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::Sqlite(e)))?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| E::from(DbError::Sqlite(e)))?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}
