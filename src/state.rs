//! Shared application state: the database handle and the per-lead
//! mutation lock registry.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::db::{DbError, LedgerDb};
use crate::error::CoreError;

/// Process-wide state handed to every service call.
pub struct AppState {
    db: Mutex<Option<LedgerDb>>,
    /// One mutex per lead id. Ledger mutations on the same lead
    /// serialize here; reads never take a lead lock.
    lead_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AppState {
    /// Open the default database. DB features degrade to errors per
    /// request if opening fails, rather than aborting the process.
    pub fn new() -> Self {
        let db = match LedgerDb::open() {
            Ok(db) => Some(db),
            Err(e) => {
                log::warn!("Failed to open ledger database: {e}. DB features disabled.");
                None
            }
        };
        AppState {
            db: Mutex::new(db),
            lead_locks: DashMap::new(),
        }
    }

    /// State backed by a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        let db = LedgerDb::open_at(path)?;
        Ok(AppState {
            db: Mutex::new(Some(db)),
            lead_locks: DashMap::new(),
        })
    }

    /// Run a closure against the database, holding the DB lock for its
    /// duration.
    pub fn with_db<T>(
        &self,
        f: impl FnOnce(&LedgerDb) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let guard = self.db.lock();
        let db = guard.as_ref().ok_or(CoreError::Db(DbError::NotOpen))?;
        f(db)
    }

    /// The mutation lock for a lead, created on first use.
    pub fn lead_lock(&self, lead_id: &str) -> Arc<Mutex<()>> {
        self.lead_locks
            .entry(lead_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
