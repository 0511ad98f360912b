//! Organizational hierarchy queries: users, franchises, relationship
//! managers, and accountant profiles. These feed the scope resolver.

use rusqlite::{params, params_from_iter, ToSql};

use super::{DbError, DbFranchise, DbRelationshipManager, DbUser, LedgerDb};

/// Build `IN (…)` placeholders for an id slice.
fn marks(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl LedgerDb {
    // -----------------------------------------------------------------
    // Writes (seeding and admin CRUD live outside the core; these exist
    // for that surrounding code and for test fixtures)
    // -----------------------------------------------------------------

    pub fn insert_user(&self, user: &DbUser) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO users (id, name, email, role, managed_by_kind, managed_by,
                franchise_owned, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.name,
                user.email,
                user.role,
                user.managed_by_kind,
                user.managed_by,
                user.franchise_owned,
                user.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn insert_franchise(&self, franchise: &DbFranchise) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO franchises (id, name, regional_manager, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                franchise.id,
                franchise.name,
                franchise.regional_manager,
                franchise.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn insert_relationship_manager(
        &self,
        rm: &DbRelationshipManager,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO relationship_managers (id, name, regional_manager, owner_user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![rm.id, rm.name, rm.regional_manager, rm.owner_user_id, rm.created_at],
        )?;
        Ok(())
    }

    pub fn insert_accountant(&self, user_id: &str, name: &str, created_at: &str) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO accountants (user_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, name, created_at],
        )?;
        Ok(())
    }

    pub fn assign_regional_manager(
        &self,
        accountant_user_id: &str,
        regional_manager_id: &str,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT OR IGNORE INTO accountant_regional_managers
                (accountant_user_id, regional_manager_id)
             VALUES (?1, ?2)",
            params![accountant_user_id, regional_manager_id],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Scope-walk reads
    // -----------------------------------------------------------------

    /// Regional managers assigned to an accountant. Missing profile or
    /// no assignments both come back as an empty vec; the resolver
    /// treats either as zero scope.
    pub fn accountant_assigned_rm_ids(&self, user_id: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT arm.regional_manager_id
             FROM accountant_regional_managers arm
             JOIN accountants a ON a.user_id = arm.accountant_user_id
             WHERE arm.accountant_user_id = ?1 AND a.status = 'active'",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Franchise record ids whose `regional_manager` is in `rm_ids`.
    pub fn franchise_ids_under(&self, rm_ids: &[String]) -> Result<Vec<String>, DbError> {
        if rm_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id FROM franchises WHERE regional_manager IN ({})",
            marks(rm_ids.len())
        );
        self.collect_ids(&sql, rm_ids)
    }

    /// Relationship-manager records under `rm_ids`, as
    /// `(record_id, owner_user_id)` pairs.
    pub fn relationship_managers_under(
        &self,
        rm_ids: &[String],
    ) -> Result<Vec<(String, Option<String>)>, DbError> {
        if rm_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, owner_user_id FROM relationship_managers
             WHERE regional_manager IN ({})",
            marks(rm_ids.len())
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(rm_ids.iter().map(|s| s as &dyn ToSql)),
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }

    /// Agent-role users managed by any of the given franchises or
    /// relationship-manager records. Union of both link kinds: an agent
    /// hangs either off a franchise or directly off an RM record.
    pub fn agent_ids_managed_by(
        &self,
        franchise_ids: &[String],
        rm_record_ids: &[String],
    ) -> Result<Vec<String>, DbError> {
        if franchise_ids.is_empty() && rm_record_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut branches: Vec<String> = Vec::new();
        let mut bind: Vec<&dyn ToSql> = Vec::new();
        if !franchise_ids.is_empty() {
            branches.push(format!(
                "(managed_by_kind = 'franchise' AND managed_by IN ({}))",
                marks(franchise_ids.len())
            ));
            for id in franchise_ids {
                bind.push(id);
            }
        }
        if !rm_record_ids.is_empty() {
            branches.push(format!(
                "(managed_by_kind = 'relationship_manager' AND managed_by IN ({}))",
                marks(rm_record_ids.len())
            ));
            for id in rm_record_ids {
                bind.push(id);
            }
        }

        let sql = format!(
            "SELECT id FROM users WHERE role = 'agent' AND ({})",
            branches.join(" OR ")
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind), |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Franchise-role users whose owned franchise is in `franchise_ids`.
    pub fn franchise_owner_user_ids(
        &self,
        franchise_ids: &[String],
    ) -> Result<Vec<String>, DbError> {
        if franchise_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id FROM users WHERE role = 'franchise' AND franchise_owned IN ({})",
            marks(franchise_ids.len())
        );
        self.collect_ids(&sql, franchise_ids)
    }

    /// The franchise a franchise-role user owns, if any.
    pub fn franchise_owned_by_user(&self, user_id: &str) -> Result<Option<String>, DbError> {
        let mut stmt = self
            .conn_ref()
            .prepare("SELECT franchise_owned FROM users WHERE id = ?1 AND role = 'franchise'")?;
        let mut rows = stmt.query_map(params![user_id], |row| row.get::<_, Option<String>>(0))?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Ok(None),
        }
    }

    /// Relationship-manager records owned by a user.
    pub fn rm_record_ids_owned_by(&self, user_id: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn_ref()
            .prepare("SELECT id FROM relationship_managers WHERE owner_user_id = ?1")?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn collect_ids(&self, sql: &str, bind: &[String]) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn_ref().prepare(sql)?;
        let rows = stmt.query_map(
            params_from_iter(bind.iter().map(|s| s as &dyn ToSql)),
            |row| row.get::<_, String>(0),
        )?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}
