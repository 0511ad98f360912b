//! Versioned schema migrations.
//!
//! SQL files under `src/migrations/` are embedded at compile time and
//! applied in order, at most once each; the `schema_version` table
//! records what has run. An on-disk database gets a hot snapshot before
//! any pending migration touches it.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

fn sql_err(context: &str) -> impl Fn(rusqlite::Error) -> String + '_ {
    move |e| format!("{context}: {e}")
}

/// Highest applied version, creating the tracking table on first use.
fn applied_version(conn: &Connection) -> Result<i32, String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(sql_err("schema_version setup failed"))?;

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(sql_err("schema_version read failed"))
}

/// Hot-copy an on-disk database to `<path>.pre-migration.bak` via the
/// online backup API. In-memory databases are skipped.
fn snapshot_db(conn: &Connection) -> Result<(), String> {
    let db_path: String = conn
        .query_row("PRAGMA database_list", [], |row| row.get(2))
        .map_err(sql_err("database path lookup failed"))?;
    if db_path.is_empty() || db_path == ":memory:" {
        return Ok(());
    }

    let mut target = Connection::open(format!("{db_path}.pre-migration.bak"))
        .map_err(sql_err("backup target open failed"))?;
    rusqlite::backup::Backup::new(conn, &mut target)
        .map_err(sql_err("backup init failed"))?
        .run_to_completion(64, std::time::Duration::from_millis(5), None)
        .map_err(sql_err("backup failed"))?;
    Ok(())
}

/// Apply all pending migrations in version order.
///
/// Each one runs in its own transaction together with its version-table
/// insert; a failure rolls that migration back and stops the sequence.
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    let applied = applied_version(conn)?;
    if MIGRATIONS.iter().all(|m| m.version <= applied) {
        return Ok(());
    }

    snapshot_db(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        conn.execute_batch("BEGIN")
            .map_err(sql_err("migration begin failed"))?;

        let outcome = conn.execute_batch(migration.sql).and_then(|_| {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [migration.version],
            )
            .map(|_| ())
        });

        if let Err(e) = outcome {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(format!("migration v{} failed: {e}", migration.version));
        }
        conn.execute_batch("COMMIT")
            .map_err(sql_err("migration commit failed"))?;
        log::info!("Applied schema migration v{}", migration.version);
    }

    Ok(())
}
