//! Schema migration runner.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::{AppError, AppResult};

/// Embedded migration files.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema",
    include_str!("migrations/001_initial_schema.sql"),
)];

/// Run all pending migrations.
///
/// Migrations are run in order and tracked in the `schema_migrations` table.
pub fn run_migrations(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
             version INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             applied_at TEXT NOT NULL
         )",
    )
    .map_err(|e| AppError::Database(format!("Failed to create schema_migrations: {}", e)))?;

    let current_version = current_version(conn)?;
    let pending: Vec<(i64, &str, &str)> = MIGRATIONS
        .iter()
        .enumerate()
        .map(|(i, (name, sql))| (i as i64 + 1, *name, *sql))
        .filter(|(version, _, _)| *version > current_version)
        .collect();

    if pending.is_empty() {
        info!("No pending migrations");
        return Ok(());
    }

    for (version, name, sql) in pending {
        info!("Applying migration {}: {}", version, name);
        conn.execute_batch(sql)
            .map_err(|e| AppError::Database(format!("Migration {} failed: {}", name, e)))?;
        conn.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![version, name, Utc::now().to_rfc3339()],
        )?;
    }

    Ok(())
}

/// Highest applied migration, 0 when none.
pub fn current_version(conn: &Connection) -> AppResult<i64> {
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}
