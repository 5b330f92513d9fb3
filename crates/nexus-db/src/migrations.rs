//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run sequentially
//! on startup, tracked by the `_nexus_migrations` table. Each migration
//! runs exactly once — if it has already been applied, it is skipped.

use rusqlite::Connection;
use thiserror::Error;

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_agents",
        sql: include_str!("migrations/001_agents.sql"),
    },
    Migration {
        name: "002_phone_numbers",
        sql: include_str!("migrations/002_phone_numbers.sql"),
    },
    Migration {
        name: "003_voices_accounts",
        sql: include_str!("migrations/003_voices_accounts.sql"),
    },
];

/// Errors that can occur while running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration statement failed.
    #[error("migration '{name}' failed: {source}")]
    Failed {
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The migration tracking table could not be created or queried.
    #[error("migration bookkeeping failed: {0}")]
    Bookkeeping(#[from] rusqlite::Error),
}

/// Runs all pending migrations on the given connection.
///
/// Safe to call on every startup; applied migrations are skipped.
///
/// # Errors
///
/// Returns [`MigrationError`] if a migration statement fails or the
/// tracking table cannot be maintained.
pub fn run_migrations(conn: &Connection) -> Result<(), MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _nexus_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for migration in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM _nexus_migrations WHERE name = ?1)",
            [migration.name],
            |row| row.get(0),
        )?;

        if applied {
            continue;
        }

        tracing::debug!(migration = migration.name, "applying migration");

        conn.execute_batch(migration.sql)
            .map_err(|source| MigrationError::Failed {
                name: migration.name,
                source,
            })?;

        conn.execute(
            "INSERT INTO _nexus_migrations (name) VALUES (?1)",
            [migration.name],
        )?;
    }

    Ok(())
}
