//! Database migrations for conference storage
//!
//! Versioned migrations for the conference schema. Each migration is applied
//! atomically and tracked in the schema_version table.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current storage schema version
pub const CURRENT_STORAGE_SCHEMA_VERSION: i32 = 1;

/// Migration descriptor
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
    pub down_sql: Option<&'static str>,
}

/// All available migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial conference schema",
        up_sql: r#"
            -- Schema version tracking for conference storage
            CREATE TABLE IF NOT EXISTS conference_schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );

            -- Conference documents
            CREATE TABLE IF NOT EXISTS conferences (
                id TEXT PRIMARY KEY,                    -- ConferenceId (room name)
                active INTEGER NOT NULL DEFAULT 1,
                created_from TEXT NOT NULL,             -- provenance tag, write-once
                schema_version INTEGER NOT NULL,        -- document schema, write-once
                revision INTEGER NOT NULL DEFAULT 0,    -- optimistic-concurrency token
                created_at INTEGER NOT NULL,
                updated_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_conferences_active ON conferences(active);

            -- Members (join order via seq; member_id doubles as access token)
            CREATE TABLE IF NOT EXISTS conference_members (
                conference_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                member_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                object_type TEXT NOT NULL CHECK(object_type IN ('anonymous')),
                status TEXT CHECK(status IS NULL OR status IN ('online')),
                user_agent TEXT,
                joined_at INTEGER NOT NULL,
                PRIMARY KEY (conference_id, seq),
                UNIQUE (conference_id, member_id),
                FOREIGN KEY (conference_id) REFERENCES conferences(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_conference_members_token ON conference_members(member_id);

            -- Append-only lifecycle events
            CREATE TABLE IF NOT EXISTS conference_history (
                conference_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                event TEXT NOT NULL,
                occurred_at INTEGER NOT NULL,
                PRIMARY KEY (conference_id, seq),
                FOREIGN KEY (conference_id) REFERENCES conferences(id) ON DELETE CASCADE
            );
        "#,
        down_sql: Some(
            r#"
            DROP TABLE IF EXISTS conference_history;

            DROP INDEX IF EXISTS idx_conference_members_token;
            DROP TABLE IF EXISTS conference_members;

            DROP INDEX IF EXISTS idx_conferences_active;
            DROP TABLE IF EXISTS conferences;

            DROP TABLE IF EXISTS conference_schema_version;
        "#,
        ),
    }]
}

/// Get current schema version from database
fn get_current_version(pool: &Pool<SqliteConnectionManager>) -> Result<i32, rusqlite::Error> {
    let conn = pool.get().map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to get connection: {}", e),
        )))
    })?;

    // Ensure schema_version table exists
    conn.execute(
        "CREATE TABLE IF NOT EXISTS conference_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Result<i32, _> = conn.query_row(
        "SELECT version FROM conference_schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    );

    Ok(version.unwrap_or(0))
}

/// Run all pending migrations
pub fn migrate(pool: &Pool<SqliteConnectionManager>) -> Result<(), rusqlite::Error> {
    let current_version = get_current_version(pool)?;
    let migrations = get_migrations();

    let pending: Vec<_> = migrations
        .into_iter()
        .filter(|m| m.version > current_version)
        .collect();

    if pending.is_empty() {
        return Ok(());
    }

    let conn = pool.get().map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to get connection: {}", e),
        )))
    })?;

    for migration in pending {
        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(migration.up_sql)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as i64;

        // OR IGNORE: two pools opening the same database can both see
        // version 0 and race the same migration; the batch is idempotent.
        tx.execute(
            "INSERT OR IGNORE INTO conference_schema_version (version, applied_at) VALUES (?, ?)",
            params![migration.version, now],
        )?;

        tx.commit()?;

        tracing::info!(
            version = migration.version,
            description = migration.description,
            "applied storage migration"
        );
    }

    Ok(())
}
