//! Schema DDL and idempotent startup migration. Everything here can run
//! against a database of any prior vintage: tables are `CREATE IF NOT
//! EXISTS` and later columns are added only when missing.

use anyhow::{Context, Result};
use rusqlite::Connection;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS briefs (
        id                   INTEGER PRIMARY KEY AUTOINCREMENT,
        venue_name           TEXT NOT NULL,
        venue_type           TEXT NOT NULL DEFAULT '',
        location             TEXT NOT NULL DEFAULT '',
        contact_name         TEXT NOT NULL DEFAULT '',
        contact_email        TEXT NOT NULL DEFAULT '',
        contact_phone        TEXT NOT NULL DEFAULT '',
        product              TEXT NOT NULL DEFAULT 'syb',
        liked_playlist_ids   TEXT NOT NULL DEFAULT '[]',
        conversation_summary TEXT NOT NULL DEFAULT '',
        raw_data             TEXT NOT NULL DEFAULT '{}',
        schedule_data        TEXT,
        status               TEXT NOT NULL DEFAULT 'submitted',
        syb_account_id       TEXT,
        syb_schedule_id      TEXT,
        automation_tier      TEXT,
        created_at           TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS venues (
        id                   INTEGER PRIMARY KEY AUTOINCREMENT,
        venue_name           TEXT NOT NULL UNIQUE,
        location             TEXT NOT NULL DEFAULT '',
        venue_type           TEXT NOT NULL DEFAULT '',
        syb_account_id       TEXT,
        latest_brief_id      INTEGER REFERENCES briefs(id),
        auto_schedule        INTEGER NOT NULL DEFAULT 0,
        approved_brief_count INTEGER NOT NULL DEFAULT 0,
        timezone             TEXT NOT NULL DEFAULT 'Asia/Bangkok',
        created_at           TEXT NOT NULL,
        updated_at           TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS zone_mappings (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        venue_name      TEXT NOT NULL,
        brief_zone_name TEXT NOT NULL,
        syb_zone_id     TEXT NOT NULL,
        syb_zone_name   TEXT NOT NULL DEFAULT '',
        syb_account_id  TEXT,
        UNIQUE (venue_name, brief_zone_name)
    )",
    "CREATE TABLE IF NOT EXISTS schedule_entries (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        brief_id         INTEGER NOT NULL REFERENCES briefs(id),
        zone_id          TEXT NOT NULL,
        zone_name        TEXT NOT NULL DEFAULT '',
        playlist_syb_id  TEXT NOT NULL,
        playlist_name    TEXT NOT NULL DEFAULT '',
        start_time       TEXT NOT NULL,
        end_time         TEXT NOT NULL DEFAULT '',
        days             TEXT NOT NULL DEFAULT 'daily',
        timezone         TEXT NOT NULL DEFAULT 'Asia/Bangkok',
        status           TEXT NOT NULL DEFAULT 'active',
        last_assigned_at TEXT,
        retry_count      INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS approval_tokens (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        brief_id   INTEGER NOT NULL REFERENCES briefs(id),
        token      TEXT NOT NULL UNIQUE,
        expires_at TEXT NOT NULL,
        used_at    TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS follow_ups (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        brief_id      INTEGER NOT NULL REFERENCES briefs(id),
        type          TEXT NOT NULL,
        scheduled_for TEXT NOT NULL,
        sent_at       TEXT,
        opened_at     TEXT,
        tracking_id   TEXT NOT NULL UNIQUE
    )",
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_venues_name ON venues (venue_name)",
    "CREATE INDEX IF NOT EXISTS idx_briefs_venue ON briefs (venue_name)",
    "CREATE INDEX IF NOT EXISTS idx_briefs_email ON briefs (contact_email)",
    "CREATE INDEX IF NOT EXISTS idx_entries_active
        ON schedule_entries (status, start_time) WHERE status = 'active'",
    "CREATE INDEX IF NOT EXISTS idx_tokens_token ON approval_tokens (token)",
    "CREATE INDEX IF NOT EXISTS idx_follow_ups_due
        ON follow_ups (scheduled_for) WHERE sent_at IS NULL",
];

/// Columns added after the initial schema shipped. SQLite has no
/// `ADD COLUMN IF NOT EXISTS`, so presence is checked via `pragma`.
const LATER_COLUMNS: &[(&str, &str, &str)] = &[
    ("briefs", "automation_tier", "TEXT"),
    ("follow_ups", "opened_at", "TEXT"),
    ("venues", "timezone", "TEXT NOT NULL DEFAULT 'Asia/Bangkok'"),
];

pub fn migrate(conn: &Connection) -> Result<()> {
    for ddl in TABLES {
        conn.execute(ddl, []).context("creating table")?;
    }
    for ddl in INDEXES {
        conn.execute(ddl, []).context("creating index")?;
    }
    for (table, column, ddl) in LATER_COLUMNS {
        add_column_if_missing(conn, table, column, ddl)?;
    }
    Ok(())
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, ddl: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .any(|name| name == column);
    if !exists {
        tracing::info!(table, column, "adding missing column");
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}"), [])
            .with_context(|| format!("adding {table}.{column}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }

    #[test]
    fn later_columns_backfill_onto_old_schema() {
        let conn = Connection::open_in_memory().unwrap();
        // Simulate a pre-open-tracking follow_ups table.
        conn.execute(
            "CREATE TABLE follow_ups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                brief_id INTEGER NOT NULL,
                type TEXT NOT NULL,
                scheduled_for TEXT NOT NULL,
                sent_at TEXT,
                tracking_id TEXT NOT NULL UNIQUE
            )",
            [],
        )
        .unwrap();
        migrate(&conn).unwrap();

        let mut stmt = conn.prepare("PRAGMA table_info(follow_ups)").unwrap();
        let cols: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert!(cols.contains(&"opened_at".to_string()));
    }
}
