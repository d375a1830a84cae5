#![forbid(unsafe_code)]

use super::super::StoreError;
use super::now_ms;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

const SCHEMA_VERSION: i64 = 1;

const NODE_TABLES: [&str; 3] = ["store_state", "projects", "nodes"];

/// What an opened database file holds, judged by its table names and the
/// recorded schema version.
#[derive(Debug, PartialEq, Eq)]
enum Layout {
    Fresh,
    Current,
    Incompatible(&'static str),
}

/// Refuses to touch a database that holds anything but the node store.
pub(in crate::store) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    match inspect_layout(conn)? {
        Layout::Fresh | Layout::Current => Ok(()),
        Layout::Incompatible(reason) => Err(StoreError::InvalidInput(reason)),
    }
}

fn inspect_layout(conn: &Connection) -> Result<Layout, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;

    if tables.is_empty() {
        return Ok(Layout::Fresh);
    }
    if tables.iter().any(|table| !NODE_TABLES.contains(&table.as_str())) {
        return Ok(Layout::Incompatible(
            "RESET_REQUIRED: database holds tables this store does not own",
        ));
    }
    if tables.len() != NODE_TABLES.len() {
        return Ok(Layout::Incompatible(
            "RESET_REQUIRED: node store tables are incomplete",
        ));
    }

    let recorded = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(match recorded {
        Some(SCHEMA_VERSION) => Layout::Current,
        Some(_) => Layout::Incompatible("RESET_REQUIRED: node store schema version differs"),
        None => Layout::Incompatible("RESET_REQUIRED: node store was never initialized"),
    })
}

pub(in crate::store) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();

    // No uniqueness on (context_id, prev_id): a racing append must stay
    // observable as a fork rather than fail the write.
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;

        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
          project TEXT PRIMARY KEY,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS nodes (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          public_id TEXT NOT NULL UNIQUE,
          project TEXT NOT NULL,
          kind TEXT NOT NULL CHECK(kind IN ('context', 'message')),
          content_json TEXT NOT NULL,
          metadata_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          parent_id TEXT,
          prev_id TEXT,
          context_id TEXT,
          FOREIGN KEY(project) REFERENCES projects(project) ON DELETE CASCADE,
          CHECK(prev_id IS NULL OR prev_id <> public_id)
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_project_context
          ON nodes(project, context_id, created_at_ms, seq);

        CREATE INDEX IF NOT EXISTS idx_nodes_project_parent
          ON nodes(project, parent_id, created_at_ms, seq);

        CREATE INDEX IF NOT EXISTS idx_nodes_project_roots
          ON nodes(project, kind, created_at_ms, seq)
          WHERE parent_id IS NULL;
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET \
           schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}
