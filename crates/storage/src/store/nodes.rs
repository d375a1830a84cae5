#![forbid(unsafe_code)]

use super::StoreError;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, Transaction, params};
use uc_core::{Node, NodeInsertRecord, NodeKind, NodeMetadata, NodeSource};

const NODE_COLUMNS: &str = "public_id, project, kind, content_json, metadata_json, \
                            created_at_ms, parent_id, prev_id, context_id";

/// Project-scoped read view over one connection or transaction.
///
/// Every query orders by `(created_at_ms, seq)` so "first encountered" means
/// oldest, then first inserted.
#[derive(Clone, Copy)]
pub struct NodeReader<'c> {
    conn: &'c Connection,
    project_id: &'c str,
}

impl<'c> NodeReader<'c> {
    pub fn new(conn: &'c Connection, project_id: &'c str) -> Self {
        Self { conn, project_id }
    }

    pub fn get_node(&self, public_id: &str) -> Result<Option<Node>, StoreError> {
        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE project=?1 AND public_id=?2");
        let raw = self
            .conn
            .query_row(&sql, params![self.project_id, public_id], RawNode::read)
            .optional()?;
        raw.map(RawNode::decode).transpose()
    }

    /// Root contexts (lineage starts), oldest first.
    pub fn list_root_contexts(&self, limit: usize, offset: usize) -> Result<Vec<Node>, StoreError> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes \
             WHERE project=?1 AND kind='context' AND parent_id IS NULL \
             ORDER BY created_at_ms ASC, seq ASC \
             LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![self.project_id, to_sqlite_i64(limit)?, to_sqlite_i64(offset)?],
            RawNode::read,
        )?;
        rows.map(|row| row.map_err(StoreError::from).and_then(RawNode::decode))
            .collect()
    }

    pub fn count_chain(&self, chain_key: &str) -> Result<usize, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(1) FROM nodes WHERE project=?1 AND context_id=?2",
            params![self.project_id, chain_key],
            |row| row.get::<_, i64>(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::InvalidInput("numeric overflow"))
    }

    fn select(&self, filter: &str, key: &str) -> Result<Vec<Node>, StoreError> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE project=?1 AND {filter} \
             ORDER BY created_at_ms ASC, seq ASC"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![self.project_id, key], RawNode::read)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(RawNode::decode))
            .collect()
    }
}

impl NodeSource for NodeReader<'_> {
    type Error = StoreError;

    fn find_records_by_chain_key(&self, chain_key: &str) -> Result<Vec<Node>, StoreError> {
        self.select("context_id=?2", chain_key)
    }

    fn find_branch_records(&self, root_id: &str) -> Result<Vec<Node>, StoreError> {
        self.select("kind='context' AND (public_id=?2 OR parent_id=?2)", root_id)
    }

    fn find_message_records(&self, head_id: &str) -> Result<Vec<Node>, StoreError> {
        self.select("kind='message' AND context_id=?2", head_id)
    }

    fn find_ordered_branch_heads(&self, root_id: &str) -> Result<Vec<Node>, StoreError> {
        self.find_branch_records(root_id)
    }
}

/// Persists a planned batch inside the caller's transaction; the batch lands
/// whole or not at all with it.
pub fn insert_nodes_tx(
    tx: &Transaction<'_>,
    records: Vec<NodeInsertRecord>,
    created_at_ms: i64,
) -> Result<Vec<Node>, StoreError> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO nodes(public_id, project, kind, content_json, metadata_json, \
         created_at_ms, parent_id, prev_id, context_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let content_json = serde_json::to_string(&record.content)?;
        let metadata_json = serde_json::to_string(&record.metadata)?;
        stmt.execute(params![
            record.public_id,
            record.project_id,
            record.kind.as_str(),
            content_json,
            metadata_json,
            created_at_ms,
            record.parent_id,
            record.prev_id,
            record.context_id,
        ])
        .map_err(map_insert_conflict)?;
        out.push(record.into_node(created_at_ms));
    }

    tracing::debug!(rows = out.len(), "node batch inserted");
    Ok(out)
}

pub(crate) fn ensure_project_tx(
    tx: &Transaction<'_>,
    project_id: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT OR IGNORE INTO projects(project, created_at_ms) VALUES (?1, ?2)",
        params![project_id, now_ms],
    )?;
    Ok(())
}

struct RawNode {
    public_id: String,
    project_id: String,
    kind: String,
    content_json: String,
    metadata_json: String,
    created_at_ms: i64,
    parent_id: Option<String>,
    prev_id: Option<String>,
    context_id: Option<String>,
}

impl RawNode {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            public_id: row.get(0)?,
            project_id: row.get(1)?,
            kind: row.get(2)?,
            content_json: row.get(3)?,
            metadata_json: row.get(4)?,
            created_at_ms: row.get(5)?,
            parent_id: row.get(6)?,
            prev_id: row.get(7)?,
            context_id: row.get(8)?,
        })
    }

    fn decode(self) -> Result<Node, StoreError> {
        let kind =
            NodeKind::parse(&self.kind).ok_or(StoreError::InvalidInput("invalid node kind"))?;
        let metadata: NodeMetadata = serde_json::from_str(&self.metadata_json)?;
        Ok(Node {
            public_id: self.public_id,
            project_id: self.project_id,
            kind,
            content: serde_json::from_str(&self.content_json)?,
            metadata,
            created_at_ms: self.created_at_ms,
            parent_id: self.parent_id,
            prev_id: self.prev_id,
            context_id: self.context_id,
        })
    }
}

fn map_insert_conflict(err: rusqlite::Error) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::InvalidInput(
            "node violates a storage constraint (duplicate public id?)",
        );
    }
    StoreError::Sql(err)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

pub(crate) fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}
