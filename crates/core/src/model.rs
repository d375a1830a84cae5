#![forbid(unsafe_code)]

use crate::ids::NodeKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const OPERATION_CREATE: &str = "create";
pub const OPERATION_UPDATE: &str = "update";
pub const OPERATION_DELETE: &str = "delete";
pub const OPERATION_FORK: &str = "fork";

/// Record metadata: the two keys the version projection reads, plus whatever
/// else the caller stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeMetadata {
    pub fn user(extra: Map<String, Value>) -> Self {
        Self {
            operation: None,
            affected: None,
            extra,
        }
    }

    pub fn operation(operation: &str, affected: Option<Vec<String>>) -> Self {
        Self {
            operation: Some(operation.to_string()),
            affected,
            extra: Map::new(),
        }
    }
}

/// One stored record: a branch version (`context`) or a chain element (`message`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub public_id: String,
    pub project_id: String,
    pub kind: NodeKind,
    pub content: Value,
    pub metadata: NodeMetadata,
    pub created_at_ms: i64,
    pub parent_id: Option<String>,
    pub prev_id: Option<String>,
    pub context_id: Option<String>,
}

impl Node {
    /// Lineage key: a root context is its own lineage.
    pub fn lineage_id(&self) -> &str {
        self.parent_id.as_deref().unwrap_or(&self.public_id)
    }
}
