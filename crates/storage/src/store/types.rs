#![forbid(unsafe_code)]

use serde::Serialize;
use serde_json::{Map, Value};
use uc_core::{Node, NodeMetadata, Version};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContextSummary {
    pub id: String,
    pub metadata: Map<String, Value>,
    pub created_at_ms: i64,
}

impl From<Node> for ContextSummary {
    fn from(node: Node) -> Self {
        Self {
            id: node.public_id,
            metadata: node.metadata.extra,
            created_at_ms: node.created_at_ms,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub index: usize,
    pub content: Value,
    pub metadata: NodeMetadata,
    pub created_at_ms: i64,
}

impl Message {
    pub(crate) fn from_chain(nodes: Vec<Node>, first_index: usize) -> Vec<Self> {
        nodes
            .into_iter()
            .enumerate()
            .map(|(offset, node)| Self {
                id: node.public_id,
                index: first_index + offset,
                content: node.content,
                metadata: node.metadata,
                created_at_ms: node.created_at_ms,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContextView {
    pub id: String,
    pub head_id: String,
    pub data: Vec<Message>,
    pub version: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<Version>>,
}

/// Outcome of append/update/delete/fork: the affected messages and the
/// version they live in.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WriteResult {
    pub head_id: String,
    pub data: Vec<Message>,
    pub version: usize,
}
