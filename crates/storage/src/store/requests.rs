#![forbid(unsafe_code)]

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MessageInput {
    pub content: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Addresses a message of the current version by public id or by position.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MessageRef {
    Id(String),
    Index(usize),
}

impl MessageRef {
    /// `msg_...` is an id, a bare number is a position.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<usize>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Id(value.to_string()),
        }
    }
}

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MessageUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl MessageUpdate {
    pub fn target(&self) -> Option<MessageRef> {
        match (&self.id, self.index) {
            (Some(id), _) => Some(MessageRef::Id(id.clone())),
            (None, Some(index)) => Some(MessageRef::Index(index)),
            (None, None) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateContextRequest {
    pub project_id: String,
    pub metadata: Map<String, Value>,
    pub messages: Vec<MessageInput>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListContextsRequest {
    pub project_id: String,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetContextRequest {
    pub project_id: String,
    pub context_id: String,
    pub version: Option<usize>,
    pub history: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppendRequest {
    pub project_id: String,
    pub context_id: String,
    pub messages: Vec<MessageInput>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRequest {
    pub project_id: String,
    pub context_id: String,
    pub updates: Vec<MessageUpdate>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteRequest {
    pub project_id: String,
    pub context_id: String,
    pub targets: Vec<MessageRef>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkRequest {
    pub project_id: String,
    pub context_id: String,
    pub version: usize,
    pub created_at_ms: i64,
}
