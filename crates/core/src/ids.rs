#![forbid(unsafe_code)]

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind every public id (96 bits of entropy).
pub const PUBLIC_ID_ENTROPY_BYTES: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Context,
    Message,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Context => "context",
            NodeKind::Message => "message",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "context" => Some(NodeKind::Context),
            "message" => Some(NodeKind::Message),
            _ => None,
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            NodeKind::Context => "ctx_",
            NodeKind::Message => "msg_",
        }
    }

    /// Kind implied by a public id's tag, if it carries one.
    pub fn of_public_id(value: &str) -> Option<Self> {
        if value.starts_with(NodeKind::Context.id_prefix()) {
            Some(NodeKind::Context)
        } else if value.starts_with(NodeKind::Message.id_prefix()) {
            Some(NodeKind::Message)
        } else {
            None
        }
    }
}

/// Source of fresh public ids for planned records.
pub trait PublicIdGenerator {
    fn generate(&mut self, kind: NodeKind) -> String;
}

/// Default generator: CSPRNG bytes, hex encoded, kind tagged.
///
/// No existence check is made against persisted ids; collisions are left to
/// the storage unique constraint.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIdGenerator;

impl PublicIdGenerator for RandomIdGenerator {
    fn generate(&mut self, kind: NodeKind) -> String {
        generate_public_id(kind)
    }
}

pub fn generate_public_id(kind: NodeKind) -> String {
    let mut bytes = [0u8; PUBLIC_ID_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{}{}", kind.id_prefix(), hex::encode(bytes))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, ProjectIdError> {
        let value = value.into();
        validate_project_id(&value)?;
        Ok(Self(value))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectIdError {
    Empty,
    TooLong,
    InvalidFirstChar,
    InvalidChar { ch: char, index: usize },
}

impl ProjectIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "project id must not be empty",
            Self::TooLong => "project id is too long",
            Self::InvalidFirstChar => "project id must start with an ascii letter or digit",
            Self::InvalidChar { .. } => "project id contains an unsupported character",
        }
    }
}

fn validate_project_id(value: &str) -> Result<(), ProjectIdError> {
    if value.is_empty() {
        return Err(ProjectIdError::Empty);
    }
    if value.len() > 128 {
        return Err(ProjectIdError::TooLong);
    }
    let mut chars = value.chars().enumerate();
    let Some((_, first)) = chars.next() else {
        return Err(ProjectIdError::Empty);
    };
    if !first.is_ascii_alphanumeric() {
        return Err(ProjectIdError::InvalidFirstChar);
    }
    for (index, ch) in chars {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '/' | '-') {
            continue;
        }
        return Err(ProjectIdError::InvalidChar { ch, index });
    }
    Ok(())
}
