#![forbid(unsafe_code)]

use crate::model::{Node, OPERATION_CREATE};
use serde::Serialize;
use serde_json::{Map, Value};

/// One entry of a lineage's version history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Version {
    pub version: usize,
    pub head_id: String,
    pub created_at_ms: i64,
    pub operation: String,
    pub affected: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Projects branch heads (already oldest first) into versions. The version
/// number is the position in `heads`; nothing is read from storage.
pub fn get_versions(heads: &[Node]) -> Vec<Version> {
    heads
        .iter()
        .enumerate()
        .map(|(version, head)| Version {
            version,
            head_id: head.public_id.clone(),
            created_at_ms: head.created_at_ms,
            operation: head
                .metadata
                .operation
                .clone()
                .unwrap_or_else(|| OPERATION_CREATE.to_string()),
            affected: head.metadata.affected.clone(),
            metadata: (!head.metadata.extra.is_empty()).then(|| head.metadata.extra.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeKind;
    use crate::model::NodeMetadata;
    use serde_json::json;

    fn head(id: &str, prev: Option<&str>, ts: i64, metadata: NodeMetadata) -> Node {
        Node {
            public_id: id.to_string(),
            project_id: "proj".to_string(),
            kind: NodeKind::Context,
            content: Value::Null,
            metadata,
            created_at_ms: ts,
            parent_id: prev.map(|_| "ctx_root".to_string()),
            prev_id: prev.map(str::to_string),
            context_id: None,
        }
    }

    #[test]
    fn defaults_to_create_and_reads_delete() {
        let heads = vec![
            head("ctx_root", None, 100, NodeMetadata::default()),
            head(
                "ctx_v1",
                Some("ctx_root"),
                200,
                NodeMetadata::operation("delete", Some(vec!["msg_x".to_string()])),
            ),
        ];

        let versions = get_versions(&heads);
        assert_eq!(versions.len(), 2);

        assert_eq!(versions[0].version, 0);
        assert_eq!(versions[0].head_id, "ctx_root");
        assert_eq!(versions[0].operation, "create");
        assert_eq!(versions[0].affected, None);
        assert_eq!(versions[0].metadata, None);

        assert_eq!(versions[1].version, 1);
        assert_eq!(versions[1].operation, "delete");
        assert_eq!(versions[1].affected, Some(vec!["msg_x".to_string()]));
        assert_eq!(versions[1].created_at_ms, 200);
    }

    #[test]
    fn residual_metadata_is_surfaced_only_when_present() {
        let mut extra = Map::new();
        extra.insert("label".to_string(), json!("checkpoint"));
        let metadata = NodeMetadata {
            operation: Some("update".to_string()),
            affected: None,
            extra,
        };
        let versions = get_versions(&[head("ctx_root", None, 1, metadata)]);

        let user = versions[0]
            .metadata
            .as_ref()
            .expect("non-reserved keys should be surfaced");
        assert_eq!(user.get("label"), Some(&json!("checkpoint")));
        assert!(!user.contains_key("operation"));
    }

    #[test]
    fn serialized_shape_keeps_null_affected_and_drops_empty_metadata() {
        let versions = get_versions(&[head("ctx_root", None, 1, NodeMetadata::default())]);
        let value = serde_json::to_value(&versions[0]).expect("version should serialize");
        assert_eq!(value["affected"], Value::Null);
        assert!(value.get("affected").is_some());
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn empty_input_projects_nothing() {
        assert!(get_versions(&[]).is_empty());
    }
}
