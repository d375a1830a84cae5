#![forbid(unsafe_code)]

use crate::ids::{NodeKind, PublicIdGenerator, RandomIdGenerator};
use crate::model::{Node, NodeMetadata};
use serde_json::{Map, Value};

/// A record the caller wants to add; ids and links are filled in by the planner.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSpec {
    pub kind: NodeKind,
    pub content: Value,
    pub metadata: NodeMetadata,
    pub parent_id: Option<String>,
}

impl NodeSpec {
    pub fn message(content: Value, metadata: Map<String, Value>) -> Self {
        Self {
            kind: NodeKind::Message,
            content,
            metadata: NodeMetadata::user(metadata),
            parent_id: None,
        }
    }

    pub fn context(metadata: NodeMetadata, parent_id: Option<String>) -> Self {
        Self {
            kind: NodeKind::Context,
            content: Value::Null,
            metadata,
            parent_id,
        }
    }
}

/// A planned row, linked and ready to persist.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeInsertRecord {
    pub public_id: String,
    pub project_id: String,
    pub kind: NodeKind,
    pub content: Value,
    pub metadata: NodeMetadata,
    pub parent_id: Option<String>,
    pub prev_id: Option<String>,
    pub context_id: Option<String>,
}

impl NodeInsertRecord {
    pub fn into_node(self, created_at_ms: i64) -> Node {
        Node {
            public_id: self.public_id,
            project_id: self.project_id,
            kind: self.kind,
            content: self.content,
            metadata: self.metadata,
            created_at_ms,
            parent_id: self.parent_id,
            prev_id: self.prev_id,
            context_id: self.context_id,
        }
    }
}

/// Plans `specs` as a contiguous extension of the chain ending at
/// `starting_prev_id` (a fresh chain when `None`).
///
/// No I/O happens here. The batch only extends the chain cleanly if it is
/// persisted atomically and nothing else appended after the tail was read.
pub fn build_node_insert_records(
    specs: Vec<NodeSpec>,
    project_id: &str,
    context_id: Option<&str>,
    starting_prev_id: Option<&str>,
) -> Vec<NodeInsertRecord> {
    build_node_insert_records_with(
        &mut RandomIdGenerator,
        specs,
        project_id,
        context_id,
        starting_prev_id,
    )
}

pub fn build_node_insert_records_with<G: PublicIdGenerator + ?Sized>(
    ids: &mut G,
    specs: Vec<NodeSpec>,
    project_id: &str,
    context_id: Option<&str>,
    starting_prev_id: Option<&str>,
) -> Vec<NodeInsertRecord> {
    let mut prev_id = starting_prev_id.map(str::to_string);
    let mut out = Vec::with_capacity(specs.len());
    for spec in specs {
        let public_id = ids.generate(spec.kind);
        out.push(NodeInsertRecord {
            public_id: public_id.clone(),
            project_id: project_id.to_string(),
            kind: spec.kind,
            content: spec.content,
            metadata: spec.metadata,
            parent_id: spec.parent_id,
            prev_id: prev_id.replace(public_id),
            context_id: context_id.map(str::to_string),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::order_nodes;
    use serde_json::json;
    use std::collections::HashSet;

    struct Sequential(usize);

    impl PublicIdGenerator for Sequential {
        fn generate(&mut self, kind: NodeKind) -> String {
            self.0 += 1;
            format!("{}{:04}", kind.id_prefix(), self.0)
        }
    }

    fn messages(count: usize) -> Vec<NodeSpec> {
        (0..count)
            .map(|i| {
                NodeSpec::message(
                    json!({ "role": "user", "text": format!("turn {i}") }),
                    Map::new(),
                )
            })
            .collect()
    }

    #[test]
    fn links_batch_onto_starting_predecessor() {
        let records =
            build_node_insert_records(messages(3), "proj", Some("ctx_head"), Some("msg_aaa"));

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].prev_id.as_deref(), Some("msg_aaa"));
        assert_eq!(
            records[1].prev_id.as_deref(),
            Some(records[0].public_id.as_str())
        );
        assert_eq!(
            records[2].prev_id.as_deref(),
            Some(records[1].public_id.as_str())
        );

        let distinct = records
            .iter()
            .map(|r| r.public_id.as_str())
            .collect::<HashSet<_>>();
        assert_eq!(distinct.len(), 3);
        for record in &records {
            assert!(record.public_id.starts_with("msg_"));
            assert_eq!(record.public_id.len(), 4 + 24);
            assert_eq!(record.context_id.as_deref(), Some("ctx_head"));
            assert_eq!(record.project_id, "proj");
        }
    }

    #[test]
    fn mixed_kinds_get_matching_tags() {
        let specs = vec![
            NodeSpec::context(NodeMetadata::default(), None),
            NodeSpec::message(json!("hello"), Map::new()),
        ];
        let records = build_node_insert_records(specs, "proj", None, None);
        assert!(records[0].public_id.starts_with("ctx_"));
        assert!(records[1].public_id.starts_with("msg_"));
        assert_eq!(records[0].prev_id, None);
    }

    #[test]
    fn preserves_input_order_and_payloads() {
        let mut ids = Sequential(0);
        let records =
            build_node_insert_records_with(&mut ids, messages(2), "proj", Some("ctx_1"), None);
        assert_eq!(records[0].public_id, "msg_0001");
        assert_eq!(records[1].public_id, "msg_0002");
        assert_eq!(records[0].content["text"], json!("turn 0"));
        assert_eq!(records[1].content["text"], json!("turn 1"));
    }

    #[test]
    fn empty_batch_plans_nothing() {
        let records = build_node_insert_records(Vec::new(), "proj", Some("ctx_1"), Some("msg_a"));
        assert!(records.is_empty());
    }

    #[test]
    fn fresh_chain_round_trips_through_ordering() {
        let records = build_node_insert_records(messages(5), "proj", Some("ctx_1"), None);
        let planned = records.iter().map(|r| r.public_id.clone()).collect::<Vec<_>>();

        // Same batch timestamp for every row, persisted in scrambled order.
        let mut persisted = records
            .into_iter()
            .map(|record| record.into_node(1_700_000_000_000))
            .collect::<Vec<_>>();
        persisted.rotate_left(2);
        persisted.swap(0, 4);

        let ordered = order_nodes(persisted);
        assert_eq!(
            ordered.iter().map(|n| n.public_id.clone()).collect::<Vec<_>>(),
            planned
        );
    }
}
