use super::*;

#[test]
fn project_id_validation() {
    assert_eq!(ProjectId::try_new("").unwrap_err(), ProjectIdError::Empty);
    assert_eq!(
        ProjectId::try_new("-lead").unwrap_err(),
        ProjectIdError::InvalidFirstChar
    );
    assert_eq!(
        ProjectId::try_new("bad|id").unwrap_err(),
        ProjectIdError::InvalidChar { ch: '|', index: 3 }
    );
    assert_eq!(
        ProjectId::try_new("x".repeat(129)).unwrap_err(),
        ProjectIdError::TooLong
    );
    assert!(ProjectId::try_new("acme/agents-1.v2").is_ok());
}

#[test]
fn public_ids_are_tagged_hex() {
    for kind in [NodeKind::Context, NodeKind::Message] {
        let id = generate_public_id(kind);
        let body = id
            .strip_prefix(kind.id_prefix())
            .expect("id should carry its kind tag");
        assert_eq!(body.len(), 24);
        assert!(body.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_eq!(NodeKind::of_public_id(&id), Some(kind));
    }
    assert_ne!(
        generate_public_id(NodeKind::Message),
        generate_public_id(NodeKind::Message)
    );
}

#[test]
fn node_kind_round_trips_through_text() {
    assert_eq!(NodeKind::parse("context"), Some(NodeKind::Context));
    assert_eq!(NodeKind::parse(NodeKind::Message.as_str()), Some(NodeKind::Message));
    assert_eq!(NodeKind::parse("Message"), None);
    assert_eq!(NodeKind::of_public_id("evt_123"), None);
}

#[test]
fn metadata_keeps_reserved_keys_out_of_extra() {
    let metadata: NodeMetadata = serde_json::from_value(serde_json::json!({
        "operation": "delete",
        "affected": ["msg_x"],
        "source": "agent"
    }))
    .expect("metadata object should parse");
    assert_eq!(metadata.operation.as_deref(), Some("delete"));
    assert_eq!(metadata.affected, Some(vec!["msg_x".to_string()]));
    assert_eq!(metadata.extra.len(), 1);

    let back = serde_json::to_value(&metadata).expect("metadata should serialize");
    assert_eq!(back["source"], "agent");
    assert_eq!(back["operation"], "delete");

    let empty = serde_json::to_value(NodeMetadata::default()).expect("empty metadata serializes");
    assert_eq!(empty, serde_json::json!({}));
}
