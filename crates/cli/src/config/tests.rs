use super::*;
use serde_json::json;
use std::collections::HashMap;

fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|arg| arg.to_string()).collect()
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_apply_without_flags_or_env() {
    let config = parse(args(&["list"]), no_env).expect("list parses");
    assert_eq!(config.storage_dir, PathBuf::from(".ultracontext"));
    assert_eq!(config.project, "default");
    assert_eq!(config.pool, PoolConfig::default());
    assert_eq!(
        config.command,
        Command::List {
            limit: 50,
            offset: 0
        }
    );
}

#[test]
fn flags_win_over_env_and_env_wins_over_defaults() {
    let env: HashMap<&str, &str> = HashMap::from([
        (STORAGE_DIR_ENV, "/env/store"),
        (PROJECT_ENV, "env-project"),
        (POOL_SIZE_ENV, "8"),
        (BUSY_TIMEOUT_ENV, "250"),
    ]);
    let lookup = |key: &str| env.get(key).map(|value| value.to_string());

    let config = parse(args(&["--project", "cli-project", "list"]), lookup).expect("parses");
    assert_eq!(config.project, "cli-project");
    assert_eq!(config.storage_dir, PathBuf::from("/env/store"));
    assert_eq!(config.pool.max_size, 8);
    assert_eq!(config.pool.busy_timeout, Duration::from_millis(250));
}

#[test]
fn invalid_pool_numbers_fall_back_to_defaults() {
    let config = parse(
        args(&["list", "--pool-size", "zero", "--busy-timeout-ms", "-1"]),
        no_env,
    )
    .expect("global flags are accepted after the command");
    assert_eq!(config.pool, PoolConfig::default());
}

#[test]
fn get_accepts_version_and_history() {
    let config = parse(args(&["get", "ctx_1", "--version", "2", "--history"]), no_env)
        .expect("get parses");
    assert_eq!(
        config.command,
        Command::Get {
            context_id: "ctx_1".to_string(),
            version: Some(2),
            history: true
        }
    );

    let err = parse(args(&["get", "ctx_1", "--version", "two"]), no_env)
        .expect_err("non-numeric version is rejected");
    assert_eq!(err.code(), "INVALID_ARGS");
}

#[test]
fn append_accepts_an_object_or_an_array() {
    let single = parse(args(&["append", "ctx_1", r#"{"content":"hi"}"#]), no_env)
        .expect("single message parses");
    let Command::Append { messages, .. } = single.command else {
        panic!("expected append");
    };
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, json!("hi"));
    assert!(messages[0].metadata.is_empty());

    let many = parse(
        args(&[
            "append",
            "ctx_1",
            r#"[{"content":"a"},{"content":"b","metadata":{"k":1}}]"#,
        ]),
        no_env,
    )
    .expect("array parses");
    let Command::Append { messages, .. } = many.command else {
        panic!("expected append");
    };
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].metadata.get("k"), Some(&json!(1)));
}

#[test]
fn update_and_delete_address_messages_by_id_or_index() {
    let update = parse(
        args(&["update", "ctx_1", r#"{"index":1,"content":"new"}"#]),
        no_env,
    )
    .expect("update parses");
    let Command::Update { updates, .. } = update.command else {
        panic!("expected update");
    };
    assert_eq!(updates[0].target(), Some(MessageRef::Index(1)));

    let delete = parse(args(&["delete", "ctx_1", "msg_ab", "3"]), no_env).expect("delete parses");
    assert_eq!(
        delete.command,
        Command::Delete {
            context_id: "ctx_1".to_string(),
            targets: vec![MessageRef::Id("msg_ab".to_string()), MessageRef::Index(3)],
        }
    );
}

#[test]
fn fork_requires_a_version() {
    let err = parse(args(&["fork", "ctx_1"]), no_env).expect_err("version is required");
    assert!(matches!(err, ConfigError::MissingValue("--version")));

    let config = parse(args(&["fork", "ctx_1", "--version", "0"]), no_env).expect("fork parses");
    assert_eq!(
        config.command,
        Command::Fork {
            context_id: "ctx_1".to_string(),
            version: 0
        }
    );
}

#[test]
fn malformed_input_is_reported() {
    assert!(matches!(
        parse(Vec::new(), no_env),
        Err(ConfigError::MissingCommand)
    ));
    assert!(matches!(
        parse(args(&["rm", "ctx_1"]), no_env),
        Err(ConfigError::UnknownCommand(name)) if name == "rm"
    ));

    let err = parse(args(&["create", "--metadata", "{not json"]), no_env)
        .expect_err("bad json is rejected");
    assert_eq!(err.code(), "INVALID_JSON");

    assert!(matches!(
        parse(args(&["--help"]), no_env).map(|config| config.command),
        Ok(Command::Help)
    ));
}
