//! Configuration loaded from disk drives the running server.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use common::{register_chatter, serve, MockLLM};
use mindmatrix::{ConfigManager, InMemoryMemoryStore, MindMatrix};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[server]
port = 9600

[auth]
api_keys_env = "MM_CFG_ROTATE_KEYS"
jwt_secret_env = "MM_CFG_ROTATE_JWT"

[memory]
exclude_topics = ["secret"]

[agents.chatter]
description = "You are Chatter."
instructions = ["Be brief"]
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_agents_section_becomes_factory_config() {
    let file = write_config(CONFIG);
    let manager = ConfigManager::new(file.path()).unwrap();
    let config = manager.config();

    assert_eq!(config.server.port, 9600);
    let agent = config.get_agent("chatter").unwrap();
    let factory = agent.to_factory_config("chatter");
    assert_eq!(factory["name"], "chatter");
    assert_eq!(factory["instructions"], json!(["Be brief"]));
}

#[tokio::test]
async fn test_key_rotation_without_restart() {
    std::env::set_var("MM_CFG_ROTATE_KEYS", "old-key");
    std::env::set_var("MM_CFG_ROTATE_KEYS_NEXT", "new-key");

    let file = write_config(CONFIG);
    let manager = Arc::new(ConfigManager::new(file.path()).unwrap());
    let mut mindmatrix = MindMatrix::builder()
        .llm(Arc::new(MockLLM::new("hello")))
        .memory(Arc::new(InMemoryMemoryStore::new()))
        .config(manager.clone())
        .build();
    register_chatter(&mut mindmatrix);
    let server = serve(mindmatrix);

    let call = |key: &'static str| {
        server
            .post("/mm/v1/agent/chat/completions")
            .add_header(
                HeaderName::from_static("api-key"),
                HeaderValue::from_static(key),
            )
            .json(&json!({
                "model": "chatter",
                "messages": [{ "role": "user", "content": "hi" }]
            }))
    };

    assert_eq!(call("old-key").await.status_code(), StatusCode::OK);
    assert_eq!(call("new-key").await.status_code(), StatusCode::UNAUTHORIZED);

    fs_rewrite(
        file.path(),
        &CONFIG.replace("MM_CFG_ROTATE_KEYS\"", "MM_CFG_ROTATE_KEYS_NEXT\""),
    );
    manager.reload().unwrap();

    assert_eq!(call("old-key").await.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(call("new-key").await.status_code(), StatusCode::OK);
}

fn fs_rewrite(path: &std::path::Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_invalid_toml_is_rejected_and_previous_config_kept() {
    let file = write_config(CONFIG);
    let manager = ConfigManager::new(file.path()).unwrap();

    fs_rewrite(file.path(), "[server\nport = ");
    assert!(manager.reload().is_err());
    assert_eq!(manager.config().server.port, 9600);
}
