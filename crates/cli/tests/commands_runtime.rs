use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use textagent_cli::bootstrap::{bootstrap_with_config, Application, ServiceKind};
use textagent_cli::commands::handle::process_input;
use textagent_cli::commands::{config, migrate};
use textagent_core::config::{AppConfig, LoadOptions};
use textagent_core::secrets::StaticSecretStore;

#[test]
fn migrate_returns_success_with_memory_database() {
    with_env(&[("TEXTAGENT_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("TEXTAGENT_DATABASE_URL", "postgres://localhost/records")], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_values_to_env_file_and_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("textagent.toml");
    fs::write(&path, "[storage]\ntask_table = \"todo\"\n").expect("write config");

    with_env(&[("TEXTAGENT_DATABASE_URL", "sqlite::memory:")], || {
        let result = config::run(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert_eq!(result.exit_code, 0);

        let output = result.output;
        assert!(output
            .contains("- database.url = sqlite::memory: (source: env (TEXTAGENT_DATABASE_URL))"));
        assert!(output.contains(&format!(
            "- storage.task_table = todo (source: file ({}))",
            path.display()
        )));
        assert!(output.contains("- storage.message_table = message (source: default)"));
    });
}

#[test]
fn config_reports_missing_explicit_file() {
    with_env(&[], || {
        let result = config::run(LoadOptions {
            config_path: Some("definitely-missing-textagent.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[tokio::test]
async fn handle_writes_one_envelope_for_a_single_document() {
    let app = task_tracking_app().await;
    let input = br#"{
        "actionGroup": "TaskTracking",
        "function": "task_create",
        "parameters": [
            {"name": "conversation_phone_numbers", "type": "string", "value": "[5551112222]"},
            {"name": "name", "type": "string", "value": "Buy milk"}
        ]
    }"#;
    let mut output = Vec::new();

    let handled =
        process_input(&app.router, &input[..], &mut output, false, "req-1").await.expect("io");

    assert_eq!(handled, 1);
    let lines = output_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["response"]["function"], "task_create");
    assert_eq!(lines[0]["response"]["functionResponse"]["responseState"], "REPROMPT");

    app.db_pool.close().await;
}

#[tokio::test]
async fn handle_lines_mode_answers_every_non_blank_line() {
    let app = task_tracking_app().await;
    let input = concat!(
        r#"{"actionGroup":"TaskTracking","function":"task_list","parameters":"#,
        r#"[{"name":"conversation_phone_numbers","type":"string","value":"[5551112222]"}]}"#,
        "\n\n",
        "this is not json\n",
        r#"{"actionGroup":"TaskTracking","function":"message_create"}"#,
        "\n",
    );
    let mut output = Vec::new();

    let handled = process_input(&app.router, input.as_bytes(), &mut output, true, "batch")
        .await
        .expect("io");

    assert_eq!(handled, 3);
    let lines = output_lines(&output);
    assert_eq!(lines.len(), 3);

    assert_eq!(lines[0]["response"]["functionResponse"]["responseState"], "REPROMPT");
    assert_eq!(lines[0]["response"]["functionResponse"]["responseBody"]["TEXT"]["body"], "[]");

    assert_eq!(lines[1]["response"]["actionGroup"], "invalid_request");
    assert_eq!(lines[1]["response"]["functionResponse"]["responseState"], "FAILURE");

    assert_eq!(lines[2]["response"]["function"], "message_create");
    assert_eq!(lines[2]["response"]["functionResponse"]["responseState"], "FAILURE");

    app.db_pool.close().await;
}

async fn task_tracking_app() -> Application {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    bootstrap_with_config(config, ServiceKind::TaskTracking, &StaticSecretStore::default())
        .await
        .expect("bootstrap")
}

fn output_lines(output: &[u8]) -> Vec<Value> {
    std::str::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is an envelope"))
        .collect()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TEXTAGENT_DATABASE_URL",
        "TEXTAGENT_DATABASE_MAX_CONNECTIONS",
        "TEXTAGENT_DATABASE_TIMEOUT_SECS",
        "TEXTAGENT_STORAGE_MESSAGE_TABLE",
        "TEXTAGENT_STORAGE_TASK_TABLE",
        "TEXTAGENT_AGENT_BASE_URL",
        "TEXTAGENT_AGENT_ID_SECRET_ID",
        "TEXTAGENT_AGENT_ALIAS_ID_SECRET_ID",
        "TEXTAGENT_AGENT_API_KEY_SECRET_ID",
        "AGENT_ID_SECRET_ID",
        "AGENT_ALIAS_ID_SECRET_ID",
        "TEXTAGENT_LOGGING_LEVEL",
        "TEXTAGENT_LOGGING_FORMAT",
        "TEXTAGENT_LOG_LEVEL",
        "TEXTAGENT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
