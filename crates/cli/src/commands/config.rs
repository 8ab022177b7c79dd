use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use textagent_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use toml::Value;

use crate::commands::CommandResult;

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    CommandResult { exit_code: 0, output: render(&config, config_file_path.as_deref()) }
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path)
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["TEXTAGENT_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["TEXTAGENT_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", &["TEXTAGENT_DATABASE_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "storage.message_table",
        &config.storage.message_table,
        source("storage.message_table", &["TEXTAGENT_STORAGE_MESSAGE_TABLE"]),
    ));
    lines.push(render_line(
        "storage.task_table",
        &config.storage.task_table,
        source("storage.task_table", &["TEXTAGENT_STORAGE_TASK_TABLE"]),
    ));

    let base_url = config.agent.base_url.as_deref().map(redact_url_credentials);
    lines.push(render_line(
        "agent.base_url",
        base_url.as_deref().unwrap_or("<unset>"),
        source("agent.base_url", &["TEXTAGENT_AGENT_BASE_URL"]),
    ));
    lines.push(render_line(
        "agent.id_secret_id",
        config.agent.id_secret_id.as_deref().unwrap_or("<unset>"),
        source("agent.id_secret_id", &["TEXTAGENT_AGENT_ID_SECRET_ID", "AGENT_ID_SECRET_ID"]),
    ));
    lines.push(render_line(
        "agent.alias_id_secret_id",
        config.agent.alias_id_secret_id.as_deref().unwrap_or("<unset>"),
        source(
            "agent.alias_id_secret_id",
            &["TEXTAGENT_AGENT_ALIAS_ID_SECRET_ID", "AGENT_ALIAS_ID_SECRET_ID"],
        ),
    ));
    lines.push(render_line(
        "agent.api_key_secret_id",
        config.agent.api_key_secret_id.as_deref().unwrap_or("<unset>"),
        source("agent.api_key_secret_id", &["TEXTAGENT_AGENT_API_KEY_SECRET_ID"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["TEXTAGENT_LOGGING_LEVEL", "TEXTAGENT_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["TEXTAGENT_LOGGING_FORMAT", "TEXTAGENT_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/textagent.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Hides `user:password@` in URLs; everything else is shown as configured.
fn redact_url_credentials(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}{}", &rest[authority_end..]),
        None => url.to_string(),
    }
}
