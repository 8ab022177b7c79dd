use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "textagent.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Store construction parameters: the tables backing each record type.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub message_table: String,
    pub task_table: String,
}

#[derive(Clone, Debug, Default)]
pub struct AgentConfig {
    pub base_url: Option<String>,
    /// Name of the secret holding the agent id.
    pub id_secret_id: Option<String>,
    /// Name of the secret holding the agent alias id.
    pub alias_id_secret_id: Option<String>,
    pub api_key_secret_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub agent_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://textagent.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            storage: StorageConfig {
                message_table: "message".to_string(),
                task_table: "task".to_string(),
            },
            agent: AgentConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Json },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(message_table) = storage.message_table {
                self.storage.message_table = message_table;
            }
            if let Some(task_table) = storage.task_table {
                self.storage.task_table = task_table;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(base_url) = agent.base_url {
                self.agent.base_url = Some(base_url);
            }
            if let Some(id_secret_id) = agent.id_secret_id {
                self.agent.id_secret_id = Some(id_secret_id);
            }
            if let Some(alias_id_secret_id) = agent.alias_id_secret_id {
                self.agent.alias_id_secret_id = Some(alias_id_secret_id);
            }
            if let Some(api_key_secret_id) = agent.api_key_secret_id {
                self.agent.api_key_secret_id = Some(api_key_secret_id);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TEXTAGENT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TEXTAGENT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TEXTAGENT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TEXTAGENT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TEXTAGENT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TEXTAGENT_STORAGE_MESSAGE_TABLE") {
            self.storage.message_table = value;
        }
        if let Some(value) = read_env("TEXTAGENT_STORAGE_TASK_TABLE") {
            self.storage.task_table = value;
        }

        if let Some(value) = read_env("TEXTAGENT_AGENT_BASE_URL") {
            self.agent.base_url = Some(value);
        }
        // The unprefixed names are what the original deployment exported.
        let id_secret_id =
            read_env("TEXTAGENT_AGENT_ID_SECRET_ID").or_else(|| read_env("AGENT_ID_SECRET_ID"));
        if let Some(value) = id_secret_id {
            self.agent.id_secret_id = Some(value);
        }
        let alias_id_secret_id = read_env("TEXTAGENT_AGENT_ALIAS_ID_SECRET_ID")
            .or_else(|| read_env("AGENT_ALIAS_ID_SECRET_ID"));
        if let Some(value) = alias_id_secret_id {
            self.agent.alias_id_secret_id = Some(value);
        }
        if let Some(value) = read_env("TEXTAGENT_AGENT_API_KEY_SECRET_ID") {
            self.agent.api_key_secret_id = Some(value);
        }

        let log_level =
            read_env("TEXTAGENT_LOGGING_LEVEL").or_else(|| read_env("TEXTAGENT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TEXTAGENT_LOGGING_FORMAT").or_else(|| read_env("TEXTAGENT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(agent_base_url) = overrides.agent_base_url {
            self.agent.base_url = Some(agent_base_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_storage(&self.storage)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl AgentConfig {
    /// The messaging service cannot start without an agent to call.
    pub fn require_invocation_settings(&self) -> Result<AgentSettings<'_>, ConfigError> {
        let base_url = required_agent_field("agent.base_url", self.base_url.as_deref())?;
        let id_secret_id =
            required_agent_field("agent.id_secret_id", self.id_secret_id.as_deref())?;
        let alias_id_secret_id =
            required_agent_field("agent.alias_id_secret_id", self.alias_id_secret_id.as_deref())?;

        Ok(AgentSettings {
            base_url,
            id_secret_id,
            alias_id_secret_id,
            api_key_secret_id: self.api_key_secret_id.as_deref(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentSettings<'a> {
    pub base_url: &'a str,
    pub id_secret_id: &'a str,
    pub alias_id_secret_id: &'a str,
    pub api_key_secret_id: Option<&'a str>,
}

fn required_agent_field<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str, ConfigError> {
    value.map(str::trim).filter(|value| !value.is_empty()).ok_or_else(|| {
        ConfigError::Validation(format!("{key} is required to invoke the conversational agent"))
    })
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config/textagent.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    let tables = [
        ("storage.message_table", &storage.message_table),
        ("storage.task_table", &storage.task_table),
    ];
    for (key, table) in tables {
        if !is_sql_identifier(table) {
            return Err(ConfigError::Validation(format!(
                "{key} must be a plain identifier (letters, digits, underscore), got `{table}`"
            )));
        }
    }

    if storage.message_table == storage.task_table {
        return Err(ConfigError::Validation(
            "storage.message_table and storage.task_table must differ".to_string(),
        ));
    }

    Ok(())
}

/// Table names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` passes.
pub fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = &agent.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "agent.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    storage: Option<StoragePatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    message_table: Option<String>,
    task_table: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    base_url: Option<String>,
    id_secret_id: Option<String>,
    alias_id_secret_id: Option<String>,
    api_key_secret_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{is_sql_identifier, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const TOUCHED_VARS: &[&str] = &[
        "TEXTAGENT_DATABASE_URL",
        "TEXTAGENT_STORAGE_TASK_TABLE",
        "TEXTAGENT_AGENT_BASE_URL",
        "TEXTAGENT_AGENT_ID_SECRET_ID",
        "AGENT_ID_SECRET_ID",
        "AGENT_ALIAS_ID_SECRET_ID",
        "TEXTAGENT_LOG_LEVEL",
        "TEXTAGENT_LOG_FORMAT",
        "TEST_TEXTAGENT_AGENT_URL",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars() {
        for var in TOUCHED_VARS {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_any_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        let config = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.storage.message_table == "message", "default message table")?;
        ensure(config.storage.task_table == "task", "default task table")?;
        ensure(matches!(config.logging.format, LogFormat::Json), "default format is json")?;
        ensure(
            config.agent.require_invocation_settings().is_err(),
            "agent settings are not configured by default",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEST_TEXTAGENT_AGENT_URL", "https://agent.internal");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("textagent.toml");
            fs::write(
                &path,
                r#"
[agent]
base_url = "${TEST_TEXTAGENT_AGENT_URL}"
id_secret_id = "text-agent/agent-id"
alias_id_secret_id = "text-agent/agent-alias-id"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;
            let settings = config
                .agent
                .require_invocation_settings()
                .map_err(|err| format!("agent settings missing: {err}"))?;

            ensure(settings.base_url == "https://agent.internal", "base url is interpolated")?;
            ensure(settings.id_secret_id == "text-agent/agent-id", "id secret id from file")?;
            ensure(settings.api_key_secret_id.is_none(), "api key secret is optional")
        })();

        clear_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEXTAGENT_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("TEXTAGENT_STORAGE_TASK_TABLE", "task_from_env");
        env::set_var("TEXTAGENT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("textagent.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[storage]
message_table = "message_from_file"
task_table = "task_from_file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "env log format should win over default",
            )?;
            ensure(config.storage.message_table == "message_from_file", "file message table")?;
            ensure(config.storage.task_table == "task_from_env", "env task table wins over file")
        })();

        clear_vars();
        result
    }

    #[test]
    fn legacy_secret_id_variables_are_accepted() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEXTAGENT_AGENT_BASE_URL", "http://localhost:4010");
        env::set_var("AGENT_ID_SECRET_ID", "legacy-agent-id");
        env::set_var("AGENT_ALIAS_ID_SECRET_ID", "legacy-alias-id");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let settings = config
                .agent
                .require_invocation_settings()
                .map_err(|err| format!("agent settings missing: {err}"))?;

            ensure(settings.id_secret_id == "legacy-agent-id", "legacy id secret id")?;
            ensure(settings.alias_id_secret_id == "legacy-alias-id", "legacy alias secret id")
        })();

        clear_vars();
        result
    }

    #[test]
    fn validation_rejects_unsafe_table_names() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEXTAGENT_STORAGE_TASK_TABLE", "task; DROP TABLE message");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("storage.task_table")
                ),
                "validation failure should mention storage.task_table",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn sql_identifier_check() {
        assert!(is_sql_identifier("message"));
        assert!(is_sql_identifier("_tasks_v2"));
        assert!(!is_sql_identifier("2tasks"));
        assert!(!is_sql_identifier("text-agent-task-tracking"));
        assert!(!is_sql_identifier(""));
    }
}
