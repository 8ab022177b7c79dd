use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret not found: {key}")]
    SecretNotFound { key: String },
}

/// Keyed secret lookup consumed at startup.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, key: &str) -> Result<SecretString, SecretError>;
}

/// Resolves secrets from the process environment, one variable per key.
#[derive(Clone, Debug, Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, key: &str) -> Result<SecretString, SecretError> {
        env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| SecretError::SecretNotFound { key: key.to_owned() })
    }
}

#[derive(Clone, Debug, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, key: &str) -> Result<SecretString, SecretError> {
        self.secrets
            .get(key)
            .cloned()
            .map(SecretString::from)
            .ok_or_else(|| SecretError::SecretNotFound { key: key.to_owned() })
    }
}
