//! Secret placeholders in data source connection strings.
//!
//! A connection string may contain `@env(NAME)` or `@kv(NAME)` placeholders.
//! They are stored verbatim in migration files and state, and only resolved
//! immediately before a data source is submitted to the service.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;

use crate::error::{MigrateResult, MigrationError};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(kv|env)\(([^)]+)\)").expect("placeholder pattern is valid"));

/// Key vault REST API version.
pub const KEY_VAULT_API_VERSION: &str = "7.4";

/// A source of named secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret value, `None` if it does not exist.
    async fn get_secret(&self, name: &str) -> MigrateResult<Option<String>>;
}

#[async_trait]
impl SecretStore for HashMap<String, String> {
    async fn get_secret(&self, name: &str) -> MigrateResult<Option<String>> {
        Ok(self.get(name).cloned())
    }
}

/// Secret store backed by a key vault's REST API.
#[derive(Debug, Clone)]
pub struct KeyVaultSecretStore {
    client: reqwest::Client,
    vault_url: String,
    token: String,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

impl KeyVaultSecretStore {
    /// Create a store for `vault_url` using a bearer token.
    pub fn new(vault_url: impl Into<String>, token: impl Into<String>) -> MigrateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            vault_url: vault_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    async fn get_secret(&self, name: &str) -> MigrateResult<Option<String>> {
        let url = format!(
            "{}/secrets/{}?api-version={}",
            self.vault_url, name, KEY_VAULT_API_VERSION
        );
        tracing::debug!(secret = name, "fetching secret from key vault");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MigrationError::secret(format!(
                "Key vault returned {} for secret {}: {}",
                status.as_u16(),
                name,
                text.trim()
            )));
        }

        let bundle: SecretBundle = response.json().await?;
        Ok(bundle.value)
    }
}

/// Resolves `@env(..)` and `@kv(..)` placeholders.
#[derive(Clone, Default)]
pub struct SecretResolver {
    store: Option<Arc<dyn SecretStore>>,
}

impl std::fmt::Debug for SecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretResolver")
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl SecretResolver {
    /// Create a resolver with no secret store. `@kv(..)` placeholders fail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a secret store for `@kv(..)` placeholders.
    pub fn with_store(mut self, store: impl SecretStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Check if a value contains any placeholder.
    pub fn has_placeholder(input: &str) -> bool {
        PLACEHOLDER.is_match(input)
    }

    /// Substitute every placeholder in `input`.
    ///
    /// Input without placeholders is returned unchanged. A missing
    /// environment variable, a `@kv(..)` with no store or a secret the store
    /// does not have fails with [`MigrationError::Secret`].
    pub async fn resolve(&self, input: &str) -> MigrateResult<String> {
        let mut resolved = String::with_capacity(input.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(input) {
            let (Some(whole), Some(source), Some(key)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };

            let value = match source.as_str() {
                "kv" => self.from_store(key.as_str()).await?,
                _ => from_env(key.as_str())?,
            };

            resolved.push_str(&input[last..whole.start()]);
            resolved.push_str(&value);
            last = whole.end();
        }

        resolved.push_str(&input[last..]);
        Ok(resolved)
    }

    async fn from_store(&self, key: &str) -> MigrateResult<String> {
        let store = self.store.as_ref().ok_or_else(|| {
            MigrationError::secret(format!(
                "Secret store not configured, cannot resolve @kv({key})"
            ))
        })?;

        store
            .get_secret(key)
            .await?
            .ok_or_else(|| MigrationError::secret(format!("Failed to fetch secret {key}")))
    }
}

fn from_env(key: &str) -> MigrateResult<String> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(MigrationError::secret(format!(
            "Environment variable {key} not found"
        ))),
    }
}
