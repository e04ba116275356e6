//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use quiver_migrate::{KeyVaultSecretStore, RestSearchService, SecretResolver};

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "quiver.toml";

/// Default schema file path (relative to the config file)
pub const SCHEMA_FILE_PATH: &str = "search/schema.toml";

/// Default migrations directory (relative to the schema file)
pub const MIGRATIONS_DIR: &str = "migrations";

/// Default state file path (relative to the config file)
pub const STATE_FILE_PATH: &str = ".quiver/state.json";

/// Default environment variable holding the service admin key
pub const API_KEY_ENV: &str = "QUIVER_API_KEY";

/// Default environment variable holding the key vault bearer token
pub const KEY_VAULT_TOKEN_ENV: &str = "QUIVER_KEY_VAULT_TOKEN";

/// Quiver CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Schema file path
    pub schema: PathBuf,

    /// Migrations directory, relative to the schema file's directory
    pub out: PathBuf,

    /// Search service connection
    pub service: ServiceConfig,

    /// State store
    pub state: StateConfig,

    /// Key vault for `@kv(..)` secrets
    pub key_vault: Option<KeyVaultConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: PathBuf::from(SCHEMA_FILE_PATH),
            out: PathBuf::from(MIGRATIONS_DIR),
            service: ServiceConfig::default(),
            state: StateConfig::default(),
            key_vault: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> CliResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Build the search service client.
    ///
    /// Fails when no endpoint is configured or the admin key variable is unset.
    pub fn search_service(&self) -> CliResult<RestSearchService> {
        let endpoint = self.service.endpoint.as_deref().ok_or_else(|| {
            CliError::Config("service.endpoint is not set in the config file".to_string())
        })?;
        let api_key = read_env(&self.service.api_key_env)?;

        let service = RestSearchService::new(endpoint, api_key)?;
        Ok(match &self.service.api_version {
            Some(version) => service.with_api_version(version),
            None => service,
        })
    }

    /// Build the secret resolver, with a key vault store when configured.
    pub fn secret_resolver(&self) -> CliResult<SecretResolver> {
        let resolver = SecretResolver::new();
        let Some(key_vault) = &self.key_vault else {
            return Ok(resolver);
        };

        let token = read_env(&key_vault.token_env)?;
        let store = KeyVaultSecretStore::new(&key_vault.url, token)?;
        Ok(resolver.with_store(store))
    }
}

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service endpoint, e.g. `https://example.search.windows.net`
    pub endpoint: Option<String>,

    /// Environment variable holding the admin key
    pub api_key_env: String,

    /// REST API version override
    pub api_version: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: API_KEY_ENV.to_string(),
            api_version: None,
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    /// State file path, relative to the config file
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(STATE_FILE_PATH),
        }
    }
}

/// Key vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyVaultConfig {
    /// Vault URL, e.g. `https://example.vault.azure.net`
    pub url: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    KEY_VAULT_TOKEN_ENV.to_string()
}

/// Paths derived from the config file location.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    /// Schema file
    pub schema: PathBuf,
    /// Migrations directory
    pub migrations: PathBuf,
    /// State file
    pub state: PathBuf,
}

impl ProjectPaths {
    /// Resolve paths against the directory holding the config file.
    ///
    /// `schema_override` comes from the command line and is used as given.
    pub fn resolve(config_path: &Path, config: &Config, schema_override: Option<&Path>) -> Self {
        let base = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let schema = match schema_override {
            Some(path) => path.to_path_buf(),
            None => base.join(&config.schema),
        };
        let schema_dir = schema
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        Self {
            migrations: schema_dir.join(&config.out),
            state: base.join(&config.state.path),
            schema,
        }
    }
}

fn read_env(name: &str) -> CliResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(CliError::Config(format!(
            "environment variable {name} is not set"
        ))),
    }
}
