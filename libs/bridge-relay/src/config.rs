use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::RelayError;

/// `[relay]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the pub/sub HTTP endpoint. Without it every publish fails fast.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Sent as `x-api-key` when present.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Write every built envelope to the event store.
    #[serde(default = "default_archive")]
    pub archive: bool,

    /// Schema registry; absent means passthrough decoding.
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
}

fn default_archive() -> bool {
    true
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            archive: default_archive(),
            registry: None,
        }
    }
}

/// `[relay.registry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Registry identifier.
    pub name: String,

    /// Accepted for compatibility with producer settings; the relay never registers schemas.
    #[serde(default = "default_auto_registration")]
    pub auto_registration: bool,

    #[serde(default)]
    pub region: Option<String>,

    /// Directory of `<version-id>.avsc` / `<schema-name>.avsc` files.
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// HTTP registry base URL.
    #[serde(default)]
    pub url: Option<String>,

    /// topic → schema name, for payloads produced without the registry header.
    #[serde(default)]
    pub topic_schemas: HashMap<String, String>,
}

fn default_auto_registration() -> bool {
    true
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.name.trim().is_empty() {
            return Err(RelayError::Config("registry name must not be empty".into()));
        }
        match (&self.schema_dir, &self.url) {
            (None, None) => Err(RelayError::Config(format!(
                "registry '{}': one of schema_dir or url is required",
                self.name
            ))),
            (Some(_), Some(_)) => Err(RelayError::Config(format!(
                "registry '{}': schema_dir and url are mutually exclusive",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}
