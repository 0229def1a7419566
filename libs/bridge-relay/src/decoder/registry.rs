use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use apache_avro::Schema;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::RegistryConfig;
use crate::error::{DecodeError, RelayError};

pub type SchemaFuture<'a> = Pin<Box<dyn Future<Output = Result<String, DecodeError>> + Send + 'a>>;

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// How a schema is addressed in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaRef<'a> {
    /// Schema version id carried in the payload header.
    Version(&'a str),
    /// Latest version of a named schema.
    Name(&'a str),
}

impl SchemaRef<'_> {
    fn cache_key(&self) -> String {
        match self {
            SchemaRef::Version(id) => format!("version:{id}"),
            SchemaRef::Name(name) => format!("name:{name}"),
        }
    }
}

impl std::fmt::Display for SchemaRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaRef::Version(id) => write!(f, "version {id}"),
            SchemaRef::Name(name) => write!(f, "schema {name}"),
        }
    }
}

/// Where schema definitions (Avro JSON text) come from.
pub trait SchemaSource: Send + Sync {
    fn fetch<'a>(&'a self, schema: SchemaRef<'a>) -> SchemaFuture<'a>;
}

/// `.avsc` files named after the version id or the schema name.
pub struct DirectorySchemaSource {
    dir: PathBuf,
}

impl DirectorySchemaSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SchemaSource for DirectorySchemaSource {
    fn fetch<'a>(&'a self, schema: SchemaRef<'a>) -> SchemaFuture<'a> {
        Box::pin(async move {
            let stem = match schema {
                SchemaRef::Version(id) | SchemaRef::Name(id) => id,
            };
            // Names come from headers and config; keep lookups inside the directory.
            if stem.is_empty() || stem.contains(['/', '\\']) || stem.starts_with('.') {
                return Err(DecodeError::SchemaNotFound(stem.to_string()));
            }

            let path = self.dir.join(format!("{stem}.avsc"));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(DecodeError::SchemaNotFound(stem.to_string()))
                }
                Err(e) => Err(DecodeError::Source(format!("{}: {e}", path.display()))),
            }
        })
    }
}

/// HTTP registry: `GET {base}/schemas/{id}` and `GET {base}/schemas/by-name/{name}`.
pub struct HttpSchemaSource {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaVersionResponse {
    schema_definition: String,
}

impl HttpSchemaSource {
    pub fn new(base_url: &str) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(REGISTRY_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Config(format!("registry HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, schema: SchemaRef<'_>) -> String {
        match schema {
            SchemaRef::Version(id) => format!("{}/schemas/{id}", self.base_url),
            SchemaRef::Name(name) => format!("{}/schemas/by-name/{name}", self.base_url),
        }
    }
}

impl SchemaSource for HttpSchemaSource {
    fn fetch<'a>(&'a self, schema: SchemaRef<'a>) -> SchemaFuture<'a> {
        Box::pin(async move {
            let resp = self
                .http
                .get(self.url(schema))
                .send()
                .await
                .map_err(|e| DecodeError::Source(format!("request: {e}")))?;

            let status = resp.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DecodeError::SchemaNotFound(schema.to_string()));
            }
            let body = resp
                .text()
                .await
                .map_err(|e| DecodeError::Source(format!("read: {e}")))?;
            if !status.is_success() {
                return Err(DecodeError::Source(format!("status {status}: {body}")));
            }

            let parsed: SchemaVersionResponse = serde_json::from_str(&body)
                .map_err(|e| DecodeError::Source(format!("response: {e}")))?;
            Ok(parsed.schema_definition)
        })
    }
}

/// Registry client shared by every decode. Parsed schemas are cached for the
/// lifetime of the process.
pub struct SchemaRegistry {
    name: String,
    source: Box<dyn SchemaSource>,
    cache: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SchemaRegistry {
    pub fn new(name: impl Into<String>, source: Box<dyn SchemaSource>) -> Self {
        Self {
            name: name.into(),
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Build the registry described by `[relay.registry]`.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RelayError> {
        config.validate()?;

        let source: Box<dyn SchemaSource> = match (&config.schema_dir, &config.url) {
            (Some(dir), _) => Box::new(DirectorySchemaSource::new(dir)),
            (None, Some(url)) => Box::new(HttpSchemaSource::new(url)?),
            (None, None) => {
                return Err(RelayError::Config(format!("registry '{}' has no source", config.name)));
            }
        };

        if config.auto_registration {
            tracing::debug!(registry = %config.name, "auto-registration is a producer setting, ignored by the relay");
        }
        tracing::info!(
            registry = %config.name,
            region = config.region.as_deref().unwrap_or("-"),
            mapped_topics = config.topic_schemas.len(),
            "schema registry configured"
        );

        Ok(Self::new(config.name.clone(), source))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn schema(&self, schema: SchemaRef<'_>) -> Result<Arc<Schema>, DecodeError> {
        let key = schema.cache_key();
        if let Some(cached) = self.cache.read().await.get(&key) {
            return Ok(Arc::clone(cached));
        }

        let text = self
            .source
            .fetch(schema)
            .await
            .map_err(|e| e.with_context(&self.name))?;
        let parsed = Schema::parse_str(&text)
            .map_err(|e| DecodeError::Avro(format!("parse {schema}: {e}")))?;
        let parsed = Arc::new(parsed);

        tracing::debug!(registry = %self.name, %schema, "schema cached");
        self.cache
            .write()
            .await
            .entry(key)
            .or_insert_with(|| Arc::clone(&parsed));
        Ok(parsed)
    }

    pub async fn cached(&self) -> usize {
        self.cache.read().await.len()
    }
}
