use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use bridge_relay::RelayConfig;
use delta_store::StoreConfig;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "bridge-server", about = "Log-to-pub/sub bridge with a delta-sync query API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP + WebSocket API with the relay endpoint
    Serve(ServeArgs),
    /// Relay one batch file and print the summary
    Relay(RelayArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", env = "BRIDGE_CONFIG")]
    pub config: String,

    /// Pub/sub endpoint base URL, overrides `relay.endpoint`
    #[arg(long, env = "RELAY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Pub/sub API key, overrides `relay.api_key`
    #[arg(long, env = "RELAY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<BridgeConfig, ServerError> {
        let mut config = BridgeConfig::load(&self.config)?;
        config.apply_overrides(self.endpoint.clone(), self.api_key.clone());
        Ok(config)
    }
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// Overrides `api_port`
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Clone, Debug)]
pub struct RelayArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// JSON batch: `{"records": {"<topic>-<partition>": [...]}}`
    #[arg(long)]
    pub batch: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Per-connection WS queue size.
    #[serde(default = "default_ws_buffer")]
    pub ws_buffer: usize,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_api_port() -> u16 {
    9200
}
fn default_ws_buffer() -> usize {
    4096
}

impl BridgeConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path).map_err(|e| ServerError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content).map_err(|e| match e {
            ServerError::Config { context, detail } => ServerError::Config {
                context,
                detail: format!("'{path}': {detail}"),
            },
            other => other,
        })
    }

    pub fn parse(toml_str: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ServerError::Config {
            context: "parse",
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// CLI / environment values win over the file.
    pub fn apply_overrides(&mut self, endpoint: Option<String>, api_key: Option<String>) {
        if endpoint.is_some() {
            self.relay.endpoint = endpoint;
        }
        if api_key.is_some() {
            self.relay.api_key = api_key;
        }
    }

    fn validate(&self) -> Result<(), ServerError> {
        if self.store.max_limit == 0 {
            return Err(ServerError::Config {
                context: "store",
                detail: "max_limit must be at least 1".into(),
            });
        }
        if self.store.sweep_interval_secs == 0 {
            return Err(ServerError::Config {
                context: "store",
                detail: "sweep_interval_secs must be at least 1".into(),
            });
        }
        if let Some(registry) = &self.relay.registry {
            registry.validate()?;
        }
        Ok(())
    }
}
