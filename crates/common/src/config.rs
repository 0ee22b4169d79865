use std::{net::SocketAddr, path::PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Database configuration.
#[derive(Deserialize)]
pub struct Database {
    /// Database URL string.
    pub url: String,
}

/// HTTP query-API server configuration.
#[derive(Deserialize)]
pub struct Server {
    /// Address, that HTTP server will listen on.
    pub address: SocketAddr,
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// Event stream source consumed by the ingestion driver.
#[derive(Deserialize)]
pub struct Sources {
    /// Path of the line-oriented WASM event stream.
    ///
    /// A bare filesystem path is read as a file; `-` means standard input.
    pub wasm: String,
}

/// Soketi (Pusher-compatible) connection details, used by `Soketi` webhook
/// endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Soketi {
    /// Soketi host.
    pub host: String,

    /// Application identifier.
    pub app_id: String,

    /// Application key.
    pub key: String,

    /// Application secret.
    pub secret: String,

    /// Whether to connect over TLS.
    #[serde(default)]
    pub use_tls: bool,
}

/// Statically configured webhook endpoint.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookEndpointConfig {
    /// Deliver via an HTTP request.
    Url {
        /// HTTP method.
        #[serde(default = "default_method")]
        method: String,

        /// Destination URL.
        url: String,

        /// Additional headers merged over the delivery defaults.
        #[serde(default)]
        headers: std::collections::BTreeMap<String, String>,
    },

    /// Publish on a Soketi channel/event pair.
    Soketi {
        /// Channel name.
        channel: String,

        /// Event name.
        event: String,
    },
}

fn default_method() -> String {
    String::from("POST")
}

/// A single webhook subscription loaded from configuration.
///
/// `name` selects a built-in subscription implementation (filter/getValue
/// pair); the endpoint it delivers to is configured statically here.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookDefinition {
    /// Name of the built-in subscription this definition configures.
    pub name: String,

    /// Endpoint to deliver matched events to.
    pub endpoint: WebhookEndpointConfig,
}

/// Ingestion driver configuration.
#[derive(Deserialize)]
pub struct Indexer {
    /// Identifier of the chain this indexer tails, surfaced to formulas via
    /// `getEnv().chainId`.
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// Event stream sources.
    pub sources: Sources,

    /// Soketi connection details, required only if any webhook uses a
    /// `Soketi` endpoint.
    #[serde(default)]
    pub soketi: Option<Soketi>,

    /// Webhook subscriptions to evaluate against incoming events.
    #[serde(default)]
    pub webhooks: Vec<WebhookDefinition>,

    /// Number of pending events to buffer before considering a flush.
    #[serde(default = "default_batch")]
    pub batch: usize,

    /// Override for the first block height to ingest.
    ///
    /// Defaults to `state.lastWasmBlockHeightExported + 1` when absent.
    #[serde(default)]
    pub initial_block_height: Option<u64>,

    /// Whether to run computation-cache invalidation on each flush.
    #[serde(default = "default_true")]
    pub cache_updates: bool,

    /// Whether to enqueue webhooks on each flush.
    #[serde(default = "default_true")]
    pub webhooks_enabled: bool,
}

fn default_batch() -> usize {
    5000
}

fn default_chain_id() -> String {
    String::from("unknown")
}

fn default_true() -> bool {
    true
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// General database configuration.
    pub database: Database,

    /// HTTP query-API server configuration.
    #[serde(default)]
    pub server: Option<Server>,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Ingestion driver configuration.
    #[serde(default)]
    pub indexer: Option<Indexer>,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.unwrap_or(PathBuf::from("Config.toml"))))
            .merge(Env::prefixed("CONFIG_").split("_"))
            .extract()
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            database: Database {
                url: String::from("sqlite::memory:"),
            },
            server: Some(Server {
                address: "127.0.0.1:3000".parse().unwrap(),
            }),
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            indexer: Some(Indexer {
                chain_id: String::from("test-chain"),
                sources: Sources {
                    wasm: String::from("-"),
                },
                soketi: None,
                webhooks: Vec::new(),
                batch: 5000,
                initial_block_height: None,
                cache_updates: true,
                webhooks_enabled: true,
            }),
        }
    }
}
