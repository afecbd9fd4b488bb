use chrono::Duration;
use ::config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Longest publish claim lease accepted, one day.
pub const MAXIMUM_CLAIM_LEASE_SECS: i64 = 24 * 60 * 60;

/// Service configuration, read from `CAMPAIGN_PUBLISHER__*` environment
/// variables (e.g. `CAMPAIGN_PUBLISHER__SERVER__PORT=8080`). Platform
/// credentials live separately in [`crate::gateway::GoogleAdsConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_database_uri")]
    pub uri: String,
    #[serde(default = "default_database_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    /// How long a publish run may hold a campaign before another run is
    /// allowed to take over.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: i64,
}

impl PublishConfig {
    pub fn claim_lease(&self) -> Duration {
        Duration::seconds(self.claim_lease_secs)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_backend() -> StoreBackend {
    StoreBackend::Mongo
}

fn default_database_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database_name() -> String {
    "campaign_publisher".to_string()
}

fn default_claim_lease_secs() -> i64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            uri: default_database_uri(),
            name: default_database_name(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("CAMPAIGN_PUBLISHER"))
    }

    fn load_from(source: Environment) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(source.prefix_separator("__").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        let lease = config.publish.claim_lease_secs;
        if lease <= 0 || lease > MAXIMUM_CLAIM_LEASE_SECS {
            return Err(ConfigError::Message(format!(
                "publish.claim_lease_secs must be between 1 and {}, got {}",
                MAXIMUM_CLAIM_LEASE_SECS, lease
            )));
        }

        Ok(config)
    }
}
