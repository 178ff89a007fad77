use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct RelayConfig {
    pub command_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct QueryConfig {
    /// Gap between consecutive rows (seconds) that splits two active runs.
    pub min_gap_secs: i64,
    /// Timestamps fetched per page while sizing a window.
    pub batch_size: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub relay: RelayConfig,
    pub query: QueryConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://data/gateway.db")?
            .set_default("database.pool_size", 5)?
            .set_default("relay.command_timeout_secs", 10)?
            .set_default("query.min_gap_secs", 300)?
            .set_default("query.batch_size", 60)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("GATEWAY").separator("_"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
