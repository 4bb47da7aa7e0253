//! Configuration management for graphmap.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`GRAPHMAP__` prefix, `__` separator,
//!    e.g. `GRAPHMAP__NEO4J__URI`)
//! 2. Config file (`graphmap.toml`, or any prefix passed to [`Settings::load`])
//! 3. Defaults

use serde::Deserialize;

use crate::error::GraphmapError;

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Neo4j connection settings (`[neo4j]` section).
    #[serde(default)]
    pub neo4j: Neo4jSettings,
}

/// Connection settings for the Neo4j graph backend.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Neo4jSettings {
    /// Bolt URI (default: "bolt://localhost:7687").
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Size of the Bolt connection pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Rows fetched per round trip when streaming results.
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "graphmap-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Settings {
    /// Load settings from `{file_prefix}.toml` (optional) and the environment.
    pub fn load(file_prefix: &str) -> Result<Self, GraphmapError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("GRAPHMAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;

        tracing::debug!(file_prefix, uri = %settings.neo4j.uri, "Settings loaded");
        Ok(settings)
    }

    fn validate(&self) -> Result<(), GraphmapError> {
        if self.neo4j.uri.trim().is_empty() {
            return Err(GraphmapError::InvalidSetting {
                key: "neo4j.uri".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.neo4j.max_connections == 0 {
            return Err(GraphmapError::InvalidSetting {
                key: "neo4j.max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
