//! Mapper configuration
//!
//! ```toml
//! host = "localhost"
//! port = 7687
//! is_cluster = false
//! username = "neo4j"
//! password = "password"
//! pool_size = 50
//! index_strategy = "assert"
//! default_depth = 1
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use trellis_core::MAX_LOAD_DEPTH;

/// What startup does about constraints and indexes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    /// Leave the schema alone
    #[default]
    Ignore,
    /// Create whatever the catalog declares
    Assert,
    /// Fail unless everything the catalog declares already exists
    Validate,
}

impl std::str::FromStr for IndexStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "assert" => Ok(Self::Assert),
            "validate" => Ok(Self::Validate),
            other => Err(Error::Config(format!("unknown index strategy: {}", other))),
        }
    }
}

impl std::fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ignore => "ignore",
            Self::Assert => "assert",
            Self::Validate => "validate",
        };
        f.write_str(s)
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Route through a cluster (`neo4j://`) instead of a single server
    pub is_cluster: bool,
    pub username: String,
    pub password: String,
    pub pool_size: usize,
    pub index_strategy: IndexStrategy,
    /// Depth used by `save_default` and loads without an explicit depth
    pub default_depth: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7687,
            is_cluster: false,
            username: "neo4j".to_string(),
            password: String::new(),
            pool_size: 50,
            index_strategy: IndexStrategy::Ignore,
            default_depth: 1,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("is_cluster", &self.is_cluster)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("pool_size", &self.pool_size)
            .field("index_strategy", &self.index_strategy)
            .field("default_depth", &self.default_depth)
            .finish()
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host can not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be > 0".to_string()));
        }
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be > 0".to_string()));
        }
        if self.default_depth > MAX_LOAD_DEPTH {
            return Err(Error::Config(format!(
                "default_depth must be <= {}, got {}",
                MAX_LOAD_DEPTH, self.default_depth
            )));
        }
        Ok(())
    }

    /// Connection URI for the configured server or cluster
    pub fn uri(&self) -> String {
        let scheme = if self.is_cluster { "neo4j" } else { "bolt" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Keys accepted by [`Config::get`] and [`Config::set`]
    pub fn keys() -> &'static [&'static str] {
        &[
            "host",
            "port",
            "is_cluster",
            "username",
            "password",
            "pool_size",
            "index_strategy",
            "default_depth",
        ]
    }

    /// Read a value as text; the password is never returned
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "host" => Some(self.host.clone()),
            "port" => Some(self.port.to_string()),
            "is_cluster" => Some(self.is_cluster.to_string()),
            "username" => Some(self.username.clone()),
            "password" => Some("<redacted>".to_string()),
            "pool_size" => Some(self.pool_size.to_string()),
            "index_strategy" => Some(self.index_strategy.to_string()),
            "default_depth" => Some(self.default_depth.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for {}: {}", key, value)))
        }

        match key {
            "host" => self.host = value.to_string(),
            "port" => self.port = parse(key, value)?,
            "is_cluster" => self.is_cluster = parse(key, value)?,
            "username" => self.username = value.to_string(),
            "password" => self.password = value.to_string(),
            "pool_size" => self.pool_size = parse(key, value)?,
            "index_strategy" => self.index_strategy = value.parse()?,
            "default_depth" => self.default_depth = parse(key, value)?,
            _ => {
                return Err(Error::Config(format!(
                    "unknown config key: {} (available: {})",
                    key,
                    Self::keys().join(", ")
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.uri(), "bolt://localhost:7687");
        assert_eq!(config.pool_size, 50);
        assert_eq!(config.default_depth, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            host = "db.internal"
            is_cluster = true
            index_strategy = "validate"
            "#,
        )
        .unwrap();
        assert_eq!(config.uri(), "neo4j://db.internal:7687");
        assert_eq!(config.index_strategy, IndexStrategy::Validate);
        assert_eq!(config.username, "neo4j");
    }

    #[test]
    fn test_validation() {
        assert!(Config::from_toml("host = \"\"").is_err());
        assert!(Config::from_toml("pool_size = 0").is_err());
        assert!(Config::from_toml("port = 0").is_err());
        assert!(Config::from_toml("default_depth = 51").is_err());
        assert!(Config::from_toml("index_strategy = \"sometimes\"").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trellis.toml");

        let mut config = Config::default();
        config.set("port", "7688").unwrap();
        config.set("index_strategy", "assert").unwrap();
        config.set("password", "hunter2").unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get("port").as_deref(), Some("7688"));
        assert_eq!(loaded.get("password").as_deref(), Some("<redacted>"));
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = Config::default();
        assert!(config.set("port", "many").is_err());
        assert!(config.set("colour", "blue").is_err());
        assert!(config.get("colour").is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = Config::default();
        config.password = "hunter2".to_string();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
