use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::error::{AppError, Result};
use crate::domain::price::IdPolicy;

const DEFAULT_CONFIG_FILE: &str = "pricehub.toml";
const ENV_CONFIG_FILE: &str = "PRICEHUB_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub ingest: IngestConfig,
    /// Fallback filter when `RUST_LOG` is unset.
    #[validate(length(min = 1))]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            ingest: IngestConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub user: String,
    pub password: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub ssl_mode: String,
    /// Used when `backend = "sqlite"`.
    #[validate(length(min = 1))]
    pub sqlite_url: String,
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
    #[validate(range(min = 1))]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            user: "validator".to_string(),
            password: "val1dat0r".to_string(),
            name: "project-sem-1".to_string(),
            ssl_mode: "disable".to_string(),
            sqlite_url: "sqlite::memory:".to_string(),
            max_connections: 5,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestConfig {
    pub id_policy: IdPolicy,
    #[validate(range(min = 1))]
    pub max_upload_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            id_policy: IdPolicy::Generate,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Layered sources, later ones win:
    /// defaults, `pricehub.toml`, `POSTGRES_*`, `PRICEHUB_*` (`__` separates sections).
    pub fn figment() -> Figment {
        let config_file =
            std::env::var(ENV_CONFIG_FILE).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("POSTGRES_").map(|key| {
                match key.as_str().to_ascii_lowercase().as_str() {
                    "db" => "database.name".into(),
                    other => format!("database.{}", other).into(),
                }
            }))
            .merge(Env::prefixed("PRICEHUB_").ignore(&["config"]).split("__"))
    }

    /// Load `.env`, extract and validate.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::Config(e.to_string()))?;
        config
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(config)
    }
}
