//! Server configuration sourced from environment variables.

use std::time::Duration;

use anyhow::{Context, Result};
use orgiam_db::DbConfig;
use orgiam_engine::EngineConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub engine: EngineConfig,
    /// Pause between background reconciliation passes.
    pub reconcile_interval: Duration,
    /// Secret mixed into employee password hashes.
    pub password_pepper: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = DbConfig::default();
        let db = DbConfig {
            url: env_or("ORGIAM_DB_URL", defaults.url),
            namespace: env_or("ORGIAM_DB_NAMESPACE", defaults.namespace),
            database: env_or("ORGIAM_DB_DATABASE", defaults.database),
            username: env_or("ORGIAM_DB_USER", defaults.username),
            password: env_or("ORGIAM_DB_PASSWORD", defaults.password),
            ..defaults
        };

        let mut engine = EngineConfig::default();
        if let Ok(value) = std::env::var("ORGIAM_ID_ALLOCATION_ATTEMPTS") {
            engine.max_id_allocation_attempts = value
                .parse()
                .with_context(|| "parse ORGIAM_ID_ALLOCATION_ATTEMPTS")?;
        }
        if let Ok(value) = std::env::var("ORGIAM_RECONCILE_BATCH_SIZE") {
            engine.reconcile_batch_size = value
                .parse()
                .with_context(|| "parse ORGIAM_RECONCILE_BATCH_SIZE")?;
        }

        let interval_secs: u64 = std::env::var("ORGIAM_RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .with_context(|| "parse ORGIAM_RECONCILE_INTERVAL_SECS")?;
        if interval_secs == 0 {
            anyhow::bail!("ORGIAM_RECONCILE_INTERVAL_SECS must be positive");
        }

        let password_pepper = std::env::var("ORGIAM_PASSWORD_PEPPER")
            .ok()
            .filter(|p| !p.is_empty());

        Ok(Self {
            db,
            engine,
            reconcile_interval: Duration::from_secs(interval_secs),
            password_pepper,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}
