use dashmap::DashMap;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::error::DataError;
use crate::server::config::ConnectionConfig;

// Baseline of 5 connections plus room for bursts of 10.
const MAX_CONNECTIONS: u32 = 15;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Hands out one pool per logical target name, created on first use.
pub struct ConnectionProvider {
    configs: HashMap<String, ConnectionConfig>,
    pools: DashMap<String, Arc<PgPool>>,
}

impl ConnectionProvider {
    pub fn new(configs: HashMap<String, ConnectionConfig>) -> Self {
        Self {
            configs,
            pools: DashMap::new(),
        }
    }

    /// Returns the cached pool for `target`, creating it on the first call.
    ///
    /// Failures are logged and returned; they are not cached, so a later call retries.
    pub fn get_connection(&self, target: &str) -> Result<Arc<PgPool>, DataError> {
        if let Some(pool) = self.pools.get(target) {
            return Ok(pool.clone());
        }

        let result = self
            .pools
            .entry(target.to_string())
            .or_try_insert_with(|| self.create_pool(target).map(Arc::new))
            .map(|pool| pool.clone());

        if let Err(e) = &result {
            error!(target_name = %target, error = %e, "Failed to initialize connection pool.");
        }
        result
    }

    fn create_pool(&self, target: &str) -> Result<PgPool, DataError> {
        let config = self
            .configs
            .get(target)
            .ok_or_else(|| DataError::connection(target, "no connection settings configured"))?;
        let options = connect_options(target, config)?;

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .min_connections(0)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            // Ping before handing a connection out so dropped server connections are replaced.
            .test_before_acquire(true)
            .connect_lazy_with(options);

        info!(
            target_name = %target,
            host = %config.host,
            database = %config.database,
            "Connection pool initialized."
        );
        Ok(pool)
    }

    /// Closes every pool that has been created so far.
    pub async fn close_all(&self) {
        let pools: Vec<Arc<PgPool>> = self.pools.iter().map(|entry| entry.value().clone()).collect();
        for pool in pools {
            pool.close().await;
        }
    }
}

fn connect_options(target: &str, config: &ConnectionConfig) -> Result<PgConnectOptions, DataError> {
    match config.dialect.to_ascii_lowercase().as_str() {
        "postgresql" | "postgres" => {}
        other => {
            return Err(DataError::connection(
                target,
                format!("unsupported dialect '{other}'"),
            ));
        }
    }
    if config.host.is_empty() || config.database.is_empty() {
        return Err(DataError::connection(target, "host and database must be set"));
    }

    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.database)
        .application_name("scrapewatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(dialect: &str) -> ConnectionConfig {
        ConnectionConfig {
            dialect: dialect.to_string(),
            host: "127.0.0.1".to_string(),
            port: 5432,
            username: "scraper".to_string(),
            password: "secret".to_string(),
            database: "scraper".to_string(),
        }
    }

    fn provider() -> ConnectionProvider {
        let mut configs = HashMap::new();
        configs.insert("dashboard_db".to_string(), conn("postgresql"));
        configs.insert("legacy_db".to_string(), conn("mysql"));
        ConnectionProvider::new(configs)
    }

    #[tokio::test]
    async fn test_same_pool_for_repeated_calls() {
        let provider = provider();
        let first = provider.get_connection("dashboard_db").unwrap();
        let second = provider.get_connection("dashboard_db").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_unknown_target_is_unavailable() {
        let provider = provider();
        let result = provider.get_connection("nope");
        assert!(matches!(
            result,
            Err(DataError::ConnectionUnavailable { ref target, .. }) if target == "nope"
        ));
    }

    #[tokio::test]
    async fn test_unsupported_dialect_is_not_cached() {
        let provider = provider();
        assert!(provider.get_connection("legacy_db").is_err());
        assert!(provider.get_connection("legacy_db").is_err());
        assert!(provider.pools.is_empty());
    }
}
