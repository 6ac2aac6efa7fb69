use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::cache::ReadCache;
use super::connection::ConnectionProvider;
use super::error::DataError;
use super::params::{QueryParams, bind_named};
use super::table::Table;

/// Result of a read at the boundary: the table (empty on failure) plus the error to show, if any.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub table: Arc<Table>,
    pub error: Option<String>,
}

impl Fetched {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a write at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub message: String,
}

impl WriteOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: "Operation successful".to_string(),
        }
    }

    pub fn no_match() -> Self {
        Self {
            success: false,
            message: "No record matched the given id".to_string(),
        }
    }

    pub fn failed(err: &DataError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}

/// Read and write access to one logical database target.
#[derive(Clone)]
pub struct DataAccess {
    target: String,
    provider: Arc<ConnectionProvider>,
    cache: Arc<ReadCache>,
}

impl DataAccess {
    pub fn new(target: &str, provider: Arc<ConnectionProvider>, cache: Arc<ReadCache>) -> Self {
        Self {
            target: target.to_string(),
            provider,
            cache,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Runs a read. Never fails: errors come back as an empty table and a message.
    pub async fn fetch(&self, query: &str, params: &QueryParams) -> Fetched {
        match self.try_fetch(query, params).await {
            Ok(table) => Fetched { table, error: None },
            Err(e) => {
                warn!(target_name = %self.target, error = %e, "Read failed, returning empty table.");
                Fetched {
                    table: Arc::new(Table::empty()),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn try_fetch(&self, query: &str, params: &QueryParams) -> Result<Arc<Table>, DataError> {
        let key = ReadCache::key(&self.target, query, &params.cache_key());
        if let Some(table) = self.cache.get(&key) {
            debug!(target_name = %self.target, "Read served from cache.");
            return Ok(table);
        }

        let pool = self.provider.get_connection(&self.target)?;
        let bound = bind_named(query, params)?;
        let rows = bound
            .to_query()
            .fetch_all(pool.as_ref())
            .await
            .map_err(|e| DataError::ReadFailure(e.to_string()))?;

        let table = Arc::new(Table::from_pg_rows(&rows));
        self.cache.insert(key, table.clone());
        Ok(table)
    }

    /// Runs a write in its own transaction and reports the outcome.
    pub async fn execute(&self, query: &str, params: &QueryParams) -> WriteOutcome {
        match self.try_execute(query, params).await {
            Ok(rows_affected) => {
                info!(target_name = %self.target, rows_affected, "Write committed.");
                WriteOutcome::ok()
            }
            Err(e) => {
                error!(target_name = %self.target, error = %e, "Write failed.");
                WriteOutcome::failed(&e)
            }
        }
    }

    /// Like [`execute`](Self::execute), for writes keyed by primary key: touching no row is a failure.
    pub async fn execute_keyed(&self, query: &str, params: &QueryParams) -> WriteOutcome {
        match self.try_execute(query, params).await {
            Ok(0) => {
                warn!(target_name = %self.target, "Write matched no record.");
                WriteOutcome::no_match()
            }
            Ok(rows_affected) => {
                info!(target_name = %self.target, rows_affected, "Write committed.");
                WriteOutcome::ok()
            }
            Err(e) => {
                error!(target_name = %self.target, error = %e, "Write failed.");
                WriteOutcome::failed(&e)
            }
        }
    }

    /// Commits on success, rolls back on any error. Clears the read cache after a commit.
    pub async fn try_execute(&self, query: &str, params: &QueryParams) -> Result<u64, DataError> {
        let pool = self.provider.get_connection(&self.target)?;
        let bound = bind_named(query, params)?;

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| DataError::WriteFailure(e.to_string()))?;

        let rows_affected = match bound.to_query().execute(&mut *tx).await {
            Ok(result) => result.rows_affected(),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(target_name = %self.target, error = %rollback_err, "Rollback failed.");
                }
                return Err(DataError::WriteFailure(e.to_string()));
            }
        };

        tx.commit()
            .await
            .map_err(|e| DataError::WriteFailure(e.to_string()))?;

        self.cache.clear();
        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn unconfigured() -> DataAccess {
        DataAccess::new(
            "missing_db",
            Arc::new(ConnectionProvider::new(HashMap::new())),
            Arc::new(ReadCache::new(Duration::from_secs(60))),
        )
    }

    #[tokio::test]
    async fn test_fetch_without_connection_returns_empty_table() {
        let access = unconfigured();
        let fetched = access.fetch("SELECT 1", &QueryParams::new()).await;
        assert!(fetched.table.is_empty());
        assert!(fetched.error.unwrap().contains("No database connection"));
    }

    #[tokio::test]
    async fn test_execute_without_connection_reports_failure() {
        let access = unconfigured();
        let outcome = access
            .execute("DELETE FROM t WHERE id = :id", &QueryParams::new().with("id", 1))
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("missing_db"));
    }

    #[tokio::test]
    async fn test_keyed_execute_without_connection_reports_failure() {
        let access = unconfigured();
        let outcome = access
            .execute_keyed("DELETE FROM t WHERE id = :pk", &QueryParams::new().with("pk", 7))
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("missing_db"));
    }

    #[test]
    fn test_no_match_is_not_a_success() {
        let outcome = WriteOutcome::no_match();
        assert!(!outcome.success);
        assert_ne!(outcome.message, WriteOutcome::ok().message);
    }

    #[tokio::test]
    async fn test_fetch_is_served_from_cache() {
        let cache = Arc::new(ReadCache::new(Duration::from_secs(60)));
        let access = DataAccess::new(
            "missing_db",
            Arc::new(ConnectionProvider::new(HashMap::new())),
            cache.clone(),
        );
        let cached = Arc::new(Table::new(vec!["id".into()], vec![vec![serde_json::json!(4)]]));
        cache.insert(ReadCache::key("missing_db", "SELECT id FROM t", ""), cached);

        let fetched = access.fetch("SELECT id FROM t", &QueryParams::new()).await;
        assert!(fetched.is_ok());
        assert_eq!(fetched.table.len(), 1);
    }
}
