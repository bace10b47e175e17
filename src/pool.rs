//! Per-provider connection pooling built on bb8

use crate::client::NntpClient;
use crate::config::ProviderConfig;
use crate::error::{RefreshError, Result};
use bb8::{Pool, PooledConnection};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Acquire deadline applied when the provider config leaves `ConnWaitTime`
/// at zero
const DEFAULT_CONN_WAIT: Duration = Duration::from_secs(120);

/// Initial backoff between acquire retries, milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Backoff ceiling, milliseconds
const MAX_BACKOFF_MS: u64 = 10_000;

/// Connection manager: connects and authenticates on behalf of the pool
pub struct NntpConnectionManager {
    config: Arc<ProviderConfig>,
}

impl NntpConnectionManager {
    /// Create a manager for one provider
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl bb8::ManageConnection for NntpConnectionManager {
    type Connection = NntpClient;
    type Error = RefreshError;

    async fn connect(&self) -> Result<Self::Connection> {
        let mut client = NntpClient::connect(self.config.clone()).await?;
        client.authenticate().await?;
        Ok(client)
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<()> {
        if self.config.health_check {
            conn.ping().await
        } else {
            Ok(())
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_broken()
    }
}

/// Connection pool for one provider
///
/// Sized by the provider's `MaxConns`; acquisition waits up to
/// `ConnWaitTime` and retries transient failures up to `MaxConnErrors`
/// times with exponential backoff and jitter. Idle connections are reaped
/// after `IdleTimeout`. Dropping the pool closes its connections.
pub struct NntpPool {
    pool: Pool<NntpConnectionManager>,
    max_conns: u32,
    max_conn_errors: u32,
}

impl NntpPool {
    /// Build the pool for a provider
    ///
    /// # Errors
    ///
    /// Returns an error when the pool cannot be constructed; the run treats
    /// this as a fatal configuration failure.
    pub async fn new(config: Arc<ProviderConfig>) -> Result<Self> {
        let max_conns = config.effective_max_conns();
        let conn_wait = if config.conn_wait_time > 0 {
            Duration::from_secs(config.conn_wait_time)
        } else {
            DEFAULT_CONN_WAIT
        };
        let idle_timeout = (config.idle_timeout > 0)
            .then(|| Duration::from_secs(config.idle_timeout));
        let max_conn_errors = config.max_conn_errors;

        debug!(
            "Creating pool for provider '{}' ({}:{}, max {} conns)",
            config.name, config.host, config.port, max_conns
        );

        let manager = NntpConnectionManager::new(config);
        let pool = Pool::builder()
            .max_size(max_conns)
            .connection_timeout(conn_wait)
            .idle_timeout(idle_timeout)
            .build(manager)
            .await
            .map_err(|e| RefreshError::Config(format!("failed to create pool: {}", e)))?;

        Ok(Self {
            pool,
            max_conns,
            max_conn_errors,
        })
    }

    /// Acquire a connection, retrying transient failures
    ///
    /// The connection is returned to the pool when the guard drops, so
    /// release happens on every exit path of the caller.
    pub async fn get(&self) -> Result<PooledConnection<'_, NntpConnectionManager>> {
        let mut last_error = None;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        for attempt in 0..=self.max_conn_errors {
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    last_error = Some(e);

                    if attempt < self.max_conn_errors {
                        let jitter = rand::thread_rng().gen_range(0..=backoff_ms / 2);
                        let sleep_ms = backoff_ms + jitter;
                        warn!(
                            "Connection acquire failed (attempt {}/{}), retrying in {}ms: {}",
                            attempt + 1,
                            self.max_conn_errors + 1,
                            sleep_ms,
                            last_error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                        );
                        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                        backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                    }
                }
            }
        }

        Err(RefreshError::Other(format!(
            "failed to acquire connection after {} attempts: {}",
            self.max_conn_errors + 1,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Configured connection cap
    pub fn max_conns(&self) -> u32 {
        self.max_conns
    }

    /// Connections the pool has opened over its lifetime cap
    ///
    /// Reported in the end-of-run summary as "connections used".
    pub fn connections_used(&self) -> u32 {
        self.pool.state().connections
    }
}

impl std::fmt::Debug for NntpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NntpPool")
            .field("max_conns", &self.max_conns)
            .field("state", &self.pool.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_provider_list;

    fn config(json: &str) -> Arc<ProviderConfig> {
        Arc::new(parse_provider_list(json).unwrap().remove(0))
    }

    #[test]
    fn test_manager_holds_config() {
        let manager = NntpConnectionManager::new(config(
            r#"[{"Name": "p", "Host": "news.example.com", "Port": 563, "SSL": true}]"#,
        ));
        assert_eq!(manager.config.host, "news.example.com");
        assert_eq!(manager.config.port, 563);
    }

    #[tokio::test]
    async fn test_pool_respects_max_conns_floor() {
        // MaxConns omitted: the pool still gets one connection slot
        let cfg = config(r#"[{"Name": "p", "Host": "127.0.0.1", "Port": 1, "ConnWaitTime": 1}]"#);
        let pool = NntpPool::new(cfg).await.unwrap();
        assert_eq!(pool.max_conns(), 1);
        assert_eq!(pool.connections_used(), 0);
    }

    #[tokio::test]
    async fn test_acquire_fails_against_dead_endpoint() {
        // Port 1 on loopback refuses; acquire must error out, not hang
        let cfg = config(
            r#"[{"Name": "p", "Host": "127.0.0.1", "Port": 1, "MaxConns": 2, "ConnWaitTime": 1}]"#,
        );
        let pool = NntpPool::new(cfg).await.unwrap();
        assert!(pool.get().await.is_err());
    }
}
