//! Provider handle
//!
//! One handle per configured NNTP provider, shared read-only across all
//! workers after setup: the connection pool, the capabilities detected at
//! startup, and the article counters the reconciliation engine increments.

use crate::article::Article;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::pool::{NntpConnectionManager, NntpPool};
use bb8::PooledConnection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Posting-related capabilities detected once at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Server accepts IHAVE (detected, reserved for future delivery path)
    pub ihave: bool,
    /// Server accepts POST; providers without it are skipped as repost
    /// targets
    pub post: bool,
}

/// Monotonic per-provider article counters
///
/// Incremented wait-free from any worker. `checked` only moves for probes
/// that produced a verdict, so `available + missing == checked` once the
/// run is quiescent and no probe errored.
#[derive(Debug, Default)]
pub struct ArticleCounters {
    checked: AtomicU64,
    available: AtomicU64,
    missing: AtomicU64,
    refreshed: AtomicU64,
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Probes that produced a present/absent verdict
    pub checked: u64,
    /// Probes that found the article
    pub available: u64,
    /// Probes that got 430 back
    pub missing: u64,
    /// Articles successfully re-uploaded to this provider
    pub refreshed: u64,
}

impl ArticleCounters {
    /// Record a probe that produced a verdict
    pub fn inc_checked(&self) {
        self.checked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an article found on this provider
    pub fn inc_available(&self) {
        self.available.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an article missing from this provider
    pub fn inc_missing(&self) {
        self.missing.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an article re-uploaded to this provider
    pub fn inc_refreshed(&self) {
        self.refreshed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            checked: self.checked.load(Ordering::Relaxed),
            available: self.available.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
        }
    }
}

/// One configured provider: pool, capabilities, counters
#[derive(Debug)]
pub struct Provider {
    config: Arc<ProviderConfig>,
    pool: NntpPool,
    capabilities: ProviderCapabilities,
    /// Article counters, incremented by the reconciliation engine
    pub counters: ArticleCounters,
}

impl Provider {
    /// Open the pool and detect capabilities for one provider
    ///
    /// # Errors
    ///
    /// Pool construction failure and capability-probe failure are both
    /// configuration errors; the run aborts on either.
    pub async fn connect(config: ProviderConfig) -> Result<Arc<Self>> {
        let config = Arc::new(config);
        let pool = NntpPool::new(config.clone()).await?;
        let capabilities = detect_capabilities(&pool).await?;

        info!(
            "capabilities of '{}': IHAVE: {} | POST: {}",
            config.name, capabilities.ihave, capabilities.post
        );

        Ok(Arc::new(Self {
            config,
            pool,
            capabilities,
            counters: ArticleCounters::default(),
        }))
    }

    /// Provider name from the configuration
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configured connection cap
    pub fn max_conns(&self) -> u32 {
        self.pool.max_conns()
    }

    /// Capabilities detected at startup
    pub fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    /// Acquire a pooled connection; returned to the pool on drop
    pub async fn acquire(&self) -> Result<PooledConnection<'_, NntpConnectionManager>> {
        self.pool.get().await
    }

    /// End-of-run summary line for stdout and the log
    pub fn summary_line(&self) -> String {
        let counters = self.counters.snapshot();
        format!(
            "Results for '{}': checked: {} | available: {} | missing: {} | refreshed: {} | {} connections used",
            self.name(),
            counters.checked,
            counters.available,
            counters.missing,
            counters.refreshed,
            self.pool.connections_used(),
        )
    }
}

/// Detect IHAVE/POST support on a freshly opened pool.
///
/// CAPABILITIES is authoritative when the server implements it. Servers
/// predating RFC 3977 get probed instead: POST and IHAVE are attempted with
/// an empty sentinel article, and only the specific rejection codes (440 for
/// POST, 500 for IHAVE) mean "unsupported". Any other failure is the server
/// objecting to the sentinel, which proves the command is there.
async fn detect_capabilities(pool: &NntpPool) -> Result<ProviderCapabilities> {
    let mut conn = pool.get().await?;

    match conn.capabilities().await {
        Ok(list) => {
            let mut caps = ProviderCapabilities::default();
            for entry in &list {
                let keyword = entry.split_whitespace().next().unwrap_or("");
                if keyword.eq_ignore_ascii_case("ihave") {
                    caps.ihave = true;
                }
                if keyword.eq_ignore_ascii_case("post") {
                    caps.post = true;
                }
            }
            Ok(caps)
        }
        Err(e) => {
            debug!("CAPABILITIES not implemented ({}), probing POST/IHAVE", e);
            let sentinel = Article::default();

            let post = match conn.post(&sentinel).await {
                Ok(()) => true,
                Err(e) => e.status_code() != Some(440),
            };
            let ihave = match conn.ihave("sentinel@invalid", &sentinel).await {
                Ok(()) => true,
                Err(e) => e.status_code() != Some(500),
            };

            Ok(ProviderCapabilities { ihave, post })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = ArticleCounters::default();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.checked, 0);
        assert_eq!(snapshot.available, 0);
        assert_eq!(snapshot.missing, 0);
        assert_eq!(snapshot.refreshed, 0);
    }

    #[test]
    fn test_counter_increments() {
        let counters = ArticleCounters::default();
        counters.inc_checked();
        counters.inc_checked();
        counters.inc_available();
        counters.inc_missing();
        counters.inc_refreshed();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.checked, 2);
        assert_eq!(snapshot.available, 1);
        assert_eq!(snapshot.missing, 1);
        assert_eq!(snapshot.refreshed, 1);
        assert!(snapshot.available + snapshot.missing <= snapshot.checked);
    }

    #[test]
    fn test_counters_concurrent_increment() {
        let counters = Arc::new(ArticleCounters::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counters = counters.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    counters.inc_checked();
                    counters.inc_available();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.checked, 8000);
        assert_eq!(snapshot.available, 8000);
    }

    #[test]
    fn test_capabilities_default_is_neither() {
        let caps = ProviderCapabilities::default();
        assert!(!caps.ihave);
        assert!(!caps.post);
    }
}
