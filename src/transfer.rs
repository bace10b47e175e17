//! Article fetch and re-upload
//!
//! Both sides of a repair: pull the article from one provider that still
//! has it, push it to one provider that lost it. Both walk their candidate
//! list in order and stop at the first success; a single successful
//! re-upload is enough because peering propagates the article to the
//! remaining missing providers.

use crate::article::Article;
use crate::error::{RefreshError, Result};
use crate::provider::Provider;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetch an article from the first candidate that can deliver it
///
/// Candidates are tried at most once each, in the order given (probe
/// completion order). Per-candidate failures are logged and skipped.
///
/// # Errors
///
/// Terminal error only when every candidate fails.
pub async fn fetch_from_any(candidates: &[Arc<Provider>], message_id: &str) -> Result<Article> {
    for provider in candidates {
        debug!(
            "loading article <{}> from provider '{}'",
            message_id,
            provider.name()
        );
        match fetch_from(provider, message_id).await {
            Ok(article) => return Ok(article),
            Err(e) => {
                warn!(
                    "unable to load article <{}> from provider '{}': {}",
                    message_id,
                    provider.name(),
                    e
                );
            }
        }
    }

    Err(RefreshError::Other(format!(
        "unable to load article <{}> from any provider",
        message_id
    )))
}

async fn fetch_from(provider: &Provider, message_id: &str) -> Result<Article> {
    let mut conn = provider.acquire().await?;
    conn.fetch_article(message_id).await
}

/// Re-upload an article to the first target that accepts it
///
/// Targets without the POST capability are skipped. Each attempt gets its
/// own header-rewritten deep copy, so rewrites are never shared between
/// targets. On success the target's `refreshed` counter moves and the walk
/// stops. A server rejecting an already-present message-id is just another
/// failed attempt: the walk moves on without re-fetching.
///
/// # Errors
///
/// Terminal error only when every target fails (or none was POST-capable).
pub async fn repost_to_any(
    targets: &[Arc<Provider>],
    article: &Article,
    message_id: &str,
) -> Result<()> {
    for (attempt, provider) in targets.iter().enumerate() {
        if !provider.capabilities().post {
            debug!(
                "provider '{}' does not accept POST, skipping for article <{}>",
                provider.name(),
                message_id
            );
            continue;
        }

        let copy = article.prepared_for_post();
        debug!(
            "re-uploading article <{}> to provider '{}' ({}. attempt)",
            message_id,
            provider.name(),
            attempt + 1
        );

        match post_to(provider, &copy).await {
            Ok(()) => {
                provider.counters.inc_refreshed();
                debug!(
                    "article <{}> successfully sent to provider '{}'",
                    message_id,
                    provider.name()
                );
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "error re-uploading article <{}> to provider '{}': {}",
                    message_id,
                    provider.name(),
                    e
                );
            }
        }
    }

    Err(RefreshError::Other(format!(
        "unable to re-upload article <{}> to any provider",
        message_id
    )))
}

async fn post_to(provider: &Provider, article: &Article) -> Result<()> {
    let mut conn = provider.acquire().await?;
    conn.post(article).await
}
