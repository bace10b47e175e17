//! Availability probing
//!
//! One HEAD per (provider, message-id). Present and absent are verdicts;
//! everything else is a transient error that must never be classified as
//! missing, or the repair path would re-upload articles the provider still
//! has.

use crate::error::{RefreshError, Result};
use crate::provider::Provider;
use crate::response::codes;

/// Verdict of an availability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The provider returned the article header (2xx)
    Present,
    /// The provider answered 430 No Such Article
    Absent,
}

/// Check whether `message_id` is available on `provider`
///
/// # Errors
///
/// Any response other than 2xx or 430, and any transport failure, is a
/// transient error. The caller excludes the provider from this segment's
/// verdict and leaves its counters untouched.
pub async fn probe(provider: &Provider, message_id: &str) -> Result<ProbeOutcome> {
    let mut conn = provider.acquire().await?;
    let response = conn.head(message_id).await?;

    if response.is_success() {
        Ok(ProbeOutcome::Present)
    } else if response.code == codes::NO_SUCH_ARTICLE_ID {
        Ok(ProbeOutcome::Absent)
    } else {
        Err(RefreshError::Protocol {
            code: response.code,
            message: response.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_is_copy_eq() {
        let outcome = ProbeOutcome::Present;
        let copied = outcome;
        assert_eq!(outcome, copied);
        assert_ne!(ProbeOutcome::Present, ProbeOutcome::Absent);
    }
}
