//! Error types

use thiserror::Error;

/// Errors produced while auditing or refreshing a posting
#[derive(Error, Debug)]
pub enum RefreshError {
    /// IO error during network or file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error during secure connection
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection or response timeout
    #[error("Connection timeout")]
    Timeout,

    /// Response line that does not follow the NNTP grammar
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// NNTP error response with status code
    #[error("NNTP error {code}: {message}")]
    Protocol {
        /// Three-digit NNTP status code (e.g., 430, 440, 500)
        code: u16,
        /// Status message from the server
        message: String,
    },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// No article with the requested message-id
    #[error("No such article: {0}")]
    NoSuchArticle(String),

    /// Posting not permitted (status 440)
    #[error("Posting not permitted")]
    PostingNotPermitted,

    /// Posting failed (status 441)
    #[error("Posting failed: {0}")]
    PostingFailed(String),

    /// Article not wanted (IHAVE rejected, status 435)
    #[error("Article not wanted")]
    ArticleNotWanted,

    /// Transfer not possible; try again later (status 436)
    #[error("Transfer not possible: {0}")]
    TransferNotPossible(String),

    /// Transfer rejected; do not retry (status 437)
    #[error("Transfer rejected: {0}")]
    TransferRejected(String),

    /// Connection closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid NZB or provider configuration; aborts the run
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RefreshError {
    /// Three-digit status code of the server response behind this error,
    /// if there is one. The reconciliation engine branches on 430 (no such
    /// article), 440 (posting not permitted) and 500 (command unrecognized).
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RefreshError::Protocol { code, .. } => Some(*code),
            RefreshError::PostingNotPermitted => Some(440),
            RefreshError::PostingFailed(_) => Some(441),
            RefreshError::ArticleNotWanted => Some(435),
            RefreshError::TransferNotPossible(_) => Some(436),
            RefreshError::TransferRejected(_) => Some(437),
            _ => None,
        }
    }
}

/// Result type alias using RefreshError
pub type Result<T> = std::result::Result<T, RefreshError>;
