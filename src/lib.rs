#![doc = include_str!("../README.md")]

/// In-memory article representation and the repost header rewrite
pub mod article;
mod client;
/// NNTP command builders and response parsers
pub mod commands;
/// Provider JSON configuration
pub mod config;
mod error;
/// NZB file format parser
pub mod nzb;
mod pool;
/// Availability probing (HEAD classification)
pub mod probe;
/// Run progress counters
pub mod progress;
/// Provider handle: pool, capabilities, counters
pub mod provider;
/// Segment reconciliation engine
pub mod reconcile;
mod response;
/// Per-file availability statistics and CSV export
pub mod stats;
/// Article fetch and re-upload
pub mod transfer;

pub use article::{parse_headers, Article, Headers};
pub use client::NntpClient;
pub use config::{load_provider_list, parse_provider_list, ProviderConfig, DEFAULT_PROVIDER_PATH};
pub use error::{RefreshError, Result};
pub use nzb::{load_nzb_file, parse_nzb, Nzb, NzbFile, NzbSegment};
pub use pool::{NntpConnectionManager, NntpPool};
pub use probe::{probe, ProbeOutcome};
pub use progress::{Progress, UploadProgress};
pub use provider::{ArticleCounters, CounterSnapshot, Provider, ProviderCapabilities};
pub use reconcile::{reconcile_nzb, Run};
pub use response::{codes, NntpBinaryResponse, NntpResponse};
pub use stats::{FileStatistic, RunStatistics};
pub use transfer::{fetch_from_any, repost_to_any};
