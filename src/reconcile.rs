//! Segment reconciliation engine
//!
//! The heart of the tool: for every segment of the NZB, ask every provider
//! whether it still has the article, and when some providers lost it, pull
//! it from one that didn't and push it back to one that did. Segments flow
//! through a bounded queue into a fixed worker pool; re-uploads run as
//! detached tasks joined at the end so slow body transfers never stall the
//! probe pipeline.

use crate::nzb::Nzb;
use crate::probe::{probe, ProbeOutcome};
use crate::progress::Progress;
use crate::provider::Provider;
use crate::stats::RunStatistics;
use crate::transfer::{fetch_from_any, repost_to_any};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Worker tasks per connection of the largest pool.
///
/// HEAD round-trips are short next to connection setup, so the sweet spot
/// is well above one worker per connection. Tuning knob, not semantics.
const WORKERS_PER_CONN: u32 = 4;

/// Queue slots per connection of the largest pool
const QUEUE_SLOTS_PER_CONN: u32 = 8;

/// Everything a worker needs, assembled once at startup
///
/// Shared read-only across workers; all mutation goes through atomics or
/// the mutexes inside the statistics and progress types.
#[derive(Debug)]
pub struct Run {
    /// All configured providers, pools open and capabilities detected
    pub providers: Vec<Arc<Provider>>,
    /// Per-file availability statistics
    pub stats: Arc<RunStatistics>,
    /// Segment/upload progress counters
    pub progress: Arc<Progress>,
    /// Probe only; never fetch or re-upload
    pub check_only: bool,
}

/// One unit of work: a segment and the file it belongs to
#[derive(Debug, Clone)]
struct SegmentItem {
    message_id: String,
    file_name: String,
}

/// Largest configured pool size across providers; sizes the worker pool
/// and the queue
pub fn aggregate_max_conns(providers: &[Arc<Provider>]) -> u32 {
    providers
        .iter()
        .map(|p| p.max_conns())
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Drive the reconciliation of a whole NZB to quiescence
///
/// Enqueues every segment of every file in NZB order, bounded by the queue
/// for backpressure; waits for the queue to drain and all workers to go
/// idle, then for every in-flight re-upload, in that order. Per-segment
/// errors are logged and swallowed; this function only returns once
/// everything the run started has finished.
pub async fn reconcile_nzb(run: Arc<Run>, nzb: &Nzb) {
    let max_conns = aggregate_max_conns(&run.providers);
    let queue_capacity = (QUEUE_SLOTS_PER_CONN * max_conns) as usize;
    let worker_count = (WORKERS_PER_CONN * max_conns) as usize;

    debug!(
        "reconciling {} segments with {} workers (queue {})",
        nzb.total_segments(),
        worker_count,
        queue_capacity
    );

    let (tx, rx) = mpsc::channel::<SegmentItem>(queue_capacity);
    let rx = Arc::new(Mutex::new(rx));
    let uploads: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>> =
        Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let run = run.clone();
        let rx = rx.clone();
        let uploads = uploads.clone();
        workers.push(tokio::spawn(async move {
            loop {
                // One dequeue at a time; the lock is released before the
                // segment is processed so workers run concurrently
                let item = { rx.lock().await.recv().await };
                match item {
                    Some(item) => reconcile_segment(&run, item, &uploads).await,
                    None => break,
                }
            }
        }));
    }

    'enqueue: for file in &nzb.files {
        for segment in &file.segments {
            let item = SegmentItem {
                message_id: segment.message_id.clone(),
                file_name: file.filename.clone(),
            };
            if tx.send(item).await.is_err() {
                // All workers gone; nothing left to feed
                break 'enqueue;
            }
        }
    }
    drop(tx);

    for worker in workers {
        if let Err(e) = worker.await {
            error!("segment worker failed: {}", e);
        }
    }

    let upload_handles = {
        let mut uploads = uploads.lock().expect("upload tracker mutex poisoned");
        std::mem::take(&mut *uploads)
    };
    for handle in upload_handles {
        if let Err(e) = handle.await {
            error!("upload task failed: {}", e);
        }
    }
}

/// Reconcile one segment across all providers
async fn reconcile_segment(
    run: &Arc<Run>,
    item: SegmentItem,
    uploads: &Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
) {
    // Fan out one probe per provider and join them all before partitioning
    let mut probes = Vec::with_capacity(run.providers.len());
    for provider in &run.providers {
        let provider = provider.clone();
        let message_id = item.message_id.clone();
        let handle = tokio::spawn(async move {
            let outcome = probe(&provider, &message_id).await;
            (provider, outcome)
        });
        probes.push(handle);
    }

    let mut available_on = Vec::new();
    let mut missing_on = Vec::new();
    for handle in probes {
        let (provider, outcome) = match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("probe task for article <{}> failed: {}", item.message_id, e);
                continue;
            }
        };
        match outcome {
            Ok(ProbeOutcome::Present) => {
                provider.counters.inc_checked();
                provider.counters.inc_available();
                run.stats
                    .record_available(&item.file_name, provider.name());
                available_on.push(provider);
            }
            Ok(ProbeOutcome::Absent) => {
                provider.counters.inc_checked();
                provider.counters.inc_missing();
                missing_on.push(provider);
            }
            // Transient: the provider joins neither partition and its
            // counters stay put for this segment
            Err(e) => {
                warn!(
                    "unable to check article <{}> on provider '{}': {}",
                    item.message_id,
                    provider.name(),
                    e
                );
            }
        }
    }

    if !run.check_only && !missing_on.is_empty() {
        debug!(
            "article <{}> is missing on at least one provider",
            item.message_id
        );
        if available_on.is_empty() {
            warn!(
                "article <{}> is missing on all providers",
                item.message_id
            );
        } else {
            run.progress.upload_scheduled();
            match fetch_from_any(&available_on, &item.message_id).await {
                Err(e) => {
                    warn!("{}", e);
                    run.progress.upload_finished();
                }
                Ok(article) => {
                    // Reposts run detached; the segment pipeline never
                    // blocks on body transfer
                    let progress = run.progress.clone();
                    let message_id = item.message_id.clone();
                    let handle = tokio::spawn(async move {
                        if repost_to_any(&missing_on, &article, &message_id)
                            .await
                            .is_err()
                        {
                            // Missing side failed entirely; park the article
                            // on a provider that already has it rather than
                            // lose the fetch
                            if let Err(e) =
                                repost_to_any(&available_on, &article, &message_id).await
                            {
                                error!("{}", e);
                            }
                        }
                        progress.upload_finished();
                    });
                    uploads
                        .lock()
                        .expect("upload tracker mutex poisoned")
                        .push(handle);
                }
            }
        }
    }

    run.progress.segment_done();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_max_conns_empty() {
        assert_eq!(aggregate_max_conns(&[]), 1);
    }

    #[test]
    fn test_worker_and_queue_sizing() {
        // The multipliers are tuning knobs; what matters is that both scale
        // with the largest pool and never reach zero
        let max_conns = 5u32;
        assert_eq!(WORKERS_PER_CONN * max_conns, 20);
        assert_eq!(QUEUE_SLOTS_PER_CONN * max_conns, 40);
        assert!(WORKERS_PER_CONN >= 1);
        assert!(QUEUE_SLOTS_PER_CONN >= 1);
    }
}
