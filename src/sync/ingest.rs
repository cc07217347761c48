//! Chunked bulk ingestion.
//!
//! Candidates are split into fixed-size chunks sent strictly one after
//! another. A chunk that fails counts every paper in it as failed and the
//! run moves on to the next chunk; only cancellation stops a run early.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::LibraryApi;
use crate::models::Paper;

/// Papers per bulk request unless configured otherwise
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Above this many candidates the confirmation mentions the batch count
const LARGE_BATCH_THRESHOLD: usize = 500;

/// Number of chunks needed for `total` papers
pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    total.div_ceil(chunk_size.max(1))
}

/// Prompt shown before an "add all" run
pub fn confirmation_message(candidates: usize, chunk_size: usize) -> String {
    let noun = if candidates == 1 { "paper" } else { "papers" };
    let mut message = format!("{} {} will be added to your library.", candidates, noun);
    if candidates > LARGE_BATCH_THRESHOLD {
        message.push_str(&format!(
            " They will be sent in {} batches, which may take a while.",
            chunk_count(candidates, chunk_size)
        ));
    }
    message.push_str(" Continue?");
    message
}

/// How a single chunk ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkOutcome {
    Sent {
        added: u32,
        duplicates: u32,
        failed: u32,
    },
    Failed {
        papers: u32,
        error: String,
    },
}

/// Progress notifications emitted during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// Chunk `chunk` (1-based) is about to be sent
    ChunkStarted {
        chunk: usize,
        total_chunks: usize,
        size: usize,
    },
    ChunkFinished {
        chunk: usize,
        total_chunks: usize,
        outcome: ChunkOutcome,
    },
}

/// Totals for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub added: u32,
    pub duplicates: u32,
    pub failed: u32,
    pub total_chunks: usize,
    /// Chunks that were actually sent, successful or not
    pub chunks_sent: usize,
    pub failed_chunks: usize,
    pub cancelled: bool,
    /// External ids known to be in the library after this run
    #[serde(default)]
    pub saved_ids: Vec<String>,
}

impl IngestSummary {
    /// Human-readable one-liner, e.g. `3 added, 2 failed`
    pub fn message(&self) -> String {
        let mut parts = Vec::new();
        if self.added > 0 {
            parts.push(format!("{} added", self.added));
        }
        if self.duplicates > 0 {
            parts.push(format!("{} already saved", self.duplicates));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }

        let mut message = if parts.is_empty() {
            "Done".to_string()
        } else {
            parts.join(", ")
        };
        if self.cancelled {
            message.push_str(" (cancelled)");
        }
        message
    }

    fn record(&mut self, outcome: &ChunkOutcome) {
        self.chunks_sent += 1;
        match outcome {
            ChunkOutcome::Sent {
                added,
                duplicates,
                failed,
            } => {
                self.added += added;
                self.duplicates += duplicates;
                self.failed += failed;
            }
            ChunkOutcome::Failed { papers, .. } => {
                self.failed += papers;
                self.failed_chunks += 1;
            }
        }
    }
}

/// Send `papers` in chunks of `chunk_size`, one request at a time.
///
/// Totals accumulate into `summary` after every chunk, so a caller whose
/// future is dropped mid-run still holds the counts of the chunks that
/// finished. `cancel` is checked before each chunk. Saved ids are collected
/// only from chunks the service accepted without per-item failures.
pub async fn run_chunks(
    api: &dyn LibraryApi,
    papers: &[Paper],
    search_query: &str,
    chunk_size: usize,
    cancel: &CancellationToken,
    summary: &mut IngestSummary,
    progress: impl Fn(IngestEvent),
) {
    let chunk_size = chunk_size.max(1);
    let total_chunks = chunk_count(papers.len(), chunk_size);
    summary.total_chunks = total_chunks;

    for (index, chunk) in papers.chunks(chunk_size).enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(
                "Ingestion cancelled after {}/{} chunks",
                index,
                total_chunks
            );
            summary.cancelled = true;
            break;
        }

        let number = index + 1;
        progress(IngestEvent::ChunkStarted {
            chunk: number,
            total_chunks,
            size: chunk.len(),
        });

        let outcome = match api.ingest_batch(chunk, search_query).await {
            Ok(response) => {
                if response.failed_count == 0 {
                    summary.saved_ids.extend(
                        chunk
                            .iter()
                            .filter_map(|p| p.external_id.clone())
                            .filter(|id| !id.is_empty()),
                    );
                }
                tracing::debug!(
                    "Chunk {}/{}: {} added, {} duplicates, {} failed",
                    number,
                    total_chunks,
                    response.added_count,
                    response.duplicate_count,
                    response.failed_count
                );
                ChunkOutcome::Sent {
                    added: response.added_count,
                    duplicates: response.duplicate_count,
                    failed: response.failed_count,
                }
            }
            Err(e) => {
                tracing::warn!("Chunk {}/{} failed: {}", number, total_chunks, e);
                ChunkOutcome::Failed {
                    papers: chunk.len() as u32,
                    error: e.to_string(),
                }
            }
        };

        summary.record(&outcome);
        progress(IngestEvent::ChunkFinished {
            chunk: number,
            total_chunks,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{make_paper, make_papers};
    use crate::client::MockLibraryApi;
    use std::sync::Mutex;

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0, 100), 0);
        assert_eq!(chunk_count(1, 100), 1);
        assert_eq!(chunk_count(100, 100), 1);
        assert_eq!(chunk_count(250, 100), 3);
        assert_eq!(chunk_count(5, 0), 5);
    }

    #[test]
    fn test_summary_message() {
        let summary = IngestSummary {
            added: 3,
            failed: 2,
            ..Default::default()
        };
        assert_eq!(summary.message(), "3 added, 2 failed");

        let summary = IngestSummary {
            duplicates: 4,
            cancelled: true,
            ..Default::default()
        };
        assert_eq!(summary.message(), "4 already saved (cancelled)");

        assert_eq!(IngestSummary::default().message(), "Done");
    }

    #[test]
    fn test_confirmation_message_mentions_batches_for_large_runs() {
        let small = confirmation_message(120, 100);
        assert!(small.starts_with("120 papers will be added"));
        assert!(!small.contains("batches"));

        let large = confirmation_message(501, 100);
        assert!(large.contains("6 batches"));
    }

    #[tokio::test]
    async fn test_failed_chunk_counts_whole_chunk() {
        let api = MockLibraryApi::new();
        api.fail_bulk_call(2);
        let papers = make_papers("c", 250);

        let mut summary = IngestSummary::default();
        run_chunks(
            &api,
            &papers,
            "graphs",
            100,
            &CancellationToken::new(),
            &mut summary,
            |_| {},
        )
        .await;

        let sizes: Vec<usize> = api.bulk_calls().iter().map(|c| c.papers.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(summary.added, 150);
        assert_eq!(summary.failed, 100);
        assert_eq!(summary.failed_chunks, 1);
        assert_eq!(summary.chunks_sent, 3);
        assert_eq!(summary.saved_ids.len(), 150);
        assert!(!summary.saved_ids.contains(&"10.1000/c.150".to_string()));
        assert!(api.bulk_calls().iter().all(|c| c.search_query == "graphs"));
    }

    #[tokio::test]
    async fn test_progress_reported_per_chunk() {
        let api = MockLibraryApi::new();
        let papers = make_papers("p", 120);
        let events = Mutex::new(Vec::new());

        let mut summary = IngestSummary::default();
        run_chunks(
            &api,
            &papers,
            "q",
            50,
            &CancellationToken::new(),
            &mut summary,
            |e| events.lock().unwrap().push(e),
        )
        .await;

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[0],
            IngestEvent::ChunkStarted {
                chunk: 1,
                total_chunks: 3,
                size: 50
            }
        );
        assert!(matches!(
            events[5],
            IngestEvent::ChunkFinished {
                chunk: 3,
                total_chunks: 3,
                outcome: ChunkOutcome::Sent { added: 20, .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_between_chunks() {
        let api = MockLibraryApi::new();
        let papers = make_papers("x", 300);
        let cancel = CancellationToken::new();

        let mut summary = IngestSummary::default();
        run_chunks(&api, &papers, "q", 100, &cancel, &mut summary, |e| {
            if let IngestEvent::ChunkFinished { chunk: 1, .. } = e {
                cancel.cancel();
            }
        })
        .await;

        assert_eq!(api.bulk_calls().len(), 1);
        assert!(summary.cancelled);
        assert_eq!(summary.added, 100);
        assert_eq!(summary.total_chunks, 3);
        assert_eq!(summary.chunks_sent, 1);
    }

    #[tokio::test]
    async fn test_duplicates_are_reported() {
        let api = MockLibraryApi::new();
        api.set_saved(["10.1/a"]);
        let papers = vec![make_paper("a", Some("10.1/a")), make_paper("b", Some("10.1/b"))];

        let mut summary = IngestSummary::default();
        run_chunks(
            &api,
            &papers,
            "q",
            100,
            &CancellationToken::new(),
            &mut summary,
            |_| {},
        )
        .await;

        assert_eq!(summary.added, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.message(), "1 added, 1 already saved");
    }
}
