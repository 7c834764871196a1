//! Applying one pattern to every chunk of an input.
//!
//! `process_all` tries a single combined call first. When that fails,
//! `process_each` runs the pattern chunk by chunk; failed chunks become
//! inline placeholders and the run always completes with a success count.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use weft_core::{Timestamp, WeftConfig};

use crate::chunker::strip_markers;
use crate::combiner::combine;
use crate::error::EngineError;
use crate::executor::PatternExecutor;
use crate::retry::RetryPolicy;
use crate::session::ChunkSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// One combined call over all chunks.
    All,
    /// One call per chunk.
    Each,
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchMode::All => f.write_str("all"),
            BatchMode::Each => f.write_str("each"),
        }
    }
}

/// Result key of a batch run: `pattern_mode_timestamp`.
pub fn batch_key(pattern: &str, mode: BatchMode, at: Timestamp) -> String {
    format!("{}_{}_{}", pattern, mode, at.as_millis())
}

/// Outcome of one chunk in a per-chunk run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub index: usize,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ChunkOutcome {
    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutcome {
    pub key: String,
    pub pattern: String,
    pub mode: BatchMode,
    pub output: String,
    /// Per-chunk outcomes; empty for a combined run.
    pub chunks: Vec<ChunkOutcome>,
    pub succeeded: usize,
    pub total: usize,
}

impl BatchOutcome {
    /// `"2/3 processed"`.
    pub fn summary(&self) -> String {
        format!("{}/{} processed", self.succeeded, self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Runs a pattern across a chunk set.
pub struct BatchProcessor {
    executor: Arc<PatternExecutor>,
    chunk_policy: RetryPolicy,
    delay: Duration,
}

impl BatchProcessor {
    pub fn new(executor: Arc<PatternExecutor>, config: &WeftConfig) -> Self {
        Self {
            executor,
            chunk_policy: RetryPolicy::batch(&config.retry),
            delay: Duration::from_millis(config.retry.batch_delay_ms),
        }
    }

    /// One combined call over every chunk, falling back to per-chunk calls.
    pub async fn process_all(
        &self,
        chunks: &ChunkSet,
        pattern_name: &str,
    ) -> Result<BatchOutcome, EngineError> {
        self.executor.catalog().require(pattern_name)?;

        let combined = chunks
            .chunks()
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("# Section {}\n\n{}", i + 1, strip_markers(chunk)))
            .collect::<Vec<_>>()
            .join("\n\n");

        match self.executor.apply(pattern_name, &combined).await {
            Ok(output) => {
                info!(pattern = %pattern_name, chunks = chunks.len(), "Combined batch call succeeded");
                Ok(BatchOutcome {
                    key: batch_key(pattern_name, BatchMode::All, Timestamp::now()),
                    pattern: pattern_name.to_string(),
                    mode: BatchMode::All,
                    output,
                    chunks: Vec::new(),
                    succeeded: chunks.len(),
                    total: chunks.len(),
                })
            }
            Err(e @ (EngineError::PatternNotFound(_) | EngineError::NoContent)) => Err(e),
            Err(e) => {
                warn!(pattern = %pattern_name, error = %e, "Combined batch call failed, processing chunks one by one");
                self.process_each(chunks, pattern_name).await
            }
        }
    }

    /// One call per chunk, in order, with a pause between calls.
    pub async fn process_each(
        &self,
        chunks: &ChunkSet,
        pattern_name: &str,
    ) -> Result<BatchOutcome, EngineError> {
        let category = self.executor.catalog().require(pattern_name)?.category;
        let total = chunks.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, chunk) in chunks.chunks().iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = self
                .chunk_policy
                .run("batch chunk", |_| self.executor.apply(pattern_name, chunk))
                .await;
            outcomes.push(match result {
                Ok(output) => ChunkOutcome {
                    index,
                    output: Some(output),
                    error: None,
                },
                Err(e) => {
                    warn!(pattern = %pattern_name, chunk = index + 1, error = %e, "Chunk failed, inserting placeholder");
                    ChunkOutcome {
                        index,
                        output: None,
                        error: Some(e.to_string()),
                    }
                }
            });
        }

        let parts: Vec<String> = outcomes
            .iter()
            .map(|o| match &o.output {
                Some(output) => output.clone(),
                None => placeholder(o.index),
            })
            .collect();
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(pattern = %pattern_name, succeeded, total, "Per-chunk batch finished");

        Ok(BatchOutcome {
            key: batch_key(pattern_name, BatchMode::Each, Timestamp::now()),
            pattern: pattern_name.to_string(),
            mode: BatchMode::Each,
            output: combine(category, &parts),
            chunks: outcomes,
            succeeded,
            total,
        })
    }
}

/// Inline stand-in for a chunk whose retries ran out.
pub fn placeholder(index: usize) -> String {
    format!("[Error processing section {}]", index + 1)
}
