//! Per-user session model.
//!
//! One [`SessionState`] per user holds the original input, its lazily built
//! chunks, every pattern result and what the user currently has selected.
//! It lives in the session store and expires with it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use weft_core::Timestamp;
use weft_patterns::PatternCategory;

use crate::advisor::Suggestion;
use crate::batch::{BatchOutcome, ChunkOutcome};
use crate::chunker::strip_markers;
use crate::error::EngineError;
use crate::flow::FlowState;

// =============================================================================
// ChunkSet
// =============================================================================

/// Non-empty ordered chunks with an in-bounds cursor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkSet")]
pub struct ChunkSet {
    chunks: Vec<String>,
    cursor: usize,
    last_accessed_at: Timestamp,
}

#[derive(Deserialize)]
struct RawChunkSet {
    chunks: Vec<String>,
    cursor: usize,
    last_accessed_at: Timestamp,
}

impl TryFrom<RawChunkSet> for ChunkSet {
    type Error = String;

    fn try_from(raw: RawChunkSet) -> Result<Self, Self::Error> {
        if raw.chunks.is_empty() {
            return Err("chunk set has no chunks".to_string());
        }
        if raw.cursor >= raw.chunks.len() {
            return Err(format!(
                "cursor {} out of bounds for {} chunks",
                raw.cursor,
                raw.chunks.len()
            ));
        }
        Ok(Self {
            chunks: raw.chunks,
            cursor: raw.cursor,
            last_accessed_at: raw.last_accessed_at,
        })
    }
}

impl ChunkSet {
    pub fn new(chunks: Vec<String>) -> Result<Self, EngineError> {
        if chunks.is_empty() {
            return Err(EngineError::NoContent);
        }
        Ok(Self {
            chunks,
            cursor: 0,
            last_accessed_at: Timestamp::now(),
        })
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Set the cursor, clamped to the last chunk.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.chunks.len() - 1);
        self.touch();
    }

    pub fn current(&self) -> &str {
        &self.chunks[self.cursor]
    }

    pub fn last_accessed_at(&self) -> Timestamp {
        self.last_accessed_at
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Timestamp::now();
    }
}

// =============================================================================
// PatternResult
// =============================================================================

/// Output of one pattern run, single-shot or batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    /// Pattern that produced the output (batch keys differ from it).
    pub pattern: String,
    pub output: String,
    pub timestamp: Timestamp,
    /// Display pages, built on first paging.
    #[serde(default)]
    pub chunks: Option<ChunkSet>,
    #[serde(default)]
    pub batch_results: Option<Vec<ChunkOutcome>>,
    /// Result key whose output was the input of this run.
    #[serde(default)]
    pub source_name: Option<String>,
    /// Input chunk this run was applied to.
    #[serde(default)]
    pub source_chunk_index: Option<usize>,
}

impl PatternResult {
    pub fn new(pattern: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            output: output.into(),
            timestamp: Timestamp::now(),
            chunks: None,
            batch_results: None,
            source_name: None,
            source_chunk_index: None,
        }
    }

    pub fn from_batch(outcome: &BatchOutcome) -> Self {
        Self {
            batch_results: Some(outcome.chunks.clone()),
            ..Self::new(outcome.pattern.clone(), outcome.output.clone())
        }
    }

    pub fn with_source(mut self, source: &ContentSource) -> Self {
        self.source_name = source.result_key.clone();
        self.source_chunk_index = source.chunk_index;
        self
    }
}

// =============================================================================
// Selection
// =============================================================================

/// What the next pattern run applies to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Result key whose output is the content; always a key of `results`.
    pub use_processed_output: Option<String>,
    pub selected_input_chunk: Option<usize>,
    pub last_processed_pattern: Option<String>,
}

/// Where selected content came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentSource {
    pub result_key: Option<String>,
    pub chunk_index: Option<usize>,
}

// =============================================================================
// SessionState
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub original_input: String,
    #[serde(default)]
    pub input_chunks: Option<ChunkSet>,
    #[serde(default)]
    pub results: BTreeMap<String, PatternResult>,
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub view: FlowState,
    #[serde(default)]
    pub suggestion: Option<Suggestion>,
    #[serde(default)]
    pub menu_category: Option<PatternCategory>,
    #[serde(default)]
    pub menu_page: usize,
}

impl SessionState {
    pub fn new(original_input: impl Into<String>) -> Self {
        Self {
            original_input: original_input.into(),
            input_chunks: None,
            results: BTreeMap::new(),
            selection: Selection::default(),
            view: FlowState::default(),
            suggestion: None,
            menu_category: None,
            menu_page: 0,
        }
    }

    /// Store a result under `key`, replacing any earlier one, and mark it
    /// as the last processed.
    pub fn record_result(&mut self, key: impl Into<String>, result: PatternResult) {
        let key = key.into();
        self.results.insert(key.clone(), result);
        self.selection.last_processed_pattern = Some(key);
    }

    /// Use result `key` as the content of the next run.
    pub fn select_output(&mut self, key: &str) -> Result<(), EngineError> {
        if !self.results.contains_key(key) {
            return Err(EngineError::InvalidAction(format!("no result named {}", key)));
        }
        self.selection.use_processed_output = Some(key.to_string());
        self.selection.selected_input_chunk = None;
        Ok(())
    }

    /// Use one input chunk as the content of the next run.
    pub fn select_input_chunk(&mut self, index: usize) -> Result<(), EngineError> {
        let len = self.input_chunks.as_ref().map_or(0, ChunkSet::len);
        if index >= len {
            return Err(EngineError::InvalidAction(format!("no input chunk {}", index)));
        }
        self.selection.selected_input_chunk = Some(index);
        self.selection.use_processed_output = None;
        Ok(())
    }

    /// Go back to the whole original input.
    pub fn use_full_input(&mut self) {
        self.selection.use_processed_output = None;
        self.selection.selected_input_chunk = None;
    }

    /// Content the next pattern run applies to, and where it came from.
    pub fn selected_content(&self) -> (String, ContentSource) {
        if let Some(key) = &self.selection.use_processed_output {
            if let Some(result) = self.results.get(key) {
                return (
                    result.output.clone(),
                    ContentSource {
                        result_key: Some(key.clone()),
                        chunk_index: None,
                    },
                );
            }
        }
        if let (Some(index), Some(chunks)) =
            (self.selection.selected_input_chunk, self.input_chunks.as_ref())
        {
            if let Some(chunk) = chunks.chunks().get(index) {
                return (
                    strip_markers(chunk).to_string(),
                    ContentSource {
                        result_key: None,
                        chunk_index: Some(index),
                    },
                );
            }
        }
        (self.original_input.clone(), ContentSource::default())
    }

    /// Pattern name behind result `key`.
    pub fn pattern_of(&self, key: &str) -> Option<&str> {
        self.results.get(key).map(|r| r.pattern.as_str())
    }
}
