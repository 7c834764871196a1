//! Boundary-aware text splitting.
//!
//! `split` prepares oversized input for the backend and marks continuation
//! between parts; `split_for_display` pages output for a size-bounded
//! delivery channel without markers. Both count characters, not bytes, and
//! never drop or trim text at a cut.

use std::sync::LazyLock;

use regex::Regex;
use weft_core::config::ChunkingConfig;

pub const DEFAULT_INPUT_CHUNK_SIZE: usize = 3800;
pub const DEFAULT_DISPLAY_CHUNK_SIZE: usize = 4000;

/// Suffix of every marked chunk but the last.
pub const TO_BE_CONTINUED: &str = "\n\n[TO BE CONTINUED]";

/// Smallest marked chunk size; leaves room for both markers and some body.
const MIN_MARKED_SIZE: usize = 64;

// How far back from the limit each boundary kind is searched.
const PARAGRAPH_WINDOW: usize = 500;
const SENTENCE_WINDOW: usize = 200;
const WORD_WINDOW: usize = 50;

static CONTINUATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[CONTINUATION - PART \d+\]\n\n").expect("Invalid continuation marker regex")
});

/// Prefix of marked chunk number `part` (1-based, first chunk has none).
pub fn continuation_prefix(part: usize) -> String {
    format!("[CONTINUATION - PART {}]\n\n", part)
}

/// Split `input` into marked chunks of at most `max_size` characters.
///
/// Input that already fits is returned unchanged as a single chunk. Every
/// chunk after the first starts with [`continuation_prefix`]; every chunk but
/// the last ends with [`TO_BE_CONTINUED`]. Markers count toward `max_size`.
/// Sizes below 64 are raised to 64.
pub fn split(input: &str, max_size: usize) -> Vec<String> {
    if char_len(input) <= max_size {
        return vec![input.to_string()];
    }

    let max_size = max_size.max(MIN_MARKED_SIZE);
    let suffix_len = TO_BE_CONTINUED.len();
    let mut chunks: Vec<String> = Vec::new();
    let mut rest = input;

    loop {
        let part = chunks.len() + 1;
        let prefix = if part == 1 {
            String::new()
        } else {
            continuation_prefix(part)
        };

        if prefix.len() + char_len(rest) <= max_size {
            chunks.push(format!("{}{}", prefix, rest));
            break;
        }

        let body_limit = max_size.saturating_sub(prefix.len() + suffix_len).max(1);
        let cut = find_cut(rest, body_limit);
        chunks.push(format!("{}{}{}", prefix, &rest[..cut], TO_BE_CONTINUED));
        rest = &rest[cut..];
    }

    chunks
}

/// Split `output` into unmarked pages of at most `max_size` characters.
pub fn split_for_display(output: &str, max_size: usize) -> Vec<String> {
    let max_size = max_size.max(1);
    if char_len(output) <= max_size {
        return vec![output.to_string()];
    }

    let mut pages = Vec::new();
    let mut rest = output;
    while char_len(rest) > max_size {
        let cut = find_cut(rest, max_size);
        pages.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    pages.push(rest.to_string());
    pages
}

/// Remove continuation markers from one chunk, wherever it sat.
pub fn strip_markers(chunk: &str) -> &str {
    let body = match CONTINUATION_RE.find(chunk) {
        Some(m) => &chunk[m.end()..],
        None => chunk,
    };
    body.strip_suffix(TO_BE_CONTINUED).unwrap_or(body)
}

/// Rebuild the original input from the output of [`split`].
///
/// Markers are removed by position, so text that happens to look like a
/// marker survives.
pub fn reassemble(chunks: &[String]) -> String {
    let last = chunks.len().saturating_sub(1);
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let mut body = chunk.as_str();
        if i > 0 {
            body = body
                .strip_prefix(continuation_prefix(i + 1).as_str())
                .unwrap_or(body);
        }
        if i < last {
            body = body.strip_suffix(TO_BE_CONTINUED).unwrap_or(body);
        }
        out.push_str(body);
    }
    out
}

/// Chunk sizes bound to one configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunker {
    pub input_size: usize,
    pub display_size: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            input_size: config.input_chunk_size,
            display_size: config.display_chunk_size,
        }
    }

    pub fn split(&self, input: &str) -> Vec<String> {
        split(input, self.input_size)
    }

    pub fn split_for_display(&self, output: &str) -> Vec<String> {
        split_for_display(output, self.display_size)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_CHUNK_SIZE,
            display_size: DEFAULT_DISPLAY_CHUNK_SIZE,
        }
    }
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `chars`-th character, or the end of `s`.
fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

/// Byte length of the next chunk of `text`, which is longer than `limit` chars.
///
/// Scans backward from the limit for a paragraph break, then a sentence
/// break, then whitespace, each within its own window. The break stays with
/// the earlier chunk. Falls back to cutting exactly at the limit.
fn find_cut(text: &str, limit: usize) -> usize {
    let limit_byte = byte_offset(text, limit);
    let window = &text[..limit_byte];
    let floor = |back: usize| byte_offset(text, limit.saturating_sub(back));

    let from = floor(PARAGRAPH_WINDOW);
    if let Some(i) = window[from..].rfind("\n\n") {
        return from + i + 2;
    }

    let from = floor(SENTENCE_WINDOW);
    if let Some(i) = window[from..].rfind(". ") {
        return from + i + 2;
    }

    let from = floor(WORD_WINDOW);
    if let Some((i, c)) = window[from..]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
    {
        return from + i + c.len_utf8();
    }

    limit_byte
}
