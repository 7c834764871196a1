//! Detection of explicit pattern requests in raw user input.
//!
//! Three rule groups are checked in order: an explicit pattern name mention,
//! a fixed phrase list, then a leading intent verb. Rules only look at the
//! leading command of the input, and only fire when the pattern they
//! resolve to exists in the catalog.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::PatternCatalog;

/// Which rule group produced an explicit request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestTrigger {
    NameMention,
    Phrase,
    Intent,
}

/// An explicit request to run a named pattern over some content.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitRequest {
    pub pattern: String,
    /// Text to process. Falls back to the whole input.
    pub content: String,
    pub confidence: f32,
    pub trigger: RequestTrigger,
}

// =============================================================================
// Compiled rule sets (compiled once, reused across calls)
// =============================================================================

static NAME_COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:use|apply|run|with)\s+(?:the\s+)?(?:pattern\s+)?["'`]?([a-z][a-z0-9_]*)["'`]?"#,
    )
    .expect("Invalid name command regex")
});

static BARE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-z][a-z0-9]*(?:_[a-z0-9]+)+)\b").expect("Invalid bare name regex")
});

/// Fixed phrases mapped to a pattern name.
static PHRASES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    let phrases: &[(&str, &str)] = &[
        (r"(?i)\bsummari[sz]e\s+(?:this|that|it|the\s+following)\b", "summarize"),
        (r"(?i)\bgive\s+me\s+a\s+summary\b", "summarize"),
        (r"(?i)\btl;?dr\b", "summarize"),
        (r"(?i)\bextract\s+(?:the\s+)?wisdom\b", "extract_wisdom"),
        (r"(?i)\b(?:key|main)\s+insights\b", "extract_insights"),
        (r"(?i)\baction\s+items\b", "extract_action_items"),
        (r"(?i)\bfact[\s-]?check\b", "analyze_claims"),
        (r"(?i)\bcheck\s+(?:the\s+)?claims\b", "analyze_claims"),
        (r"(?i)\bimprove\s+(?:my|this|the)\s+writing\b", "improve_writing"),
        (r"(?i)\bexplain\s+(?:this|the)\s+code\b", "explain_code"),
        (r"(?i)\btranslate\s+(?:this|it)\b", "translate"),
    ];
    phrases
        .iter()
        .map(|(p, name)| (Regex::new(p).expect("Invalid phrase regex"), *name))
        .collect()
});

/// Leading intent verb; the captured verb names a pattern family.
static INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:please\s+)?(summari[sz]e|analy[sz]e|extract|improve|explain|translate)\b")
        .expect("Invalid intent regex")
});

/// Content after a command line ending in a colon.
static COLON_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^[^:\n]{0,160}:\s*(.+)$").expect("Invalid colon content regex")
});

/// A fenced or quoted block.
static QUOTED_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)```[a-zA-Z]*\n?(.+?)```|"([^"]{20,})""#).expect("Invalid quoted content regex")
});

/// Everything after the first line.
static TRAILING_LINES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^[^\n]*\n+(.+)$").expect("Invalid trailing lines regex")
});

const NAME_COMMAND_CONFIDENCE: f32 = 0.98;
const BARE_NAME_CONFIDENCE: f32 = 0.97;
const PHRASE_CONFIDENCE: f32 = 0.96;
const INTENT_CONFIDENCE: f32 = 0.95;

/// Longest leading command still treated as a possible request.
pub const MAX_COMMAND_CHARS: usize = 160;

// =============================================================================
// RequestDetector
// =============================================================================

/// Rule-based detector of explicit pattern requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestDetector;

impl RequestDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect an explicit request for a pattern present in `catalog`.
    ///
    /// Only the leading command is inspected: the first line, up to its
    /// first `:`, and at most [`MAX_COMMAND_CHARS`] long. Content that merely
    /// mentions a pattern or phrase further in is not a request.
    pub fn detect(&self, input: &str, catalog: &PatternCatalog) -> Option<ExplicitRequest> {
        if catalog.is_empty() {
            return None;
        }
        let command = command_segment(input)?;

        if let Some(name) = self.name_mention(command, catalog) {
            let confidence = if NAME_COMMAND_RE.is_match(command) {
                NAME_COMMAND_CONFIDENCE
            } else {
                BARE_NAME_CONFIDENCE
            };
            return Some(self.build(input, name, confidence, RequestTrigger::NameMention));
        }

        for (re, name) in PHRASES.iter() {
            if re.is_match(command) && catalog.contains(name) {
                return Some(self.build(
                    input,
                    (*name).to_string(),
                    PHRASE_CONFIDENCE,
                    RequestTrigger::Phrase,
                ));
            }
        }

        if let Some(caps) = INTENT_RE.captures(command) {
            let verb = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
            let family = normalize_verb(&verb);
            if let Some(pattern) = catalog.family_fallback(family) {
                return Some(self.build(
                    input,
                    pattern.name.clone(),
                    INTENT_CONFIDENCE,
                    RequestTrigger::Intent,
                ));
            }
        }

        None
    }

    /// Extract the content to process from an explicit request.
    ///
    /// Tries, in order: text after a leading command ending in `:`, a fenced
    /// or quoted block, the lines after the first. Falls back to the whole
    /// input.
    pub fn extract_content(&self, input: &str) -> String {
        let candidates = [
            COLON_CONTENT_RE
                .captures(input)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
            QUOTED_CONTENT_RE
                .captures(input)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str()),
            TRAILING_LINES_RE
                .captures(input)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
        ];

        candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(input)
            .to_string()
    }

    fn name_mention(&self, input: &str, catalog: &PatternCatalog) -> Option<String> {
        for caps in NAME_COMMAND_RE.captures_iter(input) {
            if let Some(name) = caps.get(1).map(|m| m.as_str().to_lowercase()) {
                if catalog.contains(&name) {
                    return Some(name);
                }
            }
        }
        BARE_NAME_RE
            .captures_iter(input)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .find(|name| catalog.contains(name))
            .map(str::to_string)
    }

    fn build(
        &self,
        input: &str,
        pattern: String,
        confidence: f32,
        trigger: RequestTrigger,
    ) -> ExplicitRequest {
        ExplicitRequest {
            pattern,
            content: self.extract_content(input),
            confidence,
            trigger,
        }
    }
}

/// The part of `input` a request must appear in, if short enough to be one.
fn command_segment(input: &str) -> Option<&str> {
    let first_line = input.trim_start().lines().next()?;
    let command = first_line.split(':').next().unwrap_or(first_line).trim();
    if command.is_empty() || command.chars().count() > MAX_COMMAND_CHARS {
        return None;
    }
    Some(command)
}

fn normalize_verb(verb: &str) -> &str {
    match verb {
        "summarise" => "summarize",
        "analyse" => "analyze",
        other => other,
    }
}

// =============================================================================
// Tests
// =============================================================================
