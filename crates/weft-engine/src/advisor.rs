//! Pattern suggestion.
//!
//! An explicit request in the input ("use extract_wisdom", "summarize this")
//! is executed straight away. Anything else goes through two backend calls:
//! one classifies the input, the next picks a pattern from the catalog. The
//! picked name is validated against the catalog before it is offered.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use weft_patterns::{ExplicitRequest, PatternCatalog, RequestDetector};

use crate::backend::ChatMessage;
use crate::error::EngineError;
use crate::executor::PatternExecutor;

/// Characters of input shown to the backend when choosing a pattern.
const SAMPLE_CHARS: usize = 2000;

static JSON_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("Invalid JSON fence regex")
});

/// How the input reached the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    #[default]
    Chat,
    Command,
    Transcript,
    Document,
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InteractionType::Chat => "chat message",
            InteractionType::Command => "explicit command",
            InteractionType::Transcript => "voice transcript",
            InteractionType::Document => "uploaded document",
        };
        f.write_str(s)
    }
}

/// Input characteristics from the classification call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Characteristics {
    pub content_type: String,
    pub complexity: String,
    pub format: String,
    pub intent: String,
}

impl Default for Characteristics {
    fn default() -> Self {
        Self {
            content_type: "unknown".to_string(),
            complexity: "unknown".to_string(),
            format: "unknown".to_string(),
            intent: "unknown".to_string(),
        }
    }
}

/// A pattern offered to the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedSuggestion {
    pub pattern: String,
    pub confidence: f32,
    pub reasoning: String,
    pub alternatives: Vec<String>,
    /// Name the backend chose when it was replaced by a same-family pattern.
    #[serde(default)]
    pub fallback_from: Option<String>,
}

/// An explicit request that was executed on the spot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutedSuggestion {
    pub pattern: String,
    pub confidence: f32,
    pub content: String,
    pub output: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    Ranked(RankedSuggestion),
    Executed(ExecutedSuggestion),
}

impl Suggestion {
    pub fn pattern(&self) -> &str {
        match self {
            Suggestion::Ranked(r) => &r.pattern,
            Suggestion::Executed(e) => &e.pattern,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Suggestion::Ranked(r) => r.confidence,
            Suggestion::Executed(e) => e.confidence,
        }
    }
}

/// Ranking reply as the backend writes it.
#[derive(Debug, Deserialize)]
struct RankingReply {
    pattern: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
    #[serde(rename = "alternativePatterns", alias = "alternatives", default)]
    alternatives: Vec<String>,
}

/// Suggests patterns for raw input.
pub struct PatternAdvisor {
    executor: Arc<PatternExecutor>,
    detector: RequestDetector,
}

impl PatternAdvisor {
    pub fn new(executor: Arc<PatternExecutor>) -> Self {
        Self {
            executor,
            detector: RequestDetector::new(),
        }
    }

    /// Suggest a pattern for `input`, or run it if the input asks for one.
    ///
    /// Returns `Ok(None)` when the catalog is empty or no valid pattern could
    /// be chosen. Only failures of an explicitly requested run are errors.
    pub async fn suggest(
        &self,
        input: &str,
        context: Option<&str>,
        interaction: InteractionType,
    ) -> Result<Option<Suggestion>, EngineError> {
        let catalog = self.executor.catalog();
        if catalog.is_empty() {
            debug!("Pattern catalog empty, suggestion disabled");
            return Ok(None);
        }
        if input.trim().is_empty() {
            return Ok(None);
        }

        if let Some(request) = self.detector.detect(input, catalog) {
            return self.execute_request(request).await.map(Some);
        }

        let characteristics = self.classify(input).await;
        let reply = match self.rank(input, context, interaction, &characteristics).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Pattern ranking failed");
                return Ok(None);
            }
        };
        Ok(validate_reply(reply, catalog).map(Suggestion::Ranked))
    }

    async fn execute_request(&self, request: ExplicitRequest) -> Result<Suggestion, EngineError> {
        info!(
            pattern = %request.pattern,
            trigger = ?request.trigger,
            confidence = request.confidence,
            "Explicit pattern request"
        );
        let output = self
            .executor
            .apply_large_with_retry(&request.pattern, &request.content)
            .await?;
        Ok(Suggestion::Executed(ExecutedSuggestion {
            pattern: request.pattern,
            confidence: request.confidence,
            content: request.content,
            output,
        }))
    }

    /// First call: describe the input. Failures degrade to unknown traits.
    async fn classify(&self, input: &str) -> Characteristics {
        let messages = [
            ChatMessage::system(
                "You classify text before it is processed. Reply with a JSON object only, \
                 with string fields contentType (e.g. article, transcript, code, notes, \
                 story, claim), complexity (low, medium or high), format (prose, list, \
                 dialogue, code, mixed) and intent (what the author most likely wants).",
            ),
            ChatMessage::user(sample(input)),
        ];

        let parsed = match self.executor.complete(&messages).await {
            Ok(reply) => parse_json::<Characteristics>(&reply),
            Err(e) => Err(e.to_string()),
        };
        parsed.unwrap_or_else(|reason| {
            warn!(reason = %reason, "Input classification failed");
            Characteristics::default()
        })
    }

    /// Second call: choose a pattern from the catalog.
    async fn rank(
        &self,
        input: &str,
        context: Option<&str>,
        interaction: InteractionType,
        characteristics: &Characteristics,
    ) -> Result<RankingReply, String> {
        let system = format!(
            "You choose the single best text-processing pattern for the user's input. \
             Available patterns:\n{}\n\nReply with a JSON object only: \
             {{\"pattern\": \"<name>\", \"confidence\": <0..1>, \"reasoning\": \"<one sentence>\", \
             \"alternativePatterns\": [\"<name>\", ...]}}. Use only names from the list.",
            self.executor.catalog().describe_for_prompt()
        );
        let user = format!(
            "Interaction: {}\nContent type: {}\nComplexity: {}\nFormat: {}\nIntent: {}\nContext: {}\n\nInput:\n{}",
            interaction,
            characteristics.content_type,
            characteristics.complexity,
            characteristics.format,
            characteristics.intent,
            context.unwrap_or("none"),
            sample(input)
        );

        let reply = self
            .executor
            .complete(&[ChatMessage::system(system), ChatMessage::user(user)])
            .await
            .map_err(|e| e.to_string())?;
        parse_json(&reply)
    }
}

/// Check the chosen name against the catalog, falling back within its family.
fn validate_reply(reply: RankingReply, catalog: &PatternCatalog) -> Option<RankedSuggestion> {
    let chosen = reply.pattern.trim().to_string();
    let (pattern, fallback_from) = if catalog.contains(&chosen) {
        (chosen, None)
    } else if let Some(fallback) = catalog.family_fallback(&chosen) {
        warn!(
            suggested = %chosen,
            fallback = %fallback.name,
            "Suggested pattern not in catalog, using same-family pattern"
        );
        (fallback.name.clone(), Some(chosen))
    } else {
        warn!(suggested = %chosen, "Suggested pattern not in catalog, discarding suggestion");
        return None;
    };

    let alternatives = reply
        .alternatives
        .into_iter()
        .filter(|name| name != &pattern && catalog.contains(name))
        .collect();

    Some(RankedSuggestion {
        pattern,
        confidence: reply.confidence.clamp(0.0, 1.0),
        reasoning: reply.reasoning,
        alternatives,
        fallback_from,
    })
}

fn sample(input: &str) -> String {
    input.chars().take(SAMPLE_CHARS).collect()
}

/// Parse a JSON object from a reply that may wrap it in prose or a fence.
fn parse_json<T: serde::de::DeserializeOwned>(reply: &str) -> Result<T, String> {
    let candidate = JSON_FENCE_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .or_else(|| {
            let start = reply.find('{')?;
            let end = reply.rfind('}')?;
            (end > start).then(|| &reply[start..=end])
        })
        .ok_or_else(|| "reply contains no JSON object".to_string())?;
    serde_json::from_str(candidate).map_err(|e| e.to_string())
}
