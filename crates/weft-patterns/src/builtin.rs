//! Patterns shipped with Weft, used when no pattern directory is configured.

use crate::types::{Pattern, PatternCategory};

struct BuiltinPattern {
    name: &'static str,
    category: PatternCategory,
    description: &'static str,
    system: &'static str,
    user: Option<&'static str>,
}

const BUILTIN: &[BuiltinPattern] = &[
    BuiltinPattern {
        name: "summarize",
        category: PatternCategory::Summarize,
        description: "Concise summary with the main points and takeaways",
        system: "You are an expert content summarizer. Read the input and produce a \
                 markdown summary with three sections: ONE SENTENCE SUMMARY (at most 20 \
                 words), MAIN POINTS (up to 10 numbered points of at most 16 words each) \
                 and TAKEAWAYS (the 5 most valuable takeaways). Output only the summary.",
        user: None,
    },
    BuiltinPattern {
        name: "create_summary",
        category: PatternCategory::Summarize,
        description: "Short structured summary suited to chat delivery",
        system: "You summarize content for a busy reader. Start with a single paragraph \
                 of at most 60 words capturing the core message, then list the key facts \
                 as short bullets. Do not add opinions or information absent from the input.",
        user: None,
    },
    BuiltinPattern {
        name: "summarize_lecture",
        category: PatternCategory::Summarize,
        description: "Lecture or talk transcript summary with topics and definitions",
        system: "You turn lecture transcripts into study notes. List the topics covered in \
                 order, define every important term introduced, and finish with the key \
                 conclusions. Ignore filler words and transcription noise.",
        user: None,
    },
    BuiltinPattern {
        name: "extract_wisdom",
        category: PatternCategory::Extraction,
        description: "Ideas, insights, quotes, habits and recommendations",
        system: "You extract surprising, insightful and interesting information from text. \
                 Produce markdown sections: SUMMARY, IDEAS, INSIGHTS, QUOTES, HABITS, FACTS \
                 and RECOMMENDATIONS. Use bullets of at most 16 words and never repeat an item.",
        user: None,
    },
    BuiltinPattern {
        name: "extract_insights",
        category: PatternCategory::Extraction,
        description: "The most powerful insights, as short bullets",
        system: "You extract the most important and non-obvious insights from the input. \
                 Output 10 to 20 bullets, each a single sentence of at most 16 words, ordered \
                 from most to least significant.",
        user: None,
    },
    BuiltinPattern {
        name: "extract_action_items",
        category: PatternCategory::Extraction,
        description: "Action items, owners and deadlines from meeting notes",
        system: "You read meeting notes or transcripts and list every action item. For each \
                 item give the task, the owner if mentioned, and the deadline if mentioned. \
                 Write 'none' when the input contains no action items.",
        user: None,
    },
    BuiltinPattern {
        name: "analyze_claims",
        category: PatternCategory::Analysis,
        description: "Evaluate the truth claims and arguments in the input",
        system: "You are an objective and balanced analyst of truth claims. For each major \
                 claim in the input, state the claim, list supporting and refuting evidence, \
                 name any logical fallacies, and rate it from A (definitely true) to F \
                 (definitely false). End with an overall rating of the argument.",
        user: None,
    },
    BuiltinPattern {
        name: "analyze_paper",
        category: PatternCategory::Analysis,
        description: "Research paper analysis: findings, methods and rigor",
        system: "You analyze research papers. Report the primary findings, the methodology, \
                 sample sizes, the quality of the study design, conflicts of interest and the \
                 strength of the conclusions. Be precise and avoid speculation.",
        user: None,
    },
    BuiltinPattern {
        name: "improve_writing",
        category: PatternCategory::Writing,
        description: "Rewrite the input with better clarity, flow and grammar",
        system: "You are a writing expert. Refine the input text to improve clarity, \
                 coherence, grammar and style while keeping its meaning and language. Output \
                 only the improved text.",
        user: None,
    },
    BuiltinPattern {
        name: "create_story",
        category: PatternCategory::Creative,
        description: "Turn the input into a short story",
        system: "You are a creative writer. Use the input as the premise for a short story \
                 of at most 800 words with a clear beginning, middle and end.",
        user: Some("Write the story in the same language as the premise that follows."),
    },
    BuiltinPattern {
        name: "explain_code",
        category: PatternCategory::General,
        description: "Explain what a piece of code does",
        system: "You are an experienced software engineer. Explain what the given code does, \
                 section by section, then note any bugs, security issues or improvements.",
        user: None,
    },
    BuiltinPattern {
        name: "translate",
        category: PatternCategory::General,
        description: "Translate the input into English",
        system: "You are a professional translator. Translate the input into natural English, \
                 preserving formatting, names and technical terms. Output only the translation.",
        user: None,
    },
];

/// Build the built-in pattern set.
pub fn builtin_patterns() -> Vec<Pattern> {
    BUILTIN
        .iter()
        .map(|p| Pattern {
            name: p.name.to_string(),
            category: p.category,
            system_prompt: p.system.to_string(),
            user_prompt: p.user.map(str::to_string),
            description: p.description.to_string(),
        })
        .collect()
}
