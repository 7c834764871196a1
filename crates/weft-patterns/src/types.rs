use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// PatternCategory
// =============================================================================

/// Closed set of pattern categories.
///
/// Resolved once when the catalog is loaded; call sites never re-derive a
/// category from the pattern name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Summarize,
    Extraction,
    Analysis,
    Writing,
    Creative,
    General,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 6] = [
        PatternCategory::Summarize,
        PatternCategory::Extraction,
        PatternCategory::Analysis,
        PatternCategory::Writing,
        PatternCategory::Creative,
        PatternCategory::General,
    ];

    /// Infer a category from a pattern name.
    ///
    /// Only used while loading patterns that do not declare a category.
    pub fn infer_from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.starts_with("summarize")
            || name.starts_with("create_summary")
            || name.ends_with("_summary")
            || name.contains("summar")
        {
            PatternCategory::Summarize
        } else if name.starts_with("extract_") {
            PatternCategory::Extraction
        } else if name.starts_with("analyze_") || name.starts_with("analyse_") {
            PatternCategory::Analysis
        } else if name.starts_with("improve_")
            || name.starts_with("write_")
            || name.starts_with("rewrite_")
        {
            PatternCategory::Writing
        } else if name.starts_with("create_") {
            PatternCategory::Creative
        } else {
            PatternCategory::General
        }
    }

    /// How partial results of this category are merged.
    pub fn combine_strategy(&self) -> CombineStrategy {
        match self {
            PatternCategory::Summarize => CombineStrategy::Summarize,
            PatternCategory::Extraction => CombineStrategy::Extraction,
            PatternCategory::Analysis => CombineStrategy::Analysis,
            PatternCategory::Writing | PatternCategory::Creative | PatternCategory::General => {
                CombineStrategy::Default
            }
        }
    }

    /// Human-readable label for menus.
    pub fn label(&self) -> &'static str {
        match self {
            PatternCategory::Summarize => "Summaries",
            PatternCategory::Extraction => "Extraction",
            PatternCategory::Analysis => "Analysis",
            PatternCategory::Writing => "Writing",
            PatternCategory::Creative => "Creative",
            PatternCategory::General => "General",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatternCategory::Summarize => "summarize",
            PatternCategory::Extraction => "extraction",
            PatternCategory::Analysis => "analysis",
            PatternCategory::Writing => "writing",
            PatternCategory::Creative => "creative",
            PatternCategory::General => "general",
        };
        f.write_str(s)
    }
}

impl FromStr for PatternCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summarize" | "summary" | "summaries" => Ok(PatternCategory::Summarize),
            "extraction" | "extract" => Ok(PatternCategory::Extraction),
            "analysis" | "analyze" | "analyse" => Ok(PatternCategory::Analysis),
            "writing" | "write" => Ok(PatternCategory::Writing),
            "creative" | "create" => Ok(PatternCategory::Creative),
            "general" | "other" => Ok(PatternCategory::General),
            other => Err(format!("unknown pattern category: {}", other)),
        }
    }
}

/// Strategy used to merge per-chunk results into one output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CombineStrategy {
    Summarize,
    Extraction,
    Analysis,
    Default,
}

// =============================================================================
// Pattern
// =============================================================================

/// A named prompt template defining one text transformation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub category: PatternCategory,
    pub system_prompt: String,
    /// Optional seed message sent before the user's text.
    pub user_prompt: Option<String>,
    pub description: String,
}

impl Pattern {
    /// First `_`-separated token of the name, used to find related patterns.
    pub fn family(&self) -> &str {
        family_of(&self.name)
    }
}

/// First `_`-separated token of a pattern name.
pub fn family_of(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_category_from_name() {
        assert_eq!(
            PatternCategory::infer_from_name("summarize"),
            PatternCategory::Summarize
        );
        assert_eq!(
            PatternCategory::infer_from_name("create_summary"),
            PatternCategory::Summarize
        );
        assert_eq!(
            PatternCategory::infer_from_name("summarize_lecture"),
            PatternCategory::Summarize
        );
        assert_eq!(
            PatternCategory::infer_from_name("extract_wisdom"),
            PatternCategory::Extraction
        );
        assert_eq!(
            PatternCategory::infer_from_name("analyze_claims"),
            PatternCategory::Analysis
        );
        assert_eq!(
            PatternCategory::infer_from_name("improve_writing"),
            PatternCategory::Writing
        );
        assert_eq!(
            PatternCategory::infer_from_name("create_story"),
            PatternCategory::Creative
        );
        assert_eq!(
            PatternCategory::infer_from_name("explain_code"),
            PatternCategory::General
        );
    }

    #[test]
    fn test_combine_strategy_mapping() {
        assert_eq!(
            PatternCategory::Summarize.combine_strategy(),
            CombineStrategy::Summarize
        );
        assert_eq!(
            PatternCategory::Extraction.combine_strategy(),
            CombineStrategy::Extraction
        );
        assert_eq!(
            PatternCategory::Analysis.combine_strategy(),
            CombineStrategy::Analysis
        );
        assert_eq!(
            PatternCategory::Writing.combine_strategy(),
            CombineStrategy::Default
        );
        assert_eq!(
            PatternCategory::General.combine_strategy(),
            CombineStrategy::Default
        );
    }

    #[test]
    fn test_category_display_parse_roundtrip() {
        for category in PatternCategory::ALL {
            let parsed: PatternCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn test_category_parse_aliases_and_errors() {
        assert_eq!(
            " Summary ".parse::<PatternCategory>().unwrap(),
            PatternCategory::Summarize
        );
        assert!("poetry".parse::<PatternCategory>().is_err());
    }

    #[test]
    fn test_family_of() {
        assert_eq!(family_of("extract_wisdom"), "extract");
        assert_eq!(family_of("summarize"), "summarize");
        assert_eq!(family_of(""), "");
    }
}
