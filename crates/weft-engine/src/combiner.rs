//! Category-specific merging of per-chunk pattern results.

use weft_patterns::{CombineStrategy, PatternCategory};

/// Separator placed between joined parts.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Summaries with more parts than this are condensed to their lead paragraphs.
const SUMMARY_JOIN_LIMIT: usize = 3;

const OVERALL_SYNTHESIS: &str = "The sections above were analyzed independently. Read them \
together: claims and evidence in one section may be supported or qualified by another.";

/// Merge per-chunk results of one pattern into a single output.
///
/// An empty slice yields the empty string and a single result is returned
/// unchanged, whatever the category.
pub fn combine<S: AsRef<str>>(category: PatternCategory, results: &[S]) -> String {
    match results {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        _ => {
            let parts: Vec<&str> = results.iter().map(|r| r.as_ref().trim()).collect();
            match category.combine_strategy() {
                CombineStrategy::Summarize => combine_summaries(&parts),
                CombineStrategy::Extraction => headed(&parts, "Insights"),
                CombineStrategy::Analysis => combine_analyses(&parts),
                CombineStrategy::Default => parts
                    .iter()
                    .enumerate()
                    .map(|(i, p)| format!("## Part {}\n\n{}", i + 1, p))
                    .collect::<Vec<_>>()
                    .join(SECTION_SEPARATOR),
            }
        }
    }
}

fn combine_summaries(parts: &[&str]) -> String {
    if parts.len() <= SUMMARY_JOIN_LIMIT {
        return parts.join(SECTION_SEPARATOR);
    }
    parts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("## Key Points from Part {}\n\n{}", i + 1, first_paragraph(p)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn combine_analyses(parts: &[&str]) -> String {
    format!(
        "{}\n\n## Overall Synthesis\n\n{}",
        headed(parts, "Analysis"),
        OVERALL_SYNTHESIS
    )
}

/// `## Section N <label>` before each part.
fn headed(parts: &[&str], label: &str) -> String {
    parts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("## Section {} {}\n\n{}", i + 1, label, p))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn first_paragraph(text: &str) -> &str {
    text.split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_for_every_category() {
        let single = ["  exactly this\n\nunchanged  ".to_string()];
        for category in PatternCategory::ALL {
            assert_eq!(combine(category, &single), single[0]);
        }
    }

    #[test]
    fn test_empty_results() {
        let empty: [&str; 0] = [];
        assert_eq!(combine(PatternCategory::Summarize, &empty), "");
    }

    #[test]
    fn test_summaries_joined_when_few() {
        let out = combine(PatternCategory::Summarize, &["one", "two", "three"]);
        assert_eq!(out, "one\n\n---\n\ntwo\n\n---\n\nthree");
    }

    #[test]
    fn test_summaries_condensed_when_many() {
        let parts = ["A lead.\n\nA detail.", "B lead.", "C lead.\n\nmore", "\n\nD lead."];
        let out = combine(PatternCategory::Summarize, &parts);
        assert!(out.starts_with("## Key Points from Part 1\n\nA lead."));
        assert!(out.contains("## Key Points from Part 4\n\nD lead."));
        assert!(!out.contains("A detail."));
        assert!(!out.contains("---"));
    }

    #[test]
    fn test_extraction_headers() {
        let out = combine(PatternCategory::Extraction, &["x", "y"]);
        assert_eq!(out, "## Section 1 Insights\n\nx\n\n## Section 2 Insights\n\ny");
    }

    #[test]
    fn test_analysis_ends_with_synthesis() {
        let out = combine(PatternCategory::Analysis, &["x", "y"]);
        assert!(out.starts_with("## Section 1 Analysis\n\nx\n\n## Section 2 Analysis\n\ny"));
        assert_eq!(out.matches("## Overall Synthesis").count(), 1);
        assert!(out.ends_with(OVERALL_SYNTHESIS));
    }

    #[test]
    fn test_default_parts_for_other_categories() {
        for category in [
            PatternCategory::Writing,
            PatternCategory::Creative,
            PatternCategory::General,
        ] {
            let out = combine(category, &["x", "y"]);
            assert_eq!(out, "## Part 1\n\nx\n\n---\n\n## Part 2\n\ny");
        }
    }
}
