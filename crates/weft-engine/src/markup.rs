//! Cleanup of raw backend output before it is stored or delivered.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static REASONING_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<think>.*?</think>|<thinking>.*?</thinking>|<reasoning>.*?</reasoning>",
    )
    .expect("Invalid reasoning block regex")
});

static STRAY_REASONING_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:think|thinking|reasoning)>").expect("Invalid reasoning tag regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)\b[^<>]*>").expect("Invalid tag regex")
});

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid blank line regex"));

/// Tags the delivery channel renders.
const ALLOWED_TAGS: &[&str] = &["b", "strong", "i", "em", "u", "s", "code", "pre", "a"];

/// Remove reasoning blocks some models emit before their answer.
pub fn strip_reasoning(text: &str) -> String {
    let without_blocks = REASONING_BLOCK_RE.replace_all(text, "");
    STRAY_REASONING_TAG_RE
        .replace_all(&without_blocks, "")
        .trim()
        .to_string()
}

/// Drop markup tags the delivery channel cannot render and collapse blank runs.
pub fn sanitize(text: &str) -> String {
    let kept = TAG_RE.replace_all(text, |caps: &Captures| {
        let name = caps[1].to_ascii_lowercase();
        if ALLOWED_TAGS.contains(&name.as_str()) {
            caps[0].to_string()
        } else {
            String::new()
        }
    });
    BLANK_RUN_RE.replace_all(&kept, "\n\n").trim().to_string()
}

/// Full cleanup applied to every pattern output.
pub fn clean(text: &str) -> String {
    sanitize(&strip_reasoning(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_think_block() {
        let raw = "<think>\nthe user wants a summary\n</think>\n\n# Summary\nDone.";
        assert_eq!(strip_reasoning(raw), "# Summary\nDone.");
    }

    #[test]
    fn test_strip_all_reasoning_variants() {
        let raw = "<thinking>a</thinking>one <REASONING>b\nc</REASONING>two";
        assert_eq!(strip_reasoning(raw), "one two");
    }

    #[test]
    fn test_strip_stray_closing_tag() {
        assert_eq!(strip_reasoning("answer</think>"), "answer");
    }

    #[test]
    fn test_sanitize_keeps_allowed_tags() {
        let raw = "<b>bold</b> <div class=\"x\">plain</div> <a href=\"u\">link</a>";
        assert_eq!(sanitize(raw), "<b>bold</b> plain <a href=\"u\">link</a>");
    }

    #[test]
    fn test_sanitize_leaves_comparisons() {
        assert_eq!(sanitize("a < b and c > d"), "a < b and c > d");
    }

    #[test]
    fn test_sanitize_collapses_blank_runs() {
        assert_eq!(sanitize("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_combines_both() {
        let raw = "<think>hmm</think><p>Result</p>\n\n\n<br/>end";
        assert_eq!(clean(raw), "Result\n\nend");
    }
}
