//! Text helpers for prompt construction and embedding input.

use regex::Regex;
use std::sync::OnceLock;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("static regex is valid"))
}

/// Collapse runs of whitespace to a single space and trim both ends.
pub fn normalize_whitespace(s: &str) -> String {
    whitespace_re().replace_all(s, " ").trim().to_string()
}

/// Truncate `s` to at most `max_chars` characters, ending in `"..."` when cut.
///
/// Counts characters rather than bytes so multi-byte input never splits.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let kept: String = s.chars().take(max_chars - 3).collect();
    format!("{kept}...")
}

/// Text sent to the embedder for a concept: the label, followed by the
/// definition when one is known.
pub fn concept_embedding_text(label: &str, definition: Option<&str>) -> String {
    let label = normalize_whitespace(label);
    match definition.map(normalize_whitespace) {
        Some(def) if !def.is_empty() => format!("{label}: {def}"),
        _ => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_mixed_whitespace() {
        assert_eq!(normalize_whitespace("  machine \t\n learning  "), "machine learning");
        assert_eq!(normalize_whitespace("   "), "");
        assert_eq!(normalize_whitespace("a\u{00A0}b"), "a b");
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate_with_ellipsis("hello", 5), "hello");
        assert_eq!(truncate_with_ellipsis("", 3), "");
    }

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        assert_eq!(truncate_with_ellipsis("hello world", 8), "hello...");
        assert_eq!(truncate_with_ellipsis("你好世界测试", 5), "你好...");
        assert_eq!(truncate_with_ellipsis("hello", 2), "..");
        assert_eq!(truncate_with_ellipsis("hello", 0), "");
    }

    #[test]
    fn embedding_text_includes_definition() {
        assert_eq!(
            concept_embedding_text("Machine Learning", Some("  Learning from data ")),
            "Machine Learning: Learning from data"
        );
        assert_eq!(concept_embedding_text("Machine  Learning", None), "Machine Learning");
        assert_eq!(concept_embedding_text("ML", Some("   ")), "ML");
    }
}
