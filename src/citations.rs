use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How citation markers embedded in the summary markdown are displayed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyle {
    Highlighted,
    Normal,
    Hidden,
}

// One author/year group: capitalized name tokens, optionally joined by
// "and"/"&", an optional "et al.", and an optional year with a letter
// suffix ("2020a"). A bracketed marker is one or more such groups chained
// with semicolons.
const CITATION_GROUP: &str = r"[A-Z][\p{L}'’\-\.]*(?:\s+(?:and\s+|&\s+)?[A-Z][\p{L}'’\-\.]*)*(?:\s+et\s+al\.?)?(?:\s*,\s*\d{4}[a-z]?)?";

static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\[{group}(?:\s*;\s*{group})*\]", group = CITATION_GROUP))
        .expect("citation pattern compiles")
});

static EMOJI_AFTER_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?:\s*(?:\p{Extended_Pictographic}|\x{FE0F}|\x{200D}))+\s*")
        .expect("emoji cleanup pattern compiles")
});

static SPACE_AFTER_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s+").expect("bracket cleanup pattern compiles"));

static SPACE_BEFORE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\]").expect("bracket cleanup pattern compiles"));

static REPEATED_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(?:\s*,)+").expect("comma cleanup pattern compiles"));

static COMMA_BEFORE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s*,)+\s*\]").expect("comma cleanup pattern compiles"));

static COMMA_AFTER_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*,\s*").expect("comma cleanup pattern compiles"));

/// Bracket cleanup applied before any style-specific transform: strips
/// pictographic characters that models occasionally emit inside markers,
/// repairs stray commas, and collapses whitespace touching the brackets.
/// Comma repairs run first so they cannot re-expose whitespace next to a
/// bracket; running the pass twice yields the same text as running it once.
pub fn normalize_brackets(text: &str) -> String {
    let text = EMOJI_AFTER_OPEN.replace_all(text, "[");
    let text = REPEATED_COMMA.replace_all(&text, ",");
    let text = COMMA_BEFORE_CLOSE.replace_all(&text, "]");
    let text = COMMA_AFTER_OPEN.replace_all(&text, "[");
    let text = SPACE_AFTER_OPEN.replace_all(&text, "[");
    let text = SPACE_BEFORE_CLOSE.replace_all(&text, "]");
    text.into_owned()
}

/// Derive the display form of a summary from the authoritative text. Pure:
/// the stored summary is never mutated, only re-rendered.
pub fn process_markdown(text: &str, has_citations: bool, style: CitationStyle) -> String {
    if !has_citations {
        return text.to_string();
    }

    let normalized = normalize_brackets(text);
    match style {
        CitationStyle::Normal => normalized,
        CitationStyle::Highlighted => {
            rewrite_citations(&normalized, |marker| format!("**{marker}**"))
        }
        CitationStyle::Hidden => rewrite_citations(&normalized, |_| String::new()),
    }
}

// Walks matches by hand instead of using replace_all so a marker that is
// really a markdown link label (`[Smith](...)`) can be left untouched; the
// regex crate has no lookahead to express that inside the pattern.
fn rewrite_citations(text: &str, rewrite: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for found in CITATION_RE.find_iter(text) {
        out.push_str(&text[last..found.start()]);
        if text[found.end()..].starts_with('(') {
            out.push_str(found.as_str());
        } else {
            out.push_str(&rewrite(found.as_str()));
        }
        last = found.end();
    }

    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_citations_flag_is_identity() {
        let text = "Raw [📄 Smith,, 2020 ] text with [1] footnotes.";
        assert_eq!(
            process_markdown(text, false, CitationStyle::Highlighted),
            text
        );
        assert_eq!(process_markdown(text, false, CitationStyle::Hidden), text);
    }

    #[test]
    fn normal_style_is_normalization_only() {
        let text = "Results improve [ Smith,, 2020 ] across tasks.";
        assert_eq!(
            process_markdown(text, true, CitationStyle::Normal),
            "Results improve [Smith, 2020] across tasks."
        );
    }

    #[test]
    fn highlighted_wraps_markers_and_nothing_else() {
        let text = "Paper discusses X [Smith, 2020]. See also [Lee et al., 2021b].";
        assert_eq!(
            process_markdown(text, true, CitationStyle::Highlighted),
            "Paper discusses X **[Smith, 2020]**. See also **[Lee et al., 2021b]**."
        );
    }

    #[test]
    fn hidden_removes_markers_and_keeps_surrounding_text() {
        let text = "A [Smith, 2020] B";
        assert_eq!(process_markdown(text, true, CitationStyle::Hidden), "A  B");
    }

    #[test]
    fn semicolon_chain_is_one_marker() {
        let text = "Known results [Smith, 2020; Lee et al., 2021] hold.";
        assert_eq!(
            process_markdown(text, true, CitationStyle::Highlighted),
            "Known results **[Smith, 2020; Lee et al., 2021]** hold."
        );
    }

    #[test]
    fn author_variants_match() {
        for marker in [
            "[Smith]",
            "[Smith et al.]",
            "[Smith and Jones, 2021a]",
            "[O'Brien & Müller, 1999]",
            "[García-López, 2020]",
        ] {
            let rendered = process_markdown(marker, true, CitationStyle::Hidden);
            assert_eq!(rendered, "", "expected {marker} to be treated as a citation");
        }
    }

    #[test]
    fn footnotes_and_figure_labels_are_untouched() {
        for text in ["See note [1].", "As shown in [Figure 3].", "Sources [S1] agree."] {
            assert_eq!(process_markdown(text, true, CitationStyle::Hidden), text);
            assert_eq!(process_markdown(text, true, CitationStyle::Highlighted), text);
        }
    }

    #[test]
    fn markdown_links_are_not_rewritten() {
        let text = "Read [Smith](https://example.org/paper) for details.";
        assert_eq!(process_markdown(text, true, CitationStyle::Hidden), text);
        assert_eq!(process_markdown(text, true, CitationStyle::Highlighted), text);
    }

    #[test]
    fn leading_emoji_inside_bracket_is_stripped() {
        assert_eq!(
            normalize_brackets("Cited [📄 Smith, 2020] here."),
            "Cited [Smith, 2020] here."
        );
    }

    #[test]
    fn stray_commas_are_repaired() {
        assert_eq!(normalize_brackets("[Smith,,, 2020]"), "[Smith, 2020]");
        assert_eq!(normalize_brackets("[Smith, 2020,]"), "[Smith, 2020]");
        assert_eq!(normalize_brackets("[, Smith, 2020]"), "[Smith, 2020]");
    }

    #[test]
    fn normalization_is_idempotent() {
        let nasty = "Mix [📄  Smith ,, 2020 , ] and [ Lee,,2021 ] plus [ok].";
        let once = normalize_brackets(nasty);
        let twice = normalize_brackets(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn text_without_markers_passes_through() {
        let text = "No brackets at all, just prose.";
        assert_eq!(process_markdown(text, true, CitationStyle::Hidden), text);
        assert_eq!(process_markdown(text, true, CitationStyle::Highlighted), text);
    }
}
