//! Turning free-text model responses into structured values.
//!
//! Every function here is pure and total: unusable input produces an empty
//! or default value, never an error.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use marketmate_core::types::Sentiment;

const MAX_SUBJECT_WORDS: usize = 10;

const NAME_LIST_META: &[&str] = &[
    "based on",
    "selection rules",
    "preferred region",
    "search bundles",
    "search results",
];

const NO_RESULT_PREFIXES: &[&str] = &["none", "no company", "no companies", "n/a"];

const BULLET_META_PREFIXES: &[&str] = &["here are", "here is", "trends:", "summary:"];

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn list_prefix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    // Bullets, then an optional "1." / "2)" ordinal.
    cached(&RE, r"^\s*(?:[-*•+]+\s*)?(?:\d+\s*[.)]\s*)?")
}

fn competitors_header() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)competitors\s*:")
}

/// Lead-in and header lines around a bulleted list.
fn is_bullet_meta(line: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    match cached(
        &RE,
        r"(?i)^(?:here (?:are|is)\b|trends\s*:|summary\s*:)|\bnews headlines\b",
    ) {
        Some(re) => re.is_match(line),
        None => {
            let lower = line.to_lowercase();
            BULLET_META_PREFIXES.iter().any(|p| lower.starts_with(p))
        }
    }
}

fn strip_list_prefix(line: &str) -> &str {
    match list_prefix() {
        Some(re) => match re.find(line) {
            Some(m) => &line[m.end()..],
            None => line,
        },
        None => line.trim_start_matches(['-', '*', '•', '+', ' ']),
    }
}

fn strip_markdown(s: &str) -> &str {
    s.trim().trim_matches(|c: char| c == '*' || c == '_' || c == '`').trim()
}

/// Extract a refined subject from a model reply.
///
/// Takes the first line that is not a bare label, strips a leading
/// `Refined product line:` style label, quotes and trailing punctuation,
/// and keeps at most ten words.
pub fn parse_refined_subject(text: &str) -> Option<String> {
    for raw in text.lines() {
        let mut line = strip_markdown(strip_list_prefix(raw));
        if line.is_empty() {
            continue;
        }

        if let Some((label, rest)) = line.split_once(':') {
            let label = label.to_lowercase();
            if label.contains("product line") || label.contains("refined") || label.contains("subject")
            {
                line = strip_markdown(rest);
                if line.is_empty() {
                    continue;
                }
            }
        }

        let cleaned = line
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
            .trim_end_matches(|c: char| matches!(c, '.' | '!' | ',' | ';' | ':'))
            .trim();
        if cleaned.is_empty() {
            continue;
        }

        let words: Vec<&str> = cleaned.split_whitespace().take(MAX_SUBJECT_WORDS).collect();
        return Some(words.join(" "));
    }
    None
}

/// Extract a comma or line separated list of names.
///
/// Meta lines are dropped, bullets and surrounding punctuation stripped,
/// tokens with a `:` or a "none found" phrasing skipped, and exact
/// duplicates removed keeping first-seen order.
pub fn parse_name_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if NAME_LIST_META.iter().any(|kw| lower.contains(kw)) {
            continue;
        }
        // A bare "Competitors:" header, possibly with names after it.
        let line = match competitors_header().and_then(|re| re.find(line)) {
            Some(m) => &line[m.end()..],
            None => line,
        };

        for part in line.split(',') {
            let name = strip_list_prefix(part)
                .trim()
                .trim_matches(|c: char| {
                    c.is_whitespace() || matches!(c, '-' | '•' | '*' | '.' | ';' | '"' | '\'')
                })
                .trim();
            if name.is_empty() || name.contains(':') {
                continue;
            }
            let lower = name.to_lowercase();
            if NO_RESULT_PREFIXES
                .iter()
                .any(|p| lower == *p || lower.starts_with(&format!("{} ", p)))
            {
                continue;
            }
            if seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }
    }

    names
}

/// One item per non-empty line, bullets and ordinals removed, capped at `cap`.
pub fn parse_bullet_list(text: &str, cap: usize) -> Vec<String> {
    text.lines()
        .map(|l| strip_markdown(strip_list_prefix(l)))
        .filter(|l| !l.is_empty() && !is_bullet_meta(l))
        .map(str::to_string)
        .take(cap)
        .collect()
}

/// Read the sentiment label out of a summary.
///
/// An explicit `Sentiment: <label>` line wins; otherwise the first label
/// word found anywhere. Defaults to `Mixed`.
pub fn parse_sentiment(text: &str) -> Sentiment {
    static LABELLED: OnceLock<Option<Regex>> = OnceLock::new();
    static BARE: OnceLock<Option<Regex>> = OnceLock::new();

    let labelled = cached(
        &LABELLED,
        r"(?im)sentiment[^:\n]*:\W*(positive|negative|mixed)\b",
    );
    let bare = cached(&BARE, r"(?i)\b(positive|negative|mixed)\b");

    let found = labelled
        .and_then(|re| re.captures(text))
        .or_else(|| bare.and_then(|re| re.captures(text)))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase());

    match found.as_deref() {
        Some("positive") => Sentiment::Positive,
        Some("negative") => Sentiment::Negative,
        _ => Sentiment::Mixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recorded model replies.
    const REFINE_REPLY: &str = "Refined product line: **Ceramic Motorcycle Brake Pads.**\n";
    const COMPETITOR_REPLY: &str = "Based on the search bundles provided, here is the list.\n\
        Competitors:\n\
        - Brembo, EBC Brakes, SBS\n\
        * Galfer, brembo\n\
        Brembo\n\
        Location: Italy\n\
        None found in region";
    const TREND_REPLY: &str = "Here are the top trends:\n\
        1. Shift to sintered compounds for sport bikes\n\
        2) Rising demand for eco-friendly pads\n\
        - **Online aftermarket sales growth**\n\
        • Price competition from Asian manufacturers\n\
        3. Smart wear sensors\n\
        4. Subscription maintenance plans";
    const REVIEW_REPLY: &str = "Customers praise stopping power but some mention noise.\n\
        Overall this is a positive picture with mixed durability comments.\n\
        Sentiment: Mixed";

    #[test]
    fn test_refined_subject_strips_label() {
        assert_eq!(
            parse_refined_subject(REFINE_REPLY).as_deref(),
            Some("Ceramic Motorcycle Brake Pads")
        );
    }

    #[test]
    fn test_refined_subject_label_on_own_line() {
        let reply = "Refined product line:\n\"Motorcycle brake pads\"";
        assert_eq!(
            parse_refined_subject(reply).as_deref(),
            Some("Motorcycle brake pads")
        );
    }

    #[test]
    fn test_refined_subject_word_cap_and_empty() {
        let long = "one two three four five six seven eight nine ten eleven twelve";
        assert_eq!(
            parse_refined_subject(long).unwrap().split_whitespace().count(),
            10
        );
        assert!(parse_refined_subject("  \n\n").is_none());
        assert!(parse_refined_subject("Refined product line:").is_none());
    }

    #[test]
    fn test_name_list_recorded_reply() {
        let names = parse_name_list(COMPETITOR_REPLY);
        // Exact-case dedupe here; case-insensitive merging happens across tiers.
        assert_eq!(names, vec!["Brembo", "EBC Brakes", "SBS", "Galfer", "brembo"]);
    }

    #[test]
    fn test_name_list_inline_header() {
        let names = parse_name_list("Competitors: Ferodo, TRW Lucas");
        assert_eq!(names, vec!["Ferodo", "TRW Lucas"]);
    }

    #[test]
    fn test_name_list_header_after_case_folding_text() {
        // "İ" grows from 2 to 3 bytes when lowercased.
        let names = parse_name_list("İİİ Competitors: Brembo, EBC Brakes");
        assert_eq!(names, vec!["Brembo", "EBC Brakes"]);
        assert_eq!(parse_name_list("COMPETITORS : Galfer"), vec!["Galfer"]);
    }

    #[test]
    fn test_name_list_empty_reply() {
        assert!(parse_name_list("").is_empty());
        assert!(parse_name_list("None\nN/A").is_empty());
    }

    #[test]
    fn test_bullet_list_recorded_reply() {
        let trends = parse_bullet_list(TREND_REPLY, 5);
        assert_eq!(
            trends,
            vec![
                "Shift to sintered compounds for sport bikes",
                "Rising demand for eco-friendly pads",
                "Online aftermarket sales growth",
                "Price competition from Asian manufacturers",
                "Smart wear sensors",
            ]
        );
    }

    #[test]
    fn test_bullet_list_cap() {
        assert_eq!(parse_bullet_list(TREND_REPLY, 2).len(), 2);
        assert!(parse_bullet_list("Trends:\n\n", 5).is_empty());
    }

    #[test]
    fn test_bullet_list_meta_is_anchored() {
        let reply = "Here is a summary:\n\
            - Where are EV pads heading\n\
            - Summary: nothing\n\
            - Based on the news headlines below\n\
            - Newsworthy recalls";
        assert_eq!(
            parse_bullet_list(reply, 5),
            vec!["Where are EV pads heading", "Newsworthy recalls"]
        );
    }

    #[test]
    fn test_sentiment_explicit_label_wins() {
        assert_eq!(parse_sentiment(REVIEW_REPLY), Sentiment::Mixed);
        assert_eq!(
            parse_sentiment("**Sentiment Score:** Negative\nsome positive notes"),
            Sentiment::Negative
        );
    }

    #[test]
    fn test_sentiment_bare_word_and_default() {
        assert_eq!(
            parse_sentiment("Reviewers are overwhelmingly positive."),
            Sentiment::Positive
        );
        assert_eq!(parse_sentiment("No clear signal."), Sentiment::Mixed);
    }
}
