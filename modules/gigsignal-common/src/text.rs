//! Text normalization shared by hashing, fuzzy matching, and dedup scoring
//! (§4.7 "Text normalization used throughout").

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s&]").unwrap());

const STOP_MARKERS: &[&str] = &["the", "live", "concert", "show", "event", "tour"];
const VENUE_SUFFIXES: &[&str] = &["club", "bar", "hall", "arena", "theatre", "centre", "venue"];

/// Which additional stripping pass to run on top of the base normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Base normalization only (used for city/artist tokens).
    Plain,
    /// Base normalization plus stop-marker stripping (titles).
    Title,
    /// Base normalization plus stop-marker and venue-type-suffix stripping.
    Venue,
}

/// Lowercase; collapse whitespace; strip punctuation; fold `"and" -> "&"`;
/// optionally strip stop markers and venue-type suffixes.
pub fn normalize_text(input: &str, mode: NormalizeMode) -> String {
    let lowered = input.to_lowercase();
    let folded = fold_and(&lowered);
    let stripped_punct = PUNCT_RE.replace_all(&folded, " ");
    let collapsed = WHITESPACE_RE.replace_all(&stripped_punct, " ");

    let mut tokens: Vec<&str> = collapsed.trim().split(' ').filter(|t| !t.is_empty()).collect();

    match mode {
        NormalizeMode::Plain => {}
        NormalizeMode::Title => {
            tokens.retain(|t| !STOP_MARKERS.contains(t));
        }
        NormalizeMode::Venue => {
            tokens.retain(|t| !STOP_MARKERS.contains(t) && !VENUE_SUFFIXES.contains(t));
        }
    }

    tokens.join(" ")
}

fn fold_and(input: &str) -> String {
    // Word-boundary replace of "and" with "&" without pulling in a full
    // tokenizer dependency for one substitution.
    let mut out = String::with_capacity(input.len());
    for word in input.split_inclusive(|c: char| c.is_whitespace()) {
        let trimmed = word.trim_end();
        let suffix = &word[trimmed.len()..];
        if trimmed == "and" {
            out.push('&');
        } else {
            out.push_str(trimmed);
        }
        out.push_str(suffix);
    }
    out
}

/// Normalize a currency code to an uppercase 3-letter code, or `None` if it
/// does not look like one (§3 invariant).
pub fn normalize_currency(input: Option<&str>) -> Option<String> {
    let raw = input?.trim();
    if raw.len() != 3 || !raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(raw.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_text("Rock   Concert", NormalizeMode::Plain), "rock concert");
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(normalize_text("ROCK CONCERT!!!", NormalizeMode::Plain), "rock concert");
    }

    #[test]
    fn folds_and_to_ampersand() {
        assert_eq!(normalize_text("Rock and Roll", NormalizeMode::Plain), "rock & roll");
    }

    #[test]
    fn title_mode_strips_stop_markers() {
        assert_eq!(normalize_text("The Rock Concert Show", NormalizeMode::Title), "rock concert");
    }

    #[test]
    fn venue_mode_strips_venue_suffixes() {
        assert_eq!(
            normalize_text("Madison Square Garden Arena", NormalizeMode::Venue),
            "madison square garden"
        );
    }

    #[test]
    fn currency_normalizes_to_uppercase() {
        assert_eq!(normalize_currency(Some("usd")), Some("USD".to_string()));
        assert_eq!(normalize_currency(Some("US")), None);
        assert_eq!(normalize_currency(None), None);
    }
}
