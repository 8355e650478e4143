// src/matching/normalize.rs

use once_cell::sync::Lazy;
use regex::Regex;

/// Corporate legal-entity tokens stripped before comparison. These are the
/// Indonesian forms that scraped sources attach or omit inconsistently
/// (PT Adaro Energy Tbk vs. "ADARO ENERGY").
const LEGAL_SUFFIX_TOKENS: [&str; 7] = ["pt", "tbk", "cv", "ud", "pd", "ksu", "kud"];

/// Word-boundary matcher for the legal tokens, tolerating a trailing period
/// ("PT." is as common as "PT" in scraped text). Compiled once.
static LEGAL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = LEGAL_SUFFIX_TOKENS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b\.?", alternation)).expect("legal token pattern is valid")
});

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// The two exact-lookup keys derived from a raw entity name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedKey {
    /// Lowercased, suffix-stripped, whitespace-collapsed form
    pub spaced: String,

    /// `spaced` with internal spaces removed, for sources that glue words
    pub no_space: String,
}

impl NormalizedKey {
    pub fn is_empty(&self) -> bool {
        self.spaced.is_empty()
    }
}

/// Normalizes a raw entity name into its two canonical keys.
///
/// Pure and idempotent: `normalize(normalize(x).spaced)` equals
/// `normalize(x)`. Missing or empty input yields empty keys rather than an
/// error; the cascade treats empty keys as unmatched.
pub fn normalize(raw: Option<&str>) -> NormalizedKey {
    let raw = raw.unwrap_or("");
    let lowered = raw.to_lowercase();
    let stripped = LEGAL_TOKEN_RE.replace_all(&lowered, " ");
    let spaced = WHITESPACE_RE.replace_all(stripped.trim(), " ").into_owned();
    let no_space = spaced.replace(' ', "");
    NormalizedKey { spaced, no_space }
}

/// Convenience wrapper for callers holding `Option<String>` record fields.
pub fn normalize_opt(raw: &Option<String>) -> NormalizedKey {
    normalize(raw.as_deref())
}
