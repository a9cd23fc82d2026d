//! Normalization of free-form metadata values.

use chrono::NaiveDate;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::util::truncate_to_date;

/// Marker some online libraries prefix genre codes with.
const GENRE_MARKER: &str = "sf_";

/// Keyword filtering rules.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalizerConfig {
    /// Keywords dropped entirely (compared after trimming and lower-casing).
    pub excluded_keywords: Vec<String>,
    /// `(needle, canonical)`: a keyword containing `needle` becomes `canonical`.
    pub keyword_remaps: Vec<(String, String)>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            excluded_keywords: vec!["самиздат".to_string()],
            keyword_remaps: vec![("litrpg".to_string(), "ЛитРПГ".to_string())],
        }
    }
}

impl NormalizerConfig {
    /// Normalize one keyword. Returns an empty string for excluded keywords.
    pub fn normalize_keyword(&self, keyword: &str) -> String {
        let keyword = keyword.trim().to_lowercase();

        if self.excluded_keywords.iter().any(|k| k.to_lowercase() == keyword) {
            return String::new();
        }

        if let Some((_, canonical)) = self
            .keyword_remaps
            .iter()
            .find(|(needle, _)| keyword.contains(needle.to_lowercase().as_str()))
        {
            return canonical.clone();
        }

        tidy(&keyword)
    }

    /// Split a comma-separated keyword field and normalize each token,
    /// dropping empty results.
    pub fn normalize_keywords(&self, field: &str) -> Vec<String> {
        field
            .split(',')
            .map(|k| self.normalize_keyword(k))
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// Normalize a genre code or name: `"sf_action"` becomes `"Action"`.
///
/// Idempotent.
pub fn normalize_genre(genre: &str) -> String {
    tidy(&genre.replace(GENRE_MARKER, "").to_lowercase())
}

/// Underscores to spaces, collapse whitespace, trim, capitalize the first
/// character.
fn tidy(value: &str) -> String {
    let spaced = value.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    capitalize_first(&collapsed.to_lowercase())
}

/// Upper-case the first character when it has a single-character upper-case
/// form; otherwise leave the string alone.
fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut upper = first.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => std::iter::once(single).chain(chars).collect(),
        _ => value.to_string(),
    }
}

/// Classify a declared language: anything mentioning `ru` is Russian, any
/// other non-empty value is English.
pub fn classify_language(raw: &str) -> Option<String> {
    let raw = raw.trim().to_lowercase();
    if raw.is_empty() {
        return None;
    }

    Some(if raw.contains("ru") { "ru" } else { "en" }.to_string())
}

/// Parse `YYYY-MM-DD`, `YYYY-MM` or `YYYY`, ignoring any time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date = truncate_to_date(raw.trim()).trim();
    if date.is_empty() {
        return None;
    }

    let mut parts = date.splitn(3, '-');
    let year = parts.next()?.trim().parse::<i32>().ok()?;
    let month = match parts.next() {
        Some(m) => m.trim().parse::<u32>().ok()?,
        None => 1,
    };
    let day = match parts.next() {
        Some(d) => d.trim().parse::<u32>().ok()?,
        None => 1,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}
