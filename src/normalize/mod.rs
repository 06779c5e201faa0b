// src/normalize/mod.rs
//! Raw connector payloads → `SourceRecord`.
//!
//! Pure functions; never fail a record. Anything odd is reported as a
//! `NormalizationWarning` next to the record.

pub mod github;
pub mod notion;
pub mod status;

use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt;

use crate::config::{Settings, DEFAULT_GITHUB_NOTION_ID_FIELD, DEFAULT_NOTION_GITHUB_ID_FIELD};
use crate::ingest::types::RawRecord;
use crate::model::{Source, SourceRecord};

pub const UNTITLED: &str = "(untitled)";

/// Which metadata fields carry explicit cross-source ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// GitHub body field naming a Notion page, e.g. `notion_id: 1a2b...`.
    pub github_notion_id_field: Option<String>,
    /// Notion property holding a GitHub issue number or URL.
    pub notion_github_id_field: Option<String>,
}

impl NormalizeOptions {
    /// Without a live section (fixture replay) the default field names apply.
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            github_notion_id_field: match &s.github {
                Some(g) => g.notion_id_field.clone(),
                None => Some(DEFAULT_GITHUB_NOTION_ID_FIELD.to_string()),
            },
            notion_github_id_field: match &s.notion {
                Some(n) => n.github_id_field.clone(),
                None => Some(DEFAULT_NOTION_GITHUB_ID_FIELD.to_string()),
            },
        }
    }
}

/// Non-fatal oddity found while normalizing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationWarning {
    pub source: Source,
    pub source_id: String,
    pub message: String,
}

impl NormalizationWarning {
    pub(crate) fn new(source: Source, source_id: &str, message: impl Into<String>) -> Self {
        Self {
            source,
            source_id: source_id.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.source, self.source_id, self.message)
    }
}

pub fn normalize(raw: RawRecord, opts: &NormalizeOptions) -> (SourceRecord, Vec<NormalizationWarning>) {
    match raw {
        RawRecord::Github(issue) => github::normalize_issue(issue, opts),
        RawRecord::Notion(page) => notion::normalize_page(page, opts),
    }
}

/// Single-line clean-up for titles, labels and names:
/// entity decode, tag strip, typographic quotes → ASCII, whitespace collapse.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Multi-line variant for descriptions: keeps line breaks, squeezes
/// runs of blank lines and trailing spaces. Empty → `None`.
pub fn normalize_description(s: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(s).replace("\r\n", "\n");

    static RE_HWS: OnceCell<Regex> = OnceCell::new();
    let re_hws = RE_HWS.get_or_init(|| Regex::new(r"[ \t]+").unwrap());

    let mut lines: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let line = re_hws.replace_all(line, " ").trim().to_string();
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let out = lines.join("\n");
    (!out.is_empty()).then_some(out)
}

/// Matching key for titles: case-folded, punctuation stripped,
/// whitespace collapsed.
pub fn title_key(title: &str) -> String {
    let folded: String = normalize_text(title)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Id form used for cross-source comparison: case-insensitive, `-` and a
/// leading `#` ignored.
pub fn canonical_id(id: &str) -> String {
    let id = id.trim();
    let id = id.strip_prefix('#').unwrap_or(id);
    id.chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_cleanup() {
        assert_eq!(
            normalize_text("  Fix&nbsp;<b>login</b>\n  &amp; \u{201C}signup\u{201D} "),
            "Fix login & \"signup\""
        );
        assert_eq!(normalize_text("a < b"), "a < b");
    }

    #[test]
    fn description_keeps_paragraphs() {
        let d = normalize_description("line  one\r\n\r\n\r\n  line two  \n\n").unwrap();
        assert_eq!(d, "line one\n\nline two");
        assert_eq!(normalize_description(" \n \n"), None);
    }

    #[test]
    fn title_keys_ignore_case_and_punctuation() {
        assert_eq!(title_key("Fix login bug!"), "fix login bug");
        assert_eq!(title_key("  fix: LOGIN   bug "), "fix login bug");
    }

    #[test]
    fn canonical_ids() {
        assert_eq!(canonical_id("#42"), "42");
        assert_eq!(
            canonical_id("1A2B3C4D-1111-2222-3333-444455556666"),
            "1a2b3c4d111122223333444455556666"
        );
    }
}
