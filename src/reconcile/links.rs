// src/reconcile/links.rs
//! Cross-references written into free text, e.g. a GitHub issue URL pasted
//! into a Notion page description.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::config::LinkPatternSettings;
use crate::model::{Source, SourceRecord, SourceRef};

pub const GITHUB_ISSUE_URL: &str = r"github\.com/[\w.-]+/[\w.-]+/issues/(\d+)";
pub const NOTION_PAGE_URL: &str = r"(?i)notion\.(?:so|site)/[^\s)\]]*?([0-9a-f]{32})\b";

/// Scan records of `from` for ids of `to`; capture group 1 is the target id.
#[derive(Debug, Clone)]
pub struct LinkRule {
    pub from: Source,
    pub to: Source,
    pattern: Regex,
}

impl LinkRule {
    pub fn new(from: Source, to: Source, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).with_context(|| format!("invalid link pattern {from}->{to}: {pattern}"))?;
        if pattern.captures_len() < 2 {
            anyhow::bail!("link pattern {from}->{to} needs a capture group for the target id");
        }
        Ok(Self { from, to, pattern })
    }

    /// Built-in URL rules, compiled once per process.
    pub fn defaults() -> Vec<LinkRule> {
        static DEFAULTS: OnceCell<Vec<LinkRule>> = OnceCell::new();
        DEFAULTS
            .get_or_init(|| {
                [
                    (Source::Notion, Source::Github, GITHUB_ISSUE_URL),
                    (Source::Github, Source::Notion, NOTION_PAGE_URL),
                ]
                .into_iter()
                .filter_map(|(from, to, pattern)| match Self::new(from, to, pattern) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        tracing::error!(error = %e, "built-in link rule skipped");
                        None
                    }
                })
                .collect()
            })
            .clone()
    }

    /// Configured rules, or the built-ins when none are configured.
    pub fn from_settings(patterns: &[LinkPatternSettings]) -> Result<Vec<LinkRule>> {
        if patterns.is_empty() {
            return Ok(Self::defaults());
        }
        patterns.iter().map(|p| Self::new(p.from, p.to, &p.pattern)).collect()
    }

    pub fn extract(&self, record: &SourceRecord) -> Vec<SourceRef> {
        if record.source != self.from {
            return Vec::new();
        }
        let Some(text) = record.description.as_deref() else {
            return Vec::new();
        };
        self.pattern
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| SourceRef::new(self.to, m.as_str()))
            .collect()
    }
}
