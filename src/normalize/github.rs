// src/normalize/github.rs
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use super::status::github_status;
use super::{
    canonical_id, normalize_description, normalize_text, NormalizationWarning, NormalizeOptions, UNTITLED,
};
use crate::ingest::providers::github::GithubIssue;
use crate::model::{Source, SourceRecord, SourceRef, TaskStatus};

pub fn normalize_issue(issue: GithubIssue, opts: &NormalizeOptions) -> (SourceRecord, Vec<NormalizationWarning>) {
    let source_id = issue.number.to_string();
    let mut warnings = Vec::new();

    let mut title = normalize_text(&issue.title);
    if title.is_empty() {
        warnings.push(NormalizationWarning::new(Source::Github, &source_id, "issue has no title"));
        title = UNTITLED.to_string();
    }

    let labels: BTreeSet<String> = issue
        .labels
        .iter()
        .map(|l| normalize_text(&l.name))
        .filter(|l| !l.is_empty())
        .collect();

    let native_status = match issue.state_reason.as_deref() {
        Some(reason) if !reason.is_empty() && issue.state == "closed" => reason.to_string(),
        _ => issue.state.clone(),
    };
    let canonical_status = github_status(
        &issue.state,
        issue.state_reason.as_deref(),
        labels.iter().map(String::as_str),
    )
    .unwrap_or_else(|| {
        warnings.push(NormalizationWarning::new(
            Source::Github,
            &source_id,
            format!("unknown issue state '{}', treating as open", issue.state),
        ));
        TaskStatus::Open
    });

    let mut links = BTreeSet::new();
    if let (Some(field), Some(body)) = (opts.github_notion_id_field.as_deref(), issue.body.as_deref()) {
        if let Some(id) = body_field(body, field) {
            links.insert(SourceRef::new(Source::Notion, notion_page_id(&id)));
        }
    }

    let record = SourceRecord {
        source: Source::Github,
        source_id,
        title,
        description: issue.body.as_deref().and_then(normalize_description),
        labels,
        assignee: issue
            .assignee
            .map(|a| a.login.trim().to_string())
            .filter(|a| !a.is_empty()),
        due_date: issue
            .milestone
            .and_then(|m| m.due_on)
            .map(|d| d.date_naive()),
        status: native_status,
        canonical_status,
        url: issue.html_url,
        created_at: issue.created_at,
        updated_at: issue.updated_at,
        links,
    };
    (record, warnings)
}

/// Value of a `field: value` (or `field = value`) line in an issue body.
fn body_field(body: &str, field: &str) -> Option<String> {
    static CACHE: OnceCell<Mutex<HashMap<String, Regex>>> = OnceCell::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache = cache.lock();
    let re = match cache.get(field) {
        Some(re) => re.clone(),
        None => {
            let pattern = format!(r"(?im)^\s*{}\s*[:=]\s*([^\s]+)", regex::escape(field));
            let re = Regex::new(&pattern).ok()?;
            cache.insert(field.to_string(), re.clone());
            re
        }
    };
    drop(cache);
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches(|c| c == '`' || c == '"').to_string())
        .filter(|s| !s.is_empty())
}

/// Notion ids are often pasted as page URLs; keep the trailing 32-hex id.
fn notion_page_id(value: &str) -> String {
    static RE_HEX: OnceCell<Regex> = OnceCell::new();
    let re = RE_HEX.get_or_init(|| Regex::new(r"([0-9a-f]{32})$").unwrap());
    let path = value.split(['?', '#']).next().unwrap_or(value);
    let compact = canonical_id(path);
    match re.captures(&compact).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => value.to_string(),
    }
}
