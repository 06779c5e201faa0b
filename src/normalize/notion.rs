// src/normalize/notion.rs
//! Notion page properties → `SourceRecord`.
//!
//! Databases have user-defined schemas, so each field is looked up under a
//! short list of conventional property names; the first present and
//! non-empty one wins.

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::status::notion_status;
use super::{normalize_description, normalize_text, NormalizationWarning, NormalizeOptions, UNTITLED};
use crate::ingest::providers::notion::NotionPage;
use crate::model::{Source, SourceRecord, SourceRef, TaskStatus};

const TITLE_KEYS: &[&str] = &["Name", "Title", "Task", "name", "title"];
const STATUS_KEYS: &[&str] = &["Status", "status"];
const DUE_KEYS: &[&str] = &["Due Date", "Due", "Deadline", "due_date"];
const ASSIGNEE_KEYS: &[&str] = &["Assignee", "Assigned to", "Owner", "assignee"];
const LABEL_KEYS: &[&str] = &["Tags", "Labels", "Category", "tags"];
const DESCRIPTION_KEYS: &[&str] = &["Description", "Notes", "Summary", "description"];

type Props = Map<String, Value>;

pub fn normalize_page(page: NotionPage, opts: &NormalizeOptions) -> (SourceRecord, Vec<NormalizationWarning>) {
    let props = &page.properties;
    let source_id = page.id.clone();
    let mut warnings = Vec::new();

    let title = match first(props, TITLE_KEYS, title_of).or_else(|| any_title(props)) {
        Some(t) => t,
        None => {
            warnings.push(NormalizationWarning::new(Source::Notion, &source_id, "page has no title"));
            UNTITLED.to_string()
        }
    };

    let native = first(props, STATUS_KEYS, status_name_of);
    let (status, canonical_status) = match (page.archived, native) {
        (true, _) => ("archived".to_string(), TaskStatus::Closed),
        (false, None) => (String::new(), TaskStatus::Open),
        (false, Some(name)) => {
            let canonical = notion_status(&name).unwrap_or_else(|| {
                warnings.push(NormalizationWarning::new(
                    Source::Notion,
                    &source_id,
                    format!("unknown status '{name}', treating as open"),
                ));
                TaskStatus::Open
            });
            (name, canonical)
        }
    };

    let due_date = match first(props, DUE_KEYS, date_start_of) {
        Some(raw) => match parse_date(&raw) {
            Some(d) => Some(d),
            None => {
                warnings.push(NormalizationWarning::new(
                    Source::Notion,
                    &source_id,
                    format!("unparseable due date '{raw}'"),
                ));
                None
            }
        },
        None => None,
    };

    let mut links = BTreeSet::new();
    if let Some(field) = opts.notion_github_id_field.as_deref() {
        if let Some(number) = props.get(field).and_then(github_ref_of) {
            links.insert(SourceRef::new(Source::Github, number));
        }
    }

    let url = page
        .url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("https://www.notion.so/{}", page.id.replace('-', "")));

    let record = SourceRecord {
        source: Source::Notion,
        source_id,
        title,
        description: first(props, DESCRIPTION_KEYS, rich_text_of).and_then(|d| normalize_description(&d)),
        labels: first(props, LABEL_KEYS, labels_of).unwrap_or_default(),
        assignee: first(props, ASSIGNEE_KEYS, first_person_of),
        due_date,
        status,
        canonical_status,
        url,
        created_at: page.created_time,
        updated_at: page.last_edited_time,
        links,
    };
    (record, warnings)
}

fn first<T>(props: &Props, keys: &[&str], extract: impl Fn(&Value) -> Option<T>) -> Option<T> {
    keys.iter().filter_map(|k| props.get(*k)).find_map(extract)
}

fn prop_type(v: &Value) -> &str {
    v.get("type").and_then(Value::as_str).unwrap_or_default()
}

fn plain_text(parts: &Value) -> String {
    parts
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|p| p.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn title_of(v: &Value) -> Option<String> {
    if prop_type(v) != "title" {
        return None;
    }
    let t = normalize_text(&plain_text(v.get("title")?));
    (!t.is_empty()).then_some(t)
}

/// Databases always have exactly one title property, whatever its name.
fn any_title(props: &Props) -> Option<String> {
    props.values().find_map(title_of)
}

fn status_name_of(v: &Value) -> Option<String> {
    let inner = match prop_type(v) {
        "status" => v.get("status")?,
        "select" => v.get("select")?,
        _ => return None,
    };
    let name = normalize_text(inner.get("name")?.as_str()?);
    (!name.is_empty()).then_some(name)
}

fn date_start_of(v: &Value) -> Option<String> {
    if prop_type(v) != "date" {
        return None;
    }
    v.get("date")?.get("start")?.as_str().map(str::to_string)
}

/// `start` is either a date or a full timestamp; only the calendar date matters.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn first_person_of(v: &Value) -> Option<String> {
    if prop_type(v) != "people" {
        return None;
    }
    let person = v.get("people")?.as_array()?.first()?;
    let name = person
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| person.get("person")?.get("email")?.as_str())?;
    let name = normalize_text(name);
    (!name.is_empty()).then_some(name)
}

fn labels_of(v: &Value) -> Option<BTreeSet<String>> {
    let names: Vec<&Value> = match prop_type(v) {
        "multi_select" => v.get("multi_select")?.as_array()?.iter().collect(),
        "select" => vec![v.get("select")?],
        _ => return None,
    };
    let set: BTreeSet<String> = names
        .into_iter()
        .filter_map(|o| o.get("name").and_then(Value::as_str))
        .map(normalize_text)
        .filter(|s| !s.is_empty())
        .collect();
    (!set.is_empty()).then_some(set)
}

fn rich_text_of(v: &Value) -> Option<String> {
    if prop_type(v) != "rich_text" {
        return None;
    }
    let t = plain_text(v.get("rich_text")?);
    (!t.trim().is_empty()).then_some(t)
}

/// GitHub issue reference held in a number, text or url property.
fn github_ref_of(v: &Value) -> Option<String> {
    let raw = match prop_type(v) {
        "number" => return v.get("number")?.as_f64().filter(|n| *n >= 1.0).map(|n| (n as u64).to_string()),
        "rich_text" => plain_text(v.get("rich_text")?),
        "url" => v.get("url")?.as_str()?.to_string(),
        _ => return None,
    };
    issue_number_in(&raw)
}

fn issue_number_in(raw: &str) -> Option<String> {
    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    let re = RE_NUM.get_or_init(|| Regex::new(r"(?:/issues/|#|^\s*)(\d+)\s*$").unwrap());
    re.captures(raw.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(props: Value) -> NotionPage {
        NotionPage {
            id: "1a2b3c4d-1111-2222-3333-444455556666".into(),
            url: Some("https://www.notion.so/Fix-1a2b3c4d111122223333444455556666".into()),
            created_time: None,
            last_edited_time: None,
            archived: false,
            properties: props.as_object().cloned().unwrap_or_default(),
        }
    }

    fn opts() -> NormalizeOptions {
        NormalizeOptions {
            github_notion_id_field: None,
            notion_github_id_field: Some("GitHub Issue".into()),
        }
    }

    #[test]
    fn extracts_conventional_properties() {
        let p = page(json!({
            "Name": {"type": "title", "title": [{"plain_text": "Fix "}, {"plain_text": "login bug"}]},
            "Status": {"type": "status", "status": {"name": "In progress"}},
            "Due": {"type": "date", "date": {"start": "2026-03-05T10:00:00.000+01:00"}},
            "Owner": {"type": "people", "people": [{"name": "Ada"}, {"name": "Bob"}]},
            "Tags": {"type": "multi_select", "multi_select": [{"name": "bug"}, {"name": "urgent"}]},
            "Notes": {"type": "rich_text", "rich_text": [{"plain_text": "repro on safari"}]},
            "GitHub Issue": {"type": "url", "url": "https://github.com/acme/app/issues/42"}
        }));
        let (r, w) = normalize_page(p, &opts());
        assert!(w.is_empty());
        assert_eq!(r.title, "Fix login bug");
        assert_eq!(r.status, "In progress");
        assert_eq!(r.canonical_status, TaskStatus::InProgress);
        assert_eq!(r.due_date, NaiveDate::from_ymd_opt(2026, 3, 5));
        assert_eq!(r.assignee.as_deref(), Some("Ada"));
        assert_eq!(r.labels.len(), 2);
        assert_eq!(r.description.as_deref(), Some("repro on safari"));
        assert!(r.links.contains(&SourceRef::new(Source::Github, "42")));
    }

    #[test]
    fn select_status_and_number_link() {
        let p = page(json!({
            "Task": {"type": "title", "title": [{"plain_text": "Ship"}]},
            "status": {"type": "select", "select": {"name": "Completed"}},
            "GitHub Issue": {"type": "number", "number": 7}
        }));
        let (r, _) = normalize_page(p, &opts());
        assert_eq!(r.canonical_status, TaskStatus::Done);
        assert!(r.links.contains(&SourceRef::new(Source::Github, "7")));
    }

    #[test]
    fn missing_title_is_kept_with_placeholder() {
        let (r, w) = normalize_page(page(json!({})), &opts());
        assert_eq!(r.title, UNTITLED);
        assert_eq!(r.canonical_status, TaskStatus::Open);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn unknown_status_warns() {
        let p = page(json!({
            "Name": {"type": "title", "title": [{"plain_text": "x"}]},
            "Status": {"type": "status", "status": {"name": "Blocked"}}
        }));
        let (r, w) = normalize_page(p, &opts());
        assert_eq!(r.canonical_status, TaskStatus::Open);
        assert_eq!(w.len(), 1);
        assert!(w[0].message.contains("Blocked"));
    }

    #[test]
    fn archived_pages_are_closed() {
        let mut p = page(json!({
            "Name": {"type": "title", "title": [{"plain_text": "old"}]},
            "Status": {"type": "status", "status": {"name": "In progress"}}
        }));
        p.archived = true;
        let (r, _) = normalize_page(p, &opts());
        assert_eq!(r.canonical_status, TaskStatus::Closed);
    }

    #[test]
    fn issue_refs_in_text() {
        assert_eq!(issue_number_in("#12").as_deref(), Some("12"));
        assert_eq!(issue_number_in("acme/app#12").as_deref(), Some("12"));
        assert_eq!(issue_number_in(" 12 ").as_deref(), Some("12"));
        assert_eq!(issue_number_in("see ticket"), None);
    }
}
