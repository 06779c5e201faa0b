//! GitHub connector.
//!
//! Pulls every issue (open and closed) of one repository from the REST API v3,
//! page by page. Pull requests show up in the issues listing and are skipped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

use super::{check_response, decode_error, http_error};
use crate::config::GithubSettings;
use crate::error::ConnectorError;
use crate::ingest::types::{Connector, RawRecord};
use crate::model::Source;

const PER_PAGE: u32 = 100;
const MAX_PAGES: u32 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubLabel {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubMilestone {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub due_on: Option<DateTime<Utc>>,
}

/// Issue as returned by `GET /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub state_reason: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<GithubLabel>,
    #[serde(default)]
    pub assignee: Option<GithubUser>,
    #[serde(default)]
    pub milestone: Option<GithubMilestone>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl GithubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Clone)]
pub struct GithubConnector {
    client: Client,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
    per_page: u32,
}

impl GithubConnector {
    pub fn new(settings: &GithubSettings, timeout: Duration) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| http_error(Source::Github, e))?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
            per_page: PER_PAGE,
        })
    }

    /// Smaller pages make pagination observable in tests.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, PER_PAGE);
        self
    }

    fn headers(&self) -> Result<HeaderMap, ConnectorError> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_static("task-sync"));
        h.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        h.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
        let auth = format!("Bearer {}", self.token);
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| ConnectorError::Config {
                source_name: Source::Github,
                message: format!("invalid github token header: {e}"),
            })?,
        );
        Ok(h)
    }

    async fn fetch_page(
        &self,
        headers: &HeaderMap,
        page: u32,
        since: Option<&str>,
    ) -> Result<Vec<GithubIssue>, ConnectorError> {
        let url = format!("{}/repos/{}/{}/issues", self.api_base, self.owner, self.repo);
        let per_page = self.per_page.to_string();
        let page_s = page.to_string();
        let mut query = vec![
            ("state", "all"),
            ("per_page", per_page.as_str()),
            ("page", page_s.as_str()),
        ];
        if let Some(s) = since {
            query.push(("since", s));
        }

        let resp = self
            .client
            .get(&url)
            .headers(headers.clone())
            .query(&query)
            .send()
            .await
            .map_err(|e| http_error(Source::Github, e))?;
        let resp = check_response(Source::Github, resp).await?;
        resp.json::<Vec<GithubIssue>>()
            .await
            .map_err(|e| decode_error(Source::Github, e))
    }
}

#[async_trait]
impl Connector for GithubConnector {
    fn source(&self) -> Source {
        Source::Github
    }

    #[instrument(level = "info", skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, ConnectorError> {
        let t0 = std::time::Instant::now();
        let headers = self.headers()?;
        let since_str = since.map(|s| s.to_rfc3339());

        let mut out = Vec::new();
        let mut page = 1;
        loop {
            let issues = self.fetch_page(&headers, page, since_str.as_deref()).await?;
            let got = issues.len();
            out.extend(
                issues
                    .into_iter()
                    .filter(|i| !i.is_pull_request())
                    .map(RawRecord::Github),
            );

            if got < self.per_page as usize {
                break;
            }
            if page >= MAX_PAGES {
                tracing::warn!(pages = page, "github pagination cap reached; remaining pages skipped");
                break;
            }
            page += 1;
        }

        histogram!("ingest_fetch_ms", "source" => "github").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_records_total", "source" => "github").increment(out.len() as u64);
        tracing::debug!(records = out.len(), pages = page, "github fetch done");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_issue_payload_and_flags_prs() {
        let json = r#"[
          {"number": 42, "title": "Fix login bug", "body": null, "state": "open",
           "html_url": "https://github.com/acme/app/issues/42",
           "labels": [{"name": "bug"}], "assignee": {"login": "octo"},
           "milestone": {"title": "v1", "due_on": "2026-04-01T07:00:00Z"},
           "created_at": "2026-01-01T00:00:00Z", "updated_at": "2026-01-02T00:00:00Z"},
          {"number": 43, "title": "PR", "state": "open",
           "html_url": "https://github.com/acme/app/pull/43",
           "pull_request": {"url": "x"}}
        ]"#;
        let issues: Vec<GithubIssue> = serde_json::from_str(json).unwrap();
        assert_eq!(issues.len(), 2);
        assert!(!issues[0].is_pull_request());
        assert!(issues[1].is_pull_request());
        assert_eq!(issues[0].assignee.as_ref().unwrap().login, "octo");
        assert!(issues[0].milestone.as_ref().unwrap().due_on.is_some());
    }
}
