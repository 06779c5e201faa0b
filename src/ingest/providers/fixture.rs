// src/ingest/providers/fixture.rs
//! Replays captured API payloads from disk, for offline runs and demos.
//!
//! GitHub fixtures are the issues listing (a JSON array). Notion fixtures are
//! either a database query response (`{"results": [...]}`) or a bare page array.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::decode_error;
use super::github::GithubIssue;
use super::notion::{NotionPage, QueryResponse};
use crate::error::ConnectorError;
use crate::ingest::types::{Connector, RawRecord};
use crate::model::Source;

pub struct FixtureConnector {
    source: Source,
    mode: Mode,
}

enum Mode {
    File(PathBuf),
    Inline(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NotionFixture {
    Query(QueryResponse),
    Pages(Vec<NotionPage>),
}

impl FixtureConnector {
    pub fn from_path(source: Source, path: impl AsRef<Path>) -> Self {
        Self {
            source,
            mode: Mode::File(path.as_ref().to_path_buf()),
        }
    }

    pub fn from_json(source: Source, content: &str) -> Self {
        Self {
            source,
            mode: Mode::Inline(content.to_string()),
        }
    }

    fn parse(&self, content: &str) -> Result<Vec<RawRecord>, ConnectorError> {
        match self.source {
            Source::Github => {
                let issues: Vec<GithubIssue> =
                    serde_json::from_str(content).map_err(|e| decode_error(self.source, e))?;
                Ok(issues
                    .into_iter()
                    .filter(|i| !i.is_pull_request())
                    .map(RawRecord::Github)
                    .collect())
            }
            Source::Notion => {
                let pages = match serde_json::from_str::<NotionFixture>(content)
                    .map_err(|e| decode_error(self.source, e))?
                {
                    NotionFixture::Query(q) => q.results,
                    NotionFixture::Pages(p) => p,
                };
                Ok(pages.into_iter().map(RawRecord::Notion).collect())
            }
        }
    }
}

#[async_trait]
impl Connector for FixtureConnector {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, _since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, ConnectorError> {
        match &self.mode {
            Mode::Inline(s) => self.parse(s),
            Mode::File(p) => {
                let content = tokio::fs::read_to_string(p)
                    .await
                    .map_err(|e| ConnectorError::Config {
                        source_name: self.source,
                        message: format!("reading fixture {}: {e}", p.display()),
                    })?;
                self.parse(&content)
            }
        }
    }
}
