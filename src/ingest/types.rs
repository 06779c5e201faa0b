// src/ingest/types.rs
use chrono::{DateTime, Utc};

use crate::error::ConnectorError;
use crate::ingest::providers::github::GithubIssue;
use crate::ingest::providers::notion::NotionPage;
use crate::model::Source;

/// Connector-specific intermediate representation, exactly as the source API shaped it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Github(GithubIssue),
    Notion(NotionPage),
}

impl RawRecord {
    pub fn source(&self) -> Source {
        match self {
            RawRecord::Github(_) => Source::Github,
            RawRecord::Notion(_) => Source::Notion,
        }
    }
}

/// One external system. Pure I/O and pagination; no merge logic.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    fn source(&self) -> Source;

    /// Page through the source until exhausted. `since` narrows to records
    /// updated after that instant when the API supports it.
    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, ConnectorError>;
}
