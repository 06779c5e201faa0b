// src/error.rs
//! Error taxonomy for a sync cycle.
//!
//! Source-scoped failures (`ConnectorError`) degrade one source; cycle-scoped
//! failures (`SyncError`) keep the last good snapshot serving.

use std::time::Duration;

use crate::model::Source;

/// Failure fetching from one external source.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("{source_name} request failed: {error}")]
    Http {
        source_name: Source,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_name} returned HTTP {status}: {body}")]
    Status {
        source_name: Source,
        status: u16,
        body: String,
    },

    #[error("{source_name} rate limited (retry after {retry_after:?})")]
    RateLimited {
        source_name: Source,
        retry_after: Option<Duration>,
    },

    #[error("{source_name} payload could not be decoded: {message}")]
    Decode { source_name: Source, message: String },

    #[error("{source_name} connector misconfigured: {message}")]
    Config { source_name: Source, message: String },

    #[error("{source_name} fetch task aborted: {message}")]
    Aborted { source_name: Source, message: String },
}

impl ConnectorError {
    pub fn source_name(&self) -> Source {
        match self {
            ConnectorError::Http { source_name, .. }
            | ConnectorError::Status { source_name, .. }
            | ConnectorError::RateLimited { source_name, .. }
            | ConnectorError::Decode { source_name, .. }
            | ConnectorError::Config { source_name, .. }
            | ConnectorError::Aborted { source_name, .. } => *source_name,
        }
    }

    /// Transient errors are worth retrying; the rest fail the source at once.
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::Http { error, .. } => {
                error.is_timeout() || error.is_connect() || error.is_request()
            }
            ConnectorError::Status { status, .. } => *status >= 500 || *status == 408,
            ConnectorError::RateLimited { .. } => true,
            ConnectorError::Decode { .. }
            | ConnectorError::Config { .. }
            | ConnectorError::Aborted { .. } => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ConnectorError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// A record ended up in zero or several groups. Programming error; fatal to the cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("reconciliation invariant violated: record {source_name}:{source_id} assigned to {groups} groups")]
    InvariantViolation {
        source_name: Source,
        source_id: String,
        groups: usize,
    },
}

/// Cycle-scoped failure. Cloneable so every joined trigger receives it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("no sources configured")]
    NoSources,

    #[error("all sources failed: {0}")]
    AllSourcesFailed(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("publish rejected: snapshot generation {attempted} is older than published {current}")]
    Publish { attempted: u64, current: u64 },

    #[error("sync cycle aborted: {0}")]
    Aborted(String),
}
