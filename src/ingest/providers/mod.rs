// src/ingest/providers/mod.rs
pub mod fixture;
pub mod github;
pub mod notion;

use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use std::time::Duration;

use crate::error::ConnectorError;
use crate::model::Source;

const ERROR_BODY_CAP: usize = 300;

/// Map non-2xx responses to `ConnectorError`, recognising rate limiting.
pub(crate) async fn check_response(source: Source, resp: Response) -> Result<Response, ConnectorError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if is_rate_limited(status, resp.headers()) {
        let retry_after = retry_after_from(resp.headers());
        tracing::warn!(%source, status = status.as_u16(), ?retry_after, "rate limited");
        return Err(ConnectorError::RateLimited {
            source_name: source,
            retry_after,
        });
    }

    let body = resp.text().await.unwrap_or_default();
    Err(ConnectorError::Status {
        source_name: source,
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_CAP).collect(),
    })
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    // GitHub signals primary rate limits with 403 + remaining=0.
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0")
}

/// `Retry-After` seconds, else GitHub's `x-ratelimit-reset` epoch.
pub(crate) fn retry_after_from(headers: &HeaderMap) -> Option<Duration> {
    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(secs));
    }
    headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|reset| {
            let wait = (reset - Utc::now().timestamp()).max(0);
            Duration::from_secs(u64::try_from(wait).unwrap_or(0))
        })
}

pub(crate) fn http_error(source: Source, error: reqwest::Error) -> ConnectorError {
    ConnectorError::Http {
        source_name: source,
        error,
    }
}

pub(crate) fn decode_error(source: Source, error: impl std::fmt::Display) -> ConnectorError {
    ConnectorError::Decode {
        source_name: source,
        message: error.to_string(),
    }
}
