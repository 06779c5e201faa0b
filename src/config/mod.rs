// src/config/mod.rs
//! Layered settings: compiled defaults → TOML file → environment overrides.
//!
//! File lookup:
//! 1) $TASK_SYNC_CONFIG (must exist when set)
//! 2) config/task_sync.toml
//! 3) defaults only
//!
//! Secrets may be written as `"ENV"` in the file, meaning "read from the
//! matching environment variable" (GITHUB_TOKEN / NOTION_TOKEN / API_KEY).

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Source;
use crate::score::ScoringWeights;

pub const ENV_CONFIG_PATH: &str = "TASK_SYNC_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/task_sync.toml";

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_NOTION_API: &str = "https://api.notion.com";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_GITHUB_NOTION_ID_FIELD: &str = "notion_id";
pub const DEFAULT_NOTION_GITHUB_ID_FIELD: &str = "GitHub Issue";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub sync: SyncSettings,
    pub github: Option<GithubSettings>,
    pub notion: Option<NotionSettings>,
    pub fixtures: Vec<FixtureSettings>,
    pub reconcile: ReconcileSettings,
    pub scoring: ScoringWeights,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub cors_origins: Vec<String>,
    /// How long POST /api/sync waits for its cycle before answering 504.
    pub trigger_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_key: None,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "https://*.vercel.app".to_string(),
            ],
            trigger_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub interval_secs: u64,
    pub run_on_start: bool,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            run_on_start: true,
            request_timeout_secs: 20,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GithubSettings {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub api_base: String,
    /// Body field carrying a Notion page id, e.g. `notion_id: 1a2b...`.
    pub notion_id_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotionSettings {
    pub token: String,
    pub database_id: String,
    pub api_base: String,
    pub notion_version: String,
    /// Page property carrying a GitHub issue number.
    pub github_id_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixtureSettings {
    pub source: Source,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    #[default]
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkPatternSettings {
    pub from: Source,
    pub to: Source,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub primary_sources: Vec<Source>,
    pub matcher: MatcherKind,
    pub fuzzy_threshold: f64,
    /// Empty means "use the built-in GitHub/Notion URL patterns".
    pub link_patterns: Vec<LinkPatternSettings>,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            primary_sources: vec![Source::Github, Source::Notion],
            matcher: MatcherKind::Exact,
            fuzzy_threshold: 0.9,
            link_patterns: Vec::new(),
        }
    }
}

/* ----------------------------
File schema (all optional)
---------------------------- */

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    server: ServerSettings,
    sync: SyncSettings,
    github: Option<GithubFile>,
    notion: Option<NotionFile>,
    fixtures: Vec<FixtureSettings>,
    reconcile: ReconcileSettings,
    scoring: ScoringWeights,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GithubFile {
    token: Option<String>,
    repo: Option<String>,
    api_base: Option<String>,
    notion_id_field: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NotionFile {
    token: Option<String>,
    database_id: Option<String>,
    api_base: Option<String>,
    notion_version: Option<String>,
    github_id_field: Option<String>,
}

impl Settings {
    /// Load using the process environment.
    pub fn load() -> Result<Self> {
        let env = |k: &str| std::env::var(k).ok();
        let path = resolve_config_path(&env)?;
        Self::from_parts(path.as_deref(), &env)
    }

    /// Load from an explicit (optional) file plus an environment lookup.
    pub fn from_parts(path: Option<&Path>, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                let content = fs::read_to_string(p)
                    .with_context(|| format!("reading settings from {}", p.display()))?;
                toml::from_str::<SettingsFile>(&content)
                    .with_context(|| format!("parsing settings from {}", p.display()))?
            }
            None => SettingsFile::default(),
        };
        resolve(file, env)
    }

    /// Sources that will get a connector.
    pub fn enabled_sources(&self) -> Vec<Source> {
        let mut out = Vec::new();
        if self.github.is_some() {
            out.push(Source::Github);
        }
        if self.notion.is_some() {
            out.push(Source::Notion);
        }
        for f in &self.fixtures {
            if !out.contains(&f.source) {
                out.push(f.source);
            }
        }
        out.sort();
        out
    }
}

fn resolve_config_path(env: &dyn Fn(&str) -> Option<String>) -> Result<Option<PathBuf>> {
    if let Some(p) = env(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// `"ENV"` (any case) in the file defers to the environment variable.
fn secret(file_value: Option<String>, env_key: &str, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    let from_env = non_empty(env(env_key));
    match non_empty(file_value) {
        Some(v) if v.eq_ignore_ascii_case("env") => from_env,
        Some(v) => from_env.or(Some(v)),
        None => from_env,
    }
}

fn parse_env<T: std::str::FromStr>(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match non_empty(env(key)) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid {key}='{raw}': {e}")),
        None => Ok(None),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve(file: SettingsFile, env: &dyn Fn(&str) -> Option<String>) -> Result<Settings> {
    let mut server = file.server;
    server.api_key = secret(server.api_key.take(), "API_KEY", env);
    if let Some(host) = non_empty(env("API_HOST")) {
        server.host = host;
    }
    if let Some(port) = parse_env::<u16>(env, "API_PORT")? {
        server.port = port;
    }
    if let Some(origins) = non_empty(env("CORS_ORIGINS")) {
        server.cors_origins = split_list(&origins);
    }

    let mut sync = file.sync;
    if let Some(secs) = parse_env::<u64>(env, "SYNC_INTERVAL_SECS")? {
        sync.interval_secs = secs;
    }
    if sync.interval_secs == 0 {
        bail!("sync.interval_secs must be > 0");
    }

    let gh_file = file.github.unwrap_or_default();
    let gh_token = secret(gh_file.token, "GITHUB_TOKEN", env);
    let gh_repo = non_empty(env("GITHUB_REPO")).or(non_empty(gh_file.repo));
    let github = match (gh_token, gh_repo) {
        (Some(token), Some(repo)) => {
            let (owner, name) = repo
                .split_once('/')
                .filter(|(o, n)| !o.is_empty() && !n.is_empty())
                .ok_or_else(|| anyhow!("GITHUB_REPO must look like 'owner/name', got '{repo}'"))?;
            Some(GithubSettings {
                token,
                owner: owner.to_string(),
                repo: name.to_string(),
                api_base: non_empty(gh_file.api_base).unwrap_or_else(|| DEFAULT_GITHUB_API.to_string()),
                notion_id_field: non_empty(env("GITHUB_NOTION_ID_FIELD"))
                    .or(non_empty(gh_file.notion_id_field))
                    .or_else(|| Some(DEFAULT_GITHUB_NOTION_ID_FIELD.to_string())),
            })
        }
        _ => None,
    };

    let nt_file = file.notion.unwrap_or_default();
    let nt_token = secret(nt_file.token, "NOTION_TOKEN", env);
    let nt_db = non_empty(env("NOTION_DATABASE_ID")).or(non_empty(nt_file.database_id));
    let notion = match (nt_token, nt_db) {
        (Some(token), Some(database_id)) => Some(NotionSettings {
            token,
            database_id,
            api_base: non_empty(nt_file.api_base).unwrap_or_else(|| DEFAULT_NOTION_API.to_string()),
            notion_version: non_empty(nt_file.notion_version)
                .unwrap_or_else(|| DEFAULT_NOTION_VERSION.to_string()),
            github_id_field: non_empty(env("NOTION_GITHUB_ID_FIELD"))
                .or(non_empty(nt_file.github_id_field))
                .or_else(|| Some(DEFAULT_NOTION_GITHUB_ID_FIELD.to_string())),
        }),
        _ => None,
    };

    let mut reconcile = file.reconcile;
    if let Some(raw) = non_empty(env("PRIMARY_SOURCES")) {
        reconcile.primary_sources = split_list(&raw)
            .iter()
            .map(|s| s.parse::<Source>())
            .collect::<Result<Vec<_>, _>>()
            .context("parsing PRIMARY_SOURCES")?;
    }
    if !(0.0..=1.0).contains(&reconcile.fuzzy_threshold) {
        bail!("reconcile.fuzzy_threshold must be within 0..=1");
    }

    Ok(Settings {
        server,
        sync,
        github,
        notion,
        fixtures: file.fixtures,
        reconcile,
        scoring: file.scoring,
    })
}
