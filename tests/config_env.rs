// tests/config_env.rs
//
// Settings::load against the real process environment. Serialized because
// the tests mutate env vars.

use std::{env, fs};

use task_sync::config::{MatcherKind, Settings, ENV_CONFIG_PATH};
use task_sync::Source;

const VARS: &[&str] = &[
    ENV_CONFIG_PATH,
    "GITHUB_TOKEN",
    "GITHUB_REPO",
    "NOTION_TOKEN",
    "NOTION_DATABASE_ID",
    "API_KEY",
    "API_HOST",
    "API_PORT",
    "CORS_ORIGINS",
    "SYNC_INTERVAL_SECS",
    "PRIMARY_SOURCES",
];

fn clear_env() {
    for k in VARS {
        env::remove_var(k);
    }
}

const FILE: &str = r#"
[server]
port = 8123
api_key = "ENV"

[sync]
interval_secs = 120

[github]
token = "ENV"
repo = "acme/app"

[notion]
token = "ENV"
database_id = "db-from-file"

[reconcile]
matcher = "fuzzy"
fuzzy_threshold = 0.85
"#;

#[serial_test::serial]
#[test]
fn file_plus_env_secrets() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("task_sync.toml");
    fs::write(&path, FILE).unwrap();

    env::set_var(ENV_CONFIG_PATH, &path);
    env::set_var("GITHUB_TOKEN", "ghp_env");
    env::set_var("NOTION_TOKEN", "secret_env");
    env::set_var("API_KEY", "k1");

    let s = Settings::load().expect("settings");
    assert_eq!(s.server.port, 8123);
    assert_eq!(s.server.api_key.as_deref(), Some("k1"));
    assert_eq!(s.sync.interval_secs, 120);

    let gh = s.github.as_ref().expect("github enabled");
    assert_eq!(gh.token, "ghp_env");
    assert_eq!((gh.owner.as_str(), gh.repo.as_str()), ("acme", "app"));
    let nt = s.notion.as_ref().expect("notion enabled");
    assert_eq!(nt.database_id, "db-from-file");

    assert_eq!(s.reconcile.matcher, MatcherKind::Fuzzy);
    assert_eq!(s.enabled_sources(), vec![Source::Github, Source::Notion]);
    clear_env();
}

#[serial_test::serial]
#[test]
fn env_marker_without_env_disables_source() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("task_sync.toml");
    fs::write(&path, FILE).unwrap();
    env::set_var(ENV_CONFIG_PATH, &path);
    env::set_var("NOTION_TOKEN", "secret_env");

    let s = Settings::load().expect("settings");
    assert!(s.github.is_none(), "no GITHUB_TOKEN means no github connector");
    assert!(s.server.api_key.is_none());
    assert_eq!(s.enabled_sources(), vec![Source::Notion]);
    clear_env();
}

#[serial_test::serial]
#[test]
fn env_overrides_and_validation() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("task_sync.toml");
    fs::write(&path, FILE).unwrap();
    env::set_var(ENV_CONFIG_PATH, &path);
    env::set_var("API_PORT", "9100");
    env::set_var("SYNC_INTERVAL_SECS", "30");
    env::set_var("PRIMARY_SOURCES", "notion, github");

    let s = Settings::load().expect("settings");
    assert_eq!(s.server.port, 9100);
    assert_eq!(s.sync.interval_secs, 30);
    assert_eq!(s.reconcile.primary_sources, vec![Source::Notion, Source::Github]);

    env::set_var("API_PORT", "not-a-port");
    assert!(Settings::load().is_err());
    env::remove_var("API_PORT");

    env::set_var("SYNC_INTERVAL_SECS", "0");
    assert!(Settings::load().is_err());
    env::remove_var("SYNC_INTERVAL_SECS");

    env::set_var("PRIMARY_SOURCES", "jira");
    assert!(Settings::load().is_err());
    clear_env();
}

#[serial_test::serial]
#[test]
fn missing_config_path_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    env::set_var(ENV_CONFIG_PATH, dir.path().join("nope.toml"));
    let err = Settings::load().unwrap_err();
    assert!(err.to_string().contains(ENV_CONFIG_PATH), "{err:#}");
    clear_env();
}
