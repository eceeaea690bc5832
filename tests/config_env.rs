// tests/config_env.rs
// Run serially because we mutate process env (serial_test).
//
// Covered:
// - COMPETITORS_CONFIG_PATH loading and the missing-path error
// - Settings defaults and clamping
// - channels without settings are reported as not configured

use std::env;
use std::io::Write as _;

use serial_test::serial;

use competitor_tracker::config::{Settings, SourceKind, SourceRegistry};
use competitor_tracker::Dispatcher;

/// Small RAII helper to snapshot & restore env vars in each test.
struct EnvSnapshot {
    saved: Vec<(String, Option<String>)>,
}
impl EnvSnapshot {
    /// Provide a list of (KEY, Some(VALUE)) to set, or (KEY, None) to remove.
    fn set(pairs: &[(&str, Option<&str>)]) -> Self {
        let mut saved = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            saved.push((k.to_string(), env::var(k).ok()));
            match v {
                Some(val) => env::set_var(k, val),
                None => env::remove_var(k),
            }
        }
        Self { saved }
    }
}
impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        // reverse so a key listed twice ends at its original value
        for (k, maybe_v) in self.saved.drain(..).rev() {
            match maybe_v {
                Some(v) => env::set_var(&k, v),
                None => env::remove_var(&k),
            }
        }
    }
}

const CHANNEL_KEYS: [&str; 8] = [
    "SLACK_WEBHOOK_URL",
    "NOTION_API_KEY",
    "NOTION_PAGE_ID",
    "SMTP_HOST",
    "SMTP_USER",
    "SMTP_PASS",
    "EMAIL_FROM",
    "EMAIL_TO",
];

#[test]
#[serial]
fn registry_loads_from_env_path() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(
        file,
        r#"
[[competitor]]
name = "Acme"
changelog = "https://acme.test/changelog"
blog = "https://acme.test/blog"

[[competitor]]
name = "Globex"
github = {{ owner = "globex", repo = "engine" }}
"#
    )
    .expect("write toml");

    let path = file.path().to_string_lossy().to_string();
    let _env = EnvSnapshot::set(&[("COMPETITORS_CONFIG_PATH", Some(path.as_str()))]);

    let reg = SourceRegistry::load_default().expect("registry");
    assert_eq!(reg.len(), 3);
    assert_eq!(reg.competitors(), vec!["Acme", "Globex"]);
    let kinds: Vec<SourceKind> = reg.sources().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![SourceKind::Changelog, SourceKind::Blog, SourceKind::GitHub]
    );
}

#[test]
#[serial]
fn missing_registry_path_is_an_error() {
    let _env = EnvSnapshot::set(&[(
        "COMPETITORS_CONFIG_PATH",
        Some("/definitely/not/here/competitors.toml"),
    )]);
    let err = SourceRegistry::load_default().unwrap_err();
    assert!(err.to_string().contains("non-existent"));
}

#[test]
#[serial]
fn settings_defaults_and_clamps() {
    let _env = EnvSnapshot::set(&[
        ("TRACKER_DB_PATH", None),
        ("RUN_INTERVAL_SECS", Some("0")),
        ("DIGEST_DAYS", Some("9999")),
        ("RUN_BUDGET_SECS", Some("not-a-number")),
        ("GEMINI_API_KEY", None),
    ]);
    let s = Settings::from_env();
    assert_eq!(s.db_path.to_string_lossy(), "tracker.db");
    assert_eq!(s.run_interval_secs, 1);
    assert_eq!(s.digest_days, 365);
    assert_eq!(s.run_budget_secs, 600);
    assert!(!s.ai.enabled);
}

#[test]
#[serial]
fn unset_channels_are_not_configured() {
    let pairs: Vec<(&str, Option<&str>)> = CHANNEL_KEYS.iter().map(|k| (*k, None)).collect();
    let _env = EnvSnapshot::set(&pairs);

    let d = Dispatcher::from_env();
    assert!(d.channel_names().is_empty());
}

#[test]
#[serial]
fn malformed_slack_url_is_left_out() {
    let mut pairs: Vec<(&str, Option<&str>)> = CHANNEL_KEYS.iter().map(|k| (*k, None)).collect();
    pairs.push(("SLACK_WEBHOOK_URL", Some("hooks.slack.com/services/x")));
    let _env = EnvSnapshot::set(&pairs);

    let d = Dispatcher::from_env();
    assert!(!d.channel_names().contains(&"slack"));
}

#[test]
#[serial]
fn configured_slack_and_notion_are_loaded() {
    let mut pairs: Vec<(&str, Option<&str>)> = CHANNEL_KEYS.iter().map(|k| (*k, None)).collect();
    pairs.push(("SLACK_WEBHOOK_URL", Some("https://hooks.slack.test/services/x")));
    pairs.push(("NOTION_API_KEY", Some("secret")));
    pairs.push(("NOTION_PAGE_ID", Some("abc-123")));
    let _env = EnvSnapshot::set(&pairs);

    let d = Dispatcher::from_env();
    assert_eq!(d.channel_names(), vec!["slack", "notion"]);
}
