// tests/config_load.rs
use std::{env, fs};

use trend_radar::config::{AppConfig, ENV_CONFIG_PATH};
use trend_radar::frequency::{FrequencyPolicy, ENV_FREQUENCY_PATH};
use trend_radar::notify::{http_client, Channel, ChannelRegistry};
use trend_radar::report::ReportMode;
use trend_radar::TrendError;

const BASE: &str = r#"
[report]
mode = "current"

[notification.webhooks]
slack_webhook_url = "https://hooks.slack.test/abc"

[[platforms]]
id = "zhihu"
name = "Zhihu"
"#;

const OVERRIDE_KEYS: &[&str] = &[
    "REPORT_MODE",
    "PUSH_WINDOW_ENABLED",
    "PUSH_WINDOW_START",
    "NTFY_TOPIC",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
];

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_FREQUENCY_PATH);
    for k in OVERRIDE_KEYS {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn loads_from_env_path_and_applies_overrides() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trend.toml");
    fs::write(&path, BASE).unwrap();
    env::set_var(ENV_CONFIG_PATH, path.display().to_string());

    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.report.mode, ReportMode::Current);
    assert_eq!(cfg.platforms[0].display_name(), "Zhihu");

    env::set_var("REPORT_MODE", "incremental");
    env::set_var("PUSH_WINDOW_ENABLED", "true");
    env::set_var("PUSH_WINDOW_START", "07:30");
    env::set_var("NTFY_TOPIC", "  ");
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.report.mode, ReportMode::Incremental);
    assert!(cfg.notification.push_window.enabled);
    assert_eq!(cfg.notification.push_window.start, "07:30");
    assert_eq!(cfg.notification.webhooks.ntfy_topic, "", "blank values are ignored");

    clear_env();
}

#[serial_test::serial]
#[test]
fn invalid_push_window_from_env_is_fatal() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trend.toml");
    fs::write(&path, BASE).unwrap();
    env::set_var(ENV_CONFIG_PATH, path.display().to_string());
    env::set_var("PUSH_WINDOW_START", "25:99");

    let err = AppConfig::load().unwrap_err();
    assert!(matches!(err, TrendError::Configuration(_)), "{err}");
    clear_env();
}

#[serial_test::serial]
#[test]
fn missing_files_are_configuration_errors() {
    clear_env();
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    assert!(matches!(AppConfig::load(), Err(TrendError::Configuration(_))));
    assert!(matches!(
        FrequencyPolicy::load_default(),
        Err(TrendError::Configuration(_))
    ));

    // Fallback to ./config/frequency_words.txt
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/frequency_words.txt"), "rust\n").unwrap();
    let p = FrequencyPolicy::load_default().unwrap();
    assert_eq!(p.groups()[0].group_key, "rust");

    // Env wins over the fallback
    let custom = tmp.path().join("words.txt");
    fs::write(&custom, "tokio\n\nserde\n").unwrap();
    env::set_var(ENV_FREQUENCY_PATH, custom.display().to_string());
    assert_eq!(FrequencyPolicy::load_default().unwrap().groups().len(), 2);

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[tokio::test]
async fn registry_reflects_configured_credentials() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trend.toml");
    fs::write(&path, BASE).unwrap();
    env::set_var(ENV_CONFIG_PATH, path.display().to_string());
    env::set_var("TELEGRAM_BOT_TOKEN", "123:abc");

    // Token without chat id does not enable telegram.
    let cfg = AppConfig::load().unwrap();
    let client = http_client(None).unwrap();
    let reg = ChannelRegistry::from_config(&cfg, &client).unwrap();
    let names: Vec<&str> = reg.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["slack"]);

    env::set_var("TELEGRAM_CHAT_ID", "42");
    let cfg = AppConfig::load().unwrap();
    let reg = ChannelRegistry::from_config(&cfg, &client).unwrap();
    let names: Vec<&str> = reg.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["telegram", "slack"]);

    clear_env();
}
