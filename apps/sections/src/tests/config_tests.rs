use super::*;

use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn missing_file_gives_defaults() {
    let mut settings = Settings::default();
    apply_env(&mut settings, vars(&[])).expect("env");

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.store, StoreKind::Sqlite);
    assert_eq!(settings.user_id, "local");
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
store = "realtime"
realtime_url = "https://garden.example.com"
user_id = "alice"
"#,
    )
    .expect("file");

    assert_eq!(settings.store, StoreKind::Realtime);
    assert_eq!(
        settings.realtime_url.as_deref(),
        Some("https://garden.example.com")
    );
    assert_eq!(settings.user_id, "alice");
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn environment_overrides_file() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "user_id = \"alice\"\nlog_filter = \"warn\"").expect("file");
    apply_env(
        &mut settings,
        vars(&[
            ("SECTIONS_USER_ID", "bob"),
            ("SECTIONS_STORE", "Memory"),
            ("RUST_LOG", "debug"),
        ]),
    )
    .expect("env");

    assert_eq!(settings.user_id, "bob");
    assert_eq!(settings.store, StoreKind::Memory);
    assert_eq!(settings.log_filter, "debug");
}

#[test]
fn unknown_store_is_rejected() {
    let mut settings = Settings::default();

    assert!(apply_file(&mut settings, "store = \"postgres\"").is_err());
    assert!(apply_env(&mut settings, vars(&[("SECTIONS_STORE", "cloud")])).is_err());
}

#[test]
fn realtime_store_needs_a_url() {
    let settings = Settings {
        store: StoreKind::Realtime,
        ..Settings::default()
    };
    assert!(validate(&settings).is_err());

    let settings = Settings {
        store: StoreKind::Realtime,
        realtime_url: Some("https://garden.example.com".to_string()),
        ..Settings::default()
    };
    assert!(validate(&settings).is_ok());
    assert!(validate(&Settings::default()).is_ok());
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        prepare_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        prepare_database_url("sqlite:C:\\garden\\sections.db"),
        "sqlite://C:/garden/sections.db"
    );
    assert_eq!(prepare_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(prepare_database_url("  "), Settings::default().database_url);
}

#[test]
fn reads_settings_from_a_config_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("sections_config_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("sections.toml");
    fs::write(&path, "database_url = \"sqlite://./garden.db\"\n").expect("write");

    let settings = load_settings(&path).expect("load");
    let missing = load_settings(&temp_root.join("absent.toml"));

    fs::remove_dir_all(temp_root).expect("cleanup");
    // environment may still override the url on a developer machine
    if env::var("SECTIONS_DATABASE_URL").is_err() {
        assert_eq!(settings.database_url, "sqlite://./garden.db");
    }
    assert!(missing.is_ok());
}
