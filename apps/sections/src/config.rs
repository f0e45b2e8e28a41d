use std::{fmt, fs, io, path::Path, str::FromStr};

use anyhow::{anyhow, bail, Context};
use clap::ValueEnum;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Memory,
    Sqlite,
    Realtime,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreKind::Memory => "memory",
            StoreKind::Sqlite => "sqlite",
            StoreKind::Realtime => "realtime",
        })
    }
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "sqlite" => Ok(StoreKind::Sqlite),
            "realtime" => Ok(StoreKind::Realtime),
            other => Err(anyhow!(
                "unknown store '{other}', expected memory, sqlite or realtime"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store: StoreKind,
    pub database_url: String,
    pub realtime_url: Option<String>,
    pub realtime_auth: Option<String>,
    pub user_id: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreKind::Sqlite,
            database_url: "sqlite://./data/sections.db".into(),
            realtime_url: None,
            realtime_auth: None,
            user_id: "local".into(),
            log_filter: "info".into(),
        }
    }
}

/// Keys accepted in `sections.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    store: Option<String>,
    database_url: Option<String>,
    realtime_url: Option<String>,
    realtime_auth: Option<String>,
    user_id: Option<String>,
    log_filter: Option<String>,
}

/// Defaults, then `path` if it exists, then `SECTIONS_*` / `RUST_LOG`.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.store {
        settings.store = v.parse()?;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.realtime_url {
        settings.realtime_url = Some(v);
    }
    if let Some(v) = file_cfg.realtime_auth {
        settings.realtime_auth = Some(v);
    }
    if let Some(v) = file_cfg.user_id {
        settings.user_id = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = var("SECTIONS_STORE") {
        settings.store = v.parse().context("SECTIONS_STORE")?;
    }
    if let Some(v) = var("SECTIONS_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("SECTIONS_REALTIME_URL") {
        settings.realtime_url = Some(v);
    }
    if let Some(v) = var("SECTIONS_REALTIME_AUTH") {
        settings.realtime_auth = Some(v);
    }
    if let Some(v) = var("SECTIONS_USER_ID") {
        settings.user_id = v;
    }
    if let Some(v) = var("RUST_LOG") {
        settings.log_filter = v;
    }
    Ok(())
}

/// Checks that the selected store has what it needs.
pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    if settings.store == StoreKind::Realtime
        && settings
            .realtime_url
            .as_deref()
            .map_or(true, |url| url.trim().is_empty())
    {
        bail!("the realtime store needs realtime_url (or SECTIONS_REALTIME_URL)");
    }
    Ok(())
}

pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
