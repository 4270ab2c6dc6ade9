use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

const DEFAULT_BIND: &str = "127.0.0.1:8443";
const DEFAULT_DATABASE_URL: &str = "sqlite://./data/petwalking.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    /// Prefix for blob URLs handed to clients. Empty means host-relative.
    pub public_base_url: String,
    pub jwt_secret: String,
    pub session_ttl_seconds: i64,
    pub max_upload_bytes: usize,
}

/// Defaults, then `server.toml`, then `APP__*`, then the legacy
/// `SERVER_BIND` / `DATABASE_URL` variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = settings_from("server.toml", "APP")?;

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }

    Ok(settings)
}

fn settings_from(config_file: &str, env_prefix: &str) -> anyhow::Result<Settings> {
    Config::builder()
        .set_default("server_bind", DEFAULT_BIND)?
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("public_base_url", "")?
        .set_default("jwt_secret", "devsecret")?
        .set_default("session_ttl_seconds", 7 * 24 * 3600_i64)?
        .set_default("max_upload_bytes", 8 * 1024 * 1024_i64)?
        .add_source(File::new(config_file, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read settings from '{config_file}'"))?
        .try_deserialize()
        .context("invalid server settings")
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
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

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
