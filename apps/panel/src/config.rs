use std::{fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use shared::domain::PanelConfig;

/// Address the divisor head serves on its own access point.
pub const DEFAULT_BASE_URL: &str = "http://192.168.4.1";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub max_rpm: u32,
    pub min_rpm: u32,
    pub resolution: f64,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        let panel = PanelConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            max_rpm: panel.max_rpm,
            min_rpm: panel.min_rpm,
            resolution: panel.resolution,
            poll_interval_ms: 1_000,
            request_timeout_ms: None,
        }
    }
}

impl Settings {
    pub fn panel_config(&self) -> PanelConfig {
        PanelConfig {
            max_rpm: self.max_rpm,
            min_rpm: self.min_rpm,
            resolution: self.resolution,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    base_url: Option<String>,
    max_rpm: Option<u32>,
    min_rpm: Option<u32>,
    resolution: Option<f64>,
    poll_interval_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    validate(&settings)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.max_rpm {
        settings.max_rpm = v;
    }
    if let Some(v) = file_cfg.min_rpm {
        settings.min_rpm = v;
    }
    if let Some(v) = file_cfg.resolution {
        settings.resolution = v;
    }
    if let Some(v) = file_cfg.poll_interval_ms {
        settings.poll_interval_ms = v;
    }
    if file_cfg.request_timeout_ms.is_some() {
        settings.request_timeout_ms = file_cfg.request_timeout_ms;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("DIVISOR_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = lookup("APP__BASE_URL") {
        settings.base_url = v;
    }

    if let Some(v) = lookup("DIVISOR_MAX_RPM") {
        settings.max_rpm = parse_env("DIVISOR_MAX_RPM", &v)?;
    }
    if let Some(v) = lookup("DIVISOR_MIN_RPM") {
        settings.min_rpm = parse_env("DIVISOR_MIN_RPM", &v)?;
    }
    if let Some(v) = lookup("DIVISOR_RESOLUTION") {
        settings.resolution = parse_env("DIVISOR_RESOLUTION", &v)?;
    }
    if let Some(v) = lookup("DIVISOR_POLL_INTERVAL_MS") {
        settings.poll_interval_ms = parse_env("DIVISOR_POLL_INTERVAL_MS", &v)?;
    }
    if let Some(v) = lookup("DIVISOR_REQUEST_TIMEOUT_MS") {
        settings.request_timeout_ms = Some(parse_env("DIVISOR_REQUEST_TIMEOUT_MS", &v)?);
    }

    Ok(())
}

fn parse_env<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| anyhow!("{key}='{raw}' is not valid: {err}"))
}

pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    client_core::transport::parse_base_url(&settings.base_url)?;
    if settings.min_rpm > settings.max_rpm {
        return Err(anyhow!(
            "min_rpm ({}) must not exceed max_rpm ({})",
            settings.min_rpm,
            settings.max_rpm
        ));
    }
    if settings.poll_interval_ms == 0 {
        return Err(anyhow!("poll_interval_ms must be greater than zero"));
    }
    if settings.request_timeout_ms == Some(0) {
        return Err(anyhow!("request_timeout_ms must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
