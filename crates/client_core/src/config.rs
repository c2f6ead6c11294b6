use std::{fs, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub ping_interval_ms: u64,
    pub probe_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            ping_interval_ms: 2000,
            probe_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    ping_interval_ms: Option<u64>,
    probe_timeout_ms: Option<u64>,
}

impl ClientSettings {
    /// Defaults, then the toml file at `path` if present, then `APP__*`
    /// environment variables.
    pub fn load_from(path: &str) -> Self {
        let mut settings = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            if let Err(error) = settings.apply_file_overrides(&raw) {
                warn!(path, %error, "ignoring unreadable client config");
            }
        }
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings
    }

    pub fn apply_file_overrides(&mut self, raw: &str) -> Result<()> {
        let file: FileSettings = toml::from_str(raw).context("invalid client config")?;
        if let Some(server_url) = file.server_url {
            self.server_url = server_url;
        }
        if let Some(ping_interval_ms) = file.ping_interval_ms {
            self.ping_interval_ms = ping_interval_ms;
        }
        if let Some(probe_timeout_ms) = file.probe_timeout_ms {
            self.probe_timeout_ms = probe_timeout_ms;
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(server_url) = var("APP__SERVER_URL") {
            self.server_url = server_url;
        }
        if let Some(ms) = var("APP__PING_INTERVAL_MS").and_then(|raw| parse_millis(&raw)) {
            self.ping_interval_ms = ms;
        }
        if let Some(ms) = var("APP__PROBE_TIMEOUT_MS").and_then(|raw| parse_millis(&raw)) {
            self.probe_timeout_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url '{}'", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("server url must use http or https"));
        }
        if self.ping_interval_ms == 0 || self.probe_timeout_ms == 0 {
            return Err(anyhow!("ping interval and probe timeout must be positive"));
        }
        Ok(url)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

fn parse_millis(raw: &str) -> Option<u64> {
    match raw.trim().parse() {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!(value = raw, "ignoring non-numeric duration override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
