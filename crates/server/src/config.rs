use std::{fs, path::PathBuf};

use serde::Deserialize;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub data_path: String,
    pub allowed_origin: String,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".into(),
            data_path: "square.json".into(),
            allowed_origin: "http://localhost:5173".into(),
            max_body_bytes: 16 * 1024,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    data_path: Option<String>,
    allowed_origin: Option<String>,
    max_body_bytes: Option<usize>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<FileSettings>(raw) else {
        tracing::warn!("ignoring malformed {SETTINGS_FILE}");
        return;
    };
    if let Some(v) = file_cfg.bind_addr {
        settings.bind_addr = v;
    }
    if let Some(v) = file_cfg.data_path {
        settings.data_path = v;
    }
    if let Some(v) = file_cfg.allowed_origin {
        settings.allowed_origin = v;
    }
    if let Some(v) = file_cfg.max_body_bytes {
        settings.max_body_bytes = v;
    }
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Some(v) = var("SQUARE_DATA_PATH") {
        settings.data_path = v;
    }
    if let Some(v) = var("APP__DATA_PATH") {
        settings.data_path = v;
    }

    if let Some(v) = var("APP__ALLOWED_ORIGIN") {
        settings.allowed_origin = v;
    }

    if let Some(v) = var("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }
}

/// Blank falls back to the default file; Windows separators are normalized.
pub fn normalize_data_path(raw_data_path: &str) -> PathBuf {
    let raw_data_path = raw_data_path.trim();
    if raw_data_path.is_empty() {
        return PathBuf::from(Settings::default().data_path);
    }
    PathBuf::from(raw_data_path.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
