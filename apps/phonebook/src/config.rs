use std::{collections::HashMap, fs, time::Duration};

use client_core::{DEFAULT_NOTIFICATION_TTL, DEFAULT_REQUEST_TIMEOUT};

const SETTINGS_FILE: &str = "phonebook.toml";

#[derive(Debug, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub notification_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3001/api/persons".into(),
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub fn load_settings() -> Settings {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(raw.as_deref(), |key| std::env::var(key).ok())
}

fn settings_from_sources(
    raw_file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = raw_file {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) {
            if let Some(v) = file_cfg.get("server_url").and_then(|v| v.as_str()) {
                settings.server_url = v.to_string();
            }
            if let Some(ms) = file_cfg
                .get("notification_ttl_ms")
                .and_then(|v| v.as_integer())
                .and_then(|v| u64::try_from(v).ok())
            {
                settings.notification_ttl = Duration::from_millis(ms);
            }
            if let Some(ms) = file_cfg
                .get("request_timeout_ms")
                .and_then(|v| v.as_integer())
                .and_then(|v| u64::try_from(v).ok())
            {
                settings.request_timeout = Duration::from_millis(ms);
            }
        }
    }

    if let Some(v) = env("PHONEBOOK_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(ms) = env("PHONEBOOK_NOTIFICATION_TTL_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.notification_ttl = Duration::from_millis(ms);
    }
    if let Some(ms) = env("PHONEBOOK_REQUEST_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.request_timeout = Duration::from_millis(ms);
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_sources() {
        assert_eq!(settings_from_sources(None, |_| None), Settings::default());
    }

    #[test]
    fn file_then_env_layering() {
        let raw = r#"
server_url = "http://phonebook.internal/api/persons"
notification_ttl_ms = 1500
request_timeout_ms = 800
"#;
        let settings = settings_from_sources(Some(raw), |key| {
            (key == "PHONEBOOK_NOTIFICATION_TTL_MS").then(|| "250".to_string())
        });
        assert_eq!(settings.server_url, "http://phonebook.internal/api/persons");
        assert_eq!(settings.notification_ttl, Duration::from_millis(250));
        assert_eq!(settings.request_timeout, Duration::from_millis(800));
    }

    #[test]
    fn malformed_env_values_are_ignored() {
        let settings = settings_from_sources(None, |key| {
            (key == "PHONEBOOK_REQUEST_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
