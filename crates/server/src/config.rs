use std::{collections::HashMap, fs};

use serde::Deserialize;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3001".into(),
            database_url: "sqlite://./data/phonebook.db".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let file_cfg = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(file_cfg.as_deref(), |key| std::env::var(key).ok())
}

/// Layers defaults, the optional TOML file and environment variables, later
/// sources winning.
fn settings_from_sources(
    raw_file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = raw_file {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.server_bind = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url").filter(|v| !v.trim().is_empty()) {
                settings.database_url = v.clone();
            }
        }
    }

    if let Some(v) = env("PORT") {
        if let Ok(port) = v.parse::<u16>() {
            settings.server_bind = format!("0.0.0.0:{port}");
        }
    }
    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    // Blank database urls keep the previous layer's value.
    let non_blank = |v: &String| !v.trim().is_empty();
    if let Some(v) = env("DATABASE_URL").filter(non_blank) {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL").filter(non_blank) {
        settings.database_url = v;
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
