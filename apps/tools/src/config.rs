use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use storage::DEFAULT_DATABASE_URL;
use thiserror::Error;

pub const SETTINGS_FILE: &str = "flashdeck.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub log_filter: String,
    pub animations: bool,
    /// Render answers as markdown rather than escaped plain text.
    pub markdown: bool,
    pub untrusted_content: bool,
    /// Location whose `?deck=` query selects the deck to study.
    pub location: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            log_filter: "info".into(),
            animations: false,
            markdown: false,
            untrusted_content: true,
            location: "flashdeck://study".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    log: Option<String>,
    animations: Option<bool>,
    markdown: Option<bool>,
    untrusted_content: Option<bool>,
    location: Option<String>,
}

/// A settings file that exists but could not be used; defaults apply instead.
#[derive(Debug, Error)]
#[error("settings file '{}' is invalid: {source}", path.display())]
pub struct SettingsFileError {
    pub path: PathBuf,
    #[source]
    pub source: toml::de::Error,
}

/// Settings plus the file problem, if any, for logging once tracing is up.
pub fn load_settings() -> (Settings, Option<SettingsFileError>) {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file, then environment overrides.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> (Settings, Option<SettingsFileError>) {
    let mut settings = Settings::default();
    let mut file_error = None;

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.log {
                    settings.log_filter = v;
                }
                if let Some(v) = file_cfg.animations {
                    settings.animations = v;
                }
                if let Some(v) = file_cfg.markdown {
                    settings.markdown = v;
                }
                if let Some(v) = file_cfg.untrusted_content {
                    settings.untrusted_content = v;
                }
                if let Some(v) = file_cfg.location {
                    settings.location = v;
                }
            }
            Err(source) => {
                file_error = Some(SettingsFileError {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    if let Some(v) = env("FLASHDECK_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("FLASHDECK_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__LOG") {
        settings.log_filter = v;
    }

    if let Some(v) = env("APP__ANIMATIONS").and_then(|v| parse_flag(&v)) {
        settings.animations = v;
    }
    if let Some(v) = env("APP__MARKDOWN").and_then(|v| parse_flag(&v)) {
        settings.markdown = v;
    }
    if let Some(v) = env("APP__UNTRUSTED_CONTENT").and_then(|v| parse_flag(&v)) {
        settings.untrusted_content = v;
    }
    if let Some(v) = env("APP__LOCATION") {
        settings.location = v;
    }

    (settings, file_error)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_file_and_env_yield_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (settings, file_error) =
            load_settings_from(&temp.path().join("absent.toml"), env_of(&[]));
        assert_eq!(settings, Settings::default());
        assert!(file_error.is_none());
    }

    #[test]
    fn file_values_apply_and_env_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            "database_url = \"sqlite://./file.db\"\nanimations = true\nlog = \"debug\"\n",
        )
        .expect("write settings");

        let (settings, file_error) = load_settings_from(&path, env_of(&[]));
        assert!(file_error.is_none());
        assert_eq!(settings.database_url, "sqlite://./file.db");
        assert!(settings.animations);
        assert_eq!(settings.log_filter, "debug");

        let (settings, _) = load_settings_from(
            &path,
            env_of(&[
                ("FLASHDECK_DATABASE_URL", "sqlite://./env.db"),
                ("APP__ANIMATIONS", "off"),
                ("APP__LOCATION", "flashdeck://study?deck=Caps"),
            ]),
        );
        assert_eq!(settings.database_url, "sqlite://./env.db");
        assert!(!settings.animations);
        assert_eq!(settings.location, "flashdeck://study?deck=Caps");
    }

    #[test]
    fn app_prefixed_variables_override_plain_ones() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (settings, _) = load_settings_from(
            &temp.path().join("absent.toml"),
            env_of(&[
                ("FLASHDECK_LOG", "warn"),
                ("APP__LOG", "trace"),
                ("APP__MARKDOWN", "maybe"),
            ]),
        );
        assert_eq!(settings.log_filter, "trace");
        assert!(!settings.markdown);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults_and_reports_the_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(SETTINGS_FILE);
        fs::write(&path, "animations = \"sometimes\"").expect("write settings");

        let (settings, file_error) =
            load_settings_from(&path, env_of(&[("APP__LOG", "debug")]));
        let file_error = file_error.expect("file error reported");
        assert_eq!(file_error.path, path);
        assert!(file_error.to_string().contains(SETTINGS_FILE));
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.database_url, Settings::default().database_url);
    }
}
