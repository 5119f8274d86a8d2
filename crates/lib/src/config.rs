//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.parley/config.json`) and environment.
//! Tokens may come from the environment so the file can be committed without secrets.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::survey::{LanguagePack, DEFAULT_LANGUAGE};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Channel settings (Telegram, VK).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Survey language and record storage.
    #[serde(default)]
    pub survey: SurveyConfig,
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
    #[serde(default)]
    pub vk: VkChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Bot API base URL (default https://api.telegram.org), e.g. for a local Bot API server.
    pub api_base: Option<String>,
}

/// VK community bot config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VkChannelConfig {
    /// Community access token. Overridden by VK_BOT_TOKEN env when set.
    pub token: Option<String>,
    /// Community (group) id for Bots Long Poll. Resolved from the token via groups.getById when unset.
    pub group_id: Option<String>,
    /// VK API version (default 5.199).
    pub api_version: Option<String>,
}

/// Survey settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyConfig {
    /// Bundled language pack name ("en" or "ru"). Default "en".
    pub language: Option<String>,
    /// Path to a YAML language pack; takes precedence over `language`. Relative paths are resolved against the config file's parent.
    pub language_pack: Option<PathBuf>,
    /// JSON Lines file that submitted surveys are appended to. Relative paths are resolved against the config file's parent. Default `records.jsonl`.
    pub records_path: Option<PathBuf>,
}

fn env_token(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_token(token: Option<&String>) -> Option<String> {
    token.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    env_token("TELEGRAM_BOT_TOKEN").or_else(|| config_token(config.channels.telegram.bot_token.as_ref()))
}

/// Resolve the VK community token: env VK_BOT_TOKEN overrides config.
pub fn resolve_vk_token(config: &Config) -> Option<String> {
    env_token("VK_BOT_TOKEN").or_else(|| config_token(config.channels.vk.token.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PARLEY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".parley").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Directory holding the config file (`.` when the path has no parent).
pub fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn resolve_relative(config_path: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        config_dir(config_path).join(p)
    }
}

/// Where submitted surveys are appended.
pub fn resolve_records_path(config: &Config, config_path: &Path) -> PathBuf {
    match &config.survey.records_path {
        Some(p) if !p.as_os_str().is_empty() => resolve_relative(config_path, p),
        _ => config_dir(config_path).join("records.jsonl"),
    }
}

/// Load the configured language pack: `languagePack` file, else the bundled `language`, else English.
pub fn resolve_language_pack(config: &Config, config_path: &Path) -> Result<LanguagePack> {
    if let Some(p) = config.survey.language_pack.as_ref().filter(|p| !p.as_os_str().is_empty()) {
        return LanguagePack::load(&resolve_relative(config_path, p));
    }
    let language = config
        .survey
        .language
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE);
    LanguagePack::bundled(language)
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used (for resolving relative paths).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_sections() {
        let config: Config = serde_json::from_str(
            r#"{
                "channels": {
                    "telegram": { "botToken": " abc " },
                    "vk": { "token": "t", "groupId": "123" }
                },
                "survey": { "language": "ru", "recordsPath": "out/records.jsonl" }
            }"#,
        )
        .unwrap();
        assert_eq!(config_token(config.channels.telegram.bot_token.as_ref()).as_deref(), Some("abc"));
        assert_eq!(config.channels.vk.group_id.as_deref(), Some("123"));
        assert_eq!(config.survey.language.as_deref(), Some("ru"));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.channels.telegram.bot_token.is_none());
        assert!(config.survey.records_path.is_none());
    }

    #[test]
    fn blank_config_token_is_none() {
        assert_eq!(config_token(Some(&"   ".to_string())), None);
    }

    #[test]
    fn records_path_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.parley/config.json");
        assert_eq!(
            resolve_records_path(&config, path),
            PathBuf::from("/home/user/.parley/records.jsonl")
        );
    }

    #[test]
    fn records_path_override_relative() {
        let mut config = Config::default();
        config.survey.records_path = Some(PathBuf::from("data/out.jsonl"));
        let path = Path::new("/home/user/.parley/config.json");
        assert_eq!(
            resolve_records_path(&config, path),
            PathBuf::from("/home/user/.parley/data/out.jsonl")
        );
    }

    #[test]
    fn records_path_override_absolute() {
        let mut config = Config::default();
        config.survey.records_path = Some(PathBuf::from("/var/lib/parley/records.jsonl"));
        let path = Path::new("/home/user/.parley/config.json");
        assert_eq!(
            resolve_records_path(&config, path),
            PathBuf::from("/var/lib/parley/records.jsonl")
        );
    }

    #[test]
    fn language_pack_defaults_to_english() {
        let config = Config::default();
        let pack = resolve_language_pack(&config, Path::new("config.json")).unwrap();
        assert_eq!(pack, LanguagePack::bundled("en").unwrap());
    }

    #[test]
    fn language_pack_by_name() {
        let mut config = Config::default();
        config.survey.language = Some("ru".to_string());
        let pack = resolve_language_pack(&config, Path::new("config.json")).unwrap();
        assert_eq!(pack.labels.no, "Нет");
    }

    #[test]
    fn missing_language_pack_file_is_an_error() {
        let mut config = Config::default();
        config.survey.language_pack = Some(PathBuf::from("/nonexistent/pack.yaml"));
        assert!(resolve_language_pack(&config, Path::new("config.json")).is_err());
    }
}
