use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_FILE: &str = "codewatch.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Messages older than this many days are not scanned.
    pub lookback_days: u32,
    /// Per-source cap for newest-first sources.
    pub message_limit: usize,
    /// Reject all-digit candidates.
    pub letter_requirement: bool,
    pub lexicon_case_sensitive: bool,
    /// Replaces the built-in ignore list.
    pub ignore_file: Option<PathBuf>,
    pub ignore_extra: Vec<String>,
    pub known_codes_path: PathBuf,
    pub journal_path: PathBuf,
    pub http_timeout_secs: u64,
    pub reddit: RedditSettings,
    pub discord: DiscordSettings,
    pub telegram: TelegramSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub subreddits: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    pub token: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    pub title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            lookback_days: 3,
            message_limit: 10,
            letter_requirement: true,
            lexicon_case_sensitive: true,
            ignore_file: None,
            ignore_extra: Vec::new(),
            known_codes_path: PathBuf::from("known_codes.txt"),
            journal_path: PathBuf::from("data/codewatch.sqlite"),
            http_timeout_secs: 30,
            reddit: RedditSettings::default(),
            discord: DiscordSettings::default(),
            telegram: TelegramSettings::default(),
        }
    }
}

impl Default for RedditSettings {
    fn default() -> Self {
        RedditSettings {
            subreddits: vec!["Tacticus_Codes".into(), "WarhammerTacticus".into()],
        }
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        TelegramSettings {
            bot_token: None,
            channel_id: None,
            title: "New Tacticus Code Found!".into(),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file (explicit path must exist, the default
    /// one may not), then `CODEWATCH_*` variables, then the bare credential
    /// variables for anything still unset.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let mut settings: Settings = Config::builder()
            .add_source(file_source)
            .add_source(env_source())
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.fill_credentials(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn fill_credentials(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fill = |slot: &mut Option<String>, key: &str| {
            if slot.as_deref().map_or(true, str::is_empty) {
                *slot = lookup(key).filter(|v| !v.is_empty());
            }
        };
        fill(&mut self.telegram.bot_token, "TELEGRAM_BOT_TOKEN");
        fill(&mut self.telegram.channel_id, "TELEGRAM_CHANNEL_ID");
        fill(&mut self.discord.token, "DISCORD_USER_TOKEN");
        fill(&mut self.discord.channel_id, "DISCORD_CHANNEL_ID");
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("CODEWATCH")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("reddit.subreddits")
        .with_list_parse_key("ignore_extra")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_without_any_file() {
        let s = Settings::default();
        assert_eq!(s.lookback_days, 3);
        assert_eq!(s.message_limit, 10);
        assert!(s.letter_requirement);
        assert_eq!(s.reddit.subreddits.len(), 2);
        assert!(s.telegram.bot_token.is_none());
    }

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codewatch.toml");
        std::fs::write(
            &path,
            r#"
lookback_days = 5
letter_requirement = false
ignore_extra = ["GUARD", "OMEGA"]

[reddit]
subreddits = ["SomeGame"]

[discord]
channel_id = "123"
"#,
        )
        .unwrap();

        let s: Settings = Config::builder()
            .add_source(File::from(path.as_path()))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(s.lookback_days, 5);
        assert!(!s.letter_requirement);
        assert_eq!(s.message_limit, 10);
        assert_eq!(s.ignore_extra, vec!["GUARD", "OMEGA"]);
        assert_eq!(s.reddit.subreddits, vec!["SomeGame"]);
        assert_eq!(s.discord.channel_id.as_deref(), Some("123"));
        assert_eq!(s.telegram.title, "New Tacticus Code Found!");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(dir.path().join("absent.toml").as_path())).is_err());
    }

    #[test]
    fn bare_env_names_fill_only_empty_credentials() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "tok"),
            ("TELEGRAM_CHANNEL_ID", "@chan"),
            ("DISCORD_USER_TOKEN", ""),
        ]);
        let mut s = Settings::default();
        s.telegram.channel_id = Some("@configured".into());
        s.fill_credentials(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(s.telegram.bot_token.as_deref(), Some("tok"));
        assert_eq!(s.telegram.channel_id.as_deref(), Some("@configured"));
        assert!(s.discord.token.is_none());
    }
}
