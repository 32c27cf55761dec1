//! # Feature: Runtime Settings
//!
//! Settings for the bot process: which command document to load, which
//! transport to attach to and how to log. Read from a YAML file with
//! environment variable interpolation, or from environment variables alone.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: YAML settings with `${VAR}` interpolation and env fallback

use crate::bot::DEFAULT_PREFIX;
use crate::transport::irc::{self, IrcSettings};
use crate::transport::TransportKind;
use anyhow::{Context, Result};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Default settings file looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "bot.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Path of the JSON command document
    #[serde(default = "default_commands_file")]
    pub commands_file: String,

    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default = "default_irc_host")]
    pub irc_host: String,

    #[serde(default = "default_irc_port")]
    pub irc_port: u16,

    /// Bot account name (required for IRC)
    #[serde(default)]
    pub nick: Option<String>,

    /// OAuth token; takes precedence over `token_file`
    #[serde(default)]
    pub token: Option<String>,

    /// File holding the OAuth token
    #[serde(default)]
    pub token_file: Option<String>,

    /// Channel to join, including the leading `#`
    #[serde(default)]
    pub channel: Option<String>,

    /// Sent to the channel once the bot has joined
    #[serde(default)]
    pub join_message: Option<String>,

    /// File of extra approved users, one name per line
    #[serde(default)]
    pub approved_users_file: Option<String>,

    #[serde(default = "default_prefix")]
    pub command_prefix: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions for serde
fn default_commands_file() -> String {
    "commands.json".to_string()
}

fn default_irc_host() -> String {
    irc::DEFAULT_HOST.to_string()
}

fn default_irc_port() -> u16 {
    irc::DEFAULT_PORT
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BotSettings {
    fn default() -> Self {
        BotSettings {
            commands_file: default_commands_file(),
            transport: TransportKind::default(),
            irc_host: default_irc_host(),
            irc_port: default_irc_port(),
            nick: None,
            token: None,
            token_file: None,
            channel: None,
            join_message: None,
            approved_users_file: None,
            command_prefix: default_prefix(),
            log_level: default_log_level(),
        }
    }
}

impl BotSettings {
    /// Load settings from a YAML file with environment variable interpolation
    ///
    /// Supports `${VAR_NAME}` and `${VAR_NAME:-default}`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let interpolated = interpolate_env_vars(&content)?;

        let settings: BotSettings = serde_yaml::from_str(&interpolated)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        settings.validate()?;

        info!(
            "Loaded settings from {} ({:?} transport)",
            path.display(),
            settings.transport
        );

        Ok(settings)
    }

    /// Build settings from `BOT_*` environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = BotSettings::default();
        let transport = match env::var("BOT_TRANSPORT") {
            Ok(value) => match value.to_lowercase().as_str() {
                "irc" => TransportKind::Irc,
                "console" => TransportKind::Console,
                other => anyhow::bail!("Invalid BOT_TRANSPORT '{}'. Use: irc, console", other),
            },
            Err(_) => defaults.transport,
        };
        let irc_port = match env::var("BOT_IRC_PORT") {
            Ok(port) => port
                .parse()
                .with_context(|| format!("Invalid BOT_IRC_PORT '{port}'"))?,
            Err(_) => defaults.irc_port,
        };

        let settings = BotSettings {
            commands_file: env::var("BOT_COMMANDS_FILE").unwrap_or(defaults.commands_file),
            transport,
            irc_host: env::var("BOT_IRC_HOST").unwrap_or(defaults.irc_host),
            irc_port,
            nick: env::var("BOT_NICK").ok(),
            token: env::var("BOT_TOKEN").ok(),
            token_file: env::var("BOT_TOKEN_FILE").ok(),
            channel: env::var("BOT_CHANNEL").ok(),
            join_message: env::var("BOT_JOIN_MESSAGE").ok(),
            approved_users_file: env::var("BOT_APPROVED_USERS_FILE").ok(),
            command_prefix: env::var("BOT_COMMAND_PREFIX").unwrap_or(defaults.command_prefix),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Auto-detect and load settings
    ///
    /// Priority order:
    /// 1. If CONFIG_FILE env var is set, load from that file
    /// 2. If bot.yaml exists in current directory, load from it
    /// 3. Fall back to environment variables
    pub fn auto_load() -> Result<Self> {
        if let Ok(config_path) = env::var("CONFIG_FILE") {
            info!("Loading settings from CONFIG_FILE: {}", config_path);
            return Self::from_file(&config_path);
        }

        if Path::new(DEFAULT_SETTINGS_FILE).exists() {
            info!("Loading settings from {}", DEFAULT_SETTINGS_FILE);
            return Self::from_file(DEFAULT_SETTINGS_FILE);
        }

        info!("No settings file found, using environment variables");
        Self::from_env()
    }

    pub fn validate(&self) -> Result<()> {
        if self.commands_file.is_empty() {
            anyhow::bail!("commands_file is required");
        }
        if self.command_prefix.is_empty() || self.command_prefix.contains(char::is_whitespace) {
            anyhow::bail!(
                "Invalid command_prefix '{}': must be non-empty with no whitespace",
                self.command_prefix
            );
        }

        if self.transport == TransportKind::Irc {
            if self.nick.as_deref().unwrap_or_default().is_empty() {
                anyhow::bail!("nick is required for the irc transport");
            }
            match self.channel.as_deref() {
                Some(channel) if irc::channel_host(channel).is_some() => {}
                Some(channel) => anyhow::bail!("Invalid channel '{}': expected '#name'", channel),
                None => anyhow::bail!("channel is required for the irc transport"),
            }
            if self.token.is_none() && self.token_file.is_none() {
                anyhow::bail!("token or token_file is required for the irc transport");
            }
        }

        Ok(())
    }

    /// The channel owner, who is always approved for restricted commands
    pub fn channel_host(&self) -> Option<&str> {
        self.channel.as_deref().and_then(irc::channel_host)
    }

    /// Users listed in `approved_users_file`; empty when none is configured
    pub fn approved_users(&self) -> Result<Vec<String>> {
        let Some(path) = &self.approved_users_file else {
            return Ok(Vec::new());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read approved users file: {path}"))?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Resolve IRC connection settings, reading the token file if needed
    pub fn irc_settings(&self) -> Result<IrcSettings> {
        let password = match (&self.token, &self.token_file) {
            (Some(token), _) => token.clone(),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read token file: {path}"))?
                .trim()
                .to_string(),
            (None, None) => anyhow::bail!("token or token_file is required for the irc transport"),
        };

        Ok(IrcSettings {
            host: self.irc_host.clone(),
            port: self.irc_port,
            nick: self.nick.clone().context("nick is required for the irc transport")?,
            password,
            channel: self.channel.clone().context("channel is required for the irc transport")?,
        })
    }
}

// ============================================================================
// Environment Variable Interpolation
// ============================================================================

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex")
});

/// Interpolate environment variables in a string
///
/// Supports `${VAR_NAME}`. If a variable is not set, returns an error.
/// Use `${VAR_NAME:-default}` for default values.
fn interpolate_env_vars(content: &str) -> Result<String> {
    let mut errors = Vec::new();

    let result = ENV_VAR.replace_all(content, |cap: &regex::Captures| {
        let var_name = &cap[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    errors.push(format!("Environment variable '{}' is not set", var_name));
                    String::new()
                }
            },
        }
    });

    if !errors.is_empty() {
        anyhow::bail!("Missing environment variables:\n  - {}", errors.join("\n  - "));
    }

    Ok(result.into_owned())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn irc_settings() -> BotSettings {
        BotSettings {
            nick: Some("helper_bot".to_string()),
            token: Some("oauth:abc".to_string()),
            channel: Some("#host".to_string()),
            ..BotSettings::default()
        }
    }

    #[test]
    fn test_interpolate_env_vars_simple() {
        env::set_var("CHATBOT_TEST_VAR_1", "value1");
        let result = interpolate_env_vars("key: ${CHATBOT_TEST_VAR_1}").unwrap();
        assert_eq!(result, "key: value1");
        env::remove_var("CHATBOT_TEST_VAR_1");
    }

    #[test]
    fn test_interpolate_env_vars_with_default() {
        env::remove_var("CHATBOT_NONEXISTENT_VAR");
        let result = interpolate_env_vars("key: ${CHATBOT_NONEXISTENT_VAR:-default_value}").unwrap();
        assert_eq!(result, "key: default_value");
    }

    #[test]
    fn test_interpolate_env_vars_missing_no_default() {
        env::remove_var("CHATBOT_MISSING_VAR_FOR_TEST");
        let result = interpolate_env_vars("key: ${CHATBOT_MISSING_VAR_FOR_TEST}");
        assert!(result.unwrap_err().to_string().contains("CHATBOT_MISSING_VAR_FOR_TEST"));
    }

    #[test]
    fn test_settings_from_yaml() {
        env::set_var("CHATBOT_TEST_TOKEN", "oauth:xyz");

        let yaml = r##"
commands_file: "stream_commands.json"
nick: "helper_bot"
token: "${CHATBOT_TEST_TOKEN}"
channel: "#host"
join_message: "Logging on..."
"##;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.yaml");
        fs::write(&path, yaml).unwrap();
        let settings = BotSettings::from_file(&path).unwrap();

        assert_eq!(settings.commands_file, "stream_commands.json");
        assert_eq!(settings.transport, TransportKind::Irc);
        assert_eq!(settings.token.as_deref(), Some("oauth:xyz"));
        assert_eq!(settings.irc_port, irc::DEFAULT_PORT);
        assert_eq!(settings.command_prefix, "!");
        assert_eq!(settings.channel_host(), Some("host"));

        env::remove_var("CHATBOT_TEST_TOKEN");
    }

    #[test]
    fn test_console_needs_no_irc_fields() {
        let settings: BotSettings = serde_yaml::from_str("transport: console").unwrap();
        assert_eq!(settings.transport, TransportKind::Console);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_irc_validation() {
        assert!(irc_settings().validate().is_ok());

        let missing_nick = BotSettings { nick: None, ..irc_settings() };
        assert!(missing_nick.validate().unwrap_err().to_string().contains("nick"));

        let bad_channel = BotSettings { channel: Some("host".to_string()), ..irc_settings() };
        assert!(bad_channel.validate().is_err());

        let no_token = BotSettings { token: None, ..irc_settings() };
        assert!(no_token.validate().is_err());
    }

    #[test]
    fn test_prefix_validation() {
        let settings = BotSettings {
            command_prefix: "! ".to_string(),
            ..irc_settings()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_approved_users_file() {
        assert!(BotSettings::default().approved_users().unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.txt");
        fs::write(&path, "mod1\n\n  mod2 \r\n").unwrap();

        let settings = BotSettings {
            approved_users_file: Some(path.display().to_string()),
            ..BotSettings::default()
        };
        assert_eq!(settings.approved_users().unwrap(), vec!["mod1", "mod2"]);

        let missing = BotSettings {
            approved_users_file: Some(dir.path().join("nope.txt").display().to_string()),
            ..BotSettings::default()
        };
        assert!(missing.approved_users().unwrap_err().to_string().contains("nope.txt"));
    }

    #[test]
    fn test_irc_settings_reads_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.token");
        fs::write(&path, "oauth:from-file\n").unwrap();

        let settings = BotSettings {
            token: None,
            token_file: Some(path.display().to_string()),
            ..irc_settings()
        };
        let irc = settings.irc_settings().unwrap();
        assert_eq!(irc.password, "oauth:from-file");
        assert_eq!(irc.channel, "#host");
        assert_eq!(irc.host, irc::DEFAULT_HOST);
    }
}
