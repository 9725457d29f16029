//! Configuration and settings management
//!
//! Loads settings from configuration files and environment variables and
//! defines the per-chat setting keys together with their defaults.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Chat setting key: antispam on/off
pub const SETTINGS_ANTISPAM_ENABLED_KEY: &str = "AntiSpam";
/// Default value of [`SETTINGS_ANTISPAM_ENABLED_KEY`]
pub const SETTINGS_ANTISPAM_ENABLED_DEFAULT: &str = "on";
/// Chat setting key: global trigger probability
pub const SETTINGS_TRIGGER_PROBABILITY_KEY: &str = "TriggerChance";
/// Default value of [`SETTINGS_TRIGGER_PROBABILITY_KEY`]
pub const SETTINGS_TRIGGER_PROBABILITY_DEFAULT: &str = "0.02";

/// Maximum number of attempts for Telegram API calls
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff between Telegram API retries (milliseconds)
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 200;
/// Upper bound for the backoff between Telegram API retries (milliseconds)
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 2_000;

/// Inclusive range of counts, written as `1..10` or `[1..10]` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountRange {
    /// Lower bound (inclusive)
    pub min: usize,
    /// Upper bound (inclusive)
    pub max: usize,
}

impl CountRange {
    /// Creates a new range
    #[must_use]
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `value` lies inside the range
    #[must_use]
    pub const fn contains(&self, value: usize) -> bool {
        self.min <= value && value <= self.max
    }
}

impl FromStr for CountRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
        let (min, max) = trimmed
            .split_once("..")
            .ok_or_else(|| format!("invalid range '{s}', expected 'min..max'"))?;
        let min = min
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid range start in '{s}': {e}"))?;
        let max = max
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid range end in '{s}': {e}"))?;
        if min > max {
            return Err(format!("invalid range '{s}': start is greater than end"));
        }
        Ok(Self { min, max })
    }
}

impl TryFrom<String> for CountRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CountRange> for String {
    fn from(range: CountRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for CountRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

/// Antispam tuning
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AntiSpamSettings {
    /// Length of the trailing window in milliseconds
    #[serde(default = "default_antispam_window_ms")]
    pub window_ms: u64,
    /// Number of messages allowed inside the window
    #[serde(default = "default_antispam_message_threshold")]
    pub message_threshold: usize,
    /// How long a timeout lasts, in seconds
    #[serde(default = "default_antispam_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AntiSpamSettings {
    fn default() -> Self {
        Self {
            window_ms: default_antispam_window_ms(),
            message_threshold: default_antispam_message_threshold(),
            timeout_secs: default_antispam_timeout_secs(),
        }
    }
}

impl AntiSpamSettings {
    /// Window length as a [`Duration`]
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Timeout length as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Longest accepted antispam window (one day)
pub const ANTISPAM_MAX_WINDOW_MS: u64 = 24 * 60 * 60 * 1_000;
/// Longest accepted timeout (one year)
pub const ANTISPAM_MAX_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

impl AntiSpamSettings {
    /// Checks that every value lies in its supported range
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=ANTISPAM_MAX_WINDOW_MS).contains(&self.window_ms) {
            return Err(ConfigError::Message(format!(
                "antispam.window_ms must be between 1 and {ANTISPAM_MAX_WINDOW_MS}, got {}",
                self.window_ms
            )));
        }
        if !(1..=ANTISPAM_MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(ConfigError::Message(format!(
                "antispam.timeout_secs must be between 1 and {ANTISPAM_MAX_TIMEOUT_SECS}, got {}",
                self.timeout_secs
            )));
        }
        Ok(())
    }
}

const fn default_antispam_window_ms() -> u64 {
    1_000
}

const fn default_antispam_message_threshold() -> usize {
    5
}

const fn default_antispam_timeout_secs() -> u64 {
    30
}

/// Application settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// SQL connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Port of the Prometheus metrics endpoint
    #[serde(default = "default_stats_port")]
    pub stats_port: u16,

    /// Comma-separated list of usernames allowed to run admin commands anywhere
    #[serde(rename = "admin_usernames", default)]
    pub admin_usernames_str: Option<String>,

    /// Messages with a word count outside this range never trigger a response
    #[serde(default = "default_word_count_range")]
    pub word_count_range: CountRange,

    /// Messages with a length outside this range never trigger a response
    #[serde(default = "default_message_length_range")]
    pub message_length_range: CountRange,

    /// Antispam tuning
    #[serde(default)]
    pub antispam: AntiSpamSettings,
}

fn default_database_url() -> String {
    "sqlite://deinemudda.db".to_string()
}

const fn default_stats_port() -> u16 {
    8000
}

const fn default_word_count_range() -> CountRange {
    CountRange::new(1, 10)
}

const fn default_message_length_range() -> CountRange {
    CountRange::new(1, 300)
}

/// Builds the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/deinemudda").required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg. `DEINEMUDDA__ANTISPAM__TIMEOUT_SECS=60`
        .add_source(Environment::with_prefix("DEINEMUDDA").separator("__"))
        // Plain `TELEGRAM_TOKEN`, `DATABASE_URL`, ...
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from files and environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        if settings.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message("telegram_token is empty".into()));
        }
        settings.antispam.validate()?;
        Ok(settings)
    }

    /// Returns the lower-cased admin usernames, without a leading `@`
    #[must_use]
    pub fn admin_usernames(&self) -> HashSet<String> {
        self.admin_usernames_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .map(|token| token.trim_start_matches('@'))
                    .filter(|token| !token.is_empty())
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns `true` if `username` is a configured admin
    #[must_use]
    pub fn is_admin_username(&self, username: &str) -> bool {
        self.admin_usernames()
            .contains(&username.trim_start_matches('@').to_lowercase())
    }

    /// Whether a message is eligible for an automatic response
    #[must_use]
    pub fn accepts_message(&self, text: &str) -> bool {
        let words = text.split_whitespace().count();
        let length = text.chars().count();
        self.word_count_range.contains(words) && self.message_length_range.contains(length)
    }

    /// Renders the effective configuration as YAML with secrets masked
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_redacted_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut redacted = self.clone();
        redacted.telegram_token = mask_secret(&self.telegram_token);
        redacted.database_url = crate::logging::redact_url_password(&self.database_url);
        serde_yaml::to_string(&redacted)
    }
}

fn mask_secret(secret: &str) -> String {
    match secret.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:[MASKED]"),
        None => "[MASKED]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn settings() -> Settings {
        Settings {
            telegram_token: "123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11".to_string(),
            database_url: default_database_url(),
            stats_port: default_stats_port(),
            admin_usernames_str: None,
            word_count_range: default_word_count_range(),
            message_length_range: default_message_length_range(),
            antispam: AntiSpamSettings::default(),
        }
    }

    #[test]
    fn test_count_range_parsing() {
        assert_eq!("[1..10]".parse::<CountRange>(), Ok(CountRange::new(1, 10)));
        assert_eq!("2..5".parse::<CountRange>(), Ok(CountRange::new(2, 5)));
        assert_eq!(" 3 .. 3 ".parse::<CountRange>(), Ok(CountRange::new(3, 3)));
        assert!("10..1".parse::<CountRange>().is_err());
        assert!("ten".parse::<CountRange>().is_err());
        assert_eq!(CountRange::new(1, 10).to_string(), "1..10");
    }

    #[test]
    fn test_admin_usernames_parsing() {
        let mut settings = settings();
        settings.admin_usernames_str = Some("@Markus, alice;bob  carol".to_string());

        let admins = settings.admin_usernames();
        assert_eq!(admins.len(), 4);
        assert!(admins.contains("markus"));
        assert!(settings.is_admin_username("@ALICE"));
        assert!(!settings.is_admin_username("mallory"));
    }

    #[test]
    fn test_accepts_message_ranges() {
        let settings = settings();
        assert!(settings.accepts_message("wer war das?"));
        assert!(!settings.accepts_message(""));
        assert!(!settings.accepts_message("eins zwei drei vier fünf sechs sieben acht neun zehn elf"));
    }

    #[test]
    fn test_antispam_ranges_are_validated() {
        assert!(AntiSpamSettings::default().validate().is_ok());

        let huge_window = AntiSpamSettings {
            window_ms: u64::MAX,
            ..AntiSpamSettings::default()
        };
        assert!(huge_window.validate().is_err());

        let no_timeout = AntiSpamSettings {
            timeout_secs: 0,
            ..AntiSpamSettings::default()
        };
        assert!(no_timeout.validate().is_err());

        let huge_timeout = AntiSpamSettings {
            timeout_secs: ANTISPAM_MAX_TIMEOUT_SECS + 1,
            ..AntiSpamSettings::default()
        };
        assert!(huge_timeout.validate().is_err());
    }

    #[test]
    fn test_redacted_yaml_hides_token() -> Result<(), Box<dyn std::error::Error>> {
        let yaml = settings().to_redacted_yaml()?;
        assert!(yaml.contains("123456:[MASKED]"));
        assert!(!yaml.contains("ABC-DEF1234ghIkl"));
        assert!(yaml.contains("1..10"));
        Ok(())
    }

    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("DEINEMUDDA__TELEGRAM_TOKEN", "dummy_token");
        env::set_var("DEINEMUDDA__ANTISPAM__TIMEOUT_SECS", "45");
        env::set_var("DEINEMUDDA__WORD_COUNT_RANGE", "[2..4]");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.antispam.timeout_secs, 45);
        assert_eq!(settings.antispam.message_threshold, 5);
        assert_eq!(settings.word_count_range, CountRange::new(2, 4));

        env::remove_var("DEINEMUDDA__TELEGRAM_TOKEN");
        env::remove_var("DEINEMUDDA__ANTISPAM__TIMEOUT_SECS");
        env::remove_var("DEINEMUDDA__WORD_COUNT_RANGE");
        Ok(())
    }
}
