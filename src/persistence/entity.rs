//! Persisted entities: chats, their members and per-chat settings.

use crate::config::{
    SETTINGS_ANTISPAM_ENABLED_DEFAULT, SETTINGS_ANTISPAM_ENABLED_KEY,
    SETTINGS_TRIGGER_PROBABILITY_DEFAULT, SETTINGS_TRIGGER_PROBABILITY_KEY,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A chat specific key/value setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    /// Setting key, unique per chat
    pub key: String,
    /// Raw value
    pub value: String,
}

/// A user the bot has seen in at least one chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Telegram user id
    pub id: i64,
    /// Telegram username, without `@`
    pub username: Option<String>,
    /// First name as shown by Telegram
    pub first_name: String,
    /// First and last name
    pub full_name: String,
    /// Start of the most recent antispam timeout
    pub last_timeout: Option<DateTime<Utc>>,
    /// Whether the user is banned from interacting with the bot
    pub is_banned: bool,
}

impl User {
    /// Creates a user with only an id and a display name
    #[must_use]
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        let first_name = first_name.into();
        Self {
            id,
            username: None,
            full_name: first_name.clone(),
            first_name,
            last_timeout: None,
            is_banned: false,
        }
    }

    /// Sets the username
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Whether a timeout started at [`Self::last_timeout`] is still running at `now`
    #[must_use]
    pub fn is_timed_out(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        self.last_timeout
            .is_some_and(|started| now.signed_duration_since(started) < timeout)
    }

    /// Copies the profile fields of `other` while keeping moderation state
    pub fn merge_profile(&mut self, other: &Self) {
        self.username.clone_from(&other.username);
        self.first_name.clone_from(&other.first_name);
        self.full_name.clone_from(&other.full_name);
    }

    /// Human readable name, preferring `@username`
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.full_name.clone(),
        }
    }
}

/// A chat the bot is a member of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Telegram chat id
    pub id: i64,
    /// `private`, `group`, `supergroup` or `channel`
    pub chat_type: String,
    /// Known members, in the order they were first seen
    pub users: Vec<User>,
    /// Chat specific settings
    pub settings: Vec<Setting>,
}

impl Chat {
    /// Creates an empty chat
    #[must_use]
    pub fn new(id: i64, chat_type: impl Into<String>) -> Self {
        Self {
            id,
            chat_type: chat_type.into(),
            users: Vec::new(),
            settings: Vec::new(),
        }
    }

    /// Creates a chat seeded with the default antispam and trigger settings
    #[must_use]
    pub fn with_default_settings(id: i64, chat_type: impl Into<String>) -> Self {
        let mut chat = Self::new(id, chat_type);
        chat.set_setting(
            SETTINGS_ANTISPAM_ENABLED_KEY,
            SETTINGS_ANTISPAM_ENABLED_DEFAULT,
        );
        chat.set_setting(
            SETTINGS_TRIGGER_PROBABILITY_KEY,
            SETTINGS_TRIGGER_PROBABILITY_DEFAULT,
        );
        chat
    }

    /// Returns the value of `key`, or `default` if it is not set
    #[must_use]
    pub fn get_setting(&self, key: &str, default: &str) -> String {
        self.settings
            .iter()
            .find(|s| s.key == key)
            .map_or_else(|| default.to_string(), |s| s.value.clone())
    }

    /// Sets `key` to `value`, replacing an existing entry
    pub fn set_setting(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.settings.iter_mut().find(|s| s.key == key) {
            Some(setting) => setting.value = value,
            None => self.settings.push(Setting {
                key: key.to_string(),
                value,
            }),
        }
    }

    /// Configured trigger probability, clamped to `[0, 1]`
    #[must_use]
    pub fn trigger_probability(&self) -> f64 {
        let default = SETTINGS_TRIGGER_PROBABILITY_DEFAULT
            .parse::<f64>()
            .unwrap_or_default();
        self.get_setting(
            SETTINGS_TRIGGER_PROBABILITY_KEY,
            SETTINGS_TRIGGER_PROBABILITY_DEFAULT,
        )
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .unwrap_or(default)
        .clamp(0.0, 1.0)
    }

    /// Whether antispam protection is switched on
    #[must_use]
    pub fn antispam_enabled(&self) -> bool {
        !self
            .get_setting(
                SETTINGS_ANTISPAM_ENABLED_KEY,
                SETTINGS_ANTISPAM_ENABLED_DEFAULT,
            )
            .trim()
            .eq_ignore_ascii_case("off")
    }

    /// Whether this is a one-to-one chat with the bot
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.chat_type == "private"
    }

    /// Returns the member with the given id
    #[must_use]
    pub fn member(&self, user_id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    /// Adds `user`, or refreshes the profile of an existing member
    pub fn upsert_member(&mut self, user: User) {
        match self.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => existing.merge_profile(&user),
            None => self.users.push(user),
        }
    }

    /// Removes a member; returns `true` if it was present
    pub fn remove_member(&mut self, user_id: i64) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.id != user_id);
        before != self.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_setting_twice_keeps_single_entry() {
        let mut chat = Chat::new(1, "group");
        chat.set_setting("TriggerChance", "0.5");
        chat.set_setting("TriggerChance", "0.5");
        chat.set_setting("TriggerChance", "0.7");

        assert_eq!(chat.settings.len(), 1);
        assert_eq!(chat.get_setting("TriggerChance", "0"), "0.7");
        assert_eq!(chat.get_setting("Missing", "fallback"), "fallback");
    }

    #[test]
    fn test_typed_settings() {
        let mut chat = Chat::with_default_settings(1, "group");
        assert!(chat.antispam_enabled());
        assert!((chat.trigger_probability() - 0.02).abs() < f64::EPSILON);

        chat.set_setting(SETTINGS_ANTISPAM_ENABLED_KEY, "off");
        chat.set_setting(SETTINGS_TRIGGER_PROBABILITY_KEY, "7");
        assert!(!chat.antispam_enabled());
        assert!((chat.trigger_probability() - 1.0).abs() < f64::EPSILON);

        chat.set_setting(SETTINGS_TRIGGER_PROBABILITY_KEY, "garbage");
        assert!((chat.trigger_probability() - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn test_upsert_member_keeps_moderation_state() {
        let mut chat = Chat::new(1, "group");
        let mut banned = User::new(7, "Markus");
        banned.is_banned = true;
        chat.upsert_member(banned);

        chat.upsert_member(User::new(7, "Markus R.").with_username("markus"));

        assert_eq!(chat.users.len(), 1);
        let member = chat.member(7).expect("member exists");
        assert!(member.is_banned);
        assert_eq!(member.first_name, "Markus R.");
        assert_eq!(member.display_name(), "@markus");

        assert!(chat.remove_member(7));
        assert!(!chat.remove_member(7));
    }

    #[test]
    fn test_timeout_window() {
        let start = Utc::now();
        let mut user = User::new(1, "A");
        assert!(!user.is_timed_out(start, TimeDelta::seconds(30)));

        user.last_timeout = Some(start);
        assert!(user.is_timed_out(start + TimeDelta::seconds(29), TimeDelta::seconds(30)));
        assert!(!user.is_timed_out(start + TimeDelta::seconds(30), TimeDelta::seconds(30)));
    }
}
