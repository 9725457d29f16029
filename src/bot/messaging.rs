//! Reply texts and their formatting.

use crate::bot::resilient::send_message_resilient;
use crate::config::{
    SETTINGS_ANTISPAM_ENABLED_DEFAULT, SETTINGS_ANTISPAM_ENABLED_KEY,
    SETTINGS_TRIGGER_PROBABILITY_DEFAULT, SETTINGS_TRIGGER_PROBABILITY_KEY,
};
use crate::persistence::{Chat, EntityCounts, User};
use crate::stats::{sum_samples, MESSAGES_COUNT, RESPONSES_COUNT};
use crate::utils;
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt::Write;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};

/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Bold, upper-cased and with three exclamation marks
#[must_use]
pub fn shout_text(text: &str) -> String {
    format!(
        "<b>{}!!!</b>",
        html_escape::encode_text(&text.to_uppercase())
    )
}

/// Shouts `text` into a chat, optionally as a reply
///
/// # Errors
///
/// Returns an error if the message cannot be sent after retries.
pub async fn shout(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    reply_to: Option<MessageId>,
) -> Result<Message> {
    send_message_resilient(bot, chat_id, shout_text(text), Some(ParseMode::Html), reply_to).await
}

/// Sends plain text, truncated to the Telegram limit
///
/// # Errors
///
/// Returns an error if the message cannot be sent after retries.
pub async fn send_plain(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    send_message_resilient(
        bot,
        chat_id,
        utils::truncate_str(text, TELEGRAM_MESSAGE_LIMIT),
        None,
        None,
    )
    .await?;
    Ok(())
}

/// Sends HTML text
///
/// # Errors
///
/// Returns an error if the message cannot be sent after retries.
pub async fn send_html(bot: &Bot, chat_id: ChatId, html: &str) -> Result<()> {
    send_message_resilient(bot, chat_id, html, Some(ParseMode::Html), None).await?;
    Ok(())
}

/// Warning sent to a user who was just timed out
#[must_use]
pub fn spam_warning(name: &str) -> String {
    format!(
        "{}: <b>Stop spamming or I will kick you!</b>",
        html_escape::encode_text(name)
    )
}

/// Notice sent after a user was banned for spamming
#[must_use]
pub fn ban_notice(name: &str) -> String {
    format!(
        "{} has been banned for spamming.",
        html_escape::encode_text(name)
    )
}

/// Formats a probability as a percentage without float noise
#[must_use]
pub fn format_percent(probability: f64) -> String {
    let percent = (probability * 100.0 * 1_000_000.0).round() / 1_000_000.0;
    format!("{percent}%")
}

/// The chat's settings, falling back to defaults for unset keys
#[must_use]
pub fn format_settings(chat: &Chat) -> String {
    let defaults = [
        (SETTINGS_ANTISPAM_ENABLED_KEY, SETTINGS_ANTISPAM_ENABLED_DEFAULT),
        (SETTINGS_TRIGGER_PROBABILITY_KEY, SETTINGS_TRIGGER_PROBABILITY_DEFAULT),
    ];

    let mut lines: Vec<String> = defaults
        .iter()
        .map(|(key, default)| {
            if chat.settings.iter().any(|s| s.key == *key) {
                format!("{key}: {}", chat.get_setting(key, default))
            } else {
                format!("{key}: {default} (default)")
            }
        })
        .collect();
    lines.extend(
        chat.settings
            .iter()
            .filter(|s| defaults.iter().all(|(key, _)| *key != s.key))
            .map(|s| format!("{}: {}", s.key, s.value)),
    );
    lines.join("\n")
}

/// Member list with moderation state
#[must_use]
pub fn format_users(users: &[User], now: DateTime<Utc>, timeout: TimeDelta) -> String {
    if users.is_empty() {
        return "No known users".to_string();
    }
    let mut text = String::new();
    for user in users {
        let _ = write!(text, "{} ({})", user.display_name(), user.id);
        if user.is_banned {
            text.push_str(" [banned]");
        } else if user.is_timed_out(now, timeout) {
            text.push_str(" [timed out]");
        }
        text.push('\n');
    }
    text.trim_end().to_string()
}

/// Entity counts and message metrics, overall and for `chat_id`
#[must_use]
pub fn format_stats(counts: &EntityCounts, rendered_metrics: &str, chat_id: i64) -> String {
    let chat_label = chat_id.to_string();
    let chat_filter = Some(("chat_id", chat_label.as_str()));
    format!(
        "Chats: {}\nUsers: {}\nSettings: {}\nRated responses: {}\n\
         Messages: {}\nResponses: {}\n\
         Messages in this chat: {}\nResponses in this chat: {}",
        counts.chats,
        counts.users,
        counts.settings,
        counts.ratings,
        sum_samples(rendered_metrics, MESSAGES_COUNT, None),
        sum_samples(rendered_metrics, RESPONSES_COUNT, None),
        sum_samples(rendered_metrics, MESSAGES_COUNT, chat_filter),
        sum_samples(rendered_metrics, RESPONSES_COUNT, chat_filter),
    )
}

/// Preformatted HTML block
#[must_use]
pub fn pre_block(text: &str) -> String {
    format!(
        "<pre>{}</pre>",
        html_escape::encode_text(&utils::truncate_str(text, TELEGRAM_MESSAGE_LIMIT - 20))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shout_text_escapes_html() {
        assert_eq!(shout_text("deine mudda"), "<b>DEINE MUDDA!!!</b>");
        assert_eq!(shout_text("a<b>"), "<b>A&lt;B&gt;!!!</b>");
        assert_eq!(shout_text("süß"), "<b>SÜSS!!!</b>");
    }

    #[test]
    fn test_spam_warning() {
        assert_eq!(
            spam_warning("@spammer"),
            "@spammer: <b>Stop spamming or I will kick you!</b>"
        );
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.13), "13%");
        assert_eq!(format_percent(0.025), "2.5%");
        assert_eq!(format_percent(1.0), "100%");
    }

    #[test]
    fn test_format_settings_shows_defaults() {
        let mut chat = Chat::new(1, "group");
        assert_eq!(
            format_settings(&chat),
            "AntiSpam: on (default)\nTriggerChance: 0.02 (default)"
        );

        chat.set_setting(SETTINGS_TRIGGER_PROBABILITY_KEY, "0.5");
        chat.set_setting("Custom", "x");
        assert_eq!(
            format_settings(&chat),
            "AntiSpam: on (default)\nTriggerChance: 0.5\nCustom: x"
        );
    }

    #[test]
    fn test_format_users() {
        let now = Utc::now();
        let mut banned = User::new(2, "Bob");
        banned.is_banned = true;
        let mut timed_out = User::new(3, "Carol").with_username("carol");
        timed_out.last_timeout = Some(now);
        let users = vec![User::new(1, "Alice"), banned, timed_out];

        assert_eq!(
            format_users(&users, now, TimeDelta::seconds(30)),
            "Alice (1)\nBob (2) [banned]\n@carol (3) [timed out]"
        );
        assert_eq!(format_users(&[], now, TimeDelta::seconds(30)), "No known users");
    }

    #[test]
    fn test_format_stats() {
        let counts = EntityCounts {
            chats: 2,
            users: 3,
            settings: 4,
            ratings: 1,
            users_per_chat: vec![],
        };
        let rendered = "messages_count{chat_id=\"5\"} 10\nmessages_count{chat_id=\"6\"} 1\n\
                        responses_count{chat_id=\"5\",rule=\"WhyRule\"} 2\n";
        let text = format_stats(&counts, rendered, 5);
        assert!(text.contains("Chats: 2"));
        assert!(text.contains("Messages: 11"));
        assert!(text.contains("Messages in this chat: 10"));
        assert!(text.contains("Responses in this chat: 2"));
    }
}
