//! Telegram calls with automatic retry on transient network failures.
//!
//! Moderation actions (ban, unban, delete) are deliberately not retried;
//! they are attempted once and failures are logged by the caller.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode, ReplyParameters};

/// Send a message with automatic retry on network failures.
///
/// Uses [`crate::utils::retry_telegram_operation`] with exponential backoff.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
    reply_to: Option<MessageId>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(message_id) = reply_to {
            req = req.reply_parameters(ReplyParameters::new(message_id).allow_sending_without_reply());
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}
