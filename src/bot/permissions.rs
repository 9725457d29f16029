//! Who may run commands.
//!
//! Commands are allowed in private chats, for chat administrators and the
//! creator, and for the usernames configured in `admin_usernames`.

use crate::config::Settings;
use teloxide::prelude::*;
use tracing::{debug, warn};

/// Decides without asking Telegram, `None` if a member lookup is needed
#[must_use]
pub fn check_without_lookup(
    settings: &Settings,
    is_private_chat: bool,
    username: Option<&str>,
) -> Option<bool> {
    if is_private_chat || username.is_some_and(|name| settings.is_admin_username(name)) {
        Some(true)
    } else {
        None
    }
}

/// Returns `true` if the sender of `msg` may run commands in its chat
pub async fn is_authorized(bot: &Bot, msg: &Message, settings: &Settings) -> bool {
    let Some(user) = msg.from.as_ref() else {
        return false;
    };
    if let Some(allowed) =
        check_without_lookup(settings, msg.chat.is_private(), user.username.as_deref())
    {
        return allowed;
    }

    match bot.get_chat_member(msg.chat.id, user.id).await {
        Ok(member) => {
            let privileged = member.is_privileged();
            debug!(
                "User {} is {}privileged in chat {}",
                user.id,
                if privileged { "" } else { "not " },
                msg.chat.id
            );
            privileged
        }
        Err(e) => {
            warn!(
                "Failed to look up member {} of chat {}: {}",
                user.id, msg.chat.id, e
            );
            false
        }
    }
}
