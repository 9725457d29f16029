use crate::antispam::SpamVerdict;
use crate::bot::argument::{
    parse_probability, parse_switch, parse_user_reference, usage_message, ArgumentError,
    UserReference,
};
use crate::bot::messaging::{
    ban_notice, format_percent, format_settings, format_stats, format_users, pre_block,
    send_html, send_plain, shout, spam_warning,
};
use crate::bot::{permissions, BotContext, Command};
use crate::config::{SETTINGS_ANTISPAM_ENABLED_KEY, SETTINGS_TRIGGER_PROBABILITY_KEY};
use crate::persistence::{Chat, User};
use crate::stats;
use crate::utils::truncate_str;
use anyhow::Result;
use chrono::Utc;
use std::time::Instant;
use teloxide::prelude::*;
use teloxide::types::{Me, UserId};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Persisted form of a Telegram user
#[must_use]
pub fn to_user(user: &teloxide::types::User) -> User {
    User {
        id: user.id.0.cast_signed(),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        full_name: user.full_name(),
        last_timeout: None,
        is_banned: false,
    }
}

/// `private`, `group`, `supergroup` or `channel`
#[must_use]
pub fn chat_type(chat: &teloxide::types::Chat) -> &'static str {
    if chat.is_private() {
        "private"
    } else if chat.is_group() {
        "group"
    } else if chat.is_supergroup() {
        "supergroup"
    } else {
        "channel"
    }
}

fn sender_name(user: &teloxide::types::User) -> String {
    user.username
        .as_ref()
        .map_or_else(|| user.full_name(), |username| format!("@{username}"))
}

async fn load_chat(ctx: &BotContext, msg: &Message) -> Result<Chat> {
    let chat = ctx.persistence.get_chat(msg.chat.id.0).await?;
    Ok(chat.unwrap_or_else(|| Chat::with_default_settings(msg.chat.id.0, chat_type(&msg.chat))))
}

/// Makes sure the chat is known and remembers the sender as a member
///
/// # Errors
///
/// Returns an error if persisting fails.
pub async fn track_message(msg: &Message, ctx: &BotContext) -> Result<()> {
    let chat_id = msg.chat.id.0;
    if ctx.persistence.get_chat(chat_id).await?.is_none() {
        info!("New chat {chat_id} ({})", chat_type(&msg.chat));
        ctx.persistence
            .add_or_update_chat(&Chat::with_default_settings(chat_id, chat_type(&msg.chat)))
            .await?;
    }

    if let Some(from) = msg.from.as_ref().filter(|u| !u.is_bot) {
        ctx.persistence
            .add_or_update_chat_member(chat_id, &to_user(from))
            .await?;
    }
    Ok(())
}

/// Handles the bot or other users joining and leaving a chat
///
/// # Errors
///
/// Returns an error if persisting fails.
pub async fn handle_membership(msg: &Message, me: &Me, ctx: &BotContext) -> Result<()> {
    let chat_id = msg.chat.id.0;

    for member in msg.new_chat_members().unwrap_or_default() {
        if member.id == me.id {
            info!("Bot was added to chat {chat_id}");
            if ctx.persistence.get_chat(chat_id).await?.is_none() {
                ctx.persistence
                    .add_or_update_chat(&Chat::with_default_settings(chat_id, chat_type(&msg.chat)))
                    .await?;
            }
        } else {
            debug!("{} ({}) joined chat {chat_id}", member.full_name(), member.id);
            ctx.persistence
                .add_or_update_chat_member(chat_id, &to_user(member))
                .await?;
        }
    }

    if let Some(member) = msg.left_chat_member() {
        if member.id == me.id {
            info!("Bot was removed from chat {chat_id}");
            ctx.persistence.delete_chat(chat_id).await?;
        } else {
            debug!("{} ({}) left chat {chat_id}", member.full_name(), member.id);
            ctx.persistence
                .remove_chat_member(chat_id, member.id.0.cast_signed())
                .await?;
        }
    }
    Ok(())
}

/// Applies the consequences of an antispam verdict. Failures are logged.
async fn enforce_verdict(bot: &Bot, msg: &Message, verdict: SpamVerdict) {
    let Some(from) = msg.from.as_ref() else {
        return;
    };
    let name = sender_name(from);
    match verdict {
        SpamVerdict::TimedOut => {
            if let Err(e) = send_html(bot, msg.chat.id, &spam_warning(&name)).await {
                warn!("Failed to warn spammer {}: {e}", from.id);
            }
        }
        SpamVerdict::Banned => {
            match bot.ban_chat_member(msg.chat.id, from.id).await {
                Ok(_) => info!("Kicked spammer {} from chat {}", from.id, msg.chat.id),
                Err(e) => warn!("Error kicking user {}: {e}", from.id),
            }
            if let Err(e) = send_html(bot, msg.chat.id, &ban_notice(&name)).await {
                warn!("Failed to send ban notice for {}: {e}", from.id);
            }
        }
        SpamVerdict::Clean | SpamVerdict::Suppressed => {}
    }
}

/// Handles a regular text message
///
/// # Errors
///
/// Returns an error if persistence or sending the response fails.
pub async fn handle_text(bot: &Bot, msg: &Message, ctx: &BotContext) -> Result<()> {
    let started = Instant::now();
    let result = process_text(bot, msg, ctx).await;
    stats::record_processing_time(started.elapsed());
    result
}

async fn process_text(bot: &Bot, msg: &Message, ctx: &BotContext) -> Result<()> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    stats::record_message(chat_id);
    debug!(
        "Message from {} in chat {chat_id}: '{}'",
        from.id,
        truncate_str(text, 100)
    );

    let verdict = ctx
        .antispam
        .process_message(chat_id, from.id.0.cast_signed(), Utc::now())
        .await?;
    if verdict.is_spam() {
        enforce_verdict(bot, msg, verdict).await;
        return Ok(());
    }

    if !ctx.settings.accepts_message(text) {
        return Ok(());
    }

    let chat = load_chat(ctx, msg).await?;
    if let Some(response) = ctx
        .responses
        .find_response(&chat, &from.first_name, text)
        .await?
    {
        info!("Rule {} responds in chat {chat_id}", response.rule_id);
        let sent = shout(bot, msg.chat.id, &response.text, Some(msg.id)).await?;
        ctx.answers.remember(chat_id, sent.id.0, response).await;
    }
    Ok(())
}

/// Answers unknown commands with the command list, in private chats only
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_unknown_command(bot: &Bot, msg: &Message) -> Result<()> {
    if msg.chat.is_private() {
        send_plain(bot, msg.chat.id, &Command::descriptions().to_string()).await?;
    }
    Ok(())
}

/// Runs a command after checking permissions
///
/// # Errors
///
/// Returns an error if persistence or sending the reply fails.
pub async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, ctx: &BotContext) -> Result<()> {
    let user_id = msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed());
    if !permissions::is_authorized(bot, msg, &ctx.settings).await {
        info!("Ignoring {cmd:?} from unauthorized user {user_id} in chat {}", msg.chat.id);
        return Ok(());
    }
    info!("User {user_id} runs {cmd:?} in chat {}", msg.chat.id);

    let usage = cmd.usage();
    let result = match cmd {
        Command::Commands | Command::Help => {
            send_plain(bot, msg.chat.id, &Command::descriptions().to_string()).await
        }
        Command::Stats => stats_command(bot, msg, ctx).await,
        Command::Mudda => mudda_command(bot, msg, ctx).await,
        Command::Settings => {
            let chat = load_chat(ctx, msg).await?;
            send_plain(bot, msg.chat.id, &format_settings(&chat)).await
        }
        Command::SetAntispam(arg) => match parse_switch(&arg) {
            Ok(state) => set_antispam_command(bot, msg, ctx, state).await,
            Err(e) => Err(e.into()),
        },
        Command::SetChance(arg) => match parse_probability(&arg) {
            Ok(probability) => set_chance_command(bot, msg, ctx, probability).await,
            Err(e) => Err(e.into()),
        },
        Command::Ban(arg) => match parse_user_reference(&arg) {
            Ok(reference) => ban_command(bot, msg, ctx, reference).await,
            Err(e) => Err(e.into()),
        },
        Command::Unban(arg) => match parse_user_reference(&arg) {
            Ok(reference) => unban_command(bot, msg, ctx, reference).await,
            Err(e) => Err(e.into()),
        },
        Command::Users => {
            let chat = load_chat(ctx, msg).await?;
            let text = format_users(&chat.users, Utc::now(), ctx.antispam.timeout());
            send_plain(bot, msg.chat.id, &text).await
        }
        Command::Bad => rate_command(bot, msg, ctx, true).await,
        Command::Good => rate_command(bot, msg, ctx, false).await,
        Command::Version => {
            send_plain(bot, msg.chat.id, &format!("deinemudda {}", env!("CARGO_PKG_VERSION"))).await
        }
        Command::Config => {
            let yaml = ctx.settings.to_redacted_yaml()?;
            send_html(bot, msg.chat.id, &pre_block(&yaml)).await
        }
    };

    match result {
        Err(e) => match e.downcast_ref::<ArgumentError>() {
            Some(argument_error) => {
                debug!("Invalid arguments: {argument_error}");
                send_plain(bot, msg.chat.id, &usage_message(argument_error, usage)).await
            }
            None => Err(e),
        },
        ok => ok,
    }
}

async fn stats_command(bot: &Bot, msg: &Message, ctx: &BotContext) -> Result<()> {
    let counts = ctx.persistence.entity_counts().await?;
    let text = format_stats(&counts, &ctx.metrics.render(), msg.chat.id.0);
    send_plain(bot, msg.chat.id, &text).await
}

async fn mudda_command(bot: &Bot, msg: &Message, ctx: &BotContext) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    let verdict = ctx
        .antispam
        .process_message(msg.chat.id.0, from.id.0.cast_signed(), Utc::now())
        .await?;
    if verdict.is_spam() {
        enforce_verdict(bot, msg, verdict).await;
        debug!("Removing message {} in chat {} because of spam", msg.id.0, msg.chat.id);
        if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
            debug!("Couldn't remove message: {e}");
        }
        return Ok(());
    }

    let Some(target) = msg.reply_to_message() else {
        shout(bot, msg.chat.id, "deine mudda", None).await?;
        return Ok(());
    };

    let chat = load_chat(ctx, msg).await?;
    let response = match target.text() {
        Some(text) => {
            ctx.responses
                .force_response(&chat, &from.first_name, text)
                .await?
        }
        None => None,
    };
    match response {
        Some(response) => {
            let sent = shout(bot, msg.chat.id, &response.text, Some(target.id)).await?;
            ctx.answers.remember(msg.chat.id.0, sent.id.0, response).await;
        }
        None => {
            shout(bot, msg.chat.id, "deine mudda", Some(target.id)).await?;
        }
    }
    Ok(())
}

async fn rate_command(bot: &Bot, msg: &Message, ctx: &BotContext, is_bad: bool) -> Result<()> {
    let Some(target) = msg.reply_to_message() else {
        return Err(ArgumentError::Missing("answer").into());
    };

    let rated = ctx
        .answers
        .rate(ctx.persistence.as_ref(), msg.chat.id.0, target.id.0, is_bad)
        .await?;
    let text = match rated {
        Some(response) if is_bad => {
            format!("Okay, {} won't answer that again.", response.rule_id)
        }
        Some(response) => format!("Okay, {} may answer that again.", response.rule_id),
        None => "I don't remember that answer.".to_string(),
    };
    send_plain(bot, msg.chat.id, &text).await
}

async fn set_antispam_command(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    state: &str,
) -> Result<()> {
    let mut chat = load_chat(ctx, msg).await?;
    chat.set_setting(SETTINGS_ANTISPAM_ENABLED_KEY, state);
    ctx.persistence.add_or_update_chat(&chat).await?;
    send_plain(bot, msg.chat.id, &format!("Antispam: {state}")).await
}

async fn set_chance_command(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    probability: f64,
) -> Result<()> {
    let mut chat = load_chat(ctx, msg).await?;
    chat.set_setting(SETTINGS_TRIGGER_PROBABILITY_KEY, probability.to_string());
    ctx.persistence.add_or_update_chat(&chat).await?;
    send_plain(
        bot,
        msg.chat.id,
        &format!("TriggerChance: {}", format_percent(probability)),
    )
    .await
}

async fn resolve_user(ctx: &BotContext, reference: &UserReference) -> Result<Option<User>> {
    let user = match reference {
        UserReference::Id(id) => ctx.persistence.get_user(*id).await?,
        UserReference::Username(name) => ctx.persistence.get_user_by_username(name).await?,
    };
    Ok(user)
}

async fn ban_command(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    reference: UserReference,
) -> Result<()> {
    let Some(mut user) = resolve_user(ctx, &reference).await? else {
        return send_plain(bot, msg.chat.id, "Unknown user").await;
    };

    user.is_banned = true;
    ctx.persistence.add_or_update_user(&user).await?;
    info!("User {} banned by command in chat {}", user.id, msg.chat.id);

    if !msg.chat.is_private() {
        if let Err(e) = bot
            .ban_chat_member(msg.chat.id, UserId(user.id.cast_unsigned()))
            .await
        {
            warn!("Error kicking user {}: {e}", user.id);
        }
    }
    send_plain(bot, msg.chat.id, &format!("Banned {}", user.display_name())).await
}

async fn unban_command(
    bot: &Bot,
    msg: &Message,
    ctx: &BotContext,
    reference: UserReference,
) -> Result<()> {
    let Some(mut user) = resolve_user(ctx, &reference).await? else {
        return send_plain(bot, msg.chat.id, "Unknown user").await;
    };

    user.is_banned = false;
    user.last_timeout = None;
    ctx.persistence.add_or_update_user(&user).await?;
    ctx.antispam.forget(user.id).await;
    info!("User {} unbanned by command in chat {}", user.id, msg.chat.id);

    if !msg.chat.is_private() {
        if let Err(e) = bot
            .unban_chat_member(msg.chat.id, UserId(user.id.cast_unsigned()))
            .only_if_banned(true)
            .await
        {
            warn!("Error unbanning user {}: {e}", user.id);
        }
    }
    send_plain(bot, msg.chat.id, &format!("Unbanned {}", user.display_name())).await
}
