use crate::bot::commands::is_command;
use crate::bot::handlers::{
    handle_command, handle_membership, handle_text, handle_unknown_command, track_message,
};
use crate::bot::{BotContext, Command};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::Me;
use tracing::{error, info};

/// Run the Telegram bot until it is stopped with Ctrl+C.
pub async fn run_bot(context: Arc<BotContext>) {
    let bot = Bot::new(context.settings.telegram_token.clone());
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![context])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn is_membership_update(msg: &Message) -> bool {
    msg.new_chat_members().is_some() || msg.left_chat_member().is_some()
}

fn is_plain_text(msg: &Message) -> bool {
    msg.text().is_some_and(|text| !is_command(text)) && msg.forward_origin().is_none()
}

fn is_unknown_command(msg: &Message) -> bool {
    msg.text().is_some_and(is_command)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(dptree::filter(|msg: Message| is_membership_update(&msg)).endpoint(membership_endpoint))
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_endpoint),
        )
        .branch(dptree::filter(|msg: Message| is_unknown_command(&msg)).endpoint(unknown_command_endpoint))
        .branch(dptree::filter(|msg: Message| is_plain_text(&msg)).endpoint(text_endpoint))
        .branch(dptree::endpoint(other_message_endpoint))
}

async fn track(msg: &Message, context: &BotContext) {
    if let Err(e) = track_message(msg, context).await {
        error!("Failed to track message in chat {}: {e}", msg.chat.id);
    }
}

async fn membership_endpoint(
    msg: Message,
    me: Me,
    context: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    track(&msg, &context).await;
    if let Err(e) = handle_membership(&msg, &me, &context).await {
        error!("Membership update in chat {} failed: {e}", msg.chat.id);
    }
    respond(())
}

async fn command_endpoint(
    bot: Bot,
    msg: Message,
    cmd: Command,
    context: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    track(&msg, &context).await;
    if let Err(e) = handle_command(&bot, &msg, cmd, &context).await {
        error!("Command in chat {} failed: {e}", msg.chat.id);
    }
    respond(())
}

async fn unknown_command_endpoint(
    bot: Bot,
    msg: Message,
    context: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    track(&msg, &context).await;
    if let Err(e) = handle_unknown_command(&bot, &msg).await {
        error!("Failed to answer unknown command in chat {}: {e}", msg.chat.id);
    }
    respond(())
}

async fn text_endpoint(
    bot: Bot,
    msg: Message,
    context: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    track(&msg, &context).await;
    if let Err(e) = handle_text(&bot, &msg, &context).await {
        error!("Message handling in chat {} failed: {e}", msg.chat.id);
    }
    respond(())
}

async fn other_message_endpoint(
    msg: Message,
    context: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    track(&msg, &context).await;
    respond(())
}
