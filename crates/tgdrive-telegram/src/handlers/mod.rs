//! Telegram update handlers.
//!
//! Each handler is a small adapter that checks the allow-list, turns the
//! message into a `FileRef` and hands it to the transfer engine.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChatId as TgChatId, Message},
};

use tgdrive_core::domain::UserId;

use crate::router::AppState;

mod upload;

const UNAUTHORIZED: &str = "Unauthorized. Contact the bot owner for access.";
const USAGE_HINT: &str = "Send me a document or photo and I will upload it to Google Drive.";

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));

    let allowed = match user_id {
        Some(id) => state.cfg.is_user_allowed(id.0),
        None => state.cfg.telegram_allowed_users.is_empty(),
    };
    if !allowed {
        tracing::warn!(?user_id, chat = msg.chat.id.0, "rejected message from unauthorized user");
        reply_or_warn(&bot, msg.chat.id, UNAUTHORIZED).await;
        return Ok(());
    }

    if let Some(doc) = msg.document() {
        let file = upload::file_ref_for_document(doc);
        return upload::handle_upload(msg.chat.id.0, file, state).await;
    }

    if let Some(photos) = msg.photo() {
        if let Some(file) = upload::file_ref_for_photo(photos) {
            return upload::handle_upload(msg.chat.id.0, file, state).await;
        }
    }

    reply_or_warn(&bot, msg.chat.id, USAGE_HINT).await;

    Ok(())
}

/// Best-effort reply; a failed send is logged, never propagated to the dispatcher.
async fn reply_or_warn(bot: &Bot, chat: TgChatId, text: &str) {
    if let Err(e) = bot.send_message(chat, text.to_string()).await {
        tracing::warn!(chat = chat.0, "failed to send reply: {e}");
    }
}
