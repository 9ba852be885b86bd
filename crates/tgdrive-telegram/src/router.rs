use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;

use tgdrive_core::{
    config::Config,
    notify::throttled::{ThrottleConfig, ThrottledNotifier},
    ports::NotificationSink,
    transfer::TransferEngine,
};

use crate::handlers;
use crate::TelegramNotifier;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<TransferEngine>,
    pub notifier: Arc<dyn NotificationSink>,
    /// Parent of every in-flight upload's cancellation token.
    pub shutdown: CancellationToken,
}

/// Bot handle pointed at the configured Bot API server.
pub fn build_bot(cfg: &Config) -> anyhow::Result<Bot> {
    let api_url = reqwest::Url::parse(&cfg.telegram_api_url)
        .map_err(|e| anyhow::anyhow!("invalid TELEGRAM_API_URL {}: {e}", cfg.telegram_api_url))?;
    Ok(Bot::new(cfg.telegram_bot_token.clone()).set_api_url(api_url))
}

pub async fn run_polling(
    cfg: Arc<Config>,
    bot: Bot,
    engine: Arc<TransferEngine>,
) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "tgdrive started"),
        Err(e) => tracing::warn!("getMe failed, continuing anyway: {e}"),
    }
    tracing::info!(
        allowed_users = cfg.telegram_allowed_users.len(),
        folder = %cfg.drive_folder_id,
        "accepting uploads"
    );

    // Progress updates from concurrent uploads go through a throttling decorator
    // to stay under Telegram's flood limits; the adapter still retries once on 429.
    let raw_notifier: Arc<dyn NotificationSink> = Arc::new(TelegramNotifier::new(bot.clone()));
    let notifier: Arc<dyn NotificationSink> = Arc::new(ThrottledNotifier::new(
        raw_notifier,
        ThrottleConfig::default(),
    ));

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        cfg,
        engine,
        notifier,
        shutdown: shutdown.clone(),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    Ok(())
}
