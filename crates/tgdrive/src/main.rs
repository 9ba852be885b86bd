use std::sync::Arc;

use tgdrive_core::{config::Config, token_cache::TokenCache, transfer::TransferEngine};
use tgdrive_google::{DriveClient, TokenMinter};
use tgdrive_telegram::{router, TelegramFetcher};

#[tokio::main]
async fn main() -> Result<(), tgdrive_core::Error> {
    tgdrive_core::logging::init("tgdrive")?;

    let cfg = Arc::new(Config::load()?);
    let bot = router::build_bot(&cfg)
        .map_err(|e| tgdrive_core::Error::Config(e.to_string()))?;

    let tokens = Arc::new(TokenCache::new(TokenMinter::new(cfg.http_timeout)?));
    let source = Arc::new(TelegramFetcher::new(
        bot.clone(),
        cfg.telegram_api_url.clone(),
        cfg.http_timeout,
    )?);
    let backend = Arc::new(DriveClient::new(
        cfg.drive_upload_url.clone(),
        cfg.http_timeout,
    )?);
    let engine = Arc::new(TransferEngine::new(
        tokens,
        source,
        backend,
        cfg.transfer.clone(),
    ));

    router::run_polling(cfg, bot, engine)
        .await
        .map_err(|e| tgdrive_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
