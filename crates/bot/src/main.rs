use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::Bot;
use tracing::debug;

use assistant::context::ContextBuilder;
use assistant::llm::OpenAiClient;
use assistant::{ActionExecutor, ChatController, SessionStore};
use common::config::Config;
use common::logger;
use storage::db::open_pool;

use crate::services::rate_limiter::RateLimiter;
use crate::services::telegram_service::TelegramService;

mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    dotenv().ok();
    debug!("Trading journal bot starting up...");

    let config = Config::from_env()?;

    let db_path = config.database_path();
    let pool = open_pool(&db_path).await?;

    debug!("Using model {} at {}", config.llm_model, config.llm_base_url);
    let model = Arc::new(OpenAiClient::new(
        &config.llm_base_url,
        &config.llm_api_key,
        &config.llm_model,
    )?);

    let controller = Arc::new(ChatController::new(
        model,
        ActionExecutor::new(pool.clone()),
        ContextBuilder::new(pool.clone()),
        SessionStore::new(),
        config.chat_history_limit,
    ));
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));

    let bot = Bot::new(&config.telegram_token);
    TelegramService::new(controller, pool, limiter).run(bot).await;

    Ok(())
}
