use std::sync::Arc;

use assistant::{CallbackAction, ChatController, ConversationPhase, Keyboard, Reply};
use sqlx::SqlitePool;
use storage::repositories::UserRepository;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatAction, InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use super::rate_limiter::RateLimiter;

/// Telegram rejects messages above 4096 characters.
pub const MAX_MESSAGE_LEN: usize = 4000;

const WELCOME: &str = "👋 Welcome to your trading journal!\n\
    Send /chat to talk to the assistant: ask about your trades or tell it what to record.";
const RATE_LIMITED: &str = "⏳ Too many messages. Please wait a minute and try again.";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Register and show the welcome message")]
    Start,
    #[command(description = "Show this help")]
    Help,
    #[command(description = "Start a conversation with the assistant")]
    Chat,
    #[command(description = "Leave the conversation")]
    Exit,
    #[command(description = "Leave the conversation and drop any pending action")]
    Cancel,
    #[command(description = "Clear the conversation history")]
    Reset,
}

#[derive(Clone)]
pub struct TelegramService {
    controller: Arc<ChatController>,
    pool: SqlitePool,
    limiter: Arc<RateLimiter>,
}

impl TelegramService {
    pub fn new(controller: Arc<ChatController>, pool: SqlitePool, limiter: Arc<RateLimiter>) -> Self {
        Self {
            controller,
            pool,
            limiter,
        }
    }

    pub async fn run(self, bot: Bot) {
        info!("Starting Telegram bot");

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint({
                        let svc = self.clone();
                        move |bot: Bot, msg: Message, cmd: Command| {
                            let svc = svc.clone();
                            async move { svc.on_command(bot, msg, cmd).await }
                        }
                    }),
            )
            .branch(Update::filter_message().endpoint({
                let svc = self.clone();
                move |bot: Bot, msg: Message| {
                    let svc = svc.clone();
                    async move { svc.on_text(bot, msg).await }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let svc = self.clone();
                move |bot: Bot, q: CallbackQuery| {
                    let svc = svc.clone();
                    async move { svc.on_callback(bot, q).await }
                }
            }));

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram bot stopped");
    }

    async fn on_command(&self, bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
        let Some(user) = msg.from.as_ref() else {
            return Ok(());
        };
        let user_id = user.id.0 as i64;
        debug!("Command {:?} from user {}", cmd, user_id);

        let reply = self
            .command_reply(user_id, user.username.as_deref(), cmd)
            .await;
        send_reply(&bot, msg.chat.id, reply).await
    }

    async fn command_reply(&self, user_id: i64, username: Option<&str>, cmd: Command) -> Reply {
        match cmd {
            Command::Start => self.register(user_id, username).await,
            Command::Help => Reply::text(Command::descriptions().to_string()),
            Command::Chat => self.controller.start(user_id).await,
            Command::Exit | Command::Cancel => self.controller.exit(user_id).await,
            Command::Reset => self.controller.reset(user_id).await,
        }
    }

    async fn register(&self, user_id: i64, username: Option<&str>) -> Reply {
        match UserRepository::get_or_create(&self.pool, user_id, username).await {
            Ok(user) => {
                debug!("Registered user {} (internal id {})", user_id, user.id);
                Reply::text(WELCOME)
            }
            Err(e) => {
                error!("Failed to register user {}: {}", user_id, e);
                Reply::text("❌ Database error, please try again later.")
            }
        }
    }

    async fn on_text(&self, bot: Bot, msg: Message) -> ResponseResult<()> {
        let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
            return Ok(());
        };
        let user_id = user.id.0 as i64;

        if self.controller.phase(user_id).await != ConversationPhase::Idle {
            if !self.limiter.try_acquire(user_id) {
                warn!("Rate limit hit for user {}", user_id);
                return send_reply(&bot, msg.chat.id, Reply::text(RATE_LIMITED)).await;
            }
            if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
                debug!("Could not send typing action: {}", e);
            }
        }

        let reply = self.controller.handle_text(user_id, text).await;
        send_reply(&bot, msg.chat.id, reply).await
    }

    async fn on_callback(&self, bot: Bot, q: CallbackQuery) -> ResponseResult<()> {
        let Some(data) = q.data.as_deref() else {
            return Ok(());
        };
        let user_id = q.from.id.0 as i64;

        let Some(action) = CallbackAction::parse(data) else {
            bot.answer_callback_query(&q.id)
                .text("Unknown action")
                .await?;
            return Ok(());
        };
        bot.answer_callback_query(&q.id).await?;

        let reply = match action {
            CallbackAction::Confirm(token) => self.controller.confirm(user_id, token).await,
            CallbackAction::Cancel(token) => self.controller.cancel(user_id, token).await,
        };
        send_reply(&bot, ChatId::from(q.from.id), reply).await
    }
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> ResponseResult<()> {
    for message in reply.messages {
        let chunks = chunk_text(&message.text, MAX_MESSAGE_LEN);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut request = bot.send_message(chat_id, chunk);
            if i == last {
                if let Some(keyboard) = &message.keyboard {
                    request = request.reply_markup(to_markup(keyboard));
                }
            }
            request.await?;
        }
    }
    Ok(())
}

fn to_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// Splits `text` into pieces of at most `limit` characters, preferring line
/// boundaries. Lines longer than `limit` are cut hard.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed <= limit {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut pieces = chars.chunks(limit.max(1)).peekable();
        while let Some(piece) = pieces.next() {
            let piece: String = piece.iter().collect();
            if pieces.peek().is_some() {
                chunks.push(piece);
            } else {
                current_len = piece.chars().count();
                current = piece;
            }
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}
