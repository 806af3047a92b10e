//! Conversation state machine around the assistant.
//!
//! A user is either not in a chat (idle), chatting, or awaiting confirmation
//! of exactly one pending action. Mutations only ever happen from
//! [`ChatController::confirm`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::context::ContextBuilder;
use crate::executor::ActionExecutor;
use crate::llm::{GenerationRequest, LanguageModel};
use crate::parser;
use crate::render::render_confirmation;
use crate::session::{ConversationPhase, PendingTake, SessionStore};
use crate::typed::TypedAction;

const CONFIRM_PREFIX: &str = "ai_confirm";
const CANCEL_PREFIX: &str = "ai_cancel";

const NOT_IN_CHAT: &str = "💬 Send /chat to talk to the journal assistant.";
const GREETING: &str = "🤖 Assistant ready. Ask about your trades or tell me what to record.\n\
    /reset clears the conversation, /exit leaves the chat.";
const GENERATION_FAILED: &str =
    "⚠️ Sorry, I couldn't reach the assistant right now. Please try again in a moment.";
const NOTHING_PENDING: &str = "There is no pending action.";
const STALE_ACTION: &str = "⚠️ This action is no longer pending.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }
}

/// Everything the transport should send back, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub messages: Vec<OutgoingMessage>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![OutgoingMessage::text(text)],
        }
    }

    /// Concatenated text of all messages.
    pub fn joined(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Decoded confirmation button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Confirm(Option<Uuid>),
    Cancel(Option<Uuid>),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let (prefix, token) = match data.split_once(':') {
            Some((prefix, raw)) => (prefix, Some(Uuid::parse_str(raw).ok()?)),
            None => (data, None),
        };

        match prefix {
            CONFIRM_PREFIX => Some(Self::Confirm(token)),
            CANCEL_PREFIX => Some(Self::Cancel(token)),
            _ => None,
        }
    }

    pub fn to_data(&self) -> String {
        let (prefix, token) = match self {
            Self::Confirm(token) => (CONFIRM_PREFIX, token),
            Self::Cancel(token) => (CANCEL_PREFIX, token),
        };
        match token {
            Some(token) => format!("{}:{}", prefix, token),
            None => prefix.to_string(),
        }
    }
}

fn confirm_keyboard(token: Uuid) -> Keyboard {
    Keyboard {
        rows: vec![vec![
            KeyboardButton {
                label: "✅ Confirm".to_string(),
                callback_data: CallbackAction::Confirm(Some(token)).to_data(),
            },
            KeyboardButton {
                label: "❌ Cancel".to_string(),
                callback_data: CallbackAction::Cancel(Some(token)).to_data(),
            },
        ]],
    }
}

/// Assistant text with any action block removed, or the full text when
/// nothing else remains.
fn visible_text(response: &str) -> String {
    let prose = parser::strip_action_block(response);
    if prose.is_empty() {
        response.trim().to_string()
    } else {
        prose
    }
}

pub struct ChatController {
    model: Arc<dyn LanguageModel>,
    executor: ActionExecutor,
    context: ContextBuilder,
    sessions: SessionStore,
    history_limit: usize,
}

impl ChatController {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        executor: ActionExecutor,
        context: ContextBuilder,
        sessions: SessionStore,
        history_limit: usize,
    ) -> Self {
        Self {
            model,
            executor,
            context,
            sessions,
            history_limit,
        }
    }

    pub async fn phase(&self, user_id: i64) -> ConversationPhase {
        self.sessions.phase(user_id).await
    }

    /// Enters the chat with a clean session.
    pub async fn start(&self, user_id: i64) -> Reply {
        self.sessions.enter(user_id).await;
        debug!("User {} entered chat", user_id);
        Reply::text(GREETING)
    }

    pub async fn handle_text(&self, user_id: i64, text: &str) -> Reply {
        let phase = self.sessions.phase(user_id).await;
        if phase == ConversationPhase::Idle {
            return Reply::text(NOT_IN_CHAT);
        }

        let request = GenerationRequest {
            user_id,
            message: text.to_string(),
            context: self.context.build(user_id).await,
            history: self.sessions.history(user_id).await,
        };

        let response = match self.model.generate(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Generation failed for user {}: {}", user_id, e);
                return Reply::text(GENERATION_FAILED);
            }
        };
        self.sessions
            .push_exchange(user_id, text, &response, self.history_limit)
            .await;

        let Some(action) = parser::parse(&response) else {
            return Reply::text(response);
        };

        if !action.kind().is_mutation() {
            return Reply::text(visible_text(&response));
        }
        if !action.needs_confirmation() {
            info!(
                "Assistant proposed {} for user {} without confirmation, not executing",
                action.kind(),
                user_id
            );
            return Reply::text(visible_text(&response));
        }

        let typed = match TypedAction::from_action(&action) {
            Ok(typed) => typed,
            Err(e) => {
                warn!("Rejected {} for user {}: {}", action.kind(), user_id, e);
                return Reply::text(response);
            }
        };

        self.offer(user_id, phase, &response, &action, &typed).await
    }

    async fn offer(
        &self,
        user_id: i64,
        phase: ConversationPhase,
        response: &str,
        action: &Action,
        typed: &TypedAction,
    ) -> Reply {
        let card = render_confirmation(action, typed);
        let Some(token) = self.sessions.set_pending(user_id, action.to_value()).await else {
            return Reply::text(visible_text(response));
        };

        if phase == ConversationPhase::AwaitingConfirmation {
            info!("New {} supersedes pending action of user {}", typed.kind(), user_id);
        }
        debug!(
            "Awaiting confirmation of {} from user {} (confidence {:.2})",
            typed.kind(),
            user_id,
            action.confidence()
        );

        let mut reply = Reply::default();
        let prose = parser::strip_action_block(response);
        if !prose.is_empty() {
            reply.messages.push(OutgoingMessage::text(prose));
        }
        reply.messages.push(OutgoingMessage {
            text: card,
            keyboard: Some(confirm_keyboard(token)),
        });
        reply
    }

    /// Executes the pending action. A token, when given, must match it.
    pub async fn confirm(&self, user_id: i64, token: Option<Uuid>) -> Reply {
        let pending = match self.sessions.take_pending(user_id, token).await {
            PendingTake::Taken(pending) => pending,
            PendingTake::Stale => return Reply::text(STALE_ACTION),
            PendingTake::Nothing => return Reply::text(NOTHING_PENDING),
        };

        let Some(action) = Action::from_value(&pending.action) else {
            error!("Stored action of user {} could not be decoded", user_id);
            return Reply::text("❌ The pending action could not be restored.");
        };

        let outcome = self.executor.execute(pending.user_id, &action).await;
        Reply::text(outcome.message)
    }

    pub async fn cancel(&self, user_id: i64, token: Option<Uuid>) -> Reply {
        match self.sessions.take_pending(user_id, token).await {
            PendingTake::Taken(pending) => {
                debug!("User {} cancelled action {}", user_id, pending.token);
                Reply::text("Action cancelled. Anything else?")
            }
            PendingTake::Stale => Reply::text(STALE_ACTION),
            PendingTake::Nothing => Reply::text(NOTHING_PENDING),
        }
    }

    /// Leaves the chat, discarding any pending action.
    pub async fn exit(&self, user_id: i64) -> Reply {
        if self.sessions.exit(user_id).await {
            Reply::text("👋 Chat ended. Send /chat to start again.")
        } else {
            Reply::text(NOT_IN_CHAT)
        }
    }

    pub async fn reset(&self, user_id: i64) -> Reply {
        if self.sessions.reset(user_id).await {
            Reply::text("🧹 Conversation cleared.")
        } else {
            Reply::text(NOT_IN_CHAT)
        }
    }
}
