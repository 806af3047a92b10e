use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use storage::db::now_ts;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::llm::ChatTurn;

/// A validated action waiting for the user's decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub token: Uuid,
    pub user_id: i64,
    /// Wire form of the action, see `Action::to_value`.
    pub action: Value,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationPhase {
    /// No chat session.
    Idle,
    Chatting,
    AwaitingConfirmation,
}

#[derive(Debug, Clone)]
enum Phase {
    Chatting,
    AwaitingConfirmation(PendingAction),
}

#[derive(Debug, Clone)]
struct Session {
    phase: Phase,
    history: VecDeque<ChatTurn>,
}

impl Session {
    fn new() -> Self {
        Self {
            phase: Phase::Chatting,
            history: VecDeque::new(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum PendingTake {
    Taken(PendingAction),
    /// Something is pending, but under a different token.
    Stale,
    Nothing,
}

/// Per-user conversation state. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<i64, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh session, replacing any previous one.
    pub async fn enter(&self, user_id: i64) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(user_id, Session::new());
    }

    /// Drops the session. Returns whether one existed.
    pub async fn exit(&self, user_id: i64) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&user_id).is_some()
    }

    pub async fn phase(&self, user_id: i64) -> ConversationPhase {
        let sessions = self.sessions.lock().await;
        match sessions.get(&user_id).map(|s| &s.phase) {
            None => ConversationPhase::Idle,
            Some(Phase::Chatting) => ConversationPhase::Chatting,
            Some(Phase::AwaitingConfirmation(_)) => ConversationPhase::AwaitingConfirmation,
        }
    }

    /// Stores `action` as the user's only pending action and returns its token.
    /// Returns `None` when the user has no session.
    pub async fn set_pending(&self, user_id: i64, action: Value) -> Option<Uuid> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&user_id)?;

        let token = Uuid::new_v4();
        session.phase = Phase::AwaitingConfirmation(PendingAction {
            token,
            user_id,
            action,
            created_at: now_ts(),
        });
        Some(token)
    }

    pub async fn pending(&self, user_id: i64) -> Option<PendingAction> {
        let sessions = self.sessions.lock().await;
        match sessions.get(&user_id).map(|s| &s.phase) {
            Some(Phase::AwaitingConfirmation(pending)) => Some(pending.clone()),
            _ => None,
        }
    }

    /// Removes the pending action and moves back to chatting. A token, when
    /// given, must match the pending one or nothing changes.
    pub async fn take_pending(&self, user_id: i64, token: Option<Uuid>) -> PendingTake {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&user_id) else {
            return PendingTake::Nothing;
        };

        let token_matches = match &session.phase {
            Phase::Chatting => return PendingTake::Nothing,
            Phase::AwaitingConfirmation(pending) => token.is_none_or(|t| t == pending.token),
        };
        if !token_matches {
            return PendingTake::Stale;
        }

        match std::mem::replace(&mut session.phase, Phase::Chatting) {
            Phase::AwaitingConfirmation(pending) => PendingTake::Taken(pending),
            Phase::Chatting => PendingTake::Nothing,
        }
    }

    pub async fn history(&self, user_id: i64) -> Vec<ChatTurn> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user_id)
            .map(|s| s.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Appends an exchange and keeps only the last `limit` turns.
    pub async fn push_exchange(&self, user_id: i64, user_text: &str, reply: &str, limit: usize) {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&user_id) else {
            return;
        };

        session.history.push_back(ChatTurn::user(user_text));
        session.history.push_back(ChatTurn::assistant(reply));
        while session.history.len() > limit {
            session.history.pop_front();
        }
    }

    /// Clears history and any pending action but keeps the session open.
    pub async fn reset(&self, user_id: i64) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&user_id) {
            Some(session) => {
                *session = Session::new();
                true
            }
            None => false,
        }
    }
}
