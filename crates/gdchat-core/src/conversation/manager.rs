use super::state::ConversationState;
use crate::config::LimitsConfig;
use crate::events::{ChatEvent, EventBus};
use crate::history_store::HistoryStore;
use crate::message::{ApiTurn, Message, Role, Visibility};
use crate::rate_limit::Clock;
use std::sync::Arc;

/// Owns the dual conversation log and keeps storage and observers in step
/// with it.
///
/// Every mutation is persisted (fire-and-forget) and every appended message
/// is published as [`ChatEvent::MessageAppended`].
pub struct ConversationManager {
    state: ConversationState,
    store: HistoryStore,
    clock: Arc<dyn Clock>,
    events: EventBus,
    max_context_chars: usize,
    message_overhead_chars: usize,
}

impl ConversationManager {
    /// Restores the previous conversation from `store`.
    ///
    /// Returns the manager and the persisted last-send timestamp.
    pub fn restore(
        store: HistoryStore,
        clock: Arc<dyn Clock>,
        events: EventBus,
        limits: &LimitsConfig,
    ) -> (Self, i64) {
        let loaded = store.load();
        let state = ConversationState::from_display_log(
            loaded.messages,
            limits.max_display,
            limits.max_api_history,
        );
        let manager = Self {
            state,
            store,
            clock,
            events,
            max_context_chars: limits.max_api_context_chars,
            message_overhead_chars: limits.message_overhead_chars,
        };
        (manager, loaded.last_send_ms)
    }

    /// Appends a message to the logs selected by `visibility`.
    ///
    /// System messages never reach the API log whatever `visibility` says.
    pub fn append(&mut self, role: Role, content: impl Into<String>, visibility: Visibility) -> Message {
        let seq = self.state.take_seq();
        let now = self.clock.now();
        // Timestamps never go backwards within a session.
        let timestamp = match self.state.last_timestamp() {
            Some(last) if last > now => last,
            _ => now,
        };

        let mut message = Message::new(seq, role, content, timestamp);
        let to_api = visibility == Visibility::Everywhere && role.is_conversational();
        if role.is_conversational() && !to_api {
            message.api_excluded = true;
        }

        self.state.push(message.clone(), to_api);
        self.persist();
        self.events.publish(ChatEvent::MessageAppended(message.clone()));
        message
    }

    pub fn append_system(&mut self, content: impl Into<String>) -> Message {
        self.append(Role::System, content, Visibility::DisplayOnly)
    }

    /// The history to send, oldest first, trimmed to the character budget.
    ///
    /// Walks the API log from the newest message backwards and stops before
    /// the budget would be exceeded, but always keeps the newest message.
    /// `pending`, if given, is appended as a final user turn outside the
    /// budget.
    pub fn build_api_payload(&self, pending: Option<&str>) -> Vec<ApiTurn> {
        let mut selected: Vec<ApiTurn> = Vec::new();
        let mut total = 0usize;

        for message in self.state.api().iter().rev() {
            let Some(role) = message.role.api_role() else {
                continue;
            };
            let cost = message.content.chars().count() + self.message_overhead_chars;
            if !selected.is_empty() && total + cost > self.max_context_chars {
                break;
            }
            total += cost;
            selected.push(ApiTurn {
                role,
                text: message.content.clone(),
            });
        }

        selected.reverse();
        if let Some(text) = pending {
            selected.push(ApiTurn::user(text));
        }
        selected
    }

    /// Empties both logs and the stored history.
    pub fn clear(&mut self) {
        self.state.clear();
        self.store.clear();
        self.events.publish(ChatEvent::HistoryCleared);
        tracing::info!("[Conversation] History cleared");
    }

    pub fn display_log(&self) -> impl ExactSizeIterator<Item = &Message> {
        self.state.display().iter()
    }

    pub fn api_log(&self) -> impl ExactSizeIterator<Item = &Message> {
        self.state.api().iter()
    }

    pub fn conversational_len(&self) -> usize {
        self.state.conversational_len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.display().is_empty()
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    fn persist(&self) {
        self.store.save(self.state.display().iter());
    }
}
