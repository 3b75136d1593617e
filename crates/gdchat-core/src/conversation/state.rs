use crate::message::Message;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// The two parallel views of the conversation.
///
/// `display` holds every message (system notices included); `api` holds the
/// user/bot messages eligible for transmission. `api` is always a
/// subsequence of `display`, both keep insertion order, and both evict
/// oldest-first when over their cap.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    display: VecDeque<Message>,
    api: VecDeque<Message>,
    max_display: usize,
    max_api: usize,
    next_seq: u64,
}

impl ConversationState {
    pub fn new(max_display: usize, max_api: usize) -> Self {
        Self {
            display: VecDeque::new(),
            api: VecDeque::new(),
            max_display,
            max_api,
            next_seq: 1,
        }
    }

    /// Rebuilds both logs from a persisted display log.
    ///
    /// Sequence numbers are reassigned in order; the API log is derived from
    /// the eligible user/bot entries.
    pub fn from_display_log(messages: Vec<Message>, max_display: usize, max_api: usize) -> Self {
        let mut state = Self::new(max_display, max_api);
        for mut message in messages {
            message.seq = state.take_seq();
            let to_api = message.is_api_eligible();
            state.push(message, to_api);
        }
        state
    }

    /// Allocates the next sequence number.
    pub fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Appends to the display log and, when `to_api`, to the API log, then
    /// enforces both caps.
    pub fn push(&mut self, message: Message, to_api: bool) {
        if to_api && message.is_api_eligible() {
            self.api.push_back(message.clone());
        }
        self.display.push_back(message);
        self.evict();
    }

    fn evict(&mut self) {
        while self.display.len() > self.max_display {
            if let Some(evicted) = self.display.pop_front()
                && self.api.front().is_some_and(|front| front.seq == evicted.seq)
            {
                self.api.pop_front();
            }
        }
        while self.api.len() > self.max_api {
            self.api.pop_front();
        }
    }

    pub fn display(&self) -> &VecDeque<Message> {
        &self.display
    }

    pub fn api(&self) -> &VecDeque<Message> {
        &self.api
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.display.back().map(|message| message.timestamp)
    }

    /// Number of display entries with a user or bot role.
    pub fn conversational_len(&self) -> usize {
        self.display
            .iter()
            .filter(|message| message.role.is_conversational())
            .count()
    }

    pub fn clear(&mut self) {
        self.display.clear();
        self.api.clear();
    }
}
