//! State-change events published to the rendering side.

use crate::message::Message;
use std::sync::Arc;

/// Something the UI may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A message entered the display log.
    MessageAppended(Message),
    /// A transient line that is not part of the history (welcome, farewell).
    Notice(String),
    /// Both logs were emptied.
    HistoryCleared,
    /// A remote workflow started (`true`) or finished (`false`).
    BusyChanged(bool),
}

/// Receives events synchronously, in publication order.
pub trait ChatObserver: Send + Sync {
    fn on_event(&self, event: &ChatEvent);
}

/// Fan-out to every registered observer.
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Vec<Arc<dyn ChatObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn ChatObserver>) {
        self.observers.push(observer);
    }

    pub fn publish(&self, event: ChatEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}

/// Observer that records everything, for tests and headless use.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<ChatEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Messages appended so far, in order.
    pub fn appended(&self) -> Vec<Message> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::MessageAppended(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl ChatObserver for RecordingObserver {
    fn on_event(&self, event: &ChatEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
