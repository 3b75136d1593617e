//! Conversation state and its manager.
//!
//! - `state`: the display log / API log pair and their caps (`ConversationState`)
//! - `manager`: appends, payload building, clearing and persistence (`ConversationManager`)

mod manager;
mod state;

pub use manager::ConversationManager;
pub use state::ConversationState;
