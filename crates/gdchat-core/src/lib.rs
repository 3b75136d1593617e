//! Domain layer of GDCHAT.
//!
//! Everything here is free of terminal and network code: message types, the
//! dual conversation log, chunking, model rotation, rate limiting, the wire
//! types of the generation endpoint and the seams (`GenerationClient`,
//! `KeyValueStore`, `TranscriptExporter`, `ChatObserver`) that the outer
//! crates implement.

pub mod chunker;
pub mod command;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod format;
pub mod history_store;
pub mod message;
pub mod model_selector;
pub mod protocol;
pub mod rate_limit;
pub mod transcript;

// Re-export common error type
pub use error::{ChatError, Result};
