//! Remote model clients.

pub mod gemini_client;

pub use crate::gemini_client::GeminiClient;
