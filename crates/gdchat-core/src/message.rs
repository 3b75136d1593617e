//! Conversation message types.
//!
//! A [`Message`] is one conversational turn. Messages are immutable once
//! created; the conversation manager only appends and evicts them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Represents the author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Text typed by the user.
    User,
    /// Text generated by the remote model.
    Bot,
    /// Local annotation (errors, help, progress). Never sent to the API.
    System,
}

impl Role {
    /// Role name in the remote protocol's vocabulary.
    ///
    /// Returns `None` for [`Role::System`], which has no remote counterpart.
    pub fn api_role(self) -> Option<ApiRole> {
        match self {
            Role::User => Some(ApiRole::User),
            Role::Bot => Some(ApiRole::Model),
            Role::System => None,
        }
    }

    /// Label used in rendered output and transcripts.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "Você",
            Role::Bot => "GDCHAT",
            Role::System => "Sistema",
        }
    }

    /// Whether messages of this role may ever enter the API log.
    pub fn is_conversational(self) -> bool {
        !matches!(self, Role::System)
    }
}

/// Role vocabulary of the remote generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApiRole {
    User,
    Model,
}

/// Which logs an appended message goes to.
///
/// The API log is always a subsequence of the display log, so "API only"
/// is not a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Display log and, for user/bot messages, the API log.
    Everywhere,
    /// Display log only.
    DisplayOnly,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Session-local sequence number, strictly increasing in append order.
    #[serde(default)]
    pub seq: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set when a user/bot message was kept out of the API log.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub api_excluded: bool,
}

impl Message {
    pub fn new(seq: u64, role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            seq,
            role,
            content: content.into(),
            timestamp,
            api_excluded: false,
        }
    }

    /// Whether this message belongs in the API log.
    pub fn is_api_eligible(&self) -> bool {
        self.role.is_conversational() && !self.api_excluded
    }
}

/// One entry of an outgoing request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiTurn {
    pub role: ApiRole,
    pub text: String,
}

impl ApiTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ApiRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ApiRole::Model,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_translation() {
        assert_eq!(Role::User.api_role(), Some(ApiRole::User));
        assert_eq!(Role::Bot.api_role(), Some(ApiRole::Model));
        assert_eq!(Role::System.api_role(), None);
        assert_eq!(ApiRole::Model.as_ref(), "model");
    }

    #[test]
    fn test_role_parses_lowercase() {
        assert_eq!(Role::from_str("bot").unwrap(), Role::Bot);
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn test_message_serde_omits_false_exclusion() {
        let msg = Message::new(3, Role::User, "olá", Utc::now());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("api_excluded"));
        assert!(json.contains("\"role\":\"user\""));

        let legacy = r#"{"role":"bot","content":"oi","timestamp":"2025-01-01T00:00:00Z"}"#;
        let parsed: Message = serde_json::from_str(legacy).unwrap();
        assert_eq!(parsed.seq, 0);
        assert!(parsed.is_api_eligible());
    }
}
