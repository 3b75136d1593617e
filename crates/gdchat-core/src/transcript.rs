//! Plain-text transcript export.

use crate::error::Result;
use crate::message::{Message, Role};
use chrono::{DateTime, Local, Utc};

const SEPARATOR: &str = "----------------------------------------";

/// Writes a rendered transcript somewhere the user can get at it.
pub trait TranscriptExporter: Send + Sync {
    /// Stores `contents` under `file_name` and returns where it went.
    fn export(&self, file_name: &str, contents: &str) -> Result<String>;
}

/// Timestamped export file name, e.g. `chat_history_2025-03-01T14-05-09.txt`.
pub fn file_name(now: DateTime<Utc>) -> String {
    format!(
        "chat_history_{}.txt",
        now.with_timezone(&Local).format("%Y-%m-%dT%H-%M-%S")
    )
}

/// Renders the display log as a transcript with a header and one block per
/// message.
pub fn render(messages: &[Message], now: DateTime<Utc>) -> String {
    let local_now = now.with_timezone(&Local);
    let count = |role: Role| messages.iter().filter(|m| m.role == role).count();

    let mut out = String::new();
    out.push_str("GDCHAT - Histórico da conversa\n");
    out.push_str(&format!("Data: {}\n", local_now.format("%d/%m/%Y")));
    out.push_str(&format!("Hora: {}\n", local_now.format("%H:%M:%S")));
    out.push_str(&format!(
        "Mensagens: {} (você: {}, GDCHAT: {}, sistema: {})\n",
        messages.len(),
        count(Role::User),
        count(Role::Bot),
        count(Role::System)
    ));
    out.push_str(&"=".repeat(SEPARATOR.len()));
    out.push_str("\n\n");

    for (i, message) in messages.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} ({})\n",
            i + 1,
            message.role.label(),
            message.timestamp.with_timezone(&Local).format("%H:%M:%S")
        ));
        out.push_str(SEPARATOR);
        out.push('\n');
        out.push_str(&message.content);
        out.push_str("\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_header_and_blocks() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let messages = vec![
            Message::new(1, Role::User, "Oi", ts),
            Message::new(2, Role::Bot, "Olá! Como posso ajudar?", ts),
            Message::new(3, Role::System, "⚠️ Aguarde", ts),
        ];

        let text = render(&messages, ts);
        assert!(text.starts_with("GDCHAT - Histórico da conversa\n"));
        assert!(text.contains("Mensagens: 3 (você: 1, GDCHAT: 1, sistema: 1)"));
        assert!(text.contains("[1] Você ("));
        assert!(text.contains("[2] GDCHAT ("));
        assert!(text.contains(&format!("{SEPARATOR}\nOlá! Como posso ajudar?\n\n")));
    }

    #[test]
    fn test_file_name_shape() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let name = file_name(ts);
        assert!(name.starts_with("chat_history_2025-03-0"));
        assert!(name.ends_with(".txt"));
        assert!(!name.contains(':'));
    }
}
