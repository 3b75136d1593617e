//! Terminal rendering of chat events.

use chrono::Local;
use colored::Colorize;
use gdchat_core::events::{ChatEvent, ChatObserver};
use gdchat_core::format::tidy_response;
use gdchat_core::message::{Message, Role};
use std::io::Write;
use std::sync::Mutex;

const BOT_PREFIX: &str = "🤖 GDCHAT:";
const LOADING: &str = "Carregando resposta...";

/// Prints every event to a terminal-like sink as it happens.
pub struct TerminalRenderer<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_block(&self, block: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let _ = writeln!(out, "{block}");
        let _ = out.flush();
    }
}

impl<W: Write + Send> ChatObserver for TerminalRenderer<W> {
    fn on_event(&self, event: &ChatEvent) {
        match event {
            ChatEvent::MessageAppended(message) => self.write_block(&format_message(message)),
            ChatEvent::Notice(line) => self.write_block(&line.bright_magenta().to_string()),
            ChatEvent::HistoryCleared => {}
            ChatEvent::BusyChanged(true) => self.write_block(&LOADING.bright_black().italic().to_string()),
            ChatEvent::BusyChanged(false) => {}
        }
    }
}

/// Colored text for one message, with a trailing blank line after bot replies.
pub fn format_message(message: &Message) -> String {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    match message.role {
        Role::User => format!("{} {}", format!("Você ({time}):").green().bold(), message.content.green()),
        Role::Bot => {
            let header = format!("{BOT_PREFIX} ({time})").bright_blue().bold();
            let body = tidy_response(&message.content)
                .lines()
                .map(|line| line.bright_blue().to_string())
                .collect::<Vec<_>>()
                .join("\n");
            format!("{header}\n{body}\n")
        }
        Role::System => {
            let content = &message.content;
            let warning = content.starts_with('⚠') || content.starts_with('❌') || content.starts_with('🚫');
            if warning {
                content.yellow().to_string()
            } else {
                content.bright_black().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_bot_reply_is_tidied_and_prefixed() {
        plain();
        let message = Message::new(1, Role::Bot, "Lista:\n- um\n\n\n\n- dois", Utc::now());
        let text = format_message(&message);
        assert!(text.starts_with(BOT_PREFIX));
        assert!(text.contains("Lista:\n• um\n\n• dois"));
    }

    #[test]
    fn test_renderer_writes_events() {
        plain();
        let renderer = TerminalRenderer::new(Vec::new());
        renderer.on_event(&ChatEvent::BusyChanged(true));
        renderer.on_event(&ChatEvent::Notice("=== Bem-vindo ao GDCHAT ===".into()));
        renderer.on_event(&ChatEvent::MessageAppended(Message::new(
            1,
            Role::System,
            "⚠️ Aguarde 3 segundo(s)",
            Utc::now(),
        )));
        renderer.on_event(&ChatEvent::BusyChanged(false));

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(
            output,
            "Carregando resposta...\n=== Bem-vindo ao GDCHAT ===\n⚠️ Aguarde 3 segundo(s)\n"
        );
    }
}
