//! Builtin slash commands and exit keywords.
//!
//! These commands are always available. They are local and synchronous:
//! none of them touches the rate limit or the busy flag.

use std::sync::OnceLock;

/// Prefix that marks a local command.
pub const COMMAND_PREFIX: char = '/';

/// Inputs that end the chat (compared case-insensitively, whole input).
pub const EXIT_KEYWORDS: [&str; 4] = ["sair", "exit", "fim", "quit"];

/// What a builtin command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Help,
    Clear,
    Export,
    Info,
    Models,
}

/// A builtin slash command.
#[derive(Debug, Clone)]
pub struct BuiltinCommand {
    /// Command name (without the leading /)
    pub name: &'static str,
    /// Alternative names accepted for the same command
    pub aliases: &'static [&'static str],
    /// Human-readable description
    pub description: &'static str,
    pub kind: CommandKind,
}

impl BuiltinCommand {
    pub const fn new(
        name: &'static str,
        aliases: &'static [&'static str],
        description: &'static str,
        kind: CommandKind,
    ) -> Self {
        Self {
            name,
            aliases,
            description,
            kind,
        }
    }

    fn matches(&self, token: &str) -> bool {
        self.name == token || self.aliases.contains(&token)
    }
}

static BUILTIN_COMMANDS: OnceLock<Vec<BuiltinCommand>> = OnceLock::new();

/// Returns all builtin commands, in help order.
pub fn builtin_commands() -> &'static [BuiltinCommand] {
    BUILTIN_COMMANDS.get_or_init(|| {
        vec![
            BuiltinCommand::new("ajuda", &["help"], "Mostra esta mensagem", CommandKind::Help),
            BuiltinCommand::new("limpar", &["clear"], "Reinicia a conversa", CommandKind::Clear),
            BuiltinCommand::new(
                "exportar",
                &["export", "salvar"],
                "Salva o histórico em arquivo",
                CommandKind::Export,
            ),
            BuiltinCommand::new(
                "info",
                &["status"],
                "Mostra o estado da sessão",
                CommandKind::Info,
            ),
            BuiltinCommand::new(
                "modelos",
                &["models"],
                "Lista os modelos e quantas vezes foram usados",
                CommandKind::Models,
            ),
        ]
    })
}

/// Finds a builtin command by its token (with or without the leading `/`).
pub fn find_command(token: &str) -> Option<&'static BuiltinCommand> {
    let token = token.trim_start_matches(COMMAND_PREFIX).to_lowercase();
    builtin_commands().iter().find(|cmd| cmd.matches(&token))
}

/// Whether `input` (already trimmed) is an exit keyword.
pub fn is_exit_keyword(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_KEYWORDS.contains(&lower.as_str())
}

/// Whether `input` (already trimmed) should be handled as a command.
pub fn is_command(input: &str) -> bool {
    input.starts_with(COMMAND_PREFIX)
}

/// Lines shown by `/ajuda`.
pub fn help_lines() -> Vec<String> {
    let mut lines = vec!["📋 Comandos disponíveis:".to_string()];
    lines.extend(
        builtin_commands()
            .iter()
            .map(|cmd| format!("{COMMAND_PREFIX}{} - {}", cmd.name, cmd.description)),
    );
    lines
}

/// Banner shown when there is no conversation to restore.
pub fn welcome_lines() -> Vec<String> {
    vec![
        "=== Bem-vindo ao GDCHAT ===".to_string(),
        "Comandos especiais:".to_string(),
        "- 'sair', 'fim' ou 'exit' para encerrar".to_string(),
        "- /limpar reinicia a conversa".to_string(),
        "- /exportar guarda o histórico em arquivo".to_string(),
        "- Digite /ajuda para ver comandos extras".to_string(),
    ]
}
