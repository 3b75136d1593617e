mod renderer;

use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use gdchat_application::{ChatOrchestrator, Outcome};
use gdchat_core::command::{COMMAND_PREFIX, builtin_commands};
use gdchat_infrastructure::{
    ConfigService, FileKeyValueStore, FileTranscriptExporter, GdchatPaths,
};
use gdchat_interaction::GeminiClient;

use crate::renderer::TerminalRenderer;

/// Terminal chat client for the Gemini API.
#[derive(Debug, Parser)]
#[command(name = "gdchat", version, about)]
struct Args {
    /// Directory holding config.toml and secret.json
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Directory for history, exports and logs
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Model to use; repeat to build a rotation pool (replaces the configured pool)
    #[arg(long = "model", value_name = "MODEL")]
    models: Vec<String>,
}

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        let commands = builtin_commands()
            .iter()
            .flat_map(|cmd| std::iter::once(cmd.name).chain(cmd.aliases.iter().copied()))
            .map(|name| format!("{COMMAND_PREFIX}{name}"))
            .collect();
        Self { commands }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with(COMMAND_PREFIX) && !line.contains(' ') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with(COMMAND_PREFIX) {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(hint.bright_black().to_string())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with(COMMAND_PREFIX) && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

type ChatEditor = Editor<CliHelper, DefaultHistory>;

/// Sends tracing output to a daily file so it never interleaves with the REPL.
fn init_tracing(logs_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("creating {}", logs_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(logs_dir, "gdchat.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .ok();
    Ok(guard)
}

fn build_orchestrator(paths: &GdchatPaths, models: Vec<String>) -> Result<ChatOrchestrator> {
    let config_service = ConfigService::new(paths);
    let mut config = config_service.load_config()?;
    if !models.is_empty() {
        config.models.pool = models;
    }

    let api_key = match config_service.api_key() {
        Ok(key) => key,
        Err(e) => {
            let secret_file = config_service.ensure_secret_file()?;
            anyhow::bail!("{e}\nEdite {} ou defina GEMINI_API_KEY.", secret_file.display());
        }
    };
    let client = GeminiClient::from_config(api_key, &config.api)?;
    let store = FileKeyValueStore::open(paths.store_dir())?;
    let exporter = FileTranscriptExporter::new(paths.exports_dir());

    tracing::info!(
        "[Main] Starting with {} model(s), data in {}",
        config.models.pool.len(),
        paths.data_dir().display()
    );

    Ok(ChatOrchestrator::builder(config, Arc::new(client))
        .store(Arc::new(store))
        .exporter(Arc::new(exporter))
        .observer(Arc::new(TerminalRenderer::stdout()))
        .build())
}

/// Asks a yes/no question; anything but an explicit yes counts as no.
fn confirm(rl: &mut ChatEditor, question: &str) -> bool {
    println!("{}", question.bright_yellow());
    match rl.readline("(s/n) ") {
        Ok(answer) => matches!(
            answer.trim().to_lowercase().as_str(),
            "s" | "sim" | "y" | "yes"
        ),
        Err(_) => false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let paths = GdchatPaths::resolve(args.config_dir, args.data_dir)?;
    let log_guard = init_tracing(&paths.logs_dir())?;

    let chat = match build_orchestrator(&paths, args.models) {
        Ok(chat) => chat,
        Err(e) => {
            tracing::error!("[Main] Startup failed: {:#}", e);
            eprintln!("{}", format!("Erro: {e:#}").red());
            drop(log_guard);
            std::process::exit(1);
        }
    };

    let mut rl: ChatEditor = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    chat.start().await;

    // Text kept for resubmission after a busy or rate-limit rejection.
    let mut kept = String::new();

    // ===== Main REPL Loop =====
    loop {
        let readline = if kept.is_empty() {
            rl.readline(">> ")
        } else {
            rl.readline_with_initial(">> ", (kept.as_str(), ""))
        };

        match readline {
            Ok(line) => {
                kept.clear();
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }

                let mut outcome = chat.handle(&line).await;
                while let Outcome::NeedsConfirmation(action) = &outcome {
                    let accept = confirm(&mut rl, &action.question());
                    outcome = chat.resolve_confirmation(accept).await;
                }

                tracing::debug!("[Main] Outcome: {:?}", outcome);
                if outcome == Outcome::Exit {
                    break;
                }
                if outcome.preserves_input() {
                    kept = line;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detectado. Digite 'sair' para encerrar.".yellow());
            }
            Err(ReadlineError::Eof) => {
                chat.handle("sair").await;
                break;
            }
            Err(err) => {
                tracing::error!("[Main] Readline failed: {:?}", err);
                eprintln!("{}", format!("Erro: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_knows_names_and_aliases() {
        let helper = CliHelper::new();
        assert!(helper.commands.contains(&"/ajuda".to_string()));
        assert!(helper.commands.contains(&"/help".to_string()));
        assert!(helper.commands.contains(&"/exportar".to_string()));
    }

    #[test]
    fn test_args_accept_repeated_models() {
        let args = Args::parse_from([
            "gdchat",
            "--model",
            "gemini-2.5-flash",
            "--model",
            "gemini-2.5-flash-lite",
            "--data-dir",
            "/tmp/gd",
        ]);
        assert_eq!(args.models.len(), 2);
        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/gd")));
        assert_eq!(args.config_dir, None);
    }
}
