//! The request orchestrator: classifies input and drives the send lifecycle.
//!
//! ```text
//! idle -> classifying -> { local command | exit | confirmation | sending } -> idle
//! ```
//!
//! Session state sits behind an async mutex that is never held across a
//! network call. The busy flag is the only exclusion mechanism for remote
//! workflows: a send attempted while it is set is rejected, not queued.

use crate::outcome::{Outcome, PendingAction};
use gdchat_core::chunker;
use gdchat_core::command::{self, CommandKind};
use gdchat_core::config::ChatConfig;
use gdchat_core::conversation::ConversationManager;
use gdchat_core::error::{ChatError, Result};
use gdchat_core::events::{ChatEvent, EventBus};
use gdchat_core::history_store::{HistoryStore, KeyValueStore, MemoryKeyValueStore};
use gdchat_core::message::{ApiTurn, Message, Role, Visibility};
use gdchat_core::model_selector::ModelSelector;
use gdchat_core::protocol::{
    GenerateContentRequest, GenerationClient, GenerationParams, looks_truncated,
};
use gdchat_core::rate_limit::{Clock, RateLimitState, SystemClock};
use gdchat_core::transcript::{self, TranscriptExporter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Instruction sent after a reply was cut at the output-token ceiling.
pub const CONTINUE_INSTRUCTION: &str =
    "Continue exatamente de onde parou. Não repita nada do que já foi escrito.";

const FAREWELL: &str = "> Chat encerrado. Até mais!";

/// Mutable session data guarded by the orchestrator's mutex.
pub(crate) struct SessionState {
    pub(crate) conversation: ConversationManager,
    pub(crate) selector: ModelSelector,
    pub(crate) rate: RateLimitState,
    pub(crate) pending: Option<Pending>,
}

pub(crate) enum Pending {
    ClearHistory,
    LargeCorrection { input: String },
}

/// Releases the busy flag when dropped, whatever path the workflow took.
pub(crate) struct BusyGuard {
    flag: Arc<AtomicBool>,
    events: EventBus,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>, events: &EventBus) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        events.publish(ChatEvent::BusyChanged(true));
        Some(Self {
            flag: Arc::clone(flag),
            events: events.clone(),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.events.publish(ChatEvent::BusyChanged(false));
    }
}

/// Result of one chat exchange including auto-continuation.
enum Reply {
    Text { text: String, continuations: usize },
    Blocked(String),
}

/// Drives every user input from classification to the recorded reply.
pub struct ChatOrchestrator {
    pub(crate) config: ChatConfig,
    pub(crate) client: Arc<dyn GenerationClient>,
    exporter: Option<Arc<dyn TranscriptExporter>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: EventBus,
    busy: Arc<AtomicBool>,
    pub(crate) session: Mutex<SessionState>,
}

/// Assembles a [`ChatOrchestrator`] from its collaborators.
pub struct ChatOrchestratorBuilder {
    config: ChatConfig,
    client: Arc<dyn GenerationClient>,
    store: Arc<dyn KeyValueStore>,
    exporter: Option<Arc<dyn TranscriptExporter>>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    selector: Option<ModelSelector>,
}

impl ChatOrchestratorBuilder {
    /// Persistent key-value storage for history and the rate-limit timestamp.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = store;
        self
    }

    pub fn exporter(mut self, exporter: Arc<dyn TranscriptExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn gdchat_core::events::ChatObserver>) -> Self {
        self.events.subscribe(observer);
        self
    }

    /// Overrides the selector built from `config.models.pool`.
    pub fn selector(mut self, selector: ModelSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn build(self) -> ChatOrchestrator {
        let store = HistoryStore::new(self.store, self.config.limits.max_display);
        let (conversation, last_send_ms) = ConversationManager::restore(
            store,
            Arc::clone(&self.clock),
            self.events.clone(),
            &self.config.limits,
        );
        let selector = self
            .selector
            .unwrap_or_else(|| ModelSelector::new(self.config.models.pool.clone()));

        ChatOrchestrator {
            config: self.config,
            client: self.client,
            exporter: self.exporter,
            clock: self.clock,
            events: self.events,
            busy: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(SessionState {
                conversation,
                selector,
                rate: RateLimitState::new(last_send_ms),
                pending: None,
            }),
        }
    }
}

impl ChatOrchestrator {
    pub fn builder(config: ChatConfig, client: Arc<dyn GenerationClient>) -> ChatOrchestratorBuilder {
        ChatOrchestratorBuilder {
            config,
            client,
            store: Arc::new(MemoryKeyValueStore::new()),
            exporter: None,
            clock: Arc::new(SystemClock),
            events: EventBus::new(),
            selector: None,
        }
    }

    /// Publishes the welcome banner, or replays the restored conversation.
    pub async fn start(&self) {
        let session = self.session.lock().await;
        if session.conversation.is_empty() {
            self.publish_welcome();
        } else {
            for message in session.conversation.display_log() {
                self.events.publish(ChatEvent::MessageAppended(message.clone()));
            }
        }
    }

    /// Handles one line of user input.
    pub async fn handle(&self, raw: &str) -> Outcome {
        let input = sanitize(raw, self.config.limits.max_user_input_chars);
        if input.is_empty() {
            return Outcome::Ignored;
        }

        if command::is_exit_keyword(&input) {
            self.events.publish(ChatEvent::Notice(FAREWELL.to_string()));
            return Outcome::Exit;
        }

        let mut session = self.session.lock().await;
        if session.pending.take().is_some() {
            tracing::debug!("[Orchestrator] Pending confirmation dropped by new input");
        }

        if command::is_command(&input) {
            return self.run_command(&mut session, &input);
        }

        if let Some(outcome) = self.check_gates(&mut session) {
            return outcome;
        }

        let chars = input.chars().count();
        if chars > self.config.limits.large_text_threshold
            && self.config.correction.mentions_correction(&input)
        {
            let chunks = chunker::split(
                &input,
                self.config.correction.chunk_max_chars,
                self.config.correction.chunk_overlap_chars,
            )
            .len();
            tracing::info!(
                "[Orchestrator] Large correction candidate: {} chars, {} chunk(s)",
                chars,
                chunks
            );
            session.pending = Some(Pending::LargeCorrection { input });
            return Outcome::NeedsConfirmation(PendingAction::LargeCorrection { chars, chunks });
        }

        self.send_normal(session, input).await
    }

    /// Answers the question raised by the last `NeedsConfirmation`.
    pub async fn resolve_confirmation(&self, accept: bool) -> Outcome {
        let mut session = self.session.lock().await;
        let Some(pending) = session.pending.take() else {
            return Outcome::Ignored;
        };

        match pending {
            Pending::ClearHistory => {
                if accept && self.is_busy() {
                    session
                        .conversation
                        .append_system("⏳ Aguarde a resposta atual antes de limpar o histórico.");
                    return Outcome::Busy;
                }
                if accept {
                    self.clear_history(&mut session);
                } else {
                    session.conversation.append_system("Limpeza cancelada.");
                }
                Outcome::CommandHandled
            }
            Pending::LargeCorrection { input } => {
                // Time has passed while the user was deciding.
                if let Some(outcome) = self.check_gates(&mut session) {
                    return outcome;
                }
                if accept {
                    self.run_large_correction(session, input).await
                } else {
                    self.send_normal(session, input).await
                }
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn display_log(&self) -> Vec<Message> {
        let session = self.session.lock().await;
        session.conversation.display_log().cloned().collect()
    }

    pub async fn api_log(&self) -> Vec<Message> {
        let session = self.session.lock().await;
        session.conversation.api_log().cloned().collect()
    }

    /// Invocation count per configured model.
    pub async fn model_usage(&self) -> Vec<(String, u64)> {
        let session = self.session.lock().await;
        session
            .selector
            .pool()
            .iter()
            .map(|model| (model.clone(), session.selector.usage(model)))
            .collect()
    }

    // ============================================================================
    // Gating
    // ============================================================================

    /// Busy check first, then the rate-limit window.
    fn check_gates(&self, session: &mut SessionState) -> Option<Outcome> {
        if self.is_busy() {
            session
                .conversation
                .append_system("⏳ Aguarde: ainda estou respondendo a mensagem anterior.");
            return Some(Outcome::Busy);
        }

        let now_ms = self.clock.now_millis();
        if let Some(wait_secs) = session
            .rate
            .remaining_wait_secs(now_ms, self.config.limits.rate_limit_ms)
        {
            session.conversation.append_system(format!(
                "⚠️ Aguarde {wait_secs} segundo(s) antes de enviar outra mensagem."
            ));
            return Some(Outcome::RateLimited { wait_secs });
        }

        None
    }

    /// Takes the busy flag and stamps the rate limit. One stamp per workflow.
    pub(crate) fn begin_workflow(&self, session: &mut SessionState) -> Option<BusyGuard> {
        let guard = BusyGuard::acquire(&self.busy, &self.events)?;
        let now_ms = self.clock.now_millis();
        session.rate.record_send(now_ms);
        session.conversation.store().save_last_send(now_ms);
        Some(guard)
    }

    // ============================================================================
    // Normal send
    // ============================================================================

    async fn send_normal(&self, mut session: MutexGuard<'_, SessionState>, input: String) -> Outcome {
        let Some(_busy) = self.begin_workflow(&mut session) else {
            return Outcome::Busy;
        };

        session
            .conversation
            .append(Role::User, input.as_str(), Visibility::Everywhere);
        let payload = session.conversation.build_api_payload(None);
        let model = match session.selector.choose() {
            Ok(model) => model,
            Err(e) => return self.fail(&mut session, e),
        };
        let params = self.chat_params(&input);
        drop(session);

        tracing::info!(
            "[Orchestrator] Sending {} turn(s) to {} (temperature {})",
            payload.len(),
            model,
            params.temperature
        );
        let result = self.exchange(&model, payload, params).await;

        let mut session = self.session.lock().await;
        match result {
            Ok(Reply::Text {
                text,
                continuations,
            }) => {
                session
                    .conversation
                    .append(Role::Bot, text, Visibility::Everywhere);
                Outcome::Replied {
                    model,
                    continuations,
                }
            }
            Ok(Reply::Blocked(reason)) => {
                tracing::warn!("[Orchestrator] Prompt blocked: {}", reason);
                session.conversation.append_system(format!(
                    "🚫 Mensagem bloqueada pelo filtro de segurança (motivo: {reason})."
                ));
                Outcome::Blocked { reason }
            }
            Err(e) => self.fail(&mut session, e),
        }
    }

    /// One call plus up to `max_continue_attempts` continuation calls while
    /// the finish reason reports the output-token ceiling.
    async fn exchange(
        &self,
        model: &str,
        payload: Vec<ApiTurn>,
        params: GenerationParams,
    ) -> Result<Reply> {
        let threshold = &self.config.generation.safety_threshold;
        let request = GenerateContentRequest::new(&payload, params, threshold);
        let response = self.client.generate(model, &request).await?;

        if let Some(reason) = response.block_reason() {
            return Ok(Reply::Blocked(reason.to_string()));
        }
        let mut text = response.text().ok_or(ChatError::EmptyResponse)?;
        let mut truncated = response.is_truncated();
        let mut continuations = 0;

        while truncated && continuations < self.config.limits.max_continue_attempts {
            continuations += 1;
            tracing::info!(
                "[Orchestrator] Reply truncated, continuation {}/{}",
                continuations,
                self.config.limits.max_continue_attempts
            );

            let mut turns = payload.clone();
            turns.push(ApiTurn::model(text.as_str()));
            turns.push(ApiTurn::user(CONTINUE_INSTRUCTION));
            let request = GenerateContentRequest::new(&turns, params, threshold);
            let response = self.client.generate(model, &request).await?;

            if let Some(reason) = response.block_reason() {
                tracing::warn!("[Orchestrator] Continuation blocked: {}", reason);
                break;
            }
            let Some(more) = response.text() else {
                tracing::warn!("[Orchestrator] Continuation returned no text");
                break;
            };
            text.push_str(&more);
            truncated = response.is_truncated();
        }

        if truncated {
            tracing::warn!("[Orchestrator] Reply still truncated after {} continuation(s)", continuations);
        } else if looks_truncated(&text) {
            tracing::debug!("[Orchestrator] Reply looks cut short but finish reason says otherwise");
        }

        Ok(Reply::Text {
            text,
            continuations,
        })
    }

    fn chat_params(&self, input: &str) -> GenerationParams {
        let generation = &self.config.generation;
        let temperature = if self.config.correction.mentions_correction(input) {
            generation.correction_temperature
        } else {
            generation.chat_temperature
        };
        let max_output_tokens = if input.chars().count() > generation.long_input_threshold_chars {
            generation.long_input_max_output_tokens
        } else {
            generation.max_output_tokens
        };

        GenerationParams {
            temperature,
            top_k: generation.top_k,
            top_p: generation.top_p,
            max_output_tokens,
        }
    }

    pub(crate) fn fail(&self, session: &mut SessionState, error: ChatError) -> Outcome {
        if error.is_remote() {
            tracing::warn!("[Orchestrator] Remote call failed: {}", error);
        } else {
            tracing::error!("[Orchestrator] Request failed: {}", error);
        }
        session
            .conversation
            .append_system(format!("❌ Erro: {error}"));
        Outcome::Failed {
            error: error.to_string(),
        }
    }

    // ============================================================================
    // Local commands
    // ============================================================================

    fn run_command(&self, session: &mut SessionState, input: &str) -> Outcome {
        let token = input.split_whitespace().next().unwrap_or(input);
        let Some(cmd) = command::find_command(token) else {
            session.conversation.append_system(format!(
                "⚠️ Comando não reconhecido: {input}. Digite /ajuda."
            ));
            return Outcome::CommandHandled;
        };

        tracing::debug!("[Orchestrator] Command /{}", cmd.name);
        match cmd.kind {
            CommandKind::Help => {
                session
                    .conversation
                    .append_system(command::help_lines().join("\n"));
            }
            CommandKind::Clear => {
                session.pending = Some(Pending::ClearHistory);
                return Outcome::NeedsConfirmation(PendingAction::ClearHistory);
            }
            CommandKind::Export => self.export(session),
            CommandKind::Info => {
                let info = self.info_lines(session).join("\n");
                session.conversation.append_system(info);
            }
            CommandKind::Models => {
                let mut lines = vec!["🤖 Modelos disponíveis:".to_string()];
                lines.extend(session.selector.pool().iter().map(|model| {
                    format!("- {model} (usado {} vez(es))", session.selector.usage(model))
                }));
                session.conversation.append_system(lines.join("\n"));
            }
        }
        Outcome::CommandHandled
    }

    fn export(&self, session: &mut SessionState) {
        let Some(exporter) = &self.exporter else {
            session
                .conversation
                .append_system("❌ Erro ao salvar: exportação indisponível.");
            return;
        };

        let now = self.clock.now();
        let messages: Vec<Message> = session.conversation.display_log().cloned().collect();
        let contents = transcript::render(&messages, now);
        match exporter.export(&transcript::file_name(now), &contents) {
            Ok(location) => {
                tracing::info!("[Orchestrator] Transcript exported to {}", location);
                session
                    .conversation
                    .append_system(format!("✅ Conversa salva como {location}"));
            }
            Err(e) => {
                tracing::warn!("[Orchestrator] Export failed: {}", e);
                session
                    .conversation
                    .append_system(format!("❌ Erro ao salvar: {e}"));
            }
        }
    }

    fn info_lines(&self, session: &SessionState) -> Vec<String> {
        let limits = &self.config.limits;
        vec![
            "ℹ️ Estado da sessão:".to_string(),
            format!(
                "- Mensagens exibidas: {}/{}",
                session.conversation.display_log().len(),
                limits.max_display
            ),
            format!(
                "- Mensagens no contexto da API: {}/{}",
                session.conversation.api_log().len(),
                limits.max_api_history
            ),
            format!(
                "- Intervalo mínimo entre envios: {} s",
                limits.rate_limit_ms / 1000
            ),
            format!(
                "- Ocupado: {}",
                if self.is_busy() { "sim" } else { "não" }
            ),
            format!(
                "- Último modelo: {}",
                session.selector.last_used().unwrap_or("nenhum")
            ),
        ]
    }

    fn clear_history(&self, session: &mut SessionState) {
        session.conversation.clear();
        session.selector.reset();
        self.events.publish(ChatEvent::Notice(
            "> Histórico limpo. Conversa reiniciada.".to_string(),
        ));
        self.publish_welcome();
    }

    fn publish_welcome(&self) {
        for line in command::welcome_lines() {
            self.events.publish(ChatEvent::Notice(line));
        }
    }
}

/// Trims and caps input to `max_chars` characters.
fn sanitize(raw: &str, max_chars: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().take(max_chars).collect::<String>().trim_end().to_string()
}
