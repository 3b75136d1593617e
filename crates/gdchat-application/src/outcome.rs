//! Result values returned to the UI layer.

/// A decision the user has to make before the orchestrator can continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Wipe the whole conversation.
    ClearHistory,
    /// Correct an oversized text in `chunks` sequential parts.
    LargeCorrection { chars: usize, chunks: usize },
}

impl PendingAction {
    /// The yes/no question to put to the user.
    pub fn question(&self) -> String {
        match self {
            PendingAction::ClearHistory => {
                "Tem certeza que deseja limpar todo o histórico?".to_string()
            }
            PendingAction::LargeCorrection { chars, chunks } => format!(
                "Texto grande detectado ({chars} caracteres). Corrigir em {chunks} parte(s)?"
            ),
        }
    }
}

/// How a call to `handle` or `resolve_confirmation` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do (empty input, or no confirmation pending).
    Ignored,
    /// The user asked to leave.
    Exit,
    /// A local command ran.
    CommandHandled,
    /// Rejected because a remote workflow is in flight.
    Busy,
    /// Rejected by the client-side rate limit.
    RateLimited { wait_secs: u64 },
    /// Waiting for `resolve_confirmation`.
    NeedsConfirmation(PendingAction),
    /// A bot reply was recorded.
    Replied { model: String, continuations: usize },
    /// A chunked correction finished; `blocked` chunks were replaced by placeholders.
    Corrected { chunks: usize, blocked: usize },
    /// The safety filter refused the request.
    Blocked { reason: String },
    /// Transport, API or decoding failure.
    Failed { error: String },
}

impl Outcome {
    /// Whether the caller should keep the typed text for resubmission.
    pub fn preserves_input(&self) -> bool {
        matches!(self, Outcome::Busy | Outcome::RateLimited { .. })
    }
}
