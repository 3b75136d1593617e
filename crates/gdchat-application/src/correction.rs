//! Chunked correction of oversized documents.
//!
//! One model serves the whole job, chunks go out strictly one after another,
//! and a single busy span and rate-limit stamp cover every call.

use crate::orchestrator::{ChatOrchestrator, SessionState};
use crate::outcome::Outcome;
use gdchat_core::chunker::{self, PARAGRAPH_DELIMITER, TextChunk};
use gdchat_core::error::{ChatError, Result};
use gdchat_core::message::{ApiTurn, Role, Visibility};
use gdchat_core::protocol::{FINISH_SAFETY, GenerateContentRequest, GenerationParams};
use tokio::sync::MutexGuard;

/// Builds the prompt for one chunk.
///
/// The overlap is marked as read-only context so the model does not echo it.
pub fn correction_prompt(chunk: &TextChunk) -> String {
    let mut prompt = format!(
        "Corrija gramaticalmente o texto abaixo e retorne apenas o texto corrigido, \
         sem comentários. Esta é a parte {} de {} de um documento maior.\n",
        chunk.index, chunk.total
    );
    if !chunk.overlap_prefix.is_empty() {
        prompt.push_str(
            "\nContexto da parte anterior (somente leitura, NÃO inclua na resposta):\n\"\"\"\n",
        );
        prompt.push_str(&chunk.overlap_prefix);
        prompt.push_str("\n\"\"\"\n");
    }
    prompt.push_str("\nTexto a corrigir:\n\"\"\"\n");
    prompt.push_str(&chunk.body);
    prompt.push_str("\n\"\"\"");
    prompt
}

/// Stands in for a chunk the safety filter refused.
pub fn blocked_placeholder(index: usize, total: usize, reason: &str) -> String {
    format!("[Parte {index}/{total} bloqueada pelo filtro de segurança: {reason}]")
}

enum ChunkResult {
    Corrected(String),
    Blocked(String),
}

impl ChatOrchestrator {
    /// Runs the confirmed large-text correction for `input`.
    pub(crate) async fn run_large_correction(
        &self,
        mut session: MutexGuard<'_, SessionState>,
        input: String,
    ) -> Outcome {
        let Some(_busy) = self.begin_workflow(&mut session) else {
            return Outcome::Busy;
        };

        let correction = &self.config.correction;
        let visibility = if correction.exclude_from_api {
            Visibility::DisplayOnly
        } else {
            Visibility::Everywhere
        };
        session
            .conversation
            .append(Role::User, input.as_str(), visibility);

        let chunks = chunker::split(
            &input,
            correction.chunk_max_chars,
            correction.chunk_overlap_chars,
        );
        let model = match session.selector.choose() {
            Ok(model) => model,
            Err(e) => return self.fail(&mut session, e),
        };
        drop(session);

        let total = chunks.len();
        tracing::info!(
            "[Correction] Correcting {} chunk(s) with {}",
            total,
            model
        );

        let mut outputs = Vec::with_capacity(total);
        let mut blocked = 0usize;
        for chunk in &chunks {
            self.progress(format!("Processando parte {}/{}…", chunk.index, total))
                .await;

            match self.correct_chunk(&model, chunk).await {
                Ok(ChunkResult::Corrected(text)) => outputs.push(text),
                Ok(ChunkResult::Blocked(reason)) => {
                    tracing::warn!(
                        "[Correction] Chunk {}/{} blocked: {}",
                        chunk.index,
                        total,
                        reason
                    );
                    blocked += 1;
                    outputs.push(blocked_placeholder(chunk.index, total, &reason));
                }
                Err(e) => {
                    tracing::error!(
                        "[Correction] Aborted at chunk {}/{}: {}",
                        chunk.index,
                        total,
                        e
                    );
                    let mut session = self.session.lock().await;
                    return self.fail(&mut session, e);
                }
            }
        }

        let mut session = self.session.lock().await;
        session.conversation.append(
            Role::Bot,
            outputs.join(PARAGRAPH_DELIMITER),
            visibility,
        );
        let mut summary = format!("✅ Correção concluída em {total} parte(s).");
        if blocked > 0 {
            summary.push_str(&format!(" {blocked} parte(s) bloqueada(s) pelo filtro."));
        }
        session.conversation.append_system(summary);

        Outcome::Corrected {
            chunks: total,
            blocked,
        }
    }

    async fn correct_chunk(&self, model: &str, chunk: &TextChunk) -> Result<ChunkResult> {
        let generation = &self.config.generation;
        let params = GenerationParams {
            temperature: generation.correction_temperature,
            top_k: generation.top_k,
            top_p: generation.top_p,
            max_output_tokens: generation.long_input_max_output_tokens,
        };
        let turns = [ApiTurn::user(correction_prompt(chunk))];
        let request = GenerateContentRequest::new(&turns, params, &generation.safety_threshold);

        let response = self.client.generate(model, &request).await?;
        if let Some(reason) = response.block_reason() {
            return Ok(ChunkResult::Blocked(reason.to_string()));
        }
        if response.is_truncated() {
            tracing::warn!(
                "[Correction] Chunk {}/{} hit the output ceiling",
                chunk.index,
                chunk.total
            );
        }
        match response.text() {
            Some(text) => Ok(ChunkResult::Corrected(text.trim().to_string())),
            None if response.is_safety_stop() => {
                Ok(ChunkResult::Blocked(FINISH_SAFETY.to_string()))
            }
            None => Err(ChatError::EmptyResponse),
        }
    }

    async fn progress(&self, line: String) {
        let mut session = self.session.lock().await;
        session.conversation.append_system(line);
    }
}
