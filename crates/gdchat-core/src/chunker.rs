//! Paragraph-aware text chunking for oversized documents.
//!
//! Sizes are counted in characters, not bytes. Chunks are formed from whole
//! paragraphs (separated by [`PARAGRAPH_DELIMITER`]); joining every chunk
//! body with the delimiter reproduces the input exactly.
//!
//! A single paragraph longer than `max_chars` is emitted whole as its own
//! chunk, so `max_chars` is a target rather than a hard bound. Blank
//! paragraphs never form a chunk on their own; they ride along with the
//! neighbouring text.

/// Blank line separating paragraphs.
pub const PARAGRAPH_DELIMITER: &str = "\n\n";

/// One ordered segment of a split document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Segment text; this is the only part that belongs in the output.
    pub body: String,
    /// Trailing characters of the previous chunk's body, for prompt context.
    pub overlap_prefix: String,
    /// 1-based position.
    pub index: usize,
    pub total: usize,
}

/// Splits `text` into ordered chunks of at most `max_chars` characters where
/// paragraph boundaries allow it.
///
/// Deterministic: the same input and parameters always give the same chunks.
pub fn split(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<TextChunk> {
    if char_len(text) <= max_chars {
        return finalize(vec![text.to_string()], overlap_chars);
    }

    let mut bodies: Vec<String> = Vec::new();
    let mut running: Vec<&str> = Vec::new();
    let mut running_len = 0usize;

    for paragraph in text.split(PARAGRAPH_DELIMITER) {
        let paragraph_len = char_len(paragraph);
        let joined_len = if running.is_empty() {
            paragraph_len
        } else {
            running_len + PARAGRAPH_DELIMITER.len() + paragraph_len
        };

        if joined_len > max_chars && has_text(&running) {
            bodies.push(running.join(PARAGRAPH_DELIMITER));
            running.clear();
            running.push(paragraph);
            running_len = paragraph_len;
        } else {
            running.push(paragraph);
            running_len = joined_len;
        }
    }

    if !running.is_empty() {
        let tail = running.join(PARAGRAPH_DELIMITER);
        match bodies.last_mut() {
            // Trailing blank paragraphs stay with the last real segment.
            Some(last) if !has_text(&running) => {
                last.push_str(PARAGRAPH_DELIMITER);
                last.push_str(&tail);
            }
            _ => bodies.push(tail),
        }
    }

    finalize(bodies, overlap_chars)
}

/// Reassembles chunk bodies, ignoring overlap prefixes.
pub fn reassemble(chunks: &[TextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.body.as_str())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_DELIMITER)
}

fn finalize(bodies: Vec<String>, overlap_chars: usize) -> Vec<TextChunk> {
    let total = bodies.len();
    let mut chunks = Vec::with_capacity(total);
    let mut previous: Option<&str> = None;

    for (i, body) in bodies.iter().enumerate() {
        let overlap_prefix = previous
            .map(|prev| tail_chars(prev, overlap_chars).to_string())
            .unwrap_or_default();
        chunks.push(TextChunk {
            body: body.clone(),
            overlap_prefix,
            index: i + 1,
            total,
        });
        previous = Some(body);
    }

    chunks
}

/// Whether the running segment holds anything besides blank paragraphs.
fn has_text(paragraphs: &[&str]) -> bool {
    paragraphs.iter().any(|p| !p.trim().is_empty())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text` (all of it when shorter).
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => text,
    }
}
