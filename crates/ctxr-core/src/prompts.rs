//! Prompt templates shared by the enricher and the gold-set generator.
//!
//! Centralized so offline generator stand-ins can recognize the request
//! shape by its markers instead of guessing.

/// Marker wrapping the chunk body inside both templates.
pub const CHUNK_OPEN: &str = "<chunk>";
pub const CHUNK_CLOSE: &str = "</chunk>";

/// Marker phrase identifying a gold-question request.
pub const QUESTIONS_MARKER: &str = "self-contained questions";

/// Prompt asking for a terse situating summary of `chunk` within
/// `document`, and nothing else.
pub fn situating_context(document: &str, chunk: &str) -> String {
    format!(
        "<document>\n{document}\n</document>\n\
         Here is the chunk we want to situate within the whole document:\n\
         {CHUNK_OPEN}\n{chunk}\n{CHUNK_CLOSE}\n\
         Please give a short succinct context to situate this chunk within \
         the overall document for the purposes of improving search retrieval \
         of the chunk. Answer only with the succinct context and nothing else."
    )
}

/// Prompt asking for exactly `n` numbered questions answerable from
/// `chunk`, one per line.
pub fn numbered_questions(chunk: &str, n: usize) -> String {
    format!(
        "Here is a passage from a longer document:\n\
         {CHUNK_OPEN}\n{chunk}\n{CHUNK_CLOSE}\n\
         Generate exactly {n} {QUESTIONS_MARKER} that can be answered using \
         only this passage. Respond with a numbered list, one question per \
         line, and nothing else."
    )
}

/// Extract the chunk body a template embedded between its markers.
pub fn chunk_body(prompt: &str) -> Option<&str> {
    let start = prompt.find(CHUNK_OPEN)? + CHUNK_OPEN.len();
    let end = prompt[start..].find(CHUNK_CLOSE)? + start;
    Some(prompt[start..end].trim())
}
