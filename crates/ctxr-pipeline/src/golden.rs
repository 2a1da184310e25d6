//! Gold-set generation: synthetic questions bound to the chunk that
//! answers them.

use std::sync::Arc;

use tracing::info;

use ctxr_core::error::{Error, Result};
use ctxr_core::prompts;
use ctxr_core::traits::Generator;
use ctxr_core::types::{Chunk, QaPair};

/// Generates `questions_per_chunk` questions for every chunk via one
/// templated generation call per chunk. Always run against the
/// unenriched split so enrichment cannot leak into the ground truth.
pub struct QuestionGenerator {
    generator: Arc<dyn Generator>,
    questions_per_chunk: usize,
    max_tokens: usize,
}

impl QuestionGenerator {
    pub fn new(generator: Arc<dyn Generator>, questions_per_chunk: usize) -> Self {
        Self {
            generator,
            questions_per_chunk,
            max_tokens: 512,
        }
    }

    pub fn generate(&self, chunks: &[Chunk]) -> Result<Vec<QaPair>> {
        let mut pairs = Vec::with_capacity(chunks.len() * self.questions_per_chunk);
        for chunk in chunks {
            let prompt = prompts::numbered_questions(&chunk.content, self.questions_per_chunk);
            let completion = self
                .generator
                .complete(&prompt, self.max_tokens, 0.0)
                .map_err(|e| e.for_chunk(&chunk.id))?;
            let questions = parse_numbered(&completion, self.questions_per_chunk)
                .map_err(|e| Error::Parse(format!("questions for chunk '{}': {e}", chunk.id)))?;
            for question in questions {
                pairs.push(QaPair {
                    chunk_id: chunk.id.clone(),
                    question,
                });
            }
        }
        info!(pairs = pairs.len(), chunks = chunks.len(), "gold set generated");
        Ok(pairs)
    }
}

/// Parse a completion expected to hold exactly `expected` questions as a
/// numbered list (`1. q` or `1) q`), one per line, numbered sequentially.
/// Anything else is a parse error, never a silent truncation.
fn parse_numbered(text: &str, expected: usize) -> std::result::Result<Vec<String>, String> {
    let mut questions = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(format!("unnumbered line: '{line}'"));
        }
        let rest = &line[digits.len()..];
        let rest = rest
            .strip_prefix('.')
            .or_else(|| rest.strip_prefix(')'))
            .ok_or_else(|| format!("line lacks '.' or ')' after its number: '{line}'"))?;
        let number: usize = digits
            .parse()
            .map_err(|_| format!("bad line number: '{line}'"))?;
        if number != questions.len() + 1 {
            return Err(format!(
                "expected line number {}, found {number}",
                questions.len() + 1
            ));
        }
        let question = rest.trim();
        if question.is_empty() {
            return Err(format!("empty question on line {number}"));
        }
        questions.push(question.to_string());
    }
    if questions.len() != expected {
        return Err(format!(
            "expected {expected} questions, parsed {}",
            questions.len()
        ));
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::parse_numbered;

    #[test]
    fn accepts_dot_and_paren_numbering() {
        let parsed = parse_numbered("1. What grew?\n2) What shrank?", 2).expect("parse");
        assert_eq!(parsed, vec!["What grew?".to_string(), "What shrank?".to_string()]);
    }

    #[test]
    fn wrong_count_is_an_error() {
        assert!(parse_numbered("1. Only one question", 2).is_err());
        assert!(parse_numbered("1. a\n2. b\n3. c", 2).is_err());
    }

    #[test]
    fn unnumbered_or_out_of_order_lines_are_errors() {
        assert!(parse_numbered("What grew?\nWhat shrank?", 2).is_err());
        assert!(parse_numbered("2. b\n1. a", 2).is_err());
        assert!(parse_numbered("1. \n2. b", 2).is_err());
    }

    #[test]
    fn blank_lines_are_ignored() {
        let parsed = parse_numbered("\n1. a\n\n2. b\n", 2).expect("parse");
        assert_eq!(parsed.len(), 2);
    }
}
