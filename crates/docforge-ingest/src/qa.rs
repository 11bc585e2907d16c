//! QA-pair parsing for QA-form documents.
//!
//! QA generation itself happens upstream (an LLM concern outside this
//! pipeline); documents arrive with `Q1:/A1:` formatted text that splits into
//! question/answer pairs here.

use once_cell::sync::Lazy;
use regex::Regex;

static Q_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"Q\d+:").unwrap());
static QA_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^Q\d+:\s*(.*?)\s*A\d+:\s*(.*)$").unwrap());
static ANSWER_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*").unwrap());

/// One parsed question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Parse `Qn: ... An: ...` formatted text into pairs.
///
/// Empty questions or answers are dropped; answer-internal indentation is
/// collapsed to bare newlines.
pub fn parse_qa_pairs(text: &str) -> Vec<QaPair> {
    let starts: Vec<usize> = Q_MARKER.find_iter(text).map(|m| m.start()).collect();
    let mut pairs = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let Some(caps) = QA_BLOCK.captures(text[start..end].trim()) else {
            continue;
        };
        let question = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let answer = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        if question.is_empty() || answer.is_empty() {
            continue;
        }
        pairs.push(QaPair {
            question: question.to_string(),
            answer: ANSWER_NEWLINES.replace_all(answer, "\n").into_owned(),
        });
    }
    pairs
}
