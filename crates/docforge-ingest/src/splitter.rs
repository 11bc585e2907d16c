//! Token-budgeted recursive text splitting.
//!
//! Two splitters cover the rule modes: [`RecursiveCharacterSplitter`] for
//! automatic segmentation (platform defaults, separator cascade tuned per
//! document language) and [`FixedRecursiveSplitter`] for custom rules (caller
//! separator honored verbatim, oversized pieces re-split recursively).
//! Boundaries are deterministic for identical input and parameters.

use std::sync::Arc;

use uuid::Uuid;

use docforge_core::capabilities::EmbeddingHandle;
use docforge_core::config::{PlatformConfig, MIN_SEGMENTATION_TOKENS};
use docforge_core::error::{Error, Result};
use docforge_core::model::{doc_hash, Chunk, ChunkMetadata, ProcessMode, Segmentation};

/// Measures text length in tokens.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Rough token estimate used when no embedding tokenizer is available:
/// one token per four characters, rounded up.
pub fn heuristic_token_count(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Token counter backed by the embedding model's tokenizer when present.
pub fn token_counter(handle: Option<Arc<dyn EmbeddingHandle>>) -> TokenCounter {
    match handle {
        Some(handle) => Arc::new(move |text: &str| handle.tokenize(text)),
        None => Arc::new(heuristic_token_count),
    }
}

/// Splits cleaned text into raw string pieces under a token budget.
pub trait TextSplitter: Send + Sync {
    fn split_text(&self, text: &str) -> Vec<String>;
}

/// Separator cascade for recursive splitting, paragraph → sentence → word.
fn separators_for_language(doc_language: &str) -> Vec<String> {
    let lang = doc_language.to_lowercase();
    let cascade: &[&str] = if lang.starts_with("zh")
        || lang.starts_with("ja")
        || lang.contains("chinese")
        || lang.contains("japanese")
    {
        &["\n\n", "。", "．", ". ", " ", ""]
    } else {
        &["\n\n", "。", ". ", " ", ""]
    };
    cascade.iter().map(|s| s.to_string()).collect()
}

/// Recursive character splitter with token-counted merge and overlap.
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    counter: TokenCounter,
}

impl RecursiveCharacterSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
        counter: TokenCounter,
    ) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators,
            counter,
        }
    }

    fn measure(&self, text: &str) -> usize {
        (self.counter)(text)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Pick the first separator present in the text; the trailing ""
        // catch-all splits character by character.
        let mut separator = separators.last().cloned().unwrap_or_default();
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep.as_str()) {
                separator = sep.clone();
                remaining = &separators[i + 1..];
                break;
            }
        }

        // Pieces keep their trailing separator, so consecutive pieces
        // concatenate back to the exact source slice and every merged chunk
        // stays a contiguous span of the input.
        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(|c| c.to_string()).collect()
        } else {
            text.split_inclusive(separator.as_str())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for split in splits {
            if self.measure(&split) <= self.chunk_size {
                pending.push(split);
            } else {
                if !pending.is_empty() {
                    chunks.extend(self.merge_splits(&pending));
                    pending.clear();
                }
                if remaining.is_empty() {
                    chunks.push(split);
                } else {
                    chunks.extend(self.split_recursive(&split, remaining));
                }
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending));
        }
        chunks
    }

    /// Greedily pack consecutive pieces under the chunk size, carrying an
    /// overlap window of trailing pieces into the next chunk.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for split in splits {
            let split_len = self.measure(split);
            if total + split_len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_chunk(&window) {
                    chunks.push(chunk);
                }
                // Shrink the window down to the overlap budget.
                while total > self.chunk_overlap
                    || (total + split_len > self.chunk_size && total > 0)
                {
                    let dropped = window.remove(0);
                    total -= self.measure(dropped);
                }
            }
            total += split_len;
            window.push(split);
        }

        if let Some(chunk) = join_chunk(&window) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn join_chunk(parts: &[&str]) -> Option<String> {
    let joined = parts.concat();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl TextSplitter for RecursiveCharacterSplitter {
    fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }
}

/// Custom-rule splitter: splits on the caller's separator first, then
/// recursively re-splits any piece over the token budget.
pub struct FixedRecursiveSplitter {
    fixed_separator: String,
    chunk_size: usize,
    recursive: RecursiveCharacterSplitter,
    counter: TokenCounter,
}

impl FixedRecursiveSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        fixed_separator: String,
        separators: Vec<String>,
        counter: TokenCounter,
    ) -> Self {
        Self {
            fixed_separator,
            chunk_size,
            recursive: RecursiveCharacterSplitter::new(
                chunk_size,
                chunk_overlap,
                separators,
                counter.clone(),
            ),
            counter,
        }
    }
}

impl TextSplitter for FixedRecursiveSplitter {
    fn split_text(&self, text: &str) -> Vec<String> {
        if self.fixed_separator.is_empty() || !text.contains(self.fixed_separator.as_str()) {
            return self.recursive.split_text(text);
        }

        let mut chunks = Vec::new();
        for piece in text.split(self.fixed_separator.as_str()) {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if (self.counter)(piece) > self.chunk_size {
                chunks.extend(self.recursive.split_text(piece));
            } else {
                chunks.push(piece.to_string());
            }
        }
        chunks
    }
}

/// Build the splitter for a rule mode.
///
/// Custom and hierarchical segmentation validates `max_tokens` against the
/// platform band before any splitting work; automatic mode ignores
/// caller-supplied sizes entirely.
pub fn get_splitter(
    config: &PlatformConfig,
    mode: ProcessMode,
    segmentation: Option<&Segmentation>,
    doc_language: &str,
    handle: Option<Arc<dyn EmbeddingHandle>>,
) -> Result<Box<dyn TextSplitter>> {
    let counter = token_counter(handle);
    let separators = separators_for_language(doc_language);

    match mode {
        ProcessMode::Automatic => Ok(Box::new(RecursiveCharacterSplitter::new(
            config.automatic_max_tokens,
            config.automatic_chunk_overlap,
            separators,
            counter,
        ))),
        ProcessMode::Custom | ProcessMode::Hierarchical => {
            let segmentation = segmentation.ok_or_else(|| {
                Error::Validation("no segmentation rule found for custom mode".to_string())
            })?;
            if segmentation.max_tokens < MIN_SEGMENTATION_TOKENS
                || segmentation.max_tokens > config.max_segmentation_tokens
            {
                return Err(Error::Validation(format!(
                    "Custom segment length should be between {} and {}.",
                    MIN_SEGMENTATION_TOKENS, config.max_segmentation_tokens
                )));
            }
            let separator = segmentation
                .separator
                .clone()
                .unwrap_or_else(|| "\n\n".to_string())
                .replace("\\n", "\n");
            Ok(Box::new(FixedRecursiveSplitter::new(
                segmentation.max_tokens,
                segmentation.chunk_overlap,
                separator,
                separators,
                counter,
            )))
        }
    }
}

/// Turn split pieces into chunk records with ids, hashes, and token counts.
///
/// Positions continue from `start_position` so multi-source documents keep a
/// single ordinal sequence.
pub fn build_chunks(
    pieces: Vec<String>,
    document_id: &str,
    dataset_id: &str,
    start_position: usize,
    counter: &TokenCounter,
) -> Vec<Chunk> {
    pieces
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .enumerate()
        .map(|(i, piece)| {
            let content = piece.trim().to_string();
            Chunk {
                id: Uuid::new_v4().to_string(),
                doc_hash: doc_hash(&content),
                token_count: counter(&content),
                metadata: ChunkMetadata {
                    document_id: document_id.to_string(),
                    dataset_id: dataset_id.to_string(),
                    position: start_position + i,
                },
                content,
                answer: None,
                children: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_counter() -> TokenCounter {
        Arc::new(|text: &str| text.split_whitespace().count())
    }

    fn sentence_text(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = RecursiveCharacterSplitter::new(
            100,
            10,
            separators_for_language("English"),
            word_counter(),
        );
        let chunks = splitter.split_text("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_chunks_respect_token_budget() {
        let splitter = RecursiveCharacterSplitter::new(
            50,
            0,
            separators_for_language("English"),
            word_counter(),
        );
        let text = sentence_text(500);
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() >= 10);
        let counter = word_counter();
        for chunk in &chunks {
            assert!(counter(chunk) <= 50, "chunk over budget: {chunk:?}");
        }
    }

    #[test]
    fn test_overlap_carries_trailing_tokens() {
        let splitter = RecursiveCharacterSplitter::new(
            10,
            3,
            separators_for_language("English"),
            word_counter(),
        );
        let text = sentence_text(30);
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 1);
        // Each chunk after the first starts with words from the previous one.
        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(
                pair[0].contains(first_word),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_chunks_are_contiguous_spans_of_input() {
        let splitter = RecursiveCharacterSplitter::new(
            5,
            0,
            separators_for_language("English"),
            word_counter(),
        );
        // Consecutive sentence breaks must survive inside a chunk rather
        // than collapse into one.
        let text = "alpha beta。。gamma delta epsilon zeta eta theta";
        let chunks = splitter.split_text(text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(text.contains(chunk.as_str()), "chunk {chunk:?} not a span of the input");
        }
        assert!(chunks.iter().any(|c| c.contains("。。")));
    }

    #[test]
    fn test_determinism() {
        let text = sentence_text(200);
        let split = |t: &str| {
            RecursiveCharacterSplitter::new(
                40,
                5,
                separators_for_language("English"),
                word_counter(),
            )
            .split_text(t)
        };
        assert_eq!(split(&text), split(&text));
    }

    #[test]
    fn test_fixed_separator_honored() {
        let splitter = FixedRecursiveSplitter::new(
            50,
            0,
            "###".to_string(),
            separators_for_language("English"),
            word_counter(),
        );
        let chunks = splitter.split_text("part one###part two###part three");
        assert_eq!(chunks, vec!["part one", "part two", "part three"]);
    }

    #[test]
    fn test_fixed_splitter_resplits_oversized_pieces() {
        let splitter = FixedRecursiveSplitter::new(
            10,
            0,
            "###".to_string(),
            separators_for_language("English"),
            word_counter(),
        );
        let big = sentence_text(40);
        let chunks = splitter.split_text(&format!("small piece###{big}"));
        assert!(chunks.len() > 2);
        assert_eq!(chunks[0], "small piece");
    }

    #[test]
    fn test_get_splitter_validates_token_band() {
        let config = PlatformConfig::default();
        let seg = |max_tokens| Segmentation {
            max_tokens,
            chunk_overlap: 10,
            separator: None,
        };

        let err = get_splitter(&config, ProcessMode::Custom, Some(&seg(30)), "English", None)
            .err()
            .expect("below-minimum max_tokens must fail");
        assert!(matches!(err, Error::Validation(_)));

        assert!(get_splitter(&config, ProcessMode::Custom, Some(&seg(50)), "English", None).is_ok());

        let err = get_splitter(
            &config,
            ProcessMode::Custom,
            Some(&seg(config.max_segmentation_tokens + 1)),
            "English",
            None,
        )
        .err()
        .expect("above-maximum max_tokens must fail");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_automatic_mode_ignores_caller_segmentation() {
        let config = PlatformConfig::default();
        // Caller sizes below the custom minimum are fine in automatic mode
        // because they are never read.
        let splitter = get_splitter(&config, ProcessMode::Automatic, None, "English", None).unwrap();
        assert!(!splitter.split_text("hello").is_empty());
    }

    #[test]
    fn test_build_chunks_assigns_positions_and_hashes() {
        let counter = word_counter();
        let chunks = build_chunks(
            vec!["alpha beta".into(), "  ".into(), "gamma".into()],
            "doc-1",
            "ds-1",
            5,
            &counter,
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.position, 5);
        assert_eq!(chunks[1].metadata.position, 6);
        assert_eq!(chunks[0].token_count, 2);
        assert_eq!(chunks[0].doc_hash, doc_hash("alpha beta"));
        assert_ne!(chunks[0].id, chunks[1].id);
    }

    #[test]
    fn test_heuristic_counter() {
        assert_eq!(heuristic_token_count(""), 0);
        assert_eq!(heuristic_token_count("abcd"), 1);
        assert_eq!(heuristic_token_count("abcde"), 2);
    }
}
