//! Parent/child splitting for the parent-child document form.
//!
//! Parents are sized for broad context and serve as expansion anchors;
//! children are re-split from each parent's text and are the retrievable
//! units. Overlap applies only at the child level, so every child stays a
//! contiguous substring of its parent.

use std::sync::Arc;

use uuid::Uuid;

use docforge_core::capabilities::EmbeddingHandle;
use docforge_core::config::PlatformConfig;
use docforge_core::error::Result;
use docforge_core::model::{
    doc_hash, ChildChunk, Chunk, ChunkMetadata, ParentMode, ProcessMode, ProcessRule, Segmentation,
};

use crate::splitter::{get_splitter, token_counter, TextSplitter, TokenCounter};

pub struct HierarchicalSplitter {
    parent_mode: ParentMode,
    parent: Option<Box<dyn TextSplitter>>,
    child: Box<dyn TextSplitter>,
    counter: TokenCounter,
}

impl HierarchicalSplitter {
    /// Build parent and child splitters from a hierarchical rule.
    ///
    /// Parent segmentation defaults to the platform parent chunk size;
    /// child segmentation defaults to the automatic rule. Both validate the
    /// custom token band when supplied by the caller.
    pub fn new(
        config: &PlatformConfig,
        rule: &ProcessRule,
        doc_language: &str,
        handle: Option<Arc<dyn EmbeddingHandle>>,
    ) -> Result<Self> {
        let parent_mode = rule.rules.parent_mode.unwrap_or(ParentMode::Paragraph);

        let parent = match parent_mode {
            ParentMode::FullDoc => None,
            ParentMode::Paragraph => {
                // No overlap between parents: each span of the document
                // belongs to exactly one context anchor.
                let segmentation = Segmentation {
                    chunk_overlap: 0,
                    ..rule
                        .rules
                        .segmentation
                        .clone()
                        .unwrap_or(Segmentation {
                            max_tokens: config.parent_max_tokens,
                            chunk_overlap: 0,
                            separator: None,
                        })
                };
                Some(get_splitter(
                    config,
                    ProcessMode::Hierarchical,
                    Some(&segmentation),
                    doc_language,
                    handle.clone(),
                )?)
            }
        };

        let child_segmentation = rule.rules.subchunk_segmentation.clone().unwrap_or(Segmentation {
            max_tokens: config.automatic_max_tokens,
            chunk_overlap: config.automatic_chunk_overlap,
            separator: None,
        });
        let child = get_splitter(
            config,
            ProcessMode::Hierarchical,
            Some(&child_segmentation),
            doc_language,
            handle.clone(),
        )?;

        Ok(Self {
            parent_mode,
            parent,
            child,
            counter: token_counter(handle),
        })
    }

    /// Split cleaned text into parent chunks owning their child chunks.
    pub fn split(
        &self,
        text: &str,
        document_id: &str,
        dataset_id: &str,
        start_position: usize,
    ) -> Vec<Chunk> {
        let parent_texts: Vec<String> = match (&self.parent_mode, &self.parent) {
            (ParentMode::FullDoc, _) | (_, None) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![trimmed.to_string()]
                }
            }
            (ParentMode::Paragraph, Some(parent)) => parent.split_text(text),
        };

        parent_texts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .enumerate()
            .map(|(i, parent_text)| {
                let content = parent_text.trim().to_string();
                let children = self
                    .child
                    .split_text(&content)
                    .into_iter()
                    .filter(|c| !c.trim().is_empty())
                    .enumerate()
                    .map(|(j, child_text)| {
                        let child_content = child_text.trim().to_string();
                        ChildChunk {
                            id: Uuid::new_v4().to_string(),
                            doc_hash: doc_hash(&child_content),
                            position: j,
                            content: child_content,
                        }
                    })
                    .collect();
                Chunk {
                    id: Uuid::new_v4().to_string(),
                    doc_hash: doc_hash(&content),
                    token_count: (self.counter)(&content),
                    metadata: ChunkMetadata {
                        document_id: document_id.to_string(),
                        dataset_id: dataset_id.to_string(),
                        position: start_position + i,
                    },
                    content,
                    answer: None,
                    children,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::model::Rules;

    fn hierarchical_rule(parent_mode: Option<ParentMode>) -> ProcessRule {
        ProcessRule {
            mode: ProcessMode::Hierarchical,
            rules: Rules {
                segmentation: Some(Segmentation {
                    max_tokens: 100,
                    chunk_overlap: 0,
                    separator: Some("\n\n".to_string()),
                }),
                subchunk_segmentation: Some(Segmentation {
                    max_tokens: 50,
                    chunk_overlap: 10,
                    separator: None,
                }),
                parent_mode,
                ..Rules::default()
            },
        }
    }

    fn sample_text() -> String {
        let paragraph = |topic: &str| {
            (0..80)
                .map(|i| format!("{topic}{i}"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!("{}\n\n{}\n\n{}", paragraph("alpha"), paragraph("beta"), paragraph("gamma"))
    }

    #[test]
    fn test_children_are_substrings_of_parent() {
        let config = PlatformConfig::default();
        let splitter =
            HierarchicalSplitter::new(&config, &hierarchical_rule(None), "English", None).unwrap();
        let chunks = splitter.split(&sample_text(), "doc-1", "ds-1", 0);
        assert!(!chunks.is_empty());
        for parent in &chunks {
            assert!(!parent.children.is_empty());
            for child in &parent.children {
                assert!(
                    parent.content.contains(&child.content),
                    "child {:?} not contained in parent",
                    child.content
                );
            }
        }
    }

    #[test]
    fn test_children_stay_contained_across_consecutive_separators() {
        let config = PlatformConfig::default();
        let splitter =
            HierarchicalSplitter::new(&config, &hierarchical_rule(None), "English", None).unwrap();
        let run = |topic: &str| {
            (0..80)
                .map(|i| format!("{topic}{i}"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let text = format!("{}。。{}", run("alpha"), run("beta"));
        let chunks = splitter.split(&text, "doc-1", "ds-1", 0);
        assert!(!chunks.is_empty());
        for parent in &chunks {
            for child in &parent.children {
                assert!(
                    parent.content.contains(&child.content),
                    "child {:?} not contained in parent {:?}",
                    child.content,
                    parent.content
                );
            }
        }
    }

    #[test]
    fn test_full_doc_mode_yields_single_parent() {
        let config = PlatformConfig::default();
        let splitter = HierarchicalSplitter::new(
            &config,
            &hierarchical_rule(Some(ParentMode::FullDoc)),
            "English",
            None,
        )
        .unwrap();
        let text = sample_text();
        let chunks = splitter.split(&text, "doc-1", "ds-1", 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text.trim());
        assert!(chunks[0].children.len() > 1);
    }

    #[test]
    fn test_parent_positions_are_sequential() {
        let config = PlatformConfig::default();
        let splitter =
            HierarchicalSplitter::new(&config, &hierarchical_rule(None), "English", None).unwrap();
        let chunks = splitter.split(&sample_text(), "doc-1", "ds-1", 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.position, 2 + i);
        }
    }

    #[test]
    fn test_invalid_child_band_rejected() {
        let config = PlatformConfig::default();
        let mut rule = hierarchical_rule(None);
        rule.rules.subchunk_segmentation = Some(Segmentation {
            max_tokens: 10,
            chunk_overlap: 0,
            separator: None,
        });
        assert!(HierarchicalSplitter::new(&config, &rule, "English", None).is_err());
    }
}
