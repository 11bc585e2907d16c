//! Platform configuration for the indexing pipeline.

use serde::{Deserialize, Serialize};

/// Minimum custom segment size in tokens. Hard floor, not configurable.
pub const MIN_SEGMENTATION_TOKENS: usize = 50;

/// Platform-wide indexing knobs, shared by every tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Upper bound of the custom segment token band.
    pub max_segmentation_tokens: usize,
    /// Chunk size used by automatic segmentation.
    pub automatic_max_tokens: usize,
    /// Chunk overlap used by automatic segmentation.
    pub automatic_chunk_overlap: usize,
    /// Parent chunk size for hierarchical mode when the rule doesn't set one.
    pub parent_max_tokens: usize,
    /// Maximum number of documents accepted in one indexing batch.
    pub batch_upload_limit: usize,
    /// Number of chunks embedded and written per vector-sink call.
    pub embedding_batch_size: usize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            max_segmentation_tokens: 4000,
            automatic_max_tokens: 500,
            automatic_chunk_overlap: 50,
            parent_max_tokens: 1024,
            batch_upload_limit: 20,
            embedding_batch_size: 10,
        }
    }
}

impl PlatformConfig {
    /// Create configuration from environment overrides and defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_segmentation_tokens: env_usize(
                "DOCFORGE_MAX_SEGMENTATION_TOKENS",
                defaults.max_segmentation_tokens,
            ),
            automatic_max_tokens: env_usize(
                "DOCFORGE_AUTOMATIC_MAX_TOKENS",
                defaults.automatic_max_tokens,
            ),
            automatic_chunk_overlap: env_usize(
                "DOCFORGE_AUTOMATIC_CHUNK_OVERLAP",
                defaults.automatic_chunk_overlap,
            ),
            parent_max_tokens: env_usize("DOCFORGE_PARENT_MAX_TOKENS", defaults.parent_max_tokens),
            batch_upload_limit: env_usize("DOCFORGE_BATCH_UPLOAD_LIMIT", defaults.batch_upload_limit),
            embedding_batch_size: env_usize(
                "DOCFORGE_EMBEDDING_BATCH_SIZE",
                defaults.embedding_batch_size,
            ),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
