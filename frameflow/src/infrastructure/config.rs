// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Configuration
//!
//! TOML-deserializable settings for host programs wiring a pipeline. The
//! core takes no CLI arguments and reads no environment variables; a host
//! loads a config file (or builds the struct directly) and asks it for a
//! ready pipeline.
//!
//! ```toml
//! mode = "PROD"
//!
//! [cache]
//! enabled = true
//! directory = ".frameflow_cache"
//! capacity = 3
//!
//! [chunking]
//! strategy = "direct"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use frameflow_domain::{ExecutionMode, PipelineError};

use crate::application::Pipeline;
use crate::infrastructure::cache::{LfuStateCache, DEFAULT_CACHE_DIR, DEFAULT_CAPACITY};
use crate::infrastructure::chunking::ChunkStrategy;

/// Host-facing pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Execution mode; `DEV` skips loaders.
    pub mode: ExecutionMode,
    /// Checkpoint cache settings.
    pub cache: CacheConfig,
    /// Chunked-execution settings.
    pub chunking: ChunkingConfig,
}

/// Checkpoint cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Attach the default checkpoint cache to the pipeline.
    pub enabled: bool,
    /// Checkpoint directory.
    pub directory: PathBuf,
    /// In-memory LFU capacity.
    pub capacity: usize,
}

/// Chunked-execution settings.
///
/// The strategy is applied at execution time, after every step is
/// registered: a host builds the pipeline, adds its steps, and runs
/// [`Pipeline::execute_chunked`] with [`PipelineConfig::chunk_strategy`].
/// `None` means plain single-pass execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Coordinate-queue strategy, absent for unchunked runs.
    pub strategy: Option<ChunkStrategy>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            mode: ExecutionMode::default(),
            cache: CacheConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: false,
            directory: PathBuf::from(DEFAULT_CACHE_DIR),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` describing the parse failure.
    pub fn from_toml_str(raw: &str) -> Result<Self, PipelineError> {
        toml::from_str(raw)
            .map_err(|err| PipelineError::invalid_config(format!("Invalid config: {}", err)))
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// `IoError` when the file cannot be read, `InvalidConfiguration` when
    /// it does not parse.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Builds a pipeline wired per this configuration.
    ///
    /// Chunking cannot be enabled here - the coordinate queue is planned
    /// from the registered steps - so hosts pass
    /// [`chunk_strategy`](Self::chunk_strategy) to
    /// [`Pipeline::execute_chunked`] once their steps are added.
    ///
    /// # Errors
    ///
    /// `IoError` when the cache directory cannot be created.
    pub fn build_pipeline(&self) -> Result<Pipeline, PipelineError> {
        let mut pipeline = Pipeline::with_mode(self.mode);
        if self.cache.enabled {
            let cache = LfuStateCache::new(self.cache.directory.clone(), self.cache.capacity)?;
            pipeline.set_cache(cache);
        }
        Ok(pipeline)
    }

    /// The configured chunk strategy, `None` for single-pass execution.
    pub fn chunk_strategy(&self) -> Option<ChunkStrategy> {
        self.chunking.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.mode, ExecutionMode::Dev);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.directory, PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(config.cache.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.chunk_strategy(), None);
    }

    #[test]
    fn test_parse_full_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
            mode = "PROD"

            [cache]
            enabled = true
            directory = "/tmp/ff_cache"
            capacity = 5

            [chunking]
            strategy = "direct"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, ExecutionMode::Prod);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.capacity, 5);
        assert_eq!(config.chunk_strategy(), Some(ChunkStrategy::Direct));
    }

    #[test]
    fn test_parse_recursive_strategy() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [chunking]
            strategy = "recursive"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunk_strategy(), Some(ChunkStrategy::Recursive));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let err = PipelineConfig::from_toml_str(r#"mode = "STAGING""#).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [chunking]
            strategy = "zigzag"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PipelineConfig::from_toml_str(r#"verbose = true"#).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }
}
