// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # On-Disk Checkpoint Cache
//!
//! Default [`StateCache`] backend: the in-memory LFU store plus a checkpoint
//! directory enabling resumable execution.
//!
//! ## Layout
//!
//! ```text
//! <cache_dir>/config.json    manifest: last completed step + ordered step
//!                            fingerprints { key, source, source_hash }
//! <cache_dir>/<key>.blob     gzip-compressed JSON of
//!                            (bus, globalcontext, lfu_internal_state)
//! ```
//!
//! ## Transaction discipline
//!
//! A checkpoint writes its blob first and only then rewrites the manifest
//! (temp file + rename). A manifest that points at a missing or partial
//! blob is therefore possible after a crash; the resume search treats such
//! a blob as absent and falls back to the previous intact checkpoint.
//!
//! ## Drift detection
//!
//! Each manifest entry records the step's fingerprint. `resume_point` walks
//! the manifest and the live step index in ordinal lockstep and accepts an
//! entry only when the key matches AND the fingerprint matches (equal hash
//! and byte-equal source). The first divergence ends the walk: a divergent
//! first step means restart from scratch, a later one means resume from the
//! previous matching step and re-execute the drifted one. `store` replaces
//! a drifted entry at its ordinal and deletes the stale blob.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use frameflow_domain::services::source_fingerprint;
use frameflow_domain::{
    CachedState, Context, ParameterBus, PipelineError, StateCache, StepIndex, StepKey,
};

use super::lfu::{LfuSnapshot, LfuStore, DEFAULT_CAPACITY};

/// Default checkpoint directory, created in the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".frameflow_cache";

const MANIFEST_FILE: &str = "config.json";
const BLOB_EXTENSION: &str = "blob";

/// LFU store with on-disk checkpoint persistence.
pub struct LfuStateCache {
    lfu: LfuStore,
    cache_dir: PathBuf,
    manifest_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    last_completed_step: Option<String>,
    steps: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    key: String,
    source: String,
    source_hash: String,
}

#[derive(Serialize, Deserialize)]
struct CheckpointBlob {
    bus: ParameterBus,
    globalcontext: Context,
    lfu: LfuSnapshot,
}

impl LfuStateCache {
    /// Opens (creating if needed) a checkpoint cache rooted at `cache_dir`.
    ///
    /// # Errors
    ///
    /// `IoError` when the directory cannot be created.
    pub fn new(cache_dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, PipelineError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        let manifest_path = cache_dir.join(MANIFEST_FILE);
        Ok(LfuStateCache {
            lfu: LfuStore::new(capacity),
            cache_dir,
            manifest_path,
        })
    }

    /// Opens the default cache: `.frameflow_cache` in the working directory
    /// with the default LFU capacity.
    pub fn open_default() -> Result<Self, PipelineError> {
        Self::new(DEFAULT_CACHE_DIR, DEFAULT_CAPACITY)
    }

    /// Gets the checkpoint directory
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn blob_path(&self, key: &StepKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", key.as_str(), BLOB_EXTENSION))
    }

    /// Reads the manifest; a missing or unparseable file reads as empty.
    fn read_manifest(&self) -> Manifest {
        let Ok(raw) = fs::read(&self.manifest_path) else {
            return Manifest::default();
        };
        match serde_json::from_slice(&raw) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(
                    target: "frameflow::cache",
                    "Unreadable checkpoint manifest, treating as empty: {}", err
                );
                Manifest::default()
            }
        }
    }

    /// Atomically rewrites the manifest (temp file + rename).
    fn write_manifest(&self, manifest: &Manifest) -> Result<(), PipelineError> {
        let raw = serde_json::to_vec_pretty(manifest)?;
        let tmp = self.manifest_path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.manifest_path)?;
        Ok(())
    }

    fn write_blob(
        &self,
        key: &StepKey,
        bus: &ParameterBus,
        globalcontext: &Context,
    ) -> Result<(), PipelineError> {
        let blob = CheckpointBlob {
            bus: bus.clone(),
            globalcontext: globalcontext.clone(),
            lfu: self.lfu.snapshot(),
        };
        let raw = serde_json::to_vec(&blob)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;
        fs::write(self.blob_path(key), compressed)?;
        Ok(())
    }

    /// Reads and decodes a blob without touching the LFU state.
    ///
    /// # Errors
    ///
    /// `CacheCorruption` for a missing, truncated, or undecodable blob.
    fn try_read_blob(&self, key: &StepKey) -> Result<CheckpointBlob, PipelineError> {
        let path = self.blob_path(key);
        let compressed = fs::read(&path).map_err(|err| {
            PipelineError::cache_corruption(format!(
                "Checkpoint blob {} unreadable: {}",
                path.display(),
                err
            ))
        })?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw).map_err(|err| {
            PipelineError::cache_corruption(format!(
                "Checkpoint blob {} truncated: {}",
                path.display(),
                err
            ))
        })?;
        serde_json::from_slice(&raw).map_err(|err| {
            PipelineError::cache_corruption(format!(
                "Checkpoint blob {} undecodable: {}",
                path.display(),
                err
            ))
        })
    }

    fn delete_blob(&self, key: &StepKey) {
        let path = self.blob_path(key);
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                warn!(
                    target: "frameflow::cache",
                    "Failed to delete stale blob {}: {}", path.display(), err
                );
            }
        }
    }

    fn manifest_entry_for(steps: &StepIndex, key: &StepKey) -> Option<ManifestEntry> {
        steps.get(key).map(|step| ManifestEntry {
            key: key.to_string(),
            source: step.source().to_string(),
            source_hash: step.source_hash().to_string(),
        })
    }
}

impl StateCache for LfuStateCache {
    fn put(&mut self, state: CachedState) -> Option<u64> {
        self.lfu.put(state)
    }

    fn get(&mut self, key: u64) -> Option<CachedState> {
        self.lfu.get(key)
    }

    fn store(
        &mut self,
        steps: &StepIndex,
        bus: &ParameterBus,
        globalcontext: &Context,
        step_key: &StepKey,
    ) -> Result<(), PipelineError> {
        let ordinal = steps.position(step_key).ok_or_else(|| {
            PipelineError::internal_error(format!("Checkpoint for unregistered step {}", step_key))
        })?;
        let entry = Self::manifest_entry_for(steps, step_key).ok_or_else(|| {
            PipelineError::internal_error(format!("Checkpoint for unregistered step {}", step_key))
        })?;

        let mut manifest = self.read_manifest();

        // Skipped steps (DEV-mode loaders) leave ordinal gaps; record their
        // fingerprints so later entries stay aligned with the step index.
        while manifest.steps.len() < ordinal {
            let position = manifest.steps.len();
            let filler = steps
                .key_at(position)
                .and_then(|key| Self::manifest_entry_for(steps, key))
                .ok_or_else(|| {
                    PipelineError::internal_error(format!(
                        "Checkpoint ordinal {} beyond step index",
                        position
                    ))
                })?;
            manifest.steps.push(filler);
        }

        if ordinal < manifest.steps.len() {
            let existing = &manifest.steps[ordinal];
            let drifted = existing.key != entry.key
                || !source_fingerprint::fingerprint_matches(
                    &entry.source,
                    &entry.source_hash,
                    &existing.source,
                    &existing.source_hash,
                );
            if drifted {
                debug!(
                    target: "frameflow::cache",
                    "Replacing drifted checkpoint entry at ordinal {}", ordinal
                );
                self.delete_blob(&StepKey::from_string(existing.key.clone()));
                manifest.steps[ordinal] = entry;
            }
        } else {
            manifest.steps.push(entry);
        }

        // Blob first, manifest second: a crash in between leaves the old
        // manifest pointing at intact state.
        self.write_blob(step_key, bus, globalcontext)?;
        manifest.last_completed_step = Some(step_key.to_string());
        self.write_manifest(&manifest)?;
        debug!(target: "frameflow::cache", "Checkpoint stored for step {}", step_key);
        Ok(())
    }

    fn load(&mut self, step_key: &StepKey) -> Result<CachedState, PipelineError> {
        let blob = self.try_read_blob(step_key)?;
        self.lfu.restore(blob.lfu);
        Ok(CachedState {
            bus: blob.bus,
            globalcontext: blob.globalcontext,
        })
    }

    fn resume_point(&self, steps: &StepIndex) -> Result<Option<StepKey>, PipelineError> {
        let manifest = self.read_manifest();
        let Some(last_completed) = manifest.last_completed_step.as_deref() else {
            return Ok(None);
        };

        let mut matched: Vec<StepKey> = Vec::new();
        for (entry, (key, step)) in manifest.steps.iter().zip(steps.iter()) {
            if entry.key != key.as_str() {
                break;
            }
            let intact = source_fingerprint::fingerprint_matches(
                step.source(),
                step.source_hash(),
                &entry.source,
                &entry.source_hash,
            );
            if !intact {
                break;
            }
            matched.push(key.clone());
            if entry.key == last_completed {
                break;
            }
        }

        // Fall back past checkpoints whose blob is damaged or was never
        // written (skipped steps).
        for key in matched.iter().rev() {
            match self.try_read_blob(key) {
                Ok(_) => return Ok(Some(key.clone())),
                Err(err) => {
                    warn!(
                        target: "frameflow::cache",
                        "Skipping resume candidate {}: {}", key, err
                    );
                }
            }
        }
        Ok(None)
    }

    fn reset(&mut self, delete_directory: bool) -> Result<(), PipelineError> {
        self.lfu.reset();
        if delete_directory && self.cache_dir.exists() {
            for dir_entry in fs::read_dir(&self.cache_dir)? {
                let path = dir_entry?.path();
                if path.is_file() {
                    fs::remove_file(path)?;
                }
            }
            debug!(target: "frameflow::cache", "Checkpoint directory purged");
        }
        Ok(())
    }
}
