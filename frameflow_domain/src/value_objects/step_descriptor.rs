// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Descriptor
//!
//! Parse-time metadata for one pipeline step. Where a dynamic language would
//! inspect a callable's signature and return expression, frameflow steps
//! declare their shape explicitly at construction through the builder: the
//! descriptor records parameter names in order, default values, input
//! overrides, declared return names, declared frame names, the capability
//! (Extract / Transform / Load), and the capability-specific settings
//! (`chunk_size` for extractors, `exists_policy` for loaders).
//!
//! ## Source fingerprint
//!
//! Every descriptor carries a source fingerprint: the source text plus its
//! SHA-256. The checkpoint cache compares both (byte-equal text AND equal
//! hash) against the manifest of a previous run to detect drift. When the
//! author does not supply the body's source text, the fingerprint falls back
//! to the canonical serialization of the declared shape, so shape edits
//! still invalidate stale checkpoints.

use crate::error::PipelineError;
use crate::services::source_fingerprint;
use crate::value_objects::{ExistsPolicy, ParamValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// The processing family a step belongs to.
///
/// The capability decides how the orchestrator treats the step: extractors
/// run first and may chunk, transforms shuttle values through the bus and
/// the global context, loaders run last and are skipped in DEV mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepCapability {
    Extract,
    Transform,
    Load,
}

impl StepCapability {
    /// True for extract steps
    pub fn is_extract(&self) -> bool {
        matches!(self, StepCapability::Extract)
    }

    /// True for transform steps
    pub fn is_transform(&self) -> bool {
        matches!(self, StepCapability::Transform)
    }

    /// True for load steps
    pub fn is_load(&self) -> bool {
        matches!(self, StepCapability::Load)
    }
}

impl Display for StepCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepCapability::Extract => write!(f, "extract"),
            StepCapability::Transform => write!(f, "transform"),
            StepCapability::Load => write!(f, "load"),
        }
    }
}

/// Declared shape of one pipeline step.
#[derive(Debug, Clone)]
pub struct StepDescriptor {
    name: String,
    capability: StepCapability,
    params: Vec<String>,
    defaults: IndexMap<String, ParamValue>,
    returns: Vec<String>,
    frames: Vec<String>,
    overrides: IndexMap<String, ParamValue>,
    needs_context: bool,
    chunk_size: Option<u64>,
    exists_policy: Option<ExistsPolicy>,
    source: String,
    source_hash: String,
}

impl StepDescriptor {
    /// Assembles a descriptor; called by the step builder after validation.
    ///
    /// When `source` is `None` the fingerprint is derived from the declared
    /// shape.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        capability: StepCapability,
        params: Vec<String>,
        defaults: IndexMap<String, ParamValue>,
        returns: Vec<String>,
        frames: Vec<String>,
        overrides: IndexMap<String, ParamValue>,
        needs_context: bool,
        chunk_size: Option<u64>,
        exists_policy: Option<ExistsPolicy>,
        source: Option<String>,
    ) -> Self {
        let source = source.unwrap_or_else(|| {
            Self::shape_source(
                &name,
                capability,
                &params,
                &defaults,
                &returns,
                &frames,
                needs_context,
                chunk_size,
                exists_policy,
            )
        });
        let source_hash = source_fingerprint::hash_source(&source);
        StepDescriptor {
            name,
            capability,
            params,
            defaults,
            returns,
            frames,
            overrides,
            needs_context,
            chunk_size,
            exists_policy,
            source,
            source_hash,
        }
    }

    /// Canonical serialization of the declared shape, used as the fallback
    /// fingerprint text.
    #[allow(clippy::too_many_arguments)]
    fn shape_source(
        name: &str,
        capability: StepCapability,
        params: &[String],
        defaults: &IndexMap<String, ParamValue>,
        returns: &[String],
        frames: &[String],
        needs_context: bool,
        chunk_size: Option<u64>,
        exists_policy: Option<ExistsPolicy>,
    ) -> String {
        serde_json::json!({
            "name": name,
            "capability": capability.to_string(),
            "params": params,
            "defaults": defaults,
            "returns": returns,
            "frames": frames,
            "needs_context": needs_context,
            "chunk_size": chunk_size,
            "exists_policy": exists_policy.map(|p| p.to_string()),
        })
        .to_string()
    }

    /// Gets the step name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the step capability
    pub fn capability(&self) -> StepCapability {
        self.capability
    }

    /// Declared parameter names, in declaration order. The reserved name
    /// `context` never appears here; declaring it flips `needs_context`.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Default values for parameters that declared one
    pub fn defaults(&self) -> &IndexMap<String, ParamValue> {
        &self.defaults
    }

    /// Declared return names, in order
    pub fn returns(&self) -> &[String] {
        &self.returns
    }

    /// Frame names this step wants copied into its subcontext
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Per-step input overrides, the highest-precedence parameter source
    pub fn overrides(&self) -> &IndexMap<String, ParamValue> {
        &self.overrides
    }

    /// True when the step receives a subcontext
    pub fn needs_context(&self) -> bool {
        self.needs_context
    }

    /// Chunk size, set only on chunking extractors
    pub fn chunk_size(&self) -> Option<u64> {
        self.chunk_size
    }

    /// Exists policy, set only on loaders
    pub fn exists_policy(&self) -> Option<ExistsPolicy> {
        self.exists_policy
    }

    /// Fingerprint source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// SHA-256 of the fingerprint source text, hex encoded
    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    /// Appends a return name discovered after construction.
    ///
    /// Aggregation-style steps emit named scalars whose identity is not
    /// known when the step is declared; they extend the return list once
    /// the names exist.
    pub fn update_returns(&mut self, name: impl Into<String>) {
        self.returns.push(name.into());
    }

    /// Replaces the declared returns with a single name.
    pub fn override_returns(&mut self, name: impl Into<String>) {
        self.returns = vec![name.into()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(source: Option<String>) -> StepDescriptor {
        StepDescriptor::new(
            "normalize".to_string(),
            StepCapability::Transform,
            vec!["x".to_string()],
            IndexMap::new(),
            vec!["y".to_string()],
            vec![],
            IndexMap::new(),
            false,
            None,
            None,
            source,
        )
    }

    #[test]
    fn test_explicit_source_fingerprint() {
        let d = descriptor(Some("fn body v1".to_string()));
        assert_eq!(d.source(), "fn body v1");
        assert_eq!(
            d.source_hash(),
            source_fingerprint::hash_source("fn body v1")
        );
    }

    #[test]
    fn test_shape_fingerprint_changes_with_shape() {
        let a = descriptor(None);
        let mut b = StepDescriptor::new(
            "normalize".to_string(),
            StepCapability::Transform,
            vec!["x".to_string(), "scale".to_string()],
            IndexMap::new(),
            vec!["y".to_string()],
            vec![],
            IndexMap::new(),
            false,
            None,
            None,
            None,
        );
        assert_ne!(a.source_hash(), b.source_hash());
        b.override_returns("z");
        assert_eq!(b.returns(), &["z".to_string()]);
    }

    #[test]
    fn test_update_returns_appends() {
        let mut d = descriptor(None);
        d.update_returns("total");
        assert_eq!(d.returns(), &["y".to_string(), "total".to_string()]);
    }
}
