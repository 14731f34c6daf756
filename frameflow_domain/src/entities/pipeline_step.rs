// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Step Entity
//!
//! A `PipelineStep` pairs declared metadata (a [`StepDescriptor`]) with a
//! body. The body is either a user-supplied callable or one of the built-in
//! control actions (cache snapshot / restore / reset) that the orchestrator
//! executes itself with access to its own state - steps never hold a
//! back-reference to the pipeline.
//!
//! ## Invocation lifecycle
//!
//! 1. **Start**: every declared parameter must be bound to a non-null value
//!    in the resolved arguments; a hole fails with `MissingParameter`.
//! 2. **Body**: the callable runs against the per-invocation [`StepArgs`],
//!    handed in by mutable reference so the orchestrator can reclaim an
//!    in-place-edited subcontext afterwards.
//! 3. **Stop**: the orchestrator drops the binding map once the call (and
//!    any context reclaim) is done. Input overrides and defaults on the
//!    descriptor are never mutated.
//!
//! ## Building steps
//!
//! Steps are declared through the builder, one constructor per capability:
//!
//! ```
//! use frameflow_domain::entities::PipelineStep;
//! use frameflow_domain::value_objects::StepOutput;
//! use serde_json::json;
//!
//! let step = PipelineStep::transform("add_one")
//!     .param("x")
//!     .returns(["y"])
//!     .body(|args| {
//!         let x = args.value("x").and_then(|v| v.as_i64()).unwrap_or(0);
//!         Ok(StepOutput::scalar(json!(x + 1)))
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(step.name(), "add_one");
//! assert_eq!(step.returns(), &["y".to_string()]);
//! ```

use crate::entities::Context;
use crate::error::PipelineError;
use crate::value_objects::{
    ChunkCoordinates, ExistsPolicy, ParamValue, StepCapability, StepDescriptor, StepOutput,
};
use indexmap::IndexMap;
use std::fmt;

/// Reserved parameter name satisfied by the subcontext builder, never by the
/// parameter bus.
pub const CONTEXT_PARAM: &str = "context";

/// User-supplied step body.
pub type StepFn = Box<dyn FnMut(&mut StepArgs) -> Result<StepOutput, PipelineError> + Send>;

/// Row-count capability of a chunking extractor.
pub type RowCountFn = Box<dyn Fn() -> Result<u64, PipelineError> + Send>;

/// Built-in actions the orchestrator executes on its own state.
///
/// These replace the back-reference a snapshot/restore transform would
/// otherwise need: the step only names the action, the pipeline performs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// Put a copy of `(bus, globalcontext)` into the in-memory LFU store.
    CacheSnapshot,
    /// Overwrite `(bus, globalcontext)` from the LFU store entry at `key`.
    RestoreSnapshot { key: u64 },
    /// Clear the cache; optionally purge the on-disk checkpoint directory.
    ResetCache { delete_directory: bool },
}

/// The executable part of a step.
pub enum StepBody {
    /// A user callable, plus the row-count provider when the step is a
    /// chunking extractor.
    Callable {
        func: StepFn,
        max_row_count: Option<RowCountFn>,
    },
    /// A built-in control action, dispatched by the orchestrator.
    Control(ControlAction),
}

/// Per-invocation resolved inputs handed to a step body.
///
/// The orchestrator builds a fresh value for every call, lends it to the
/// body, reclaims any in-place-edited subcontext, and drops it - holding
/// one across invocations is not possible.
#[derive(Debug)]
pub struct StepArgs {
    values: IndexMap<String, ParamValue>,
    context: Option<Context>,
    coordinates: Option<ChunkCoordinates>,
}

impl StepArgs {
    /// Assembles invocation arguments. Called by the orchestrator; tests
    /// build these directly to exercise step bodies in isolation.
    pub fn new(
        values: IndexMap<String, ParamValue>,
        context: Option<Context>,
        coordinates: Option<ChunkCoordinates>,
    ) -> Self {
        StepArgs {
            values,
            context,
            coordinates,
        }
    }

    /// Gets a resolved parameter value by name.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Gets a resolved parameter as an unsigned integer.
    pub fn u64_value(&self, name: &str) -> Option<u64> {
        self.value(name).and_then(ParamValue::as_u64)
    }

    /// Gets a resolved parameter as a string slice.
    pub fn str_value(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(ParamValue::as_str)
    }

    /// Borrows the subcontext, if the step declared one.
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Borrows the subcontext mutably for in-place edits.
    ///
    /// For a transform or loader that declared no frames this is the whole
    /// global context passed through read/write: edits made here are folded
    /// back by the orchestrator even when the body returns nothing.
    pub fn context_mut(&mut self) -> Option<&mut Context> {
        self.context.as_mut()
    }

    /// Takes ownership of the subcontext so the body can fill and return it.
    ///
    /// Taking transfers ownership: a taken context reaches the global
    /// context only if the body hands it back via `StepOutput::Ctx`.
    pub fn take_context(&mut self) -> Option<Context> {
        self.context.take()
    }

    /// Chunk coordinates for this pass, present only on chunking extractors.
    pub fn coordinates(&self) -> Option<ChunkCoordinates> {
        self.coordinates
    }
}

/// One unit of processing: descriptor metadata plus a body.
pub struct PipelineStep {
    descriptor: StepDescriptor,
    body: StepBody,
}

impl PipelineStep {
    /// Starts building an Extract step.
    pub fn extract(name: impl Into<String>) -> StepBuilder {
        StepBuilder::new(name, StepCapability::Extract)
    }

    /// Starts building a Transform step.
    pub fn transform(name: impl Into<String>) -> StepBuilder {
        StepBuilder::new(name, StepCapability::Transform)
    }

    /// Starts building a Load step.
    pub fn load(name: impl Into<String>) -> StepBuilder {
        StepBuilder::new(name, StepCapability::Load)
    }

    /// Builds a control step carrying a built-in action.
    ///
    /// Control steps are Transform-capability steps with no declared
    /// parameters or returns; the orchestrator recognizes and executes them
    /// without calling into user code.
    pub fn control(
        name: impl Into<String>,
        action: ControlAction,
    ) -> Result<PipelineStep, PipelineError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PipelineError::invalid_config("Step name cannot be empty"));
        }
        let descriptor = StepDescriptor::new(
            name,
            StepCapability::Transform,
            Vec::new(),
            IndexMap::new(),
            Vec::new(),
            Vec::new(),
            IndexMap::new(),
            false,
            None,
            None,
            Some(format!("control:{:?}", action)),
        );
        Ok(PipelineStep {
            descriptor,
            body: StepBody::Control(action),
        })
    }

    /// Gets the step name
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Gets the step capability
    pub fn capability(&self) -> StepCapability {
        self.descriptor.capability()
    }

    /// Declared parameter names, in order
    pub fn params(&self) -> &[String] {
        self.descriptor.params()
    }

    /// Default parameter values
    pub fn defaults(&self) -> &IndexMap<String, ParamValue> {
        self.descriptor.defaults()
    }

    /// Declared return names, in order
    pub fn returns(&self) -> &[String] {
        self.descriptor.returns()
    }

    /// Declared frame names
    pub fn frames(&self) -> &[String] {
        self.descriptor.frames()
    }

    /// Per-step input overrides
    pub fn overrides(&self) -> &IndexMap<String, ParamValue> {
        self.descriptor.overrides()
    }

    /// True when the step receives a subcontext
    pub fn needs_context(&self) -> bool {
        self.descriptor.needs_context()
    }

    /// Chunk size, set only on chunking extractors
    pub fn chunk_size(&self) -> Option<u64> {
        self.descriptor.chunk_size()
    }

    /// Exists policy, set only on loaders
    pub fn exists_policy(&self) -> Option<ExistsPolicy> {
        self.descriptor.exists_policy()
    }

    /// Fingerprint source text
    pub fn source(&self) -> &str {
        self.descriptor.source()
    }

    /// Fingerprint hash
    pub fn source_hash(&self) -> &str {
        self.descriptor.source_hash()
    }

    /// True for an extractor that participates in chunking
    pub fn is_chunking(&self) -> bool {
        self.capability().is_extract() && self.chunk_size().is_some()
    }

    /// The control action, when this is a control step.
    pub fn control_action(&self) -> Option<&ControlAction> {
        match &self.body {
            StepBody::Control(action) => Some(action),
            StepBody::Callable { .. } => None,
        }
    }

    /// Appends a return name discovered after construction.
    pub fn update_returns(&mut self, name: impl Into<String>) {
        self.descriptor.update_returns(name);
    }

    /// Replaces the declared returns with a single name.
    pub fn override_returns(&mut self, name: impl Into<String>) {
        self.descriptor.override_returns(name);
    }

    /// Queries the extractor's row-count capability.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the step has no row-count provider (it is
    /// not a chunking extractor), or whatever error the provider raises.
    pub fn max_row_count(&self) -> Result<u64, PipelineError> {
        match &self.body {
            StepBody::Callable {
                max_row_count: Some(provider),
                ..
            } => provider(),
            _ => Err(PipelineError::invalid_config(format!(
                "Step '{}' exposes no row-count capability",
                self.name()
            ))),
        }
    }

    /// Invokes the step with resolved arguments.
    ///
    /// # Errors
    ///
    /// * `MissingParameter` - a declared parameter is unbound or null
    /// * `InternalError` - the step is a control step (those are executed by
    ///   the orchestrator, never invoked)
    /// * any error the body raises
    pub fn invoke(&mut self, args: &mut StepArgs) -> Result<StepOutput, PipelineError> {
        for param in self.descriptor.params() {
            let bound = args.value(param).is_some_and(|v| !v.is_null());
            if !bound {
                return Err(PipelineError::MissingParameter {
                    step: self.descriptor.name().to_string(),
                    parameter: param.clone(),
                });
            }
        }
        match &mut self.body {
            StepBody::Callable { func, .. } => func(args),
            StepBody::Control(_) => Err(PipelineError::internal_error(format!(
                "Control step '{}' must be executed by the pipeline",
                self.descriptor.name()
            ))),
        }
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            StepBody::Callable { .. } => "callable".to_string(),
            StepBody::Control(action) => format!("{:?}", action),
        };
        f.debug_struct("PipelineStep")
            .field("name", &self.descriptor.name())
            .field("capability", &self.descriptor.capability())
            .field("body", &body)
            .finish()
    }
}

/// Builder assembling a [`PipelineStep`].
///
/// Capability-specific settings are validated at `build()`: `chunk_size`
/// belongs to extractors (and demands a row-count provider), `exists_policy`
/// to loaders, and loaders may not declare returns because their output is
/// ignored.
pub struct StepBuilder {
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
    func: Option<StepFn>,
    max_row_count: Option<RowCountFn>,
}

impl StepBuilder {
    fn new(name: impl Into<String>, capability: StepCapability) -> Self {
        StepBuilder {
            name: name.into(),
            capability,
            params: Vec::new(),
            defaults: IndexMap::new(),
            returns: Vec::new(),
            frames: Vec::new(),
            overrides: IndexMap::new(),
            needs_context: false,
            chunk_size: None,
            exists_policy: None,
            source: None,
            func: None,
            max_row_count: None,
        }
    }

    /// Declares a parameter. Declaring the reserved name `context` is
    /// equivalent to calling [`with_context`](Self::with_context).
    pub fn param(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name == CONTEXT_PARAM {
            self.needs_context = true;
        } else {
            self.params.push(name);
        }
        self
    }

    /// Declares several parameters in order.
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self = self.param(name);
        }
        self
    }

    /// Declares a default value for a parameter.
    pub fn default_value(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.defaults.insert(name.into(), value);
        self
    }

    /// Sets a per-step input override, the highest-precedence source during
    /// parameter resolution.
    pub fn input(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.overrides.insert(name.into(), value);
        self
    }

    /// Declares the step's return names, in order.
    pub fn returns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returns.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declares a frame the step wants copied into its subcontext.
    pub fn frame(mut self, name: impl Into<String>) -> Self {
        self.frames.push(name.into());
        self
    }

    /// Declares several frames in order.
    pub fn frames<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frames.extend(names.into_iter().map(Into::into));
        self
    }

    /// Requests a subcontext at invocation time.
    pub fn with_context(mut self) -> Self {
        self.needs_context = true;
        self
    }

    /// Marks the extractor as chunking with the given chunk size.
    pub fn chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Supplies the extractor's row-count capability, required with
    /// [`chunk_size`](Self::chunk_size).
    pub fn max_row_count<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Result<u64, PipelineError> + Send + 'static,
    {
        self.max_row_count = Some(Box::new(provider));
        self
    }

    /// Sets the loader's exists policy.
    pub fn exists(mut self, policy: ExistsPolicy) -> Self {
        self.exists_policy = Some(policy);
        self
    }

    /// Supplies the body's source text for the checkpoint fingerprint.
    ///
    /// Without it the fingerprint falls back to the declared shape, and
    /// body-only edits will not invalidate previous checkpoints.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Supplies the step body.
    pub fn body<F>(mut self, func: F) -> Self
    where
        F: FnMut(&mut StepArgs) -> Result<StepOutput, PipelineError> + Send + 'static,
    {
        self.func = Some(Box::new(func));
        self
    }

    /// Validates the declaration and assembles the step.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` on an empty name, a missing body, duplicate
    /// parameters, defaults or overrides naming undeclared parameters,
    /// `chunk_size` on a non-extractor or without a row-count provider,
    /// `exists_policy` on a non-loader, or declared returns on a loader.
    pub fn build(mut self) -> Result<PipelineStep, PipelineError> {
        if self.name.is_empty() {
            return Err(PipelineError::invalid_config("Step name cannot be empty"));
        }
        let func = self.func.take().ok_or_else(|| {
            PipelineError::invalid_config(format!("Step '{}' has no body", self.name))
        })?;

        let mut seen = std::collections::HashSet::new();
        for param in &self.params {
            if !seen.insert(param.as_str()) {
                return Err(PipelineError::invalid_config(format!(
                    "Step '{}' declares parameter '{}' twice",
                    self.name, param
                )));
            }
        }
        for name in self.defaults.keys().chain(self.overrides.keys()) {
            if !self.params.iter().any(|p| p == name) {
                return Err(PipelineError::invalid_config(format!(
                    "Step '{}' binds undeclared parameter '{}'",
                    self.name, name
                )));
            }
        }

        if self.chunk_size.is_some() {
            if !self.capability.is_extract() {
                return Err(PipelineError::invalid_config(format!(
                    "Step '{}' declares a chunk size but is not an extractor",
                    self.name
                )));
            }
            if self.chunk_size == Some(0) {
                return Err(PipelineError::invalid_config(format!(
                    "Step '{}' declares a zero chunk size",
                    self.name
                )));
            }
            if self.max_row_count.is_none() {
                return Err(PipelineError::invalid_config(format!(
                    "Chunking extractor '{}' must expose a row-count capability",
                    self.name
                )));
            }
        }

        if self.exists_policy.is_some() && !self.capability.is_load() {
            return Err(PipelineError::invalid_config(format!(
                "Step '{}' declares an exists policy but is not a loader",
                self.name
            )));
        }
        let exists_policy = if self.capability.is_load() {
            Some(self.exists_policy.unwrap_or_default())
        } else {
            None
        };

        if self.capability.is_load() && !self.returns.is_empty() {
            return Err(PipelineError::invalid_config(format!(
                "Loader '{}' declares returns, but loader output is ignored",
                self.name
            )));
        }

        let descriptor = StepDescriptor::new(
            self.name,
            self.capability,
            self.params,
            self.defaults,
            self.returns,
            self.frames,
            self.overrides,
            self.needs_context,
            self.chunk_size,
            exists_policy,
            self.source,
        );
        Ok(PipelineStep {
            descriptor,
            body: StepBody::Callable {
                func,
                max_row_count: self.max_row_count,
            },
        })
    }
}
