// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Orchestrator
//!
//! The `Pipeline` owns every piece of mutable runtime state - the ordered
//! step index, the parameter bus, the global frame context, the optional
//! checkpoint cache, and the optional chunk coordinator - and drives
//! execution through them. There is no global or process state; tests
//! instantiate fresh pipelines.
//!
//! ## Execution walk
//!
//! 1. **Target reconciliation** (once): the target extractor (or the
//!    members of a multi-extractor, in order) moves to the front of the
//!    index, the target loader to the back. `PROD` mode requires a target
//!    extractor.
//! 2. **Resume**: with a cache attached, the resume search picks the last
//!    checkpoint consistent with current step definitions; its state is
//!    restored and execution starts on the step after it.
//! 3. **Step loop**: per step - resolve parameters (override > bus >
//!    default, first non-null), build the subcontext if declared, inject
//!    chunk coordinates into chunking extractors, invoke, fold the output
//!    (scalars to the bus by declared-return position, contexts merged into
//!    the global context), store a checkpoint. A transform or loader that
//!    declared a context but no frames receives the whole global context
//!    read/write: its in-place edits are reclaimed after the call, with no
//!    dependency on what the body returns. Loaders are skipped entirely in
//!    DEV mode. Cancellation (the `cancel` metadata flag) is observed
//!    between steps only.
//! 4. **Chunk loop**: while the coordinator still holds coordinates, the
//!    saved `(bus, globalcontext)` snapshot is restored and the step loop
//!    runs again.
//!
//! ## Error discipline
//!
//! The orchestrator never swallows an error. A failure inside a step body
//! is re-surfaced as `StepFailed` carrying the step name, key, and ordinal;
//! the checkpoint for that step is never written, so `last_completed_step`
//! always names a step that actually finished.

use std::fmt::{self, Display};
use std::time::Instant;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info};

use frameflow_domain::services::type_guards;
use frameflow_domain::{
    CachedState, Context, ControlAction, ExecutionMode, ExtractorTarget, MultiExtractor,
    ParameterBus, PipelineError, PipelineStep, StateCache, StepArgs, StepCapability, StepIndex,
    StepKey, StepOutput,
};

use crate::infrastructure::chunking::{ChunkCoordinator, ChunkStrategy};

/// Metadata key checked between steps for cooperative cancellation.
pub const CANCEL_KEY: &str = "cancel";

const GLOBAL_CONTEXT_NAME: &str = "globalcontext";

/// Composable data-pipeline runtime.
///
/// Steps register in execution order; `execute` visits them front to back
/// with resumable checkpointing and optional chunked re-execution.
pub struct Pipeline {
    mode: ExecutionMode,
    steps: StepIndex,
    bus: ParameterBus,
    globalcontext: Context,
    cache: Option<Box<dyn StateCache>>,
    chunker: Option<ChunkCoordinator>,
    target_extractor: Option<ExtractorTarget>,
    target_loader: Option<PipelineStep>,
    checked_targets: bool,
}

impl Pipeline {
    /// Creates a pipeline in the default `DEV` mode.
    pub fn new() -> Self {
        Self::with_mode(ExecutionMode::default())
    }

    /// Creates a pipeline in an explicit mode.
    pub fn with_mode(mode: ExecutionMode) -> Self {
        Pipeline {
            mode,
            steps: StepIndex::new(),
            bus: ParameterBus::new(),
            // The name is a constant; construction cannot fail.
            globalcontext: Context::new(GLOBAL_CONTEXT_NAME)
                .unwrap_or_else(|_| unreachable!("global context name is non-empty")),
            cache: None,
            chunker: None,
            target_extractor: None,
            target_loader: None,
            checked_targets: false,
        }
    }

    /// Gets the execution mode
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Sets the execution mode
    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    /// Gets the parameter bus
    pub fn bus(&self) -> &ParameterBus {
        &self.bus
    }

    /// Gets the global context
    pub fn globalcontext(&self) -> &Context {
        &self.globalcontext
    }

    /// Gets the global context mutably.
    ///
    /// Host programs use this to seed metadata - most notably the `cancel`
    /// flag that requests a cooperative abort between steps.
    pub fn globalcontext_mut(&mut self) -> &mut Context {
        &mut self.globalcontext
    }

    /// Gets the step index
    pub fn steps(&self) -> &StepIndex {
        &self.steps
    }

    /// Clears every binding on the parameter bus.
    ///
    /// The only path that empties the bus; names declared by registered
    /// steps must be reintroduced (or produced again) before the next run.
    pub fn reset_bus(&mut self) {
        self.bus.reset();
        info!(target: "frameflow::pipeline", "Parameter bus cleared");
    }

    /// Attaches a checkpoint cache backend.
    pub fn set_cache(&mut self, cache: impl StateCache + 'static) {
        self.cache = Some(Box::new(cache));
        info!(target: "frameflow::pipeline", "Cache set");
    }

    /// True when a cache backend is attached
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Sets the leading extractor: a single step or a multi-extractor whose
    /// members will lead the pipeline in order.
    ///
    /// # Errors
    ///
    /// `TypeViolation` when the step is not Extract capability;
    /// `InvalidConfiguration` for an empty multi-extractor.
    pub fn set_target_extractor(
        &mut self,
        target: impl Into<ExtractorTarget>,
    ) -> Result<(), PipelineError> {
        let target = target.into();
        match &target {
            ExtractorTarget::Single(step) => type_guards::ensure_extractor(step)?,
            ExtractorTarget::Multi(multi) => {
                if multi.is_empty() {
                    return Err(PipelineError::invalid_config(format!(
                        "Multi-extractor '{}' has no members",
                        multi.name()
                    )));
                }
            }
        }
        self.target_extractor = Some(target);
        info!(target: "frameflow::pipeline", "Target extractor set");
        Ok(())
    }

    /// Sets the trailing loader.
    ///
    /// # Errors
    ///
    /// `TypeViolation` when the step is not Load capability.
    pub fn set_target_loader(&mut self, step: PipelineStep) -> Result<(), PipelineError> {
        type_guards::ensure_loader(&step)?;
        self.target_loader = Some(step);
        info!(target: "frameflow::pipeline", "Target loader set");
        Ok(())
    }

    /// Registers a step at the end of the execution order.
    ///
    /// Every declared parameter is introduced on the bus (bound to null if
    /// new).
    pub fn add_step(&mut self, step: PipelineStep) -> Result<StepKey, PipelineError> {
        let name = step.name().to_string();
        let key = self.register_step(step)?;
        info!(
            target: "frameflow::pipeline",
            "Successfully added step '{}' with key {}", name, key
        );
        Ok(key)
    }

    /// Registers several steps in order.
    pub fn add_steps(
        &mut self,
        steps: impl IntoIterator<Item = PipelineStep>,
    ) -> Result<Vec<StepKey>, PipelineError> {
        steps.into_iter().map(|step| self.add_step(step)).collect()
    }

    /// Registers a multi-extractor by decomposing it into its members.
    pub fn add_multi_extractor(
        &mut self,
        multi: MultiExtractor,
    ) -> Result<Vec<StepKey>, PipelineError> {
        multi
            .into_extractors()
            .into_iter()
            .map(|step| self.add_step(step))
            .collect()
    }

    /// Builds a control step that puts a copy of the current
    /// `(bus, globalcontext)` into the in-memory snapshot store.
    pub fn cache_snapshot() -> Result<PipelineStep, PipelineError> {
        PipelineStep::control("cache_snapshot", ControlAction::CacheSnapshot)
    }

    /// Builds a control step that overwrites `(bus, globalcontext)` from the
    /// snapshot stored under `key`.
    pub fn restore_snapshot(key: u64) -> Result<PipelineStep, PipelineError> {
        PipelineStep::control("restore_snapshot", ControlAction::RestoreSnapshot { key })
    }

    /// Builds a control step that clears the cache, optionally purging the
    /// checkpoint directory. No checkpoint is written after this step runs.
    pub fn reset_cache(delete_directory: bool) -> Result<PipelineStep, PipelineError> {
        PipelineStep::control("reset_cache", ControlAction::ResetCache { delete_directory })
    }

    /// Enables chunked execution with the given strategy.
    ///
    /// Reconciles targets, purges any attached cache (checkpoints cannot
    /// span chunk passes), plans the coordinate queue, and captures the
    /// state snapshot that later passes restore. Idempotent once enabled.
    ///
    /// # Errors
    ///
    /// See [`ChunkCoordinator::new`].
    pub fn enable_chunking(&mut self, strategy: ChunkStrategy) -> Result<(), PipelineError> {
        self.reconcile_targets()?;
        if self.chunker.is_some() {
            return Ok(());
        }
        if let Some(cache) = &mut self.cache {
            cache.reset(true)?;
            debug!(target: "frameflow::pipeline", "Cache reset for chunked execution");
        }
        let mut coordinator = ChunkCoordinator::new(strategy, &self.steps)?;
        coordinator.save(&self.bus, &self.globalcontext);
        self.chunker = Some(coordinator);
        info!(target: "frameflow::pipeline", "Chunker initialized");
        Ok(())
    }

    /// Runs the pipeline in chunked mode.
    pub fn execute_chunked(&mut self, strategy: ChunkStrategy) -> Result<(), PipelineError> {
        self.enable_chunking(strategy)?;
        self.execute()
    }

    /// Runs the pipeline.
    ///
    /// # Errors
    ///
    /// Any error from parameter resolution, a step body (as `StepFailed`),
    /// output folding, or checkpoint persistence. The last successful
    /// checkpoint is preserved on failure.
    pub fn execute(&mut self) -> Result<(), PipelineError> {
        self.reconcile_targets()?;
        let started = Instant::now();
        info!(
            target: "frameflow::pipeline",
            "Beginning pipeline execution at {} in {} mode",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            self.mode
        );

        let mut start_position = self.resume_start()?;
        loop {
            // Visitation order is fixed at the start of the pass.
            let keys = self.steps.keys();
            for (ordinal, key) in keys.iter().enumerate().skip(start_position) {
                self.check_cancelled()?;
                self.perform_step(ordinal, key)?;
            }

            if let Some(chunker) = &self.chunker {
                if chunker.keep_executing() {
                    let state = chunker.reload()?;
                    self.bus = state.bus;
                    self.globalcontext = state.globalcontext;
                    start_position = 0;
                    debug!(target: "frameflow::pipeline", "Re-entering step loop for next chunk pass");
                    continue;
                }
            }
            break;
        }

        info!(
            target: "frameflow::pipeline",
            "Pipeline execution finished in {:.3}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Moves targets into place; runs once per pipeline.
    fn reconcile_targets(&mut self) -> Result<(), PipelineError> {
        if self.checked_targets {
            return Ok(());
        }
        self.checked_targets = true;

        if self.mode == ExecutionMode::Prod && self.target_extractor.is_none() {
            return Err(PipelineError::invalid_config(
                "Target extractor must be set before executing in PROD mode",
            ));
        }

        if let Some(target) = self.target_extractor.take() {
            match target {
                ExtractorTarget::Single(step) => {
                    let key = self.register_step(*step)?;
                    self.steps.promote_front(&key)?;
                }
                ExtractorTarget::Multi(multi) => {
                    // Promoting each member to the front reverses; walk the
                    // members back to front so they lead in declared order.
                    for step in multi.into_extractors().into_iter().rev() {
                        let key = self.register_step(step)?;
                        self.steps.promote_front(&key)?;
                    }
                }
            }
        }
        if let Some(loader) = self.target_loader.take() {
            let key = self.register_step(loader)?;
            self.steps.demote_back(&key)?;
        }
        debug!(target: "frameflow::pipeline", "Successfully added targets to steps");
        Ok(())
    }

    fn register_step(&mut self, step: PipelineStep) -> Result<StepKey, PipelineError> {
        let params: Vec<String> = step.params().to_vec();
        let key = self.steps.register(step)?;
        for param in params {
            self.bus.introduce(param);
        }
        Ok(key)
    }

    /// Restores the resume-point checkpoint, returning the position to start
    /// execution from.
    fn resume_start(&mut self) -> Result<usize, PipelineError> {
        let Some(cache) = &mut self.cache else {
            return Ok(0);
        };
        match cache.resume_point(&self.steps)? {
            Some(key) => {
                let state = cache.load(&key)?;
                self.bus = state.bus;
                self.globalcontext = state.globalcontext;
                let position = self.steps.position(&key).ok_or_else(|| {
                    PipelineError::internal_error(format!(
                        "Resume point {} is not a registered step",
                        key
                    ))
                })?;
                info!(
                    target: "frameflow::pipeline",
                    "Resuming execution from checkpoint {}", key
                );
                Ok(position + 1)
            }
            None => {
                info!(
                    target: "frameflow::pipeline",
                    "No checkpoint found, starting from beginning"
                );
                Ok(0)
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        let cancelled = self
            .globalcontext
            .metadata(CANCEL_KEY)
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if cancelled {
            return Err(PipelineError::Cancelled(
                "Cancellation requested via context metadata".to_string(),
            ));
        }
        Ok(())
    }

    fn perform_step(&mut self, ordinal: usize, key: &StepKey) -> Result<(), PipelineError> {
        let (name, capability, returns, control, passthrough) = {
            let step = self.steps.get(key).ok_or_else(|| {
                PipelineError::internal_error(format!("Unknown step key {}", key))
            })?;
            (
                step.name().to_string(),
                step.capability(),
                step.returns().to_vec(),
                step.control_action().cloned(),
                step.needs_context()
                    && step.frames().is_empty()
                    && !step.capability().is_extract(),
            )
        };

        if capability.is_load() && self.mode.skips_loaders() {
            debug!(
                target: "frameflow::pipeline",
                "Skipping loader '{}' in DEV mode", name
            );
            return Ok(());
        }

        info!(target: "frameflow::pipeline", "Executing step: {}", name);

        if let Some(action) = control {
            self.run_control(&name, &action)?;
            // A cache-reset marker must not advance the checkpoint chain it
            // just cleared.
            if !matches!(action, ControlAction::ResetCache { .. }) {
                self.store_checkpoint(key)?;
            }
            debug!(target: "frameflow::pipeline", "Step: {} completed", name);
            return Ok(());
        }

        let mut args = self.resolve_args(key)?;
        if let Some(coordinates) = args.coordinates() {
            if coordinates.is_padding() {
                debug!(
                    target: "frameflow::pipeline",
                    "Extractor '{}' has no rows this pass", name
                );
                return Ok(());
            }
        }

        let invoked = {
            let step = self.steps.get_mut(key).ok_or_else(|| {
                PipelineError::internal_error(format!("Unknown step key {}", key))
            })?;
            step.invoke(&mut args)
        };
        let output = match invoked {
            Ok(output) => output,
            // Parameter completeness is a resolution failure, not a body
            // failure; keep its error kind.
            Err(err @ PipelineError::MissingParameter { .. }) => return Err(err),
            Err(err) => {
                return Err(PipelineError::StepFailed {
                    step_name: name,
                    step_key: key.to_string(),
                    ordinal,
                    message: err.to_string(),
                })
            }
        };

        // Whole-context passthrough: the step held the global context
        // read/write, so its in-place edits land regardless of what the
        // body returned. A body that took the context owns it and must
        // hand it back through the output.
        if passthrough {
            if let Some(context) = args.take_context() {
                self.globalcontext = context;
            }
        }

        if capability == StepCapability::Load {
            // Loader output is ignored.
            debug!(target: "frameflow::pipeline", "Step: {} completed", name);
            self.store_checkpoint(key)?;
            return Ok(());
        }

        self.fold_output(&name, &returns, output)?;
        self.store_checkpoint(key)?;
        debug!(target: "frameflow::pipeline", "Step: {} completed", name);
        Ok(())
    }

    /// Resolves a step's arguments: override > bus > default, first
    /// non-null; the subcontext when declared; chunk coordinates when the
    /// step is a chunking extractor.
    fn resolve_args(&mut self, key: &StepKey) -> Result<StepArgs, PipelineError> {
        let step = self
            .steps
            .get(key)
            .ok_or_else(|| PipelineError::internal_error(format!("Unknown step key {}", key)))?;

        let mut values = IndexMap::new();
        for param in step.params() {
            let resolved = step
                .overrides()
                .get(param)
                .filter(|value| !value.is_null())
                .or_else(|| self.bus.get_non_null(param))
                .or_else(|| step.defaults().get(param).filter(|value| !value.is_null()))
                .cloned();
            match resolved {
                Some(value) => {
                    values.insert(param.clone(), value);
                }
                None => {
                    return Err(PipelineError::MissingParameter {
                        step: step.name().to_string(),
                        parameter: param.clone(),
                    })
                }
            }
        }

        let context = if step.needs_context() {
            Some(self.build_subcontext(step)?)
        } else {
            None
        };

        let coordinates = match &mut self.chunker {
            Some(chunker) if step.is_chunking() => Some(chunker.dequeue()),
            _ => None,
        };

        Ok(StepArgs::new(values, context, coordinates))
    }

    /// Builds the per-invocation subcontext.
    ///
    /// Extractors get a fresh empty context to fill. Transforms and loaders
    /// get copies of their declared frames - or, when they declared none,
    /// the whole global context passed through read/write (the orchestrator
    /// reclaims it after the call). Global metadata rides along so
    /// cooperative signals reach the step.
    fn build_subcontext(&self, step: &PipelineStep) -> Result<Context, PipelineError> {
        if type_guards::is_extractor(step) {
            let mut subcontext = Context::new(format!("{}_subcontext", step.name()))?;
            for (meta_key, value) in self.globalcontext.metadata_entries() {
                subcontext.set_metadata(meta_key, value.clone());
            }
            return Ok(subcontext);
        }

        if step.frames().is_empty() {
            return Ok(self.globalcontext.clone());
        }

        let mut subcontext = Context::new(format!("{}_subcontext", step.name()))?;
        for (meta_key, value) in self.globalcontext.metadata_entries() {
            subcontext.set_metadata(meta_key, value.clone());
        }
        for frame_name in step.frames() {
            let frame = self.globalcontext.frame(frame_name).ok_or_else(|| {
                PipelineError::invalid_config(format!(
                    "Step '{}' declares frame '{}' which is not in the global context",
                    step.name(),
                    frame_name
                ))
            })?;
            subcontext.add_frame(frame_name.clone(), frame.clone());
        }
        Ok(subcontext)
    }

    /// Folds a step's output: scalars to the bus by declared-return
    /// position, contexts merged into the global context.
    fn fold_output(
        &mut self,
        step_name: &str,
        returns: &[String],
        output: StepOutput,
    ) -> Result<(), PipelineError> {
        match output {
            StepOutput::None => {
                if !returns.is_empty() {
                    return Err(PipelineError::ArityMismatch {
                        step: step_name.to_string(),
                        expected: returns.len(),
                        actual: 0,
                    });
                }
            }
            StepOutput::Scalar(value) => {
                if returns.len() != 1 {
                    return Err(PipelineError::ArityMismatch {
                        step: step_name.to_string(),
                        expected: returns.len(),
                        actual: 1,
                    });
                }
                self.bus.set(returns[0].clone(), value);
            }
            StepOutput::Tuple(values) => {
                if returns.len() != values.len() {
                    return Err(PipelineError::ArityMismatch {
                        step: step_name.to_string(),
                        expected: returns.len(),
                        actual: values.len(),
                    });
                }
                for (name, value) in returns.iter().zip(values) {
                    self.bus.set(name.clone(), value);
                }
            }
            StepOutput::Ctx(context) => {
                self.merge_into_global(context);
            }
            StepOutput::CtxMap(contexts) => {
                for (_, context) in contexts {
                    self.merge_into_global(context);
                }
            }
        }
        Ok(())
    }

    fn merge_into_global(&mut self, context: Context) {
        for (frame_name, _) in context.frames() {
            if !self.globalcontext.contains_frame(frame_name) {
                debug!(
                    target: "frameflow::pipeline",
                    "Added frame '{}' to global context", frame_name
                );
            }
        }
        self.globalcontext.merge(context);
    }

    fn run_control(&mut self, step_name: &str, action: &ControlAction) -> Result<(), PipelineError> {
        let cache = self.cache.as_mut().ok_or_else(|| {
            PipelineError::invalid_config(format!(
                "Control step '{}' requires an attached cache",
                step_name
            ))
        })?;
        match action {
            ControlAction::CacheSnapshot => {
                let state = CachedState {
                    bus: self.bus.clone(),
                    globalcontext: self.globalcontext.clone(),
                };
                match cache.put(state) {
                    Some(snapshot_key) => info!(
                        target: "frameflow::pipeline",
                        "State snapshot stored under key {}", snapshot_key
                    ),
                    None => debug!(
                        target: "frameflow::pipeline",
                        "Snapshot store has zero capacity, state not cached"
                    ),
                }
            }
            ControlAction::RestoreSnapshot { key } => {
                let state = cache.get(*key).ok_or_else(|| {
                    PipelineError::invalid_config(format!(
                        "No cached snapshot under key {}",
                        key
                    ))
                })?;
                self.bus = state.bus;
                self.globalcontext = state.globalcontext;
                info!(
                    target: "frameflow::pipeline",
                    "State restored from snapshot {}", key
                );
            }
            ControlAction::ResetCache { delete_directory } => {
                cache.reset(*delete_directory)?;
                info!(target: "frameflow::pipeline", "Cache reset");
            }
        }
        Ok(())
    }

    fn store_checkpoint(&mut self, key: &StepKey) -> Result<(), PipelineError> {
        if let Some(cache) = &mut self.cache {
            cache.store(&self.steps, &self.bus, &self.globalcontext, key)?;
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline [{} mode, {} step(s)]", self.mode, self.steps.len())?;
        for (position, (key, step)) in self.steps.iter().enumerate() {
            writeln!(
                f,
                "  {}. {} ({}) key={}",
                position + 1,
                step.name(),
                step.capability(),
                key
            )?;
        }
        write!(f, "parameters: [{}]", self.bus.names().join(", "))
    }
}
