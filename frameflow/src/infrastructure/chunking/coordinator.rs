// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Coordinator
//!
//! Plans and serves the coordinate queue that drives chunked execution. At
//! construction the coordinator inspects the step index: every chunking
//! extractor contributes a [`ChunkRecord`] seeded from its row-count
//! capability, and every loader must carry the `append` exists policy
//! (anything else fails with `ChunkPolicyViolation` - a `replace` or `fail`
//! loader cannot run once per chunk).
//!
//! ## Strategies
//!
//! - **Direct (interleaved)**: round-robin over the extractors, one
//!   `(skip, take)` of the extractor's own chunk size per cycle. A finished
//!   extractor keeps its slot with the `(null, null)` padding pair, so the
//!   queue is always a whole number of pipeline passes.
//! - **Recursive (product)**: `total = prod(chunk counts)` iterations; each
//!   iteration takes one contiguous base-`total` slice of every extractor's
//!   rows, distributing the remainder over the leading iterations. An
//!   extractor whose remainder is exhausted stops producing rows; its slot
//!   carries the padding pair to keep passes aligned.
//!
//! ## Pass protocol
//!
//! The orchestrator dequeues once per chunking extractor (in extractor
//! order) at the start of each pass and injects the pair into that
//! extractor's invocation. After a full pass, `keep_executing` tells the
//! pipeline whether to restore the saved state snapshot and go again.

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use frameflow_domain::services::type_guards;
use frameflow_domain::value_objects::{ChunkCoordinates, ChunkRecord, ExistsPolicy};
use frameflow_domain::{CachedState, Context, ParameterBus, PipelineError, StepIndex, StepKey};

/// Queue-planning strategy for chunked execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Interleaved round-robin, one own-size chunk per extractor per pass.
    Direct,
    /// Product partitioning across all extractors.
    Recursive,
}

/// Coordinates chunked execution over one or more chunking extractors.
#[derive(Debug)]
pub struct ChunkCoordinator {
    records: IndexMap<StepKey, ChunkRecord>,
    queue: VecDeque<ChunkCoordinates>,
    saved: Option<CachedState>,
    keep_executing: bool,
}

impl ChunkCoordinator {
    /// Builds a coordinator from the step index and precomputes the full
    /// coordinate queue.
    ///
    /// # Errors
    ///
    /// * `InvalidConfiguration` - no chunking extractor is registered
    /// * `ChunkPolicyViolation` - a loader's exists policy is not `append`
    /// * any error raised by an extractor's row-count capability
    pub fn new(strategy: ChunkStrategy, steps: &StepIndex) -> Result<Self, PipelineError> {
        let mut records: IndexMap<StepKey, ChunkRecord> = IndexMap::new();
        for (key, step) in steps.iter() {
            if type_guards::is_chunking_extractor(step) {
                let chunk_size = step.chunk_size().ok_or_else(|| {
                    PipelineError::internal_error(format!(
                        "Chunking extractor '{}' lost its chunk size",
                        step.name()
                    ))
                })?;
                let total_rows = step.max_row_count()?;
                records.insert(key.clone(), ChunkRecord::new(chunk_size, total_rows)?);
            }
            if type_guards::is_loader(step) && step.exists_policy() != Some(ExistsPolicy::Append) {
                return Err(PipelineError::chunk_policy(format!(
                    "Loader '{}' must use the 'append' exists policy under chunked execution",
                    step.name()
                )));
            }
        }
        if records.is_empty() {
            return Err(PipelineError::invalid_config(
                "Chunked execution requires at least one extractor with a chunk size",
            ));
        }

        let queue = match strategy {
            ChunkStrategy::Direct => Self::plan_direct(&mut records),
            ChunkStrategy::Recursive => Self::plan_recursive(&records),
        };
        debug!(
            target: "frameflow::chunk",
            "Planned {} coordinates over {} extractor(s)",
            queue.len(),
            records.len()
        );
        Ok(ChunkCoordinator {
            records,
            queue,
            saved: None,
            keep_executing: true,
        })
    }

    /// Round-robin planning: whole cycles until every record has emitted its
    /// padding terminator, then defensive padding to a multiple of the
    /// extractor count.
    fn plan_direct(records: &mut IndexMap<StepKey, ChunkRecord>) -> VecDeque<ChunkCoordinates> {
        let mut queue = VecDeque::new();
        while records.values().any(|record| !record.is_done()) {
            for record in records.values_mut() {
                queue.push_back(record.next_coordinates());
            }
        }
        let count = records.len();
        while queue.len() % count != 0 {
            queue.push_back(ChunkCoordinates::padding());
        }
        queue
    }

    /// Product planning: `total` iterations of one contiguous slice per
    /// extractor, remainder rows distributed over the leading iterations.
    fn plan_recursive(records: &IndexMap<StepKey, ChunkRecord>) -> VecDeque<ChunkCoordinates> {
        let total: u64 = records
            .values()
            .map(|record| record.chunk_count())
            .product();
        let mut queue = VecDeque::new();
        for iteration in 0..total {
            for record in records.values() {
                let rows = record.total_rows();
                let base = rows / total;
                let remainder = rows % total;
                let start = iteration * base + iteration.min(remainder);
                let extra = u64::from(iteration < remainder);
                let end = start + base + extra;
                if start == end {
                    queue.push_back(ChunkCoordinates::padding());
                } else {
                    queue.push_back(ChunkCoordinates::range(start, end));
                }
            }
        }
        queue
    }

    /// Number of chunking extractors under coordination
    pub fn extractor_count(&self) -> usize {
        self.records.len()
    }

    /// Coordinates remaining in the queue
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// True while the queue holds coordinates for further passes
    pub fn keep_executing(&self) -> bool {
        self.keep_executing
    }

    /// Pops the next coordinate pair and refreshes `keep_executing`.
    ///
    /// An exhausted queue serves padding pairs, so a straggling dequeue
    /// degrades to a skipped extractor rather than a panic.
    pub fn dequeue(&mut self) -> ChunkCoordinates {
        let coordinates = self
            .queue
            .pop_front()
            .unwrap_or_else(ChunkCoordinates::padding);
        self.keep_executing = !self.queue.is_empty();
        coordinates
    }

    /// Captures the deep-copied `(bus, globalcontext)` snapshot that every
    /// pass after the first restores before re-entering the step loop.
    pub fn save(&mut self, bus: &ParameterBus, globalcontext: &Context) {
        self.saved = Some(CachedState {
            bus: bus.clone(),
            globalcontext: globalcontext.clone(),
        });
    }

    /// Clones the saved snapshot back out.
    ///
    /// # Errors
    ///
    /// `InternalError` when no snapshot was saved.
    pub fn reload(&self) -> Result<CachedState, PipelineError> {
        self.saved.clone().ok_or_else(|| {
            PipelineError::internal_error("Chunk coordinator has no saved state snapshot")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameflow_domain::{PipelineStep, StepOutput};

    fn chunking_extractor(name: &str, rows: u64, chunk_size: u64) -> PipelineStep {
        PipelineStep::extract(name)
            .chunk_size(chunk_size)
            .max_row_count(move || Ok(rows))
            .body(|_args| Ok(StepOutput::None))
            .build()
            .unwrap()
    }

    fn loader(name: &str, policy: ExistsPolicy) -> PipelineStep {
        PipelineStep::load(name)
            .exists(policy)
            .body(|_args| Ok(StepOutput::None))
            .build()
            .unwrap()
    }

    fn drain(coordinator: &mut ChunkCoordinator) -> Vec<ChunkCoordinates> {
        let mut all = Vec::new();
        while coordinator.keep_executing() {
            all.push(coordinator.dequeue());
        }
        all
    }

    #[test]
    fn test_direct_interleaves_two_extractors() {
        let mut steps = StepIndex::new();
        steps.register(chunking_extractor("e1", 10, 4)).unwrap();
        steps.register(chunking_extractor("e2", 5, 2)).unwrap();
        steps
            .register(loader("push", ExistsPolicy::Append))
            .unwrap();

        let mut coordinator = ChunkCoordinator::new(ChunkStrategy::Direct, &steps).unwrap();
        assert_eq!(coordinator.extractor_count(), 2);
        assert_eq!(coordinator.queue_len(), 8);

        let all = drain(&mut coordinator);
        assert_eq!(
            all,
            vec![
                ChunkCoordinates::range(0, 4),
                ChunkCoordinates::range(0, 2),
                ChunkCoordinates::range(4, 8),
                ChunkCoordinates::range(2, 4),
                ChunkCoordinates::range(8, 10),
                ChunkCoordinates::range(4, 5),
                ChunkCoordinates::padding(),
                ChunkCoordinates::padding(),
            ]
        );
        assert!(!coordinator.keep_executing());
    }

    #[test]
    fn test_direct_queue_is_multiple_of_extractor_count() {
        let mut steps = StepIndex::new();
        steps.register(chunking_extractor("e1", 4, 4)).unwrap();
        steps.register(chunking_extractor("e2", 8, 2)).unwrap();
        steps.register(chunking_extractor("e3", 3, 3)).unwrap();

        let coordinator = ChunkCoordinator::new(ChunkStrategy::Direct, &steps).unwrap();
        assert_eq!(coordinator.queue_len() % 3, 0);
    }

    #[test]
    fn test_direct_coverage_is_exact() {
        let mut steps = StepIndex::new();
        steps.register(chunking_extractor("e1", 11, 3)).unwrap();
        let mut coordinator = ChunkCoordinator::new(ChunkStrategy::Direct, &steps).unwrap();

        let mut covered = 0;
        for coords in drain(&mut coordinator) {
            if coords.is_padding() {
                continue;
            }
            assert_eq!(coords.skip(), Some(covered));
            covered = coords.take().unwrap();
        }
        assert_eq!(covered, 11);
    }

    #[test]
    fn test_recursive_product_partitioning() {
        let mut steps = StepIndex::new();
        steps.register(chunking_extractor("e1", 4, 2)).unwrap();
        steps.register(chunking_extractor("e2", 6, 3)).unwrap();

        let mut coordinator = ChunkCoordinator::new(ChunkStrategy::Recursive, &steps).unwrap();
        // total = ceil(4/2) * ceil(6/3) = 4 iterations, one slice per
        // extractor each.
        assert_eq!(coordinator.queue_len(), 8);
        let all = drain(&mut coordinator);
        assert_eq!(
            all,
            vec![
                ChunkCoordinates::range(0, 1),
                ChunkCoordinates::range(0, 2),
                ChunkCoordinates::range(1, 2),
                ChunkCoordinates::range(2, 4),
                ChunkCoordinates::range(2, 3),
                ChunkCoordinates::range(4, 5),
                ChunkCoordinates::range(3, 4),
                ChunkCoordinates::range(5, 6),
            ]
        );
    }

    #[test]
    fn test_recursive_pads_exhausted_extractors() {
        let mut steps = StepIndex::new();
        steps.register(chunking_extractor("e1", 2, 1)).unwrap();
        steps.register(chunking_extractor("e2", 3, 1)).unwrap();

        let mut coordinator = ChunkCoordinator::new(ChunkStrategy::Recursive, &steps).unwrap();
        let all = drain(&mut coordinator);
        // total = 6 iterations; e1 produces rows only while its remainder
        // lasts, then its slot is padding.
        assert_eq!(all.len(), 12);
        let e1: Vec<_> = all.iter().step_by(2).collect();
        assert_eq!(e1[0], &ChunkCoordinates::range(0, 1));
        assert_eq!(e1[1], &ChunkCoordinates::range(1, 2));
        assert!(e1[2..].iter().all(|c| c.is_padding()));

        let e2_covered: u64 = all.iter().skip(1).step_by(2).map(|c| c.len()).sum();
        assert_eq!(e2_covered, 3);
    }

    #[test]
    fn test_non_append_loader_is_policy_violation() {
        let mut steps = StepIndex::new();
        steps.register(chunking_extractor("e1", 10, 4)).unwrap();
        steps
            .register(loader("push", ExistsPolicy::Replace))
            .unwrap();

        let err = ChunkCoordinator::new(ChunkStrategy::Direct, &steps).unwrap_err();
        assert!(matches!(err, PipelineError::ChunkPolicyViolation(_)));
    }

    #[test]
    fn test_no_chunking_extractor_is_invalid() {
        let mut steps = StepIndex::new();
        steps
            .register(
                PipelineStep::extract("plain")
                    .body(|_args| Ok(StepOutput::None))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let err = ChunkCoordinator::new(ChunkStrategy::Direct, &steps).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_save_and_reload_snapshot() {
        let mut steps = StepIndex::new();
        steps.register(chunking_extractor("e1", 4, 2)).unwrap();
        let mut coordinator = ChunkCoordinator::new(ChunkStrategy::Direct, &steps).unwrap();

        let mut bus = ParameterBus::new();
        bus.set("x", serde_json::json!(1));
        let ctx = Context::new("globalcontext").unwrap();
        coordinator.save(&bus, &ctx);

        let restored = coordinator.reload().unwrap();
        assert_eq!(restored.bus, bus);
        assert_eq!(restored.globalcontext, ctx);
    }
}
