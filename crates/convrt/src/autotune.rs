//! Runtime algorithm selection for plans built with `Algorithm::Auto`.

use crate::buffer::DeviceMemory;
use crate::config::{DebugOptions, TuningExclusion};
use crate::device::ExecutionContext;
use crate::error::{ConvError, ConvResult};
use crate::plan::{ExecutionPlan, PlanSelection, PlanState};
use crate::primitive::{AlgorithmSearch, AutotuneResult, SearchRequest};
use crate::profiling;

/// Live buffers the search measures candidates against.
#[derive(Clone, Copy)]
pub struct TuneTarget<'a> {
    pub operands: &'a [DeviceMemory],
    pub results: &'a [DeviceMemory],
    pub context: &'a ExecutionContext,
}

/// Resolves the algorithm a plan launches with, autotuning on first use when required.
pub struct Autotuner<'a> {
    search: Option<&'a dyn AlgorithmSearch>,
    exclusion: TuningExclusion,
    debug: &'a DebugOptions,
}

impl<'a> Autotuner<'a> {
    pub fn new(
        search: Option<&'a dyn AlgorithmSearch>,
        exclusion: TuningExclusion,
        debug: &'a DebugOptions,
    ) -> Self {
        Self {
            search,
            exclusion,
            debug,
        }
    }

    /// Returns the plan's current selection, tuning it first if it still awaits autotuning.
    ///
    /// A failed search leaves the plan awaiting autotuning so a later call can try again.
    pub fn resolve(
        &self,
        plan: &ExecutionPlan,
        target: TuneTarget<'_>,
    ) -> ConvResult<PlanSelection> {
        let mut guard = plan.lock_selection();
        if guard.state != PlanState::AwaitingAutotune {
            return Ok(guard.snapshot());
        }
        let search = self.search.ok_or_else(|| {
            ConvError::autotune_unavailable(
                "algorithm Auto requested but no algorithm search capability is installed",
            )
        })?;

        match self.exclusion {
            TuningExclusion::Exclusive => {
                let result = self.run_search(search, plan, target)?;
                guard.install_tuned(&result);
                Ok(guard.snapshot())
            }
            TuningExclusion::Relaxed => {
                drop(guard);
                let result = self.run_search(search, plan, target)?;
                let mut guard = plan.lock_selection();
                if guard.state == PlanState::AwaitingAutotune {
                    guard.install_tuned(&result);
                } else {
                    // Another caller installed first; its result stands.
                    profiling::cache_event("convrt.autotune.redundant");
                    log::debug!("discarding redundant autotune result {result:?}");
                }
                Ok(guard.snapshot())
            }
        }
    }

    fn run_search(
        &self,
        search: &dyn AlgorithmSearch,
        plan: &ExecutionPlan,
        target: TuneTarget<'_>,
    ) -> ConvResult<AutotuneResult> {
        let _scope = profiling::backend_scope("convrt.autotune.search");
        profiling::cache_event("convrt.autotune.run");
        let descriptor = plan.descriptor().pinned();
        let result = search.pick_best(SearchRequest {
            descriptor: &descriptor,
            operands: target.operands,
            results: target.results,
            context: target.context,
            debug: self.debug,
        })?;
        log::debug!(
            "autotuned {} convolution in {}: algorithm {} (tensor ops {}), scratch {} bytes",
            descriptor.kind.as_str(),
            target.context.id(),
            result.algorithm_id,
            result.tensor_ops_enabled,
            result.scratch_bytes
        );
        Ok(result)
    }
}
