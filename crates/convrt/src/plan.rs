//! Execution plans: a built descriptor, its prepared primitive handle and the algorithm in use.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::descriptor::{AlgorithmDesc, ConvDescriptor};
use crate::error::ConvResult;
use crate::primitive::{AutotuneResult, ConvPrimitive, PreparedConv};

/// Lifecycle of a cached plan. A call site without a plan is `UNBUILT` and has no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanState {
    /// Built with the algorithm pinned by the compiler.
    Built,
    /// Built with `Auto`; the first invocation must autotune.
    AwaitingAutotune,
    /// Terminal: the algorithm was picked by runtime autotuning.
    Tuned,
}

#[derive(Debug, Clone)]
pub(crate) struct Selection {
    pub(crate) state: PlanState,
    pub(crate) algorithm: AlgorithmDesc,
    pub(crate) tuned_scratch_bytes: Option<u64>,
}

impl Selection {
    pub(crate) fn install_tuned(&mut self, result: &AutotuneResult) {
        self.algorithm = AlgorithmDesc::tuned(result.algorithm_id, result.tensor_ops_enabled);
        self.tuned_scratch_bytes = Some(result.scratch_bytes);
        self.state = PlanState::Tuned;
    }

    pub(crate) fn snapshot(&self) -> PlanSelection {
        PlanSelection {
            state: self.state,
            algorithm: self.algorithm.clone(),
            tuned_scratch_bytes: self.tuned_scratch_bytes,
        }
    }
}

/// Snapshot of the algorithm a launch should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSelection {
    pub state: PlanState,
    pub algorithm: AlgorithmDesc,
    /// Scratch bytes the tuned algorithm requires; `None` until tuned.
    pub tuned_scratch_bytes: Option<u64>,
}

/// Cached unit for one (context, call site) pair.
pub struct ExecutionPlan {
    descriptor: ConvDescriptor,
    prepared: Box<dyn PreparedConv>,
    selection: Mutex<Selection>,
}

impl ExecutionPlan {
    /// Prepares `descriptor` with `primitive`; the primitive only ever sees a concrete algorithm.
    pub fn build(descriptor: ConvDescriptor, primitive: &dyn ConvPrimitive) -> ConvResult<Self> {
        let pinned = descriptor.pinned();
        let prepared = primitive.prepare(&pinned)?;
        let state = if descriptor.requires_autotuning() {
            PlanState::AwaitingAutotune
        } else {
            PlanState::Built
        };
        Ok(Self {
            selection: Mutex::new(Selection {
                state,
                algorithm: pinned.backend_config.algorithm,
                tuned_scratch_bytes: None,
            }),
            descriptor,
            prepared,
        })
    }

    /// Descriptor as built from the call's attributes, including an `Auto` request.
    pub fn descriptor(&self) -> &ConvDescriptor {
        &self.descriptor
    }

    pub fn prepared(&self) -> &dyn PreparedConv {
        self.prepared.as_ref()
    }

    pub fn state(&self) -> ConvResult<PlanState> {
        Ok(self.lock_selection().state)
    }

    pub fn selection(&self) -> ConvResult<PlanSelection> {
        Ok(self.lock_selection().snapshot())
    }

    /// Poisoning is ignored: a selection is only written by `install_tuned` after the search
    /// returned, so a panicking search leaves it awaiting autotuning.
    pub(crate) fn lock_selection(&self) -> MutexGuard<'_, Selection> {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("kind", &self.descriptor.kind)
            .field("selection", &self.selection)
            .finish()
    }
}
