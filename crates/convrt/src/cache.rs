//! Two-level plan cache: execution context, then call site.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::device::{CallSiteId, ContextId};
use crate::error::{lock_named, ConvResult};
use crate::plan::{ExecutionPlan, PlanState};
use crate::profiling;

type PlanSlot = Arc<OnceCell<Arc<ExecutionPlan>>>;

/// Plans of one execution context. Its lock only guards slot lookup, never construction.
#[derive(Default)]
struct ContextPlans {
    slots: Mutex<HashMap<CallSiteId, PlanSlot>>,
}

impl ContextPlans {
    fn slot(&self, call_site: CallSiteId) -> ConvResult<PlanSlot> {
        let mut slots = lock_named(&self.slots, "context plan")?;
        Ok(Arc::clone(slots.entry(call_site).or_default()))
    }

    fn built(&self, call_site: CallSiteId) -> ConvResult<Option<Arc<ExecutionPlan>>> {
        let slots = lock_named(&self.slots, "context plan")?;
        Ok(slots
            .get(&call_site)
            .and_then(|slot| slot.get().cloned()))
    }

    fn built_count(&self) -> ConvResult<usize> {
        let slots = lock_named(&self.slots, "context plan")?;
        Ok(slots.values().filter(|slot| slot.get().is_some()).count())
    }
}

/// Lazily built execution plans keyed by (context, call site).
///
/// A plan is built at most once per key, even when many threads hit the key first at the same
/// time. Builds for different keys run concurrently. A failed build leaves the key unbuilt.
#[derive(Default)]
pub struct PlanCache {
    contexts: Mutex<HashMap<ContextId, Arc<ContextPlans>>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create<F>(
        &self,
        context: ContextId,
        call_site: CallSiteId,
        build: F,
    ) -> ConvResult<Arc<ExecutionPlan>>
    where
        F: FnOnce() -> ConvResult<ExecutionPlan>,
    {
        let slot = self.context_plans(context)?.slot(call_site)?;
        if let Some(existing) = slot.get() {
            profiling::cache_event("convrt.plan_cache.hit");
            return Ok(Arc::clone(existing));
        }

        let plan = slot.get_or_try_init(|| {
            let _scope = profiling::backend_scope("convrt.plan_cache.build");
            profiling::cache_event("convrt.plan_cache.miss");
            log::debug!("building convolution plan for {call_site} in {context}");
            build().map(Arc::new)
        })?;
        Ok(Arc::clone(plan))
    }

    /// Returns the plan for a key if it has been built.
    pub fn get(
        &self,
        context: ContextId,
        call_site: CallSiteId,
    ) -> ConvResult<Option<Arc<ExecutionPlan>>> {
        let plans = {
            let contexts = lock_named(&self.contexts, "plan cache")?;
            contexts.get(&context).cloned()
        };
        match plans {
            Some(plans) => plans.built(call_site),
            None => Ok(None),
        }
    }

    /// Lifecycle state for a key; `None` means no plan has been built yet.
    pub fn state(
        &self,
        context: ContextId,
        call_site: CallSiteId,
    ) -> ConvResult<Option<PlanState>> {
        match self.get(context, call_site)? {
            Some(plan) => plan.state().map(Some),
            None => Ok(None),
        }
    }

    /// Number of built plans held for `context`.
    pub fn plan_count(&self, context: ContextId) -> ConvResult<usize> {
        let plans = {
            let contexts = lock_named(&self.contexts, "plan cache")?;
            contexts.get(&context).cloned()
        };
        match plans {
            Some(plans) => plans.built_count(),
            None => Ok(0),
        }
    }

    /// Drops every plan of `context`; called when the context is torn down.
    pub fn evict_context(&self, context: ContextId) -> ConvResult<bool> {
        let mut contexts = lock_named(&self.contexts, "plan cache")?;
        let removed = contexts.remove(&context).is_some();
        if removed {
            log::debug!("evicted convolution plans of {context}");
        }
        Ok(removed)
    }

    fn context_plans(&self, context: ContextId) -> ConvResult<Arc<ContextPlans>> {
        let mut contexts = lock_named(&self.contexts, "plan cache")?;
        Ok(Arc::clone(contexts.entry(context).or_default()))
    }
}
