//! Runtime session: the single path every convolution call shape goes through.

use std::fmt;
use std::sync::Arc;

use crate::attrs::{ConvAttrs, FusionAttrs};
use crate::autotune::{Autotuner, TuneTarget};
use crate::binder::{self, BoundBuffers};
use crate::buffer::{CallArg, FlatBuffer, StridedBuffer};
use crate::cache::PlanCache;
use crate::config::RuntimeOptions;
use crate::descriptor::{build_descriptor, ConvDescriptor, ConvKind, DescriptorInputs};
use crate::device::{CallSiteId, ContextId, ExecutionContext};
use crate::engine;
use crate::error::{BindingGroup, ConvError, ConvResult};
use crate::plan::{ExecutionPlan, PlanState};
use crate::primitive::{AlgorithmSearch, ConvPrimitive};
use crate::targets::ConvTarget;

/// Arguments of a fixed-arity convolution call.
#[derive(Debug, Clone, Copy)]
pub struct ConvCall<'a> {
    pub call_site: CallSiteId,
    pub target: ConvTarget,
    pub operand0: &'a StridedBuffer,
    pub operand1: &'a StridedBuffer,
    pub bias: Option<&'a FlatBuffer>,
    pub side_input: Option<&'a StridedBuffer>,
    pub output: &'a StridedBuffer,
    pub scratch: &'a FlatBuffer,
    pub attrs: &'a ConvAttrs,
    pub fusion: FusionAttrs,
}

/// Arguments of a graph convolution; `args` holds everything after the two main operands.
#[derive(Debug, Clone, Copy)]
pub struct ConvGraphCall<'a> {
    pub call_site: CallSiteId,
    pub operand0: &'a StridedBuffer,
    pub operand1: &'a StridedBuffer,
    pub args: &'a [CallArg],
    pub n_aux_outputs: i32,
    pub serialized_graph: &'a str,
    pub attrs: &'a ConvAttrs,
}

/// Owns the plan cache and the device capabilities convolutions run against.
pub struct ConvRuntime {
    cache: PlanCache,
    primitive: Arc<dyn ConvPrimitive>,
    search: Option<Arc<dyn AlgorithmSearch>>,
    options: RuntimeOptions,
}

impl ConvRuntime {
    /// `search` is `None` when runtime autotuning is not available in this environment.
    pub fn new(
        primitive: Arc<dyn ConvPrimitive>,
        search: Option<Arc<dyn AlgorithmSearch>>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            cache: PlanCache::new(),
            primitive,
            search,
            options,
        }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.cache
    }

    /// `None` while no plan has been built for the call site.
    pub fn plan_state(
        &self,
        context: ContextId,
        call_site: CallSiteId,
    ) -> ConvResult<Option<PlanState>> {
        self.cache.state(context, call_site)
    }

    pub fn evict_context(&self, context: ContextId) -> ConvResult<bool> {
        self.cache.evict_context(context)
    }

    pub fn conv(&self, context: &ExecutionContext, call: ConvCall<'_>) -> ConvResult<()> {
        let target = call.target;
        if target.is_graph() {
            return Err(ConvError::binding(
                BindingGroup::Operand,
                format!("{} takes a variable argument list", target.name()),
            ));
        }
        if target.has_bias() && call.bias.is_none() {
            return Err(ConvError::binding(
                BindingGroup::Operand,
                format!("{} requires a bias operand", target.name()),
            ));
        }
        if target.has_side_input() && call.side_input.is_none() {
            return Err(ConvError::binding(
                BindingGroup::Operand,
                format!("{} requires a side input operand", target.name()),
            ));
        }
        let fusion = target.fusion_attrs(call.fusion)?;

        let buffers = BoundBuffers::fixed(
            call.operand0,
            call.operand1,
            call.bias,
            call.side_input,
            call.output,
        );
        self.dispatch(context, call.call_site, &buffers, *call.scratch, || {
            build_descriptor(DescriptorInputs {
                kind: target.kind(),
                operand0: call.operand0,
                operand1: call.operand1,
                output: call.output,
                scratch_size: call.scratch.size_in_bytes,
                attrs: call.attrs,
                fusion,
                serialized_graph: None,
            })
        })
    }

    pub fn conv_graph(
        &self,
        context: &ExecutionContext,
        call: ConvGraphCall<'_>,
    ) -> ConvResult<()> {
        let args = binder::slice_graph_args(call.args, call.n_aux_outputs)?;
        let output = args
            .main_output()
            .ok_or_else(|| ConvError::binding(BindingGroup::Output, "missing main output"))?;
        let buffers = BoundBuffers::graph(call.operand0, call.operand1, &args);
        self.dispatch(context, call.call_site, &buffers, args.scratch, || {
            build_descriptor(DescriptorInputs {
                kind: ConvKind::ForwardGraph,
                operand0: call.operand0,
                operand1: call.operand1,
                output,
                scratch_size: args.scratch.size_in_bytes,
                attrs: call.attrs,
                fusion: FusionAttrs::default(),
                serialized_graph: Some(call.serialized_graph),
            })
        })
    }

    fn dispatch<F>(
        &self,
        context: &ExecutionContext,
        call_site: CallSiteId,
        buffers: &BoundBuffers,
        scratch: FlatBuffer,
        describe: F,
    ) -> ConvResult<()>
    where
        F: FnOnce() -> ConvResult<ConvDescriptor>,
    {
        let plan = self.cache.get_or_create(context.id(), call_site, || {
            let descriptor = describe()?;
            if log::log_enabled!(log::Level::Trace) {
                log::trace!("{call_site} descriptor: {}", descriptor.to_json()?);
            }
            ExecutionPlan::build(descriptor, self.primitive.as_ref())
        })?;

        let tuner = Autotuner::new(
            self.search.as_deref(),
            self.options.tuning_exclusion,
            &self.options.debug,
        );
        let selection = tuner.resolve(
            &plan,
            TuneTarget {
                operands: &buffers.operands,
                results: &buffers.results,
                context,
            },
        )?;

        let required = selection
            .tuned_scratch_bytes
            .or(plan.descriptor().backend_config.algorithm.workspace_size)
            .unwrap_or(scratch.size_in_bytes);
        let scratch = binder::ensure_scratch(scratch, required, context)?;

        engine::execute(
            &plan,
            &selection.algorithm,
            buffers,
            scratch.memory(),
            context.stream(),
        )
    }
}

impl fmt::Debug for ConvRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvRuntime")
            .field("primitive", &self.primitive.name())
            .field("autotune", &self.search.is_some())
            .field("options", &self.options)
            .finish()
    }
}
