//! Resolves call arguments into device buffers and sizes the scratch workspace.

use smallvec::SmallVec;

use crate::buffer::{CallArg, DeviceMemory, FlatBuffer, StridedBuffer};
use crate::device::{DeviceAllocation, ExecutionContext};
use crate::error::{BindingGroup, ConvError, ConvResult};
use crate::profiling;

/// Device buffers of one launch, in the order the primitive expects them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundBuffers {
    pub operands: SmallVec<[DeviceMemory; 6]>,
    pub results: SmallVec<[DeviceMemory; 4]>,
}

impl BoundBuffers {
    /// Operand order: input, filter, then bias and side input when present.
    pub fn fixed(
        operand0: &StridedBuffer,
        operand1: &StridedBuffer,
        bias: Option<&FlatBuffer>,
        side_input: Option<&StridedBuffer>,
        output: &StridedBuffer,
    ) -> Self {
        let mut operands = SmallVec::new();
        operands.push(operand0.device_memory());
        operands.push(operand1.device_memory());
        if let Some(bias) = bias {
            operands.push(bias.device_memory());
        }
        if let Some(side_input) = side_input {
            operands.push(side_input.device_memory());
        }
        let mut results = SmallVec::new();
        results.push(output.device_memory());
        Self { operands, results }
    }

    /// Main operands followed by the graph's extra operands; outputs keep their order.
    pub fn graph(operand0: &StridedBuffer, operand1: &StridedBuffer, args: &GraphArgs<'_>) -> Self {
        let mut operands = SmallVec::new();
        operands.push(operand0.device_memory());
        operands.push(operand1.device_memory());
        operands.extend(args.extra_operands.iter().map(|view| view.device_memory()));
        let results = args.outputs.iter().map(|view| view.device_memory()).collect();
        Self { operands, results }
    }
}

/// Positional split of a graph convolution's trailing arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphArgs<'a> {
    pub extra_operands: Vec<&'a StridedBuffer>,
    /// Main result first, then the auxiliary outputs in order.
    pub outputs: Vec<&'a StridedBuffer>,
    pub scratch: FlatBuffer,
}

impl GraphArgs<'_> {
    pub fn main_output(&self) -> Option<&StridedBuffer> {
        self.outputs.first().copied()
    }
}

/// Splits the `args` that follow the two main operands of a graph convolution.
///
/// With `n_aux_outputs = A` and `N` arguments: `N - A - 2` extra operands, then `A + 1`
/// outputs, then the scratch buffer.
pub fn slice_graph_args(args: &[CallArg], n_aux_outputs: i32) -> ConvResult<GraphArgs<'_>> {
    let aux = usize::try_from(n_aux_outputs).map_err(|_| {
        ConvError::binding(
            BindingGroup::Output,
            format!("negative auxiliary output count {n_aux_outputs}"),
        )
    })?;
    let n_outputs = aux + 1;
    if args.len() < n_outputs + 1 {
        let group = if args.len() < n_outputs {
            BindingGroup::Output
        } else {
            BindingGroup::Scratch
        };
        return Err(ConvError::binding(
            group,
            format!(
                "{} arguments cannot hold {n_outputs} outputs and a scratch buffer",
                args.len()
            ),
        ));
    }

    let n_extra = args.len() - n_outputs - 1;
    let (extra, rest) = args.split_at(n_extra);
    let (outputs, scratch) = rest.split_at(n_outputs);

    let extra_operands = strided_group(extra, 0, BindingGroup::Operand)?;
    let outputs = strided_group(outputs, n_extra, BindingGroup::Output)?;
    let scratch = scratch
        .first()
        .map(CallArg::as_flat)
        .ok_or_else(|| ConvError::binding(BindingGroup::Scratch, "missing scratch argument"))?;

    Ok(GraphArgs {
        extra_operands,
        outputs,
        scratch,
    })
}

fn strided_group(
    args: &[CallArg],
    offset: usize,
    group: BindingGroup,
) -> ConvResult<Vec<&StridedBuffer>> {
    args.iter()
        .enumerate()
        .map(|(index, arg)| {
            arg.as_strided().ok_or_else(|| {
                ConvError::binding(
                    group,
                    format!("argument {} has no shape or strides", offset + index),
                )
            })
        })
        .collect()
}

/// Scratch workspace for one launch: the caller's buffer, or a fresh allocation when too small.
///
/// A grown allocation is released when the binding drops, after the launch.
pub struct ScratchBinding {
    memory: DeviceMemory,
    grown: Option<Box<dyn DeviceAllocation>>,
}

impl ScratchBinding {
    pub fn memory(&self) -> DeviceMemory {
        self.memory
    }

    pub fn was_grown(&self) -> bool {
        self.grown.is_some()
    }
}

/// Binds `supplied` when it holds `required` bytes, otherwise allocates exactly `required` bytes
/// on the context's device.
pub fn ensure_scratch(
    supplied: FlatBuffer,
    required: u64,
    context: &ExecutionContext,
) -> ConvResult<ScratchBinding> {
    if required <= supplied.size_in_bytes {
        return Ok(ScratchBinding {
            memory: supplied.device_memory(),
            grown: None,
        });
    }

    let ordinal = context.device_ordinal();
    let allocation = context
        .allocator()
        .allocate(ordinal, required)
        .map_err(|err| match err {
            ConvError::Allocation { .. } => err,
            other => ConvError::allocation(ordinal, required, other.to_string()),
        })?;
    profiling::cache_event("convrt.scratch.grow");
    log::debug!(
        "grew convolution scratch from {} to {required} bytes on device {ordinal}",
        supplied.size_in_bytes
    );
    Ok(ScratchBinding {
        memory: allocation.memory(),
        grown: Some(allocation),
    })
}
