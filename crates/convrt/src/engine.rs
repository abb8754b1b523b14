use crate::binder::BoundBuffers;
use crate::buffer::DeviceMemory;
use crate::descriptor::AlgorithmDesc;
use crate::device::DeviceStream;
use crate::error::{ConvError, ConvResult, ErrorKind};
use crate::plan::ExecutionPlan;
use crate::primitive::ConvLaunch;
use crate::profiling;

/// Launches `plan` with `algorithm` on `stream`, then checks that the stream is still healthy.
///
/// Primitive failures and a poisoned stream are both reported as execution errors.
pub fn execute(
    plan: &ExecutionPlan,
    algorithm: &AlgorithmDesc,
    buffers: &BoundBuffers,
    scratch: DeviceMemory,
    stream: &dyn DeviceStream,
) -> ConvResult<()> {
    let _scope = profiling::backend_scope("convrt.execute");
    log::trace!(
        "launching {} convolution: algorithm {:?}, {} operands, {} results, scratch {} bytes",
        plan.descriptor().kind.as_str(),
        algorithm.id(),
        buffers.operands.len(),
        buffers.results.len(),
        scratch.size()
    );

    plan.prepared()
        .run(ConvLaunch {
            algorithm,
            operands: &buffers.operands,
            results: &buffers.results,
            scratch,
            stream,
        })
        .map_err(as_execution)?;

    stream
        .status()
        .map_err(|err| ConvError::execution(format!("stream not ok after convolution: {err}")))
}

fn as_execution(err: ConvError) -> ConvError {
    if err.kind() == ErrorKind::Execution {
        err
    } else {
        ConvError::execution(err.to_string())
    }
}
