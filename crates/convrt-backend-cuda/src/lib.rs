mod device;

use std::sync::Arc;

use convrt::{ContextId, ConvResult, ExecutionContext};

pub use device::{
    driver, is_available, CudaAllocation, CudaAllocator, CudaDevice, CudaDriver, CudaStream,
};

/// Execution context on `ordinal` with a fresh non-blocking stream and a `cuMemAlloc` allocator.
///
/// The context id is the driver context handle, so plans never leak between driver contexts.
pub fn execution_context(ordinal: usize) -> ConvResult<ExecutionContext> {
    let device = CudaDevice::open(ordinal)?;
    let stream = CudaStream::new(Arc::clone(&device))?;
    let id = ContextId(device.context_handle());
    Ok(ExecutionContext::new(
        id,
        ordinal,
        Arc::new(stream),
        Arc::new(CudaAllocator::new(device)),
    ))
}
