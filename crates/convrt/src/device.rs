//! Device-side capabilities the runtime consumes but does not implement.

use std::fmt;
use std::sync::Arc;

use crate::buffer::DeviceMemory;
use crate::error::ConvResult;

/// Identity of a device execution context; compiled plans never cross contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

/// Compiler-assigned id of one convolution operation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSiteId(pub i64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{:x}", self.0)
    }
}

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid{}", self.0)
    }
}

/// Device memory owned by the caller of [`DeviceAllocator::allocate`]; released on drop.
pub trait DeviceAllocation: Send {
    fn memory(&self) -> DeviceMemory;
}

/// Allocator shared by every call site of a context; must accept concurrent requests.
pub trait DeviceAllocator: Send + Sync {
    fn allocate(&self, device_ordinal: usize, bytes: u64) -> ConvResult<Box<dyn DeviceAllocation>>;
}

/// Execution stream a convolution is enqueued on.
pub trait DeviceStream: Send + Sync {
    /// Reports whether the stream is healthy; prior asynchronous work may have poisoned it.
    fn status(&self) -> ConvResult<()>;
}

/// Device, stream and allocator a convolution call runs against.
#[derive(Clone)]
pub struct ExecutionContext {
    id: ContextId,
    device_ordinal: usize,
    stream: Arc<dyn DeviceStream>,
    allocator: Arc<dyn DeviceAllocator>,
}

impl ExecutionContext {
    pub fn new(
        id: ContextId,
        device_ordinal: usize,
        stream: Arc<dyn DeviceStream>,
        allocator: Arc<dyn DeviceAllocator>,
    ) -> Self {
        Self {
            id,
            device_ordinal,
            stream,
            allocator,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn device_ordinal(&self) -> usize {
        self.device_ordinal
    }

    pub fn stream(&self) -> &dyn DeviceStream {
        self.stream.as_ref()
    }

    pub fn allocator(&self) -> &dyn DeviceAllocator {
        self.allocator.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("device_ordinal", &self.device_ordinal)
            .finish()
    }
}
