//! Contracts for the device convolution primitive and the algorithm search.

use crate::buffer::DeviceMemory;
use crate::config::DebugOptions;
use crate::descriptor::{AlgorithmDesc, ConvDescriptor};
use crate::device::{DeviceStream, ExecutionContext};
use crate::error::ConvResult;

/// Buffers and algorithm for one launch of a prepared convolution.
#[derive(Clone, Copy)]
pub struct ConvLaunch<'a> {
    /// Always a concrete algorithm; `Auto` is resolved before any launch.
    pub algorithm: &'a AlgorithmDesc,
    pub operands: &'a [DeviceMemory],
    pub results: &'a [DeviceMemory],
    pub scratch: DeviceMemory,
    pub stream: &'a dyn DeviceStream,
}

/// Primitive-specific compiled state kept alive by an execution plan.
///
/// A plan may be launched from several threads; implementations that cache runners internally
/// must synchronize that cache themselves.
pub trait PreparedConv: Send + Sync {
    fn run(&self, launch: ConvLaunch<'_>) -> ConvResult<()>;
}

/// Device convolution library.
pub trait ConvPrimitive: Send + Sync {
    fn name(&self) -> &str;

    /// Lowers a descriptor whose algorithm is already concrete into a reusable handle.
    fn prepare(&self, descriptor: &ConvDescriptor) -> ConvResult<Box<dyn PreparedConv>>;
}

/// Live buffers and configuration an algorithm search measures against.
#[derive(Clone, Copy)]
pub struct SearchRequest<'a> {
    pub descriptor: &'a ConvDescriptor,
    pub operands: &'a [DeviceMemory],
    pub results: &'a [DeviceMemory],
    pub context: &'a ExecutionContext,
    pub debug: &'a DebugOptions,
}

/// Best algorithm found by a search together with its scratch requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutotuneResult {
    pub algorithm_id: i64,
    pub tensor_ops_enabled: bool,
    pub scratch_bytes: u64,
}

/// Runtime algorithm search; returns an autotune error when no candidate is usable.
pub trait AlgorithmSearch: Send + Sync {
    fn pick_best(&self, request: SearchRequest<'_>) -> ConvResult<AutotuneResult>;
}
