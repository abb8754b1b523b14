pub mod attrs;
pub mod autotune;
pub mod binder;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod plan;
pub mod primitive;
pub mod profiling;
pub mod shape;
pub mod targets;

pub use attrs::{
    ActivationMode, Algorithm, BackendConfig, ConvAttrs, ConvDimensionNumbers, FusionAttrs,
    WindowAttrs, AUTO_ALGORITHM_ID, DEFAULT_ALGORITHM_ID,
};
pub use buffer::{CallArg, DeviceMemory, FlatBuffer, StridedBuffer};
pub use cache::PlanCache;
pub use config::{DebugOptions, RuntimeOptions, TuningExclusion};
pub use descriptor::{build_descriptor, AlgorithmDesc, ConvDescriptor, ConvKind, DescriptorInputs};
pub use device::{
    CallSiteId, ContextId, DeviceAllocation, DeviceAllocator, DeviceStream, ExecutionContext,
};
pub use dispatch::{ConvCall, ConvGraphCall, ConvRuntime};
pub use error::{BindingGroup, ConvError, ConvResult, ErrorKind};
pub use plan::{ExecutionPlan, PlanSelection, PlanState};
pub use primitive::{
    AlgorithmSearch, AutotuneResult, ConvLaunch, ConvPrimitive, PreparedConv, SearchRequest,
};
pub use shape::{DType, Layout, Shape};
pub use targets::ConvTarget;
