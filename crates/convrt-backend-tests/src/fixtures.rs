use std::sync::Arc;

use convrt::{
    ActivationMode, Algorithm, BackendConfig, CallArg, CallSiteId, ContextId, ConvAttrs, ConvCall,
    ConvDimensionNumbers, ConvGraphCall, ConvTarget, DType, ExecutionContext, FlatBuffer,
    FusionAttrs, StridedBuffer, WindowAttrs,
};

use crate::recording::{FakeStream, RecordingAllocator};

pub const SCRATCH_BYTES: u64 = 256;

/// Execution context backed by a fake stream and a recording allocator.
pub struct TestContext {
    pub context: ExecutionContext,
    pub stream: Arc<FakeStream>,
    pub allocator: Arc<RecordingAllocator>,
}

impl TestContext {
    pub fn new(id: u64) -> Self {
        Self::on_device(id, 0)
    }

    pub fn on_device(id: u64, device_ordinal: usize) -> Self {
        let stream = Arc::new(FakeStream::new());
        let allocator = Arc::new(RecordingAllocator::new());
        let context = ExecutionContext::new(
            ContextId(id),
            device_ordinal,
            Arc::clone(&stream) as _,
            Arc::clone(&allocator) as _,
        );
        Self {
            context,
            stream,
            allocator,
        }
    }

    pub fn id(&self) -> ContextId {
        self.context.id()
    }
}

/// Rank-2 NCHW convolution: input `[1, 3, 5, 7]`, filter `[4, 3, 3, 3]`, output `[1, 4, 3, 5]`.
#[derive(Debug, Clone)]
pub struct ConvFixture {
    pub operand0: StridedBuffer,
    pub operand1: StridedBuffer,
    pub output: StridedBuffer,
    pub bias: FlatBuffer,
    pub side_input: StridedBuffer,
    pub scratch: FlatBuffer,
    pub attrs: ConvAttrs,
    pub fusion: FusionAttrs,
}

impl ConvFixture {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            operand0: StridedBuffer::contiguous(DType::F32, [1, 3, 5, 7], 0x1000),
            operand1: StridedBuffer::contiguous(DType::F32, [4, 3, 3, 3], 0x2000),
            output: StridedBuffer::contiguous(DType::F32, [1, 4, 3, 5], 0x3000),
            bias: FlatBuffer::new(0x5000, 16),
            side_input: StridedBuffer::contiguous(DType::F32, [1, 4, 3, 5], 0x6000),
            scratch: FlatBuffer::new(0x4000, SCRATCH_BYTES),
            attrs: forward_attrs(algorithm),
            fusion: FusionAttrs::default(),
        }
    }

    pub fn call(&self, call_site: i64, target: ConvTarget) -> ConvCall<'_> {
        ConvCall {
            call_site: CallSiteId(call_site),
            target,
            operand0: &self.operand0,
            operand1: &self.operand1,
            bias: target.has_bias().then_some(&self.bias),
            side_input: target.has_side_input().then_some(&self.side_input),
            output: &self.output,
            scratch: &self.scratch,
            attrs: &self.attrs,
            fusion: self.fusion_for(target),
        }
    }

    /// Fixture fusion attributes, with the ones a fused target requires filled in.
    pub fn fusion_for(&self, target: ConvTarget) -> FusionAttrs {
        let mut fusion = self.fusion;
        if target.has_bias() {
            fusion.activation_mode.get_or_insert(ActivationMode::Relu);
            if target.has_side_input() {
                fusion.side_input_scale.get_or_insert(1.0);
            } else {
                fusion.leakyrelu_alpha.get_or_insert(0.0);
            }
        }
        fusion
    }

    pub fn forward(&self, call_site: i64) -> ConvCall<'_> {
        self.call(call_site, ConvTarget::Forward)
    }
}

pub fn forward_attrs(algorithm: Algorithm) -> ConvAttrs {
    ConvAttrs {
        dimension_numbers: ConvDimensionNumbers::nchw(2),
        window: WindowAttrs::identity(2),
        backend_config: BackendConfig::row_major(algorithm, 4),
        feature_group_count: 1,
        result_scale: 1.0,
    }
}

/// Graph call arguments: `n_extra` operands, `n_aux + 1` outputs and a scratch buffer.
pub struct GraphFixture {
    pub conv: ConvFixture,
    pub args: Vec<CallArg>,
    pub n_aux_outputs: i32,
    pub serialized_graph: String,
}

impl GraphFixture {
    pub fn new(algorithm: Algorithm, n_extra: usize, n_aux_outputs: i32) -> Self {
        let conv = ConvFixture::new(algorithm);
        let mut args = Vec::new();
        for index in 0..n_extra {
            args.push(CallArg::from(StridedBuffer::contiguous(
                DType::F32,
                [1, 4, 3, 5],
                0x10_000 + index as u64 * 0x100,
            )));
        }
        for index in 0..=n_aux_outputs.max(0) as usize {
            args.push(CallArg::from(StridedBuffer::contiguous(
                DType::F32,
                [1, 4, 3, 5],
                0x20_000 + index as u64 * 0x100,
            )));
        }
        args.push(CallArg::from(conv.scratch));
        Self {
            conv,
            args,
            n_aux_outputs,
            serialized_graph: "conv->add->relu".to_string(),
        }
    }

    pub fn call(&self, call_site: i64) -> ConvGraphCall<'_> {
        ConvGraphCall {
            call_site: CallSiteId(call_site),
            operand0: &self.conv.operand0,
            operand1: &self.conv.operand1,
            args: &self.args,
            n_aux_outputs: self.n_aux_outputs,
            serialized_graph: &self.serialized_graph,
            attrs: &self.conv.attrs,
        }
    }
}
