use std::sync::Arc;

use convrt::binder::BoundBuffers;
use convrt::{
    build_descriptor, engine, Algorithm, ConvKind, ConvRuntime, DescriptorInputs, ErrorKind,
    ExecutionPlan, RuntimeOptions,
};
use convrt_backend_tests::{ConvFixture, FakeStream, RecordingPrimitive, TestContext};

#[test]
fn poisoned_stream_fails_even_when_the_primitive_succeeds() -> anyhow::Result<()> {
    let primitive = RecordingPrimitive::new();
    let runtime = ConvRuntime::new(Arc::new(primitive.clone()), None, RuntimeOptions::default());
    let ctx = TestContext::new(1);
    let fixture = ConvFixture::new(Algorithm::Fixed(1));

    ctx.stream.poison();
    let err = runtime
        .conv(&ctx.context, fixture.forward(1))
        .expect_err("poisoned stream must fail the call");
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("stream not ok"));
    assert_eq!(primitive.launches().len(), 1);

    ctx.stream.heal();
    runtime.conv(&ctx.context, fixture.forward(1))?;
    assert_eq!(primitive.launches().len(), 2);
    Ok(())
}

#[test]
fn primitive_failure_is_an_execution_error() {
    let primitive = RecordingPrimitive::new();
    primitive.fail_run(true);
    let runtime = ConvRuntime::new(Arc::new(primitive.clone()), None, RuntimeOptions::default());
    let ctx = TestContext::new(1);
    let fixture = ConvFixture::new(Algorithm::Fixed(1));

    let err = runtime
        .conv(&ctx.context, fixture.forward(1))
        .expect_err("launch failure must surface");
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(primitive.launches().is_empty());
}

#[test]
fn execute_launches_with_the_given_algorithm_and_buffers() -> anyhow::Result<()> {
    let primitive = RecordingPrimitive::new();
    let fixture = ConvFixture::new(Algorithm::Fixed(1));
    let descriptor = build_descriptor(DescriptorInputs {
        kind: ConvKind::BackwardInput,
        operand0: &fixture.operand0,
        operand1: &fixture.operand1,
        output: &fixture.output,
        scratch_size: fixture.scratch.size_in_bytes,
        attrs: &fixture.attrs,
        fusion: fixture.fusion,
        serialized_graph: None,
    })?;
    let plan = ExecutionPlan::build(descriptor, &primitive)?;
    let buffers = BoundBuffers::fixed(
        &fixture.operand0,
        &fixture.operand1,
        None,
        None,
        &fixture.output,
    );
    let algorithm = plan.selection()?.algorithm;
    let stream = FakeStream::new();

    engine::execute(
        &plan,
        &algorithm,
        &buffers,
        fixture.scratch.device_memory(),
        &stream,
    )?;

    let launch = primitive.last_launch_or_panic();
    assert_eq!(launch.algorithm, algorithm);
    assert_eq!(launch.operands, buffers.operands.to_vec());
    assert_eq!(launch.results, buffers.results.to_vec());
    assert_eq!(launch.scratch, fixture.scratch.device_memory());
    Ok(())
}
