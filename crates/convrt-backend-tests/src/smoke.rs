use std::sync::Arc;

use convrt::{
    Algorithm, AlgorithmSearch, AutotuneResult, ConvPrimitive, ConvRuntime, ConvTarget,
    ErrorKind, PlanState, RuntimeOptions,
};

use crate::fixtures::{ConvFixture, GraphFixture, TestContext};
use crate::recording::CountingSearch;

pub fn pinned_forward_runs(primitive: Arc<dyn ConvPrimitive>) {
    let runtime = ConvRuntime::new(primitive, None, RuntimeOptions::default());
    let ctx = TestContext::new(1);
    let fixture = ConvFixture::new(Algorithm::Fixed(1));

    runtime
        .conv(&ctx.context, fixture.forward(7))
        .expect("pinned forward convolution should run");
    assert_eq!(
        runtime.plan_state(ctx.id(), fixture.forward(7).call_site).unwrap(),
        Some(PlanState::Built)
    );
    assert!(ctx.allocator.requests().is_empty());
}

pub fn every_fixed_target_runs(primitive: Arc<dyn ConvPrimitive>) {
    let runtime = ConvRuntime::new(primitive, None, RuntimeOptions::default());
    let ctx = TestContext::new(2);
    let fixture = ConvFixture::new(Algorithm::Fixed(0));

    for (call_site, target) in ConvTarget::all()
        .iter()
        .copied()
        .filter(|target| !target.is_graph())
        .enumerate()
    {
        runtime
            .conv(&ctx.context, fixture.call(call_site as i64, target))
            .unwrap_or_else(|err| panic!("{} failed: {err}", target.name()));
    }
}

pub fn auto_forward_tunes_once(primitive: Arc<dyn ConvPrimitive>) {
    let search = Arc::new(CountingSearch::returning(AutotuneResult {
        algorithm_id: 3,
        tensor_ops_enabled: true,
        scratch_bytes: 64,
    }));
    let runtime = ConvRuntime::new(
        primitive,
        Some(Arc::clone(&search) as Arc<dyn AlgorithmSearch>),
        RuntimeOptions::default(),
    );
    let ctx = TestContext::new(3);
    let fixture = ConvFixture::new(Algorithm::Auto);

    for _ in 0..3 {
        runtime
            .conv(&ctx.context, fixture.forward(11))
            .expect("autotuned forward convolution should run");
    }
    assert_eq!(search.calls(), 1);
}

pub fn auto_without_search_is_rejected(primitive: Arc<dyn ConvPrimitive>) {
    let runtime = ConvRuntime::new(primitive, None, RuntimeOptions::default());
    let ctx = TestContext::new(4);
    let fixture = ConvFixture::new(Algorithm::Auto);

    let err = runtime
        .conv(&ctx.context, fixture.forward(5))
        .expect_err("auto algorithm without a search must fail");
    assert_eq!(err.kind(), ErrorKind::AutotuneUnavailable);
}

pub fn graph_forward_runs(primitive: Arc<dyn ConvPrimitive>) {
    let runtime = ConvRuntime::new(primitive, None, RuntimeOptions::default());
    let ctx = TestContext::new(5);
    let fixture = GraphFixture::new(Algorithm::Fixed(2), 1, 1);

    runtime
        .conv_graph(&ctx.context, fixture.call(9))
        .expect("graph convolution should run");
}
