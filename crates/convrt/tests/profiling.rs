#![cfg(feature = "profiler")]

use std::sync::Arc;

use convrt::{
    profiling, Algorithm, AlgorithmSearch, AutotuneResult, ConvRuntime, RuntimeOptions,
};
use convrt_backend_tests::{ConvFixture, CountingSearch, RecordingPrimitive, TestContext};

fn count(events: &[(&'static str, u64)], name: &str) -> u64 {
    events
        .iter()
        .find(|(event, _)| *event == name)
        .map(|(_, calls)| *calls)
        .unwrap_or(0)
}

#[test]
fn plan_cache_and_autotune_events_are_counted() -> anyhow::Result<()> {
    let _ = profiling::take_cache_events();
    let search = Arc::new(CountingSearch::returning(AutotuneResult {
        algorithm_id: 1,
        tensor_ops_enabled: false,
        scratch_bytes: 4096,
    }));
    let runtime = ConvRuntime::new(
        Arc::new(RecordingPrimitive::new()),
        Some(search as Arc<dyn AlgorithmSearch>),
        RuntimeOptions::default(),
    );
    let ctx = TestContext::new(1);
    let fixture = ConvFixture::new(Algorithm::Auto);

    for _ in 0..3 {
        runtime.conv(&ctx.context, fixture.forward(1))?;
    }

    let events = profiling::take_cache_events();
    assert_eq!(count(&events, "convrt.plan_cache.miss"), 1);
    assert_eq!(count(&events, "convrt.plan_cache.hit"), 2);
    assert_eq!(count(&events, "convrt.autotune.run"), 1);
    assert_eq!(count(&events, "convrt.scratch.grow"), 3);
    assert!(profiling::take_cache_events().is_empty());

    let scopes = profiling::take_scope_stats();
    assert!(scopes.iter().any(|(name, stat)| *name == "convrt.execute" && stat.calls == 3));
    Ok(())
}
