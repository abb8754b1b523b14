pub mod fixtures;
pub mod recording;
pub mod smoke;

pub use fixtures::{ConvFixture, GraphFixture, TestContext};
pub use recording::{
    CountingSearch, FakeStream, RecordedLaunch, RecordingAllocator, RecordingPrimitive,
};

/// Runs the shared smoke suite against a convolution primitive.
///
/// `$primitive_ctor` must evaluate to a closure returning `Arc<dyn ConvPrimitive>`.
#[macro_export]
macro_rules! define_runtime_tests {
    ($module:ident, $primitive_ctor:expr) => {
        #[cfg(test)]
        mod $module {
            #[allow(unused_imports)]
            use super::*;
            use $crate::smoke;

            #[test]
            fn smoke_pinned_forward_runs() {
                smoke::pinned_forward_runs(($primitive_ctor)());
            }

            #[test]
            fn smoke_every_fixed_target_runs() {
                smoke::every_fixed_target_runs(($primitive_ctor)());
            }

            #[test]
            fn smoke_auto_forward_tunes_once() {
                smoke::auto_forward_tunes_once(($primitive_ctor)());
            }

            #[test]
            fn smoke_auto_without_search_is_rejected() {
                smoke::auto_without_search_is_rejected(($primitive_ctor)());
            }

            #[test]
            fn smoke_graph_forward_runs() {
                smoke::graph_forward_runs(($primitive_ctor)());
            }
        }
    };
}
