use std::sync::Arc;

use convrt::ConvPrimitive;
use convrt_backend_tests::{define_runtime_tests, RecordingPrimitive};

define_runtime_tests!(recording_primitive, || -> Arc<dyn ConvPrimitive> {
    Arc::new(RecordingPrimitive::new())
});
