use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use convrt::{
    AlgorithmDesc, AlgorithmSearch, AutotuneResult, ConvDescriptor, ConvError, ConvLaunch,
    ConvPrimitive, ConvResult, DebugOptions, DeviceAllocation, DeviceAllocator, DeviceMemory,
    DeviceStream, PreparedConv, SearchRequest,
};

/// One launch observed by [`RecordingPrimitive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLaunch {
    pub algorithm: AlgorithmDesc,
    pub operands: Vec<DeviceMemory>,
    pub results: Vec<DeviceMemory>,
    pub scratch: DeviceMemory,
}

#[derive(Default)]
struct PrimitiveLog {
    prepared: Mutex<Vec<ConvDescriptor>>,
    launches: Mutex<Vec<RecordedLaunch>>,
    fail_prepare: AtomicBool,
    fail_run: AtomicBool,
    prepare_delay_ms: AtomicU64,
}

/// Test-only convolution primitive that records every prepare and launch.
#[derive(Default, Clone)]
pub struct RecordingPrimitive {
    log: Arc<PrimitiveLog>,
}

impl RecordingPrimitive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_prepare(&self, fail: bool) {
        self.log.fail_prepare.store(fail, Ordering::SeqCst);
    }

    pub fn fail_run(&self, fail: bool) {
        self.log.fail_run.store(fail, Ordering::SeqCst);
    }

    /// Slows every prepare down so concurrent first calls overlap.
    pub fn set_prepare_delay(&self, delay: Duration) {
        self.log
            .prepare_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn prepare_count(&self) -> usize {
        self.prepared_descriptors().len()
    }

    pub fn prepared_descriptors(&self) -> Vec<ConvDescriptor> {
        self.log
            .prepared
            .lock()
            .expect("primitive mutex poisoned")
            .clone()
    }

    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.log
            .launches
            .lock()
            .expect("primitive mutex poisoned")
            .clone()
    }

    pub fn last_launch_or_panic(&self) -> RecordedLaunch {
        self.launches()
            .pop()
            .expect("primitive should record a launch")
    }
}

impl ConvPrimitive for RecordingPrimitive {
    fn name(&self) -> &str {
        "recording"
    }

    fn prepare(&self, descriptor: &ConvDescriptor) -> ConvResult<Box<dyn PreparedConv>> {
        let delay = self.log.prepare_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        if self.log.fail_prepare.load(Ordering::SeqCst) {
            return Err(ConvError::build("recording primitive rejected the descriptor"));
        }
        self.log
            .prepared
            .lock()
            .expect("primitive mutex poisoned")
            .push(descriptor.clone());
        Ok(Box::new(RecordingPrepared {
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingPrepared {
    log: Arc<PrimitiveLog>,
}

impl PreparedConv for RecordingPrepared {
    fn run(&self, launch: ConvLaunch<'_>) -> ConvResult<()> {
        if self.log.fail_run.load(Ordering::SeqCst) {
            return Err(ConvError::execution("recording primitive failed to launch"));
        }
        self.log
            .launches
            .lock()
            .expect("primitive mutex poisoned")
            .push(RecordedLaunch {
                algorithm: launch.algorithm.clone(),
                operands: launch.operands.to_vec(),
                results: launch.results.to_vec(),
                scratch: launch.scratch,
            });
        Ok(())
    }
}

/// Algorithm search that returns a fixed answer and counts how often it is asked.
pub struct CountingSearch {
    answer: Mutex<Option<AutotuneResult>>,
    calls: AtomicUsize,
    panic_next: AtomicBool,
    delay: Duration,
    seen_algorithms: Mutex<Vec<AlgorithmDesc>>,
    seen_debug: Mutex<Option<DebugOptions>>,
}

impl CountingSearch {
    pub fn returning(answer: AutotuneResult) -> Self {
        Self::with_answer(Some(answer))
    }

    /// Search that never finds a usable candidate.
    pub fn failing() -> Self {
        Self::with_answer(None)
    }

    fn with_answer(answer: Option<AutotuneResult>) -> Self {
        Self {
            answer: Mutex::new(answer),
            calls: AtomicUsize::new(0),
            panic_next: AtomicBool::new(false),
            delay: Duration::ZERO,
            seen_algorithms: Mutex::new(Vec::new()),
            seen_debug: Mutex::new(None),
        }
    }

    /// Holds every search for `delay` so concurrent first calls overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_answer(&self, answer: Option<AutotuneResult>) {
        *self.answer.lock().expect("search mutex poisoned") = answer;
    }

    /// Makes the next search panic instead of answering.
    pub fn panic_on_next_call(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Algorithm of every descriptor handed to the search, in call order.
    pub fn seen_algorithms(&self) -> Vec<AlgorithmDesc> {
        self.seen_algorithms
            .lock()
            .expect("search mutex poisoned")
            .clone()
    }

    pub fn last_debug_options(&self) -> Option<DebugOptions> {
        self.seen_debug.lock().expect("search mutex poisoned").clone()
    }
}

impl AlgorithmSearch for CountingSearch {
    fn pick_best(&self, request: SearchRequest<'_>) -> ConvResult<AutotuneResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("algorithm search crashed");
        }
        self.seen_algorithms
            .lock()
            .expect("search mutex poisoned")
            .push(request.descriptor.backend_config.algorithm.clone());
        *self.seen_debug.lock().expect("search mutex poisoned") = Some(request.debug.clone());
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let answer = *self.answer.lock().expect("search mutex poisoned");
        answer.ok_or_else(|| ConvError::autotune("no usable algorithm candidate"))
    }
}

/// Allocator handing out fake device addresses and recording every request.
pub struct RecordingAllocator {
    requests: Mutex<Vec<(usize, u64)>>,
    next_ptr: AtomicU64,
    live: Arc<AtomicUsize>,
    fail: AtomicBool,
}

impl Default for RecordingAllocator {
    fn default() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            next_ptr: AtomicU64::new(0x1000_0000),
            live: Arc::new(AtomicUsize::new(0)),
            fail: AtomicBool::new(false),
        }
    }
}

impl RecordingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_allocations(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// `(device_ordinal, bytes)` of every request, including failed ones.
    pub fn requests(&self) -> Vec<(usize, u64)> {
        self.requests
            .lock()
            .expect("allocator mutex poisoned")
            .clone()
    }

    /// Allocations handed out and not yet dropped.
    pub fn live_allocations(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl DeviceAllocator for RecordingAllocator {
    fn allocate(&self, device_ordinal: usize, bytes: u64) -> ConvResult<Box<dyn DeviceAllocation>> {
        self.requests
            .lock()
            .expect("allocator mutex poisoned")
            .push((device_ordinal, bytes));
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConvError::allocation(
                device_ordinal,
                bytes,
                "recording allocator is out of memory",
            ));
        }
        let ptr = self.next_ptr.fetch_add(bytes.max(1), Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordedAllocation {
            memory: DeviceMemory::new(ptr, bytes),
            live: Arc::clone(&self.live),
        }))
    }
}

struct RecordedAllocation {
    memory: DeviceMemory,
    live: Arc<AtomicUsize>,
}

impl DeviceAllocation for RecordedAllocation {
    fn memory(&self) -> DeviceMemory {
        self.memory
    }
}

impl Drop for RecordedAllocation {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Stream whose health can be flipped from the test.
#[derive(Default)]
pub struct FakeStream {
    poisoned: AtomicBool,
}

impl FakeStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.poisoned.store(false, Ordering::SeqCst);
    }
}

impl DeviceStream for FakeStream {
    fn status(&self) -> ConvResult<()> {
        if self.poisoned.load(Ordering::SeqCst) {
            Err(ConvError::execution("stream is in an error state"))
        } else {
            Ok(())
        }
    }
}
