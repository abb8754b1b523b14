use std::ffi::c_void;
use std::fmt;
use std::sync::{Arc, OnceLock};

use convrt::{ConvError, ConvResult, DeviceAllocation, DeviceAllocator, DeviceMemory, DeviceStream};
use libloading::Library;

type CUresult = i32;
type CUdevice = i32;
type CUcontext = *mut c_void;
type CUdeviceptr = u64;
type CUstream = *mut c_void;

const CUDA_SUCCESS: CUresult = 0;
const CUDA_ERROR_NOT_READY: CUresult = 600;
const CU_STREAM_NON_BLOCKING: u32 = 0x1;

type CuInitFn = unsafe extern "C" fn(flags: u32) -> CUresult;
type CuDeviceGetFn = unsafe extern "C" fn(device: *mut CUdevice, ordinal: i32) -> CUresult;
type CuCtxCreateV2Fn =
    unsafe extern "C" fn(ctx: *mut CUcontext, flags: u32, dev: CUdevice) -> CUresult;
type CuCtxDestroyV2Fn = unsafe extern "C" fn(ctx: CUcontext) -> CUresult;
type CuCtxSetCurrentFn = unsafe extern "C" fn(ctx: CUcontext) -> CUresult;
type CuMemAllocV2Fn = unsafe extern "C" fn(dptr: *mut CUdeviceptr, bytesize: usize) -> CUresult;
type CuMemFreeV2Fn = unsafe extern "C" fn(dptr: CUdeviceptr) -> CUresult;
type CuStreamCreateFn = unsafe extern "C" fn(stream: *mut CUstream, flags: u32) -> CUresult;
type CuStreamDestroyV2Fn = unsafe extern "C" fn(stream: CUstream) -> CUresult;
type CuStreamQueryFn = unsafe extern "C" fn(stream: CUstream) -> CUresult;

struct DriverFns {
    cu_init: CuInitFn,
    cu_device_get: CuDeviceGetFn,
    cu_ctx_create_v2: CuCtxCreateV2Fn,
    cu_ctx_destroy_v2: CuCtxDestroyV2Fn,
    cu_ctx_set_current: CuCtxSetCurrentFn,
    cu_mem_alloc_v2: CuMemAllocV2Fn,
    cu_mem_free_v2: CuMemFreeV2Fn,
    cu_stream_create: CuStreamCreateFn,
    cu_stream_destroy_v2: CuStreamDestroyV2Fn,
    cu_stream_query: CuStreamQueryFn,
}

/// Dynamically loaded CUDA driver, initialized once per process.
pub struct CudaDriver {
    _lib: Library,
    fns: DriverFns,
}

static CUDA_DRIVER: OnceLock<Result<Arc<CudaDriver>, String>> = OnceLock::new();

pub fn is_available() -> bool {
    driver().is_ok()
}

pub fn driver() -> ConvResult<Arc<CudaDriver>> {
    let init = CUDA_DRIVER.get_or_init(|| match CudaDriver::new() {
        Ok(driver) => Ok(Arc::new(driver)),
        Err(err) => Err(err.to_string()),
    });
    match init {
        Ok(driver) => Ok(Arc::clone(driver)),
        Err(msg) => Err(ConvError::execution(format!(
            "CUDA driver unavailable for convolution runtime: {msg}"
        ))),
    }
}

impl CudaDriver {
    fn new() -> ConvResult<Self> {
        let lib = load_cuda_library()?;
        let fns = DriverFns {
            cu_init: load_symbol(&lib, b"cuInit\0")?,
            cu_device_get: load_symbol(&lib, b"cuDeviceGet\0")?,
            cu_ctx_create_v2: load_symbol(&lib, b"cuCtxCreate_v2\0")?,
            cu_ctx_destroy_v2: load_symbol(&lib, b"cuCtxDestroy_v2\0")?,
            cu_ctx_set_current: load_symbol(&lib, b"cuCtxSetCurrent\0")?,
            cu_mem_alloc_v2: load_symbol(&lib, b"cuMemAlloc_v2\0")?,
            cu_mem_free_v2: load_symbol(&lib, b"cuMemFree_v2\0")?,
            cu_stream_create: load_symbol(&lib, b"cuStreamCreate\0")?,
            cu_stream_destroy_v2: load_symbol(&lib, b"cuStreamDestroy_v2\0")?,
            cu_stream_query: load_symbol(&lib, b"cuStreamQuery\0")?,
        };

        // SAFETY: cuInit takes no pointers and must precede every other driver call.
        unsafe {
            check_cuda((fns.cu_init)(0), "cuInit")?;
        }
        Ok(Self { _lib: lib, fns })
    }
}

/// Driver context bound to one device ordinal.
pub struct CudaDevice {
    driver: Arc<CudaDriver>,
    ordinal: usize,
    // Stored as usize so the device can be shared across threads.
    ctx: usize,
}

impl CudaDevice {
    pub fn open(ordinal: usize) -> ConvResult<Arc<Self>> {
        let driver = driver()?;
        let raw_ordinal = i32::try_from(ordinal)
            .map_err(|_| ConvError::execution(format!("device ordinal {ordinal} out of range")))?;
        // SAFETY: Out pointers are valid locals; the context is owned by the returned device.
        let ctx = unsafe {
            let mut dev: CUdevice = 0;
            check_cuda(
                (driver.fns.cu_device_get)(&mut dev as *mut CUdevice, raw_ordinal),
                "cuDeviceGet",
            )?;
            let mut ctx: CUcontext = std::ptr::null_mut();
            check_cuda(
                (driver.fns.cu_ctx_create_v2)(&mut ctx as *mut CUcontext, 0, dev),
                "cuCtxCreate_v2",
            )?;
            ctx
        };
        log::debug!("opened CUDA context {:#x} on device {ordinal}", ctx as usize);
        Ok(Arc::new(Self {
            driver,
            ordinal,
            ctx: ctx as usize,
        }))
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Raw context handle, stable for the lifetime of the device.
    pub fn context_handle(&self) -> u64 {
        self.ctx as u64
    }

    pub fn ensure_current(&self) -> ConvResult<()> {
        // SAFETY: Context was created by this device and remains valid until drop.
        unsafe {
            check_cuda(
                (self.driver.fns.cu_ctx_set_current)(self.ctx_ptr()),
                "cuCtxSetCurrent",
            )
        }
    }

    fn ctx_ptr(&self) -> CUcontext {
        self.ctx as CUcontext
    }
}

impl Drop for CudaDevice {
    fn drop(&mut self) {
        if self.ctx != 0 {
            // SAFETY: Context is owned by this device and destroyed once on drop.
            let _ = unsafe { (self.driver.fns.cu_ctx_destroy_v2)(self.ctx_ptr()) };
            self.ctx = 0;
        }
    }
}

impl fmt::Debug for CudaDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaDevice")
            .field("ordinal", &self.ordinal)
            .field("ctx", &self.ctx)
            .finish()
    }
}

/// Device allocation released with `cuMemFree` on drop.
pub struct CudaAllocation {
    device: Arc<CudaDevice>,
    ptr: CUdeviceptr,
    bytes: u64,
}

impl DeviceAllocation for CudaAllocation {
    fn memory(&self) -> DeviceMemory {
        DeviceMemory::new(self.ptr, self.bytes)
    }
}

impl Drop for CudaAllocation {
    fn drop(&mut self) {
        if self.device.ensure_current().is_ok() {
            // SAFETY: Device pointer was allocated in this context and is released once on drop.
            let _ = unsafe { (self.device.driver.fns.cu_mem_free_v2)(self.ptr) };
        }
    }
}

/// Scratch allocator over `cuMemAlloc` for a single device.
#[derive(Debug, Clone)]
pub struct CudaAllocator {
    device: Arc<CudaDevice>,
}

impl CudaAllocator {
    pub fn new(device: Arc<CudaDevice>) -> Self {
        Self { device }
    }
}

impl DeviceAllocator for CudaAllocator {
    fn allocate(&self, device_ordinal: usize, bytes: u64) -> ConvResult<Box<dyn DeviceAllocation>> {
        if device_ordinal != self.device.ordinal {
            return Err(ConvError::allocation(
                device_ordinal,
                bytes,
                format!("allocator is bound to device {}", self.device.ordinal),
            ));
        }
        let size = usize::try_from(bytes)
            .map_err(|_| ConvError::allocation(device_ordinal, bytes, "size exceeds host usize"))?;
        self.device
            .ensure_current()
            .map_err(|err| ConvError::allocation(device_ordinal, bytes, err.to_string()))?;

        let mut ptr: CUdeviceptr = 0;
        // SAFETY: `ptr` is a valid out pointer for CUDA allocation.
        let code = unsafe {
            (self.device.driver.fns.cu_mem_alloc_v2)(&mut ptr as *mut CUdeviceptr, size)
        };
        if code != CUDA_SUCCESS {
            return Err(ConvError::allocation(
                device_ordinal,
                bytes,
                format!("cuMemAlloc_v2 failed with code {code}"),
            ));
        }
        log::trace!("cuMemAlloc {bytes} bytes at {ptr:#x} on device {device_ordinal}");
        Ok(Box::new(CudaAllocation {
            device: Arc::clone(&self.device),
            ptr,
            bytes,
        }))
    }
}

/// Non-blocking driver stream.
pub struct CudaStream {
    device: Arc<CudaDevice>,
    stream: usize,
}

impl CudaStream {
    pub fn new(device: Arc<CudaDevice>) -> ConvResult<Self> {
        device.ensure_current()?;
        let mut stream: CUstream = std::ptr::null_mut();
        // SAFETY: `stream` is a valid out pointer; the context is current.
        unsafe {
            check_cuda(
                (device.driver.fns.cu_stream_create)(
                    &mut stream as *mut CUstream,
                    CU_STREAM_NON_BLOCKING,
                ),
                "cuStreamCreate",
            )?;
        }
        Ok(Self {
            device,
            stream: stream as usize,
        })
    }

    /// Raw stream handle for primitives that enqueue work on it.
    pub fn handle(&self) -> *mut c_void {
        self.stream as CUstream
    }
}

impl DeviceStream for CudaStream {
    fn status(&self) -> ConvResult<()> {
        self.device.ensure_current()?;
        // SAFETY: Stream was created by this device and remains valid until drop.
        let code = unsafe { (self.device.driver.fns.cu_stream_query)(self.handle()) };
        stream_health(code)
    }
}

impl Drop for CudaStream {
    fn drop(&mut self) {
        if self.stream != 0 && self.device.ensure_current().is_ok() {
            // SAFETY: Stream is owned by this handle and destroyed once on drop.
            let _ = unsafe { (self.device.driver.fns.cu_stream_destroy_v2)(self.handle()) };
            self.stream = 0;
        }
    }
}

/// Pending work is healthy; any other non-success code means the stream is poisoned.
pub(crate) fn stream_health(code: CUresult) -> ConvResult<()> {
    match code {
        CUDA_SUCCESS | CUDA_ERROR_NOT_READY => Ok(()),
        code => Err(ConvError::execution(format!(
            "cuStreamQuery reported error code {code}"
        ))),
    }
}

fn load_cuda_library() -> ConvResult<Library> {
    let candidates = ["libcuda.so.1", "libcuda.so", "nvcuda.dll", "libcuda.dylib"];

    for candidate in candidates {
        // SAFETY: Loading the library only; no symbols are invoked at this stage.
        if let Ok(lib) = unsafe { Library::new(candidate) } {
            return Ok(lib);
        }
    }

    Err(ConvError::execution(
        "failed to load CUDA driver library (tried libcuda.so.1, libcuda.so, nvcuda.dll, libcuda.dylib)",
    ))
}

fn load_symbol<T: Copy>(lib: &Library, name: &'static [u8]) -> ConvResult<T> {
    // SAFETY: Caller provides expected symbol type from CUDA driver API.
    let sym = unsafe { lib.get::<T>(name) }.map_err(|err| {
        ConvError::execution(format!(
            "failed to resolve CUDA symbol {}: {err}",
            String::from_utf8_lossy(name)
        ))
    })?;
    Ok(*sym)
}

fn check_cuda(code: CUresult, op: &str) -> ConvResult<()> {
    if code == CUDA_SUCCESS {
        Ok(())
    } else {
        Err(ConvError::execution(format!(
            "CUDA driver call {op} failed with code {code}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use convrt::ErrorKind;

    use super::*;

    #[test]
    fn not_ready_streams_are_healthy() {
        assert!(stream_health(CUDA_SUCCESS).is_ok());
        assert!(stream_health(CUDA_ERROR_NOT_READY).is_ok());
    }

    #[test]
    fn other_stream_codes_are_execution_errors() {
        // 700: CUDA_ERROR_ILLEGAL_ADDRESS left behind by an earlier kernel.
        let err = stream_health(700).expect_err("illegal address poisons the stream");
        assert_eq!(err.kind(), ErrorKind::Execution);
    }
}
