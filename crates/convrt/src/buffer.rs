//! Device buffer views handed to a convolution call.

use crate::shape::DType;

/// Untyped device address range, the unit bound into a convolution launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceMemory {
    ptr: u64,
    size: u64,
}

impl DeviceMemory {
    pub fn new(ptr: u64, size: u64) -> Self {
        Self { ptr, size }
    }

    pub fn device_ptr(&self) -> u64 {
        self.ptr
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_null(&self) -> bool {
        self.ptr == 0
    }
}

/// Typed, strided view over a device buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StridedBuffer {
    pub dtype: DType,
    pub dims: Vec<i64>,
    pub strides: Vec<i64>,
    pub address: u64,
}

impl StridedBuffer {
    /// Row-major contiguous view of `dims` at `address`.
    pub fn contiguous(dtype: DType, dims: impl Into<Vec<i64>>, address: u64) -> Self {
        let dims = dims.into();
        let mut strides = vec![1i64; dims.len()];
        for axis in (0..dims.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1].saturating_mul(dims[axis + 1]);
        }
        Self {
            dtype,
            dims,
            strides,
            address,
        }
    }

    /// Byte extent of the dense shape, saturating on overflow; negative dims count as zero.
    pub fn size_in_bytes(&self) -> u64 {
        self.dims
            .iter()
            .map(|&dim| u64::try_from(dim).unwrap_or(0))
            .fold(self.dtype.size_in_bytes() as u64, u64::saturating_mul)
    }

    pub fn device_memory(&self) -> DeviceMemory {
        DeviceMemory::new(self.address, self.size_in_bytes())
    }
}

/// Untyped flat view over a device buffer (bias vectors, scratch space).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatBuffer {
    pub size_in_bytes: u64,
    pub address: u64,
}

impl FlatBuffer {
    pub fn new(address: u64, size_in_bytes: u64) -> Self {
        Self {
            size_in_bytes,
            address,
        }
    }

    pub fn device_memory(&self) -> DeviceMemory {
        DeviceMemory::new(self.address, self.size_in_bytes)
    }
}

/// One entry of the variable-arity argument list of a graph convolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Strided(StridedBuffer),
    Flat(FlatBuffer),
}

impl CallArg {
    /// Strided view of the argument; flat buffers carry no shape and do not qualify.
    pub fn as_strided(&self) -> Option<&StridedBuffer> {
        match self {
            CallArg::Strided(view) => Some(view),
            CallArg::Flat(_) => None,
        }
    }

    /// Flat view of the argument; every buffer can be viewed as flat bytes.
    pub fn as_flat(&self) -> FlatBuffer {
        match self {
            CallArg::Strided(view) => FlatBuffer::new(view.address, view.size_in_bytes()),
            CallArg::Flat(flat) => *flat,
        }
    }
}

impl From<StridedBuffer> for CallArg {
    fn from(value: StridedBuffer) -> Self {
        CallArg::Strided(value)
    }
}

impl From<FlatBuffer> for CallArg {
    fn from(value: FlatBuffer) -> Self {
        CallArg::Flat(value)
    }
}
