//! Element types and physically laid-out shapes for convolution operands.

use serde::{Deserialize, Serialize};

/// Scalar element types a convolution buffer may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Si8,
    Ui8,
    Si32,
    Bf16,
    F16,
    F32,
    F64,
}

impl DType {
    /// Returns the storage size in bytes of one element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Si8 | DType::Ui8 => 1,
            DType::Bf16 | DType::F16 => 2,
            DType::Si32 | DType::F32 => 4,
            DType::F64 => 8,
        }
    }
}

/// Dense layout expressed as a minor-to-major permutation of the logical axes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout {
    minor_to_major: Vec<i64>,
}

impl Layout {
    pub fn new(minor_to_major: impl Into<Vec<i64>>) -> Self {
        Self {
            minor_to_major: minor_to_major.into(),
        }
    }

    /// Row-major layout for the given rank: the last logical axis is the most minor.
    pub fn row_major(rank: usize) -> Self {
        Self {
            minor_to_major: (0..rank as i64).rev().collect(),
        }
    }

    pub fn minor_to_major(&self) -> &[i64] {
        &self.minor_to_major
    }
}

/// Logical dimensions, element type and physical layout of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dtype: DType,
    dims: Vec<i64>,
    layout: Layout,
}

impl Shape {
    /// Builds a shape whose dense layout follows `minor_to_major`.
    ///
    /// The permutation is taken as given; a mismatch with the rank is a caller contract violation.
    pub fn with_dense_layout(
        dtype: DType,
        dims: impl Into<Vec<i64>>,
        minor_to_major: &[i64],
    ) -> Self {
        Self {
            dtype,
            dims: dims.into(),
            layout: Layout::new(minor_to_major),
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Extent of logical axis `axis`, or `None` when the axis is out of range.
    pub fn dim(&self, axis: i64) -> Option<i64> {
        usize::try_from(axis)
            .ok()
            .and_then(|axis| self.dims.get(axis).copied())
    }
}
