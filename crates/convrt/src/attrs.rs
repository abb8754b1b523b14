//! Decoded convolution attributes as they arrive from the host compiler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shape::Layout;

/// Algorithm id handed to the primitive whenever the caller asked for runtime selection.
pub const DEFAULT_ALGORITHM_ID: i64 = 0;

/// Raw algorithm id the compiler emits to request runtime autotuning.
pub const AUTO_ALGORITHM_ID: i64 = -1;

/// Batch, feature and spatial axis assignment for the input, kernel and output tensors.
///
/// The three spatial lists always have the same length, the rank of the convolution window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvDimensionNumbers {
    pub input_batch_dim: i64,
    pub input_feature_dim: i64,
    pub input_spatial_dims: Vec<i64>,

    pub kernel_in_feature_dim: i64,
    pub kernel_out_feature_dim: i64,
    pub kernel_spatial_dims: Vec<i64>,

    pub output_batch_dim: i64,
    pub output_feature_dim: i64,
    pub output_spatial_dims: Vec<i64>,
}

impl ConvDimensionNumbers {
    /// NCHW input, OIHW kernel and NCHW output for a window of rank `spatial_rank`.
    pub fn nchw(spatial_rank: usize) -> Self {
        let spatial = (2..2 + spatial_rank as i64).collect::<Vec<_>>();
        Self {
            input_batch_dim: 0,
            input_feature_dim: 1,
            input_spatial_dims: spatial.clone(),
            kernel_in_feature_dim: 1,
            kernel_out_feature_dim: 0,
            kernel_spatial_dims: spatial.clone(),
            output_batch_dim: 0,
            output_feature_dim: 1,
            output_spatial_dims: spatial,
        }
    }
}

/// Per-spatial-dimension window parameters; padding is symmetric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowAttrs {
    pub strides: Vec<i64>,
    pub padding: Vec<i64>,
    pub lhs_dilation: Vec<i64>,
    pub rhs_dilation: Vec<i64>,
    pub reversal: Vec<bool>,
}

impl WindowAttrs {
    /// Unit stride, zero padding, no dilation and no reversal.
    pub fn identity(rank: usize) -> Self {
        Self {
            strides: vec![1; rank],
            padding: vec![0; rank],
            lhs_dilation: vec![1; rank],
            rhs_dilation: vec![1; rank],
            reversal: vec![false; rank],
        }
    }

    pub fn rank(&self) -> usize {
        self.strides.len()
    }
}

/// Convolution algorithm requested by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Pick an algorithm by runtime autotuning on first use.
    Auto,
    Fixed(i64),
}

impl Algorithm {
    /// Maps the compiler's integer encoding, where `-1` requests autotuning.
    pub fn from_raw(id: i64) -> Self {
        match id {
            AUTO_ALGORITHM_ID => Algorithm::Auto,
            id => Algorithm::Fixed(id),
        }
    }

    pub fn is_auto(self) -> bool {
        matches!(self, Algorithm::Auto)
    }

    /// Concrete id, with `Auto` replaced by [`DEFAULT_ALGORITHM_ID`].
    pub fn pinned_id(self) -> i64 {
        match self {
            Algorithm::Auto => DEFAULT_ALGORITHM_ID,
            Algorithm::Fixed(id) => id,
        }
    }
}

/// Backend configuration attached to a convolution by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub algorithm: Algorithm,
    pub tensor_ops_enabled: bool,
    pub is_graph_frontend: bool,
    pub is_reordered_int8: bool,
    pub tuning_knobs: BTreeMap<i64, i64>,
    pub operand_0_layout: Vec<i64>,
    pub operand_1_layout: Vec<i64>,
    pub result_layout: Vec<i64>,
    /// Negative values leave the workspace budget to the algorithm choice.
    pub workspace_size: i64,
}

impl BackendConfig {
    /// Config with row-major layouts for rank-`rank` operands and no explicit workspace.
    pub fn row_major(algorithm: Algorithm, rank: usize) -> Self {
        let layout = Layout::row_major(rank).minor_to_major().to_vec();
        Self {
            algorithm,
            tensor_ops_enabled: false,
            is_graph_frontend: false,
            is_reordered_int8: false,
            tuning_knobs: BTreeMap::new(),
            operand_0_layout: layout.clone(),
            operand_1_layout: layout.clone(),
            result_layout: layout,
            workspace_size: -1,
        }
    }

    /// Builds the knob map from the compiler's parallel id/value lists.
    ///
    /// Later duplicates overwrite earlier ones; trailing entries without a partner are ignored.
    pub fn with_knobs(mut self, ids: &[i64], values: &[i64]) -> Self {
        self.tuning_knobs = ids.iter().copied().zip(values.iter().copied()).collect();
        self
    }
}

/// Activation applied by fused convolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActivationMode {
    #[default]
    None,
    Sigmoid,
    Relu,
    Relu6,
    ReluX,
    Tanh,
    BandPass,
    Elu,
    LeakyRelu,
    GeluExact,
}

/// Attributes shared by every convolution call shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvAttrs {
    pub dimension_numbers: ConvDimensionNumbers,
    pub window: WindowAttrs,
    pub backend_config: BackendConfig,
    pub feature_group_count: i64,
    pub result_scale: f64,
}

/// Optional attributes of the fused call shapes; `None` leaves the backend default untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FusionAttrs {
    pub activation_mode: Option<ActivationMode>,
    pub side_input_scale: Option<f64>,
    pub leakyrelu_alpha: Option<f64>,
}
