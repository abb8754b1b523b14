//! Canonical convolution descriptors built from decoded attributes and buffer metadata.
//!
//! Building a descriptor is a pure function of its inputs: no caching, no device access.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attrs::{
    ActivationMode, Algorithm, BackendConfig, ConvAttrs, ConvDimensionNumbers, FusionAttrs,
    WindowAttrs,
};
use crate::buffer::StridedBuffer;
use crate::error::{ConvError, ConvResult};
use crate::shape::Shape;

/// Closed set of convolution kinds the runtime dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConvKind {
    Forward,
    BackwardInput,
    BackwardFilter,
    ForwardActivation,
    ForwardGraph,
}

impl ConvKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvKind::Forward => "forward",
            ConvKind::BackwardInput => "backward_input",
            ConvKind::BackwardFilter => "backward_filter",
            ConvKind::ForwardActivation => "forward_activation",
            ConvKind::ForwardGraph => "forward_graph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MathType {
    #[default]
    Default,
    TensorOp,
}

/// One spatial dimension of the convolution window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowDimension {
    pub size: i64,
    pub stride: i64,
    pub padding_low: i64,
    pub padding_high: i64,
    pub base_dilation: i64,
    pub window_dilation: i64,
    pub window_reversal: bool,
}

/// Algorithm choice plus the knobs the primitive needs to instantiate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmDesc {
    pub algorithm: Algorithm,
    pub math_type: MathType,
    pub is_graph_frontend: bool,
    pub tuning_knobs: BTreeMap<i64, i64>,
    pub workspace_size: Option<u64>,
}

impl AlgorithmDesc {
    /// Algorithm picked by autotuning: knobs and workspace come from the search, not the compiler.
    pub fn tuned(id: i64, tensor_ops_enabled: bool) -> Self {
        Self {
            algorithm: Algorithm::Fixed(id),
            math_type: if tensor_ops_enabled {
                MathType::TensorOp
            } else {
                MathType::Default
            },
            is_graph_frontend: false,
            tuning_knobs: BTreeMap::new(),
            workspace_size: None,
        }
    }

    /// Copy with `Auto` replaced by the default algorithm id.
    pub fn pinned(&self) -> Self {
        let mut pinned = self.clone();
        pinned.algorithm = Algorithm::Fixed(self.algorithm.pinned_id());
        pinned
    }

    pub fn id(&self) -> Option<i64> {
        match self.algorithm {
            Algorithm::Auto => None,
            Algorithm::Fixed(id) => Some(id),
        }
    }

    pub fn tensor_ops_enabled(&self) -> bool {
        self.math_type == MathType::TensorOp
    }
}

/// Backend-specific half of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvBackendDescriptor {
    pub conv_result_scale: f64,
    pub reordered_int8_nchw_vect: bool,
    pub algorithm: AlgorithmDesc,
    pub activation_mode: ActivationMode,
    pub side_input_scale: f64,
    pub leakyrelu_alpha: f64,
    pub serialized_graph: Option<String>,
}

/// Fully resolved convolution consumed by the primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvDescriptor {
    pub kind: ConvKind,
    pub operand0_shape: Shape,
    pub operand1_shape: Shape,
    pub result_shape: Shape,
    pub dnums: ConvDimensionNumbers,
    pub window: Vec<WindowDimension>,
    pub scratch_size: u64,
    pub feature_group_count: i64,
    pub backend_config: ConvBackendDescriptor,
}

impl ConvDescriptor {
    /// Copy whose algorithm never carries `Auto`, safe to hand to the primitive.
    pub fn pinned(&self) -> Self {
        let mut pinned = self.clone();
        pinned.backend_config.algorithm = self.backend_config.algorithm.pinned();
        pinned
    }

    pub fn requires_autotuning(&self) -> bool {
        self.backend_config.algorithm.algorithm.is_auto()
    }

    pub fn to_json(&self) -> ConvResult<String> {
        serde_json::to_string(self)
            .map_err(|err| ConvError::build(format!("failed to serialize descriptor: {err}")))
    }
}

/// Everything the builder reads for one call.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorInputs<'a> {
    pub kind: ConvKind,
    pub operand0: &'a StridedBuffer,
    pub operand1: &'a StridedBuffer,
    pub output: &'a StridedBuffer,
    pub scratch_size: u64,
    pub attrs: &'a ConvAttrs,
    pub fusion: FusionAttrs,
    pub serialized_graph: Option<&'a str>,
}

/// Builds the canonical descriptor for one convolution.
///
/// Fails only when the kernel spatial dimensions name an axis outside operand 0.
pub fn build_descriptor(inputs: DescriptorInputs<'_>) -> ConvResult<ConvDescriptor> {
    let DescriptorInputs {
        kind,
        operand0,
        operand1,
        output,
        scratch_size,
        attrs,
        fusion,
        serialized_graph,
    } = inputs;
    let config = &attrs.backend_config;

    let operand0_shape = apply_layout(operand0, &config.operand_0_layout);
    let operand1_shape = apply_layout(operand1, &config.operand_1_layout);
    let result_shape = apply_layout(output, &config.result_layout);

    let window = build_window(&attrs.dimension_numbers, &attrs.window, &operand0_shape)?;

    Ok(ConvDescriptor {
        kind,
        operand0_shape,
        operand1_shape,
        result_shape,
        dnums: attrs.dimension_numbers.clone(),
        window,
        scratch_size,
        feature_group_count: attrs.feature_group_count,
        backend_config: ConvBackendDescriptor {
            conv_result_scale: attrs.result_scale,
            reordered_int8_nchw_vect: config.is_reordered_int8,
            algorithm: algorithm_desc(config),
            activation_mode: fusion.activation_mode.unwrap_or_default(),
            side_input_scale: fusion.side_input_scale.unwrap_or_default(),
            leakyrelu_alpha: fusion.leakyrelu_alpha.unwrap_or_default(),
            serialized_graph: serialized_graph.map(str::to_string),
        },
    })
}

fn apply_layout(buffer: &StridedBuffer, minor_to_major: &[i64]) -> Shape {
    Shape::with_dense_layout(buffer.dtype, buffer.dims.clone(), minor_to_major)
}

// Window size equals the kernel extent, read from operand 0 at the kernel spatial axes.
fn build_window(
    dnums: &ConvDimensionNumbers,
    window: &WindowAttrs,
    operand0_shape: &Shape,
) -> ConvResult<Vec<WindowDimension>> {
    (0..window.rank())
        .map(|index| {
            let kernel_dim = dnums.kernel_spatial_dims[index];
            let size = operand0_shape.dim(kernel_dim).ok_or_else(|| {
                ConvError::build(format!(
                    "kernel spatial dimension {kernel_dim} is out of range for operand of rank {}",
                    operand0_shape.rank()
                ))
            })?;
            Ok(WindowDimension {
                size,
                stride: window.strides[index],
                padding_low: window.padding[index],
                padding_high: window.padding[index],
                base_dilation: window.lhs_dilation[index],
                window_dilation: window.rhs_dilation[index],
                window_reversal: window.reversal[index],
            })
        })
        .collect()
}

fn algorithm_desc(config: &BackendConfig) -> AlgorithmDesc {
    AlgorithmDesc {
        algorithm: config.algorithm,
        math_type: if config.tensor_ops_enabled {
            MathType::TensorOp
        } else {
            MathType::Default
        },
        is_graph_frontend: config.is_graph_frontend,
        tuning_knobs: config.tuning_knobs.clone(),
        workspace_size: u64::try_from(config.workspace_size).ok(),
    }
}
