//! Names under which the host runtime binds the convolution call shapes.

use crate::attrs::FusionAttrs;
use crate::descriptor::ConvKind;
use crate::error::{BindingGroup, ConvError, ConvResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvTarget {
    Forward,
    BackwardInput,
    BackwardFilter,
    ForwardFused,
    ForwardFusedSideInput,
    ForwardGraph,
}

const ALL_TARGETS: [ConvTarget; 6] = [
    ConvTarget::Forward,
    ConvTarget::BackwardInput,
    ConvTarget::BackwardFilter,
    ConvTarget::ForwardFused,
    ConvTarget::ForwardFusedSideInput,
    ConvTarget::ForwardGraph,
];

impl ConvTarget {
    pub fn all() -> &'static [ConvTarget] {
        &ALL_TARGETS
    }

    pub fn name(self) -> &'static str {
        match self {
            ConvTarget::Forward => "gpu.conv.forward",
            ConvTarget::BackwardInput => "gpu.conv.backward.input",
            ConvTarget::BackwardFilter => "gpu.conv.backward.filter",
            ConvTarget::ForwardFused => "gpu.conv.forward.fused",
            ConvTarget::ForwardFusedSideInput => "gpu.conv.forward.fused.side_input",
            ConvTarget::ForwardGraph => "gpu.conv.forward.graph",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_TARGETS.iter().copied().find(|target| target.name() == name)
    }

    pub fn kind(self) -> ConvKind {
        match self {
            ConvTarget::Forward => ConvKind::Forward,
            ConvTarget::BackwardInput => ConvKind::BackwardInput,
            ConvTarget::BackwardFilter => ConvKind::BackwardFilter,
            ConvTarget::ForwardFused | ConvTarget::ForwardFusedSideInput => {
                ConvKind::ForwardActivation
            }
            ConvTarget::ForwardGraph => ConvKind::ForwardGraph,
        }
    }

    pub fn has_bias(self) -> bool {
        matches!(
            self,
            ConvTarget::ForwardFused | ConvTarget::ForwardFusedSideInput
        )
    }

    pub fn has_side_input(self) -> bool {
        self == ConvTarget::ForwardFusedSideInput
    }

    /// Whether the call carries a variable-arity argument list.
    pub fn is_graph(self) -> bool {
        self == ConvTarget::ForwardGraph
    }

    /// Keeps the fusion attributes this target binds and drops the rest.
    ///
    /// `gpu.conv.forward.fused` requires an activation mode and a leaky-ReLU slope,
    /// `gpu.conv.forward.fused.side_input` an activation mode and a side-input scale.
    pub fn fusion_attrs(self, fusion: FusionAttrs) -> ConvResult<FusionAttrs> {
        let (side_input_scale, leakyrelu_alpha) = match self {
            ConvTarget::ForwardFused => (false, true),
            ConvTarget::ForwardFusedSideInput => (true, false),
            _ => return Ok(FusionAttrs::default()),
        };
        let require = |present: bool, attr: &str| {
            if present {
                Ok(())
            } else {
                Err(ConvError::binding(
                    BindingGroup::Attribute,
                    format!("{} requires the `{attr}` attribute", self.name()),
                ))
            }
        };
        require(fusion.activation_mode.is_some(), "activation_mode")?;
        if side_input_scale {
            require(fusion.side_input_scale.is_some(), "side_input_scale")?;
        }
        if leakyrelu_alpha {
            require(fusion.leakyrelu_alpha.is_some(), "leakyrelu_alpha")?;
        }
        Ok(FusionAttrs {
            activation_mode: fusion.activation_mode,
            side_input_scale: fusion.side_input_scale.filter(|_| side_input_scale),
            leakyrelu_alpha: fusion.leakyrelu_alpha.filter(|_| leakyrelu_alpha),
        })
    }
}
