use std::collections::HashSet;

use convrt::{ActivationMode, ConvKind, ConvTarget, ErrorKind, FusionAttrs};

#[test]
fn every_target_resolves_by_name() {
    let targets = ConvTarget::all();
    assert_eq!(targets.len(), 6);

    let names = targets.iter().map(|target| target.name()).collect::<HashSet<_>>();
    assert_eq!(names.len(), targets.len(), "target names must be unique");

    for target in targets {
        assert_eq!(ConvTarget::from_name(target.name()), Some(*target));
    }
    assert_eq!(ConvTarget::from_name("gpu.conv.unknown"), None);
}

#[test]
fn targets_map_to_kinds_and_operands() {
    assert_eq!(ConvTarget::Forward.kind(), ConvKind::Forward);
    assert_eq!(ConvTarget::BackwardInput.kind(), ConvKind::BackwardInput);
    assert_eq!(ConvTarget::BackwardFilter.kind(), ConvKind::BackwardFilter);
    assert_eq!(ConvTarget::ForwardFused.kind(), ConvKind::ForwardActivation);
    assert_eq!(
        ConvTarget::ForwardFusedSideInput.kind(),
        ConvKind::ForwardActivation
    );
    assert_eq!(ConvTarget::ForwardGraph.kind(), ConvKind::ForwardGraph);

    assert!(ConvTarget::ForwardFused.has_bias());
    assert!(!ConvTarget::ForwardFused.has_side_input());
    assert!(ConvTarget::ForwardFusedSideInput.has_bias());
    assert!(ConvTarget::ForwardFusedSideInput.has_side_input());
    assert!(!ConvTarget::Forward.has_bias());
    assert!(ConvTarget::ForwardGraph.is_graph());
    assert_eq!(
        ConvTarget::from_name("gpu.conv.forward.fused.side_input"),
        Some(ConvTarget::ForwardFusedSideInput)
    );
}

#[test]
fn fusion_attributes_follow_the_target() -> anyhow::Result<()> {
    let all = FusionAttrs {
        activation_mode: Some(ActivationMode::Elu),
        side_input_scale: Some(2.0),
        leakyrelu_alpha: Some(0.3),
    };

    assert_eq!(
        ConvTarget::Forward.fusion_attrs(all)?,
        FusionAttrs::default()
    );
    assert_eq!(
        ConvTarget::BackwardFilter.fusion_attrs(all)?,
        FusionAttrs::default()
    );
    assert_eq!(
        ConvTarget::ForwardFused.fusion_attrs(all)?,
        FusionAttrs {
            side_input_scale: None,
            ..all
        }
    );
    assert_eq!(
        ConvTarget::ForwardFusedSideInput.fusion_attrs(all)?,
        FusionAttrs {
            leakyrelu_alpha: None,
            ..all
        }
    );

    let err = ConvTarget::ForwardFusedSideInput
        .fusion_attrs(FusionAttrs::default())
        .expect_err("activation mode is mandatory");
    assert_eq!(err.kind(), ErrorKind::Binding);
    Ok(())
}
