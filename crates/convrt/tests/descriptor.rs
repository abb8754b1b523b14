use convrt::descriptor::MathType;
use convrt::{
    build_descriptor, ActivationMode, Algorithm, ConvKind, DescriptorInputs, ErrorKind,
    FusionAttrs, AUTO_ALGORITHM_ID,
};
use convrt_backend_tests::ConvFixture;

fn inputs<'a>(fixture: &'a ConvFixture, kind: ConvKind) -> DescriptorInputs<'a> {
    DescriptorInputs {
        kind,
        operand0: &fixture.operand0,
        operand1: &fixture.operand1,
        output: &fixture.output,
        scratch_size: fixture.scratch.size_in_bytes,
        attrs: &fixture.attrs,
        fusion: fixture.fusion,
        serialized_graph: None,
    }
}

#[test]
fn window_sizes_follow_operand_extent_at_kernel_spatial_dims() -> anyhow::Result<()> {
    let fixture = ConvFixture::new(Algorithm::Fixed(0));
    assert_eq!(fixture.attrs.dimension_numbers.kernel_spatial_dims, vec![2, 3]);

    let descriptor = build_descriptor(inputs(&fixture, ConvKind::Forward))?;
    let sizes = descriptor
        .window
        .iter()
        .map(|dim| dim.size)
        .collect::<Vec<_>>();
    assert_eq!(sizes, vec![5, 7]);
    Ok(())
}

#[test]
fn window_parameters_are_copied_with_symmetric_padding() -> anyhow::Result<()> {
    let mut fixture = ConvFixture::new(Algorithm::Fixed(0));
    fixture.attrs.window.strides = vec![2, 1];
    fixture.attrs.window.padding = vec![1, 2];
    fixture.attrs.window.lhs_dilation = vec![1, 3];
    fixture.attrs.window.rhs_dilation = vec![2, 1];
    fixture.attrs.window.reversal = vec![false, true];

    let descriptor = build_descriptor(inputs(&fixture, ConvKind::Forward))?;
    let first = &descriptor.window[0];
    let second = &descriptor.window[1];
    assert_eq!((first.stride, second.stride), (2, 1));
    assert_eq!((first.padding_low, first.padding_high), (1, 1));
    assert_eq!((second.padding_low, second.padding_high), (2, 2));
    assert_eq!((first.base_dilation, second.base_dilation), (1, 3));
    assert_eq!((first.window_dilation, second.window_dilation), (2, 1));
    assert!(!first.window_reversal);
    assert!(second.window_reversal);
    Ok(())
}

#[test]
fn building_twice_yields_identical_descriptors() -> anyhow::Result<()> {
    let mut fixture = ConvFixture::new(Algorithm::Fixed(4));
    fixture.attrs.backend_config = fixture
        .attrs
        .backend_config
        .clone()
        .with_knobs(&[3, 9], &[1, 0]);

    let first = build_descriptor(inputs(&fixture, ConvKind::BackwardFilter))?;
    let second = build_descriptor(inputs(&fixture, ConvKind::BackwardFilter))?;
    assert_eq!(first, second);
    assert_eq!(first.to_json()?, second.to_json()?);
    Ok(())
}

#[test]
fn shapes_take_layouts_from_backend_config() -> anyhow::Result<()> {
    let mut fixture = ConvFixture::new(Algorithm::Fixed(0));
    fixture.attrs.backend_config.operand_0_layout = vec![1, 3, 2, 0];
    fixture.attrs.backend_config.result_layout = vec![1, 3, 2, 0];

    let descriptor = build_descriptor(inputs(&fixture, ConvKind::Forward))?;
    assert_eq!(descriptor.operand0_shape.dims(), &[1, 3, 5, 7]);
    assert_eq!(descriptor.operand0_shape.dtype(), convrt::DType::F32);
    assert_eq!(descriptor.operand0_shape.rank(), 4);
    assert_eq!(descriptor.operand0_shape.layout().minor_to_major(), &[1, 3, 2, 0]);
    assert_eq!(descriptor.operand1_shape.layout().minor_to_major(), &[3, 2, 1, 0]);
    assert_eq!(descriptor.result_shape.layout().minor_to_major(), &[1, 3, 2, 0]);
    assert_eq!(descriptor.result_shape.dims(), &[1, 4, 3, 5]);
    Ok(())
}

#[test]
fn tuning_knobs_become_an_id_to_value_map() -> anyhow::Result<()> {
    let mut fixture = ConvFixture::new(Algorithm::Fixed(0));
    fixture.attrs.backend_config = fixture
        .attrs
        .backend_config
        .clone()
        .with_knobs(&[1, 2, 1], &[10, 20, 30]);

    let descriptor = build_descriptor(inputs(&fixture, ConvKind::Forward))?;
    let knobs = &descriptor.backend_config.algorithm.tuning_knobs;
    assert_eq!(knobs.len(), 2);
    assert_eq!(knobs.get(&1), Some(&30));
    assert_eq!(knobs.get(&2), Some(&20));
    Ok(())
}

#[test]
fn workspace_is_explicit_only_when_non_negative() -> anyhow::Result<()> {
    let mut fixture = ConvFixture::new(Algorithm::Fixed(0));
    let unset = build_descriptor(inputs(&fixture, ConvKind::Forward))?;
    assert_eq!(unset.backend_config.algorithm.workspace_size, None);

    fixture.attrs.backend_config.workspace_size = 0;
    let zero = build_descriptor(inputs(&fixture, ConvKind::Forward))?;
    assert_eq!(zero.backend_config.algorithm.workspace_size, Some(0));

    fixture.attrs.backend_config.workspace_size = 4096;
    let explicit = build_descriptor(inputs(&fixture, ConvKind::Forward))?;
    assert_eq!(explicit.backend_config.algorithm.workspace_size, Some(4096));
    Ok(())
}

#[test]
fn fusion_attributes_are_set_only_when_present() -> anyhow::Result<()> {
    let mut fixture = ConvFixture::new(Algorithm::Fixed(0));
    let plain = build_descriptor(inputs(&fixture, ConvKind::ForwardActivation))?;
    assert_eq!(plain.backend_config.activation_mode, ActivationMode::None);
    assert_eq!(plain.backend_config.leakyrelu_alpha, 0.0);
    assert_eq!(plain.backend_config.side_input_scale, 0.0);

    fixture.fusion = FusionAttrs {
        activation_mode: Some(ActivationMode::LeakyRelu),
        side_input_scale: None,
        leakyrelu_alpha: Some(0.2),
    };
    let fused = build_descriptor(inputs(&fixture, ConvKind::ForwardActivation))?;
    assert_eq!(fused.backend_config.activation_mode, ActivationMode::LeakyRelu);
    assert_eq!(fused.backend_config.leakyrelu_alpha, 0.2);
    assert_eq!(fused.backend_config.side_input_scale, 0.0);
    assert!(fused.backend_config.serialized_graph.is_none());
    Ok(())
}

#[test]
fn graph_descriptor_carries_serialized_graph() -> anyhow::Result<()> {
    let fixture = ConvFixture::new(Algorithm::Fixed(0));
    let mut graph_inputs = inputs(&fixture, ConvKind::ForwardGraph);
    graph_inputs.serialized_graph = Some("conv->relu");

    let descriptor = build_descriptor(graph_inputs)?;
    assert_eq!(descriptor.kind, ConvKind::ForwardGraph);
    assert_eq!(
        descriptor.backend_config.serialized_graph.as_deref(),
        Some("conv->relu")
    );
    Ok(())
}

#[test]
fn config_flags_map_onto_the_algorithm_descriptor() -> anyhow::Result<()> {
    let mut fixture = ConvFixture::new(Algorithm::Fixed(6));
    fixture.attrs.backend_config.tensor_ops_enabled = true;
    fixture.attrs.backend_config.is_graph_frontend = true;
    fixture.attrs.backend_config.is_reordered_int8 = true;
    fixture.attrs.result_scale = 0.5;
    fixture.attrs.feature_group_count = 3;

    let descriptor = build_descriptor(inputs(&fixture, ConvKind::Forward))?;
    let algorithm = &descriptor.backend_config.algorithm;
    assert_eq!(algorithm.id(), Some(6));
    assert_eq!(algorithm.math_type, MathType::TensorOp);
    assert!(algorithm.is_graph_frontend);
    assert!(descriptor.backend_config.reordered_int8_nchw_vect);
    assert_eq!(descriptor.backend_config.conv_result_scale, 0.5);
    assert_eq!(descriptor.feature_group_count, 3);
    assert_eq!(descriptor.scratch_size, fixture.scratch.size_in_bytes);
    Ok(())
}

#[test]
fn auto_descriptor_requires_tuning_and_pins_to_default() -> anyhow::Result<()> {
    let fixture = ConvFixture::new(Algorithm::from_raw(-1));
    let descriptor = build_descriptor(inputs(&fixture, ConvKind::Forward))?;

    assert!(descriptor.requires_autotuning());
    let pinned = descriptor.pinned();
    assert!(!pinned.requires_autotuning());
    assert_eq!(
        pinned.backend_config.algorithm.id(),
        Some(convrt::DEFAULT_ALGORITHM_ID)
    );
    Ok(())
}

#[test]
fn only_the_auto_sentinel_requests_tuning() {
    assert_eq!(Algorithm::from_raw(AUTO_ALGORITHM_ID), Algorithm::Auto);
    assert_eq!(Algorithm::from_raw(0), Algorithm::Fixed(0));
    assert_eq!(Algorithm::from_raw(12), Algorithm::Fixed(12));
    assert_eq!(Algorithm::from_raw(-2), Algorithm::Fixed(-2));
    assert!(!Algorithm::from_raw(-2).is_auto());
}

#[test]
fn kernel_axis_outside_operand_is_a_build_error() {
    let mut fixture = ConvFixture::new(Algorithm::Fixed(0));
    fixture.attrs.dimension_numbers.kernel_spatial_dims = vec![2, 9];

    let err = build_descriptor(inputs(&fixture, ConvKind::Forward))
        .expect_err("axis 9 does not exist on a rank-4 operand");
    assert_eq!(err.kind(), ErrorKind::Build);
}
