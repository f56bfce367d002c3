use anyhow::Result;
use attention::AttentionType;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use model::{
    ClusterContext, ClusterLayer, ConfigurationError, EmhsModel, EmhsModelConfig, Inputs,
    ModelError,
};

fn build_config(layers_slice: Vec<usize>, num_layers: usize) -> EmhsModelConfig {
    let groups = layers_slice.len() - 1;
    let mut config = EmhsModelConfig::new(3, 4, layers_slice)
        .with_latent_classes((0..groups).map(|g| g + 2).collect());
    config.num_layers = num_layers;
    config.feat_dim = 8;
    config.num_elm = 1;
    config
}

fn build(config: &EmhsModelConfig) -> std::result::Result<(VarMap, EmhsModel), ModelError> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let model = EmhsModel::new(config, vb)?;
    Ok((varmap, model))
}

fn point_cloud(device: &Device) -> Result<Inputs> {
    Ok(Inputs {
        x: Tensor::randn(0f32, 1.0, (8, 3), device)?,
        consecutive_cluster: Tensor::new(&[0u32, 0, 1, 1, 1, 2, 3, 3], device)?,
        cluster_non_consecutive: Tensor::new(&[5u32, 5, 9, 9, 9, 14, 30, 30], device)?,
        batch: Some(Tensor::new(&[0u32, 0, 0, 0, 0, 1, 1, 1], device)?),
    })
}

#[test]
fn valid_partition_registers_every_layer_in_order() -> Result<()> {
    let (varmap, model) = build(&build_config(vec![0, 2, 5], 5))?;

    assert_eq!(model.len(), 5);
    assert_eq!(model.keys(), ["0", "1", "2", "3", "4"]);
    assert_eq!(model.voxelization(), [9, 9, 9]);

    let names = varmap.data().lock().unwrap();
    for key in model.keys() {
        assert!(names.contains_key(&format!("{key}.in_proj.weight")));
    }
    Ok(())
}

#[test]
fn boundary_layers_take_model_widths() -> Result<()> {
    let (_varmap, model) = build(&build_config(vec![0, 2, 5], 5))?;

    let first = model.layer(0).expect("layer 0");
    assert_eq!(first.spec().in_channels, 3);
    assert_eq!(first.spec().latent_class_count, Some(2));
    assert!(first.has_attention());

    let last = model.layer(4).expect("layer 4");
    assert_eq!(last.spec().out_channels, 4);
    assert_eq!(last.spec().latent_class_count, Some(3));
    assert!(!last.spec().attention_enabled);
    assert!(!last.has_attention());

    for (_, layer) in model.layers().filter(|(idx, _)| (1..4).contains(idx)) {
        assert_eq!((layer.spec().in_channels, layer.spec().out_channels), (8, 8));
    }
    Ok(())
}

#[test]
fn incomplete_partition_fails_before_allocation() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

    let err = EmhsModel::new(&build_config(vec![0, 2, 4], 5), vb)
        .err()
        .expect("coverage gap must fail");

    assert!(matches!(
        err,
        ModelError::Configuration(ConfigurationError::LayerCoverage {
            covered: 4,
            expected: 5
        })
    ));
    assert!(varmap.all_vars().is_empty());
}

#[test]
fn latent_class_mismatch_is_a_configuration_error() {
    let config = build_config(vec![0, 2, 5], 5).with_latent_classes(vec![3, 4, 5]);
    let err = build(&config).err().expect("mismatch must fail");
    assert!(matches!(
        err,
        ModelError::Configuration(ConfigurationError::LatentClassMismatch {
            latent_classes: 3,
            groups: 2
        })
    ));
}

#[test]
fn forward_produces_output_width() -> Result<()> {
    let device = Device::Cpu;
    for attention_type in [AttentionType::Cll, AttentionType::Ccl] {
        let mut config = build_config(vec![0, 1, 3], 3);
        config.attention_type = attention_type;
        let (_varmap, model) = build(&config)?;

        let inputs = point_cloud(&device)?;
        let out = model.forward_inputs(&inputs)?;

        assert_eq!(out.dims(), &[8, 4]);
        assert_eq!(out.dtype(), DType::F32);
    }
    Ok(())
}

#[test]
fn forward_without_batch_treats_rows_as_samples() -> Result<()> {
    let device = Device::Cpu;
    let mut config = build_config(vec![0, 2], 2);
    config.use_attention = false;
    config.latent_classes = None;
    let (_varmap, model) = build(&config)?;

    let inputs = point_cloud(&device)?;
    let out = model.forward(
        &inputs.x,
        &inputs.consecutive_cluster,
        &inputs.cluster_non_consecutive,
        None,
    )?;

    assert_eq!(out.dims(), &[8, 4]);
    Ok(())
}

#[test]
fn forward_is_deterministic_for_fixed_parameters() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, model) = build(&build_config(vec![0, 3], 3))?;
    let inputs = point_cloud(&device)?;

    let first = model.forward_inputs(&inputs)?.to_vec2::<f32>()?;
    let second = model.forward_inputs(&inputs)?.to_vec2::<f32>()?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn layer_errors_propagate_from_forward() -> Result<()> {
    let device = Device::Cpu;
    let (_varmap, model) = build(&build_config(vec![0, 2], 2))?;
    let inputs = point_cloud(&device)?;
    let wide = Tensor::zeros((8, 6), DType::F32, &device)?;

    let err = model
        .forward(&wide, &inputs.consecutive_cluster, &inputs.cluster_non_consecutive, None)
        .unwrap_err();

    assert!(err.to_string().contains("emhs.input"));
    Ok(())
}

/// Applies `x * scale + shift` and records the batch metadata it was given.
struct Affine {
    scale: f64,
    shift: f64,
    expected_batch_size: usize,
    expected_clusters: usize,
}

impl ClusterLayer for Affine {
    fn forward(&self, x: &Tensor, ctx: &ClusterContext<'_>) -> candle_core::Result<Tensor> {
        assert_eq!(ctx.batch_size, self.expected_batch_size);
        assert_eq!(ctx.num_clusters(), self.expected_clusters);
        x.affine(self.scale, self.shift)
    }
}

fn affine(scale: f64, shift: f64, batch_size: usize) -> Affine {
    Affine {
        scale,
        shift,
        expected_batch_size: batch_size,
        expected_clusters: 3,
    }
}

#[test]
fn execution_order_follows_index_not_insertion() -> Result<()> {
    let device = Device::Cpu;
    let x = Tensor::new(&[[1f32], [2.0], [3.0], [4.0], [5.0]], &device)?;
    let consecutive = Tensor::new(&[0u32, 0, 1, 1, 2], &device)?;
    let sparse = Tensor::new(&[4u32, 4, 8, 8, 15], &device)?;
    let batch = Tensor::new(&[0u32, 0, 1, 1, 2], &device)?;

    let sorted = EmhsModel::from_layers(
        [9, 9, 9],
        vec![(0, affine(2.0, 0.0, 3)), (1, affine(1.0, 1.0, 3)), (2, affine(3.0, 0.0, 3))],
    )?;
    let shuffled = EmhsModel::from_layers(
        [9, 9, 9],
        vec![(2, affine(3.0, 0.0, 3)), (0, affine(2.0, 0.0, 3)), (1, affine(1.0, 1.0, 3))],
    )?;

    let expected: Vec<f32> = [1f32, 2.0, 3.0, 4.0, 5.0]
        .iter()
        .map(|v| (v * 2.0 + 1.0) * 3.0)
        .collect();
    for model in [&sorted, &shuffled] {
        assert_eq!(model.keys(), ["0", "1", "2"]);
        let out = model.forward(&x, &consecutive, &sparse, Some(&batch))?;
        assert_eq!(out.flatten_all()?.to_vec1::<f32>()?, expected);
    }
    Ok(())
}

#[test]
fn batch_size_defaults_to_leading_dimension() -> Result<()> {
    let device = Device::Cpu;
    let x = Tensor::zeros((5, 1), DType::F32, &device)?;
    let consecutive = Tensor::new(&[0u32, 0, 1, 1, 2], &device)?;
    let sparse = Tensor::new(&[4u32, 4, 8, 8, 15], &device)?;

    let model = EmhsModel::from_layers([9, 9, 9], vec![(0, affine(1.0, 0.0, 5))])?;
    model.forward(&x, &consecutive, &sparse, None)?;
    Ok(())
}

#[test]
fn duplicate_indices_are_rejected() {
    let result = EmhsModel::from_layers(
        [9, 9, 9],
        vec![(1, affine(1.0, 0.0, 1)), (1, affine(2.0, 0.0, 1))],
    );
    assert!(matches!(result, Err(ConfigurationError::DuplicateLayer(1))));
}

#[test]
fn boxed_layers_can_be_mixed() -> Result<()> {
    let device = Device::Cpu;
    let x = Tensor::new(&[[1f32], [2.0], [3.0]], &device)?;
    let ids = Tensor::new(&[0u32, 1, 2], &device)?;

    let layers: Vec<(usize, Box<dyn ClusterLayer>)> = vec![
        (1, Box::new(affine(1.0, 5.0, 3))),
        (0, Box::new(affine(10.0, 0.0, 3))),
    ];
    let model = EmhsModel::from_layers([4, 4, 4], layers)?;

    let out = model.forward(&x, &ids, &ids, None)?;
    assert_eq!(out.flatten_all()?.to_vec1::<f32>()?, vec![15.0, 25.0, 35.0]);
    assert_eq!(model.voxelization(), [4, 4, 4]);
    Ok(())
}
