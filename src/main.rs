use std::{path::PathBuf, str::FromStr};

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use attention::AttentionType;
use clap::Parser;
use layers::ActivationKind;
use model::{layer_specs, EmhsModel, EmhsModelConfig, Inputs};
use rand::Rng;

#[derive(Parser, Debug)]
#[command(author, version, about = "Assemble and inspect EMHS point-cloud networks", long_about = None)]
struct Args {
    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Path to a TOML or JSON network config"
    )]
    config: PathBuf,

    #[arg(
        long = "override",
        value_name = "KEY=VALUE",
        help = "Override a config option, e.g. feat_dim=32 or latent_classes[0]=4"
    )]
    overrides: Vec<OverrideArg>,

    #[arg(long, value_name = "CLL|CCL", help = "Replace the config's attention_type")]
    attention_type: Option<AttentionType>,

    #[arg(
        long,
        value_name = "NAME",
        help = "Replace the config's activation (identity, relu, gelu, silu)"
    )]
    activation: Option<ActivationKind>,

    #[arg(long, help = "Run a forward pass on a random cloud with this many points")]
    points: Option<usize>,

    #[arg(long, default_value_t = 8, help = "Number of clusters in the random cloud")]
    clusters: usize,

    #[arg(long, help = "Number of samples in the random cloud (one per row if omitted)")]
    batches: Option<usize>,
}

#[derive(Debug, Clone)]
struct OverrideArg {
    key: String,
    value: String,
}

impl FromStr for OverrideArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| "override must be in the form key=value".to_string())?;
        if key.trim().is_empty() {
            return Err("override key must not be empty".into());
        }
        Ok(Self {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        })
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("emhs failed: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let mut config = EmhsModelConfig::from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    for item in &args.overrides {
        config = config.with_override(&item.key, &item.value)?;
    }
    if let Some(attention_type) = args.attention_type {
        config.attention_type = attention_type;
    }
    if let Some(activation) = args.activation {
        config.activation = activation;
    }

    let resolved = config.validate()?;
    println!("attention_type {} activation {}", resolved.attention_type, resolved.activation);
    println!("{:>5} {:>5} {:>6} {:>6} {:>9} {:>6}", "layer", "group", "in", "out", "attention", "latent");
    for spec in layer_specs(&resolved) {
        println!(
            "{:>5} {:>5} {:>6} {:>6} {:>9} {:>6}",
            spec.key(),
            spec.group,
            spec.in_channels,
            spec.out_channels,
            spec.attention_enabled,
            spec.latent_class_count
                .map(|count| count.to_string())
                .unwrap_or_else(|| "-".into())
        );
    }

    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let network = EmhsModel::new(&config, vb)?;
    let parameters: usize = varmap.all_vars().iter().map(|var| var.elem_count()).sum();
    println!(
        "built {} layers, {} parameters, voxelization {:?}",
        network.len(),
        parameters,
        network.voxelization()
    );

    if let Some(points) = args.points {
        let inputs = random_cloud(&resolved, points, args.clusters, args.batches, &device)?;
        let out = network.forward_inputs(&inputs)?;
        println!("forward output shape {:?}", out.dims());
    }
    Ok(())
}

fn random_cloud(
    config: &model::ResolvedModelConfig,
    points: usize,
    clusters: usize,
    batches: Option<usize>,
    device: &Device,
) -> Result<Inputs> {
    if points == 0 || clusters == 0 || clusters > points {
        bail!("need 0 < clusters <= points, got clusters={clusters} points={points}");
    }
    if let Some(0) = batches {
        bail!("batches must be greater than zero");
    }

    let mut rng = rand::thread_rng();
    // Every cluster gets at least one point so the dense ids stay consecutive.
    let consecutive: Vec<u32> = (0..points)
        .map(|idx| if idx < clusters { idx as u32 } else { rng.gen_range(0..clusters as u32) })
        .collect();
    let sparse: Vec<u32> = consecutive.iter().map(|id| id * 7 + 3).collect();
    let batch = batches.map(|samples| {
        let samples = samples.min(points);
        (0..points)
            .map(|idx| (idx * samples / points) as u32)
            .collect::<Vec<u32>>()
    });

    Ok(Inputs {
        x: Tensor::randn(0f32, 1.0, (points, config.input_nc), device)?,
        consecutive_cluster: Tensor::from_vec(consecutive, points, device)?,
        cluster_non_consecutive: Tensor::from_vec(sparse, points, device)?,
        batch: batch
            .map(|ids| Tensor::from_vec(ids, points, device))
            .transpose()?,
    })
}
