use clap::{Parser, Subcommand, ValueEnum};
use foreach_core::{DType, Device, Result, Scalar, Shape, Tensor};
use foreach_engine::{Batch, DispatchConfig, DispatchMode, DispatchPath, Engine, Rhs};
use foreach_ops::OpKind;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "foreach-cli")]
#[command(about = "oxidizedForeach development CLI")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run a quick smoke test of the batched ops on both dispatch paths.
    Smoke,
    /// Print the dispatch decision for a synthetic batch.
    Plan {
        #[arg(long, value_enum, default_value_t = Op::Add)]
        op: Op,
        /// Number of tensors per list.
        #[arg(long, default_value_t = 20)]
        tensors: usize,
        /// Comma-separated dims, e.g. `20,20`.
        #[arg(long, default_value = "20,20", value_parser = parse_shape)]
        shape: Shape,
        #[arg(long, default_value = "f32", value_parser = parse_dtype)]
        dtype: DType,
        #[arg(long, default_value = "gpu", value_parser = parse_device)]
        device: Device,
        #[arg(long, default_value = "auto", value_parser = parse_mode)]
        mode: DispatchMode,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        inplace: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Addcmul,
    Addcdiv,
    Sqrt,
    Exp,
    Neg,
}

impl Op {
    fn kind(self) -> OpKind {
        match self {
            Op::Add => OpKind::Add,
            Op::Sub => OpKind::Sub,
            Op::Mul => OpKind::Mul,
            Op::Div => OpKind::Div,
            Op::Addcmul => OpKind::Addcmul,
            Op::Addcdiv => OpKind::Addcdiv,
            Op::Sqrt => OpKind::Sqrt,
            Op::Exp => OpKind::Exp,
            Op::Neg => OpKind::Neg,
        }
    }

    /// Tensor-list arguments besides the base list.
    fn list_args(self) -> usize {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div => 1,
            Op::Addcmul | Op::Addcdiv => 2,
            Op::Sqrt | Op::Exp | Op::Neg => 0,
        }
    }
}

fn parse_shape(s: &str) -> std::result::Result<Shape, String> {
    let dims = s
        .split(',')
        .filter(|d| !d.trim().is_empty())
        .map(|d| d.trim().parse::<usize>().map_err(|e| format!("bad dim {d:?}: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Shape::new(dims))
}

fn parse_dtype(s: &str) -> std::result::Result<DType, String> {
    let name = s.trim().to_lowercase();
    DType::ALL
        .into_iter()
        .find(|d| d.to_string() == name)
        .ok_or_else(|| format!("unknown dtype {s:?}"))
}

fn parse_device(s: &str) -> std::result::Result<Device, String> {
    match s.trim().to_lowercase().as_str() {
        "cpu" => Ok(Device::Cpu),
        "gpu" => Ok(Device::Gpu),
        _ => Err(format!("unknown device {s:?}")),
    }
}

fn parse_mode(s: &str) -> std::result::Result<DispatchMode, String> {
    DispatchMode::parse(s).ok_or_else(|| format!("unknown dispatch mode {s:?}"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let args = Args::parse();
    let res = match args.cmd {
        Cmd::Smoke => smoke(),
        Cmd::Plan {
            op,
            tensors,
            shape,
            dtype,
            device,
            mode,
            chunk_size,
            inplace,
        } => {
            let mut config = DispatchConfig::new(mode);
            if let Some(n) = chunk_size {
                config = config.with_chunk_size(n);
            }
            plan(op, tensors, &shape, dtype, device, config, inplace)
        }
    };
    if let Err(e) = res {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn list(
    n: usize,
    shape: &Shape,
    value: impl Into<Scalar>,
    dtype: DType,
    device: Device,
) -> Vec<Tensor> {
    let value = value.into();
    (0..n)
        .map(|_| Tensor::full(shape, value, dtype, &device))
        .collect()
}

fn smoke() -> Result<()> {
    let shape = Shape::new(vec![2, 3]);
    for mode in [DispatchMode::Fused, DispatchMode::PerTensor] {
        let engine = Engine::new(DispatchConfig::new(mode).with_chunk_size(4));
        println!("Mode: {mode}");

        let a = list(3, &shape, 1.0, DType::F32, Device::Gpu);
        let b = list(3, &shape, 2.0, DType::F32, Device::Gpu);

        let sum = engine.add(&a, &b, Some(Scalar::Int(3)))?;
        println!("add 1 + 3*2 = {:?}", sum[0].to_vec::<f32>()?);

        engine.mul_(&a, 4)?;
        println!("mul_ 1 * 4 = {:?}", a[0].to_vec::<f32>()?);

        let q = engine.addcdiv(&a, &b, &b, 0.5)?;
        println!("addcdiv 4 + 0.5*(2/2) = {:?}", q[0].to_vec::<f32>()?);

        let r = engine.sqrt(&a)?;
        println!("sqrt 4 = {:?}", r[0].to_vec::<f32>()?);

        let promoted = engine.add(&list(2, &shape, 1, DType::I32, Device::Gpu), 0.5, None)?;
        println!(
            "i32 + 0.5 -> {} {:?}",
            promoted[0].dtype(),
            promoted[0].to_vec::<f32>()?
        );

        let stats = engine.stats();
        println!(
            "stats: fused_calls={} fused_launches={} per_tensor_calls={}\n",
            stats.fused_calls, stats.fused_launches, stats.per_tensor_calls
        );
    }
    println!("All smoke tests passed.");
    Ok(())
}

fn plan(
    op: Op,
    n: usize,
    shape: &Shape,
    dtype: DType,
    device: Device,
    config: DispatchConfig,
    inplace: bool,
) -> Result<()> {
    let base = list(n, shape, 1, dtype, device);
    let args: Vec<Vec<Tensor>> = (0..op.list_args())
        .map(|_| list(n, shape, 1, dtype, device))
        .collect();

    let mut batch = Batch::new(op.kind(), &base, inplace);
    for a in &args {
        batch = batch.arg(Rhs::Tensors(a));
    }

    let engine = Engine::new(config);
    tracing::debug!(op = %op.kind(), tensors = n, %dtype, %device, "planning batch");
    println!(
        "{} x {} {} on {} ({} mode, chunk size {}, inplace={})",
        n,
        shape,
        dtype,
        device,
        engine.config().mode,
        engine.config().chunk_size,
        inplace
    );
    match engine.plan(&batch)? {
        DispatchPath::Fused(plan) => {
            let chunks: usize = plan.launches.iter().map(|l| l.chunks.len()).sum();
            println!(
                "fused: depth {} -> {} launches, {} chunks",
                plan.depth,
                plan.launches.len(),
                chunks
            );
            for (i, launch) in plan.launches.iter().enumerate() {
                println!(
                    "  launch {i}: {} tensors, {} chunks",
                    launch.num_tensors(),
                    launch.chunks.len()
                );
            }
        }
        DispatchPath::PerTensor(reason) => println!("per-tensor: {reason}"),
    }
    Ok(())
}
