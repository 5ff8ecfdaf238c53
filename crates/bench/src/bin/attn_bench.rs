use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use attn_bench::report::render;
use attn_bench::sweep::plan;
use attn_bench::{
    run_sweep, BenchContext, CliOverrides, DeviceSelection, OutputFormat, Precision,
    ShapeOverrides, SweepFile, Variant,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

fn main() {
    if let Err(err) = run() {
        eprintln!("attn-bench failed: {err:#}");
        std::process::exit(1);
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Attention kernel latency microbenchmarks", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "PATH", help = "Sweep file (.toml or .json)")]
    config: Option<PathBuf>,

    #[arg(
        long = "variant",
        value_name = "NAME",
        help = "Variant to run; repeat for several (default: all)"
    )]
    variants: Vec<Variant>,

    #[arg(long, help = "Requests per batch [default: 1]")]
    batch_size: Option<usize>,

    #[arg(long, help = "Tokens per request [default: 128]")]
    context_length: Option<usize>,

    #[arg(long, help = "Query heads [default: 8]")]
    num_heads: Option<usize>,

    #[arg(long, help = "Key/value heads [default: num_heads]")]
    num_kv_heads: Option<usize>,

    #[arg(long, help = "Head dimension [default: 64]")]
    head_dim: Option<usize>,

    #[arg(long, help = "Page size for the paged variants")]
    block_size: Option<usize>,

    #[arg(long, value_name = "DEVICE", help = "auto, cpu, cuda[:N] or metal[:N]")]
    device: Option<DeviceSelection>,

    #[arg(long, value_name = "DTYPE", help = "f32, f16 or bf16")]
    dtype: Option<Precision>,

    #[arg(long)]
    warmup_steps: Option<usize>,

    #[arg(long)]
    active_steps: Option<usize>,

    #[arg(long, default_value = "markdown", help = "markdown or json")]
    format: OutputFormat,

    #[arg(short, long, value_name = "PATH", help = "Write the report here instead of stdout")]
    output: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            device: self.device,
            precision: self.dtype,
            warmup_steps: self.warmup_steps,
            active_steps: self.active_steps,
            variants: self.variants.clone(),
            shape: ShapeOverrides {
                batch_size: self.batch_size,
                context_length: self.context_length,
                num_heads: self.num_heads,
                num_kv_heads: self.num_kv_heads,
                head_dim: self.head_dim,
                block_size: self.block_size,
            },
            output: self.output.clone(),
        }
    }
}

fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file = SweepFile::resolve(args.config.as_deref(), &args.overrides(), |key| {
        std::env::var(key).ok()
    })
    .context("failed to load configuration")?;

    let ctx = BenchContext::from_config(&file.bench)?;

    let progress = ProgressBar::new(plan(&file.sweep).len() as u64);
    progress.set_style(
        ProgressStyle::default_bar().template("  {msg:>32} [{bar:30}] {pos}/{len} ({eta})")?,
    );
    let records = run_sweep(&ctx, &file.sweep, |record| {
        progress.set_message(record.variant.to_string());
        progress.inc(1);
    });
    progress.finish_and_clear();

    let failures = records.iter().filter(|record| record.is_failure()).count();
    if failures > 0 {
        log::warn!("{failures} of {} benchmarks failed", records.len());
    }

    let report = render(&records, args.format)?;
    match &file.sweep.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, report)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {} results to {}", records.len(), path.display());
        }
        None => println!("{report}"),
    }

    Ok(())
}
