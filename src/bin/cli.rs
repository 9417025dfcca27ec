// src/bin/cli.rs
//
//! CLI supporting `config` and `loaders`.
//!
//! Examples:
//! ```bash
//! sade-cli config                                   # print the flow config
//! sade-cli config --config my.json --set data.dataset=ibis
//! sade-cli -v loaders                               # training loaders
//! sade-cli loaders --evaluation --batches 2         # val / test, pull 2 batches
//! sade-cli loaders --ood-eval --set data.ood_ds=lesion_load_20
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use futures_util::StreamExt;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sade::config::{flow_v2, read_patch_file, Config};
use sade::constants::DEFAULT_NUM_WORKERS;
use sade::data_loader::{CacheDataset, DataLoader};
use sade::datasets::{get_dataloaders, BuildOptions, RunMode};

/// Print to stdout, exiting quietly on a broken pipe
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

/// How the configuration is composed, shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// JSON patch applied on top of the flow configuration
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override a single key, e.g. `--set data.cache_rate=0.5`. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the composed configuration as JSON.
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Build the datasets and loaders and summarize them.
    Loaders {
        #[command(flatten)]
        config: ConfigArgs,

        /// Build validation and test loaders only
        #[arg(long)]
        evaluation: bool,

        /// Build inlier and out-of-distribution loaders (wins over --evaluation)
        #[arg(long = "ood-eval")]
        ood_eval: bool,

        /// Preprocessing workers
        #[arg(short = 'w', long, default_value_t = DEFAULT_NUM_WORKERS)]
        workers: usize,

        /// Sample with replacement forever
        #[arg(long)]
        infinite: bool,

        /// Hide cache progress bars
        #[arg(long = "no-progress")]
        no_progress: bool,

        /// Pull this many batches from each loader
        #[arg(short = 'b', long, default_value_t = 0)]
        batches: usize,
    },
}

/// Flow config, then `--config`, then SADE_DATA_DIR / SADE_SPLITS_DIR, then `--set`.
fn compose_config(args: &ConfigArgs) -> Result<Config> {
    let mut cfg = flow_v2::get_config();

    if let Some(path) = &args.config {
        let patch = read_patch_file(path)?;
        cfg = cfg
            .apply_patch(&patch)
            .with_context(|| format!("applying {}", path.display()))?;
        debug!("applied config patch {}", path.display());
    }

    if let Ok(dir) = std::env::var("SADE_DATA_DIR") {
        cfg.data.dir_path = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("SADE_SPLITS_DIR") {
        cfg.data.splits_dir = PathBuf::from(dir);
    }

    Ok(cfg.apply_overrides(args.set.as_slice())?)
}

fn describe(split: &str, loader: &DataLoader<CacheDataset>) -> Result<()> {
    let ds = loader.dataset();
    let opts = loader.options();
    safe_println!(
        "{:<5} {:>5} records, {:>5} cached  transform={:<10} dir={}",
        split,
        ds.records().len(),
        ds.cached_len(),
        ds.transform_name(),
        ds.source_dir().display()
    );
    safe_println!(
        "      batch_size={} shuffle={} workers={} prefetch={} pin_memory={} sampler={:?}",
        opts.batch_size,
        opts.shuffle,
        opts.num_workers,
        opts.prefetch,
        opts.pin_memory,
        opts.sampler_type
    );
    Ok(())
}

async fn pull(split: &str, loader: &DataLoader<CacheDataset>, n: usize) -> Result<()> {
    let mut stream = loader.stream().take(n);
    let mut i = 0usize;
    while let Some(batch) = stream.next().await {
        let batch = batch.with_context(|| format!("{split} batch {i}"))?;
        let shape = batch.first().map(|s| s.image.dim());
        let labelled = batch.iter().filter(|s| s.label.is_some()).count();
        safe_println!(
            "      {} batch {}: {} samples, image {:?}, {} with labels",
            split,
            i,
            batch.len(),
            shape,
            labelled
        );
        i += 1;
    }
    Ok(())
}

/// Main CLI function
#[tokio::main]
async fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Capture `log` records from dependencies
    tracing_log::LogTracer::init().ok();

    match cli.cmd {
        Command::Config { config } => {
            let cfg = compose_config(&config)?;
            safe_println!("{}", cfg.to_json_pretty()?);
        }

        Command::Loaders {
            config,
            evaluation,
            ood_eval,
            workers,
            infinite,
            no_progress,
            batches,
        } => {
            let cfg = compose_config(&config)?;
            let opts = BuildOptions::default()
                .mode(RunMode::from_flags(evaluation, ood_eval))
                .num_workers(workers)
                .infinite_sampler(infinite)
                .progress(!no_progress);

            let start = Instant::now();
            let build_cfg = cfg.clone();
            let build_opts = opts.clone();
            let (loaders, _datasets) =
                tokio::task::spawn_blocking(move || get_dataloaders(&build_cfg, &build_opts))
                    .await
                    .context("loader construction panicked")??;
            info!("loaders ready in {:.2}s", start.elapsed().as_secs_f64());

            safe_println!(
                "mode={:?} dataset={} ood_ds={}",
                opts.mode,
                cfg.data.dataset,
                cfg.data.ood_ds
            );
            let mut named = Vec::new();
            if let Some(train) = &loaders.train {
                named.push(("train", train));
            }
            named.push(("val", &loaders.eval));
            named.push(("test", &loaders.test));

            for (split, loader) in named {
                describe(split, loader)?;
                if batches > 0 {
                    pull(split, loader, batches).await?;
                }
            }
        }
    }

    Ok(())
}
