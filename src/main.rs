use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use cubelink::engine::{InvokerConfig, NativeEngine};
use cubelink::pipeline;

/// Load a FITS cube and run the source-finding engine on it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// FITS cube to process
    cube: PathBuf,

    /// Engine parameter file, passed through unread
    parameter_file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = InvokerConfig::default();
    log::debug!("Invoker config: {}", serde_json::to_string(&config)?);

    let outcome = pipeline::run(&args.cube, &args.parameter_file, config, NativeEngine::open_default)
        .with_context(|| format!("processing '{}'", args.cube.display()))?;

    log::info!("Engine returned status {}", outcome.status());
    Ok(())
}
