use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use delve_core::{CaveLayout, GenConfig, LevelGenerator};
use log::info;
use tools::config_file;

#[derive(Parser)]
#[command(author, version, about = "Generate one dungeon level", long_about = None)]
struct Args {
    /// Run seed shared by every depth
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    #[arg(short, long, default_value_t = 1)]
    depth: u8,
    /// Replace the cave layout of the depth's plan
    #[arg(short, long)]
    layout: Option<CaveLayout>,
    /// Path to a TOML generation config
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print the level as JSON instead of a map
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config_file::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => GenConfig::default(),
    };
    let generator =
        LevelGenerator::new(args.seed, config).context("Failed to set up the generator")?;

    let mut plan = generator.plan_for(args.depth);
    if let Some(layout) = args.layout {
        plan.layout = layout;
    }
    let report = generator
        .generate_with_plan(args.depth, &plan)
        .with_context(|| format!("Failed to generate depth {}", args.depth))?;
    info!(
        "depth {} took {} attempt(s) and walled {} unreachable cells",
        args.depth, report.attempts, report.repairs
    );

    if args.json {
        let json = serde_json::to_string_pretty(&report.level)
            .context("Failed to serialize the level")?;
        println!("{json}");
    } else {
        println!("{}", report.level);
        println!("Rooms: {}", report.rooms.len());
        println!("Bands: {}", report.level.bands.len());
        println!("Fingerprint: {:#018x}", report.level.fingerprint());
    }
    Ok(())
}
