use anyhow::{Result, bail};
use clap::Parser;
use delve_core::mapgen::{MAX_DEPTH, MIN_DESCENT_DISTANCE};
use delve_core::mapgen::progression::is_final_depth;
use delve_core::pathfinding::UNREACHABLE;
use delve_core::{CaveLayout, GenConfig, GeneratedLevel, LevelGenerator, PathRange, Terrain, grid};
use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    #[arg(short = 'n', long, default_value_t = 200)]
    levels: u32,
    /// Force one cave layout on every depth
    #[arg(short, long)]
    layout: Option<CaveLayout>,
}

/// Returns the first broken invariant of `level`, if any.
fn check(level: &GeneratedLevel, range: &mut PathRange) -> Option<String> {
    if level.terrain_at(level.start) != Terrain::Ground {
        return Some(format!("start {:?} is not ground", level.start));
    }
    let distances = range.bfs(level.start, |pos| level.grid.is_passable(pos));
    if let Some(pos) = grid::positions()
        .find(|&pos| level.grid.is_passable(pos) && distances[grid::index_of(pos)] == UNREACHABLE)
    {
        return Some(format!("{:?} at {pos:?} is unreachable", level.terrain_at(pos)));
    }

    let descents = level.grid.count(Terrain::Stairs) + level.grid.count(Terrain::BlockedStairs);
    let final_depth = is_final_depth(level.depth);
    if descents != usize::from(!final_depth) {
        return Some(format!("{descents} descents"));
    }
    if final_depth && level.grid.count(Terrain::Artifact) != 1 {
        return Some("final depth without its artifact".to_string());
    }
    if let Some(descent) = level.descent
        && distances[grid::index_of(descent)] < MIN_DESCENT_DISTANCE
    {
        return Some(format!("descent {descent:?} is next to the start"));
    }
    if level.grid.count(Terrain::FakeStairs) > 1 {
        return Some("more than one decoy".to_string());
    }
    None
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Starting fuzz sweep on seed {} for {} levels...", args.seed, args.levels);
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut range = PathRange::for_dungeon();
    let mut retried = 0;

    for index in 0..args.levels {
        let run_seed = rng.next_u64();
        let depth = (rng.next_u64() % u64::from(MAX_DEPTH)) as u8 + 1;
        let generator = LevelGenerator::new(run_seed, GenConfig::default())?;
        let mut plan = generator.plan_for(depth);
        if let Some(layout) = args.layout {
            plan.layout = layout;
        }

        let report = match generator.generate_with_plan(depth, &plan) {
            Ok(report) => report,
            Err(error) => {
                bail!("level {index} (seed {run_seed:#x}, depth {depth}) failed: {error}")
            }
        };
        if report.attempts > 1 {
            retried += 1;
        }
        if let Some(broken) = check(&report.level, &mut range) {
            bail!(
                "level {index} (seed {run_seed:#x}, depth {depth}): {broken}\n{}",
                report.level
            );
        }
    }

    println!("Fuzzing completed successfully ({retried} levels needed a retry).");
    Ok(())
}
