//! Connectivity validator: the one authoritative guarantee that every
//! passable cell can be walked to from the start.

use log::{debug, warn};

use crate::error::{GenError, GenResult};
use crate::grid::{self, Grid};
use crate::pathfinding::{PathRange, UNREACHABLE};
use crate::types::{Pos, Terrain};

use super::context::GenContext;

/// Repairs above this share of the reached cells hint at a broken stage.
const LARGE_REPAIR_PERCENT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct ValidationReport {
    pub(super) reached: usize,
    pub(super) repaired: usize,
}

/// Floods from `start` over passable terrain and walls every passable cell
/// the flood did not reach.
pub(super) fn validate_connectivity(
    ctx: &mut GenContext<'_>,
    start: Pos,
    stage: &str,
) -> GenResult<ValidationReport> {
    let report = wall_unreached(&mut ctx.grid, &mut ctx.paths, start)
        .ok_or_else(|| GenError::Unreachable { what: format!("every cell after {stage}") })?;
    ctx.repairs += report.repaired;
    debug!(
        "validated after {stage}: {} cells reached, {} repaired",
        report.reached, report.repaired
    );
    if report.repaired * 100 > report.reached * LARGE_REPAIR_PERCENT {
        warn!(
            "large connectivity repair after {stage} at depth {}: walled {} of {} cells",
            ctx.depth,
            report.repaired,
            report.reached + report.repaired
        );
    }
    Ok(report)
}

/// `None` when `start` itself is not passable.
fn wall_unreached(grid: &mut Grid, paths: &mut PathRange, start: Pos) -> Option<ValidationReport> {
    if !grid.is_passable(start) {
        return None;
    }
    let level = &*grid;
    let distances = paths.bfs(start, |pos| level.is_passable(pos));
    let mut reached = 0;
    let mut unreached = Vec::new();
    for (index, &distance) in distances.iter().enumerate() {
        if distance != UNREACHABLE {
            reached += 1;
        } else if level.is_passable(grid::pos_of(index)) {
            unreached.push(grid::pos_of(index));
        }
    }
    for &pos in &unreached {
        grid.set(pos, Terrain::Wall);
    }
    Some(ValidationReport { reached, repaired: unreached.len() })
}
