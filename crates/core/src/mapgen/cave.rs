//! Terrain carvers that turn solid rock into the wild cave a level is built on.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{GenError, GenResult};
use crate::grid::{self, DUNGEON_HEIGHT, DUNGEON_WIDTH, Grid};
use crate::types::{CaveLayout, Pos, Terrain};

use super::context::{GenContext, component_sizes};
use super::seed::GenRng;

const INTERIOR_CELLS: usize = ((DUNGEON_WIDTH - 2) * (DUNGEON_HEIGHT - 2)) as usize;

/// Numeric knobs of the carvers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarveTuning {
    pub automata_wall_percent: u32,
    /// A cell becomes wall when more than this many of its 8 neighbours are walls.
    pub automata_wall_threshold: u32,
    /// A cell becomes wall when at most this many cells of its 5x5 ring are walls.
    pub automata_island_threshold: u32,
    pub automata_island_passes: usize,
    pub automata_smooth_passes: usize,
    pub min_floor_percent: usize,
    pub max_floor_percent: usize,
    pub min_main_component_percent: usize,
    pub carve_attempts: usize,
    pub walk_floor_percent: usize,
    pub urban_walk_floor_percent: usize,
    pub tree_floor_percent: usize,
    pub max_invalid_steps: usize,
    pub tree_block_len: usize,
    pub tree_walker_steps: usize,
    pub foliage_wall_percent: u32,
}

impl Default for CarveTuning {
    fn default() -> Self {
        Self {
            automata_wall_percent: 55,
            automata_wall_threshold: 4,
            automata_island_threshold: 2,
            automata_island_passes: 4,
            automata_smooth_passes: 3,
            min_floor_percent: 25,
            max_floor_percent: 70,
            min_main_component_percent: 50,
            carve_attempts: 10,
            walk_floor_percent: 40,
            urban_walk_floor_percent: 17,
            tree_floor_percent: 30,
            max_invalid_steps: 50,
            tree_block_len: 12,
            tree_walker_steps: 400,
            foliage_wall_percent: 60,
        }
    }
}

impl CarveTuning {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.automata_wall_percent > 100 || self.foliage_wall_percent > 100 {
            return Err("wall percentages must be at most 100".to_string());
        }
        if self.min_floor_percent > self.max_floor_percent {
            return Err("min_floor_percent exceeds max_floor_percent".to_string());
        }
        if self.carve_attempts == 0 || self.max_invalid_steps == 0 || self.tree_block_len == 0 {
            return Err("carve attempts, invalid steps and tree block length must be positive"
                .to_string());
        }
        let walk_targets =
            [self.walk_floor_percent, self.urban_walk_floor_percent, self.tree_floor_percent];
        if walk_targets.iter().any(|&percent| percent == 0 || percent > 80) {
            return Err("walk floor targets must lie in 1..=80 percent".to_string());
        }
        Ok(())
    }
}

/// Carves the wild cave of `ctx.plan.layout`, then scatters foliage over it.
pub(super) fn carve(ctx: &mut GenContext<'_>) -> GenResult<()> {
    let tuning = ctx.tuning;
    match ctx.plan.layout {
        CaveLayout::AutomataCave => carve_automata(ctx)?,
        CaveLayout::RandomWalkCave => {
            random_walk(&mut ctx.grid, &mut ctx.rng, tuning.walk_floor_percent, tuning)
        }
        CaveLayout::RandomSmallWalkCaveUrbanised => {
            random_walk(&mut ctx.grid, &mut ctx.rng, tuning.urban_walk_floor_percent, tuning)
        }
        CaveLayout::RandomWalkTreeCave => tree_walk(&mut ctx.grid, &mut ctx.rng, tuning),
    }
    scatter_foliage(&mut ctx.grid, &mut ctx.rng, tuning);
    debug!(
        "carved {} cave: {} open cells",
        ctx.plan.layout,
        ctx.grid.count_passable()
    );
    Ok(())
}

/// Wall/floor field of arbitrary size evolved by cellular automata.
/// Reads outside the field count as wall.
struct WallField {
    width: i32,
    height: i32,
    walls: Vec<bool>,
}

impl WallField {
    fn seeded(width: i32, height: i32, wall_percent: u32, rng: &mut GenRng) -> Self {
        let mut walls = vec![true; (width * height) as usize];
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                walls[(y * width + x) as usize] = rng.chance(wall_percent);
            }
        }
        Self { width, height, walls }
    }

    fn is_wall(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return true;
        }
        self.walls[(y * self.width + x) as usize]
    }

    /// Walls within Chebyshev distance `radius`, the centre excluded.
    fn walls_within(&self, x: i32, y: i32, radius: i32) -> u32 {
        let mut count = 0;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx == 0 && dy == 0 {
                    continue;
                }
                count += u32::from(self.is_wall(x + dx, y + dy));
            }
        }
        count
    }

    fn step(&mut self, wall_threshold: u32, island_threshold: Option<u32>) {
        let mut next = self.walls.clone();
        for y in 1..self.height - 1 {
            for x in 1..self.width - 1 {
                let crowded = self.walls_within(x, y, 1) > wall_threshold;
                let isolated =
                    island_threshold.is_some_and(|limit| self.walls_within(x, y, 2) <= limit);
                next[(y * self.width + x) as usize] = crowded || isolated;
            }
        }
        self.walls = next;
    }

    fn evolve(&mut self, tuning: &CarveTuning) {
        for _ in 0..tuning.automata_island_passes {
            self.step(tuning.automata_wall_threshold, Some(tuning.automata_island_threshold));
        }
        for _ in 0..tuning.automata_smooth_passes {
            self.step(tuning.automata_wall_threshold, None);
        }
    }
}

fn carve_automata(ctx: &mut GenContext<'_>) -> GenResult<()> {
    let tuning = ctx.tuning;
    for attempt in 0..tuning.carve_attempts {
        let wall_percent = tuning.automata_wall_percent;
        let mut field =
            WallField::seeded(DUNGEON_WIDTH, DUNGEON_HEIGHT, wall_percent, &mut ctx.rng);
        field.evolve(tuning);

        let mut grid = Grid::filled(Terrain::Wall);
        for pos in grid::positions().filter(|&pos| grid::in_interior(pos)) {
            if !field.is_wall(pos.x, pos.y) {
                grid.set(pos, Terrain::Ground);
            }
        }

        let floor = grid.count_passable();
        let floor_percent = floor * 100 / INTERIOR_CELLS;
        let largest = component_sizes(ctx.paths.components(|pos| grid.is_passable(pos)))
            .into_iter()
            .max()
            .unwrap_or(0);
        if (tuning.min_floor_percent..=tuning.max_floor_percent).contains(&floor_percent)
            && largest * 100 >= floor * tuning.min_main_component_percent
        {
            ctx.grid = grid;
            return Ok(());
        }
        debug!(
            "automata attempt {attempt} rejected: {floor_percent}% floor, \
             main component {largest}/{floor}"
        );
    }
    Err(GenError::CarverExhausted { carver: "automata", attempts: tuning.carve_attempts })
}

/// Single walker from the grid centre. Every carved cell is adjacent to the
/// previous one, so the result is one connected region.
fn random_walk(grid: &mut Grid, rng: &mut GenRng, floor_percent: usize, tuning: &CarveTuning) {
    let target = INTERIOR_CELLS * floor_percent / 100;
    let ceiling = target * 200;
    let mut pos = grid::center();
    let mut last_valid = pos;
    let mut carved = usize::from(!grid.is_passable(pos));
    grid.set(pos, Terrain::Ground);
    let mut invalid = 0;
    let mut steps = 0;
    while carved < target && steps < ceiling {
        steps += 1;
        let next = pos.neighbors4()[rng.below(4)];
        if !grid::in_interior(next) {
            invalid += 1;
        } else if grid.is_passable(next) {
            invalid += 1;
            pos = next;
        } else {
            grid.set(next, Terrain::Ground);
            carved += 1;
            pos = next;
            last_valid = next;
            invalid = 0;
        }
        if invalid >= tuning.max_invalid_steps {
            pos = last_valid;
            invalid = 0;
        }
    }
}

/// Diffusion-limited growth: walkers released in rock dig their trail once
/// they touch the existing cave, which yields narrow branching passages.
fn tree_walk(grid: &mut Grid, rng: &mut GenRng, tuning: &CarveTuning) {
    let target = INTERIOR_CELLS * tuning.tree_floor_percent / 100;
    let center = grid::center();
    let mut carved = 0;
    for pos in [center].into_iter().chain(center.neighbors4()) {
        carved += usize::from(!grid.is_passable(pos));
        grid.set(pos, Terrain::Ground);
    }

    let mut trail = Vec::with_capacity(tuning.tree_walker_steps);
    let max_releases = target * 20;
    let mut releases = 0;
    while carved < target && releases < max_releases {
        releases += 1;
        let start = Pos {
            y: rng.range_i32(1, DUNGEON_HEIGHT - 2),
            x: rng.range_i32(1, DUNGEON_WIDTH - 2),
        };
        if grid.is_passable(start) {
            continue;
        }
        trail.clear();
        trail.push(start);
        let mut pos = start;
        for _ in 0..tuning.tree_walker_steps {
            let next = pos.neighbors4()[rng.below(4)];
            if !grid::in_interior(next) {
                continue;
            }
            if grid.is_passable(next) {
                for &cell in trail.iter().rev().take(tuning.tree_block_len) {
                    carved += usize::from(!grid.is_passable(cell));
                    grid.set(cell, Terrain::Ground);
                }
                break;
            }
            pos = next;
            trail.push(next);
        }
    }
}

/// Half-resolution automata upsampled x2; ground that is also floor in the
/// coarse field becomes foliage.
fn scatter_foliage(grid: &mut Grid, rng: &mut GenRng, tuning: &CarveTuning) {
    let mut field = WallField::seeded(
        (DUNGEON_WIDTH + 1) / 2,
        (DUNGEON_HEIGHT + 1) / 2,
        tuning.foliage_wall_percent,
        rng,
    );
    field.evolve(tuning);
    for pos in grid::positions() {
        if grid.terrain(pos) == Terrain::Ground && !field.is_wall(pos.x / 2, pos.y / 2) {
            grid.set(pos, Terrain::Foliage);
        }
    }
}
