//! Transient state of one generation attempt.
//!
//! This module exists so every stage works on one owned bundle: the working
//! grid, per-cell ownership tags, rooms, the random stream and the search
//! scratch. It does not survive the attempt; the pipeline distils it into a
//! `GeneratedLevel`.

use crate::grid::{self, DUNGEON_CELLS, Grid};
use crate::pathfinding::{ComponentId, PathRange};
use crate::types::{Pos, Terrain};

use super::cave::CarveTuning;
use super::progression::LevelPlan;
use super::rooms::Room;
use super::seed::GenRng;

/// Which stage owns a cell. Untagged cells are wild cave or solid rock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) enum CellTag {
    #[default]
    Wild,
    Room,
    Tunnel,
}

pub(super) struct GenContext<'a> {
    pub(super) depth: u8,
    pub(super) plan: &'a LevelPlan,
    pub(super) tuning: &'a CarveTuning,
    pub(super) grid: Grid,
    pub(super) tags: Vec<CellTag>,
    pub(super) rooms: Vec<Room>,
    pub(super) rng: GenRng,
    pub(super) paths: PathRange,
    pub(super) components: Vec<ComponentId>,
    pub(super) repairs: usize,
}

impl<'a> GenContext<'a> {
    pub(super) fn new(depth: u8, plan: &'a LevelPlan, tuning: &'a CarveTuning, seed: u64) -> Self {
        Self {
            depth,
            plan,
            tuning,
            grid: Grid::filled(Terrain::Wall),
            tags: vec![CellTag::Wild; DUNGEON_CELLS],
            rooms: Vec::new(),
            rng: GenRng::from_seed(seed),
            paths: PathRange::for_dungeon(),
            components: Vec::new(),
            repairs: 0,
        }
    }

    pub(super) fn tag(&self, pos: Pos) -> Option<CellTag> {
        grid::in_bounds(pos).then(|| self.tags[grid::index_of(pos)])
    }

    pub(super) fn set_tag(&mut self, pos: Pos, tag: CellTag) {
        if grid::in_bounds(pos) {
            self.tags[grid::index_of(pos)] = tag;
        }
    }

    pub(super) fn is_wild(&self, pos: Pos) -> bool {
        self.tag(pos) == Some(CellTag::Wild)
    }

    /// Index of the room whose bounding box holds `pos`.
    pub(super) fn room_at(&self, pos: Pos) -> Option<usize> {
        if self.tag(pos) != Some(CellTag::Room) {
            return None;
        }
        self.rooms.iter().position(|room| room.rect.contains(pos))
    }

    /// Random interior cell satisfying `accept`, or `None` after `attempts` misses.
    pub(super) fn random_cell(
        &mut self,
        attempts: usize,
        mut accept: impl FnMut(&Self, Pos) -> bool,
    ) -> Option<Pos> {
        for _ in 0..attempts {
            let pos = Pos {
                y: self.rng.range_i32(1, grid::DUNGEON_HEIGHT - 2),
                x: self.rng.range_i32(1, grid::DUNGEON_WIDTH - 2),
            };
            if accept(self, pos) {
                return Some(pos);
            }
        }
        None
    }

    /// Recomputes component ids over passable terrain and returns the cell
    /// counts per id (index 0 unused).
    pub(super) fn label_passable_components(&mut self) -> Vec<usize> {
        let grid = &self.grid;
        let labels = self.paths.components(|pos| grid.is_passable(pos));
        self.components.clear();
        self.components.extend_from_slice(labels);
        component_sizes(&self.components)
    }
}

pub(super) fn component_sizes(labels: &[ComponentId]) -> Vec<usize> {
    let count = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut sizes = vec![0; count + 1];
    for &label in labels {
        if label != 0 {
            sizes[label as usize] += 1;
        }
    }
    sizes
}
