//! Public data model of a generated level and the report tooling inspects.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::grid::{DUNGEON_CELLS, DUNGEON_HEIGHT, DUNGEON_WIDTH, Grid};
use crate::pathfinding::{AstarPath, PathRange, WalkPather};
use crate::types::{CaveLayout, Pos, Terrain};

use super::bands::{BandInfo, BandKind, Behavior};
use super::rooms::Room;
use super::templates::StoryRole;

/// The only thing that survives a generation attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GeneratedLevel {
    pub depth: u8,
    /// Seed of the attempt that produced the level.
    pub seed: u64,
    pub layout: CaveLayout,
    pub grid: Grid,
    pub start: Pos,
    /// Stairs or blocked stairs; the artifact on the final depth.
    pub descent: Option<Pos>,
    pub decoy: Option<Pos>,
    pub anchors: BTreeMap<StoryRole, Pos>,
    pub bands: Vec<BandInfo>,
    pub item_spots: Vec<Pos>,
}

/// A level plus the transient stage output tooling and tests look at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub level: GeneratedLevel,
    pub rooms: Vec<Room>,
    /// Passable cells the validator walled off.
    pub repairs: usize,
    /// Attempts spent, 1 when the canonical seed succeeded.
    pub attempts: u32,
}

fn push_pos(bytes: &mut Vec<u8>, pos: Pos) {
    bytes.extend(pos.y.to_le_bytes());
    bytes.extend(pos.x.to_le_bytes());
}

fn push_optional_pos(bytes: &mut Vec<u8>, pos: Option<Pos>) {
    match pos {
        Some(pos) => {
            bytes.push(1);
            push_pos(bytes, pos);
        }
        None => bytes.push(0),
    }
}

fn layout_byte(layout: CaveLayout) -> u8 {
    match layout {
        CaveLayout::AutomataCave => 0,
        CaveLayout::RandomWalkCave => 1,
        CaveLayout::RandomWalkTreeCave => 2,
        CaveLayout::RandomSmallWalkCaveUrbanised => 3,
    }
}

fn band_byte(kind: BandKind) -> u8 {
    match kind {
        BandKind::LoneGuard => 0,
        BandKind::GuardPatrol => 1,
        BandKind::Sentinels => 2,
        BandKind::HoundPack => 3,
        BandKind::Frogs => 4,
        BandKind::CaveWorms => 5,
        BandKind::Specters => 6,
        BandKind::Hunters => 7,
    }
}

fn behavior_byte(behavior: Behavior) -> u8 {
    match behavior {
        Behavior::Guard => 0,
        Behavior::Patrol => 1,
        Behavior::Wander => 2,
        Behavior::Explore => 3,
        Behavior::Chase => 4,
    }
}

fn role_byte(role: StoryRole) -> u8 {
    match role {
        StoryRole::Captive => 0,
        StoryRole::Companion => 1,
        StoryRole::Monolith => 2,
    }
}

impl GeneratedLevel {
    /// Stable byte encoding of everything the level carries, for determinism
    /// checks across runs, threads and platforms.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(DUNGEON_CELLS + 128);
        bytes.push(self.depth);
        bytes.extend(self.seed.to_le_bytes());
        bytes.push(layout_byte(self.layout));
        bytes.extend(self.grid.cells().iter().map(|cell| cell.bits()));
        push_pos(&mut bytes, self.start);
        push_optional_pos(&mut bytes, self.descent);
        push_optional_pos(&mut bytes, self.decoy);

        bytes.extend((self.anchors.len() as u32).to_le_bytes());
        for (&role, &pos) in &self.anchors {
            bytes.push(role_byte(role));
            push_pos(&mut bytes, pos);
        }

        bytes.extend((self.bands.len() as u32).to_le_bytes());
        for band in &self.bands {
            bytes.push(band_byte(band.kind));
            bytes.push(behavior_byte(band.behavior));
            bytes.extend((band.path.len() as u32).to_le_bytes());
            for &pos in &band.path {
                push_pos(&mut bytes, pos);
            }
        }

        bytes.extend((self.item_spots.len() as u32).to_le_bytes());
        for &pos in &self.item_spots {
            push_pos(&mut bytes, pos);
        }
        bytes
    }

    pub fn fingerprint(&self) -> u64 {
        xxh3_64(&self.canonical_bytes())
    }

    /// Out-of-bounds positions read as wall.
    pub fn terrain_at(&self, pos: Pos) -> Terrain {
        self.grid.terrain(pos)
    }

    /// Shortest walking route between two cells, reusing the caller's search
    /// scratch.
    pub fn path(&self, from: Pos, to: Pos, range: &mut PathRange) -> Option<AstarPath> {
        range.astar(&mut WalkPather::new(&self.grid), from, to)
    }
}

/// Terrain glyphs with `@` on the start and `m` on each band's first cell.
impl fmt::Display for GeneratedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "depth {} ({}) seed {:#018x}", self.depth, self.layout, self.seed)?;
        for y in 0..DUNGEON_HEIGHT {
            let row: String = (0..DUNGEON_WIDTH)
                .map(|x| {
                    let pos = Pos { y, x };
                    if pos == self.start {
                        '@'
                    } else if self.bands.iter().any(|band| band.path.first() == Some(&pos)) {
                        'm'
                    } else {
                        self.grid.terrain(pos).glyph()
                    }
                })
                .collect();
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}
