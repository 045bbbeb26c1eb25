//! Depth progression table: which cave style, themed room and feature counts
//! each depth of a run uses.

use serde::{Deserialize, Serialize};

use crate::types::{CaveLayout, Terrain};

pub const MAX_DEPTH: u8 = 8;
pub const STARTING_DEPTH: u8 = 1;
pub const RESCUE_DEPTH: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialRoom {
    Garden,
    Shrine,
    Vault,
    Barracks,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Narrative {
    /// Captive, companion and monolith anchors placed in a story room.
    Rescue,
}

/// Everything the pipeline needs to know about one depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelPlan {
    pub layout: CaveLayout,
    pub special_room: Option<SpecialRoom>,
    pub blocked_descent: bool,
    pub decoy_descent: bool,
    pub windows: usize,
    pub holes: usize,
    pub trees: usize,
    pub lights: usize,
    pub tables: usize,
    pub barrels: usize,
    pub magic_stones: usize,
    pub items: usize,
    pub lakes: usize,
    pub lake_terrain: Terrain,
    pub narrative: Option<Narrative>,
}

impl Default for LevelPlan {
    fn default() -> Self {
        Self {
            layout: CaveLayout::AutomataCave,
            special_room: None,
            blocked_descent: false,
            decoy_descent: false,
            windows: 2,
            holes: 1,
            trees: 0,
            lights: 2,
            tables: 1,
            barrels: 2,
            magic_stones: 0,
            items: 2,
            lakes: 0,
            lake_terrain: Terrain::Water,
            narrative: None,
        }
    }
}

impl LevelPlan {
    /// Plan with every optional feature switched off.
    pub fn bare(layout: CaveLayout) -> Self {
        Self {
            layout,
            windows: 0,
            holes: 0,
            lights: 0,
            tables: 0,
            barrels: 0,
            items: 0,
            ..Self::default()
        }
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        if !matches!(self.lake_terrain, Terrain::Water | Terrain::Chasm) {
            return Err(format!("lake terrain must be water or chasm, got {:?}", self.lake_terrain));
        }
        if self.lakes > 6 {
            return Err(format!("at most 6 lakes fit a level, got {}", self.lakes));
        }
        if self.narrative.is_some() && self.special_room.is_some() {
            return Err("a narrative depth cannot also carry a themed room".to_string());
        }
        Ok(())
    }
}

pub fn is_final_depth(depth: u8) -> bool {
    depth == MAX_DEPTH
}

/// Built-in plan of `depth`; depths past the table reuse its last row.
pub fn default_plan(depth: u8) -> LevelPlan {
    let slot = depth.saturating_sub(STARTING_DEPTH).min(MAX_DEPTH - 1);
    let base = LevelPlan::default();
    match slot {
        0 => LevelPlan { windows: 1, holes: 0, ..base },
        1 => LevelPlan {
            layout: CaveLayout::RandomWalkCave,
            special_room: Some(SpecialRoom::Garden),
            trees: 3,
            lakes: 1,
            ..base
        },
        2 => LevelPlan {
            layout: CaveLayout::RandomSmallWalkCaveUrbanised,
            special_room: Some(SpecialRoom::Barracks),
            decoy_descent: true,
            tables: 2,
            items: 3,
            ..base
        },
        3 => LevelPlan {
            blocked_descent: true,
            magic_stones: 1,
            narrative: Some(Narrative::Rescue),
            ..base
        },
        4 => LevelPlan {
            layout: CaveLayout::RandomWalkTreeCave,
            special_room: Some(SpecialRoom::Shrine),
            trees: 5,
            lakes: 2,
            lake_terrain: Terrain::Chasm,
            magic_stones: 1,
            ..base
        },
        5 => LevelPlan {
            layout: CaveLayout::RandomSmallWalkCaveUrbanised,
            special_room: Some(SpecialRoom::Vault),
            decoy_descent: true,
            windows: 3,
            holes: 2,
            barrels: 3,
            items: 3,
            ..base
        },
        6 => LevelPlan {
            layout: CaveLayout::RandomWalkCave,
            special_room: Some(SpecialRoom::Garden),
            trees: 4,
            lakes: 2,
            lake_terrain: Terrain::Chasm,
            magic_stones: 2,
            ..base
        },
        _ => LevelPlan {
            special_room: Some(SpecialRoom::Shrine),
            lakes: 1,
            lake_terrain: Terrain::Chasm,
            lights: 4,
            items: 4,
            ..base
        },
    }
}
