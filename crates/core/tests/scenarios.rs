use proptest::prelude::*;

use delve_core::grid::{self, DUNGEON_HEIGHT, DUNGEON_WIDTH};
use delve_core::mapgen::progression::{RESCUE_DEPTH, is_final_depth};
use delve_core::mapgen::{
    GenConfig, GenerationReport, LevelGenerator, LevelPlan, MAX_DEPTH, MIN_BAND_START_DISTANCE,
    MIN_DESCENT_DISTANCE, Narrative, RoomKind, StoryRole, default_plan,
};
use delve_core::pathfinding::{PathRange, UNREACHABLE};
use delve_core::{CaveLayout, Pos, Terrain};

fn generator(seed: u64) -> LevelGenerator {
    LevelGenerator::new(seed, GenConfig::default()).expect("default config is valid")
}

fn on_border(pos: Pos) -> bool {
    pos.x == 0 || pos.y == 0 || pos.x == DUNGEON_WIDTH - 1 || pos.y == DUNGEON_HEIGHT - 1
}

/// Checks the invariants every generated level carries and returns a
/// description of the first one broken.
fn broken_invariant(report: &GenerationReport) -> Option<String> {
    let level = &report.level;
    let mut range = PathRange::for_dungeon();
    let distances = range.bfs(level.start, |pos| level.grid.is_passable(pos)).to_vec();

    if level.terrain_at(level.start) != Terrain::Ground {
        return Some(format!("start {:?} is {:?}", level.start, level.terrain_at(level.start)));
    }
    for pos in grid::positions() {
        let terrain = level.terrain_at(pos);
        if terrain.is_passable() && distances[grid::index_of(pos)] == UNREACHABLE {
            return Some(format!("{terrain:?} at {pos:?} is unreachable"));
        }
        if on_border(pos) && !terrain.is_wall_like() {
            return Some(format!("border cell {pos:?} is {terrain:?}"));
        }
        if level.grid.cell(pos).is_explored() {
            return Some(format!("{pos:?} starts explored"));
        }
    }

    let descents = level.grid.count(Terrain::Stairs) + level.grid.count(Terrain::BlockedStairs);
    let expected_descents = if is_final_depth(level.depth) { 0 } else { 1 };
    if descents != expected_descents {
        return Some(format!("{descents} descents at depth {}", level.depth));
    }
    let Some(descent) = level.descent else {
        return Some("no descent recorded".to_string());
    };
    let descent_terrain = level.terrain_at(descent);
    let descent_matches = if is_final_depth(level.depth) {
        descent_terrain == Terrain::Artifact
    } else {
        descent_terrain.is_descent()
    };
    if !descent_matches {
        return Some(format!("descent {descent:?} holds {descent_terrain:?}"));
    }
    if level.path(level.start, descent, &mut range).is_none() {
        return Some("no path from start to descent".to_string());
    }
    if distances[grid::index_of(descent)] < MIN_DESCENT_DISTANCE {
        return Some(format!("descent {descent:?} is next to the start {:?}", level.start));
    }
    if level.grid.count(Terrain::FakeStairs) > 1 {
        return Some("more than one decoy".to_string());
    }

    for (index, room) in report.rooms.iter().enumerate() {
        if report.rooms.len() > 1 && !room.entries.iter().any(|entry| entry.used) {
            return Some(format!("room {} has no used entry", room.template));
        }
        for other in &report.rooms[index + 1..] {
            if room.rect.expanded(1).intersects(&other.rect.expanded(1)) {
                return Some(format!("{} touches {}", room.template, other.template));
            }
        }
    }

    for band in &level.bands {
        let first = band.path[0];
        if distances[grid::index_of(first)] < MIN_BAND_START_DISTANCE {
            return Some(format!("{:?} band starts next to the player", band.kind));
        }
    }
    None
}

fn assert_level_invariants(report: &GenerationReport) {
    if let Some(broken) = broken_invariant(report) {
        let level = &report.level;
        panic!("depth {} seed {:#x}: {broken}\n{level}", level.depth, level.seed);
    }
}

#[test]
fn automata_cave_plain_level_is_connected_with_one_stair() {
    let plan = LevelPlan::bare(CaveLayout::AutomataCave);
    for seed in [1_u64, 2, 3, 40, 99] {
        let report = generator(seed).generate_with_plan(1, &plan).expect("plain level generates");
        assert_level_invariants(&report);
        assert_eq!(report.level.grid.count(Terrain::Stairs), 1);
        assert_eq!(report.level.decoy, None);
        assert!(report.level.anchors.is_empty());
        assert!(report.rooms.iter().all(|room| !room.is_featured()));
    }
}

#[test]
fn rescue_depth_places_every_story_anchor_once_in_a_reserved_room() {
    assert_eq!(default_plan(RESCUE_DEPTH).narrative, Some(Narrative::Rescue));
    for seed in [7_u64, 8, 9] {
        let report =
            generator(seed).generate_report(RESCUE_DEPTH).expect("rescue depth generates");
        assert_level_invariants(&report);
        let level = &report.level;

        let story_rooms: Vec<_> = report
            .rooms
            .iter()
            .filter(|room| room.kind == RoomKind::Story(Narrative::Rescue))
            .collect();
        assert_eq!(story_rooms.len(), 1);
        let prison = story_rooms[0];
        assert!(prison.reserved);
        assert!(!prison.rect.contains(level.start), "the player never starts in the prison");

        assert_eq!(level.anchors.len(), StoryRole::ALL.len());
        for role in StoryRole::ALL {
            let anchor = level.anchors[&role];
            assert!(prison.rect.contains(anchor), "{role:?} anchor outside the prison");
            assert!(level.grid.is_passable(anchor), "{role:?} anchor is blocked");
        }
        assert_eq!(level.grid.count(Terrain::BlockedStairs), 1);
    }
}

#[test]
fn forty_consecutive_urbanised_levels_generate() {
    let plan =
        LevelPlan { layout: CaveLayout::RandomSmallWalkCaveUrbanised, ..LevelPlan::default() };
    let generator = generator(31_337);
    for depth in 1..=MAX_DEPTH {
        for round in 0_u32..5 {
            let seeded = LevelGenerator::new(
                generator.run_seed() + u64::from(round),
                GenConfig::default(),
            )
            .expect("default config is valid");
            let report = seeded
                .generate_with_plan(depth, &plan)
                .unwrap_or_else(|error| panic!("depth {depth} round {round}: {error}"));
            assert_level_invariants(&report);
        }
    }
}

#[test]
fn first_depth_never_puts_the_stairs_beside_the_start() {
    for seed in 0..60_u64 {
        let report = generator(seed).generate_report(1).expect("depth 1 generates");
        assert_level_invariants(&report);
    }
}

#[test]
fn generated_level_serializes_to_json() {
    let level = generator(5).generate(2).expect("depth 2 generates");
    let json = serde_json::to_value(&level).expect("level serializes");
    assert_eq!(json["depth"], 2);
    assert_eq!(json["layout"], "random_walk_cave");
    assert_eq!(json["start"]["x"], level.start.x);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]
    #[test]
    fn generated_levels_keep_every_invariant(
        seed in any::<u64>(),
        depth in 1_u8..=MAX_DEPTH,
        layout_selector in 0_usize..CaveLayout::ALL.len()
    ) {
        let plan = LevelPlan { layout: CaveLayout::ALL[layout_selector], ..default_plan(depth) };
        let report = generator(seed).generate_with_plan(depth, &plan);
        prop_assert!(report.is_ok(), "seed={seed} depth={depth}: {:?}", report.err());
        if let Ok(report) = report {
            let broken = broken_invariant(&report);
            prop_assert!(broken.is_none(), "seed={seed} depth={depth}: {broken:?}");
        }
    }
}
