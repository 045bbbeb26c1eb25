//! Monster band selection: which groups populate a depth and the cells they
//! guard, patrol or roam. Decision-making belongs to the game; bands only
//! carry a behavior tag and an ordered path.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::grid;
use crate::pathfinding::UNREACHABLE;
use crate::types::{Pos, Terrain};

use super::context::GenContext;
use super::features::free_places;
use super::templates::PlaceKind;

/// No band may start closer than this many steps to the player start.
pub const MIN_BAND_START_DISTANCE: u32 = 6;
const MIN_EXPLORE_SPACING: u32 = 8;
const WANDER_POINTS: usize = 3;
const EXPLORE_POINTS: usize = 4;
const BAND_CELL_ATTEMPTS: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandKind {
    LoneGuard,
    GuardPatrol,
    Sentinels,
    HoundPack,
    Frogs,
    CaveWorms,
    Specters,
    Hunters,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Holds one point.
    Guard,
    /// Walks back and forth between two points.
    Patrol,
    Wander,
    /// Visits several widely spaced points.
    Explore,
    /// Starts far away and hunts the player.
    Chase,
}

impl BandKind {
    pub const ALL: [BandKind; 8] = [
        BandKind::LoneGuard,
        BandKind::GuardPatrol,
        BandKind::Sentinels,
        BandKind::HoundPack,
        BandKind::Frogs,
        BandKind::CaveWorms,
        BandKind::Specters,
        BandKind::Hunters,
    ];

    pub fn behavior(self) -> Behavior {
        match self {
            BandKind::LoneGuard => Behavior::Guard,
            BandKind::GuardPatrol | BandKind::Sentinels => Behavior::Patrol,
            BandKind::Frogs | BandKind::CaveWorms => Behavior::Wander,
            BandKind::Specters | BandKind::Hunters => Behavior::Explore,
            BandKind::HoundPack => Behavior::Chase,
        }
    }

    /// Patrol places the band's route is drawn from.
    fn patrol_places(self) -> PlaceKind {
        match self {
            BandKind::Sentinels => PlaceKind::SpecialPatrol,
            _ => PlaceKind::Patrol,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandInfo {
    pub kind: BandKind,
    pub path: Vec<Pos>,
    pub behavior: Behavior,
}

/// Weighted band table of a depth.
fn band_table(depth: u8) -> &'static [(BandKind, u32)] {
    match depth {
        0..=2 => &[(BandKind::LoneGuard, 4), (BandKind::GuardPatrol, 3), (BandKind::Frogs, 3)],
        3..=4 => &[
            (BandKind::LoneGuard, 3),
            (BandKind::GuardPatrol, 3),
            (BandKind::Sentinels, 2),
            (BandKind::Frogs, 2),
            (BandKind::CaveWorms, 2),
            (BandKind::HoundPack, 1),
        ],
        5..=6 => &[
            (BandKind::GuardPatrol, 3),
            (BandKind::Sentinels, 2),
            (BandKind::CaveWorms, 2),
            (BandKind::HoundPack, 2),
            (BandKind::Specters, 2),
            (BandKind::Hunters, 1),
        ],
        _ => &[
            (BandKind::GuardPatrol, 2),
            (BandKind::Sentinels, 2),
            (BandKind::HoundPack, 3),
            (BandKind::Specters, 3),
            (BandKind::Hunters, 3),
        ],
    }
}

fn band_count(depth: u8) -> usize {
    3 + usize::from(depth) / 2
}

/// Rolls the depth's bands and places the ones that fit; a band without room
/// is skipped rather than failing the level.
pub(super) fn place_bands(ctx: &mut GenContext<'_>, start: Pos) -> Vec<BandInfo> {
    let level = &ctx.grid;
    let distances = ctx.paths.bfs(start, |pos| level.is_passable(pos)).to_vec();
    let table = band_table(ctx.depth);
    let weights: Vec<u32> = table.iter().map(|&(_, weight)| weight).collect();
    let mut bands: Vec<BandInfo> = Vec::new();
    for _ in 0..band_count(ctx.depth) {
        let Some(roll) = ctx.rng.weighted(&weights) else {
            break;
        };
        let kind = table[roll].0;
        match band_path(ctx, kind, &distances, &bands) {
            Some(path) => bands.push(BandInfo { kind, path, behavior: kind.behavior() }),
            None => debug!("no room for a {kind:?} band at depth {}", ctx.depth),
        }
    }
    debug!("placed {} bands at depth {}", bands.len(), ctx.depth);
    bands
}

fn band_path(
    ctx: &mut GenContext<'_>,
    kind: BandKind,
    distances: &[u32],
    bands: &[BandInfo],
) -> Option<Vec<Pos>> {
    let can_start = |pos: Pos| {
        let distance = distances[grid::index_of(pos)];
        distance != UNREACHABLE
            && distance >= MIN_BAND_START_DISTANCE
            && !bands.iter().any(|band| band.path.first() == Some(&pos))
    };
    match kind.behavior() {
        Behavior::Guard => guard_post(ctx, kind.patrol_places(), can_start),
        Behavior::Patrol => patrol_route(ctx, kind.patrol_places(), can_start),
        Behavior::Wander => roam(ctx, WANDER_POINTS, 1, can_start),
        Behavior::Explore => roam(ctx, EXPLORE_POINTS, MIN_EXPLORE_SPACING, can_start),
        Behavior::Chase => far_cell(ctx, distances, can_start),
    }
}

fn guard_post(
    ctx: &mut GenContext<'_>,
    kind: PlaceKind,
    can_start: impl Fn(Pos) -> bool,
) -> Option<Vec<Pos>> {
    let (room, slot) = free_places(ctx, kind)
        .into_iter()
        .find(|&(room, slot)| can_start(ctx.rooms[room].places[slot].pos))?;
    let place = &mut ctx.rooms[room].places[slot];
    place.used = true;
    Some(vec![place.pos])
}

/// First point on a free place, second on the nearest other free place of the
/// same kind.
fn patrol_route(
    ctx: &mut GenContext<'_>,
    kind: PlaceKind,
    can_start: impl Fn(Pos) -> bool,
) -> Option<Vec<Pos>> {
    let spots = free_places(ctx, kind);
    let first =
        spots.iter().position(|&(room, slot)| can_start(ctx.rooms[room].places[slot].pos))?;
    let (room, slot) = spots[first];
    let from = ctx.rooms[room].places[slot].pos;
    let (other_room, other_slot) = spots
        .iter()
        .copied()
        .filter(|&spot| spot != spots[first])
        .min_by_key(|&(room, slot)| ctx.rooms[room].places[slot].pos.manhattan(from))?;
    ctx.rooms[room].places[slot].used = true;
    let to = &mut ctx.rooms[other_room].places[other_slot];
    to.used = true;
    Some(vec![from, to.pos])
}

/// Open ground or foliage a roaming or chasing band may stand on.
fn is_band_floor(ctx: &GenContext<'_>, pos: Pos) -> bool {
    ctx.components[grid::index_of(pos)] != 0
        && matches!(ctx.grid.terrain(pos), Terrain::Ground | Terrain::Foliage)
}

/// Points sampled from one open component, pairwise at least `spacing` apart.
fn roam(
    ctx: &mut GenContext<'_>,
    points: usize,
    spacing: u32,
    can_start: impl Fn(Pos) -> bool,
) -> Option<Vec<Pos>> {
    let first =
        ctx.random_cell(BAND_CELL_ATTEMPTS, |ctx, pos| is_band_floor(ctx, pos) && can_start(pos))?;
    let component = ctx.components[grid::index_of(first)];
    let cells: Vec<Pos> = grid::positions()
        .filter(|&pos| ctx.components[grid::index_of(pos)] == component)
        .filter(|&pos| is_band_floor(ctx, pos))
        .collect();
    let mut path = vec![first];
    for _ in 0..BAND_CELL_ATTEMPTS {
        if path.len() == points {
            break;
        }
        let Some(&pos) = ctx.rng.pick(&cells) else {
            break;
        };
        if path.iter().all(|&point| point.manhattan(pos) >= spacing) {
            path.push(pos);
        }
    }
    (path.len() >= 2).then_some(path)
}

/// One cell in the far half of the level, measured in steps from the start.
fn far_cell(
    ctx: &mut GenContext<'_>,
    distances: &[u32],
    can_start: impl Fn(Pos) -> bool,
) -> Option<Vec<Pos>> {
    let farthest = grid::positions()
        .filter(|&pos| is_band_floor(ctx, pos) && can_start(pos))
        .map(|pos| distances[grid::index_of(pos)])
        .max()?;
    let cells: Vec<Pos> = grid::positions()
        .filter(|&pos| is_band_floor(ctx, pos) && can_start(pos))
        .filter(|&pos| distances[grid::index_of(pos)] * 2 >= farthest)
        .collect();
    ctx.rng.pick(&cells).map(|&pos| vec![pos])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapgen::cave::CarveTuning;
    use crate::mapgen::features::add_features;
    use crate::mapgen::progression::{LevelPlan, MAX_DEPTH};
    use crate::mapgen::test_support::connected_rooms_fixture;
    use crate::pathfinding::PathRange;
    use crate::types::CaveLayout;

    const ROOMS: [(&str, Pos); 4] = [
        ("long-gallery", Pos::new(3, 2)),
        ("twin-chamber", Pos::new(25, 11)),
        ("corridor-room", Pos::new(45, 3)),
        ("barracks", Pos::new(62, 10)),
    ];

    fn check_bands(bands: &[BandInfo], ctx: &GenContext<'_>, start: Pos) {
        let mut paths = PathRange::for_dungeon();
        let distances = paths.bfs(start, |pos| ctx.grid.is_passable(pos)).to_vec();
        for (index, band) in bands.iter().enumerate() {
            assert_eq!(band.behavior, band.kind.behavior());
            let first = band.path[0];
            assert!(distances[grid::index_of(first)] >= MIN_BAND_START_DISTANCE, "{band:?}");
            assert!(band.path.iter().all(|&pos| ctx.grid.is_passable(pos)), "{band:?}");
            assert!(
                bands[..index].iter().all(|other| other.path[0] != first),
                "two bands start on {first:?}"
            );
            match band.behavior {
                Behavior::Guard | Behavior::Chase => assert_eq!(band.path.len(), 1),
                Behavior::Patrol => assert_eq!(band.path.len(), 2),
                Behavior::Wander => assert!((2..=WANDER_POINTS).contains(&band.path.len())),
                Behavior::Explore => {
                    assert!((2..=EXPLORE_POINTS).contains(&band.path.len()));
                    for (at, &a) in band.path.iter().enumerate() {
                        for &b in &band.path[at + 1..] {
                            assert!(a.manhattan(b) >= MIN_EXPLORE_SPACING, "{band:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn bands_respect_start_distance_and_path_shapes_at_every_depth() {
        let tuning = CarveTuning::default();
        let plan = LevelPlan::bare(CaveLayout::AutomataCave);
        for depth in 1..=MAX_DEPTH {
            let mut ctx = GenContext::new(depth, &plan, &tuning, u64::from(depth) * 31);
            let start = connected_rooms_fixture(&mut ctx, &ROOMS);
            add_features(&mut ctx, start).expect("features fit");
            let bands = place_bands(&mut ctx, start);
            assert!(!bands.is_empty(), "depth {depth} placed no band");
            assert!(bands.len() <= band_count(depth));
            check_bands(&bands, &ctx, start);
        }
    }

    #[test]
    fn sentinels_need_special_patrol_places() {
        let tuning = CarveTuning::default();
        let plan = LevelPlan::bare(CaveLayout::AutomataCave);
        let mut ctx = GenContext::new(5, &plan, &tuning, 3);
        let start = connected_rooms_fixture(&mut ctx, &ROOMS[..3]);
        add_features(&mut ctx, start).expect("features fit");
        let level = &ctx.grid;
        let distances = ctx.paths.bfs(start, |pos| level.is_passable(pos)).to_vec();

        assert_eq!(band_path(&mut ctx, BandKind::Sentinels, &distances, &[]), None);
        let route = band_path(&mut ctx, BandKind::GuardPatrol, &distances, &[])
            .expect("ordinary rooms carry patrol places");
        assert_eq!(route.len(), 2);
    }

    #[test]
    fn every_depth_table_rolls_known_weights() {
        for depth in 1..=MAX_DEPTH {
            let table = band_table(depth);
            assert!(table.iter().all(|&(_, weight)| weight > 0));
            assert!(table.iter().all(|(kind, _)| BandKind::ALL.contains(kind)));
        }
    }
}
