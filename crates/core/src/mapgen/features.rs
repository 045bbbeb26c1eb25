//! Feature pass: dresses a connected room-and-tunnel network with doors,
//! lakes, openings, furniture and the way down.
//!
//! Every step either keeps passability unchanged or re-runs the validator, and
//! blocking objects only go where the local articulation test allows them.

use std::collections::{BTreeMap, BTreeSet};
use std::iter;

use log::debug;

use crate::error::{GenError, GenResult};
use crate::grid::{self, Grid};
use crate::pathfinding::{UNREACHABLE, WalkPather};
use crate::types::{Pos, Terrain};

use super::context::{CellTag, GenContext};
use super::progression::is_final_depth;
use super::templates::{PlaceKind, StoryRole};
use super::validate::validate_connectivity;

const LAKE_SEED_ATTEMPTS: usize = 400;
const MIN_LAKE_CELLS: i32 = 10;
const MAX_LAKE_CELLS: i32 = 28;
const DESCENT_JITTER: usize = 8;
const MIN_DECOY_DISTANCE: u32 = 12;
/// Walking distance the real descent keeps from the player start whenever the
/// level has room for it.
pub const MIN_DESCENT_DISTANCE: u32 = 12;
const TREE_ATTEMPTS: usize = 60;
const ITEM_SPOT_ATTEMPTS: usize = 200;

/// Positions the feature pass hands to the level model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct FeatureMarks {
    /// Stairs, blocked stairs or the artifact on the final depth.
    pub(super) descent: Option<Pos>,
    pub(super) decoy: Option<Pos>,
    pub(super) anchors: BTreeMap<StoryRole, Pos>,
    pub(super) item_spots: Vec<Pos>,
}

/// Random ground cell of a room the player may start in. Rooms that could hold
/// the descent are tried last. Falls back to any ground cell of the largest
/// passable region.
pub(super) fn choose_start(ctx: &mut GenContext<'_>) -> GenResult<Pos> {
    let mut rooms: Vec<usize> = ctx
        .rooms
        .iter()
        .enumerate()
        .filter(|(_, room)| room.connected && !room.reserved && !room.is_featured())
        .map(|(index, _)| index)
        .collect();
    ctx.rng.shuffle(&mut rooms);
    rooms.sort_by_key(|&room| {
        ctx.rooms[room].places_of(PlaceKind::SpecialStatic).any(|place| !place.used)
    });
    for room in rooms {
        let cells = start_cells(ctx, room);
        if let Some(&pos) = ctx.rng.pick(&cells) {
            debug!("player starts at ({}, {}) in {}", pos.x, pos.y, ctx.rooms[room].template);
            return Ok(pos);
        }
    }

    let sizes = ctx.label_passable_components();
    let largest = (1..sizes.len()).max_by_key(|&id| (sizes[id], usize::MAX - id));
    let in_largest = |pos: Pos| {
        let id = ctx.components[grid::index_of(pos)] as usize;
        largest.is_some_and(|largest| largest == id)
    };
    let cells: Vec<Pos> = grid::positions()
        .filter(|&pos| ctx.grid.terrain(pos) == Terrain::Ground && in_largest(pos))
        .collect();
    ctx.rng.pick(&cells).copied().ok_or_else(|| GenError::PlacementExhausted {
        what: "player start".to_string(),
        attempts: ctx.rooms.len(),
    })
}

/// Plain ground of `room` that its marker cells can walk to.
fn start_cells(ctx: &mut GenContext<'_>, room: usize) -> Vec<Pos> {
    let room = &ctx.rooms[room];
    let level = &ctx.grid;
    let Some(anchor) = room
        .places
        .iter()
        .filter(|place| place.kind != PlaceKind::Door)
        .map(|place| place.pos)
        .find(|&pos| level.is_passable(pos))
    else {
        return Vec::new();
    };
    let distances = ctx.paths.bfs(anchor, |pos| level.is_passable(pos));
    let rect = room.rect;
    (rect.y..=rect.bottom())
        .flat_map(|y| (rect.x..=rect.right()).map(move |x| Pos::new(x, y)))
        .filter(|&pos| {
            let index = grid::index_of(pos);
            level.terrain(pos) == Terrain::Ground
                && ctx.tags[index] == CellTag::Room
                && distances[index] != UNREACHABLE
                && !room.places.iter().any(|place| place.pos == pos)
        })
        .collect()
}

/// Runs every feature step in order and finishes with a validation pass.
pub(super) fn add_features(ctx: &mut GenContext<'_>, start: Pos) -> GenResult<FeatureMarks> {
    let mut marks = FeatureMarks::default();
    dig_lakes(ctx, start)?;
    open_doors(ctx);
    pierce_walls(ctx);
    place_descent(ctx, start, &mut marks)?;
    place_magic_stones(ctx, start);
    collect_anchors(ctx, &mut marks);

    let mut protected: BTreeSet<Pos> = marks.anchors.values().copied().collect();
    protected.insert(start);
    protected.extend(marks.descent);
    protected.extend(marks.decoy);
    for room in &ctx.rooms {
        protected.extend(room.entries.iter().map(|entry| entry.pos));
    }
    furnish(ctx, &protected);
    plant_trees(ctx, &protected);
    choose_item_spots(ctx, &protected, &mut marks);

    validate_connectivity(ctx, start, "features")?;
    for (role, &pos) in &marks.anchors {
        if !ctx.grid.is_passable(pos) {
            return Err(GenError::Unreachable { what: format!("{role:?} anchor") });
        }
    }
    label_open_components(ctx);
    Ok(marks)
}

fn is_lake_rock(ctx: &GenContext<'_>, pos: Pos) -> bool {
    grid::in_interior(pos) && ctx.is_wild(pos) && ctx.grid.terrain(pos) == Terrain::Wall
}

fn dig_lakes(ctx: &mut GenContext<'_>, start: Pos) -> GenResult<()> {
    let terrain = ctx.plan.lake_terrain;
    for lake in 0..ctx.plan.lakes {
        let seed = ctx.random_cell(LAKE_SEED_ATTEMPTS, |ctx, pos| {
            is_lake_rock(ctx, pos)
                && pos.neighbors4().into_iter().any(|next| ctx.grid.is_passable(next))
        });
        let Some(seed) = seed else {
            debug!("no shore found for lake {lake}");
            continue;
        };
        let target = ctx.rng.range_i32(MIN_LAKE_CELLS, MAX_LAKE_CELLS) as usize;
        let mut frontier = vec![seed];
        let mut cells = 0;
        while cells < target && !frontier.is_empty() {
            let index = ctx.rng.below(frontier.len());
            let pos = frontier.swap_remove(index);
            if !is_lake_rock(ctx, pos) {
                continue;
            }
            ctx.grid.set(pos, terrain);
            cells += 1;
            frontier.extend(pos.neighbors4().into_iter().filter(|&next| is_lake_rock(ctx, next)));
        }
        debug!("lake {lake}: {cells} cells of {terrain:?} from ({}, {})", seed.x, seed.y);
        validate_connectivity(ctx, start, "lake")?;
    }
    Ok(())
}

/// Used entries become doors; used virtual entries stay bare ground.
fn open_doors(ctx: &mut GenContext<'_>) {
    for room in &mut ctx.rooms {
        let doors: Vec<Pos> = room
            .entries
            .iter()
            .filter(|entry| entry.used && !entry.virtual_entry)
            .map(|entry| entry.pos)
            .collect();
        for &pos in &doors {
            ctx.grid.set(pos, Terrain::Door);
        }
        for place in &mut room.places {
            if place.kind == PlaceKind::Door && doors.contains(&place.pos) {
                place.used = true;
            }
        }
    }
}

/// A room wall with walls on both sides along one axis and walkable cells on
/// both sides along the other, exactly one of them inside the room.
fn is_window_spot(ctx: &GenContext<'_>, pos: Pos) -> bool {
    if !grid::in_interior(pos) || ctx.grid.terrain(pos) != Terrain::Wall {
        return false;
    }
    let Some(room) = ctx.room_at(pos) else {
        return false;
    };
    let rect = ctx.rooms[room].rect;
    let level = &ctx.grid;
    let spans = |walls: [Pos; 2], open: [Pos; 2]| {
        walls.iter().all(|&side| level.terrain(side).is_wall_like())
            && open.iter().all(|&side| level.is_passable(side))
            && rect.contains(open[0]) != rect.contains(open[1])
    };
    let [north, east, south, west] = pos.neighbors4();
    spans([west, east], [north, south]) || spans([north, south], [west, east])
}

fn pierce_walls(ctx: &mut GenContext<'_>) {
    let plan = ctx.plan;
    if plan.windows + plan.holes == 0 {
        return;
    }
    let mut candidates: Vec<Pos> =
        grid::positions().filter(|&pos| is_window_spot(ctx, pos)).collect();
    ctx.rng.shuffle(&mut candidates);
    let mut openings = iter::repeat_n(Terrain::Window, plan.windows)
        .chain(iter::repeat_n(Terrain::HoledWall, plan.holes))
        .peekable();
    for pos in candidates {
        if openings.peek().is_none() {
            break;
        }
        let crowded = pos
            .neighbors4()
            .into_iter()
            .any(|next| matches!(ctx.grid.terrain(next), Terrain::Window | Terrain::HoledWall));
        if crowded {
            continue;
        }
        if let Some(opening) = openings.next() {
            ctx.grid.set(pos, opening);
        }
    }
    let missing = openings.count();
    if missing > 0 {
        debug!("{missing} wall openings found no spot");
    }
}

/// Unused special-static place with the best distance-plus-jitter score.
fn best_special_static(
    ctx: &mut GenContext<'_>,
    distances: &[u32],
    start: Pos,
    accept: impl Fn(Pos) -> bool,
) -> Option<(usize, usize)> {
    let mut best: Option<((usize, usize), u64)> = None;
    for room in 0..ctx.rooms.len() {
        for slot in 0..ctx.rooms[room].places.len() {
            let place = ctx.rooms[room].places[slot];
            if place.kind != PlaceKind::SpecialStatic
                || place.used
                || place.pos == start
                || ctx.grid.terrain(place.pos) != Terrain::Ground
                || !accept(place.pos)
            {
                continue;
            }
            let distance = distances[grid::index_of(place.pos)];
            if distance == UNREACHABLE {
                continue;
            }
            let score = u64::from(distance) + ctx.rng.below(DESCENT_JITTER) as u64;
            if best.is_none_or(|(_, top)| score > top) {
                best = Some(((room, slot), score));
            }
        }
    }
    best.map(|(found, _)| found)
}

fn farthest_ground(ctx: &GenContext<'_>, distances: &[u32], start: Pos) -> Option<Pos> {
    grid::positions()
        .filter(|&pos| pos != start && ctx.grid.terrain(pos) == Terrain::Ground)
        .filter(|&pos| distances[grid::index_of(pos)] != UNREACHABLE)
        .max_by_key(|&pos| distances[grid::index_of(pos)])
}

fn place_descent(ctx: &mut GenContext<'_>, start: Pos, marks: &mut FeatureMarks) -> GenResult<()> {
    let final_depth = is_final_depth(ctx.depth);
    let level = &ctx.grid;
    let from_start = ctx.paths.bfs(start, |pos| level.is_passable(pos)).to_vec();

    let far_from_start = |pos: Pos| from_start[grid::index_of(pos)] >= MIN_DESCENT_DISTANCE;
    let descent = match best_special_static(ctx, &from_start, start, far_from_start) {
        Some((room, slot)) => {
            ctx.rooms[room].places[slot].used = true;
            ctx.rooms[room].places[slot].pos
        }
        None => farthest_ground(ctx, &from_start, start)
            .ok_or_else(|| GenError::Unreachable { what: "descent spot".to_string() })?,
    };
    let terrain = if final_depth {
        Terrain::Artifact
    } else if ctx.plan.blocked_descent {
        Terrain::BlockedStairs
    } else {
        Terrain::Stairs
    };
    ctx.grid.set(descent, terrain);
    let mut pather = WalkPather::new(&ctx.grid);
    if ctx.paths.astar(&mut pather, start, descent).is_none() {
        let what = format!("{terrain:?} at ({}, {})", descent.x, descent.y);
        return Err(GenError::Unreachable { what });
    }
    debug!("{terrain:?} at ({}, {})", descent.x, descent.y);
    marks.descent = Some(descent);

    if !ctx.plan.decoy_descent || final_depth {
        return Ok(());
    }
    let level = &ctx.grid;
    let from_descent = ctx.paths.bfs(descent, |pos| level.is_passable(pos)).to_vec();
    let far_enough = |pos: Pos| {
        let distance = from_descent[grid::index_of(pos)];
        distance != UNREACHABLE && distance >= MIN_DECOY_DISTANCE
    };
    match best_special_static(ctx, &from_start, start, far_enough) {
        Some((room, slot)) => {
            let place = &mut ctx.rooms[room].places[slot];
            place.used = true;
            ctx.grid.set(place.pos, Terrain::FakeStairs);
            marks.decoy = Some(place.pos);
        }
        None => debug!("no decoy spot far enough from the descent"),
    }
    Ok(())
}

/// Unused places of `kind` on plain ground, in shuffled order.
pub(super) fn free_places(ctx: &mut GenContext<'_>, kind: PlaceKind) -> Vec<(usize, usize)> {
    let mut free = Vec::new();
    for (room_index, room) in ctx.rooms.iter().enumerate() {
        for (slot, place) in room.places.iter().enumerate() {
            if place.kind == kind && !place.used && ctx.grid.terrain(place.pos) == Terrain::Ground {
                free.push((room_index, slot));
            }
        }
    }
    ctx.rng.shuffle(&mut free);
    free
}

fn place_magic_stones(ctx: &mut GenContext<'_>, start: Pos) {
    let spots = free_places(ctx, PlaceKind::SpecialStatic);
    let mut placed = 0;
    for (room, slot) in spots {
        if placed == ctx.plan.magic_stones {
            break;
        }
        let place = &mut ctx.rooms[room].places[slot];
        if place.pos == start {
            continue;
        }
        place.used = true;
        ctx.grid.set(place.pos, Terrain::MagicStone);
        placed += 1;
    }
}

fn collect_anchors(ctx: &mut GenContext<'_>, marks: &mut FeatureMarks) {
    for room in &mut ctx.rooms {
        for place in &mut room.places {
            if let PlaceKind::Story(role) = place.kind {
                place.used = true;
                marks.anchors.insert(role, place.pos);
            }
        }
    }
}

/// Blocking `pos` cannot split the walkable region when its walkable
/// orthogonal neighbours all lie in one walkable arc of the 8-ring.
pub(super) fn is_safe_to_block(level: &Grid, pos: Pos) -> bool {
    let open = pos.ring8().map(|cell| level.is_passable(cell));
    let Some(gap) = open.iter().position(|&cell| !cell) else {
        return true;
    };
    let mut arcs = 0;
    let mut in_arc = false;
    let mut touches_orthogonal = false;
    for step in 1..=open.len() {
        let index = (gap + step) % open.len();
        if open[index] {
            in_arc = true;
            touches_orthogonal |= index % 2 == 0;
        } else if in_arc {
            arcs += usize::from(touches_orthogonal);
            in_arc = false;
            touches_orthogonal = false;
        }
    }
    arcs <= 1
}

fn furnish(ctx: &mut GenContext<'_>, protected: &BTreeSet<Pos>) {
    let plan = ctx.plan;
    let mut spots = free_places(ctx, PlaceKind::Static);
    let objects = iter::repeat_n(Terrain::Light, plan.lights)
        .chain(iter::repeat_n(Terrain::Table, plan.tables))
        .chain(iter::repeat_n(Terrain::Barrel, plan.barrels));
    for object in objects {
        let blocking = !object.is_passable();
        let found = spots.iter().position(|&(room, slot)| {
            let pos = ctx.rooms[room].places[slot].pos;
            !protected.contains(&pos) && (!blocking || is_safe_to_block(&ctx.grid, pos))
        });
        let Some(found) = found else {
            debug!("no static place left for {object:?}");
            continue;
        };
        let (room, slot) = spots.remove(found);
        let place = &mut ctx.rooms[room].places[slot];
        place.used = true;
        ctx.grid.set(place.pos, object);
    }
}

fn plant_trees(ctx: &mut GenContext<'_>, protected: &BTreeSet<Pos>) {
    for planted in 0..ctx.plan.trees {
        let spot = ctx.random_cell(TREE_ATTEMPTS, |ctx, pos| {
            ctx.is_wild(pos)
                && matches!(ctx.grid.terrain(pos), Terrain::Ground | Terrain::Foliage)
                && !protected.contains(&pos)
                && is_safe_to_block(&ctx.grid, pos)
        });
        let Some(pos) = spot else {
            debug!("planted {planted} of {} trees", ctx.plan.trees);
            return;
        };
        ctx.grid.set(pos, Terrain::Tree);
    }
}

fn choose_item_spots(
    ctx: &mut GenContext<'_>,
    protected: &BTreeSet<Pos>,
    marks: &mut FeatureMarks,
) {
    let wanted = ctx.plan.items;
    for (room, slot) in free_places(ctx, PlaceKind::Item) {
        if marks.item_spots.len() == wanted {
            return;
        }
        let place = &mut ctx.rooms[room].places[slot];
        if protected.contains(&place.pos) {
            continue;
        }
        place.used = true;
        marks.item_spots.push(place.pos);
    }
    while marks.item_spots.len() < wanted {
        let spot = ctx.random_cell(ITEM_SPOT_ATTEMPTS, |ctx, pos| {
            ctx.tag(pos) == Some(CellTag::Room)
                && ctx.grid.terrain(pos) == Terrain::Ground
                && !protected.contains(&pos)
                && !marks.item_spots.contains(&pos)
        });
        let Some(pos) = spot else {
            debug!("found {} of {wanted} item spots", marks.item_spots.len());
            return;
        };
        marks.item_spots.push(pos);
    }
}

/// Open terrain is walkable ground that is neither a door nor a stair.
pub(super) fn is_open(terrain: Terrain) -> bool {
    terrain.is_passable()
        && !matches!(terrain, Terrain::Door | Terrain::FakeStairs)
        && !terrain.is_descent()
}

fn label_open_components(ctx: &mut GenContext<'_>) {
    let level = &ctx.grid;
    let labels = ctx.paths.components(|pos| is_open(level.terrain(pos)));
    ctx.components.clear();
    ctx.components.extend_from_slice(labels);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapgen::cave::CarveTuning;
    use crate::mapgen::progression::{LevelPlan, MAX_DEPTH};
    use crate::mapgen::test_support::{connected_rooms_fixture, stamp_named, unreached_passable};
    use crate::types::CaveLayout;

    fn grid_from(rows: &[&str]) -> Grid {
        let mut level = Grid::filled(Terrain::Wall);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '.' {
                    level.set(Pos::new(x as i32 + 1, y as i32 + 1), Terrain::Ground);
                }
            }
        }
        level
    }

    #[test]
    fn articulation_test_rejects_corridors_and_corners() {
        let corridor = grid_from(&["#.#", "#.#", "#.#"]);
        assert!(!is_safe_to_block(&corridor, Pos::new(2, 2)));

        let dead_end = grid_from(&["#.#", "#.#", "###"]);
        assert!(is_safe_to_block(&dead_end, Pos::new(2, 2)));

        let corner = grid_from(&["#.#", "#..", "###"]);
        assert!(!is_safe_to_block(&corner, Pos::new(2, 2)));

        let rounded = grid_from(&["#..", "#..", "###"]);
        assert!(is_safe_to_block(&rounded, Pos::new(2, 2)));

        let hall = grid_from(&["...", "...", "..."]);
        assert!(is_safe_to_block(&hall, Pos::new(2, 2)));

        let diagonal_only = grid_from(&["..#", "#..", "###"]);
        assert!(!is_safe_to_block(&diagonal_only, Pos::new(2, 2)));
    }

    #[test]
    fn start_prefers_room_ground_and_falls_back_to_the_largest_region() {
        let plan = LevelPlan::bare(CaveLayout::AutomataCave);
        let tuning = CarveTuning::default();
        let mut ctx = GenContext::new(1, &plan, &tuning, 3);
        let start = connected_rooms_fixture(&mut ctx, &[("small-hall", Pos::new(10, 5))]);
        let room = &ctx.rooms[0];
        assert!(room.rect.contains(start));
        assert_eq!(ctx.grid.terrain(start), Terrain::Ground);
        assert!(room.places.iter().all(|place| place.pos != start), "start sits on a marker");

        let mut cave = GenContext::new(1, &plan, &tuning, 3);
        assert!(matches!(choose_start(&mut cave), Err(GenError::PlacementExhausted { .. })));
        for x in 5..8 {
            cave.grid.set(Pos::new(x, 3), Terrain::Ground);
        }
        for x in 20..30 {
            cave.grid.set(Pos::new(x, 10), Terrain::Ground);
        }
        let start = choose_start(&mut cave).expect("cave ground exists");
        assert_eq!(start.y, 10);
    }

    #[test]
    fn window_spots_need_walkable_cells_on_both_sides_of_the_wall() {
        let plan = LevelPlan::bare(CaveLayout::AutomataCave);
        let tuning = CarveTuning::default();
        let mut ctx = GenContext::new(1, &plan, &tuning, 1);
        stamp_named(&mut ctx, "small-hall", Pos::new(10, 5));

        assert!(!is_window_spot(&ctx, Pos::new(11, 5)));
        ctx.grid.set(Pos::new(11, 4), Terrain::Ground);
        assert!(is_window_spot(&ctx, Pos::new(11, 5)));
        assert!(!is_window_spot(&ctx, Pos::new(10, 5)), "corners have no inner side");
        assert!(!is_window_spot(&ctx, Pos::new(11, 4)), "not a wall");
    }

    #[test]
    fn descent_lands_on_the_special_place_with_doors_on_used_entries() {
        let plan = LevelPlan::bare(CaveLayout::AutomataCave);
        let tuning = CarveTuning::default();
        let mut ctx = GenContext::new(2, &plan, &tuning, 7);
        let rooms = [("pillared", Pos::new(10, 5)), ("small-hall", Pos::new(45, 9))];
        let start = connected_rooms_fixture(&mut ctx, &rooms);

        let marks = add_features(&mut ctx, start).expect("features fit");
        assert_eq!(marks.descent, Some(Pos::new(14, 8)));
        assert_eq!(ctx.grid.terrain(Pos::new(14, 8)), Terrain::Stairs);
        assert_eq!(ctx.grid.count(Terrain::Stairs), 1);
        assert_eq!(marks.decoy, None);
        assert_eq!(unreached_passable(&ctx.grid, start), 0);

        for room in &ctx.rooms {
            assert!(room.entries.iter().any(|entry| entry.used), "{} is isolated", room.template);
            for entry in &room.entries {
                let expected = match (entry.used, entry.virtual_entry) {
                    (true, false) => Terrain::Door,
                    (true, true) => Terrain::Ground,
                    (false, _) => Terrain::Wall,
                };
                assert_eq!(ctx.grid.terrain(entry.pos), expected, "entry {:?}", entry.pos);
            }
        }
        assert!(
            ctx.components.iter().enumerate().all(|(index, &id)| {
                (id != 0) == is_open(ctx.grid.terrain(grid::pos_of(index)))
            }),
            "component ids cover exactly the open cells"
        );
    }

    #[test]
    fn descent_skips_the_special_place_next_to_the_start() {
        let plan = LevelPlan::bare(CaveLayout::AutomataCave);
        let tuning = CarveTuning::default();
        for seed in 0..6 {
            let mut ctx = GenContext::new(1, &plan, &tuning, seed);
            let rooms = [("pillared", Pos::new(4, 4)), ("pillared", Pos::new(50, 10))];
            let start = connected_rooms_fixture(&mut ctx, &rooms);
            let marks = add_features(&mut ctx, start).expect("features fit");

            let descent = marks.descent.expect("descent placed");
            let home = ctx.rooms.iter().position(|room| room.rect.contains(start));
            let other = ctx.rooms[1 - home.expect("start inside a room")].rect;
            assert_eq!(descent, Pos::new(other.x + 4, other.y + 3), "seed {seed}");
            let distances = ctx.paths.bfs(start, |pos| ctx.grid.is_passable(pos));
            assert!(distances[grid::index_of(descent)] >= MIN_DESCENT_DISTANCE);
        }
    }

    #[test]
    fn blocked_and_final_depths_change_the_descent_terrain() {
        let tuning = CarveTuning::default();
        let blocked = LevelPlan {
            blocked_descent: true,
            ..LevelPlan::bare(CaveLayout::AutomataCave)
        };
        let mut ctx = GenContext::new(3, &blocked, &tuning, 11);
        let start = connected_rooms_fixture(&mut ctx, &[("pillared", Pos::new(30, 6))]);
        let marks = add_features(&mut ctx, start).expect("features fit");
        assert_eq!(marks.descent.map(|pos| ctx.grid.terrain(pos)), Some(Terrain::BlockedStairs));

        let plain = LevelPlan::bare(CaveLayout::AutomataCave);
        let mut ctx = GenContext::new(MAX_DEPTH, &plain, &tuning, 11);
        let start = connected_rooms_fixture(&mut ctx, &[("pillared", Pos::new(30, 6))]);
        let marks = add_features(&mut ctx, start).expect("features fit");
        assert_eq!(marks.descent.map(|pos| ctx.grid.terrain(pos)), Some(Terrain::Artifact));
        assert!(ctx.grid.find(Terrain::Stairs).next().is_none());
        assert!(ctx.grid.find(Terrain::BlockedStairs).next().is_none());
    }

    #[test]
    fn decoy_stays_far_from_the_real_descent() {
        let tuning = CarveTuning::default();
        let plan = LevelPlan { decoy_descent: true, ..LevelPlan::bare(CaveLayout::AutomataCave) };
        let mut ctx = GenContext::new(3, &plan, &tuning, 5);
        let rooms = [("pillared", Pos::new(2, 2)), ("barracks", Pos::new(50, 5))];
        let start = connected_rooms_fixture(&mut ctx, &rooms);

        let marks = add_features(&mut ctx, start).expect("features fit");
        let descent = marks.descent.expect("descent placed");
        let decoy = marks.decoy.expect("decoy placed");
        assert_eq!(ctx.grid.count(Terrain::FakeStairs), 1);
        assert_eq!(ctx.grid.terrain(decoy), Terrain::FakeStairs);
        let distances = ctx.paths.bfs(descent, |pos| ctx.grid.is_passable(pos));
        assert!(distances[grid::index_of(decoy)] >= MIN_DECOY_DISTANCE);
    }

    #[test]
    fn lakes_and_furniture_keep_the_level_connected() {
        let tuning = CarveTuning::default();
        let plan = LevelPlan {
            lakes: 2,
            lights: 3,
            tables: 3,
            barrels: 2,
            items: 4,
            windows: 2,
            holes: 1,
            trees: 4,
            ..LevelPlan::bare(CaveLayout::AutomataCave)
        };
        let mut ctx = GenContext::new(2, &plan, &tuning, 99);
        let start = connected_rooms_fixture(
            &mut ctx,
            &[
                ("corridor-room", Pos::new(4, 3)),
                ("twin-chamber", Pos::new(30, 8)),
                ("long-gallery", Pos::new(60, 2)),
            ],
        );

        let marks = add_features(&mut ctx, start).expect("features fit");
        assert!(ctx.grid.count(Terrain::Water) >= 2 * MIN_LAKE_CELLS as usize);
        assert_eq!(unreached_passable(&ctx.grid, start), 0);
        assert_eq!(marks.item_spots.len(), 4);
        assert!(marks.item_spots.iter().all(|&pos| ctx.grid.is_passable(pos)));
        assert!(!marks.item_spots.contains(&start));
        assert!(ctx.grid.is_passable(start));
    }
}
