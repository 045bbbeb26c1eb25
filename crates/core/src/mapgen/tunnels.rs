//! Tunnel connector: joins rooms into one network with A*-carved tunnels,
//! then adds loops and pulls stray cave pockets into the network.

use log::debug;

use crate::error::{GenError, GenResult};
use crate::grid::{self, Grid};
use crate::pathfinding::{Pather, UNREACHABLE};
use crate::types::{CaveLayout, Pos, Terrain};

use super::context::{CellTag, GenContext, component_sizes};
use super::rooms::Room;
use super::templates::PlaceKind;

const CHEAP_STEP_COST: u32 = 1;
const WILD_FLOOR_COST: u32 = 2;
const ROOM_CROSSING_COST: u32 = 50;
const ROCK_BASE_COST: u32 = 4;
/// Wild pockets smaller than this are left to the validator.
pub(super) const MIN_CAVE_FRAGMENT: usize = 12;
const MAX_FRAGMENT_LINKS: usize = 32;
const NEAREST_LOOP_CANDIDATES: usize = 3;

/// Cost model for digging: cheap along existing tunnels and the two rooms
/// being joined, expensive through any other room.
struct TunnelPather<'c> {
    grid: &'c Grid,
    tags: &'c [CellTag],
    rooms: &'c [Room],
    endpoints: [Option<usize>; 2],
}

impl TunnelPather<'_> {
    fn is_endpoint_entry(&self, pos: Pos) -> bool {
        self.endpoints
            .iter()
            .flatten()
            .any(|&room| self.rooms[room].entry_at(pos).is_some())
    }
}

impl Pather for TunnelPather<'_> {
    fn neighbors(&mut self, pos: Pos, out: &mut Vec<Pos>) {
        out.extend(pos.neighbors4().into_iter().filter(|&next| grid::in_interior(next)));
    }

    fn cost(&self, _from: Pos, to: Pos) -> u32 {
        if self.is_endpoint_entry(to) {
            return CHEAP_STEP_COST;
        }
        match self.tags[grid::index_of(to)] {
            CellTag::Tunnel => CHEAP_STEP_COST,
            CellTag::Room => ROOM_CROSSING_COST,
            CellTag::Wild if self.grid.is_passable(to) => WILD_FLOOR_COST,
            CellTag::Wild => ROCK_BASE_COST + self.grid.walls_around(to) / 2,
        }
    }

    fn estimation(&self, from: Pos, to: Pos) -> u32 {
        from.manhattan(to)
    }
}

fn extra_tunnels(layout: CaveLayout) -> usize {
    match layout {
        CaveLayout::AutomataCave => 2,
        CaveLayout::RandomWalkCave => 3,
        CaveLayout::RandomWalkTreeCave => 4,
        CaveLayout::RandomSmallWalkCaveUrbanised => 6,
    }
}

/// Featured rooms first, then rooms nearer the grid centre.
fn connection_order(rooms: &[Room]) -> Vec<usize> {
    let center = grid::center();
    let mut order: Vec<usize> = (0..rooms.len()).collect();
    order.sort_by_key(|&index| {
        let room = &rooms[index];
        (!room.is_featured(), room.center().manhattan(center), index)
    });
    order
}

fn nearest_room(rooms: &[Room], from: usize, accept: impl Fn(&Room) -> bool) -> Option<usize> {
    let center = rooms[from].center();
    (0..rooms.len())
        .filter(|&index| index != from && accept(&rooms[index]))
        .min_by_key(|&index| (rooms[index].center().manhattan(center), index))
}

/// Entry of `room` closest to `toward`, unused entries first.
fn pick_entry(room: &Room, toward: Pos) -> Option<Pos> {
    let closest = |unused_only: bool| {
        room.entries
            .iter()
            .filter(|entry| !unused_only || !entry.used)
            .min_by_key(|entry| entry.pos.manhattan(toward))
            .map(|entry| entry.pos)
    };
    closest(true).or_else(|| closest(false))
}

/// Joins every room to the network rooted at the first room in connection
/// order, then digs the layout's loop tunnels and links cave pockets.
pub(super) fn connect_rooms(ctx: &mut GenContext<'_>) -> GenResult<()> {
    let order = connection_order(&ctx.rooms);
    let Some((&root, rest)) = order.split_first() else {
        return Ok(());
    };
    ctx.rooms[root].connected = true;
    for &index in rest {
        if ctx.rooms[index].connected {
            continue;
        }
        let Some(target) = nearest_room(&ctx.rooms, index, |room| room.connected) else {
            return Err(GenError::Disconnected { room: index });
        };
        if !dig_between(ctx, index, target) {
            return Err(GenError::Disconnected { room: index });
        }
        ctx.rooms[index].connected = true;
    }

    add_loop_tunnels(ctx);
    link_cave_fragments(ctx, root);

    if let Some(room) = ctx.rooms.iter().position(|room| !room.connected) {
        return Err(GenError::Disconnected { room });
    }
    debug!("connected {} rooms", ctx.rooms.len());
    Ok(())
}

fn dig_between(ctx: &mut GenContext<'_>, from_room: usize, to_room: usize) -> bool {
    let Some(from) = pick_entry(&ctx.rooms[from_room], ctx.rooms[to_room].center()) else {
        return false;
    };
    let Some(to) = pick_entry(&ctx.rooms[to_room], from) else {
        return false;
    };
    dig(ctx, from, to, [Some(from_room), Some(to_room)])
}

fn dig(ctx: &mut GenContext<'_>, from: Pos, to: Pos, endpoints: [Option<usize>; 2]) -> bool {
    let mut pather =
        TunnelPather { grid: &ctx.grid, tags: &ctx.tags, rooms: &ctx.rooms, endpoints };
    let Some(found) = ctx.paths.astar(&mut pather, from, to) else {
        return false;
    };
    carve_path(ctx, &found.path);
    true
}

fn carve_path(ctx: &mut GenContext<'_>, path: &[Pos]) {
    for &pos in path {
        if !ctx.grid.is_passable(pos) {
            if ctx.is_wild(pos) {
                ctx.set_tag(pos, CellTag::Tunnel);
            }
            ctx.grid.set(pos, Terrain::Ground);
        }
        for room in &mut ctx.rooms {
            if let Some(entry) = room.entry_at(pos) {
                room.entries[entry].used = true;
                room.connected = true;
            }
        }
    }
}

/// Extra tunnels between a random room and one of its nearest rooms, so the
/// network is not a pure tree.
fn add_loop_tunnels(ctx: &mut GenContext<'_>) {
    let room_count = ctx.rooms.len();
    if room_count < 3 {
        return;
    }
    let wanted = extra_tunnels(ctx.plan.layout);
    let mut dug = 0;
    for _ in 0..wanted * 4 {
        if dug >= wanted {
            break;
        }
        let from = ctx.rng.below(room_count);
        let center = ctx.rooms[from].center();
        let mut nearest: Vec<usize> = (0..room_count).filter(|&index| index != from).collect();
        nearest.sort_by_key(|&index| (ctx.rooms[index].center().manhattan(center), index));
        nearest.truncate(NEAREST_LOOP_CANDIDATES);
        let Some(&to) = ctx.rng.pick(&nearest) else {
            continue;
        };
        if dig_between(ctx, from, to) {
            dug += 1;
        }
    }
    debug!("dug {dug} loop tunnels");
}

/// A marker cell of the root room; `?` cells may hold unrelated cave floor.
fn network_anchor(ctx: &GenContext<'_>, root: usize) -> Option<Pos> {
    ctx.rooms[root]
        .places
        .iter()
        .filter(|place| place.kind != PlaceKind::Door)
        .map(|place| place.pos)
        .find(|&pos| ctx.grid.is_passable(pos))
}

/// Tunnels every sizeable cave pocket not reachable from the root room to the
/// nearest reachable cell.
fn link_cave_fragments(ctx: &mut GenContext<'_>, root: usize) {
    let Some(anchor) = network_anchor(ctx, root) else {
        return;
    };
    for _ in 0..MAX_FRAGMENT_LINKS {
        let level = &ctx.grid;
        let joined: Vec<bool> = ctx
            .paths
            .bfs(anchor, |pos| level.is_passable(pos))
            .iter()
            .map(|&distance| distance != UNREACHABLE)
            .collect();
        let labels = ctx.paths.components(|pos| level.is_passable(pos)).to_vec();
        let sizes = component_sizes(&labels);

        let fragment = (1..sizes.len()).find(|&label| {
            sizes[label] >= MIN_CAVE_FRAGMENT
                && labels
                    .iter()
                    .position(|&found| found as usize == label)
                    .is_some_and(|index| !joined[index])
        });
        let Some(fragment) = fragment else {
            return;
        };

        let mut best: Option<(u32, Pos, Pos)> = None;
        let fragment_cells =
            labels.iter().enumerate().filter(|&(_, &label)| label as usize == fragment);
        for (index, _) in fragment_cells {
            let from = grid::pos_of(index);
            for (joined_index, _) in joined.iter().enumerate().filter(|&(_, &reached)| reached) {
                let to = grid::pos_of(joined_index);
                let distance = from.manhattan(to);
                if best.is_none_or(|(best_distance, _, _)| distance < best_distance) {
                    best = Some((distance, from, to));
                }
            }
        }
        let Some((_, from, to)) = best else {
            return;
        };
        if !dig(ctx, from, to, [None, None]) {
            return;
        }
        debug!("linked a cave pocket of {} cells", sizes[fragment]);
    }
}
