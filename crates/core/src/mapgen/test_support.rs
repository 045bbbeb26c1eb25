//! Shared fixtures for the `mapgen` stage tests.
//! This module exists so stage tests can build a small connected level by hand
//! instead of running the whole pipeline. It does not own generation logic.

use crate::grid::{self, Grid};
use crate::pathfinding::{PathRange, UNREACHABLE};
use crate::types::Pos;

use super::context::GenContext;
use super::features::choose_start;
use super::rooms::stamp;
use super::templates::TemplateCatalog;
use super::tunnels::connect_rooms;
use super::validate::validate_connectivity;

pub(super) fn stamp_named(ctx: &mut GenContext<'_>, name: &str, origin: Pos) -> usize {
    let catalog = TemplateCatalog::builtin().expect("builtin catalog");
    let template = catalog.get(name).expect("template exists");
    stamp(ctx, template, origin)
}

/// Stamps `rooms` into solid rock, joins them and validates from a chosen start.
pub(super) fn connected_rooms_fixture(ctx: &mut GenContext<'_>, rooms: &[(&str, Pos)]) -> Pos {
    for &(name, origin) in rooms {
        stamp_named(ctx, name, origin);
    }
    connect_rooms(ctx).expect("rooms connect through solid rock");
    let start = choose_start(ctx).expect("a start cell exists");
    validate_connectivity(ctx, start, "tunnels").expect("start is open");
    start
}

pub(super) fn unreached_passable(level: &Grid, start: Pos) -> usize {
    let mut paths = PathRange::for_dungeon();
    let distances = paths.bfs(start, |pos| level.is_passable(pos));
    grid::positions()
        .filter(|&pos| level.is_passable(pos))
        .filter(|&pos| distances[grid::index_of(pos)] == UNREACHABLE)
        .count()
}
