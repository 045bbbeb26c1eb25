//! Room placement: stamping oriented templates onto the carved cave without
//! letting any two rooms touch.

use std::iter;

use log::debug;
use serde::Serialize;

use crate::error::{GenError, GenResult};
use crate::grid::{self, DUNGEON_HEIGHT, DUNGEON_WIDTH};
use crate::types::{CaveLayout, Pos, Terrain};

use super::context::{CellTag, GenContext};
use super::templates::{PlaceKind, RoomKind, RoomTemplate, TemplateCatalog, TemplateCell};

pub(super) const ROOM_PLACEMENT_ATTEMPTS: usize = 200;
const CENTER_JITTER_X: i32 = 10;
const CENTER_JITTER_Y: i32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn right(self) -> i32 {
        self.x + self.width - 1
    }

    pub fn bottom(self) -> i32 {
        self.y + self.height - 1
    }

    pub fn center(self) -> Pos {
        Pos { y: self.y + self.height / 2, x: self.x + self.width / 2 }
    }

    pub fn expanded(self, margin: i32) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
        }
    }

    pub fn intersects(self, other: &Self) -> bool {
        self.x <= other.right()
            && self.right() >= other.x
            && self.y <= other.bottom()
            && self.bottom() >= other.y
    }

    pub fn contains(self, pos: Pos) -> bool {
        pos.x >= self.x && pos.x <= self.right() && pos.y >= self.y && pos.y <= self.bottom()
    }
}

/// Border opening through which a tunnel may reach the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub pos: Pos,
    /// Opens as bare ground instead of a door.
    pub virtual_entry: bool,
    pub used: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Place {
    pub kind: PlaceKind,
    pub pos: Pos,
    pub used: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Room {
    pub rect: Rect,
    pub kind: RoomKind,
    pub template: &'static str,
    pub entries: Vec<Entry>,
    pub places: Vec<Place>,
    pub connected: bool,
    /// Story rooms; the player never starts inside one.
    pub reserved: bool,
}

impl Room {
    pub fn center(&self) -> Pos {
        self.rect.center()
    }

    /// Special and story rooms connect first and never host the player start.
    pub fn is_featured(&self) -> bool {
        matches!(self.kind, RoomKind::Special(_) | RoomKind::Story(_))
    }

    pub fn entry_at(&self, pos: Pos) -> Option<usize> {
        self.entries.iter().position(|entry| entry.pos == pos)
    }

    pub fn places_of(&self, kind: PlaceKind) -> impl Iterator<Item = &Place> + '_ {
        self.places.iter().filter(move |place| place.kind == kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Placement {
    Random,
    /// Jittered around the grid centre.
    Center,
    /// Touching a random side of the grid.
    Edge,
}

/// Normal and cave-embedded room counts requested per layout.
fn room_budget(layout: CaveLayout) -> (usize, usize) {
    match layout {
        CaveLayout::AutomataCave => (6, 2),
        CaveLayout::RandomWalkCave => (6, 1),
        CaveLayout::RandomWalkTreeCave => (6, 1),
        CaveLayout::RandomSmallWalkCaveUrbanised => (11, 0),
    }
}

/// Places the plan's required rooms first, then as many ordinary rooms as fit.
pub(super) fn place_rooms(ctx: &mut GenContext<'_>, catalog: &TemplateCatalog) -> GenResult<()> {
    if let Some(narrative) = ctx.plan.narrative {
        place_required(ctx, catalog, RoomKind::Story(narrative), Placement::Edge)?;
    }
    if let Some(special) = ctx.plan.special_room {
        place_required(ctx, catalog, RoomKind::Special(special), Placement::Center)?;
    }

    let (normal, cave) = room_budget(ctx.plan.layout);
    let requests =
        iter::repeat_n(RoomKind::Normal, normal).chain(iter::repeat_n(RoomKind::Cave, cave));
    for kind in requests {
        let templates = catalog.of_kind(kind);
        let placed = (0..2).any(|_| {
            ctx.rng
                .pick(&templates)
                .is_some_and(|template| place_room(ctx, template, Placement::Random).is_some())
        });
        if !placed {
            debug!("skipping a {kind:?} room: no free spot after two templates");
        }
    }
    debug!("placed {} rooms", ctx.rooms.len());
    Ok(())
}

fn place_required(
    ctx: &mut GenContext<'_>,
    catalog: &TemplateCatalog,
    kind: RoomKind,
    preferred: Placement,
) -> GenResult<usize> {
    let templates = catalog.of_kind(kind);
    let Some(template) = ctx.rng.pick(&templates).copied() else {
        return Err(GenError::InvalidPlan(format!("catalog has no {kind:?} template")));
    };
    place_room(ctx, template, preferred)
        .or_else(|| place_room(ctx, template, Placement::Random))
        .ok_or_else(|| GenError::PlacementExhausted {
            what: format!("{} room", template.name),
            attempts: 2 * ROOM_PLACEMENT_ATTEMPTS,
        })
}

/// Tries random orientations and origins; returns the new room's index.
pub(super) fn place_room(
    ctx: &mut GenContext<'_>,
    template: &RoomTemplate,
    placement: Placement,
) -> Option<usize> {
    for _ in 0..ROOM_PLACEMENT_ATTEMPTS {
        let oriented = template.oriented(&mut ctx.rng);
        let origin = pick_origin(ctx, &oriented, placement);
        if fits(ctx, &oriented, origin) {
            return Some(stamp(ctx, &oriented, origin));
        }
    }
    None
}

fn pick_origin(ctx: &mut GenContext<'_>, template: &RoomTemplate, placement: Placement) -> Pos {
    let max_x = DUNGEON_WIDTH - template.width;
    let max_y = DUNGEON_HEIGHT - template.height;
    let rng = &mut ctx.rng;
    match placement {
        Placement::Random => Pos { y: rng.range_i32(0, max_y), x: rng.range_i32(0, max_x) },
        Placement::Center => Pos {
            y: max_y / 2 + rng.range_i32(-CENTER_JITTER_Y, CENTER_JITTER_Y),
            x: max_x / 2 + rng.range_i32(-CENTER_JITTER_X, CENTER_JITTER_X),
        },
        Placement::Edge => match rng.below(4) {
            0 => Pos { y: 0, x: rng.range_i32(0, max_x) },
            1 => Pos { y: max_y, x: rng.range_i32(0, max_x) },
            2 => Pos { y: rng.range_i32(0, max_y), x: 0 },
            _ => Pos { y: rng.range_i32(0, max_y), x: max_x },
        },
    }
}

fn template_rect(template: &RoomTemplate, origin: Pos) -> Rect {
    Rect { x: origin.x, y: origin.y, width: template.width, height: template.height }
}

/// An entry is usable when it sits off the grid edge and a tunnel can arrive
/// from outside the room.
fn entry_is_reachable(pos: Pos, rect: Rect) -> bool {
    grid::in_interior(pos)
        && pos.neighbors4().into_iter().any(|next| !rect.contains(next) && grid::in_interior(next))
}

fn fits(ctx: &GenContext<'_>, template: &RoomTemplate, origin: Pos) -> bool {
    let rect = template_rect(template, origin);
    if rect.x < 0 || rect.y < 0 || rect.right() >= DUNGEON_WIDTH || rect.bottom() >= DUNGEON_HEIGHT
    {
        return false;
    }
    let margin = rect.expanded(1);
    if ctx.rooms.iter().any(|room| room.rect.expanded(1).intersects(&margin)) {
        return false;
    }
    let mut reachable_entries = 0;
    for (local, cell) in template.cells() {
        let pos = origin.shift(local.x, local.y);
        if cell.terrain().is_some_and(Terrain::is_passable) && !grid::in_interior(pos) {
            return false;
        }
        if matches!(cell, TemplateCell::Entry { .. }) && entry_is_reachable(pos, rect) {
            reachable_entries += 1;
        }
    }
    reachable_entries > 0
}

pub(super) fn stamp(ctx: &mut GenContext<'_>, template: &RoomTemplate, origin: Pos) -> usize {
    let rect = template_rect(template, origin);
    let mut room = Room {
        rect,
        kind: template.kind,
        template: template.name,
        entries: Vec::new(),
        places: Vec::new(),
        connected: false,
        reserved: matches!(template.kind, RoomKind::Story(_)),
    };
    for (local, cell) in template.cells() {
        let pos = origin.shift(local.x, local.y);
        ctx.set_tag(pos, CellTag::Room);
        if let Some(terrain) = cell.terrain() {
            ctx.grid.set(pos, terrain);
        }
        match cell {
            TemplateCell::Entry { virtual_entry } if entry_is_reachable(pos, rect) => {
                room.entries.push(Entry { pos, virtual_entry, used: false });
                if !virtual_entry {
                    room.places.push(Place { kind: PlaceKind::Door, pos, used: false });
                }
            }
            TemplateCell::InternalDoor => {
                room.places.push(Place { kind: PlaceKind::Door, pos, used: true });
            }
            TemplateCell::Marker(kind) => room.places.push(Place { kind, pos, used: false }),
            _ => {}
        }
    }
    debug!("stamped {} at ({}, {})", template.name, origin.x, origin.y);
    ctx.rooms.push(room);
    ctx.rooms.len() - 1
}
