//! One generation attempt: every stage in order over a fresh context.

use log::debug;

use crate::error::GenResult;

use crate::mapgen::bands::place_bands;
use crate::mapgen::cave::{CarveTuning, carve};
use crate::mapgen::context::GenContext;
use crate::mapgen::features::{add_features, choose_start};
use crate::mapgen::model::{GeneratedLevel, GenerationReport};
use crate::mapgen::progression::LevelPlan;
use crate::mapgen::rooms::place_rooms;
use crate::mapgen::templates::TemplateCatalog;
use crate::mapgen::tunnels::connect_rooms;
use crate::mapgen::validate::validate_connectivity;

pub(super) struct AttemptInput<'a> {
    pub(super) depth: u8,
    pub(super) seed: u64,
    pub(super) plan: &'a LevelPlan,
    pub(super) tuning: &'a CarveTuning,
    pub(super) catalog: &'a TemplateCatalog,
}

pub(super) fn build_level(input: &AttemptInput<'_>) -> GenResult<GenerationReport> {
    let mut ctx = GenContext::new(input.depth, input.plan, input.tuning, input.seed);
    carve(&mut ctx)?;
    place_rooms(&mut ctx, input.catalog)?;
    connect_rooms(&mut ctx)?;
    let start = choose_start(&mut ctx)?;
    validate_connectivity(&mut ctx, start, "tunnels")?;
    let marks = add_features(&mut ctx, start)?;
    let bands = place_bands(&mut ctx, start);
    debug!(
        "depth {} seed {:#x}: {} rooms, {} bands, {} repairs",
        input.depth,
        input.seed,
        ctx.rooms.len(),
        bands.len(),
        ctx.repairs
    );

    let level = GeneratedLevel {
        depth: input.depth,
        seed: input.seed,
        layout: input.plan.layout,
        grid: ctx.grid,
        start,
        descent: marks.descent,
        decoy: marks.decoy,
        anchors: marks.anchors,
        bands,
        item_spots: marks.item_spots,
    };
    Ok(GenerationReport { level, rooms: ctx.rooms, repairs: ctx.repairs, attempts: 1 })
}
