//! Procedural level generation split into forward-only stages: carve the cave,
//! stamp rooms, dig tunnels, validate, then dress and populate the level.

pub mod bands;
pub mod config;
pub mod model;
pub mod progression;
pub mod rooms;
pub mod templates;

mod cave;
mod context;
mod features;
mod generator;
mod seed;
mod tunnels;
mod validate;

#[cfg(test)]
mod test_support;

pub use bands::{BandInfo, BandKind, Behavior, MIN_BAND_START_DISTANCE};
pub use cave::CarveTuning;
pub use config::{DepthOverride, GenConfig};
pub use features::MIN_DESCENT_DISTANCE;
pub use generator::{LevelGenerator, MAX_LEVEL_ATTEMPTS};
pub use model::{GeneratedLevel, GenerationReport};
pub use progression::{LevelPlan, MAX_DEPTH, Narrative, SpecialRoom, default_plan};
pub use rooms::{Entry, Place, Rect, Room};
pub use seed::{GenRng, derive_level_seed};
pub use templates::{PlaceKind, RoomKind, StoryRole, TemplateCatalog};

use crate::error::GenResult;

/// Generates one depth of a run with the built-in configuration.
pub fn generate_level(run_seed: u64, depth: u8) -> GenResult<GeneratedLevel> {
    LevelGenerator::new(run_seed, GenConfig::default())?.generate(depth)
}

#[cfg(test)]
mod tests {
    use super::{GenConfig, LevelGenerator};

    #[test]
    fn generate_level_matches_level_generator_output() {
        let seed = 123_u64;
        let depth = 2_u8;

        let from_helper = super::generate_level(seed, depth).expect("depth 2 generates");
        let from_generator = LevelGenerator::new(seed, GenConfig::default())
            .and_then(|generator| generator.generate(depth))
            .expect("depth 2 generates");

        assert_eq!(from_helper, from_generator);
    }
}
