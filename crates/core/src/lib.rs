pub mod error;
pub mod grid;
pub mod mapgen;
pub mod pathfinding;
pub mod types;

pub use error::{GenError, GenResult};
pub use grid::{DUNGEON_HEIGHT, DUNGEON_WIDTH, Grid};
pub use mapgen::{GenConfig, GeneratedLevel, GenerationReport, LevelGenerator, generate_level};
pub use pathfinding::{AstarPath, PathRange, Pather, WalkPather};
pub use types::*;
