//! Level generation entry point: inputs are validated once, then each depth
//! runs attempts with fresh derived seeds until one succeeds.

mod pipeline;

use log::warn;

use crate::error::{GenError, GenResult};

use self::pipeline::{AttemptInput, build_level};
use super::config::GenConfig;
use super::model::{GeneratedLevel, GenerationReport};
use super::progression::{LevelPlan, MAX_DEPTH, STARTING_DEPTH};
use super::seed::derive_level_seed;
use super::templates::TemplateCatalog;

pub const MAX_LEVEL_ATTEMPTS: u32 = 8;

/// Generates the levels of one run. Holds no mutable state, so one generator
/// may serve several threads.
#[derive(Clone, Debug)]
pub struct LevelGenerator {
    run_seed: u64,
    config: GenConfig,
    catalog: TemplateCatalog,
}

impl LevelGenerator {
    pub fn new(run_seed: u64, config: GenConfig) -> GenResult<Self> {
        Self::with_catalog(run_seed, config, TemplateCatalog::builtin()?)
    }

    pub fn with_catalog(
        run_seed: u64,
        config: GenConfig,
        catalog: TemplateCatalog,
    ) -> GenResult<Self> {
        config.validate()?;
        Ok(Self { run_seed, config, catalog })
    }

    pub fn run_seed(&self) -> u64 {
        self.run_seed
    }

    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    pub fn plan_for(&self, depth: u8) -> LevelPlan {
        self.config.plan_for(depth)
    }

    pub fn generate(&self, depth: u8) -> GenResult<GeneratedLevel> {
        self.generate_report(depth).map(|report| report.level)
    }

    pub fn generate_report(&self, depth: u8) -> GenResult<GenerationReport> {
        self.generate_with_plan(depth, &self.plan_for(depth))
    }

    /// Retries structural failures with the next derived seed; configuration
    /// errors return at once.
    pub fn generate_with_plan(&self, depth: u8, plan: &LevelPlan) -> GenResult<GenerationReport> {
        if !(STARTING_DEPTH..=MAX_DEPTH).contains(&depth) {
            return Err(GenError::InvalidPlan(format!(
                "depth {depth} is outside {STARTING_DEPTH}..={MAX_DEPTH}"
            )));
        }
        plan.validate().map_err(GenError::InvalidPlan)?;

        let mut last_error = None;
        for attempt in 0..MAX_LEVEL_ATTEMPTS {
            let input = AttemptInput {
                depth,
                seed: derive_level_seed(self.run_seed, depth, attempt),
                plan,
                tuning: &self.config.tuning,
                catalog: &self.catalog,
            };
            match build_level(&input) {
                Ok(mut report) => {
                    report.attempts = attempt + 1;
                    return Ok(report);
                }
                Err(error) if error.is_retryable() => {
                    warn!("depth {depth} attempt {attempt} failed, reseeding: {error}");
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }
        let source = last_error
            .unwrap_or_else(|| GenError::InvalidPlan("no generation attempt ran".to_string()));
        Err(GenError::RetriesExhausted {
            depth,
            attempts: MAX_LEVEL_ATTEMPTS as usize,
            source: Box::new(source),
        })
    }
}
