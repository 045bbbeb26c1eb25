//! Generation config: carver tuning plus per-depth plan overrides. Every field
//! has a default, so an empty config file reproduces the built-in table.

use serde::{Deserialize, Serialize};

use crate::error::{GenError, GenResult};

use super::cave::CarveTuning;
use super::progression::{LevelPlan, MAX_DEPTH, STARTING_DEPTH, default_plan};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenConfig {
    pub tuning: CarveTuning,
    pub depths: Vec<DepthOverride>,
}

/// Replaces the built-in plan of one depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthOverride {
    pub depth: u8,
    #[serde(default)]
    pub plan: LevelPlan,
}

impl GenConfig {
    /// The last override naming `depth`, else the built-in plan.
    pub fn plan_for(&self, depth: u8) -> LevelPlan {
        self.depths
            .iter()
            .rev()
            .find(|entry| entry.depth == depth)
            .map_or_else(|| default_plan(depth), |entry| entry.plan.clone())
    }

    pub fn validate(&self) -> GenResult<()> {
        let invalid =
            |scope: String, reason: String| GenError::InvalidPlan(format!("{scope}: {reason}"));
        self.tuning.validate().map_err(|reason| invalid("tuning".to_string(), reason))?;
        for entry in &self.depths {
            if !(STARTING_DEPTH..=MAX_DEPTH).contains(&entry.depth) {
                return Err(GenError::InvalidPlan(format!(
                    "depth {} is outside {STARTING_DEPTH}..={MAX_DEPTH}",
                    entry.depth
                )));
            }
            let scope = format!("depth {}", entry.depth);
            entry.plan.validate().map_err(|reason| invalid(scope, reason))?;
        }
        Ok(())
    }
}
