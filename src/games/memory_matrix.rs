use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{
    judge_cells, sample_cells, Capacity, GameKind, GameMetrics, GameRules, SelectionMetrics,
};
use crate::error::ConfigError;
use crate::staircase::Level;
use crate::trial::{Evaluation, Response, Stimulus, Trial, TrialMeta, TrialOutcome};

/// Memory Matrix: memorize the lit cells, then select them once the grid goes
/// dark. The level is the number of lit cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryMatrixParams {
    pub grid_size: usize,
}

impl Default for MemoryMatrixParams {
    fn default() -> Self {
        Self { grid_size: 4 }
    }
}

impl GameRules for MemoryMatrixParams {
    fn kind(&self) -> GameKind {
        GameKind::MemoryMatrix
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=10).contains(&self.grid_size) {
            return Err(ConfigError::invalid(
                GameKind::MemoryMatrix,
                format!("grid_size must be between 2 and 10 (got {})", self.grid_size),
            ));
        }
        Ok(())
    }

    fn capacity(&self) -> Option<Capacity> {
        Some(Capacity {
            limit: self.grid_size * self.grid_size,
            pool: "grid cells",
        })
    }

    fn generate(
        &self,
        rng: &mut dyn RngCore,
        index: usize,
        level: Level,
        prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let previous = prior.last().and_then(|t| match &t.stimulus {
            Stimulus::Pattern { lit, .. } => Some(lit),
            _ => None,
        });
        // redraw once if the pattern repeats the previous one exactly
        let mut lit = sample_cells(rng, self.grid_size, level as usize);
        if previous == Some(&lit) && (level as usize) < self.grid_size * self.grid_size {
            lit = sample_cells(rng, self.grid_size, level as usize);
        }
        Ok(Trial {
            index,
            difficulty: level,
            expected: Response::Cells(lit.clone()),
            stimulus: Stimulus::Pattern {
                size: self.grid_size,
                lit,
            },
            meta: TrialMeta::default(),
            exposure_ms: None,
        })
    }

    fn evaluate(&self, trial: &Trial, response: &Response) -> Evaluation {
        match &trial.stimulus {
            Stimulus::Pattern { lit, .. } => judge_cells(lit, response),
            _ => Evaluation::incorrect(),
        }
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics {
        GameMetrics::MemoryMatrix(SelectionMetrics::from_outcomes(outcomes))
    }
}
