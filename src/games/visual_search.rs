use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{
    judge_cells, sample_cells, Capacity, GameKind, GameMetrics, GameRules, SelectionMetrics,
};
use crate::error::ConfigError;
use crate::staircase::Level;
use crate::trial::{Evaluation, Response, Stimulus, Trial, TrialMeta, TrialOutcome};

/// Visual Search: find every odd glyph in the grid. The level is the number
/// of targets hidden among the distractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSearchParams {
    pub grid_size: usize,
}

impl Default for VisualSearchParams {
    fn default() -> Self {
        Self { grid_size: 5 }
    }
}

impl GameRules for VisualSearchParams {
    fn kind(&self) -> GameKind {
        GameKind::VisualSearch
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=12).contains(&self.grid_size) {
            return Err(ConfigError::invalid(
                GameKind::VisualSearch,
                format!("grid_size must be between 2 and 12 (got {})", self.grid_size),
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
        _prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let targets = sample_cells(rng, self.grid_size, level as usize);
        Ok(Trial {
            index,
            difficulty: level,
            expected: Response::Cells(targets.clone()),
            stimulus: Stimulus::SearchGrid {
                size: self.grid_size,
                targets,
            },
            meta: TrialMeta::default(),
            exposure_ms: None,
        })
    }

    fn evaluate(&self, trial: &Trial, response: &Response) -> Evaluation {
        match &trial.stimulus {
            Stimulus::SearchGrid { targets, .. } => judge_cells(targets, response),
            _ => Evaluation::incorrect(),
        }
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics {
        GameMetrics::VisualSearch(SelectionMetrics::from_outcomes(outcomes))
    }
}
