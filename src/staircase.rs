use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::trial::TrialOutcome;

/// Difficulty level. Its meaning is game specific (N for N-Back, span length
/// for Digit Span, lit cells for Memory Matrix, ...).
pub type Level = u32;

/// Bounds and streak thresholds for the adaptive staircase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaircaseConfig {
    pub initial: Level,
    pub floor: Level,
    pub ceiling: Level,
    pub streak_to_level_up: u32,
    pub streak_to_level_down: u32,
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        Self {
            initial: 1,
            floor: 1,
            ceiling: 10,
            streak_to_level_up: 3,
            streak_to_level_down: 2,
        }
    }
}

impl StaircaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floor == 0 {
            return Err(ConfigError::ZeroFloor);
        }
        if self.ceiling < self.floor {
            return Err(ConfigError::InvertedBounds {
                floor: self.floor,
                ceiling: self.ceiling,
            });
        }
        if !(self.floor..=self.ceiling).contains(&self.initial) {
            return Err(ConfigError::InitialOutOfBounds {
                initial: self.initial,
                floor: self.floor,
                ceiling: self.ceiling,
            });
        }
        if self.streak_to_level_up == 0 {
            return Err(ConfigError::ZeroThreshold {
                name: "streak_to_level_up",
            });
        }
        if self.streak_to_level_down == 0 {
            return Err(ConfigError::ZeroThreshold {
                name: "streak_to_level_down",
            });
        }
        Ok(())
    }
}

/// Current level plus the two mutually exclusive streak counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaircaseState {
    pub level: Level,
    pub correct_streak: u32,
    pub incorrect_streak: u32,
}

impl StaircaseState {
    pub fn new(config: &StaircaseConfig) -> Self {
        Self {
            level: config.initial,
            correct_streak: 0,
            incorrect_streak: 0,
        }
    }

    /// Transition on a finished trial. Timeouts and false starts count as
    /// incorrect.
    pub fn update(self, config: &StaircaseConfig, outcome: &TrialOutcome) -> Self {
        self.apply(config, outcome.is_correct())
    }

    pub fn apply(self, config: &StaircaseConfig, correct: bool) -> Self {
        if correct {
            let streak = self.correct_streak.saturating_add(1);
            if streak >= config.streak_to_level_up && self.level < config.ceiling {
                return Self {
                    level: self.level + 1,
                    correct_streak: 0,
                    incorrect_streak: 0,
                };
            }
            Self {
                level: self.level,
                correct_streak: streak,
                incorrect_streak: 0,
            }
        } else {
            let streak = self.incorrect_streak.saturating_add(1);
            if streak >= config.streak_to_level_down && self.level > config.floor {
                return Self {
                    level: self.level - 1,
                    correct_streak: 0,
                    incorrect_streak: 0,
                };
            }
            Self {
                level: self.level,
                correct_streak: 0,
                incorrect_streak: streak,
            }
        }
    }
}

/// Fold an ordered correctness history into a fresh state.
pub fn replay<I>(config: &StaircaseConfig, history: I) -> StaircaseState
where
    I: IntoIterator<Item = bool>,
{
    history
        .into_iter()
        .fold(StaircaseState::new(config), |state, correct| {
            state.apply(config, correct)
        })
}
