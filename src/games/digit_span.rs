use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{Capacity, GameKind, GameMetrics, GameRules};
use crate::error::ConfigError;
use crate::staircase::Level;
use crate::trial::{Response, Stimulus, Trial, TrialMeta, TrialOutcome};

/// Digit Span: the level is the sequence length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitSpanParams {
    /// Recall in reverse order
    pub backward: bool,
    /// Allow a digit to reappear later in the same sequence (never adjacent)
    pub allow_repeats: bool,
    /// Exposure per digit; the whole sequence is shown for `len * per_digit_ms`
    pub per_digit_ms: u64,
}

impl Default for DigitSpanParams {
    fn default() -> Self {
        Self {
            backward: false,
            allow_repeats: true,
            per_digit_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanMetrics {
    pub longest_span: Option<Level>,
    pub backward: bool,
}

impl GameRules for DigitSpanParams {
    fn kind(&self) -> GameKind {
        GameKind::DigitSpan
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.per_digit_ms == 0 {
            return Err(ConfigError::invalid(
                GameKind::DigitSpan,
                "per_digit_ms must be positive",
            ));
        }
        Ok(())
    }

    fn capacity(&self) -> Option<Capacity> {
        (!self.allow_repeats).then_some(Capacity {
            limit: 10,
            pool: "distinct digits",
        })
    }

    fn generate(
        &self,
        rng: &mut dyn RngCore,
        index: usize,
        level: Level,
        _prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let mut digits: Vec<u8> = Vec::with_capacity(level as usize);
        for _ in 0..level {
            let candidates: Vec<u8> = (0..=9u8)
                .filter(|d| digits.last() != Some(d))
                .filter(|d| self.allow_repeats || !digits.contains(d))
                .collect();
            let digit = candidates.choose(rng).copied().ok_or(ConfigError::PoolExhausted {
                game: GameKind::DigitSpan,
                pool: "distinct digits",
                requested: level,
                capacity: 10,
            })?;
            digits.push(digit);
        }

        let mut answer = digits.clone();
        if self.backward {
            answer.reverse();
        }

        Ok(Trial {
            index,
            difficulty: level,
            exposure_ms: Some(self.per_digit_ms.saturating_mul(u64::from(level))),
            stimulus: Stimulus::Digits {
                digits,
                backward: self.backward,
            },
            expected: Response::Sequence(answer),
            meta: TrialMeta::default(),
        })
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics {
        GameMetrics::DigitSpan(SpanMetrics {
            longest_span: outcomes
                .iter()
                .filter(|o| o.is_correct())
                .map(|o| o.trial.difficulty)
                .max(),
            backward: self.backward,
        })
    }
}
