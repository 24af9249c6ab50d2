use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{GameKind, GameMetrics, GameRules};
use crate::clock::EarlyInput;
use crate::error::ConfigError;
use crate::scheduler::Millis;
use crate::staircase::Level;
use crate::trial::{Evaluation, Response, Stimulus, Trial, TrialMeta, TrialOutcome, Verdict};
use crate::util::median;

/// Reaction Time: wait a random foreperiod, then press as fast as possible.
/// Pressing early is a false start. Each level trims the response window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionTimeParams {
    pub foreperiod_min_ms: u64,
    pub foreperiod_jitter_ms: u64,
    pub window_step_ms: u64,
    pub min_window_ms: u64,
}

impl Default for ReactionTimeParams {
    fn default() -> Self {
        Self {
            foreperiod_min_ms: 1_000,
            foreperiod_jitter_ms: 2_000,
            window_step_ms: 50,
            min_window_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionMetrics {
    pub false_starts: u32,
    pub median_ms: Option<f64>,
    pub valid_trials: u32,
}

impl GameRules for ReactionTimeParams {
    fn kind(&self) -> GameKind {
        GameKind::ReactionTime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_window_ms == 0 {
            return Err(ConfigError::invalid(
                GameKind::ReactionTime,
                "min_window_ms must be positive",
            ));
        }
        Ok(())
    }

    fn early_input(&self) -> EarlyInput {
        EarlyInput::FalseStart
    }

    fn response_window_ms(&self, level: Level, configured: Millis) -> Millis {
        let trimmed = u64::from(level.saturating_sub(1)).saturating_mul(self.window_step_ms);
        configured
            .saturating_sub(trimmed)
            .max(self.min_window_ms.min(configured))
    }

    fn generate(
        &self,
        rng: &mut dyn RngCore,
        index: usize,
        level: Level,
        _prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let foreperiod_ms = self
            .foreperiod_min_ms
            .saturating_add(rng.gen_range(0..=self.foreperiod_jitter_ms));
        Ok(Trial {
            index,
            difficulty: level,
            stimulus: Stimulus::Signal { foreperiod_ms },
            expected: Response::Press,
            meta: TrialMeta::default(),
            exposure_ms: Some(foreperiod_ms),
        })
    }

    fn evaluate(&self, _trial: &Trial, _response: &Response) -> Evaluation {
        // any input inside the window counts
        Evaluation::correct()
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics {
        let latencies: Vec<f64> = outcomes
            .iter()
            .filter(|o| o.is_valid())
            .filter_map(|o| o.latency_ms)
            .map(|ms| ms as f64)
            .collect();
        GameMetrics::ReactionTime(ReactionMetrics {
            false_starts: outcomes
                .iter()
                .filter(|o| o.verdict == Verdict::FalseStart)
                .count() as u32,
            median_ms: median(&latencies),
            valid_trials: latencies.len() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_foreperiod_within_range_and_used_as_exposure() {
        let params = ReactionTimeParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for index in 0..200 {
            let trial = params.generate(&mut rng, index, 1, &[]).unwrap();
            let Stimulus::Signal { foreperiod_ms } = trial.stimulus else {
                panic!("not a reaction trial");
            };
            assert!((1_000..=3_000).contains(&foreperiod_ms));
            assert_eq!(trial.exposure_ms, Some(foreperiod_ms));
        }
    }

    #[test]
    fn test_window_shrinks_with_level_but_not_below_minimum() {
        let params = ReactionTimeParams::default();
        assert_eq!(params.response_window_ms(1, 1_000), 1_000);
        assert_eq!(params.response_window_ms(5, 1_000), 800);
        assert_eq!(params.response_window_ms(40, 1_000), 250);
        // a configured window shorter than the minimum is kept as is
        assert_eq!(params.response_window_ms(3, 200), 200);
    }

    #[test]
    fn test_reaction_game_accepts_early_input() {
        assert_eq!(
            ReactionTimeParams::default().early_input(),
            EarlyInput::FalseStart
        );
    }
}
