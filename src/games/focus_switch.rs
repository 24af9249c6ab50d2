use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{GameKind, GameMetrics, GameRules};
use crate::error::ConfigError;
use crate::metrics::{accuracy_of, mean_latency};
use crate::staircase::Level;
use crate::trial::{Response, Stimulus, Trial, TrialMeta, TrialOutcome};

const DIGITS: [u8; 8] = [1, 2, 3, 4, 6, 7, 8, 9];

/// Sorting rule cued on each Focus-Switch trial. Option 0 is odd / low,
/// option 1 is even / high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchRule {
    Parity,
    Magnitude,
}

impl SwitchRule {
    pub fn other(self) -> Self {
        match self {
            Self::Parity => Self::Magnitude,
            Self::Magnitude => Self::Parity,
        }
    }

    pub fn answer(self, digit: u8) -> usize {
        match self {
            Self::Parity => usize::from(digit % 2 == 0),
            Self::Magnitude => usize::from(digit > 5),
        }
    }
}

/// Focus-Switch: each level raises the chance that the rule flips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusSwitchParams {
    pub switch_ratio: f64,
    pub switch_ratio_step: f64,
}

impl Default for FocusSwitchParams {
    fn default() -> Self {
        Self {
            switch_ratio: 0.25,
            switch_ratio_step: 0.1,
        }
    }
}

impl FocusSwitchParams {
    pub fn switch_probability(&self, level: Level) -> f64 {
        let steps = level.saturating_sub(1) as f64;
        (self.switch_ratio + self.switch_ratio_step * steps).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchMetrics {
    /// Mean latency on switch trials minus mean latency on repeat trials
    pub switch_cost_ms: Option<f64>,
    pub switch_accuracy: f64,
    pub repeat_accuracy: f64,
    pub switch_trials: u32,
}

impl GameRules for FocusSwitchParams {
    fn kind(&self) -> GameKind {
        GameKind::FocusSwitch
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_ratio("switch_ratio", self.switch_ratio)?;
        ConfigError::check_ratio("switch_ratio_step", self.switch_ratio_step)
    }

    fn generate(
        &self,
        rng: &mut dyn RngCore,
        index: usize,
        level: Level,
        prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let previous = prior.iter().rev().find_map(|t| match t.stimulus {
            Stimulus::RuleDigit { rule, .. } => Some(rule),
            _ => None,
        });
        let (rule, is_switch) = match previous {
            Some(previous) if rng.gen_bool(self.switch_probability(level)) => {
                (previous.other(), true)
            }
            Some(previous) => (previous, false),
            None if rng.gen_bool(0.5) => (SwitchRule::Parity, false),
            None => (SwitchRule::Magnitude, false),
        };
        let digit = *DIGITS.choose(rng).unwrap_or(&1);

        Ok(Trial {
            index,
            difficulty: level,
            stimulus: Stimulus::RuleDigit { digit, rule },
            expected: Response::Choice(rule.answer(digit)),
            meta: TrialMeta {
                is_switch: Some(is_switch),
                ..TrialMeta::default()
            },
            exposure_ms: None,
        })
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics {
        let (switches, repeats): (Vec<&TrialOutcome>, Vec<&TrialOutcome>) = outcomes
            .iter()
            .partition(|o| o.trial.meta.is_switch == Some(true));
        let switch_cost_ms = mean_latency(switches.iter().copied())
            .zip(mean_latency(repeats.iter().copied()))
            .map(|(switch, repeat)| switch - repeat);
        GameMetrics::FocusSwitch(SwitchMetrics {
            switch_cost_ms,
            switch_accuracy: accuracy_of(switches.iter().copied()),
            repeat_accuracy: accuracy_of(repeats.iter().copied()),
            switch_trials: switches.len() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_rule_answers() {
        assert_eq!(SwitchRule::Parity.answer(3), 0);
        assert_eq!(SwitchRule::Parity.answer(8), 1);
        assert_eq!(SwitchRule::Magnitude.answer(2), 0);
        assert_eq!(SwitchRule::Magnitude.answer(9), 1);
        assert_eq!(SwitchRule::Parity.other(), SwitchRule::Magnitude);
    }

    #[test]
    fn test_switch_flag_tracks_rule_change() {
        let params = FocusSwitchParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut trials: Vec<Trial> = Vec::new();
        for index in 0..100 {
            let trial = params.generate(&mut rng, index, 3, &trials).unwrap();
            trials.push(trial);
        }
        assert_eq!(trials[0].meta.is_switch, Some(false));
        for pair in trials.windows(2) {
            let rule = |t: &Trial| match t.stimulus {
                Stimulus::RuleDigit { rule, digit } => {
                    assert_ne!(digit, 5);
                    assert_eq!(t.expected, Response::Choice(rule.answer(digit)));
                    rule
                }
                _ => unreachable!(),
            };
            assert_eq!(
                pair[1].meta.is_switch,
                Some(rule(&pair[0]) != rule(&pair[1]))
            );
        }
    }

    #[test]
    fn test_switch_probability_grows_with_level() {
        let params = FocusSwitchParams::default();
        assert!((params.switch_probability(1) - 0.25).abs() < 1e-9);
        assert!((params.switch_probability(3) - 0.45).abs() < 1e-9);
        assert_eq!(params.switch_probability(50), 1.0);
    }
}
