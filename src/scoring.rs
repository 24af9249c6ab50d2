use serde::{Deserialize, Serialize};

use crate::games::GameKind;
use crate::trial::{Detection, Evaluation, Trial, Verdict};

/// Shape of the points awarded for a judged response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ScoringRule {
    /// `base * difficulty` for a correct answer
    DifficultyMultiplier { base: u32 },
    /// `max(0, cap - latency)` for a correct answer
    LatencyPenalized { cap_ms: u64 },
    /// `hits * hit_points - wrong * wrong_penalty`, floored at zero, with
    /// partial credit for imperfect selections
    RiskReward { hit_points: u32, wrong_penalty: u32 },
}

/// Scoring rule plus the signal-detection rewards and penalties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub rule: ScoringRule,
    /// Awarded when a non-target is correctly left alone
    #[serde(default)]
    pub correct_rejection_points: u32,
    /// Deducted for responding to a non-target
    #[serde(default)]
    pub false_alarm_penalty: u32,
    /// Deducted for failing to respond to a target
    #[serde(default)]
    pub miss_penalty: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::with_rule(ScoringRule::DifficultyMultiplier { base: 10 })
    }
}

impl ScoringConfig {
    pub fn with_rule(rule: ScoringRule) -> Self {
        Self {
            rule,
            correct_rejection_points: 0,
            false_alarm_penalty: 0,
            miss_penalty: 0,
        }
    }

    pub fn for_game(kind: GameKind) -> Self {
        match kind {
            GameKind::NBack => Self {
                correct_rejection_points: 5,
                ..Self::default()
            },
            GameKind::ReactionTime => {
                Self::with_rule(ScoringRule::LatencyPenalized { cap_ms: 1_000 })
            }
            GameKind::VisualSearch | GameKind::MemoryMatrix => {
                Self::with_rule(ScoringRule::RiskReward {
                    hit_points: 10,
                    wrong_penalty: 5,
                })
            }
            GameKind::FocusSwitch | GameKind::DigitSpan | GameKind::Stroop | GameKind::Rsvp => {
                Self::default()
            }
        }
    }

    /// Points for one decided trial. Timeouts and false starts earn nothing
    /// beyond the configured miss penalty. Never fails.
    pub fn score(&self, trial: &Trial, evaluation: &Evaluation, latency_ms: Option<u64>) -> i64 {
        match (evaluation.verdict, evaluation.detection) {
            (Verdict::FalseStart, _) => 0,
            (Verdict::Timeout, Some(Detection::Miss)) => -i64::from(self.miss_penalty),
            (Verdict::Timeout, _) => 0,
            (Verdict::Correct, Some(Detection::CorrectRejection)) => {
                i64::from(self.correct_rejection_points)
            }
            (Verdict::Correct, _) => self.reward(trial, evaluation, latency_ms),
            (Verdict::Incorrect, Some(Detection::FalseAlarm)) => {
                -i64::from(self.false_alarm_penalty)
            }
            (Verdict::Incorrect, Some(Detection::Miss)) => -i64::from(self.miss_penalty),
            (Verdict::Incorrect, _) => match self.rule {
                ScoringRule::RiskReward { .. } => self.reward(trial, evaluation, latency_ms),
                _ => 0,
            },
        }
    }

    fn reward(&self, trial: &Trial, evaluation: &Evaluation, latency_ms: Option<u64>) -> i64 {
        match self.rule {
            ScoringRule::DifficultyMultiplier { base } => {
                i64::from(base) * i64::from(trial.difficulty)
            }
            ScoringRule::LatencyPenalized { cap_ms } => latency_ms
                .map(|ms| i64::try_from(cap_ms.saturating_sub(ms)).unwrap_or(i64::MAX))
                .unwrap_or(0),
            ScoringRule::RiskReward {
                hit_points,
                wrong_penalty,
            } => {
                let gained = i64::from(evaluation.hits) * i64::from(hit_points);
                let lost = i64::from(evaluation.wrong) * i64::from(wrong_penalty);
                (gained - lost).max(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::{Response, Stimulus, TrialMeta};

    fn trial(difficulty: u32) -> Trial {
        Trial {
            index: 0,
            difficulty,
            stimulus: Stimulus::Symbol { symbol: 'A', n: 2 },
            expected: Response::Match(true),
            meta: TrialMeta::default(),
            exposure_ms: None,
        }
    }

    #[test]
    fn test_difficulty_multiplier() {
        let cfg = ScoringConfig::default();
        assert_eq!(cfg.score(&trial(3), &Evaluation::correct(), Some(400)), 30);
        assert_eq!(cfg.score(&trial(3), &Evaluation::incorrect(), Some(400)), 0);
        assert_eq!(cfg.score(&trial(3), &Evaluation::timeout(), None), 0);
    }

    #[test]
    fn test_latency_penalized() {
        let cfg = ScoringConfig::for_game(GameKind::ReactionTime);
        assert_eq!(cfg.score(&trial(1), &Evaluation::correct(), Some(280)), 720);
        assert_eq!(cfg.score(&trial(1), &Evaluation::correct(), Some(1_400)), 0);
        assert_eq!(cfg.score(&trial(1), &Evaluation::false_start(), None), 0);
    }

    #[test]
    fn test_risk_reward_partial_credit() {
        let cfg = ScoringConfig::for_game(GameKind::MemoryMatrix);
        let mut partial = Evaluation::incorrect();
        partial.hits = 3;
        partial.wrong = 2;
        assert_eq!(cfg.score(&trial(4), &partial, Some(900)), 20);

        let mut reckless = Evaluation::incorrect();
        reckless.hits = 1;
        reckless.wrong = 6;
        assert_eq!(cfg.score(&trial(4), &reckless, Some(900)), 0);

        let mut exact = Evaluation::correct();
        exact.hits = 4;
        assert_eq!(cfg.score(&trial(4), &exact, Some(900)), 40);
    }

    #[test]
    fn test_signal_detection_asymmetry_is_configurable() {
        let cfg = ScoringConfig {
            correct_rejection_points: 5,
            false_alarm_penalty: 3,
            miss_penalty: 2,
            ..ScoringConfig::default()
        };
        let t = trial(2);
        let hit = Evaluation::correct().with_detection(Detection::Hit);
        let rejection = Evaluation::correct().with_detection(Detection::CorrectRejection);
        let false_alarm = Evaluation::incorrect().with_detection(Detection::FalseAlarm);
        let miss = Evaluation::timeout().with_detection(Detection::Miss);

        assert_eq!(cfg.score(&t, &hit, Some(500)), 20);
        assert_eq!(cfg.score(&t, &rejection, Some(500)), 5);
        assert_eq!(cfg.score(&t, &false_alarm, Some(500)), -3);
        assert_eq!(cfg.score(&t, &miss, None), -2);
    }

    #[test]
    fn test_scoring_config_json() {
        let cfg = ScoringConfig::for_game(GameKind::VisualSearch);
        let json = serde_json::to_value(cfg).unwrap();
        assert_eq!(json["rule"]["shape"], "risk_reward");
        assert_eq!(json["rule"]["hit_points"], 10);
    }
}
