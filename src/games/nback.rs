use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{GameKind, GameMetrics, GameRules};
use crate::error::ConfigError;
use crate::staircase::Level;
use crate::trial::{Detection, Evaluation, Response, Stimulus, Trial, TrialMeta, TrialOutcome};

const ALPHABET: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// N-Back: the level is N, the lag the current symbol is compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NBackParams {
    pub alphabet_size: usize,
    /// Probability of a deliberate match once N symbols have been shown
    pub match_ratio: f64,
    /// Treat silence on a non-match trial as a correct rejection instead of
    /// a timeout
    pub timeout_as_rejection: bool,
}

impl Default for NBackParams {
    fn default() -> Self {
        Self {
            alphabet_size: 8,
            match_ratio: 0.3,
            timeout_as_rejection: false,
        }
    }
}

/// Hit / miss / false-alarm tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalDetection {
    pub hits: u32,
    pub misses: u32,
    pub false_alarms: u32,
    pub correct_rejections: u32,
    pub hit_rate: Option<f64>,
    pub false_alarm_rate: Option<f64>,
}

fn rate(part: u32, other: u32) -> Option<f64> {
    let total = part + other;
    (total > 0).then(|| part as f64 / total as f64)
}

impl GameRules for NBackParams {
    fn kind(&self) -> GameKind {
        GameKind::NBack
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // a non-match must avoid both the N-back symbol and the previous one
        if !(3..=ALPHABET.len()).contains(&self.alphabet_size) {
            return Err(ConfigError::invalid(
                GameKind::NBack,
                format!(
                    "alphabet_size must be between 3 and {} (got {})",
                    ALPHABET.len(),
                    self.alphabet_size
                ),
            ));
        }
        ConfigError::check_ratio("match_ratio", self.match_ratio)
    }

    fn generate(
        &self,
        rng: &mut dyn RngCore,
        index: usize,
        level: Level,
        prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let history: Vec<char> = prior
            .iter()
            .filter_map(|t| match t.stimulus {
                Stimulus::Symbol { symbol, .. } => Some(symbol),
                _ => None,
            })
            .collect();
        let target = history
            .len()
            .checked_sub(level as usize)
            .map(|i| history[i]);
        let previous = history.last().copied();

        let (symbol, is_match) = match target {
            Some(target) if rng.gen_bool(self.match_ratio) => (target, true),
            _ => {
                let pool: Vec<char> = ALPHABET
                    .iter()
                    .take(self.alphabet_size)
                    .copied()
                    .filter(|&c| Some(c) != target && Some(c) != previous)
                    .collect();
                let symbol = pool.choose(rng).copied().ok_or_else(|| {
                    ConfigError::invalid(GameKind::NBack, "alphabet leaves no non-match symbol")
                })?;
                (symbol, false)
            }
        };

        Ok(Trial {
            index,
            difficulty: level,
            stimulus: Stimulus::Symbol { symbol, n: level },
            expected: Response::Match(is_match),
            meta: TrialMeta {
                is_match: Some(is_match),
                ..TrialMeta::default()
            },
            exposure_ms: None,
        })
    }

    fn evaluate(&self, trial: &Trial, response: &Response) -> Evaluation {
        let Response::Match(said_match) = *response else {
            return Evaluation::incorrect();
        };
        let is_match = trial.meta.is_match == Some(true);
        match (is_match, said_match) {
            (true, true) => Evaluation::correct().with_detection(Detection::Hit),
            (false, false) => Evaluation::correct().with_detection(Detection::CorrectRejection),
            (true, false) => Evaluation::incorrect().with_detection(Detection::Miss),
            (false, true) => Evaluation::incorrect().with_detection(Detection::FalseAlarm),
        }
    }

    fn evaluate_timeout(&self, trial: &Trial) -> Evaluation {
        let is_match = trial.meta.is_match == Some(true);
        if is_match {
            Evaluation::timeout().with_detection(Detection::Miss)
        } else if self.timeout_as_rejection {
            Evaluation::correct().with_detection(Detection::CorrectRejection)
        } else {
            Evaluation::timeout()
        }
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics {
        let count = |d: Detection| outcomes.iter().filter(|o| o.detection == Some(d)).count() as u32;
        let hits = count(Detection::Hit);
        let misses = count(Detection::Miss);
        let false_alarms = count(Detection::FalseAlarm);
        let correct_rejections = count(Detection::CorrectRejection);
        GameMetrics::NBack(SignalDetection {
            hits,
            misses,
            false_alarms,
            correct_rejections,
            hit_rate: rate(hits, misses),
            false_alarm_rate: rate(false_alarms, correct_rejections),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::Verdict;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn run(params: &NBackParams, level: Level, count: usize, seed: u64) -> Vec<Trial> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut trials: Vec<Trial> = Vec::new();
        for index in 0..count {
            let trial = params.generate(&mut rng, index, level, &trials).unwrap();
            trials.push(trial);
        }
        trials
    }

    fn symbol(trial: &Trial) -> char {
        match trial.stimulus {
            Stimulus::Symbol { symbol, .. } => symbol,
            _ => panic!("not an n-back trial"),
        }
    }

    #[test]
    fn test_matches_agree_with_history() {
        let params = NBackParams::default();
        for level in 1..=3 {
            let trials = run(&params, level, 200, 11);
            let n = level as usize;
            for (i, trial) in trials.iter().enumerate() {
                let is_match = trial.meta.is_match == Some(true);
                if i < n {
                    assert!(!is_match, "no match possible before {n} symbols");
                    continue;
                }
                assert_eq!(is_match, symbol(trial) == symbol(&trials[i - n]));
            }
        }
    }

    #[test]
    fn test_no_accidental_immediate_repeats() {
        let params = NBackParams::default();
        let trials = run(&params, 2, 300, 5);
        for pair in trials.windows(2) {
            if symbol(&pair[0]) == symbol(&pair[1]) {
                panic!("2-back produced an immediate repeat at trial {}", pair[1].index);
            }
        }

        // in 1-back a repeat is always a deliberate match
        let trials = run(&params, 1, 300, 6);
        for pair in trials.windows(2) {
            if symbol(&pair[0]) == symbol(&pair[1]) {
                assert_eq!(pair[1].meta.is_match, Some(true));
            }
        }
    }

    #[test]
    fn test_match_ratio_is_approximated() {
        let params = NBackParams {
            match_ratio: 0.3,
            ..NBackParams::default()
        };
        let trials = run(&params, 2, 2_000, 99);
        let matches = trials.iter().filter(|t| t.meta.is_match == Some(true)).count();
        let ratio = matches as f64 / (trials.len() - 2) as f64;
        assert!((0.25..0.35).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let params = NBackParams::default();
        assert_eq!(run(&params, 2, 50, 1), run(&params, 2, 50, 1));
    }

    #[test]
    fn test_detection_classes() {
        let params = NBackParams::default();
        let mut trial = run(&params, 1, 1, 0).remove(0);

        trial.meta.is_match = Some(true);
        assert_eq!(
            params.evaluate(&trial, &Response::Match(true)).detection,
            Some(Detection::Hit)
        );
        let miss = params.evaluate(&trial, &Response::Match(false));
        assert_eq!(miss.verdict, Verdict::Incorrect);
        assert_eq!(miss.detection, Some(Detection::Miss));

        trial.meta.is_match = Some(false);
        let fa = params.evaluate(&trial, &Response::Match(true));
        assert_eq!(fa.detection, Some(Detection::FalseAlarm));
        let cr = params.evaluate(&trial, &Response::Match(false));
        assert_eq!(cr.verdict, Verdict::Correct);
        assert_eq!(cr.detection, Some(Detection::CorrectRejection));
    }

    #[test]
    fn test_timeout_handling() {
        let mut trial = run(&NBackParams::default(), 1, 1, 0).remove(0);
        trial.meta.is_match = Some(false);

        let strict = NBackParams::default();
        assert_eq!(strict.evaluate_timeout(&trial).verdict, Verdict::Timeout);

        let lenient = NBackParams {
            timeout_as_rejection: true,
            ..NBackParams::default()
        };
        let silent = lenient.evaluate_timeout(&trial);
        assert_eq!(silent.verdict, Verdict::Correct);
        assert_eq!(silent.detection, Some(Detection::CorrectRejection));

        trial.meta.is_match = Some(true);
        let missed = lenient.evaluate_timeout(&trial);
        assert_eq!(missed.verdict, Verdict::Timeout);
        assert_eq!(missed.detection, Some(Detection::Miss));
    }

    #[test]
    fn test_validate_alphabet() {
        let params = NBackParams {
            alphabet_size: 2,
            ..NBackParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidParameter {
                game: GameKind::NBack,
                ..
            })
        ));
    }
}
