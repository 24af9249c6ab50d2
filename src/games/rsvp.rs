use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{GameKind, GameMetrics, GameRules};
use crate::error::ConfigError;
use crate::staircase::Level;
use crate::trial::{Response, Stimulus, Trial, TrialMeta, TrialOutcome};

const WORDS: &[&str] = &[
    "river", "lantern", "copper", "meadow", "harbor", "violet", "engine", "whisper", "canyon",
    "marble", "orchard", "signal", "thunder", "pocket", "glacier", "compass", "velvet", "falcon",
    "ladder", "pepper", "saddle", "timber", "anchor", "blossom", "candle", "dragon", "ember",
    "feather", "garden", "hollow", "island", "jacket", "kettle", "lemon", "mirror", "needle",
    "ocean", "pillow", "quartz", "ribbon", "silver", "tunnel", "umbrella", "valley", "window",
    "yellow", "zephyr", "basket", "cactus", "dolphin", "forest", "guitar", "hammer", "igloo",
    "jungle", "koala", "magnet", "noodle", "parrot", "rocket",
];

/// RSVP: a span of words flashes at a controlled rate, then one of them must
/// be picked out among distractors. Each level raises the rate by `wpm_step`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsvpParams {
    pub words_per_trial: usize,
    pub wpm_start: u32,
    pub wpm_step: u32,
    pub wpm_max: u32,
    /// Options offered in the recognition question, the correct one included
    pub choices: usize,
}

impl Default for RsvpParams {
    fn default() -> Self {
        Self {
            words_per_trial: 6,
            wpm_start: 200,
            wpm_step: 50,
            wpm_max: 800,
            choices: 4,
        }
    }
}

impl RsvpParams {
    pub fn wpm_at(&self, level: Level) -> u32 {
        let raised = self
            .wpm_step
            .saturating_mul(level.saturating_sub(1))
            .saturating_add(self.wpm_start);
        raised.min(self.wpm_max)
    }

    /// How long the whole span stays on screen at `wpm`
    pub fn exposure_ms(&self, wpm: u32) -> u64 {
        (self.words_per_trial as u64).saturating_mul(60_000) / u64::from(wpm.max(1))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingMetrics {
    /// Fastest rate at which a span was recognized correctly
    pub peak_wpm: Option<u32>,
    pub comprehension: f64,
}

impl GameRules for RsvpParams {
    fn kind(&self) -> GameKind {
        GameKind::Rsvp
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: String| Err(ConfigError::invalid(GameKind::Rsvp, reason));
        if self.words_per_trial == 0 {
            return fail("words_per_trial must be positive".into());
        }
        if self.choices < 2 {
            return fail(format!("choices must be at least 2 (got {})", self.choices));
        }
        if self.wpm_start == 0 || self.wpm_max < self.wpm_start {
            return fail(format!(
                "wpm range {}..={} is empty",
                self.wpm_start, self.wpm_max
            ));
        }
        // the span and the distractors are drawn without repetition
        let needed = (self.words_per_trial + self.choices).saturating_sub(1);
        if needed > WORDS.len() {
            return Err(ConfigError::PoolExhausted {
                game: GameKind::Rsvp,
                pool: "words",
                requested: needed as Level,
                capacity: WORDS.len(),
            });
        }
        Ok(())
    }

    fn generate(
        &self,
        rng: &mut dyn RngCore,
        index: usize,
        level: Level,
        _prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let needed = (self.words_per_trial + self.choices).saturating_sub(1);
        let drawn: Vec<&str> = WORDS.choose_multiple(rng, needed).copied().collect();
        if drawn.len() < needed {
            return Err(ConfigError::PoolExhausted {
                game: GameKind::Rsvp,
                pool: "words",
                requested: needed as Level,
                capacity: WORDS.len(),
            });
        }
        let (span, distractors) = drawn.split_at(self.words_per_trial);
        let target = span
            .choose(rng)
            .copied()
            .ok_or_else(|| ConfigError::invalid(GameKind::Rsvp, "empty word span"))?;

        let mut choices: Vec<String> = distractors.iter().map(|w| w.to_string()).collect();
        choices.push(target.to_string());
        choices.shuffle(rng);
        let answer = choices.iter().position(|c| c == target).unwrap_or_default();

        let wpm = self.wpm_at(level);
        Ok(Trial {
            index,
            difficulty: level,
            stimulus: Stimulus::WordStream {
                words: span.iter().map(|w| w.to_string()).collect(),
                wpm,
                choices,
            },
            expected: Response::Choice(answer),
            meta: TrialMeta::default(),
            exposure_ms: Some(self.exposure_ms(wpm)),
        })
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics {
        let answered = outcomes.len();
        let correct: Vec<&TrialOutcome> = outcomes.iter().filter(|o| o.is_correct()).collect();
        GameMetrics::Rsvp(ReadingMetrics {
            peak_wpm: correct.iter().map(|o| self.wpm_at(o.trial.difficulty)).max(),
            comprehension: if answered == 0 {
                0.0
            } else {
                correct.len() as f64 / answered as f64
            },
        })
    }
}
