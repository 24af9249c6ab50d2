use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{GameKind, GameMetrics, GameRules};
use crate::error::ConfigError;
use crate::metrics::{accuracy_of, mean_latency};
use crate::staircase::Level;
use crate::trial::{Evaluation, Response, Stimulus, Trial, TrialMeta, TrialOutcome};

/// Stroop: name the ink color, ignoring the word. Each level adds
/// `incongruent_step` to the chance that word and ink disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StroopParams {
    pub palette: Vec<String>,
    pub incongruent_ratio: f64,
    pub incongruent_step: f64,
}

impl Default for StroopParams {
    fn default() -> Self {
        Self {
            palette: ["rojo", "azul", "verde", "amarillo"]
                .into_iter()
                .map(String::from)
                .collect(),
            incongruent_ratio: 0.5,
            incongruent_step: 0.05,
        }
    }
}

impl StroopParams {
    pub fn incongruent_probability(&self, level: Level) -> f64 {
        let steps = level.saturating_sub(1) as f64;
        (self.incongruent_ratio + self.incongruent_step * steps).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterferenceMetrics {
    /// Mean incongruent latency minus mean congruent latency
    pub interference_ms: Option<f64>,
    pub congruent_accuracy: f64,
    pub incongruent_accuracy: f64,
}

fn same_color(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl GameRules for StroopParams {
    fn kind(&self) -> GameKind {
        GameKind::Stroop
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.palette.len() < 2 {
            return Err(ConfigError::invalid(
                GameKind::Stroop,
                "palette needs at least two colors",
            ));
        }
        for (i, color) in self.palette.iter().enumerate() {
            if self.palette[..i].iter().any(|c| same_color(c, color)) {
                return Err(ConfigError::invalid(
                    GameKind::Stroop,
                    format!("palette lists `{color}` twice"),
                ));
            }
        }
        ConfigError::check_ratio("incongruent_ratio", self.incongruent_ratio)?;
        ConfigError::check_ratio("incongruent_step", self.incongruent_step)
    }

    fn generate(
        &self,
        rng: &mut dyn RngCore,
        index: usize,
        level: Level,
        _prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let empty = || ConfigError::invalid(GameKind::Stroop, "palette is empty");
        let ink = self.palette.choose(rng).ok_or_else(empty)?.clone();
        let incongruent = rng.gen_bool(self.incongruent_probability(level));
        let word = if incongruent {
            let others: Vec<&String> = self.palette.iter().filter(|c| **c != ink).collect();
            others
                .choose(rng)
                .map(|c| (*c).clone())
                .ok_or_else(|| ConfigError::invalid(GameKind::Stroop, "palette has one color"))?
        } else {
            ink.clone()
        };

        Ok(Trial {
            index,
            difficulty: level,
            expected: Response::Text(ink.clone()),
            stimulus: Stimulus::ColorWord { word, ink },
            meta: TrialMeta {
                is_congruent: Some(!incongruent),
                ..TrialMeta::default()
            },
            exposure_ms: None,
        })
    }

    /// The answer is the ink color; the word itself never counts.
    fn evaluate(&self, trial: &Trial, response: &Response) -> Evaluation {
        match (&trial.stimulus, response) {
            (Stimulus::ColorWord { ink, .. }, Response::Text(named)) => {
                Evaluation::judged(same_color(ink, named))
            }
            _ => Evaluation::incorrect(),
        }
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics {
        let (congruent, incongruent): (Vec<&TrialOutcome>, Vec<&TrialOutcome>) = outcomes
            .iter()
            .partition(|o| o.trial.meta.is_congruent != Some(false));
        GameMetrics::Stroop(InterferenceMetrics {
            interference_ms: mean_latency(incongruent.iter().copied())
                .zip(mean_latency(congruent.iter().copied()))
                .map(|(slow, fast)| slow - fast),
            congruent_accuracy: accuracy_of(congruent.iter().copied()),
            incongruent_accuracy: accuracy_of(incongruent.iter().copied()),
        })
    }
}
