//! Seeded stand-in for a human: answers any game with a configurable hit
//! rate, reaction time, lapse rate and tendency to jump the gun.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::clock::{EarlyInput, Phase};
use crate::error::{ConfigError, SessionError};
use crate::scheduler::{Clock, ManualClock, Millis};
use crate::session::SessionController;
use crate::trial::{Response, Stimulus, Trial};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerProfile {
    /// Chance of answering correctly when answering at all
    pub accuracy: f64,
    pub latency_min_ms: Millis,
    pub latency_max_ms: Millis,
    /// Chance of pressing during the countdown in games that punish it
    pub false_start_rate: f64,
    /// Chance of not answering at all
    pub lapse_rate: f64,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            accuracy: 0.8,
            latency_min_ms: 250,
            latency_max_ms: 900,
            false_start_rate: 0.05,
            lapse_rate: 0.05,
        }
    }
}

impl PlayerProfile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_ratio("accuracy", self.accuracy)?;
        ConfigError::check_ratio("false_start_rate", self.false_start_rate)?;
        ConfigError::check_ratio("lapse_rate", self.lapse_rate)
    }
}

/// What the player does with one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Press before the window opens
    Jump(Response),
    Answer { after_ms: Millis, response: Response },
    Withhold,
}

pub struct SyntheticPlayer<R> {
    profile: PlayerProfile,
    rng: R,
}

impl<R: RngCore> SyntheticPlayer<R> {
    pub fn new(profile: PlayerProfile, rng: R) -> Result<Self, ConfigError> {
        profile.validate()?;
        Ok(Self { profile, rng })
    }

    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    pub fn choose(&mut self, trial: &Trial, early_input: EarlyInput) -> Action {
        if early_input == EarlyInput::FalseStart && self.rng.gen_bool(self.profile.false_start_rate)
        {
            return Action::Jump(trial.expected.clone());
        }
        if self.rng.gen_bool(self.profile.lapse_rate) {
            return Action::Withhold;
        }
        let low = self.profile.latency_min_ms;
        let high = self.profile.latency_max_ms.max(low);
        let after_ms = self.rng.gen_range(low..=high);
        let response = if self.rng.gen_bool(self.profile.accuracy) {
            trial.expected.clone()
        } else {
            wrong_answer(trial)
        };
        Action::Answer { after_ms, response }
    }

    /// Drive a started session to its end on a virtual clock.
    pub fn play<G: RngCore>(
        &mut self,
        controller: &mut SessionController<G>,
        clock: &ManualClock,
    ) -> Result<(), SessionError> {
        let early_input = controller.early_input();
        let mut jumped: Option<usize> = None;
        let mut answered: Option<usize> = None;

        while !controller.is_finished() {
            let now = clock.now();
            let trial = controller.current_trial().cloned();
            if let Some(trial) = trial {
                let phase = controller.phase();
                let fresh = answered != Some(trial.index) && jumped != Some(trial.index);
                if fresh && phase == Phase::Countdown && early_input == EarlyInput::FalseStart {
                    jumped = Some(trial.index);
                    if let Action::Jump(response) = self.choose(&trial, early_input) {
                        answered = Some(trial.index);
                        controller.respond(now, response)?;
                        continue;
                    }
                }
                if phase == Phase::AwaitingResponse && answered != Some(trial.index) {
                    answered = Some(trial.index);
                    match self.choose(&trial, EarlyInput::Ignore) {
                        Action::Answer { after_ms, response } => {
                            clock.set(now.saturating_add(after_ms));
                            controller.respond(clock.now(), response)?;
                            continue;
                        }
                        Action::Jump(_) | Action::Withhold => {}
                    }
                }
            }
            match controller.next_deadline() {
                Some(due) => {
                    clock.set(due.max(now));
                    controller.advance(clock.now())?;
                }
                None => break,
            }
        }
        Ok(())
    }
}

/// A plausible mistake for the trial's answer key
fn wrong_answer(trial: &Trial) -> Response {
    match (&trial.expected, &trial.stimulus) {
        (Response::Match(is_match), _) => Response::Match(!is_match),
        (Response::Choice(answer), Stimulus::WordStream { choices, .. }) => {
            Response::Choice((answer + 1) % choices.len().max(1))
        }
        (Response::Choice(answer), _) => Response::Choice(1 - answer.min(&1)),
        (Response::Text(ink), Stimulus::ColorWord { word, .. }) if word != ink => {
            // read the word instead of naming the ink
            Response::Text(word.clone())
        }
        (Response::Text(_), _) => Response::Text(String::new()),
        (Response::Sequence(digits), _) => {
            let mut digits = digits.clone();
            if let Some(last) = digits.last_mut() {
                *last = (*last + 1) % 10;
            }
            Response::Sequence(digits)
        }
        (Response::Cells(cells), Stimulus::SearchGrid { size, .. } | Stimulus::Pattern { size, .. }) => {
            let mut picked = cells.clone();
            if let Some(first) = picked.iter().next().copied() {
                picked.remove(&first);
            }
            if let Some(free) = (0..size * size).find(|c| !cells.contains(c)) {
                picked.insert(free);
            }
            Response::Cells(picked)
        }
        (Response::Cells(cells), _) => Response::Cells(cells.iter().skip(1).copied().collect()),
        (Response::Press, _) => Response::Press,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::games::{GameKind, GameSpec};
    use crate::session::Completion;
    use crate::trial::Verdict;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn player(profile: PlayerProfile, seed: u64) -> SyntheticPlayer<ChaCha8Rng> {
        SyntheticPlayer::new(profile, ChaCha8Rng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_wrong_answers_are_wrong() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        for kind in GameKind::ALL {
            if kind == GameKind::ReactionTime {
                continue;
            }
            let spec = GameSpec::default_for(kind);
            let rules = spec.rules();
            for index in 0..30 {
                let trial = rules.generate(&mut rng, index, 2, &[]).unwrap();
                let evaluation = rules.evaluate(&trial, &wrong_answer(&trial));
                assert_eq!(evaluation.verdict, Verdict::Incorrect, "{kind}");
            }
        }
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let profile = PlayerProfile {
            accuracy: 1.2,
            ..PlayerProfile::default()
        };
        assert!(SyntheticPlayer::new(profile, ChaCha8Rng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_perfect_player_completes_every_trial() {
        let profile = PlayerProfile {
            accuracy: 1.0,
            false_start_rate: 0.0,
            lapse_rate: 0.0,
            ..PlayerProfile::default()
        };
        let config = SessionConfig::preset(GameKind::Stroop);
        let mut controller = SessionController::seeded(21);
        controller.start(config, 0).unwrap();
        let clock = ManualClock::new();
        player(profile, 21).play(&mut controller, &clock).unwrap();

        let result = controller.result().unwrap();
        assert_eq!(result.completion, Completion::Completed);
        assert_eq!(result.outcomes.len(), 20);
        assert!(result.outcomes.iter().all(|o| o.verdict == Verdict::Correct));
        assert_eq!(result.metrics.accuracy, 1.0);
        assert!(result.final_level > 1);
    }

    #[test]
    fn test_jumpy_player_false_starts() {
        let profile = PlayerProfile {
            false_start_rate: 1.0,
            ..PlayerProfile::default()
        };
        let config = SessionConfig::preset(GameKind::ReactionTime);
        let mut controller = SessionController::seeded(2);
        controller.start(config, 0).unwrap();
        player(profile, 2)
            .play(&mut controller, &ManualClock::new())
            .unwrap();

        let result = controller.result().unwrap();
        assert_eq!(result.outcomes.len(), 10);
        assert!(result
            .outcomes
            .iter()
            .all(|o| o.verdict == Verdict::FalseStart && o.points == 0));
        assert_eq!(result.metrics.valid_trials, 0);
    }
}
