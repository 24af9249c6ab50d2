use rand::RngCore;
use tracing::trace;

use crate::error::ConfigError;
use crate::games::{GameRules, GameSpec};
use crate::staircase::Level;
use crate::trial::Trial;

/// Reject a level the game's stimulus pool cannot serve.
pub fn check_capacity(rules: &dyn GameRules, level: Level) -> Result<(), ConfigError> {
    match rules.capacity() {
        Some(cap) if level as usize > cap.limit => Err(ConfigError::PoolExhausted {
            game: rules.kind(),
            pool: cap.pool,
            requested: level,
            capacity: cap.limit,
        }),
        _ => Ok(()),
    }
}

/// Builds trials from an injected random source, so a seeded source replays
/// the same session.
#[derive(Debug, Clone)]
pub struct TrialGenerator<R> {
    rng: R,
}

impl<R: RngCore> TrialGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn generate(
        &mut self,
        game: &GameSpec,
        index: usize,
        level: Level,
        prior: &[Trial],
    ) -> Result<Trial, ConfigError> {
        let rules = game.rules();
        check_capacity(rules, level)?;
        let trial = rules.generate(&mut self.rng, index, level, prior)?;
        trace!(game = %rules.kind(), index, level, "generated trial");
        Ok(trial)
    }
}
