use thiserror::Error;

use crate::games::GameKind;
use crate::staircase::Level;

/// Rejected session configuration. Raised synchronously by `start` and by the
/// trial generator when a level outgrows the stimulus pool.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("stop condition must be positive (got {0})")]
    EmptyStopCondition(u64),

    #[error("difficulty ceiling {ceiling} is below floor {floor}")]
    InvertedBounds { floor: Level, ceiling: Level },

    #[error("difficulty floor must be at least 1")]
    ZeroFloor,

    #[error("initial difficulty {initial} lies outside [{floor}, {ceiling}]")]
    InitialOutOfBounds {
        initial: Level,
        floor: Level,
        ceiling: Level,
    },

    #[error("staircase threshold `{name}` must be positive")]
    ZeroThreshold { name: &'static str },

    #[error("response window must be longer than 0 ms")]
    ZeroResponseWindow,

    #[error("`{name}` must lie within [0, 1] (got {value})")]
    RatioOutOfRange { name: &'static str, value: f64 },

    #[error("{game}: {reason}")]
    InvalidParameter { game: GameKind, reason: String },

    #[error("{game}: level {requested} needs more {pool} than the {capacity} available")]
    PoolExhausted {
        game: GameKind,
        pool: &'static str,
        requested: Level,
        capacity: usize,
    },
}

impl ConfigError {
    pub(crate) fn invalid(game: GameKind, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            game,
            reason: reason.into(),
        }
    }

    pub(crate) fn check_ratio(name: &'static str, value: f64) -> Result<(), Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(Self::RatioOutOfRange { name, value })
        }
    }
}

/// Lifecycle misuse of a [`SessionController`](crate::session::SessionController).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session already started; create a new controller for another run")]
    AlreadyStarted,

    #[error("session has not been started")]
    NotStarted,

    #[error("session has already ended")]
    Ended,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_ratio_bounds() {
        assert!(ConfigError::check_ratio("match_ratio", 0.0).is_ok());
        assert!(ConfigError::check_ratio("match_ratio", 1.0).is_ok());
        assert_eq!(
            ConfigError::check_ratio("match_ratio", 1.5),
            Err(ConfigError::RatioOutOfRange {
                name: "match_ratio",
                value: 1.5
            })
        );
        assert!(ConfigError::check_ratio("match_ratio", f64::NAN).is_err());
    }

    #[test]
    fn test_pool_exhausted_message() {
        let err = ConfigError::PoolExhausted {
            game: GameKind::VisualSearch,
            pool: "grid cells",
            requested: 17,
            capacity: 16,
        };
        assert_eq!(
            err.to_string(),
            "visual-search: level 17 needs more grid cells than the 16 available"
        );
    }

    #[test]
    fn test_session_error_wraps_config() {
        let err: SessionError = ConfigError::ZeroFloor.into();
        assert_eq!(err.to_string(), "difficulty floor must be at least 1");
    }
}
