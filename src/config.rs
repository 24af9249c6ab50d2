use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::error::ConfigError;
use crate::games::{GameKind, GameSpec};
use crate::generator::check_capacity;
use crate::scheduler::Millis;
use crate::scoring::ScoringConfig;
use crate::staircase::StaircaseConfig;

/// When a session stops: after a number of trials or once a wall-clock
/// duration has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    Trials(u32),
    DurationMs(Millis),
}

/// Per-phase durations in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTimings {
    /// Lead-in before the first trial
    pub countdown_ms: Millis,
    pub present_ms: Millis,
    pub response_window_ms: Millis,
    pub feedback_ms: Millis,
    /// Lead-in before every later trial
    pub inter_trial_ms: Millis,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            countdown_ms: 3_000,
            present_ms: 1_500,
            response_window_ms: 2_500,
            feedback_ms: 500,
            inter_trial_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub game: GameSpec,
    pub stop: StopCondition,
    #[serde(default)]
    pub timings: PhaseTimings,
    #[serde(default)]
    pub staircase: StaircaseConfig,
    pub scoring: ScoringConfig,
}

impl SessionConfig {
    /// Built-in defaults for a game
    pub fn preset(kind: GameKind) -> Self {
        let base = Self {
            game: GameSpec::default_for(kind),
            stop: StopCondition::Trials(20),
            timings: PhaseTimings::default(),
            staircase: StaircaseConfig::default(),
            scoring: ScoringConfig::for_game(kind),
        };
        match kind {
            GameKind::NBack => Self {
                stop: StopCondition::DurationMs(60_000),
                timings: PhaseTimings {
                    present_ms: 500,
                    response_window_ms: 2_000,
                    ..PhaseTimings::default()
                },
                staircase: StaircaseConfig {
                    ceiling: 6,
                    streak_to_level_up: 4,
                    streak_to_level_down: 3,
                    ..StaircaseConfig::default()
                },
                ..base
            },
            GameKind::FocusSwitch => Self {
                stop: StopCondition::DurationMs(60_000),
                timings: PhaseTimings {
                    present_ms: 0,
                    response_window_ms: 3_000,
                    feedback_ms: 300,
                    inter_trial_ms: 500,
                    ..PhaseTimings::default()
                },
                ..base
            },
            GameKind::DigitSpan => Self {
                stop: StopCondition::Trials(14),
                timings: PhaseTimings {
                    response_window_ms: 10_000,
                    ..PhaseTimings::default()
                },
                staircase: StaircaseConfig {
                    initial: 3,
                    floor: 2,
                    ceiling: 12,
                    streak_to_level_up: 1,
                    streak_to_level_down: 2,
                },
                ..base
            },
            GameKind::ReactionTime => Self {
                stop: StopCondition::Trials(10),
                timings: PhaseTimings {
                    response_window_ms: 1_000,
                    ..PhaseTimings::default()
                },
                ..base
            },
            GameKind::Stroop => Self {
                stop: StopCondition::Trials(20),
                timings: PhaseTimings {
                    present_ms: 0,
                    response_window_ms: 3_000,
                    ..PhaseTimings::default()
                },
                ..base
            },
            GameKind::VisualSearch => Self {
                stop: StopCondition::Trials(15),
                timings: PhaseTimings {
                    present_ms: 0,
                    response_window_ms: 8_000,
                    ..PhaseTimings::default()
                },
                staircase: StaircaseConfig {
                    initial: 2,
                    ceiling: 8,
                    ..StaircaseConfig::default()
                },
                ..base
            },
            GameKind::Rsvp => Self {
                stop: StopCondition::Trials(10),
                timings: PhaseTimings {
                    response_window_ms: 6_000,
                    ..PhaseTimings::default()
                },
                staircase: StaircaseConfig {
                    ceiling: 13,
                    streak_to_level_up: 2,
                    ..StaircaseConfig::default()
                },
                ..base
            },
            GameKind::MemoryMatrix => Self {
                stop: StopCondition::Trials(12),
                timings: PhaseTimings {
                    present_ms: 2_000,
                    response_window_ms: 8_000,
                    ..PhaseTimings::default()
                },
                staircase: StaircaseConfig {
                    initial: 3,
                    floor: 2,
                    ceiling: 12,
                    streak_to_level_up: 2,
                    streak_to_level_down: 2,
                },
                ..base
            },
        }
    }

    pub fn kind(&self) -> GameKind {
        self.game.kind()
    }

    /// Check the whole configuration, including that the staircase ceiling
    /// fits the game's stimulus pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.stop {
            StopCondition::Trials(0) => return Err(ConfigError::EmptyStopCondition(0)),
            StopCondition::DurationMs(0) => return Err(ConfigError::EmptyStopCondition(0)),
            _ => {}
        }
        if self.timings.response_window_ms == 0 {
            return Err(ConfigError::ZeroResponseWindow);
        }
        self.staircase.validate()?;
        let rules = self.game.rules();
        rules.validate()?;
        check_capacity(rules, self.staircase.ceiling)
    }
}

pub trait ConfigStore {
    /// Saved preset for `kind`, or the built-in one
    fn load(&self, kind: GameKind) -> SessionConfig;
    fn save(&self, cfg: &SessionConfig) -> std::io::Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            dir: AppDirs::config_dir(),
        }
    }

    pub fn with_dir<P: AsRef<Path>>(p: P) -> Self {
        Self {
            dir: p.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, kind: GameKind) -> PathBuf {
        self.dir.join(format!("{kind}.json"))
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self, kind: GameKind) -> SessionConfig {
        let path = self.path_for(kind);
        if let Ok(bytes) = fs::read(&path) {
            match serde_json::from_slice::<SessionConfig>(&bytes) {
                Ok(cfg) if cfg.kind() == kind => {
                    debug!(path = %path.display(), "loaded saved preset");
                    return cfg;
                }
                Ok(cfg) => warn!(
                    path = %path.display(),
                    found = %cfg.kind(),
                    "preset file holds another game; using built-in preset"
                ),
                Err(err) => warn!(
                    path = %path.display(),
                    %err,
                    "unreadable preset; using built-in preset"
                ),
            }
        }
        SessionConfig::preset(kind)
    }

    fn save(&self, cfg: &SessionConfig) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(cfg.kind());
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&path, data)?;
        Ok(path)
    }
}
