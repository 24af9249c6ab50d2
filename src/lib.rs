// Library surface for the CLI host, headless tests and reuse.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod games;
pub mod generator;
pub mod history;
pub mod keymap;
pub mod logging;
pub mod metrics;
pub mod player;
pub mod runtime;
pub mod scheduler;
pub mod scoring;
pub mod session;
pub mod staircase;
pub mod telemetry;
pub mod time_series;
pub mod trial;
pub mod ui;
pub mod util;

pub use config::{ConfigStore, FileConfigStore, SessionConfig, StopCondition};
pub use error::{ConfigError, SessionError};
pub use games::{GameKind, GameSpec};
pub use session::{Completion, Disposition, SessionController, SessionResult};
pub use trial::{Response, Trial, TrialOutcome, Verdict};
