//! Per-game rules. Each game's parameter struct implements [`GameRules`], and
//! [`GameSpec::rules`] is the lookup that dispatches on the game tag.

pub mod digit_span;
pub mod focus_switch;
pub mod memory_matrix;
pub mod nback;
pub mod reaction_time;
pub mod rsvp;
pub mod stroop;
pub mod visual_search;

use std::collections::BTreeSet;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::clock::EarlyInput;
use crate::error::ConfigError;
use crate::scheduler::Millis;
use crate::staircase::Level;
use crate::trial::{Evaluation, Response, Trial, TrialOutcome};

pub use digit_span::{DigitSpanParams, SpanMetrics};
pub use focus_switch::{FocusSwitchParams, SwitchMetrics, SwitchRule};
pub use memory_matrix::MemoryMatrixParams;
pub use nback::{NBackParams, SignalDetection};
pub use reaction_time::{ReactionMetrics, ReactionTimeParams};
pub use rsvp::{ReadingMetrics, RsvpParams};
pub use stroop::{InterferenceMetrics, StroopParams};
pub use visual_search::VisualSearchParams;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GameKind {
    NBack,
    FocusSwitch,
    DigitSpan,
    ReactionTime,
    Stroop,
    VisualSearch,
    Rsvp,
    MemoryMatrix,
}

impl GameKind {
    pub const ALL: [GameKind; 8] = [
        GameKind::NBack,
        GameKind::FocusSwitch,
        GameKind::DigitSpan,
        GameKind::ReactionTime,
        GameKind::Stroop,
        GameKind::VisualSearch,
        GameKind::Rsvp,
        GameKind::MemoryMatrix,
    ];
}

/// Game selection together with its stimulus parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GameSpec {
    NBack(NBackParams),
    FocusSwitch(FocusSwitchParams),
    DigitSpan(DigitSpanParams),
    ReactionTime(ReactionTimeParams),
    Stroop(StroopParams),
    VisualSearch(VisualSearchParams),
    Rsvp(RsvpParams),
    MemoryMatrix(MemoryMatrixParams),
}

impl GameSpec {
    pub fn default_for(kind: GameKind) -> Self {
        match kind {
            GameKind::NBack => Self::NBack(NBackParams::default()),
            GameKind::FocusSwitch => Self::FocusSwitch(FocusSwitchParams::default()),
            GameKind::DigitSpan => Self::DigitSpan(DigitSpanParams::default()),
            GameKind::ReactionTime => Self::ReactionTime(ReactionTimeParams::default()),
            GameKind::Stroop => Self::Stroop(StroopParams::default()),
            GameKind::VisualSearch => Self::VisualSearch(VisualSearchParams::default()),
            GameKind::Rsvp => Self::Rsvp(RsvpParams::default()),
            GameKind::MemoryMatrix => Self::MemoryMatrix(MemoryMatrixParams::default()),
        }
    }

    pub fn kind(&self) -> GameKind {
        self.rules().kind()
    }

    pub fn rules(&self) -> &dyn GameRules {
        match self {
            Self::NBack(p) => p,
            Self::FocusSwitch(p) => p,
            Self::DigitSpan(p) => p,
            Self::ReactionTime(p) => p,
            Self::Stroop(p) => p,
            Self::VisualSearch(p) => p,
            Self::Rsvp(p) => p,
            Self::MemoryMatrix(p) => p,
        }
    }
}

/// Largest level a stimulus pool can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub limit: usize,
    pub pool: &'static str,
}

/// Behaviour a game plugs into the shared engine
pub trait GameRules {
    fn kind(&self) -> GameKind;

    /// Check the stimulus parameters on their own.
    fn validate(&self) -> Result<(), ConfigError>;

    fn capacity(&self) -> Option<Capacity> {
        None
    }

    fn early_input(&self) -> EarlyInput {
        EarlyInput::Ignore
    }

    fn response_window_ms(&self, _level: Level, configured: Millis) -> Millis {
        configured
    }

    /// Build trial `index` at `level`. `prior` holds every earlier trial of
    /// the session in order. The capacity check has already passed.
    fn generate(
        &self,
        rng: &mut dyn RngCore,
        index: usize,
        level: Level,
        prior: &[Trial],
    ) -> Result<Trial, ConfigError>;

    fn evaluate(&self, trial: &Trial, response: &Response) -> Evaluation {
        Evaluation::judged(trial.expected == *response)
    }

    fn evaluate_timeout(&self, _trial: &Trial) -> Evaluation {
        Evaluation::timeout()
    }

    fn specialize(&self, outcomes: &[TrialOutcome]) -> GameMetrics;
}

/// Game-specific statistics appended to the session metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "kebab-case")]
pub enum GameMetrics {
    NBack(SignalDetection),
    FocusSwitch(SwitchMetrics),
    DigitSpan(SpanMetrics),
    ReactionTime(ReactionMetrics),
    Stroop(InterferenceMetrics),
    VisualSearch(SelectionMetrics),
    Rsvp(ReadingMetrics),
    MemoryMatrix(SelectionMetrics),
}

/// Totals for games answered by selecting grid cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMetrics {
    pub cells_hit: u32,
    pub wrong_cells: u32,
    /// Largest set reproduced without a mistake
    pub largest_correct: Option<Level>,
}

impl SelectionMetrics {
    pub(crate) fn from_outcomes(outcomes: &[TrialOutcome]) -> Self {
        Self {
            cells_hit: outcomes.iter().map(|o| o.hits).sum(),
            wrong_cells: outcomes.iter().map(|o| o.wrong).sum(),
            largest_correct: outcomes
                .iter()
                .filter(|o| o.is_correct())
                .map(|o| o.trial.difficulty)
                .max(),
        }
    }
}

/// Compare a cell selection with the answer key. Exact match is correct;
/// otherwise every selected target is a hit and every other cell is wrong.
pub(crate) fn judge_cells(expected: &BTreeSet<usize>, response: &Response) -> Evaluation {
    let Response::Cells(selected) = response else {
        return Evaluation::incorrect();
    };
    let hits = selected.intersection(expected).count() as u32;
    let wrong = selected.difference(expected).count() as u32;
    let mut evaluation = Evaluation::judged(selected == expected);
    evaluation.hits = hits;
    evaluation.wrong = wrong;
    evaluation
}

/// Pick `amount` distinct cells of a `size` x `size` grid.
pub(crate) fn sample_cells(rng: &mut dyn RngCore, size: usize, amount: usize) -> BTreeSet<usize> {
    rand::seq::index::sample(rng, size * size, amount)
        .into_iter()
        .collect()
}
