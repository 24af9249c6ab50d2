use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::games::focus_switch::SwitchRule;
use crate::staircase::Level;

/// Stimulus payload of a single trial, one variant per game family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stimulus {
    /// N-Back symbol; `n` is the lag the user compares against
    Symbol { symbol: char, n: Level },
    /// Focus-Switch digit judged under the cued rule
    RuleDigit { digit: u8, rule: SwitchRule },
    /// Digit Span sequence
    Digits { digits: Vec<u8>, backward: bool },
    /// Reaction Time go signal shown after a random foreperiod
    Signal { foreperiod_ms: u64 },
    /// Stroop color word drawn in an ink color
    ColorWord { word: String, ink: String },
    /// Visual Search grid; `targets` are cell indexes holding the odd glyph
    SearchGrid {
        size: usize,
        targets: BTreeSet<usize>,
    },
    /// RSVP word stream followed by a recognition question
    WordStream {
        words: Vec<String>,
        wpm: u32,
        choices: Vec<String>,
    },
    /// Memory Matrix pattern of lit cells
    Pattern { size: usize, lit: BTreeSet<usize> },
}

/// A user action delivered through `respond`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Response {
    /// Match / no-match judgement
    Match(bool),
    /// Index into the presented options
    Choice(usize),
    /// Free text such as a color name
    Text(String),
    /// Recalled sequence
    Sequence(Vec<u8>),
    /// Selected grid cells
    Cells(BTreeSet<usize>),
    /// Bare key press
    Press,
}

/// Analytics flags attached at generation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_congruent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_switch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_match: Option<bool>,
}

/// Generated trial: stimulus, answer key and an optional exposure override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    pub index: usize,
    pub difficulty: Level,
    pub stimulus: Stimulus,
    pub expected: Response,
    pub meta: TrialMeta,
    /// Replaces the configured presentation time when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Timeout,
    FalseStart,
}

/// Signal-detection class for match/no-match games
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detection {
    Hit,
    Miss,
    FalseAlarm,
    CorrectRejection,
}

/// Result of judging a response against the trial's answer key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// Correct selections (grid cells, or 1 for a correct single answer)
    pub hits: u32,
    /// Wrong selections
    pub wrong: u32,
    pub detection: Option<Detection>,
}

impl Evaluation {
    pub fn correct() -> Self {
        Self {
            verdict: Verdict::Correct,
            hits: 1,
            wrong: 0,
            detection: None,
        }
    }

    pub fn incorrect() -> Self {
        Self {
            verdict: Verdict::Incorrect,
            hits: 0,
            wrong: 1,
            detection: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            verdict: Verdict::Timeout,
            hits: 0,
            wrong: 0,
            detection: None,
        }
    }

    pub fn false_start() -> Self {
        Self {
            verdict: Verdict::FalseStart,
            hits: 0,
            wrong: 0,
            detection: None,
        }
    }

    pub fn judged(correct: bool) -> Self {
        if correct {
            Self::correct()
        } else {
            Self::incorrect()
        }
    }

    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detection = Some(detection);
        self
    }
}

/// What the user did during the trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "response", rename_all = "snake_case")]
pub enum UserResponse {
    Given(Response),
    /// Input arrived before the response window opened
    Early(Response),
    None,
}

/// Immutable record of one finished trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub trial: Trial,
    pub response: UserResponse,
    /// Milliseconds from the response window opening; `None` for timeouts
    /// and false starts
    pub latency_ms: Option<u64>,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<Detection>,
    pub hits: u32,
    pub wrong: u32,
    pub points: i64,
    /// Level after the staircase processed this outcome
    pub level_after: Level,
    /// Session time at which the trial was decided
    pub decided_at_ms: u64,
}

impl TrialOutcome {
    pub fn is_correct(&self) -> bool {
        self.verdict == Verdict::Correct
    }

    /// Responded inside the window, so the latency is a usable sample
    pub fn is_valid(&self) -> bool {
        self.latency_ms.is_some()
            && matches!(self.verdict, Verdict::Correct | Verdict::Incorrect)
    }
}
