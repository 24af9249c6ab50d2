use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::games::{GameMetrics, GameRules};
use crate::staircase::Level;
use crate::trial::{TrialOutcome, Verdict};
use crate::util::{mean, std_dev};

/// Mean latency over the valid outcomes only
pub fn mean_latency<'a>(outcomes: impl IntoIterator<Item = &'a TrialOutcome>) -> Option<f64> {
    mean(&valid_latencies(outcomes))
}

/// Correct over attempted, as a fraction; 0 when nothing was attempted
pub fn accuracy_of<'a>(outcomes: impl IntoIterator<Item = &'a TrialOutcome>) -> f64 {
    let (attempted, correct) = outcomes
        .into_iter()
        .fold((0u32, 0u32), |(attempted, correct), o| {
            (attempted + 1, correct + u32::from(o.is_correct()))
        });
    ratio(correct, attempted)
}

/// `100 - (stddev / mean) * 100` clamped to `[0, 100]`. Fewer than two
/// samples, or a zero mean, count as perfectly consistent.
pub fn consistency_pct(latencies: &[f64]) -> f64 {
    if latencies.len() < 2 {
        return 100.0;
    }
    match (mean(latencies), std_dev(latencies)) {
        (Some(m), Some(sd)) if m > 0.0 => (100.0 - (sd / m) * 100.0).clamp(0.0, 100.0),
        _ => 100.0,
    }
}

fn valid_latencies<'a>(outcomes: impl IntoIterator<Item = &'a TrialOutcome>) -> Vec<f64> {
    outcomes
        .into_iter()
        .filter(|o| o.is_valid())
        .filter_map(|o| o.latency_ms)
        .map(|ms| ms as f64)
        .collect()
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}

/// Final statistics of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total: u32,
    pub attempted: u32,
    pub correct: u32,
    pub accuracy: f64,
    pub avg_response_ms: Option<f64>,
    pub best_response_ms: Option<f64>,
    pub slowest_response_ms: Option<f64>,
    pub consistency_pct: f64,
    pub max_level: Level,
    pub valid_trials: u32,
    pub timeouts: u32,
    pub false_starts: u32,
    pub game: GameMetrics,
}

/// Running figures for a HUD while the session is still going
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub attempted: u32,
    pub correct: u32,
    pub accuracy: f64,
    pub score: i64,
    pub avg_response_ms: Option<f64>,
    pub max_level: Level,
}

#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    outcomes: Vec<TrialOutcome>,
    correct: u32,
    timeouts: u32,
    false_starts: u32,
    latencies: Vec<f64>,
    points: i64,
    max_level: Level,
}

impl MetricsAggregator {
    pub fn new(initial_level: Level) -> Self {
        Self {
            outcomes: Vec::new(),
            correct: 0,
            timeouts: 0,
            false_starts: 0,
            latencies: Vec::new(),
            points: 0,
            max_level: initial_level,
        }
    }

    pub fn record(&mut self, outcome: TrialOutcome) {
        match outcome.verdict {
            Verdict::Correct => self.correct += 1,
            Verdict::Timeout => self.timeouts += 1,
            Verdict::FalseStart => self.false_starts += 1,
            Verdict::Incorrect => {}
        }
        if outcome.is_valid() {
            if let Some(ms) = outcome.latency_ms {
                self.latencies.push(ms as f64);
            }
        }
        self.points = self.points.saturating_add(outcome.points);
        self.max_level = self
            .max_level
            .max(outcome.trial.difficulty)
            .max(outcome.level_after);
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[TrialOutcome] {
        &self.outcomes
    }

    pub fn attempted(&self) -> u32 {
        self.outcomes.len() as u32
    }

    /// Sum of trial points, never below zero
    pub fn score(&self) -> i64 {
        self.points.max(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempted: self.attempted(),
            correct: self.correct,
            accuracy: ratio(self.correct, self.attempted()),
            score: self.score(),
            avg_response_ms: mean(&self.latencies),
            max_level: self.max_level,
        }
    }

    pub fn finalize(&self, rules: &dyn GameRules) -> SessionMetrics {
        let (best, slowest) = self.latencies.iter().copied().minmax().into_option().unzip();
        SessionMetrics {
            total: self.attempted(),
            attempted: self.attempted(),
            correct: self.correct,
            accuracy: ratio(self.correct, self.attempted()),
            avg_response_ms: mean(&self.latencies),
            best_response_ms: best,
            slowest_response_ms: slowest,
            consistency_pct: consistency_pct(&self.latencies),
            max_level: self.max_level,
            valid_trials: self.latencies.len() as u32,
            timeouts: self.timeouts,
            false_starts: self.false_starts,
            game: rules.specialize(&self.outcomes),
        }
    }

    pub fn into_outcomes(self) -> Vec<TrialOutcome> {
        self.outcomes
    }
}
