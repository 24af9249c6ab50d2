//! Engine events and the observers that consume them. The engine only knows
//! the [`SessionObserver`] trait; where events end up is the caller's choice.

use std::io::{BufWriter, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Cause, Phase};
use crate::config::StopCondition;
use crate::games::GameKind;
use crate::scheduler::Millis;
use crate::session::Completion;
use crate::staircase::Level;
use crate::trial::TrialOutcome;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    SessionStarted {
        game: GameKind,
        stop: StopCondition,
        level: Level,
        at: Millis,
    },
    PhaseEntered {
        /// Index of the trial the phase belongs to
        trial: usize,
        from: Phase,
        to: Phase,
        cause: Cause,
        at: Millis,
    },
    TrialScored {
        outcome: TrialOutcome,
    },
    SessionEnded {
        completion: Completion,
        trials: usize,
        score: i64,
        final_level: Level,
        at: Millis,
    },
}

pub trait SessionObserver {
    fn on_event(&mut self, event: &EngineEvent);
}

impl<F> SessionObserver for F
where
    F: FnMut(&EngineEvent),
{
    fn on_event(&mut self, event: &EngineEvent) {
        self(event)
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::SessionStarted {
                game,
                stop,
                level,
                at,
            } => info!(%game, ?stop, level, at, "session started"),
            EngineEvent::PhaseEntered {
                trial,
                from,
                to,
                cause,
                at,
            } => debug!(trial, %from, %to, ?cause, at, "phase entered"),
            EngineEvent::TrialScored { outcome } => info!(
                trial = outcome.trial.index,
                verdict = ?outcome.verdict,
                latency_ms = ?outcome.latency_ms,
                points = outcome.points,
                level = outcome.level_after,
                "trial scored"
            ),
            EngineEvent::SessionEnded {
                completion,
                trials,
                score,
                final_level,
                at,
            } => info!(?completion, trials, score, final_level, at, "session ended"),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    sequence: u64,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a EngineEvent,
}

/// Writes every event as one JSON line with a sequence number and a UTC
/// timestamp. Write failures are dropped so a broken sink never stops a
/// session.
pub struct JsonlObserver<W: Write> {
    writer: BufWriter<W>,
    sequence: u64,
}

impl<W: Write> std::fmt::Debug for JsonlObserver<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlObserver")
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl<W: Write> JsonlObserver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            sequence: 0,
        }
    }

    pub fn event_count(&self) -> u64 {
        self.sequence
    }
}

impl JsonlObserver<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> SessionObserver for JsonlObserver<W> {
    fn on_event(&mut self, event: &EngineEvent) {
        let envelope = Envelope {
            sequence: self.sequence,
            timestamp: Utc::now(),
            event,
        };
        self.sequence += 1;
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = writeln!(self.writer, "{line}");
            let _ = self.writer.flush();
        }
    }
}
