//! Intra-trial phase machine.
//!
//! ```text
//! idle -> countdown -> presenting -> awaiting_response -> feedback -> idle
//!                                                                  \-> ended
//! ```
//!
//! Every phase except `idle` and `ended` owns exactly one pending timer. A
//! transition cancels the timer of the phase it leaves before scheduling the
//! next one, and `cancel` drops every timer, so nothing can fire after the
//! machine has moved on.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::scheduler::{Millis, Scheduler, TimerId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Idle,
    Countdown,
    Presenting,
    AwaitingResponse,
    Feedback,
    Ended,
}

/// Durations for one pass through the phase sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePlan {
    pub countdown_ms: Millis,
    pub present_ms: Millis,
    pub response_window_ms: Millis,
    pub feedback_ms: Millis,
}

impl PhasePlan {
    fn duration_of(&self, phase: Phase) -> Option<Millis> {
        match phase {
            Phase::Countdown => Some(self.countdown_ms),
            Phase::Presenting => Some(self.present_ms),
            Phase::AwaitingResponse => Some(self.response_window_ms),
            Phase::Feedback => Some(self.feedback_ms),
            Phase::Idle | Phase::Ended => None,
        }
    }
}

/// How input before the response window is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyInput {
    #[default]
    Ignore,
    /// Input during countdown or presentation ends the trial as a false start
    FalseStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    PhaseEnd(Phase),
    SessionEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    Started,
    Elapsed,
    Response,
    FalseStart,
    Timeout,
    DeadlineReached,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub at: Millis,
    pub cause: Cause,
}

/// Result of offering a response to the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted {
        latency_ms: Millis,
        transition: Transition,
    },
    FalseStart {
        transition: Transition,
    },
    /// Out of phase, or the trial was already decided
    Ignored,
}

#[derive(Debug)]
pub struct PhaseClock {
    phase: Phase,
    entered_at: Millis,
    plan: Option<PhasePlan>,
    decided: bool,
    early_input: EarlyInput,
    timers: Scheduler<Deadline>,
    phase_timer: Option<TimerId>,
}

impl PhaseClock {
    pub fn new(early_input: EarlyInput) -> Self {
        Self {
            phase: Phase::Idle,
            entered_at: 0,
            plan: None,
            decided: false,
            early_input,
            timers: Scheduler::new(),
            phase_timer: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn entered_at(&self) -> Millis {
        self.entered_at
    }

    /// Whether the running trial already has a verdict (response, false
    /// start or timeout).
    pub fn is_decided(&self) -> bool {
        self.decided
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.timers.next_due()
    }

    /// Hard stop for duration-bounded sessions. Fires even mid-trial.
    pub fn set_session_deadline(&mut self, at: Millis) {
        self.timers.schedule(at, Deadline::SessionEnd);
    }

    /// Begin a trial. Only valid from `idle`; returns `None` otherwise.
    pub fn start(&mut self, now: Millis, plan: PhasePlan) -> Option<Transition> {
        if self.phase != Phase::Idle {
            warn!(phase = %self.phase, "start requested outside idle");
            return None;
        }
        self.plan = Some(plan);
        self.decided = false;
        Some(self.enter(Phase::Countdown, now, Cause::Started))
    }

    pub fn submit_response(&mut self, now: Millis) -> Admission {
        if self.decided {
            return Admission::Ignored;
        }
        match self.phase {
            Phase::AwaitingResponse => {
                self.decided = true;
                let latency_ms = now.saturating_sub(self.entered_at);
                let transition = self.enter(Phase::Feedback, now, Cause::Response);
                Admission::Accepted {
                    latency_ms,
                    transition,
                }
            }
            Phase::Countdown | Phase::Presenting if self.early_input == EarlyInput::FalseStart => {
                self.decided = true;
                let transition = self.enter(Phase::Feedback, now, Cause::FalseStart);
                Admission::FalseStart { transition }
            }
            _ => Admission::Ignored,
        }
    }

    /// Fire the earliest timer due at or before `now`. Call repeatedly until
    /// it returns `None` to catch up. Transitions are stamped with the
    /// timer's deadline, not with `now`.
    pub fn poll(&mut self, now: Millis) -> Option<Transition> {
        while let Some((due, id, deadline)) = self.timers.pop_due(now) {
            match deadline {
                Deadline::SessionEnd => {
                    return Some(self.end(due, Cause::DeadlineReached));
                }
                Deadline::PhaseEnd(phase) => {
                    if phase != self.phase || self.phase_timer != Some(id) {
                        warn!(%phase, current = %self.phase, "discarding stale phase timer");
                        continue;
                    }
                    self.phase_timer = None;
                    let transition = match phase {
                        Phase::Countdown => self.enter(Phase::Presenting, due, Cause::Elapsed),
                        Phase::Presenting => {
                            self.enter(Phase::AwaitingResponse, due, Cause::Elapsed)
                        }
                        Phase::AwaitingResponse => {
                            if self.decided {
                                continue;
                            }
                            self.decided = true;
                            self.enter(Phase::Feedback, due, Cause::Timeout)
                        }
                        Phase::Feedback => {
                            self.plan = None;
                            self.enter(Phase::Idle, due, Cause::Elapsed)
                        }
                        Phase::Idle | Phase::Ended => continue,
                    };
                    return Some(transition);
                }
            }
        }
        None
    }

    /// Stop for good after the last trial.
    pub fn finish(&mut self, now: Millis) -> Transition {
        self.end(now, Cause::Finished)
    }

    /// Abort: clears every pending timer, including the session deadline.
    pub fn cancel(&mut self, now: Millis) -> Transition {
        self.end(now, Cause::Cancelled)
    }

    fn end(&mut self, at: Millis, cause: Cause) -> Transition {
        self.timers.cancel_all();
        self.phase_timer = None;
        self.plan = None;
        let from = self.phase;
        self.phase = Phase::Ended;
        self.entered_at = at;
        trace!(%from, ?cause, at, "phase clock ended");
        Transition {
            from,
            to: Phase::Ended,
            at,
            cause,
        }
    }

    fn enter(&mut self, to: Phase, at: Millis, cause: Cause) -> Transition {
        if let Some(id) = self.phase_timer.take() {
            self.timers.cancel(id);
        }
        let from = self.phase;
        self.phase = to;
        self.entered_at = at;
        if let Some(duration) = self.plan.and_then(|plan| plan.duration_of(to)) {
            let due = at.saturating_add(duration);
            self.phase_timer = Some(self.timers.schedule(due, Deadline::PhaseEnd(to)));
        }
        trace!(%from, %to, ?cause, at, "phase transition");
        Transition {
            from,
            to,
            at,
            cause,
        }
    }
}
