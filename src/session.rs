//! Session orchestration: generate a trial, drive its phases, score it, move
//! the staircase, record metrics, repeat until the stop condition holds.

use chrono::{DateTime, Utc};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::clock::{Admission, Cause, EarlyInput, Phase, PhaseClock, PhasePlan, Transition};
use crate::config::{SessionConfig, StopCondition};
use crate::error::{ConfigError, SessionError};
use crate::games::GameKind;
use crate::generator::TrialGenerator;
use crate::metrics::{MetricsAggregator, MetricsSnapshot, SessionMetrics};
use crate::scheduler::Millis;
use crate::staircase::{Level, StaircaseState};
use crate::telemetry::{EngineEvent, SessionObserver};
use crate::time_series::DifficultyPoint;
use crate::trial::{Evaluation, Response, Trial, TrialOutcome, UserResponse};

/// How a session came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// All configured trials were played
    Completed,
    /// The configured duration ran out
    DurationElapsed,
    /// Stopped by `abort`
    Aborted,
}

impl Completion {
    pub fn is_partial(self) -> bool {
        self == Completion::Aborted
    }
}

/// Final, immutable record of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub game: GameKind,
    pub completion: Completion,
    pub partial: bool,
    pub outcomes: Vec<TrialOutcome>,
    pub score: i64,
    pub final_level: Level,
    pub metrics: SessionMetrics,
    pub difficulty_trace: Vec<DifficultyPoint>,
    pub elapsed_ms: Millis,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// What became of a response
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Scored(TrialOutcome),
    /// Out of phase, already decided, or the session is over
    Ignored,
}

/// Live view for a HUD
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub trial: Option<usize>,
    pub level: Level,
    pub elapsed_ms: Millis,
    pub metrics: MetricsSnapshot,
}

fn phase_event(trial: usize, t: Transition) -> EngineEvent {
    EngineEvent::PhaseEntered {
        trial,
        from: t.from,
        to: t.to,
        cause: t.cause,
        at: t.at,
    }
}

/// Everything `catch_up` did before returning
struct Progress {
    scored: Vec<TrialOutcome>,
    ended: Option<(Completion, Millis)>,
}

struct Running {
    config: SessionConfig,
    clock: PhaseClock,
    staircase: StaircaseState,
    metrics: MetricsAggregator,
    trials: Vec<Trial>,
    current: Option<Trial>,
    trace: Vec<DifficultyPoint>,
    started_ms: Millis,
    started_at: DateTime<Utc>,
}

impl Running {
    fn begin_trial<R: RngCore>(
        &mut self,
        generator: &mut TrialGenerator<R>,
        at: Millis,
        lead_in_ms: Millis,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), ConfigError> {
        let level = self.staircase.level;
        let index = self.trials.len();
        let trial = generator.generate(&self.config.game, index, level, &self.trials)?;
        let timings = self.config.timings;
        let plan = PhasePlan {
            countdown_ms: lead_in_ms,
            present_ms: trial.exposure_ms.unwrap_or(timings.present_ms),
            response_window_ms: self
                .config
                .game
                .rules()
                .response_window_ms(level, timings.response_window_ms),
            feedback_ms: timings.feedback_ms,
        };
        self.trials.push(trial.clone());
        self.current = Some(trial);
        if let Some(t) = self.clock.start(at, plan) {
            events.push(phase_event(index, t));
        }
        Ok(())
    }

    fn decide(
        &mut self,
        trial: Trial,
        evaluation: Evaluation,
        response: UserResponse,
        latency_ms: Option<Millis>,
        at: Millis,
        events: &mut Vec<EngineEvent>,
    ) -> TrialOutcome {
        let points = self.config.scoring.score(&trial, &evaluation, latency_ms);
        let elapsed_ms = at.saturating_sub(self.started_ms);
        let mut outcome = TrialOutcome {
            trial,
            response,
            latency_ms,
            verdict: evaluation.verdict,
            detection: evaluation.detection,
            hits: evaluation.hits,
            wrong: evaluation.wrong,
            points,
            level_after: self.staircase.level,
            decided_at_ms: elapsed_ms,
        };
        self.staircase = self.staircase.update(&self.config.staircase, &outcome);
        outcome.level_after = self.staircase.level;
        self.trace.push(DifficultyPoint::new(
            outcome.trial.index,
            elapsed_ms,
            self.staircase.level,
        ));
        self.metrics.record(outcome.clone());
        events.push(EngineEvent::TrialScored {
            outcome: outcome.clone(),
        });
        outcome
    }

    fn trials_done(&self) -> bool {
        matches!(self.config.stop, StopCondition::Trials(n) if self.metrics.attempted() >= n)
    }

    /// Fire every timer due by `now`, in deadline order.
    fn catch_up<R: RngCore>(
        &mut self,
        generator: &mut TrialGenerator<R>,
        now: Millis,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Progress, ConfigError> {
        let mut scored = Vec::new();
        while let Some(t) = self.clock.poll(now) {
            let index = self.trials.len().saturating_sub(1);
            events.push(phase_event(index, t));
            match t.cause {
                Cause::Timeout => {
                    if let Some(trial) = self.current.clone() {
                        let evaluation = self.config.game.rules().evaluate_timeout(&trial);
                        scored.push(self.decide(
                            trial,
                            evaluation,
                            UserResponse::None,
                            None,
                            t.at,
                            events,
                        ));
                    }
                }
                Cause::DeadlineReached => {
                    if self.current.is_some() && !self.clock.is_decided() {
                        debug!(trial = index, "duration elapsed mid-trial; trial dropped");
                    }
                    self.current = None;
                    return Ok(Progress {
                        scored,
                        ended: Some((Completion::DurationElapsed, t.at)),
                    });
                }
                _ if t.to == Phase::Idle => {
                    self.current = None;
                    if self.trials_done() {
                        events.push(phase_event(index, self.clock.finish(t.at)));
                        return Ok(Progress {
                            scored,
                            ended: Some((Completion::Completed, t.at)),
                        });
                    }
                    let gap = self.config.timings.inter_trial_ms;
                    self.begin_trial(generator, t.at, gap, events)?;
                }
                _ => {}
            }
        }
        Ok(Progress {
            scored,
            ended: None,
        })
    }

    fn respond(
        &mut self,
        now: Millis,
        response: Response,
        events: &mut Vec<EngineEvent>,
    ) -> Disposition {
        let Some(index) = self.current.as_ref().map(|t| t.index) else {
            return Disposition::Ignored;
        };
        let (evaluation, response, latency_ms, transition) = match self.clock.submit_response(now)
        {
            Admission::Accepted {
                latency_ms,
                transition,
            } => {
                let Some(trial) = self.current.as_ref() else {
                    return Disposition::Ignored;
                };
                let evaluation = self.config.game.rules().evaluate(trial, &response);
                (
                    evaluation,
                    UserResponse::Given(response),
                    Some(latency_ms),
                    transition,
                )
            }
            Admission::FalseStart { transition } => (
                Evaluation::false_start(),
                UserResponse::Early(response),
                None,
                transition,
            ),
            Admission::Ignored => {
                trace!(phase = %self.clock.phase(), "response ignored");
                return Disposition::Ignored;
            }
        };
        events.push(phase_event(index, transition));
        match self.current.clone() {
            Some(trial) => Disposition::Scored(self.decide(
                trial,
                evaluation,
                response,
                latency_ms,
                transition.at,
                events,
            )),
            None => Disposition::Ignored,
        }
    }

    fn snapshot(&self, now: Millis) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.clock.phase(),
            trial: self.current.as_ref().map(|t| t.index),
            level: self.staircase.level,
            elapsed_ms: now.saturating_sub(self.started_ms),
            metrics: self.metrics.snapshot(),
        }
    }

    fn into_result(self, completion: Completion, at: Millis) -> SessionResult {
        let metrics = self.metrics.finalize(self.config.game.rules());
        SessionResult {
            game: self.config.kind(),
            completion,
            partial: completion.is_partial(),
            score: self.metrics.score(),
            final_level: self.staircase.level,
            metrics,
            difficulty_trace: self.trace,
            elapsed_ms: at.saturating_sub(self.started_ms),
            started_at: self.started_at,
            ended_at: Utc::now(),
            outcomes: self.metrics.into_outcomes(),
        }
    }
}

enum Lifecycle {
    NotStarted,
    Running(Box<Running>),
    Ended(Box<SessionResult>),
}

/// Runs one session. Time is always passed in, so a virtual clock can drive
/// it as easily as a real one. A controller cannot be restarted.
pub struct SessionController<R> {
    generator: TrialGenerator<R>,
    lifecycle: Lifecycle,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl SessionController<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: RngCore> SessionController<R> {
    pub fn new(rng: R) -> Self {
        Self {
            generator: TrialGenerator::new(rng),
            lifecycle: Lifecycle::NotStarted,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Validate `config` and begin the first trial. A rejected config leaves
    /// the controller unstarted.
    pub fn start(&mut self, config: SessionConfig, now: Millis) -> Result<(), SessionError> {
        match self.lifecycle {
            Lifecycle::NotStarted => {}
            Lifecycle::Running(_) | Lifecycle::Ended(_) => return Err(SessionError::AlreadyStarted),
        }
        config.validate()?;

        let mut clock = PhaseClock::new(config.game.rules().early_input());
        if let StopCondition::DurationMs(ms) = config.stop {
            clock.set_session_deadline(now.saturating_add(ms));
        }
        let lead_in = config.timings.countdown_ms;
        let mut events = vec![EngineEvent::SessionStarted {
            game: config.kind(),
            stop: config.stop,
            level: config.staircase.initial,
            at: now,
        }];
        info!(game = %config.kind(), stop = ?config.stop, "starting session");

        let mut run = Running {
            staircase: StaircaseState::new(&config.staircase),
            metrics: MetricsAggregator::new(config.staircase.initial),
            config,
            clock,
            trials: Vec::new(),
            current: None,
            trace: Vec::new(),
            started_ms: now,
            started_at: Utc::now(),
        };
        run.begin_trial(&mut self.generator, now, lead_in, &mut events)?;
        self.lifecycle = Lifecycle::Running(Box::new(run));
        self.dispatch(&events);
        Ok(())
    }

    /// Fire every timer due by `now`. Returns the trials decided by timeout.
    pub fn advance(&mut self, now: Millis) -> Result<Vec<TrialOutcome>, SessionError> {
        let mut events = Vec::new();
        let progress = match &mut self.lifecycle {
            Lifecycle::NotStarted => return Err(SessionError::NotStarted),
            Lifecycle::Ended(_) => return Ok(Vec::new()),
            Lifecycle::Running(run) => run.catch_up(&mut self.generator, now, &mut events),
        };
        self.dispatch(&events);
        match progress {
            Ok(Progress { scored, ended }) => {
                if let Some((completion, at)) = ended {
                    self.finish(completion, at);
                }
                Ok(scored)
            }
            Err(err) => {
                self.abort_with(now);
                Err(err.into())
            }
        }
    }

    /// Deliver a response arriving at `now`. Overdue timers fire first, so a
    /// response after its window closed loses to the timeout.
    pub fn respond(&mut self, now: Millis, response: Response) -> Result<Disposition, SessionError> {
        match self.lifecycle {
            Lifecycle::NotStarted => return Err(SessionError::NotStarted),
            Lifecycle::Ended(_) => return Ok(Disposition::Ignored),
            Lifecycle::Running(_) => {}
        }
        self.advance(now)?;

        let mut events = Vec::new();
        let disposition = match &mut self.lifecycle {
            Lifecycle::Running(run) => run.respond(now, response, &mut events),
            Lifecycle::NotStarted | Lifecycle::Ended(_) => Disposition::Ignored,
        };
        self.dispatch(&events);
        Ok(disposition)
    }

    /// Stop now. The result is tagged partial.
    pub fn abort(&mut self, now: Millis) -> Result<&SessionResult, SessionError> {
        match self.lifecycle {
            Lifecycle::NotStarted => return Err(SessionError::NotStarted),
            Lifecycle::Ended(_) => return Err(SessionError::Ended),
            Lifecycle::Running(_) => {}
        }
        self.abort_with(now);
        self.result().ok_or(SessionError::Ended)
    }

    fn abort_with(&mut self, now: Millis) {
        let transition = match &mut self.lifecycle {
            Lifecycle::Running(run) => {
                let index = run.trials.len().saturating_sub(1);
                phase_event(index, run.clock.cancel(now))
            }
            Lifecycle::NotStarted | Lifecycle::Ended(_) => return,
        };
        self.dispatch(&[transition]);
        self.finish(Completion::Aborted, now);
    }

    fn finish(&mut self, completion: Completion, at: Millis) {
        let run = match std::mem::replace(&mut self.lifecycle, Lifecycle::NotStarted) {
            Lifecycle::Running(run) => run,
            other => {
                self.lifecycle = other;
                return;
            }
        };
        let result = run.into_result(completion, at);
        info!(
            game = %result.game,
            ?completion,
            trials = result.outcomes.len(),
            score = result.score,
            final_level = result.final_level,
            "session ended"
        );
        let event = EngineEvent::SessionEnded {
            completion,
            trials: result.outcomes.len(),
            score: result.score,
            final_level: result.final_level,
            at,
        };
        self.lifecycle = Lifecycle::Ended(Box::new(result));
        self.dispatch(&[event]);
    }

    fn dispatch(&mut self, events: &[EngineEvent]) {
        for event in events {
            for observer in &mut self.observers {
                observer.on_event(event);
            }
        }
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.lifecycle, Lifecycle::NotStarted)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Ended(_))
    }

    pub fn phase(&self) -> Phase {
        match &self.lifecycle {
            Lifecycle::NotStarted => Phase::Idle,
            Lifecycle::Running(run) => run.clock.phase(),
            Lifecycle::Ended(_) => Phase::Ended,
        }
    }

    /// How the running game treats input before the response window
    pub fn early_input(&self) -> EarlyInput {
        match &self.lifecycle {
            Lifecycle::Running(run) => run.config.game.rules().early_input(),
            Lifecycle::NotStarted | Lifecycle::Ended(_) => EarlyInput::Ignore,
        }
    }

    /// Trial currently being played, if any
    pub fn current_trial(&self) -> Option<&Trial> {
        match &self.lifecycle {
            Lifecycle::Running(run) => run.current.as_ref(),
            Lifecycle::NotStarted | Lifecycle::Ended(_) => None,
        }
    }

    /// When the current phase began
    pub fn phase_entered_at(&self) -> Option<Millis> {
        match &self.lifecycle {
            Lifecycle::Running(run) => Some(run.clock.entered_at()),
            Lifecycle::NotStarted | Lifecycle::Ended(_) => None,
        }
    }

    /// Most recently scored trial
    pub fn last_outcome(&self) -> Option<&TrialOutcome> {
        match &self.lifecycle {
            Lifecycle::Running(run) => run.metrics.outcomes().last(),
            Lifecycle::Ended(result) => result.outcomes.last(),
            Lifecycle::NotStarted => None,
        }
    }

    pub fn level(&self) -> Option<Level> {
        match &self.lifecycle {
            Lifecycle::Running(run) => Some(run.staircase.level),
            Lifecycle::Ended(result) => Some(result.final_level),
            Lifecycle::NotStarted => None,
        }
    }

    /// When the next timer is due; `None` once the session is over
    pub fn next_deadline(&self) -> Option<Millis> {
        match &self.lifecycle {
            Lifecycle::Running(run) => run.clock.next_due(),
            Lifecycle::NotStarted | Lifecycle::Ended(_) => None,
        }
    }

    pub fn snapshot(&self, now: Millis) -> Option<SessionSnapshot> {
        match &self.lifecycle {
            Lifecycle::Running(run) => Some(run.snapshot(now)),
            Lifecycle::NotStarted | Lifecycle::Ended(_) => None,
        }
    }

    pub fn result(&self) -> Option<&SessionResult> {
        match &self.lifecycle {
            Lifecycle::Ended(result) => Some(result),
            Lifecycle::NotStarted | Lifecycle::Running(_) => None,
        }
    }

    pub fn into_result(self) -> Option<SessionResult> {
        match self.lifecycle {
            Lifecycle::Ended(result) => Some(*result),
            Lifecycle::NotStarted | Lifecycle::Running(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhaseTimings;
    use crate::games::{GameSpec, NBackParams, StroopParams};
    use crate::staircase::StaircaseConfig;
    use crate::trial::{Detection, Stimulus, Verdict};
    use assert_matches::assert_matches;
    use std::cell::RefCell;
    use std::rc::Rc;

    const TIMINGS: PhaseTimings = PhaseTimings {
        countdown_ms: 1_000,
        present_ms: 500,
        response_window_ms: 2_000,
        feedback_ms: 300,
        inter_trial_ms: 200,
    };

    fn stroop(trials: u32) -> SessionConfig {
        SessionConfig {
            stop: StopCondition::Trials(trials),
            timings: TIMINGS,
            ..SessionConfig::preset(GameKind::Stroop)
        }
    }

    fn ink(trial: &Trial) -> String {
        match &trial.stimulus {
            Stimulus::ColorWord { ink, .. } => ink.clone(),
            _ => panic!("not a stroop trial"),
        }
    }

    #[test]
    fn test_lifecycle_misuse() {
        let mut controller = SessionController::seeded(1);
        assert_eq!(
            controller.respond(0, Response::Press),
            Err(SessionError::NotStarted)
        );
        assert_matches!(controller.abort(0), Err(SessionError::NotStarted));
        assert_eq!(controller.advance(0), Err(SessionError::NotStarted));

        controller.start(stroop(3), 0).unwrap();
        assert_eq!(
            controller.start(stroop(3), 10),
            Err(SessionError::AlreadyStarted)
        );
        let result = controller.abort(50).unwrap();
        assert!(result.partial);
        assert_eq!(result.completion, Completion::Aborted);
        assert_matches!(controller.abort(60), Err(SessionError::Ended));
        assert_eq!(
            controller.respond(70, Response::Press),
            Ok(Disposition::Ignored)
        );
        assert_eq!(
            controller.start(stroop(3), 80),
            Err(SessionError::AlreadyStarted)
        );
    }

    #[test]
    fn test_rejected_config_leaves_controller_unstarted() {
        let mut controller = SessionController::seeded(1);
        let mut bad = stroop(3);
        bad.staircase.ceiling = 0;
        assert_matches!(
            controller.start(bad, 0),
            Err(SessionError::Config(ConfigError::InvertedBounds { .. }))
        );
        assert!(!controller.is_started());
        assert_eq!(controller.start(stroop(3), 0), Ok(()));
    }

    #[test]
    fn test_correct_answer_scored_and_timed_from_window() {
        let mut controller = SessionController::seeded(8);
        controller.start(stroop(2), 0).unwrap();

        // countdown 1000 + present 500
        controller.advance(1_500).unwrap();
        assert_eq!(controller.phase(), Phase::AwaitingResponse);
        let trial = controller.current_trial().unwrap().clone();
        let answer = Response::Text(ink(&trial));

        let Disposition::Scored(outcome) = controller.respond(1_840, answer).unwrap() else {
            panic!("response not scored");
        };
        assert_eq!(outcome.verdict, Verdict::Correct);
        assert_eq!(outcome.latency_ms, Some(340));
        assert_eq!(outcome.points, 10);
        assert_eq!(outcome.decided_at_ms, 1_840);
        assert_eq!(controller.phase(), Phase::Feedback);

        // a second answer for the same trial is ignored
        assert_eq!(
            controller.respond(1_900, Response::Text("azul".into())),
            Ok(Disposition::Ignored)
        );
    }

    #[test]
    fn test_timeout_recorded_as_incorrect() {
        let mut controller = SessionController::seeded(3);
        controller.start(stroop(1), 0).unwrap();

        let timed_out = controller.advance(3_500).unwrap();
        assert_eq!(timed_out.len(), 1);
        assert_eq!(timed_out[0].verdict, Verdict::Timeout);
        assert_eq!(timed_out[0].latency_ms, None);
        assert_eq!(timed_out[0].points, 0);

        // feedback runs out and the single-trial session completes
        controller.advance(3_800).unwrap();
        let result = controller.result().unwrap();
        assert_eq!(result.completion, Completion::Completed);
        assert!(!result.partial);
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.metrics.timeouts, 1);
        assert_eq!(result.metrics.accuracy, 0.0);
    }

    #[test]
    fn test_late_response_loses_to_timeout() {
        let mut controller = SessionController::seeded(3);
        controller.start(stroop(2), 0).unwrap();
        // window closed at 3500; the answer arrives after it
        let disposition = controller.respond(3_600, Response::Text("rojo".into()));
        assert_eq!(disposition, Ok(Disposition::Ignored));
        let snap = controller.snapshot(3_600).unwrap();
        assert_eq!(snap.metrics.attempted, 1);
        assert_eq!(snap.metrics.correct, 0);
    }

    #[test]
    fn test_response_before_window_ignored() {
        let mut controller = SessionController::seeded(3);
        controller.start(stroop(1), 0).unwrap();
        assert_eq!(
            controller.respond(1_200, Response::Text("rojo".into())),
            Ok(Disposition::Ignored)
        );
        assert_eq!(controller.phase(), Phase::Presenting);
    }

    #[test]
    fn test_duration_session_stops_mid_trial() {
        let config = SessionConfig {
            stop: StopCondition::DurationMs(5_000),
            timings: TIMINGS,
            ..SessionConfig::preset(GameKind::Stroop)
        };
        let mut controller = SessionController::seeded(4);
        controller.start(config, 0).unwrap();

        // trial 0 times out at 3500 and its feedback ends at 3800; trial 1
        // opens its window at 4500 and is still undecided at the deadline
        controller.advance(10_000).unwrap();
        let result = controller.result().unwrap();
        assert_eq!(result.completion, Completion::DurationElapsed);
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.elapsed_ms, 5_000);
        assert!(!result.partial);
        assert_eq!(controller.next_deadline(), None);
    }

    #[test]
    fn test_inter_trial_gap_after_first_trial() {
        let mut controller = SessionController::seeded(5);
        controller.start(stroop(3), 0).unwrap();
        // first lead-in is the countdown
        assert_eq!(controller.next_deadline(), Some(1_000));
        controller.advance(3_800).unwrap();
        // second trial started at 3800 with the shorter gap
        assert_eq!(controller.phase(), Phase::Countdown);
        assert_eq!(controller.current_trial().map(|t| t.index), Some(1));
        assert_eq!(controller.next_deadline(), Some(4_000));
    }

    #[test]
    fn test_nback_correct_streak_raises_level_once() {
        let config = SessionConfig {
            game: GameSpec::NBack(NBackParams::default()),
            stop: StopCondition::Trials(5),
            timings: TIMINGS,
            staircase: StaircaseConfig {
                initial: 1,
                floor: 1,
                ceiling: 5,
                streak_to_level_up: 4,
                streak_to_level_down: 3,
            },
            ..SessionConfig::preset(GameKind::NBack)
        };
        let mut controller = SessionController::seeded(11);
        controller.start(config, 0).unwrap();

        let mut levels = Vec::new();
        while !controller.is_finished() {
            let now = controller.next_deadline().unwrap();
            controller.advance(now).unwrap();
            if controller.phase() == Phase::AwaitingResponse {
                let trial = controller.current_trial().unwrap().clone();
                let Response::Match(is_match) = trial.expected else {
                    panic!("n-back expects a match judgement");
                };
                let Disposition::Scored(outcome) = controller
                    .respond(now + 100, Response::Match(is_match))
                    .unwrap()
                else {
                    panic!("answer not scored");
                };
                assert_eq!(outcome.verdict, Verdict::Correct);
                assert!(matches!(
                    outcome.detection,
                    Some(Detection::Hit | Detection::CorrectRejection)
                ));
                levels.push(outcome.level_after);
            }
        }
        assert_eq!(levels, vec![1, 1, 1, 2, 2]);
        let result = controller.result().unwrap();
        assert_eq!(result.final_level, 2);
        assert_eq!(result.metrics.max_level, 2);
    }

    #[test]
    fn test_observer_sees_lifecycle() {
        let seen: Rc<RefCell<Vec<EngineEvent>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let mut controller = SessionController::seeded(2);
        controller.subscribe(move |e: &EngineEvent| sink.borrow_mut().push(e.clone()));
        controller.start(stroop(1), 0).unwrap();
        controller.advance(10_000).unwrap();

        let events = seen.borrow();
        assert_matches!(events.first(), Some(EngineEvent::SessionStarted { .. }));
        assert_matches!(
            events.last(),
            Some(EngineEvent::SessionEnded {
                completion: Completion::Completed,
                trials: 1,
                ..
            })
        );
        let scored = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::TrialScored { .. }))
            .count();
        assert_eq!(scored, 1);
    }

    #[test]
    fn test_abort_clears_timers() {
        let mut controller = SessionController::seeded(2);
        let config = SessionConfig {
            game: GameSpec::Stroop(StroopParams::default()),
            stop: StopCondition::DurationMs(60_000),
            ..stroop(1)
        };
        controller.start(config, 0).unwrap();
        assert!(controller.next_deadline().is_some());
        controller.abort(100).unwrap();
        assert_eq!(controller.next_deadline(), None);
        assert_eq!(controller.phase(), Phase::Ended);
        assert_eq!(controller.advance(100_000), Ok(Vec::new()));
    }

    #[test]
    fn test_oversized_timings_wait_for_the_deadline() {
        let mut config = SessionConfig {
            stop: StopCondition::DurationMs(60_000),
            ..stroop(1)
        };
        config.timings.countdown_ms = Millis::MAX;
        config.timings.feedback_ms = Millis::MAX;
        assert_eq!(config.validate(), Ok(()));

        let mut controller = SessionController::seeded(1);
        controller.start(config, 10).unwrap();
        assert_eq!(controller.advance(50_000), Ok(Vec::new()));
        assert_eq!(controller.phase(), Phase::Countdown);

        controller.advance(60_010).unwrap();
        let result = controller.result().unwrap();
        assert_eq!(result.completion, Completion::DurationElapsed);
        assert!(result.outcomes.is_empty());
    }
}
