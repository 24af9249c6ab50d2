//! Input plumbing for the `play` host.
//!
//! The session engine never reads the terminal itself. The host pulls one
//! [`InputEvent`] per [`Runner::step`]: a key for the key map, a resize that
//! forces a redraw, or a tick when the interval passes quietly. Every step is
//! followed by `SessionController::advance`, so phase timers fire at tick
//! granularity even when the player is idle.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Terminal event to host input. Releases are dropped so a single press
/// cannot answer a trial and then leak into the next one.
pub fn translate(event: CtEvent) -> Option<InputEvent> {
    match event {
        CtEvent::Key(key) if key.kind != KeyEventKind::Release => Some(InputEvent::Key(key)),
        CtEvent::Resize(_, _) => Some(InputEvent::Resize),
        _ => None,
    }
}

pub trait EngineEventSource: Send + 'static {
    /// Next input, or `Err(Timeout)` when nothing arrived within `timeout`
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError>;
}

/// Reads the terminal on a background thread. The thread exits once the
/// receiving side is gone or crossterm reports an error.
pub struct CrosstermEventSource {
    rx: Receiver<InputEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            while let Ok(event) = event::read() {
                if let Some(input) = translate(event) {
                    if tx.send(input).is_err() {
                        break;
                    }
                }
            }
        });
        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Scripted input, used by the headless session tests
pub struct ChannelEventSource {
    rx: Receiver<InputEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<InputEvent>) -> Self {
        Self { rx }
    }
}

impl EngineEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// How long a step waits before reporting a tick
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

pub struct Runner<E: EngineEventSource> {
    source: E,
    ticker: FixedTicker,
}

impl<E: EngineEventSource> Runner<E> {
    pub fn new(source: E, ticker: FixedTicker) -> Self {
        Self { source, ticker }
    }

    /// Wait at most one tick for input. A closed source degrades to ticks, so
    /// timers keep the session moving until it ends on its own.
    pub fn step(&self) -> InputEvent {
        self.source
            .recv_timeout(self.ticker.interval())
            .unwrap_or(InputEvent::Tick)
    }
}
