//! Cancellable timer queue and the clocks that feed it.
//!
//! The engine never sleeps. Callers read the time from a [`Clock`] and hand
//! it to the engine, which pops whatever deadlines have passed. A
//! [`ManualClock`] drives tests and simulations; [`MonotonicClock`] drives
//! interactive play.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

/// Milliseconds since the clock's origin
pub type Millis = u64;

/// Handle returned by [`Scheduler::schedule`], used to cancel the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Ordered set of pending deadlines. Cancelling removes the entry outright,
/// so a cancelled timer can never fire.
#[derive(Debug)]
pub struct Scheduler<T> {
    pending: BTreeMap<(Millis, TimerId), T>,
    index: BTreeMap<TimerId, Millis>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            index: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn schedule(&mut self, due: Millis, token: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((due, id), token);
        self.index.insert(id, due);
        id
    }

    /// Returns the token if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let due = self.index.remove(&id)?;
        self.pending.remove(&(due, id))
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
        self.index.clear();
    }

    /// Earliest deadline at or before `now`. Timers sharing a deadline fire in
    /// scheduling order.
    pub fn pop_due(&mut self, now: Millis) -> Option<(Millis, TimerId, T)> {
        let (&(due, id), _) = self.pending.first_key_value()?;
        if due > now {
            return None;
        }
        let token = self.pending.remove(&(due, id))?;
        self.index.remove(&id);
        Some((due, id, token))
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.pending.keys().next().map(|&(due, _)| due)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Source of the current time in milliseconds
pub trait Clock {
    fn now(&self) -> Millis;
}

/// Wall clock measured from construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Virtual clock advanced by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, at: Millis) {
        self.now.set(at);
    }

    pub fn advance(&self, by: Millis) -> Millis {
        let at = self.now.get().saturating_add(by);
        self.now.set(at);
        at
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.get()
    }
}
