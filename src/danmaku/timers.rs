//! Cooperative timer queue driven by the scheduler's clock.

use super::InstanceId;
use std::collections::VecDeque;
use std::time::Duration;

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// One entry of the start-up burst.
    Burst,
    /// Repeating stream, by index into the config's stream list.
    Stream(usize),
    /// Fallback retirement of one instance.
    Retire(InstanceId),
}

impl TimerKind {
    pub(crate) fn is_spawner(&self) -> bool {
        matches!(self, TimerKind::Burst | TimerKind::Stream(_))
    }
}

/// A pending timer.
#[derive(Debug, Clone)]
pub(crate) struct PendingTimer {
    pub id: u64,
    /// Scheduler time at which the timer fires.
    pub fire_at: Duration,
    pub kind: TimerKind,
    /// For fixed-cadence streams: gap between firings.
    pub interval: Option<Duration>,
}

#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    timers: VecDeque<PendingTimer>,
    next_id: u64,
}

impl TimerQueue {
    pub fn schedule(&mut self, fire_at: Duration, kind: TimerKind, interval: Option<Duration>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.timers.push_back(PendingTimer {
            id,
            fire_at,
            kind,
            interval,
        });
        id
    }

    /// Put a fired timer back with its new `fire_at`.
    pub fn reschedule(&mut self, timer: PendingTimer) {
        self.timers.push_back(timer);
    }

    /// Cancel every timer matching `pred`. Returns how many were cancelled.
    pub fn cancel_where(&mut self, pred: impl Fn(&TimerKind) -> bool) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| !pred(&t.kind));
        before - self.timers.len()
    }

    /// Remove and return the earliest timer due at or before `now`.
    /// Ties go to the timer scheduled first.
    pub fn pop_due(&mut self, now: Duration) -> Option<PendingTimer> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.fire_at <= now)
            .min_by_key(|(_, t)| (t.fire_at, t.id))
            .map(|(i, _)| i)?;
        self.timers.remove(index)
    }

    /// Time of the earliest pending timer.
    pub fn next_fire_at(&self) -> Option<Duration> {
        self.timers.iter().map(|t| t.fire_at).min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn count_where(&self, pred: impl Fn(&TimerKind) -> bool) -> usize {
        self.timers.iter().filter(|t| pred(&t.kind)).count()
    }
}
