//! Danmaku scheduling: spawn floating wish banners on layered randomized
//! timers and retire each one exactly once.
//!
//! Every instance has two retirement paths: the end of its traversal
//! animation and a fallback timer at `duration + retire_grace`. Whichever
//! runs first removes it; the other finds nothing to remove.

mod config;
mod scheduler;
mod tick;
mod timers;

use crate::wish::WishItem;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

pub use config::{BurstConfig, Cadence, DanmakuConfig, PagePreset, Span, StreamConfig, FIRST_SPAWN_DEADLINE_SECS};
pub use scheduler::{Scheduler, SchedulerStats};

/// Horizontal start of a traversal, in percent of viewport width.
pub const ENTRY_X: f64 = 100.0;
/// Horizontal end of a traversal; far enough left that a long banner has cleared the screen.
pub const EXIT_X: f64 = -100.0;

/// Identifier of one spawned instance, unique per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A wish currently travelling across the screen.
#[derive(Debug, Clone)]
pub struct DanmakuInstance {
    pub id: InstanceId,
    pub content: Rc<WishItem>,
    /// Vertical position, percent of viewport height.
    pub lane: f64,
    /// Traversal time.
    pub duration: Duration,
    /// Scheduler time of the spawn.
    pub spawned_at: Duration,
    /// Traversal time already played (does not advance while hidden).
    pub elapsed: Duration,
    /// Scheduler time up to which `elapsed` has been accounted.
    pub(crate) last_seen: Duration,
}

impl DanmakuInstance {
    /// Traversal progress, 0.0 to 1.0.
    pub fn progress(&self) -> f64 {
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Horizontal position, percent of viewport width.
    pub fn x(&self) -> f64 {
        ENTRY_X + (EXIT_X - ENTRY_X) * self.progress()
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Why an instance left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetireCause {
    AnimationEnd,
    FallbackTimer,
    Cleared,
}

/// Something hosts render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanmakuEvent {
    Spawned { id: InstanceId },
    Retired { id: InstanceId, cause: RetireCause },
}
