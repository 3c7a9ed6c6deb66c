//! The danmaku scheduler.
//!
//! Time is supplied by the host: every call to [`Scheduler::tick`] passes the
//! current scheduler time (a `Duration` since an arbitrary epoch). Firings are
//! processed in time order, one at a time, and each one runs
//! draw → instantiate → insert → schedule-retirement without interruption.

use super::tick::advance_instances;
use super::timers::{PendingTimer, TimerKind, TimerQueue};
use super::{Cadence, DanmakuConfig, DanmakuEvent, DanmakuInstance, InstanceId, RetireCause};
use crate::pool::MessagePool;
use crate::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

type PoolFn = Box<dyn Fn() -> Rc<MessagePool>>;

/// Counters for what the scheduler has done since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub spawned: u64,
    pub retired_by_animation: u64,
    pub retired_by_timer: u64,
    pub cleared: u64,
    /// Retirement triggers that found the instance already gone.
    pub redundant_retirements: u64,
    pub skipped_hidden: u64,
    pub skipped_empty_pool: u64,
    pub skipped_by_chance: u64,
}

impl SchedulerStats {
    pub fn retired(&self) -> u64 {
        self.retired_by_animation + self.retired_by_timer + self.cleared
    }
}

pub struct Scheduler {
    config: DanmakuConfig,
    rng: StdRng,
    timers: TimerQueue,
    active: BTreeMap<InstanceId, DanmakuInstance>,
    next_instance_id: u64,
    pool: Option<PoolFn>,
    visible: bool,
    now: Duration,
    events: Vec<DanmakuEvent>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Scheduler with an OS-seeded RNG.
    pub fn new(config: DanmakuConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Scheduler with a reproducible RNG.
    pub fn with_seed(config: DanmakuConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: DanmakuConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            timers: TimerQueue::default(),
            active: BTreeMap::new(),
            next_instance_id: 0,
            pool: None,
            visible: true,
            now: Duration::ZERO,
            events: Vec::new(),
            stats: SchedulerStats::default(),
        })
    }

    pub fn config(&self) -> &DanmakuConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    /// Scheduler time of the latest tick.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Begin spawning. `pool` is consulted at every firing, so a pool that
    /// grows later is picked up without a restart.
    ///
    /// Returns `false` (and changes nothing) if already running.
    pub fn start(&mut self, pool: impl Fn() -> Rc<MessagePool> + 'static) -> bool {
        if self.is_running() {
            tracing::debug!("danmaku scheduler already running, start ignored");
            return false;
        }
        self.pool = Some(Box::new(pool));

        let now = self.now;
        let spacing = Duration::from_secs_f64(self.config.burst.spacing);
        for i in 0..self.config.burst.count {
            self.timers.schedule(now + spacing * i, TimerKind::Burst, None);
        }

        for index in 0..self.config.streams.len() {
            let stream = &self.config.streams[index];
            let delay = Duration::from_secs_f64(stream.start_delay);
            let cadence = stream.cadence;
            let gap = Duration::from_secs_f64(cadence.span().sample(&mut self.rng));
            let interval = match cadence {
                Cadence::Fixed(_) => Some(gap),
                Cadence::Jittered(_) => None,
            };
            self.timers.schedule(now + delay + gap, TimerKind::Stream(index), interval);
        }

        tracing::info!(
            burst = self.config.burst.count,
            streams = self.config.streams.len(),
            "danmaku scheduler started"
        );
        true
    }

    /// Stop spawning and cancel every pending timer, fallback retirements
    /// included. Active instances stay and finish their traversal.
    pub fn stop(&mut self) {
        if self.pool.take().is_none() {
            return;
        }
        let cancelled = self.timers.cancel_where(|_| true);
        tracing::info!(cancelled, active = self.active.len(), "danmaku scheduler stopped");
    }

    /// Retire every active instance at once.
    pub fn clear_all(&mut self) -> usize {
        let ids: Vec<InstanceId> = self.active.keys().copied().collect();
        for id in &ids {
            self.retire(*id, RetireCause::Cleared);
        }
        ids.len()
    }

    /// While hidden, firings spawn nothing and traversals are frozen.
    /// Fallback timers keep running. Once stopped there are no fallback
    /// timers left, so traversals advance whether hidden or not.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            tracing::debug!(visible, "danmaku visibility changed");
        }
        self.visible = visible;
    }

    /// Advance to `now`, processing traversal ends and due timers in time
    /// order. Returns the events produced since the previous tick.
    pub fn tick(&mut self, now: Duration) -> Vec<DanmakuEvent> {
        let now = now.max(self.now);

        while let Some(timer) = self.timers.pop_due(now) {
            // Traversals that ended before this timer retire first.
            self.finish_traversals(timer.fire_at);
            self.fire(timer, now);
        }

        self.finish_traversals(now);
        self.now = now;
        std::mem::take(&mut self.events)
    }

    /// Animation-end signal from a host renderer. Returns whether the
    /// instance was still active. The `Retired` event is delivered by the
    /// next [`tick`](Self::tick).
    pub fn on_animation_end(&mut self, id: InstanceId) -> bool {
        self.retire(id, RetireCause::AnimationEnd)
    }

    pub fn active(&self) -> impl Iterator<Item = &DanmakuInstance> {
        self.active.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn get(&self, id: InstanceId) -> Option<&DanmakuInstance> {
        self.active.get(&id)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Live timers that can still spawn something.
    pub fn pending_spawners(&self) -> usize {
        self.timers.count_where(TimerKind::is_spawner)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn finish_traversals(&mut self, now: Duration) {
        let advancing = self.visible || !self.is_running();
        for id in advance_instances(&mut self.active, now, advancing) {
            self.retire(id, RetireCause::AnimationEnd);
        }
    }

    fn fire(&mut self, mut timer: PendingTimer, now: Duration) {
        let at = timer.fire_at;
        match timer.kind {
            TimerKind::Retire(id) => {
                self.retire(id, RetireCause::FallbackTimer);
            }
            TimerKind::Burst => self.spawn(at),
            TimerKind::Stream(index) => {
                let probability = self.config.streams[index].fire_probability;
                if probability >= 1.0 || self.rng.random_bool(probability) {
                    self.spawn(at);
                } else {
                    self.stats.skipped_by_chance += 1;
                }

                let gap = match timer.interval {
                    Some(interval) => interval,
                    None => {
                        let span = self.config.streams[index].cadence.span();
                        Duration::from_secs_f64(span.sample(&mut self.rng))
                    }
                };
                // A stalled host gets one catch-up firing, not a flood.
                timer.fire_at = (at + gap).max(now);
                self.timers.reschedule(timer);
            }
        }
    }

    fn spawn(&mut self, at: Duration) {
        if !self.visible {
            self.stats.skipped_hidden += 1;
            return;
        }
        let Some(pool_fn) = &self.pool else {
            return;
        };
        let pool = pool_fn();
        let Some(content) = pool.choose(&mut self.rng).cloned() else {
            self.stats.skipped_empty_pool += 1;
            tracing::trace!("wish pool empty, firing skipped");
            return;
        };

        let lane = self.config.lane_band.sample(&mut self.rng);
        let duration = Duration::from_secs_f64(self.config.duration.sample(&mut self.rng));
        self.next_instance_id += 1;
        let id = InstanceId(self.next_instance_id);

        tracing::debug!(%id, lane, duration = duration.as_secs_f64(), text = %content.text, "danmaku spawned");
        self.active.insert(
            id,
            DanmakuInstance {
                id,
                content,
                lane,
                duration,
                spawned_at: at,
                elapsed: Duration::ZERO,
                last_seen: at,
            },
        );
        self.timers
            .schedule(at + duration + self.config.retire_grace(), TimerKind::Retire(id), None);
        self.events.push(DanmakuEvent::Spawned { id });
        self.stats.spawned += 1;
    }

    /// Remove `id` if still active. Only the first trigger does anything.
    fn retire(&mut self, id: InstanceId, cause: RetireCause) -> bool {
        if self.active.remove(&id).is_none() {
            self.stats.redundant_retirements += 1;
            return false;
        }
        match cause {
            RetireCause::AnimationEnd => self.stats.retired_by_animation += 1,
            RetireCause::FallbackTimer => self.stats.retired_by_timer += 1,
            RetireCause::Cleared => self.stats.cleared += 1,
        }
        tracing::trace!(%id, ?cause, "danmaku retired");
        self.events.push(DanmakuEvent::Retired { id, cause });
        true
    }
}
