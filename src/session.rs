//! Live session: a message source and a scheduler on one tokio task.
//!
//! The scheduler starts on fallback content right away. The first refresh
//! and the visit log run in the background and the refresh is repeated
//! every poll interval; the scheduler never waits for either. Everything runs on the calling task, so a
//! current-thread runtime is enough.

use crate::danmaku::{DanmakuConfig, DanmakuEvent, Scheduler, SchedulerStats};
use crate::pool::MessagePool;
use crate::source::{SourceManager, WishBackend};
use crate::wish::WishItem;
use crate::Result;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Timing for [`Session::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub frame_interval: Duration,
    pub poll_interval: Duration,
    /// Stop after this long; `None` runs until the future is dropped.
    pub run_for: Option<Duration>,
    /// Page to log a visit for once the display is running.
    pub visit: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(50),
            poll_interval: Duration::from_secs(30),
            run_for: None,
            visit: None,
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub scheduler: SchedulerStats,
    pub refreshes_ok: u32,
    pub refreshes_failed: u32,
    pub final_pool_len: usize,
}

type LocalFuture<T> = Pin<Box<dyn Future<Output = T>>>;

pub struct Session<B> {
    source: Rc<SourceManager<B>>,
    scheduler: Scheduler,
}

impl<B: WishBackend + 'static> Session<B> {
    pub fn new(backend: B, fallback: Vec<WishItem>, config: DanmakuConfig, seed: Option<u64>) -> Result<Self> {
        let source = Rc::new(SourceManager::initialize(backend, fallback)?);
        let scheduler = match seed {
            Some(seed) => Scheduler::with_seed(config, seed)?,
            None => Scheduler::new(config)?,
        };
        Ok(Self { source, scheduler })
    }

    pub fn source(&self) -> &Rc<SourceManager<B>> {
        &self.source
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Run until `options.run_for` elapses. `on_frame` sees the scheduler
    /// after every tick together with the events that tick produced.
    pub async fn run(
        &mut self,
        options: &RunOptions,
        mut on_frame: impl FnMut(&Scheduler, &[DanmakuEvent]),
    ) -> Result<SessionSummary> {
        let started = Instant::now();
        let epoch = self.scheduler.now();
        let deadline = options.run_for.map(|d| started + d);

        let source = Rc::clone(&self.source);
        self.scheduler.start(move || source.current_pool());

        let mut frames = tokio::time::interval(options.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut next_poll = started;
        let mut refresh: Option<LocalFuture<Result<Rc<MessagePool>>>> = None;
        let mut visit: Option<LocalFuture<()>> = options.visit.clone().map(|page| {
            let source = Rc::clone(&self.source);
            Box::pin(async move { source.backend().record_visit(&page).await }) as LocalFuture<()>
        });
        let mut summary = SessionSummary::default();

        loop {
            if refresh.is_none() && Instant::now() >= next_poll {
                let source = Rc::clone(&self.source);
                refresh = Some(Box::pin(async move { source.refresh().await }));
                next_poll = Instant::now() + options.poll_interval;
            }

            tokio::select! {
                _ = frames.tick() => {
                    let events = self.scheduler.tick(epoch + started.elapsed());
                    on_frame(&self.scheduler, &events);
                }
                result = in_flight(refresh.as_mut()) => {
                    refresh = None;
                    match result {
                        Ok(pool) => {
                            summary.refreshes_ok += 1;
                            tracing::debug!(pool = pool.len(), "background refresh done");
                        }
                        Err(_) => summary.refreshes_failed += 1,
                    }
                }
                () = in_flight(visit.as_mut()) => visit = None,
                _ = until(deadline) => break,
            }
        }

        self.scheduler.stop();
        summary.scheduler = self.scheduler.stats();
        summary.final_pool_len = self.source.current_pool().len();
        tracing::info!(
            spawned = summary.scheduler.spawned,
            refreshes_ok = summary.refreshes_ok,
            refreshes_failed = summary.refreshes_failed,
            "session finished"
        );
        Ok(summary)
    }
}

/// Await an in-flight background call, or never resolve if there is none.
async fn in_flight<T>(fut: Option<&mut LocalFuture<T>>) -> T {
    match fut {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
