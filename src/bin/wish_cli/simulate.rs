//! Offline simulation on virtual time.

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use wish_danmaku::api::SubmitReceipt;
use wish_danmaku::danmaku::{DanmakuConfig, DanmakuEvent, PagePreset, Scheduler};
use wish_danmaku::dump::{list_active, render_screen};
use wish_danmaku::source::{SourceManager, WishBackend};
use wish_danmaku::wish::{self, NewMessage};
use wish_danmaku::{Error, Result};

pub struct SimulateOptions {
    pub page: PagePreset,
    pub seconds: f64,
    pub step_ms: u64,
    pub seed: Option<u64>,
    pub messages: Option<PathBuf>,
    pub refresh_at: f64,
    pub stop_at: Option<f64>,
    pub verbose: bool,
}

/// Serves a saved `GET /api/messages` body from disk.
struct FileBackend {
    path: Option<PathBuf>,
}

impl WishBackend for FileBackend {
    async fn fetch_messages(&self) -> Result<String> {
        match &self.path {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => Err(Error::Other("no messages file given".into())),
        }
    }

    async fn submit_message(&self, _message: &NewMessage) -> Result<SubmitReceipt> {
        Err(Error::Other("submissions are not available offline".into()))
    }
}

pub async fn run(options: SimulateOptions) -> Result<()> {
    let fallback = match options.page {
        PagePreset::Home => wish::home_fallback_wishes(),
        PagePreset::Birthday => wish::birthday_fallback_wishes(),
    };
    let has_file = options.messages.is_some();
    let source = Rc::new(SourceManager::initialize(
        FileBackend { path: options.messages },
        fallback,
    )?);

    let config = DanmakuConfig::for_page(options.page);
    let mut scheduler = match options.seed {
        Some(seed) => Scheduler::with_seed(config, seed)?,
        None => Scheduler::new(config)?,
    };

    let pool_source = Rc::clone(&source);
    scheduler.start(move || pool_source.current_pool());

    let step = Duration::from_millis(options.step_ms.max(1));
    let end = Duration::from_secs_f64(options.seconds.max(0.0));
    let refresh_at = Duration::from_secs_f64(options.refresh_at.max(0.0));
    let stop_at = options.stop_at.map(|s| Duration::from_secs_f64(s.max(0.0)));
    let mut refreshed = !has_file;
    let mut now = Duration::ZERO;
    let mut peak_active = 0;

    loop {
        if !refreshed && now >= refresh_at {
            refreshed = true;
            match source.refresh().await {
                Ok(pool) => println!("[{:>7.2}s] pool refreshed: {} wishes", now.as_secs_f64(), pool.len()),
                Err(e) => println!("[{:>7.2}s] refresh failed, keeping fallback: {}", now.as_secs_f64(), e),
            }
        }
        if stop_at.is_some_and(|at| now >= at) && scheduler.is_running() {
            scheduler.stop();
            println!("[{:>7.2}s] scheduler stopped", now.as_secs_f64());
        }

        let events = scheduler.tick(now);
        if options.verbose {
            print_events(&scheduler, &events, now);
        }
        peak_active = peak_active.max(scheduler.active_count());

        if now >= end {
            break;
        }
        now = (now + step).min(end);
    }

    println!("\n=== Screen at {:.2}s ===\n", now.as_secs_f64());
    print!("{}", render_screen(&scheduler, 100, 24));
    println!("\n=== Active ===\n");
    print!("{}", list_active(&scheduler));

    let stats = scheduler.stats();
    println!("\n=== Summary ===\n");
    println!("spawned:          {}", stats.spawned);
    println!("retired:          {} ({} animation end, {} fallback timer)",
        stats.retired(), stats.retired_by_animation, stats.retired_by_timer);
    println!("redundant:        {}", stats.redundant_retirements);
    println!("skipped (chance): {}", stats.skipped_by_chance);
    println!("active now/peak:  {}/{}", scheduler.active_count(), peak_active);
    println!("pool size:        {}", source.current_pool().len());
    Ok(())
}

fn print_events(scheduler: &Scheduler, events: &[DanmakuEvent], now: Duration) {
    for event in events {
        match event {
            DanmakuEvent::Spawned { id } => {
                if let Some(i) = scheduler.get(*id) {
                    println!(
                        "[{:>7.2}s] + {} lane {:.1}% {:.1}s  {} {}",
                        now.as_secs_f64(),
                        id,
                        i.lane,
                        i.duration.as_secs_f64(),
                        i.content.emoji,
                        i.content.display_text()
                    );
                }
            }
            DanmakuEvent::Retired { id, cause } => {
                println!("[{:>7.2}s] - {} ({:?})", now.as_secs_f64(), id, cause);
            }
        }
    }
}
