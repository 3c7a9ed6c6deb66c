//! Wish Danmaku live viewer.
//!
//! Connects to a running birthday backend, starts the danmaku scheduler on
//! built-in wishes straight away and folds in submitted wishes as the
//! background refresh brings them in.
//!
//! Usage:
//!   wish-danmaku                                 # settings from config.json
//!   wish-danmaku --server http://host:3000 --seconds 60
//!   wish-danmaku --page birthday --render        # draw the screen each second

use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wish_danmaku::api::ApiClient;
use wish_danmaku::config::AppConfig;
use wish_danmaku::danmaku::{DanmakuConfig, DanmakuEvent, PagePreset, Scheduler};
use wish_danmaku::dump::render_screen;
use wish_danmaku::session::{RunOptions, Session};
use wish_danmaku::wish;

#[derive(Parser)]
#[command(name = "wish-danmaku")]
#[command(about = "Birthday wish danmaku viewer")]
struct Args {
    /// Backend base URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    /// Page preset: home or birthday (overrides config)
    #[arg(long)]
    page: Option<PagePreset>,

    /// Stop after this many seconds (runs until interrupted if omitted)
    #[arg(long)]
    seconds: Option<f64>,

    /// RNG seed for a reproducible run (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Draw the screen as text once per second
    #[arg(long)]
    render: bool,

    /// Screen width in characters for --render
    #[arg(long, default_value_t = 100)]
    width: usize,

    /// Screen height in characters for --render
    #[arg(long, default_value_t = 24)]
    height: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = AppConfig::load();
    let server = args.server.unwrap_or_else(|| config.server_url.clone());
    let page = args.page.unwrap_or(config.page);
    let seed = args.seed.or(config.seed);

    let api = ApiClient::new(&server)?;

    let fallback = match page {
        PagePreset::Home => wish::home_fallback_wishes(),
        PagePreset::Birthday => wish::birthday_fallback_wishes(),
    };
    let mut session = Session::new(api, fallback, DanmakuConfig::for_page(page), seed)?;

    let options = RunOptions {
        frame_interval: config.frame_interval(),
        poll_interval: config.poll_interval(),
        run_for: args.seconds.map(Duration::from_secs_f64),
        visit: Some(page.as_str().to_string()),
    };

    eprintln!("[wish-danmaku] {} page, backend {}", page, server);
    let mut last_render = Duration::ZERO;
    let summary = session
        .run(&options, |scheduler: &Scheduler, events: &[DanmakuEvent]| {
            print_events(scheduler, events);
            if args.render && scheduler.now() >= last_render + Duration::from_secs(1) {
                last_render = scheduler.now();
                print!("\x1b[2J\x1b[H{}", render_screen(scheduler, args.width, args.height));
            }
        })
        .await?;

    eprintln!(
        "[wish-danmaku] spawned {}, retired {} ({} by animation, {} by fallback timer), {} refreshes ok, {} failed, pool {}",
        summary.scheduler.spawned,
        summary.scheduler.retired(),
        summary.scheduler.retired_by_animation,
        summary.scheduler.retired_by_timer,
        summary.refreshes_ok,
        summary.refreshes_failed,
        summary.final_pool_len,
    );
    Ok(())
}

fn print_events(scheduler: &Scheduler, events: &[DanmakuEvent]) {
    for event in events {
        if let DanmakuEvent::Spawned { id } = event {
            if let Some(instance) = scheduler.get(*id) {
                println!(
                    "[{:>7.2}s] {} {} {} (lane {:.0}%, {:.1}s)",
                    scheduler.now().as_secs_f64(),
                    id,
                    instance.content.emoji,
                    instance.content.display_text(),
                    instance.lane,
                    instance.duration.as_secs_f64(),
                );
            }
        }
    }
}
