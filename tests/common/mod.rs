//! Shared test helpers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;
use wish_danmaku::api::SubmitReceipt;
use wish_danmaku::danmaku::{BurstConfig, Cadence, DanmakuConfig, DanmakuEvent, Scheduler, Span, StreamConfig};
use wish_danmaku::pool::MessagePool;
use wish_danmaku::source::WishBackend;
use wish_danmaku::wish::{NewMessage, WishItem};
use wish_danmaku::{Error, Result};

/// Tick granularity used when sweeping virtual time.
pub const STEP: Duration = Duration::from_millis(20);

pub fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

/// A pool holding only the given fallback wishes.
#[allow(dead_code)]
pub fn pool_of(items: &[(&str, &str)]) -> Rc<MessagePool> {
    Rc::new(MessagePool::new(
        items.iter().map(|(text, emoji)| WishItem::fallback(text, emoji)).collect(),
    ))
}

/// Small, fully predictable config: a single burst spawn plus one fixed stream.
#[allow(dead_code)]
pub fn simple_config(interval: f64) -> DanmakuConfig {
    DanmakuConfig {
        lane_band: Span::new(10.0, 85.0),
        duration: Span::new(15.0, 30.0),
        retire_grace: 1.0,
        burst: BurstConfig { count: 1, spacing: 0.0 },
        streams: vec![StreamConfig::new("steady", Cadence::Fixed(Span::fixed(interval)))],
    }
}

/// Seeded scheduler, started on a fixed pool.
#[allow(dead_code)]
pub fn started(config: DanmakuConfig, seed: u64, pool: Rc<MessagePool>) -> Scheduler {
    let mut scheduler = Scheduler::with_seed(config, seed).expect("valid config");
    scheduler.start(move || Rc::clone(&pool));
    scheduler
}

/// Tick from the scheduler's current time to `until` in [`STEP`]s,
/// collecting every event.
#[allow(dead_code)]
pub fn run_until(scheduler: &mut Scheduler, until: Duration) -> Vec<(Duration, DanmakuEvent)> {
    let mut events = Vec::new();
    let mut now = scheduler.now();
    loop {
        for event in scheduler.tick(now) {
            events.push((now, event));
        }
        if now >= until {
            break;
        }
        now = (now + STEP).min(until);
    }
    events
}

#[allow(dead_code)]
pub fn spawn_count(events: &[(Duration, DanmakuEvent)]) -> usize {
    events
        .iter()
        .filter(|(_, e)| matches!(e, DanmakuEvent::Spawned { .. }))
        .count()
}

/// In-memory backend. Accepted wishes are listed newest first, wrapped in
/// `{"messages": [...]}` like the Express server does.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeBackend {
    pub stored: RefCell<Vec<NewMessage>>,
    /// Serve this body instead of the stored wishes.
    pub body_override: RefCell<Option<String>>,
    pub fail_fetch: Cell<bool>,
    pub reject_submit: Cell<bool>,
    pub fetch_calls: Cell<u32>,
    pub submit_calls: Cell<u32>,
    /// When set, submissions wait for this before answering.
    pub submit_gate: Option<Rc<Notify>>,
    pub visits: RefCell<Vec<String>>,
    /// Visit logs never get an answer.
    pub hang_visits: Cell<bool>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn with_stored(messages: &[(&str, &str, &str)]) -> Self {
        let backend = Self::default();
        for (name, message, emoji) in messages {
            backend.stored.borrow_mut().push(NewMessage::new(name, message, Some(emoji)));
        }
        backend
    }

    pub fn serving(body: &str) -> Self {
        let backend = Self::default();
        *backend.body_override.borrow_mut() = Some(body.to_string());
        backend
    }

    fn listing(&self) -> String {
        let rows: Vec<serde_json::Value> = self
            .stored
            .borrow()
            .iter()
            .enumerate()
            .rev()
            .map(|(i, m)| {
                serde_json::json!({
                    "name": m.name,
                    "message": m.message,
                    "emoji": m.emoji,
                    "timestamp": format!("2025-03-01 10:00:{:02}", i),
                })
            })
            .collect();
        serde_json::json!({ "messages": rows }).to_string()
    }
}

impl WishBackend for FakeBackend {
    async fn fetch_messages(&self) -> Result<String> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        tokio::task::yield_now().await;
        if self.fail_fetch.get() {
            return Err(Error::Status { status: 503, body: "unavailable".into() });
        }
        match self.body_override.borrow().clone() {
            Some(body) => Ok(body),
            None => Ok(self.listing()),
        }
    }

    async fn submit_message(&self, message: &NewMessage) -> Result<SubmitReceipt> {
        self.submit_calls.set(self.submit_calls.get() + 1);
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        if self.reject_submit.get() {
            return Err(Error::Rejected("Failed to save message".into()));
        }
        self.stored.borrow_mut().push(message.clone());
        Ok(SubmitReceipt {
            success: true,
            id: Some(self.stored.borrow().len() as i64),
            red_packet_code: Some("HB-2024".into()),
        })
    }

    async fn record_visit(&self, page: &str) {
        self.visits.borrow_mut().push(page.to_string());
        if self.hang_visits.get() {
            std::future::pending::<()>().await;
        }
    }
}
