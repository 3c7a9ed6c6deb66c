//! Tests for the message source: fallback start, refresh merging, and
//! optimistic submission.

mod common;

use common::FakeBackend;
use std::rc::Rc;
use tokio::sync::Notify;
use wish_danmaku::source::SourceManager;
use wish_danmaku::wish::{self, NewMessage, WishItem, WishOrigin, DEFAULT_EMOJI};
use wish_danmaku::Error;

fn fallback() -> Vec<WishItem> {
    vec![WishItem::fallback("Happy 24th!", "🎂")]
}

fn count_text(source: &SourceManager<FakeBackend>, text: &str) -> usize {
    source.current_pool().iter().filter(|w| w.text == text).count()
}

async fn wait_for_text(source: &SourceManager<FakeBackend>, text: &str) {
    while count_text(source, text) == 0 {
        tokio::task::yield_now().await;
    }
}

#[test]
fn initialize_serves_fallback_without_network() {
    let source = SourceManager::initialize(FakeBackend::default(), wish::home_fallback_wishes()).unwrap();
    let pool = source.current_pool();
    assert_eq!(pool.len(), wish::home_fallback_wishes().len());
    assert!(pool.iter().all(|w| w.origin == WishOrigin::Static));
    assert_eq!(source.backend().fetch_calls.get(), 0);
}

#[test]
fn initialize_rejects_empty_fallback() {
    let result = SourceManager::initialize(FakeBackend::default(), Vec::new());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn refresh_appends_wrapped_listing_after_statics() {
    let backend = FakeBackend::serving(r#"{"messages":[{"message":"hi","emoji":"🎉"}]}"#);
    let source = SourceManager::initialize(backend, fallback()).unwrap();

    let pool = source.refresh().await.unwrap();
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.get(0).unwrap().text, "Happy 24th!");
    let remote = pool.get(1).unwrap();
    assert_eq!(remote.text, "hi");
    assert_eq!(remote.emoji, "🎉");
    assert_eq!(remote.author, None);
    assert_eq!(remote.origin, WishOrigin::Submitted);
    assert!(Rc::ptr_eq(&pool, &source.current_pool()));
}

#[tokio::test]
async fn refresh_accepts_bare_list() {
    let backend = FakeBackend::serving(r#"[{"name":"Ann","message":"hello"},{"name":"Bo","text":"hey"}]"#);
    let source = SourceManager::initialize(backend, fallback()).unwrap();

    let pool = source.refresh().await.unwrap();
    let texts: Vec<_> = pool.iter().map(|w| w.display_text()).collect();
    assert_eq!(texts, ["Happy 24th!", "hello — Ann", "hey — Bo"]);
    assert_eq!(pool.get(1).unwrap().emoji, DEFAULT_EMOJI);
}

#[tokio::test]
async fn refresh_without_messages_key_keeps_statics() {
    let backend = FakeBackend::serving(r#"{"stats":{"totalMessages":0}}"#);
    let source = SourceManager::initialize(backend, fallback()).unwrap();

    let pool = source.refresh().await.unwrap();
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn malformed_body_leaves_pool_untouched() {
    let backend = FakeBackend::serving("<html>502 Bad Gateway</html>");
    let source = SourceManager::initialize(backend, fallback()).unwrap();
    let before = source.current_pool();

    let result = source.refresh().await;
    assert!(matches!(result, Err(Error::Json(_))));
    assert!(Rc::ptr_eq(&before, &source.current_pool()));
}

#[tokio::test]
async fn failed_fetch_leaves_pool_untouched() {
    let backend = FakeBackend::with_stored(&[("Ann", "hello", "🎉")]);
    let source = SourceManager::initialize(backend, fallback()).unwrap();
    source.refresh().await.unwrap();
    let before = source.current_pool();

    source.backend().fail_fetch.set(true);
    let result = source.refresh().await;
    assert!(matches!(result, Err(Error::Status { status: 503, .. })));
    assert!(Rc::ptr_eq(&before, &source.current_pool()));
    assert_eq!(before.len(), 2);
}

#[tokio::test]
async fn refresh_never_drops_held_wishes() {
    let backend = FakeBackend::with_stored(&[("Ann", "hello", "🎉"), ("Bo", "hey", "🎈")]);
    let source = SourceManager::initialize(backend, fallback()).unwrap();
    let first = source.refresh().await.unwrap();
    assert_eq!(first.len(), 3);

    // The backend loses a row; the held copy stays.
    source.backend().stored.borrow_mut().remove(0);
    let second = source.refresh().await.unwrap();
    assert!(second.covers(&first));
    assert_eq!(second.len(), 3);

    // New rows are added without duplicating the ones already held.
    source
        .backend()
        .stored
        .borrow_mut()
        .push(NewMessage::new("Cy", "yo", Some("🎁")));
    let third = source.refresh().await.unwrap();
    assert!(third.covers(&second));
    assert_eq!(third.len(), 4);
    assert_eq!(count_text(&source, "hey"), 1);
}

#[tokio::test]
async fn accepted_submission_is_listed_once() {
    let source = SourceManager::initialize(FakeBackend::default(), fallback()).unwrap();

    let receipt = source
        .submit(NewMessage::new("Ann", "生日快乐", Some("🎉")))
        .await
        .unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.red_packet_code.as_deref(), Some("HB-2024"));

    let backend = source.backend();
    assert_eq!(backend.submit_calls.get(), 1);
    assert_eq!(backend.fetch_calls.get(), 1);
    assert_eq!(count_text(&source, "生日快乐"), 1);

    let pool = source.current_pool();
    let wish = pool.iter().find(|w| w.text == "生日快乐").unwrap();
    assert_eq!(wish.author.as_deref(), Some("Ann"));
    assert_eq!(wish.origin, WishOrigin::Submitted);
    assert!(wish.timestamp.is_some(), "listing copy replaces the local one");
}

#[tokio::test]
async fn accepted_submission_survives_failed_refresh() {
    let source = SourceManager::initialize(FakeBackend::default(), fallback()).unwrap();
    source.backend().fail_fetch.set(true);

    source.submit(NewMessage::anonymous("生日快乐", None)).await.unwrap();

    let pool = source.current_pool();
    assert_eq!(pool.len(), 2);
    let wish = pool.get(1).unwrap();
    assert_eq!(wish.origin, WishOrigin::Submitted);
    assert_eq!(wish.author.as_deref(), Some(wish::ANONYMOUS_NAME));
    assert_eq!(wish.emoji, DEFAULT_EMOJI);
}

#[tokio::test]
async fn rejected_submission_restores_exact_snapshot() {
    let source = SourceManager::initialize(FakeBackend::default(), fallback()).unwrap();
    source.backend().reject_submit.set(true);
    let before = source.current_pool();

    let result = source.submit(NewMessage::new("Ann", "hello", None)).await;
    assert!(matches!(result, Err(Error::Rejected(_))));
    assert!(Rc::ptr_eq(&before, &source.current_pool()));
    assert_eq!(source.backend().fetch_calls.get(), 0);
}

#[tokio::test]
async fn pending_wish_is_drawable_while_post_is_in_flight() {
    let gate = Rc::new(Notify::new());
    let backend = FakeBackend {
        submit_gate: Some(Rc::clone(&gate)),
        ..FakeBackend::default()
    };
    let source = SourceManager::initialize(backend, fallback()).unwrap();

    let (result, ()) = tokio::join!(source.submit(NewMessage::new("Ann", "hello", None)), async {
        wait_for_text(&source, "hello").await;
        let pool = source.current_pool();
        let pending = pool.iter().find(|w| w.text == "hello").expect("optimistic item");
        assert_eq!(pending.origin, WishOrigin::Pending);
        assert_eq!(pool.len(), 2);
        gate.notify_one();
    });

    result.unwrap();
    assert_eq!(count_text(&source, "hello"), 1);
}

#[tokio::test]
async fn rollback_after_concurrent_refresh_removes_only_the_pending_item() {
    let gate = Rc::new(Notify::new());
    let backend = FakeBackend {
        submit_gate: Some(Rc::clone(&gate)),
        ..FakeBackend::with_stored(&[("Bo", "hey", "🎈")])
    };
    let source = SourceManager::initialize(backend, fallback()).unwrap();

    let (result, ()) = tokio::join!(source.submit(NewMessage::new("Ann", "hello", None)), async {
        wait_for_text(&source, "hello").await;
        // A background refresh lands while the POST is still out.
        let pool = source.refresh().await.unwrap();
        assert_eq!(count_text(&source, "hello"), 1, "pending item kept across refresh");
        assert!(pool.iter().any(|w| w.text == "hey"));
        source.backend().reject_submit.set(true);
        gate.notify_one();
    });

    assert!(result.is_err());
    assert_eq!(count_text(&source, "hello"), 0);
    assert_eq!(count_text(&source, "hey"), 1);
    assert_eq!(source.current_pool().len(), 2);
}

#[tokio::test]
async fn invalid_submission_never_reaches_backend() {
    let source = SourceManager::initialize(FakeBackend::default(), fallback()).unwrap();
    let before = source.current_pool();

    let too_long = "生".repeat(wish::MAX_MESSAGE_CHARS + 1);
    for message in [NewMessage::new("Ann", "   ", None), NewMessage::new("Ann", &too_long, None)] {
        let result = source.submit(message).await;
        assert!(matches!(result, Err(Error::Rejected(_))));
    }
    assert_eq!(source.backend().submit_calls.get(), 0);
    assert!(Rc::ptr_eq(&before, &source.current_pool()));
}
