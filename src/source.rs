//! Message source: owns the wish pool the scheduler draws from.
//!
//! The pool starts as the built-in fallback set and is widened by
//! [`SourceManager::refresh`] once the backend answers. Every replacement is
//! a single `Rc` swap, so readers never observe a half-built pool.

use crate::api::SubmitReceipt;
use crate::pool::MessagePool;
use crate::wish::{parse_message_list, NewMessage, WishItem};
use crate::{Error, Result};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// The two backend calls the message source needs.
pub trait WishBackend {
    /// Body of the message listing, on a success status only.
    fn fetch_messages(&self) -> impl Future<Output = Result<String>>;

    fn submit_message(&self, message: &NewMessage) -> impl Future<Output = Result<SubmitReceipt>>;

    /// Log a page visit. Fire-and-forget: failures are the backend's to trace.
    fn record_visit(&self, _page: &str) -> impl Future<Output = ()> {
        async {}
    }
}

/// Holds the current pool and the backend it is refreshed from.
pub struct SourceManager<B> {
    backend: B,
    statics: Vec<Rc<WishItem>>,
    current: RefCell<Rc<MessagePool>>,
}

impl<B: WishBackend> SourceManager<B> {
    /// Create the manager with `fallback` as the initial pool. No I/O happens here.
    pub fn initialize(backend: B, fallback: Vec<WishItem>) -> Result<Self> {
        if fallback.is_empty() {
            return Err(Error::InvalidConfig("fallback wish set is empty".into()));
        }
        let pool = MessagePool::new(fallback);
        let statics = pool.iter().cloned().collect();
        tracing::debug!(count = pool.len(), "wish pool initialized from fallback");
        Ok(Self {
            backend,
            statics,
            current: RefCell::new(Rc::new(pool)),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The latest assembled pool.
    pub fn current_pool(&self) -> Rc<MessagePool> {
        Rc::clone(&self.current.borrow())
    }

    /// Fetch submitted wishes and replace the pool with `static ++ remote`.
    ///
    /// On any failure the held pool is left untouched and the error returned.
    pub async fn refresh(&self) -> Result<Rc<MessagePool>> {
        let remote = match self.fetch_remote().await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(error = %e, "wish refresh failed, keeping current pool");
                return Err(e);
            }
        };

        let previous = self.current_pool();
        let pool = Rc::new(MessagePool::assemble(&self.statics, remote, &previous));
        tracing::info!(
            total = pool.len(),
            submitted = pool.submitted().count(),
            "wish pool refreshed"
        );
        self.replace(Rc::clone(&pool));
        Ok(pool)
    }

    async fn fetch_remote(&self) -> Result<Vec<WishItem>> {
        let body = self.backend.fetch_messages().await?;
        parse_message_list(&body)
    }

    /// Submit a wish, showing it optimistically until the backend answers.
    ///
    /// A rejected or failed POST removes the optimistic item again. After an
    /// accepted POST the pool is refreshed; if that refresh fails the item
    /// stays, now tagged as submitted.
    pub async fn submit(&self, message: NewMessage) -> Result<SubmitReceipt> {
        message.validate().map_err(Error::Rejected)?;

        let pending = message.to_pending_wish();
        let confirmed = self.current_pool();
        let optimistic = Rc::new(confirmed.with_appended(pending.clone()));
        self.replace(Rc::clone(&optimistic));

        let receipt = match self.backend.submit_message(&message).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.roll_back(&optimistic, confirmed, &pending);
                tracing::warn!(error = %e, "wish submission failed, rolled back");
                return Err(e);
            }
        };

        tracing::info!(id = ?receipt.id, reward = receipt.red_packet_code.is_some(), "wish accepted");
        let accepted = Rc::new(self.current_pool().confirm(&pending));
        self.replace(accepted);

        if let Err(e) = self.refresh().await {
            tracing::debug!(error = %e, "refresh after submit failed, keeping local copy");
        }
        Ok(receipt)
    }

    /// Undo an optimistic insert. If nothing replaced the optimistic pool in
    /// the meantime the exact pre-submit snapshot comes back.
    fn roll_back(&self, optimistic: &Rc<MessagePool>, confirmed: Rc<MessagePool>, pending: &WishItem) {
        let current = self.current_pool();
        if Rc::ptr_eq(&current, optimistic) {
            self.replace(confirmed);
        } else {
            self.replace(Rc::new(current.without_pending(pending)));
        }
    }

    fn replace(&self, pool: Rc<MessagePool>) {
        *self.current.borrow_mut() = pool;
    }
}
