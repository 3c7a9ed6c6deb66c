//! Wish Danmaku
//!
//! Floating birthday-wish banners ("danmaku") for a countdown page: a message
//! source that merges built-in wishes with ones fetched from the backend, and
//! a scheduler that spawns, animates and retires the banners on layered
//! randomized timers.

pub mod api;
pub mod config;
pub mod danmaku;
pub mod dump;
pub mod error;
pub mod pool;
pub mod session;
pub mod source;
pub mod wish;

pub use error::{Error, Result};
