//! Wish items and the wire shapes they arrive in.
//!
//! The backend answers `GET /api/messages` either with a bare array of
//! `{name, message, emoji, timestamp}` rows or with an object wrapping that
//! array under `messages` (the Express backend also adds `stats` next to it).
//! Both are normalized here into one list of [`WishItem`]s before anything
//! else sees them.

use crate::Result;
use serde::{Deserialize, Serialize};

/// Glyph shown when a wish carries no emoji.
pub const DEFAULT_EMOJI: &str = "🎂";

/// Where a wish came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WishOrigin {
    /// Built-in fallback content, always present.
    Static,
    /// Returned by the backend.
    Submitted,
    /// Optimistically shown while its POST is in flight.
    Pending,
}

/// One displayable birthday wish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishItem {
    pub text: String,
    pub emoji: String,
    pub author: Option<String>,
    /// Server timestamp (ISO 8601 or SQLite `CURRENT_TIMESTAMP`), if any.
    pub timestamp: Option<String>,
    pub origin: WishOrigin,
}

impl WishItem {
    /// A built-in fallback wish.
    pub fn fallback(text: &str, emoji: &str) -> Self {
        Self {
            text: text.to_string(),
            emoji: emoji.to_string(),
            author: None,
            timestamp: None,
            origin: WishOrigin::Static,
        }
    }

    /// Text as shown on screen: the wish, followed by ` — author` when known.
    pub fn display_text(&self) -> String {
        match &self.author {
            Some(author) => format!("{} — {}", self.text, author),
            None => self.text.clone(),
        }
    }

    /// Key used to match a held item against a fresh server listing.
    ///
    /// The timestamp is left out: a locally confirmed wish has none until
    /// the server lists it.
    pub(crate) fn identity(&self) -> (Option<&str>, &str, &str) {
        (self.author.as_deref(), self.text.as_str(), self.emoji.as_str())
    }
}

/// A message row as the backend serializes it. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteMessage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Older page builds posted `text` instead of `message`.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RemoteMessage {
    /// Convert into a [`WishItem`]; rows without any text are dropped.
    pub fn into_wish(self) -> Option<WishItem> {
        let text = self
            .message
            .filter(|m| !m.trim().is_empty())
            .or(self.text.filter(|t| !t.trim().is_empty()))?;
        let emoji = self
            .emoji
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EMOJI.to_string());
        let author = self.name.filter(|n| !n.trim().is_empty());

        Some(WishItem {
            text: text.trim().to_string(),
            emoji,
            author,
            timestamp: self.timestamp,
            origin: WishOrigin::Submitted,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageListPayload {
    Bare(Vec<RemoteMessage>),
    Wrapped {
        #[serde(default)]
        messages: Option<Vec<RemoteMessage>>,
    },
}

/// Normalize a `GET /api/messages` body into submitted wishes, preserving
/// server order.
///
/// An object without `messages` yields an empty list. Invalid JSON or any
/// other shape is an error.
pub fn parse_message_list(body: &str) -> Result<Vec<WishItem>> {
    let payload: MessageListPayload = serde_json::from_str(body)?;
    let rows = match payload {
        MessageListPayload::Bare(rows) => rows,
        MessageListPayload::Wrapped { messages } => messages.unwrap_or_default(),
    };
    Ok(rows.into_iter().filter_map(RemoteMessage::into_wish).collect())
}

/// A wish the visitor is about to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub name: String,
    pub message: String,
    pub emoji: String,
}

/// Name used by the page when the visitor stays anonymous.
pub const ANONYMOUS_NAME: &str = "匿名朋友";

/// Backend limit on the display name, in characters.
pub const MAX_NAME_CHARS: usize = 50;
/// Backend limit on the wish text, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

impl NewMessage {
    pub fn new(name: &str, message: &str, emoji: Option<&str>) -> Self {
        Self {
            name: name.trim().to_string(),
            message: message.trim().to_string(),
            emoji: emoji
                .filter(|e| !e.trim().is_empty())
                .unwrap_or(DEFAULT_EMOJI)
                .to_string(),
        }
    }

    /// Anonymous wish, as the modal form sends it.
    pub fn anonymous(message: &str, emoji: Option<&str>) -> Self {
        Self::new(ANONYMOUS_NAME, message, emoji)
    }

    /// Check the same limits the backend enforces, returning the reason on failure.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.is_empty() || self.message.is_empty() {
            return Err("name and message are required".into());
        }
        if self.name.chars().count() > MAX_NAME_CHARS {
            return Err(format!("name is longer than {MAX_NAME_CHARS} characters"));
        }
        if self.message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(format!("message is longer than {MAX_MESSAGE_CHARS} characters"));
        }
        Ok(())
    }

    /// The item shown while the POST is in flight.
    pub fn to_pending_wish(&self) -> WishItem {
        WishItem {
            text: self.message.clone(),
            emoji: self.emoji.clone(),
            author: Some(self.name.clone()),
            timestamp: None,
            origin: WishOrigin::Pending,
        }
    }
}

/// Fallback wishes for the countdown (home) page.
pub fn home_fallback_wishes() -> Vec<WishItem> {
    [
        ("岁华二十四，星辉为你加冕。", "👑"),
        ("廿四芳辰，宇宙为你点亮光年。", "✨"),
        ("你降临的第24次春分，万物为你称臣。", "🌿"),
        ("时间把第24颗珍珠镶进你眼眸。", "🤍"),
        ("二十四阕诗，写不尽你锋芒与温柔。", "🖋️"),
        ("世界在你24圈光晕里悄然对焦。", "🌐"),
        ("此刻银河以你为轴，潮汐为你和声。", "🌌"),
        ("二十四道晨曦，皆化作你的前缀。", "🌅"),
        ("你携24载山海，自成风向与坐标。", "🧭"),
        ("生命把第24颗镭射心跳藏进你掌心。", "💎"),
        ("廿四载霜雪，炼成你眸底的澄澈。", "🔮"),
        ("二十四重宇宙，在你眉间同时亮起。", "🌠"),
    ]
    .into_iter()
    .map(|(text, emoji)| WishItem::fallback(text, emoji))
    .collect()
}

/// Fallback wishes for the birthday page.
pub fn birthday_fallback_wishes() -> Vec<WishItem> {
    [
        ("岁华二十四，星辉为你加冕。", "👑"),
        ("廿四芳辰，宇宙为你点亮光年。", "✨"),
        ("你降临的第24次春分，万物为你称臣。", "🌿"),
        ("时间把第24颗珍珠镶进你眼眸。", "🤍"),
        ("二十四载春秋，你是人间最美的诗。", "🌸"),
        ("愿你24岁的每一天都闪闪发光。", "💫"),
        ("生日快乐！愿所有美好如期而至。", "🎂"),
        ("今天全世界都在为你庆祝！", "🎉"),
    ]
    .into_iter()
    .map(|(text, emoji)| WishItem::fallback(text, emoji))
    .collect()
}
