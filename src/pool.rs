//! The pool of wishes the scheduler draws from.

use crate::wish::{WishItem, WishOrigin};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::rc::Rc;

/// An immutable snapshot of displayable wishes.
///
/// Snapshots are shared as `Rc<MessagePool>`; replacing the pool swaps the
/// `Rc`, so a reader always sees one whole snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePool {
    items: Vec<Rc<WishItem>>,
}

impl MessagePool {
    pub fn new(items: Vec<WishItem>) -> Self {
        Self {
            items: items.into_iter().map(Rc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rc<WishItem>> {
        self.items.get(index)
    }

    /// Uniform draw with replacement. `None` only for an empty pool.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Rc<WishItem>> {
        self.items.choose(rng)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<WishItem>> {
        self.items.iter()
    }

    /// Items that came from the backend (or are awaiting it).
    pub fn submitted(&self) -> impl Iterator<Item = &Rc<WishItem>> {
        self.items.iter().filter(|w| w.origin != WishOrigin::Static)
    }

    /// Whether every item of `other` has a counterpart here, counting duplicates.
    ///
    /// Items are matched on author, text and emoji. The timestamp is ignored
    /// so a locally confirmed wish matches the row the server later returns.
    pub fn covers(&self, other: &MessagePool) -> bool {
        let mut available = identity_counts(self.items.iter());
        other.items.iter().all(|item| take(&mut available, match_key(item)))
    }

    /// This pool plus one more item at the end.
    pub(crate) fn with_appended(&self, item: WishItem) -> Self {
        let mut items = self.items.clone();
        items.push(Rc::new(item));
        Self { items }
    }

    /// This pool with the first pending copy of `wish` re-tagged as submitted.
    pub(crate) fn confirm(&self, wish: &WishItem) -> Self {
        let mut items = self.items.clone();
        if let Some(slot) = items.iter_mut().find(|item| is_pending_copy(item, wish)) {
            *slot = Rc::new(WishItem {
                origin: WishOrigin::Submitted,
                ..WishItem::clone(slot)
            });
        }
        Self { items }
    }

    /// This pool without the first pending copy of `wish`.
    pub(crate) fn without_pending(&self, wish: &WishItem) -> Self {
        let mut items = self.items.clone();
        if let Some(index) = items.iter().position(|item| is_pending_copy(item, wish)) {
            items.remove(index);
        }
        Self { items }
    }

    /// Build `static ++ remote`, then re-append any submitted item of
    /// `previous` that the remote listing no longer contains.
    pub(crate) fn assemble(statics: &[Rc<WishItem>], remote: Vec<WishItem>, previous: &MessagePool) -> Self {
        let remote: Vec<Rc<WishItem>> = remote.into_iter().map(Rc::new).collect();

        let retained: Vec<Rc<WishItem>> = {
            let mut available = identity_counts(remote.iter());
            previous
                .submitted()
                .filter(|item| !take(&mut available, match_key(*item)))
                .cloned()
                .collect()
        };

        let mut items = Vec::with_capacity(statics.len() + remote.len() + retained.len());
        items.extend(statics.iter().cloned());
        items.extend(remote);
        items.extend(retained);
        Self { items }
    }
}

fn is_pending_copy(item: &WishItem, wish: &WishItem) -> bool {
    item.origin == WishOrigin::Pending && item == wish
}

type MatchKey<'a> = (Option<&'a str>, &'a str, &'a str);

fn match_key(item: &WishItem) -> MatchKey<'_> {
    item.identity()
}

fn identity_counts<'a>(items: impl Iterator<Item = &'a Rc<WishItem>>) -> HashMap<MatchKey<'a>, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(match_key(item)).or_insert(0) += 1;
    }
    counts
}

/// Consume one occurrence of `key`, returning whether one was available.
fn take<'a>(counts: &mut HashMap<MatchKey<'a>, usize>, key: MatchKey<'a>) -> bool {
    match counts.get_mut(&key) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(author: &str, text: &str) -> WishItem {
        WishItem {
            text: text.into(),
            emoji: "🎉".into(),
            author: Some(author.into()),
            timestamp: Some("2025-03-01 10:00:00".into()),
            origin: WishOrigin::Submitted,
        }
    }

    #[test]
    fn test_assemble_puts_remote_after_static() {
        let base = MessagePool::new(vec![WishItem::fallback("a", "🎂")]);
        let statics: Vec<_> = base.iter().cloned().collect();
        let pool = MessagePool::assemble(&statics, vec![submitted("x", "hi"), submitted("y", "yo")], &base);
        let texts: Vec<&str> = pool.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "hi", "yo"]);
        assert!(Rc::ptr_eq(pool.get(0).unwrap(), base.get(0).unwrap()));
    }

    #[test]
    fn test_assemble_retains_items_missing_from_remote() {
        let base = MessagePool::new(vec![WishItem::fallback("a", "🎂")]);
        let statics: Vec<_> = base.iter().cloned().collect();
        let first = MessagePool::assemble(&statics, vec![submitted("x", "hi"), submitted("y", "yo")], &base);
        let second = MessagePool::assemble(&statics, vec![submitted("y", "yo")], &first);
        assert_eq!(second.len(), 3);
        assert!(second.covers(&first));
    }

    #[test]
    fn test_covers_counts_duplicates() {
        let one = MessagePool::new(vec![submitted("x", "hi")]);
        let two = MessagePool::new(vec![submitted("x", "hi"), submitted("x", "hi")]);
        assert!(two.covers(&one));
        assert!(!one.covers(&two));
    }

    #[test]
    fn test_confirmed_wish_matches_server_row() {
        let pending = WishItem {
            timestamp: None,
            origin: WishOrigin::Pending,
            ..submitted("x", "hi")
        };
        let pool = MessagePool::new(vec![pending.clone()]).confirm(&pending);
        assert_eq!(pool.get(0).unwrap().origin, WishOrigin::Submitted);

        let refreshed = MessagePool::assemble(&[], vec![submitted("x", "hi")], &pool);
        assert_eq!(refreshed.len(), 1);
        assert!(refreshed.covers(&pool));
    }

    #[test]
    fn test_without_pending_leaves_confirmed_copies() {
        let pending = WishItem {
            timestamp: None,
            origin: WishOrigin::Pending,
            ..submitted("x", "hi")
        };
        let confirmed = WishItem {
            origin: WishOrigin::Submitted,
            ..pending.clone()
        };
        let pool = MessagePool::new(vec![confirmed, pending.clone()]).without_pending(&pending);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0).unwrap().origin, WishOrigin::Submitted);
    }
}
