//! Message view projection.
//!
//! The projector is a pure function of a [`PagedCollection`]: it is
//! re-derived after every cache mutation rather than maintained
//! incrementally, so the rendered list can never drift from the cache.
//!
//! Flattening: each page is newest-first internally and pages are stored
//! in fetch order (newest page first), so chronological order is obtained
//! by reversing each page's items, reversing the page order, and
//! concatenating.

use banter_shared::{Message, MessageId};

use crate::cache::PagedCollection;

/// Flatten the cached pages into one chronologically ascending sequence.
pub fn project(collection: &PagedCollection) -> Vec<Message> {
    collection
        .pages
        .iter()
        .rev()
        .flat_map(|page| page.items.iter().rev().cloned())
        .collect()
}

/// Watches the identifier of the chronologically last projected item and
/// signals when a new tail arrives across successive projections.
#[derive(Debug, Default)]
pub struct TailWatch {
    last_id: Option<MessageId>,
}

impl TailWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe the latest projection.  Returns `true` exactly when the
    /// last item's id differs from the previous observation and both
    /// sides are non-empty.
    pub fn observe(&mut self, collection: &PagedCollection) -> bool {
        let current = collection.newest_id().cloned();
        let changed = matches!(
            (&self.last_id, &current),
            (Some(prev), Some(cur)) if prev != cur
        );
        self.last_id = current;
        changed
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! Fixture builders shared by the crate's tests.

    use banter_shared::{ChannelId, Cursor, Message, MessageId, MessagePage, UserId};
    use chrono::Utc;

    /// A confirmed message with the given id.
    pub fn confirmed(id: &str) -> Message {
        let now = Utc::now();
        Message {
            id: MessageId(id.into()),
            channel_id: ChannelId("ch_1".into()),
            author_id: UserId("user_1".into()),
            author_name: "Ada".into(),
            author_email: "ada@example.com".into(),
            author_avatar: "https://avatar.vercel.sh/ada@example.com".into(),
            content: format!("content of {id}"),
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A newest-first page of the given ids.
    pub fn page(ids: &[&str], next: Option<&str>) -> MessagePage {
        MessagePage {
            items: ids.iter().map(|id| confirmed(id)).collect(),
            next_cursor: next.map(|c| Cursor(c.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::page;
    use super::*;

    #[test]
    fn flattening_yields_chronological_order() {
        // P1 fetched first (newest messages), P2 next, P3 oldest.
        let collection = PagedCollection {
            pages: vec![
                page(&["m6", "m5"], Some("c1")),
                page(&["m4", "m3"], Some("c2")),
                page(&["m2", "m1"], None),
            ],
            cursors: vec![None, None, None],
        };

        let projected = project(&collection);
        let ids: Vec<&str> = projected.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m4", "m5", "m6"]);
    }

    #[test]
    fn projection_is_idempotent() {
        let collection = PagedCollection {
            pages: vec![page(&["m3", "m2"], Some("c1")), page(&["m1"], None)],
            cursors: vec![None, None],
        };

        assert_eq!(project(&collection), project(&collection));
    }

    #[test]
    fn empty_pages_are_skipped() {
        let collection = PagedCollection {
            pages: vec![page(&[], None), page(&["m1"], None)],
            cursors: vec![None, None],
        };
        let projected = project(&collection);
        assert_eq!(projected.len(), 1);
        assert_eq!(collection.newest_id().unwrap().0, "m1");
    }

    #[test]
    fn tail_watch_signals_only_on_change() {
        let mut watch = TailWatch::new();

        let first = PagedCollection {
            pages: vec![page(&["m2", "m1"], None)],
            cursors: vec![None],
        };
        // First observation: no previous side, no signal.
        assert!(!watch.observe(&first));
        // Same tail again: no signal.
        assert!(!watch.observe(&first));

        let grown = PagedCollection {
            pages: vec![page(&["m3", "m2", "m1"], None)],
            cursors: vec![None],
        };
        assert!(watch.observe(&grown));
    }

    #[test]
    fn tail_watch_ignores_transitions_through_empty() {
        let mut watch = TailWatch::new();
        let empty = PagedCollection::default();
        let filled = PagedCollection {
            pages: vec![page(&["m1"], None)],
            cursors: vec![None],
        };

        assert!(!watch.observe(&empty));
        assert!(!watch.observe(&filled));
    }
}
