//! Per-channel page cache.
//!
//! The cache is an arena of [`PagedCollection`]s keyed by channel.  All
//! writes go through the narrow API here (older-page fetches, targeted
//! mutation, refresh merging) so the projector's "pure derivation" invariant
//! keeps holding; nothing else in the crate touches pages directly.
//!
//! Pages are stored in fetch order: index 0 is the first-fetched (newest)
//! page, each page internally newest-first, exactly as the store returns
//! them.

use std::collections::HashMap;

use banter_shared::{ChannelId, Cursor, Message, MessageId, MessagePage};

/// All pages fetched so far for one channel, plus the cursors used to
/// fetch them (`None` for the first page).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagedCollection {
    pub pages: Vec<MessagePage>,
    pub cursors: Vec<Option<Cursor>>,
}

impl PagedCollection {
    /// The continuation cursor for the next older page, if any history
    /// remains beyond what is cached.
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.pages.last().and_then(|p| p.next_cursor.as_ref())
    }

    /// Whether an older page can still be fetched.  A collection with no
    /// pages at all has its first fetch outstanding.
    pub fn has_more(&self) -> bool {
        self.pages.is_empty() || self.next_cursor().is_some()
    }

    /// Identifier of the chronologically newest cached message.
    pub fn newest_id(&self) -> Option<&MessageId> {
        self.pages
            .iter()
            .find(|p| !p.items.is_empty())
            .map(|p| &p.items[0].id)
    }

    /// Splice a message at the chronologically newest position: the front
    /// of the first-fetched page.  Synthesizes a one-page collection when
    /// nothing has been fetched yet.
    pub fn splice_newest(&mut self, message: Message) {
        match self.pages.first_mut() {
            Some(page) => page.items.insert(0, message),
            None => {
                self.pages.push(MessagePage {
                    items: vec![message],
                    next_cursor: None,
                });
                self.cursors.push(None);
            }
        }
    }

    /// Replace the message with the given id, wherever it sits.  Returns
    /// `false` if no such message is cached.
    pub fn replace_by_id(&mut self, id: &MessageId, replacement: Message) -> bool {
        for page in &mut self.pages {
            if let Some(slot) = page.items.iter_mut().find(|m| &m.id == id) {
                *slot = replacement;
                return true;
            }
        }
        false
    }

    /// Remove the message with the given id.  Returns `false` if absent.
    pub fn remove_by_id(&mut self, id: &MessageId) -> bool {
        for page in &mut self.pages {
            if let Some(pos) = page.items.iter().position(|m| &m.id == id) {
                page.items.remove(pos);
                return true;
            }
        }
        false
    }

    /// Whether any cached message carries the given id.
    pub fn contains_id(&self, id: &MessageId) -> bool {
        self.pages
            .iter()
            .any(|p| p.items.iter().any(|m| &m.id == id))
    }
}

#[derive(Debug, Default)]
struct Entry {
    collection: PagedCollection,
    /// Marked by `invalidate`; consumed by the session's next refresh.
    stale: bool,
    /// Suppresses a second concurrent older-page fetch.
    fetch_in_flight: bool,
    /// Bumped on every local mutation; a background refresh started under
    /// an older epoch is discarded on completion.
    epoch: u64,
}

/// Claim on an older-page fetch slot.  Produced by
/// [`PageCache::try_begin_older_fetch`] and redeemed with
/// [`PageCache::complete_older_fetch`] or [`PageCache::abort_older_fetch`].
#[derive(Debug)]
pub struct OlderFetch {
    pub channel: ChannelId,
    /// Cursor to redeem against the store; `None` for the first page.
    pub cursor: Option<Cursor>,
}

/// Arena of cached collections, keyed by channel.
#[derive(Debug, Default)]
pub struct PageCache {
    entries: HashMap<ChannelId, Entry>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, channel: &ChannelId) -> Option<&PagedCollection> {
        self.entries.get(channel).map(|e| &e.collection)
    }

    /// Claim the older-page fetch slot for a channel.
    ///
    /// Returns `None` when a fetch is already in flight or the history is
    /// exhausted; otherwise the cursor to redeem (absent for the first
    /// page).
    pub fn try_begin_older_fetch(&mut self, channel: &ChannelId) -> Option<OlderFetch> {
        let entry = self.entries.entry(channel.clone()).or_default();
        if entry.fetch_in_flight || !entry.collection.has_more() {
            return None;
        }
        entry.fetch_in_flight = true;
        Some(OlderFetch {
            channel: channel.clone(),
            cursor: entry.collection.next_cursor().cloned(),
        })
    }

    /// Append the fetched page and release the fetch slot.
    pub fn complete_older_fetch(&mut self, fetch: OlderFetch, page: MessagePage) {
        let entry = self.entries.entry(fetch.channel).or_default();
        entry.collection.pages.push(page);
        entry.collection.cursors.push(fetch.cursor);
        entry.fetch_in_flight = false;
    }

    /// Release the fetch slot without appending, so the next scroll
    /// trigger can retry.
    pub fn abort_older_fetch(&mut self, channel: &ChannelId) {
        if let Some(entry) = self.entries.get_mut(channel) {
            entry.fetch_in_flight = false;
        }
    }

    /// Whether an older-page fetch is currently in flight.
    pub fn fetch_in_flight(&self, channel: &ChannelId) -> bool {
        self.entries
            .get(channel)
            .map(|e| e.fetch_in_flight)
            .unwrap_or(false)
    }

    /// Apply a pure transformation to the cached collection without any
    /// network call.  No-op (returning `false`) if nothing is cached.
    ///
    /// Every mutation bumps the channel's epoch so in-flight background
    /// refreshes cannot clobber it on completion.
    pub fn mutate<F>(&mut self, channel: &ChannelId, updater: F) -> bool
    where
        F: FnOnce(&mut PagedCollection),
    {
        match self.entries.get_mut(channel) {
            Some(entry) => {
                updater(&mut entry.collection);
                entry.epoch += 1;
                true
            }
            None => false,
        }
    }

    /// Splice a provisional message at the newest position, synthesizing a
    /// one-page collection when nothing is cached yet.
    pub fn splice_provisional(&mut self, channel: &ChannelId, message: Message) {
        let entry = self.entries.entry(channel.clone()).or_default();
        entry.collection.splice_newest(message);
        entry.epoch += 1;
    }

    /// Drop a channel's entry entirely.
    pub fn remove(&mut self, channel: &ChannelId) {
        self.entries.remove(channel);
    }

    /// Mark cached data stale; the session refetches on next observation.
    pub fn invalidate(&mut self, channel: &ChannelId) {
        if let Some(entry) = self.entries.get_mut(channel) {
            entry.stale = true;
        }
    }

    /// Consume the stale flag, reporting whether it was set.
    pub fn take_stale(&mut self, channel: &ChannelId) -> bool {
        match self.entries.get_mut(channel) {
            Some(entry) => std::mem::take(&mut entry.stale),
            None => false,
        }
    }

    /// Epoch marker taken at the start of a background refresh.
    pub fn refresh_epoch(&self, channel: &ChannelId) -> u64 {
        self.entries.get(channel).map(|e| e.epoch).unwrap_or(0)
    }

    /// Merge a background-refresh result.
    ///
    /// Discarded (returning `false`) when the channel's epoch moved since
    /// `started_epoch` was taken, i.e. a local mutation won the race.
    /// Otherwise fresh items not already cached are prepended to the
    /// newest page, keeping the collection duplicate-free.
    pub fn complete_refresh(
        &mut self,
        channel: &ChannelId,
        started_epoch: u64,
        page: MessagePage,
    ) -> bool {
        let entry = self.entries.entry(channel.clone()).or_default();
        if entry.epoch != started_epoch {
            tracing::debug!(channel = %channel, "discarding stale refresh result");
            return false;
        }

        if entry.collection.pages.is_empty() {
            entry.collection.pages.push(page);
            entry.collection.cursors.push(None);
            return true;
        }

        // `page.items` is newest-first; walk oldest-to-newest so inserting
        // at the front lands them in the right order.
        for item in page.items.into_iter().rev() {
            if !entry.collection.contains_id(&item.id) {
                entry.collection.pages[0].items.insert(0, item);
            }
        }
        true
    }

    /// Clone the current collection for a rollback snapshot.
    pub fn snapshot(&self, channel: &ChannelId) -> Option<PagedCollection> {
        self.collection(channel).cloned()
    }

    /// Write a snapshot back verbatim.  `None` removes the entry.
    pub fn restore(&mut self, channel: &ChannelId, snapshot: Option<PagedCollection>) {
        match snapshot {
            Some(collection) => {
                let entry = self.entries.entry(channel.clone()).or_default();
                entry.collection = collection;
                entry.epoch += 1;
            }
            None => {
                self.entries.remove(channel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::test_support::{confirmed, page};

    fn channel() -> ChannelId {
        ChannelId("ch_1".into())
    }

    #[test]
    fn first_fetch_has_no_cursor() {
        let mut cache = PageCache::new();
        let fetch = cache.try_begin_older_fetch(&channel()).unwrap();
        assert!(fetch.cursor.is_none());
    }

    #[test]
    fn in_flight_fetch_suppresses_a_second_one() {
        let mut cache = PageCache::new();
        let ch = channel();

        let first = cache.try_begin_older_fetch(&ch);
        assert!(first.is_some());
        assert!(cache.try_begin_older_fetch(&ch).is_none());

        cache.complete_older_fetch(first.unwrap(), page(&["m2", "m1"], Some("c1")));
        // Slot released and the continuation cursor is used next.
        let second = cache.try_begin_older_fetch(&ch).unwrap();
        assert_eq!(second.cursor.as_ref().unwrap().0, "c1");
    }

    #[test]
    fn exhausted_history_yields_no_fetch() {
        let mut cache = PageCache::new();
        let ch = channel();

        let fetch = cache.try_begin_older_fetch(&ch).unwrap();
        cache.complete_older_fetch(fetch, page(&["m1"], None));
        assert!(cache.try_begin_older_fetch(&ch).is_none());
    }

    #[test]
    fn abort_releases_the_slot_for_retry() {
        let mut cache = PageCache::new();
        let ch = channel();

        let _ = cache.try_begin_older_fetch(&ch).unwrap();
        cache.abort_older_fetch(&ch);
        assert!(cache.try_begin_older_fetch(&ch).is_some());
    }

    #[test]
    fn mutate_is_a_noop_on_uncached_channel() {
        let mut cache = PageCache::new();
        let mut ran = false;
        assert!(!cache.mutate(&channel(), |_| ran = true));
        assert!(!ran);
    }

    #[test]
    fn splice_synthesizes_a_collection_when_empty() {
        let mut cache = PageCache::new();
        let ch = channel();

        cache.splice_provisional(&ch, confirmed("m1"));
        let collection = cache.collection(&ch).unwrap();
        assert_eq!(collection.pages.len(), 1);
        assert_eq!(collection.newest_id().unwrap().0, "m1");
        assert!(collection.next_cursor().is_none());
    }

    #[test]
    fn stale_refresh_is_discarded() {
        let mut cache = PageCache::new();
        let ch = channel();

        let fetch = cache.try_begin_older_fetch(&ch).unwrap();
        cache.complete_older_fetch(fetch, page(&["m1"], None));

        let epoch = cache.refresh_epoch(&ch);
        // A local mutation interleaves before the refresh lands.
        cache.splice_provisional(&ch, confirmed("optimistic-x"));

        assert!(!cache.complete_refresh(&ch, epoch, page(&["m2", "m1"], None)));
        // The splice survived untouched.
        assert_eq!(cache.collection(&ch).unwrap().newest_id().unwrap().0, "optimistic-x");
    }

    #[test]
    fn fresh_refresh_merges_new_items_without_duplicates() {
        let mut cache = PageCache::new();
        let ch = channel();

        let fetch = cache.try_begin_older_fetch(&ch).unwrap();
        cache.complete_older_fetch(fetch, page(&["m2", "m1"], None));

        let epoch = cache.refresh_epoch(&ch);
        assert!(cache.complete_refresh(&ch, epoch, page(&["m4", "m3", "m2"], None)));

        let ids: Vec<&str> = cache.collection(&ch).unwrap().pages[0]
            .items
            .iter()
            .map(|m| m.id.0.as_str())
            .collect();
        assert_eq!(ids, vec!["m4", "m3", "m2", "m1"]);
    }

    #[test]
    fn invalidate_is_observed_once() {
        let mut cache = PageCache::new();
        let ch = channel();
        let fetch = cache.try_begin_older_fetch(&ch).unwrap();
        cache.complete_older_fetch(fetch, page(&["m1"], None));

        cache.invalidate(&ch);
        assert!(cache.take_stale(&ch));
        assert!(!cache.take_stale(&ch));
    }
}
