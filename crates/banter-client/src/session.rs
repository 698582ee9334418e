//! Per-channel view session.
//!
//! [`ChannelSession`] owns the channel's Paged Collection (through the
//! [`PageCache`]) and wires the projector, the scroll anchor controller,
//! and the send coordinator together behind one facade.  The embedding
//! view reports events with current [`Viewport`] measurements and applies
//! the returned [`ScrollEffect`]s; all cache writes stay inside.

use banter_shared::{ChannelId, Message, UserProfile};

use crate::cache::PageCache;
use crate::error::ClientError;
use crate::scroll::{ScrollAnchor, ScrollConfig, ScrollEffect, Viewport};
use crate::send::SendCoordinator;
use crate::store::MessageStore;
use crate::upload::AttachmentUpload;
use crate::view::{project, TailWatch};

/// Default page size for history fetches.
pub const DEFAULT_PAGE_SIZE: u32 = 30;

pub struct ChannelSession<S> {
    store: S,
    channel: ChannelId,
    cache: PageCache,
    anchor: ScrollAnchor,
    tail: TailWatch,
    sender: SendCoordinator,
    upload: AttachmentUpload,
    page_size: u32,
}

impl<S: MessageStore> ChannelSession<S> {
    pub fn new(store: S, channel: ChannelId, identity: UserProfile) -> Self {
        Self::with_config(store, channel, identity, ScrollConfig::default(), DEFAULT_PAGE_SIZE)
    }

    pub fn with_config(
        store: S,
        channel: ChannelId,
        identity: UserProfile,
        scroll: ScrollConfig,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            channel,
            cache: PageCache::new(),
            anchor: ScrollAnchor::new(scroll),
            tail: TailWatch::new(),
            sender: SendCoordinator::new(identity),
            upload: AttachmentUpload::new(),
            page_size,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// The flattened chronological message list, re-derived from the
    /// cache on every call.
    pub fn messages(&self) -> Vec<Message> {
        self.cache
            .collection(&self.channel)
            .map(project)
            .unwrap_or_default()
    }

    pub fn is_at_bottom(&self) -> bool {
        self.anchor.is_at_bottom()
    }

    /// Whether the "jump to latest" affordance should be shown.
    pub fn pending_new_messages(&self) -> bool {
        self.anchor.pending_new_messages()
    }

    /// Whether more history can be fetched.
    pub fn has_more_history(&self) -> bool {
        self.cache
            .collection(&self.channel)
            .map(|c| c.has_more())
            .unwrap_or(true)
    }

    pub fn upload(&self) -> &AttachmentUpload {
        &self.upload
    }

    pub fn upload_mut(&mut self) -> &mut AttachmentUpload {
        &mut self.upload
    }

    /// Fetch the first (newest) page of history.
    pub async fn load_initial(&mut self) -> Result<(), ClientError> {
        let Some(fetch) = self.cache.try_begin_older_fetch(&self.channel) else {
            return Ok(());
        };

        match self
            .store
            .list(&self.channel, fetch.cursor.as_ref(), self.page_size)
            .await
        {
            Ok(page) => {
                self.cache.complete_older_fetch(fetch, page);
                if let Some(collection) = self.cache.collection(&self.channel) {
                    // Baseline for subsequent tail-change detection.
                    self.tail.observe(collection);
                }
                Ok(())
            }
            Err(e) => {
                self.cache.abort_older_fetch(&self.channel);
                Err(e)
            }
        }
    }

    /// Content was (re-)measured after a change: first non-empty content
    /// jumps to the bottom, armed adjustments resolve, passive growth
    /// re-pins.
    pub fn viewport_changed(&mut self, viewport: Viewport) -> Vec<ScrollEffect> {
        let mut effects = Vec::new();
        if !self.anchor.has_initial_scrolled() {
            if !self.messages().is_empty() {
                effects.extend(self.anchor.initial_content(viewport));
            }
        } else {
            effects.extend(self.anchor.content_grew(viewport));
        }
        effects
    }

    /// The user scrolled.  Near the top edge this fetches the next older
    /// page (unless one is already in flight or history is exhausted) and
    /// arms the anchor compensation resolved by the next
    /// [`Self::viewport_changed`].
    pub async fn scrolled(&mut self, viewport: Viewport) -> Result<(), ClientError> {
        self.anchor.scrolled(viewport);

        if !self.anchor.wants_older_page(&viewport) {
            return Ok(());
        }
        let Some(fetch) = self.cache.try_begin_older_fetch(&self.channel) else {
            return Ok(());
        };

        self.anchor.arm_anchor_preserve(viewport);
        match self
            .store
            .list(&self.channel, fetch.cursor.as_ref(), self.page_size)
            .await
        {
            Ok(page) => {
                self.cache.complete_older_fetch(fetch, page);
                Ok(())
            }
            Err(e) => {
                // Leave the viewport unchanged; the next scroll trigger
                // retries.
                self.cache.abort_older_fetch(&self.channel);
                self.anchor.disarm();
                Err(e)
            }
        }
    }

    /// Background refresh of the newest page.
    ///
    /// The result is merged only if no local mutation raced it (epoch
    /// check); a new tail decides between auto-pin and the "new messages"
    /// affordance based on where the viewport was before the change.
    pub async fn refresh(&mut self, viewport: Viewport) -> Result<(), ClientError> {
        self.cache.take_stale(&self.channel);
        let epoch = self.cache.refresh_epoch(&self.channel);

        let page = self.store.list(&self.channel, None, self.page_size).await?;

        if !self.cache.complete_refresh(&self.channel, epoch, page) {
            return Ok(());
        }
        if let Some(collection) = self.cache.collection(&self.channel) {
            if self.tail.observe(collection) {
                self.anchor.tail_will_grow(viewport);
            }
        }
        Ok(())
    }

    /// Mark the cached history stale; the next [`Self::refresh`] refetches.
    pub fn invalidate(&mut self) {
        self.cache.invalidate(&self.channel);
    }

    /// Submit the composed message.
    ///
    /// The provisional splice is visible in [`Self::messages`] before the
    /// network call resolves.  On success the staged attachment is
    /// cleared and the confirmed message returned; on failure the splice
    /// is rolled back and the error carries the user-facing notice (the
    /// composer keeps its content for retry).
    pub async fn submit(
        &mut self,
        content: &str,
        viewport: Viewport,
    ) -> Result<Message, ClientError> {
        let image_url = self.upload.staged_url().map(String::from);

        let pending = self.sender.begin(
            &mut self.cache,
            &self.channel,
            content,
            image_url.as_deref(),
        )?;

        if let Some(collection) = self.cache.collection(&self.channel) {
            if self.tail.observe(collection) {
                self.anchor.tail_will_grow(viewport);
            }
        }

        match self
            .store
            .create(&self.channel, content, image_url.as_deref())
            .await
        {
            Ok(confirmed) => {
                self.sender.confirm(&mut self.cache, pending, confirmed.clone());
                if let Some(collection) = self.cache.collection(&self.channel) {
                    // Re-baseline: the tail id changed provisional -> confirmed.
                    self.tail.observe(collection);
                }
                self.upload.clear();
                Ok(confirmed)
            }
            Err(e) => {
                self.sender.rollback(&mut self.cache, pending);
                if let Some(collection) = self.cache.collection(&self.channel) {
                    self.tail.observe(collection);
                }
                tracing::warn!(channel = %self.channel, error = %e, "message send failed");
                Err(e)
            }
        }
    }

    /// User-triggered jump to the newest message.
    pub fn jump_to_latest(&mut self, viewport: Viewport) -> ScrollEffect {
        self.anchor.jump_to_latest(viewport)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::view::test_support::{confirmed, page};
    use banter_shared::{Cursor, MessagePage, UserId};

    /// Scripted store: answers fetches from queues, in order.
    #[derive(Default)]
    struct ScriptedStore {
        list_responses: RefCell<VecDeque<Result<MessagePage, ClientError>>>,
        create_responses: RefCell<VecDeque<Result<Message, ClientError>>>,
        list_cursors: RefCell<Vec<Option<Cursor>>>,
    }

    impl ScriptedStore {
        fn with_pages(pages: Vec<MessagePage>) -> Self {
            Self {
                list_responses: RefCell::new(pages.into_iter().map(Ok).collect()),
                ..Self::default()
            }
        }

        fn push_create(&self, response: Result<Message, ClientError>) {
            self.create_responses.borrow_mut().push_back(response);
        }
    }

    impl MessageStore for &ScriptedStore {
        async fn list(
            &self,
            _channel: &ChannelId,
            cursor: Option<&Cursor>,
            _limit: u32,
        ) -> Result<MessagePage, ClientError> {
            self.list_cursors.borrow_mut().push(cursor.cloned());
            self.list_responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Network("unscripted".into())))
        }

        async fn create(
            &self,
            _channel: &ChannelId,
            _content: &str,
            _image_url: Option<&str>,
        ) -> Result<Message, ClientError> {
            self.create_responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Network("unscripted".into())))
        }
    }

    fn identity() -> UserProfile {
        UserProfile {
            id: UserId("user_1".into()),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            picture: None,
        }
    }

    fn session<'a>(store: &'a ScriptedStore) -> ChannelSession<&'a ScriptedStore> {
        ChannelSession::new(store, ChannelId("ch_1".into()), identity())
    }

    fn vp(scroll_top: f64, content_height: f64) -> Viewport {
        Viewport {
            scroll_top,
            content_height,
            viewport_height: 400.0,
        }
    }

    #[tokio::test]
    async fn initial_load_projects_and_jumps_to_bottom() {
        let store = ScriptedStore::with_pages(vec![page(&["m3", "m2", "m1"], None)]);
        let mut session = session(&store);

        session.load_initial().await.unwrap();
        let ids: Vec<String> = session.messages().iter().map(|m| m.id.0.clone()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);

        let effects = session.viewport_changed(vp(0.0, 900.0));
        assert_eq!(effects, vec![ScrollEffect::SetScrollTop(500.0)]);
        assert!(session.is_at_bottom());
    }

    #[tokio::test]
    async fn top_scroll_fetches_older_page_and_preserves_anchor() {
        let store = ScriptedStore::with_pages(vec![
            page(&["m4", "m3"], Some("c1")),
            page(&["m2", "m1"], None),
        ]);
        let mut session = session(&store);

        session.load_initial().await.unwrap();
        session.viewport_changed(vp(0.0, 600.0));

        // Scrolled into the top trigger zone.
        session.scrolled(vp(40.0, 600.0)).await.unwrap();
        let ids: Vec<String> = session.messages().iter().map(|m| m.id.0.clone()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m4"]);

        // The older fetch redeemed the continuation cursor.
        assert_eq!(
            store.list_cursors.borrow().as_slice(),
            &[None, Some(Cursor("c1".into()))]
        );

        // Content grew by 600px; the anchored message must not move.
        let effects = session.viewport_changed(vp(40.0, 1200.0));
        assert_eq!(effects, vec![ScrollEffect::SetScrollTop(640.0)]);

        // History is exhausted: further top scrolls fetch nothing.
        session.scrolled(vp(0.0, 1200.0)).await.unwrap();
        assert_eq!(store.list_cursors.borrow().len(), 2);
    }

    #[tokio::test]
    async fn failed_pagination_leaves_list_and_viewport_intact() {
        let store = ScriptedStore::with_pages(vec![page(&["m2", "m1"], Some("c1"))]);
        let mut session = session(&store);

        session.load_initial().await.unwrap();
        session.viewport_changed(vp(0.0, 600.0));

        let err = session.scrolled(vp(10.0, 600.0)).await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert_eq!(session.messages().len(), 2);
        assert!(session.viewport_changed(vp(10.0, 600.0)).is_empty());

        // The slot was released: the next trigger retries.
        store
            .list_responses
            .borrow_mut()
            .push_back(Ok(page(&["m0"], None)));
        session.scrolled(vp(10.0, 600.0)).await.unwrap();
        assert_eq!(session.messages().len(), 3);
    }

    #[tokio::test]
    async fn submit_shows_provisional_then_confirms() {
        let store = ScriptedStore::with_pages(vec![page(&["m1"], None)]);
        let mut confirmed_msg = confirmed("srv1");
        confirmed_msg.content = "hello".into();
        store.push_create(Ok(confirmed_msg));

        let mut session = session(&store);
        session.load_initial().await.unwrap();
        session.viewport_changed(vp(0.0, 300.0));

        let sent = session.submit("hello", vp(0.0, 300.0)).await.unwrap();
        assert_eq!(sent.id.0, "srv1");

        let ids: Vec<String> = session.messages().iter().map(|m| m.id.0.clone()).collect();
        assert_eq!(ids, vec!["m1", "srv1"]);

        // Sender was at the bottom: the tail growth pins the viewport.
        let effects = session.viewport_changed(vp(0.0, 360.0));
        assert_eq!(effects, vec![ScrollEffect::SetScrollTop(0.0)]);
        assert!(session.is_at_bottom());
    }

    #[tokio::test]
    async fn submit_failure_rolls_back_and_surfaces_notice() {
        let store = ScriptedStore::with_pages(vec![page(&["m1"], None)]);
        store.push_create(Err(ClientError::Network("boom".into())));

        let mut session = session(&store);
        session.load_initial().await.unwrap();

        let before: Vec<String> = session.messages().iter().map(|m| m.id.0.clone()).collect();
        let err = session.submit("will fail", vp(0.0, 300.0)).await.unwrap_err();
        assert_eq!(err.user_notice(), "Something went wrong");

        let after: Vec<String> = session.messages().iter().map(|m| m.id.0.clone()).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn authorization_failure_reads_like_network_failure() {
        let store = ScriptedStore::with_pages(vec![page(&["m1"], None)]);
        store.push_create(Err(ClientError::Authorization));

        let mut session = session(&store);
        session.load_initial().await.unwrap();

        let err = session.submit("hi there", vp(0.0, 300.0)).await.unwrap_err();
        assert_eq!(err.user_notice(), "Something went wrong");
    }

    #[tokio::test]
    async fn submit_attaches_and_clears_staged_image() {
        let store = ScriptedStore::with_pages(vec![page(&["m1"], None)]);
        let mut confirmed_msg = confirmed("srv1");
        confirmed_msg.image_url = Some("https://cdn.example/a.png".into());
        store.push_create(Ok(confirmed_msg));

        let mut session = session(&store);
        session.load_initial().await.unwrap();
        session
            .upload_mut()
            .on_uploaded("https://cdn.example/a.png".into());

        let sent = session.submit("look at this", vp(0.0, 300.0)).await.unwrap();
        assert_eq!(sent.image_url.as_deref(), Some("https://cdn.example/a.png"));
        assert!(session.upload().staged_url().is_none());
    }

    #[tokio::test]
    async fn refresh_away_from_bottom_raises_new_messages() {
        let store = ScriptedStore::with_pages(vec![
            page(&["m2", "m1"], None),
            // Refresh result: one new message on top.
            page(&["m3", "m2", "m1"], None),
        ]);
        let mut session = session(&store);

        session.load_initial().await.unwrap();
        session.viewport_changed(vp(0.0, 2000.0));
        // Reading history, well above the bottom.
        session.scrolled(vp(900.0, 2000.0)).await.unwrap();

        session.refresh(vp(900.0, 2000.0)).await.unwrap();
        assert!(session.pending_new_messages());
        assert_eq!(session.messages().len(), 3);

        // Jumping to latest clears the affordance.
        session.jump_to_latest(vp(900.0, 2060.0));
        assert!(!session.pending_new_messages());
    }

    #[tokio::test]
    async fn refresh_at_bottom_pins_to_new_tail() {
        let store = ScriptedStore::with_pages(vec![
            page(&["m1"], None),
            page(&["m2", "m1"], None),
        ]);
        let mut session = session(&store);

        session.load_initial().await.unwrap();
        session.viewport_changed(vp(0.0, 300.0));

        session.refresh(vp(0.0, 300.0)).await.unwrap();
        assert!(!session.pending_new_messages());

        let effects = session.viewport_changed(vp(0.0, 360.0));
        assert_eq!(effects, vec![ScrollEffect::SetScrollTop(0.0)]);
    }

    #[tokio::test]
    async fn validation_failure_makes_no_network_call() {
        let store = ScriptedStore::with_pages(vec![page(&["m1"], None)]);
        let mut session = session(&store);
        session.load_initial().await.unwrap();

        let err = session.submit("x", vp(0.0, 300.0)).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(store.create_responses.borrow().is_empty());
        assert_eq!(session.messages().len(), 1);
    }
}
