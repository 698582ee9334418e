//! Optimistic send coordination.
//!
//! A submission splices a provisional message into the cache before the
//! network mutation is issued, so the sender always sees their own message
//! immediately.  Reconciliation is strictly by synthetic identifier, never
//! by position: the list may have shifted under interleaved pagination or
//! other submissions by the time the server answers.
//!
//! Each submission carries its own snapshot, so concurrent submissions
//! coexist and resolve independently: failing one rolls back only that
//! one's splice.

use chrono::Utc;

use banter_shared::{avatar, validate, ChannelId, Message, MessageId, UserProfile};

use crate::cache::{PageCache, PagedCollection};
use crate::error::ClientError;

/// An in-flight submission: the provisional id to reconcile against and
/// the pre-submit snapshot for rollback.
#[derive(Debug)]
pub struct PendingSend {
    pub provisional_id: MessageId,
    channel: ChannelId,
    snapshot: Option<PagedCollection>,
}

/// Coordinates optimistic sends for the current user.
#[derive(Debug, Clone)]
pub struct SendCoordinator {
    identity: UserProfile,
}

impl SendCoordinator {
    pub fn new(identity: UserProfile) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &UserProfile {
        &self.identity
    }

    /// Validate the input, snapshot the cache, and splice a provisional
    /// message at the newest position.
    ///
    /// Validation failures reject the submission before any cache
    /// mutation.  The splice bumps the channel's epoch, which cancels any
    /// in-flight background refresh (its result will arrive under a stale
    /// epoch and be discarded).
    pub fn begin(
        &self,
        cache: &mut PageCache,
        channel: &ChannelId,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<PendingSend, ClientError> {
        validate::message_content(content)?;
        if let Some(url) = image_url {
            validate::image_url(url)?;
        }

        let snapshot = cache.snapshot(channel);

        let now = Utc::now();
        let provisional = Message {
            id: MessageId::provisional(),
            channel_id: channel.clone(),
            author_id: self.identity.id.clone(),
            author_name: self.identity.name.clone(),
            author_email: self.identity.email.clone(),
            author_avatar: avatar::resolve(self.identity.picture.as_deref(), &self.identity.email),
            content: content.to_string(),
            image_url: image_url.map(String::from),
            created_at: now,
            updated_at: now,
        };

        let provisional_id = provisional.id.clone();
        cache.splice_provisional(channel, provisional);

        tracing::debug!(channel = %channel, id = %provisional_id, "optimistic splice");

        Ok(PendingSend {
            provisional_id,
            channel: channel.clone(),
            snapshot,
        })
    }

    /// The server confirmed the message: replace the provisional entry in
    /// place, matched by its synthetic id.
    pub fn confirm(&self, cache: &mut PageCache, pending: PendingSend, confirmed: Message) {
        let replaced = cache.mutate(&pending.channel, |collection| {
            collection.replace_by_id(&pending.provisional_id, confirmed);
        });
        if !replaced {
            tracing::warn!(
                channel = %pending.channel,
                id = %pending.provisional_id,
                "confirmation arrived for an uncached channel"
            );
        }
    }

    /// The creation failed: undo this submission's splice.
    ///
    /// When nothing else touched the collection since the splice, the
    /// pre-submit snapshot is restored verbatim.  Otherwise (another
    /// provisional entry is in flight, a page arrived, a refresh merged)
    /// only this submission's provisional entry is removed, leaving the
    /// interleaved state intact.
    pub fn rollback(&self, cache: &mut PageCache, pending: PendingSend) {
        let untouched = match (cache.collection(&pending.channel), &pending.snapshot) {
            (Some(current), snapshot) => {
                let mut expected = snapshot.clone().unwrap_or_default();
                if let Some(provisional) = current
                    .pages
                    .iter()
                    .flat_map(|p| p.items.iter())
                    .find(|m| m.id == pending.provisional_id)
                {
                    expected.splice_newest(provisional.clone());
                }
                *current == expected
            }
            (None, _) => false,
        };

        if untouched {
            cache.restore(&pending.channel, pending.snapshot);
        } else {
            cache.mutate(&pending.channel, |collection| {
                collection.remove_by_id(&pending.provisional_id);
            });
        }

        tracing::debug!(channel = %pending.channel, id = %pending.provisional_id, "rolled back optimistic send");
    }
}
