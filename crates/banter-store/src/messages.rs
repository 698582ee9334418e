//! Message persistence and keyset cursor pagination.
//!
//! Listing walks the `(created_at, id)` index descending, so a page always
//! contains the newest messages not yet seen.  The continuation cursor is
//! an opaque `created_at|id` token pointing at the last row of the page;
//! it is only meaningful when redeemed against this store.

use chrono::{DateTime, Utc};
use rusqlite::params;

use banter_shared::{ChannelId, Cursor, Message, MessageId, MessagePage, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Default page size when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Hard cap on page size to bound a single query.
pub const MAX_PAGE_SIZE: u32 = 100;

impl Database {
    /// Insert a new message.
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, channel_id, author_id, author_name, author_email,
                                   author_avatar, content, image_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                message.id.0,
                message.channel_id.0,
                message.author_id.0,
                message.author_name,
                message.author_email,
                message.author_avatar,
                message.content,
                message.image_url,
                message.created_at.to_rfc3339(),
                message.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List one page of messages for a channel, newest first.
    ///
    /// `cursor` must be a value previously returned as `next_cursor`, or
    /// `None` for the first (newest) page.  The returned page carries a
    /// `next_cursor` exactly when older history remains.
    pub fn list_messages(
        &self,
        channel_id: &ChannelId,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> Result<MessagePage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        // Fetch one extra row to learn whether another page exists without
        // a second query.
        let probe = i64::from(limit) + 1;

        let mut items = match cursor {
            None => {
                let mut stmt = self.conn().prepare(
                    "SELECT id, channel_id, author_id, author_name, author_email,
                            author_avatar, content, image_url, created_at, updated_at
                     FROM messages
                     WHERE channel_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![channel_id.0, probe], row_to_message)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            Some(cursor) => {
                let (created_at, id) = decode_cursor(cursor)?;
                let mut stmt = self.conn().prepare(
                    "SELECT id, channel_id, author_id, author_name, author_email,
                            author_avatar, content, image_url, created_at, updated_at
                     FROM messages
                     WHERE channel_id = ?1
                       AND (created_at < ?2 OR (created_at = ?2 AND id < ?3))
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?4",
                )?;
                let rows = stmt.query_map(
                    params![channel_id.0, created_at.to_rfc3339(), id, probe],
                    row_to_message,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        let next_cursor = if items.len() > limit as usize {
            items.truncate(limit as usize);
            items.last().map(encode_cursor)
        } else {
            None
        };

        Ok(MessagePage { items, next_cursor })
    }

    /// Fetch a single message by id.
    pub fn get_message(&self, id: &MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, channel_id, author_id, author_name, author_email,
                        author_avatar, content, image_url, created_at, updated_at
                 FROM messages WHERE id = ?1",
                params![id.0],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

/// Encode the continuation cursor for a page ending at `last`.
fn encode_cursor(last: &Message) -> Cursor {
    Cursor(format!("{}|{}", last.created_at.to_rfc3339(), last.id))
}

/// Decode a cursor back into its keyset components.
fn decode_cursor(cursor: &Cursor) -> Result<(DateTime<Utc>, String)> {
    let (ts, id) = cursor.0.split_once('|').ok_or(StoreError::InvalidCursor)?;
    if id.is_empty() {
        return Err(StoreError::InvalidCursor);
    }
    let created_at = DateTime::parse_from_rfc3339(ts)
        .map_err(|_| StoreError::InvalidCursor)?
        .with_timezone(&Utc);
    Ok((created_at, id.to_string()))
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    let created_at = parse_ts(&created_str, 8)?;
    let updated_at = parse_ts(&updated_str, 9)?;

    Ok(Message {
        id: MessageId(row.get(0)?),
        channel_id: ChannelId(row.get(1)?),
        author_id: UserId(row.get(2)?),
        author_name: row.get(3)?,
        author_email: row.get(4)?,
        author_avatar: row.get(5)?,
        content: row.get(6)?,
        image_url: row.get(7)?,
        created_at,
        updated_at,
    })
}

pub(crate) fn parse_ts(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
