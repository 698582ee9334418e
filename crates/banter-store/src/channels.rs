//! CRUD operations for [`Channel`] records.

use rusqlite::params;

use banter_shared::{Channel, ChannelId, UserId, WorkspaceId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::parse_ts;

impl Database {
    /// Insert a new channel.  The name is expected to be normalized
    /// already (see `banter_shared::validate::channel_name`).
    pub fn create_channel(&self, channel: &Channel) -> Result<()> {
        self.conn().execute(
            "INSERT INTO channels (id, name, workspace_id, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                channel.id.0,
                channel.name,
                channel.workspace_id.0,
                channel.created_by.0,
                channel.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a channel only if it belongs to the given workspace.
    ///
    /// This backs the authorization check on message creation: a channel
    /// outside the caller's workspace is indistinguishable from a missing
    /// one.
    pub fn get_channel_in_workspace(
        &self,
        id: &ChannelId,
        workspace_id: &WorkspaceId,
    ) -> Result<Channel> {
        self.conn()
            .query_row(
                "SELECT id, name, workspace_id, created_by, created_at
                 FROM channels
                 WHERE id = ?1 AND workspace_id = ?2",
                params![id.0, workspace_id.0],
                row_to_channel,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all channels of a workspace, newest first.
    pub fn list_channels(&self, workspace_id: &WorkspaceId) -> Result<Vec<Channel>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, workspace_id, created_by, created_at
             FROM channels
             WHERE workspace_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;

        let rows = stmt.query_map(params![workspace_id.0], row_to_channel)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)
    }

    /// Delete a channel.  Returns `true` if a row was deleted.
    pub fn delete_channel(&self, id: &ChannelId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM channels WHERE id = ?1", params![id.0])?;
        Ok(affected > 0)
    }
}

fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    let created_str: String = row.get(4)?;
    Ok(Channel {
        id: ChannelId(row.get(0)?),
        name: row.get(1)?,
        workspace_id: WorkspaceId(row.get(2)?),
        created_by: UserId(row.get(3)?),
        created_at: parse_ts(&created_str, 4)?,
    })
}
