//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `workspaces`, `workspace_members`, `channels`,
//! `messages`, and `sessions`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Workspaces (organizations)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS workspaces (
    id         TEXT PRIMARY KEY NOT NULL,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL                  -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Workspace membership
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS workspace_members (
    workspace_id TEXT NOT NULL,               -- FK -> workspaces(id)
    user_id      TEXT NOT NULL,
    user_name    TEXT NOT NULL,
    user_email   TEXT NOT NULL,
    role         TEXT NOT NULL DEFAULT 'member',
    joined_at    TEXT NOT NULL,

    PRIMARY KEY (workspace_id, user_id),
    FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Channels
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS channels (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name         TEXT NOT NULL,               -- normalized (lowercase, dashed)
    workspace_id TEXT NOT NULL,               -- FK -> workspaces(id)
    created_by   TEXT NOT NULL,
    created_at   TEXT NOT NULL,

    FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_channels_workspace_id ON channels(workspace_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id            TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    channel_id    TEXT NOT NULL,              -- FK -> channels(id)
    author_id     TEXT NOT NULL,
    author_name   TEXT NOT NULL,              -- denormalized at creation time
    author_email  TEXT NOT NULL,
    author_avatar TEXT NOT NULL,
    content       TEXT NOT NULL,              -- serialized rich-text document
    image_url     TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,

    FOREIGN KEY (channel_id) REFERENCES channels(id) ON DELETE CASCADE
);

-- Keyset pagination scans (created_at, id) descending per channel.
CREATE INDEX IF NOT EXISTS idx_messages_channel_created
    ON messages(channel_id, created_at DESC, id DESC);

-- ----------------------------------------------------------------
-- Sessions (bearer token -> user + active workspace)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token        TEXT PRIMARY KEY NOT NULL,
    user_id      TEXT NOT NULL,
    user_name    TEXT NOT NULL,
    user_email   TEXT NOT NULL,
    user_picture TEXT,
    workspace_id TEXT NOT NULL,               -- FK -> workspaces(id)
    created_at   TEXT NOT NULL,

    FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE
);
"#;

/// Apply the migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
