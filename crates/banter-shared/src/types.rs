use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Workspace (organization) identifier, issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct WorkspaceId(pub String);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

/// Message identifier.  Confirmed messages carry a server-issued UUID;
/// provisional messages carry a client-synthesized `optimistic-` id until
/// the server confirms them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Synthesize a provisional identifier for an optimistic send.
    pub fn provisional() -> Self {
        Self(format!("optimistic-{}", Uuid::new_v4()))
    }

    /// Whether this id belongs to a not-yet-confirmed message.
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with("optimistic-")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub String);

macro_rules! impl_display {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

impl_display!(WorkspaceId, ChannelId, MessageId, UserId);

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Opaque pagination token issued by the message store and redeemed on the
/// next older-page fetch.  Clients must never construct one themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Cursor(pub String);

/// One fetched page of messages, store-native order (newest first).
/// `next_cursor` is absent when no older history exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePage {
    pub items: Vec<Message>,
    pub next_cursor: Option<Cursor>,
}

// ---------------------------------------------------------------------------
// Domain models
// ---------------------------------------------------------------------------

/// A workspace (organization) grouping channels and members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    /// Single-character avatar used where no image exists.
    pub fn avatar(&self) -> String {
        self.name.chars().next().unwrap_or('M').to_string()
    }
}

/// A chat channel inside a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub workspace_id: WorkspaceId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// A single chat message.  Author fields are denormalized at creation time
/// so history survives profile changes in the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_email: String,
    pub author_avatar: String,
    /// Serialized rich-text document (see [`crate::richtext`]).
    pub content: String,
    /// Optional attached image, already uploaded and served by URL.
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The current user's identity as provided by the session layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Explicit picture URL, if the identity provider has one.
    pub picture: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_are_recognized() {
        let id = MessageId::provisional();
        assert!(id.is_provisional());
        assert!(!MessageId::new().is_provisional());
    }

    #[test]
    fn workspace_avatar_falls_back() {
        let ws = Workspace {
            id: WorkspaceId("org_1".into()),
            name: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(ws.avatar(), "M");
    }
}
