//! Bearer-token sessions.
//!
//! The identity provider itself is an external collaborator; what the
//! server needs is a token it can resolve into "who is calling, and which
//! workspace are they acting in".  Sessions are plain rows so tests and
//! local development need no provider at all.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use banter_shared::{UserProfile, WorkspaceId};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// A resolved session: the calling user plus their active workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
    pub workspace_id: WorkspaceId,
}

impl Database {
    /// Create a session for a user acting in a workspace.  Returns the
    /// freshly issued bearer token.
    pub fn create_session(
        &self,
        user: &UserProfile,
        workspace_id: &WorkspaceId,
    ) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        self.conn().execute(
            "INSERT INTO sessions
                 (token, user_id, user_name, user_email, user_picture, workspace_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token,
                user.id.0,
                user.name,
                user.email,
                user.picture,
                workspace_id.0,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(token)
    }

    /// Resolve a bearer token into a [`Session`].
    pub fn get_session(&self, token: &str) -> Result<Session> {
        self.conn()
            .query_row(
                "SELECT token, user_id, user_name, user_email, user_picture, workspace_id
                 FROM sessions WHERE token = ?1",
                params![token],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        user: UserProfile {
                            id: banter_shared::UserId(row.get(1)?),
                            name: row.get(2)?,
                            email: row.get(3)?,
                            picture: row.get(4)?,
                        },
                        workspace_id: WorkspaceId(row.get(5)?),
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Delete a session (logout).  Returns `true` if a row was deleted.
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_shared::{UserId, Workspace};

    #[test]
    fn session_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.create_workspace(&Workspace {
            id: WorkspaceId("org_1".into()),
            name: "Org".into(),
            created_at: Utc::now(),
        })
        .unwrap();

        let user = UserProfile {
            id: UserId("user_1".into()),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            picture: None,
        };

        let token = db
            .create_session(&user, &WorkspaceId("org_1".into()))
            .unwrap();

        let session = db.get_session(&token).unwrap();
        assert_eq!(session.user, user);
        assert_eq!(session.workspace_id.0, "org_1");

        assert!(db.delete_session(&token).unwrap());
        assert!(matches!(
            db.get_session(&token).unwrap_err(),
            StoreError::NotFound
        ));
    }
}
