//! CRUD operations for [`Workspace`] records and memberships.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use banter_shared::{UserId, UserProfile, Workspace, WorkspaceId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::parse_ts;

/// Placeholder user-id prefix for members invited by email who have not
/// signed in yet.  Claimed by [`Database::claim_membership`].
const INVITED_PREFIX: &str = "invited:";

/// One member of a workspace, as recorded at join time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceMember {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl WorkspaceMember {
    /// Placeholder row recorded at invite time.  The invitee's real
    /// identity-provider id is unknown until they sign in, so the row
    /// carries a synthetic id keyed by the invited email.
    pub fn invited(workspace_id: WorkspaceId, name: &str, email: &str) -> Self {
        Self {
            workspace_id,
            user_id: UserId(format!("{INVITED_PREFIX}{email}")),
            user_name: name.trim().to_string(),
            user_email: email.trim().to_string(),
            role: "member".to_string(),
            joined_at: Utc::now(),
        }
    }
}

impl Database {
    /// Insert a new workspace.
    pub fn create_workspace(&self, workspace: &Workspace) -> Result<()> {
        self.conn().execute(
            "INSERT INTO workspaces (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![
                workspace.id.0,
                workspace.name,
                workspace.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a workspace by id.
    pub fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace> {
        self.conn()
            .query_row(
                "SELECT id, name, created_at FROM workspaces WHERE id = ?1",
                params![id.0],
                row_to_workspace,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List the workspaces a user belongs to, oldest joined first.
    pub fn list_workspaces_for_user(&self, user_id: &UserId) -> Result<Vec<Workspace>> {
        let mut stmt = self.conn().prepare(
            "SELECT w.id, w.name, w.created_at
             FROM workspaces w
             JOIN workspace_members m ON m.workspace_id = w.id
             WHERE m.user_id = ?1
             ORDER BY m.joined_at ASC",
        )?;

        let rows = stmt.query_map(params![user_id.0], row_to_workspace)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)
    }

    /// Add (or update) a workspace member.
    pub fn add_workspace_member(&self, member: &WorkspaceMember) -> Result<()> {
        self.conn().execute(
            "INSERT INTO workspace_members
                 (workspace_id, user_id, user_name, user_email, role, joined_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (workspace_id, user_id)
             DO UPDATE SET user_name = ?3, user_email = ?4, role = ?5",
            params![
                member.workspace_id.0,
                member.user_id.0,
                member.user_name,
                member.user_email,
                member.role,
                member.joined_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List the members of a workspace, sorted by name.
    pub fn list_workspace_members(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<WorkspaceMember>> {
        let mut stmt = self.conn().prepare(
            "SELECT workspace_id, user_id, user_name, user_email, role, joined_at
             FROM workspace_members
             WHERE workspace_id = ?1
             ORDER BY user_name ASC",
        )?;

        let rows = stmt.query_map(params![workspace_id.0], |row| {
            let joined_str: String = row.get(5)?;
            Ok(WorkspaceMember {
                workspace_id: WorkspaceId(row.get(0)?),
                user_id: UserId(row.get(1)?),
                user_name: row.get(2)?,
                user_email: row.get(3)?,
                role: row.get(4)?,
                joined_at: parse_ts(&joined_str, 5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)
    }

    /// Whether a user is a member of a workspace.
    pub fn is_workspace_member(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM workspace_members WHERE workspace_id = ?1 AND user_id = ?2",
            params![workspace_id.0, user_id.0],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Resolve a sign-in attempt against the workspace's membership.
    ///
    /// Direct members pass immediately.  Otherwise, an invite placeholder
    /// row matching the caller's email is upgraded in place to the real
    /// identity, so the invited access path completes on first sign-in.
    /// Returns `false` when neither applies.
    pub fn claim_membership(
        &self,
        workspace_id: &WorkspaceId,
        user: &UserProfile,
    ) -> Result<bool> {
        if self.is_workspace_member(workspace_id, &user.id)? {
            return Ok(true);
        }

        // Only placeholder rows are claimable; a real member's row never
        // changes hands via email match.
        let updated = self.conn().execute(
            "UPDATE workspace_members
             SET user_id = ?3, user_name = ?4
             WHERE workspace_id = ?1 AND user_email = ?2 AND user_id LIKE ?5",
            params![
                workspace_id.0,
                user.email,
                user.id.0,
                user.name,
                format!("{INVITED_PREFIX}%"),
            ],
        )?;
        Ok(updated > 0)
    }
}

fn row_to_workspace(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workspace> {
    let created_str: String = row.get(2)?;
    Ok(Workspace {
        id: WorkspaceId(row.get(0)?),
        name: row.get(1)?,
        created_at: parse_ts(&created_str, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(ws: &str, user: &str, name: &str) -> WorkspaceMember {
        WorkspaceMember {
            workspace_id: WorkspaceId(ws.into()),
            user_id: UserId(user.into()),
            user_name: name.into(),
            user_email: format!("{name}@example.com"),
            role: "member".into(),
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn membership_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.create_workspace(&Workspace {
            id: WorkspaceId("org_1".into()),
            name: "Org".into(),
            created_at: Utc::now(),
        })
        .unwrap();

        db.add_workspace_member(&member("org_1", "user_b", "Beth"))
            .unwrap();
        db.add_workspace_member(&member("org_1", "user_a", "Ada"))
            .unwrap();

        let members = db
            .list_workspace_members(&WorkspaceId("org_1".into()))
            .unwrap();
        assert_eq!(members.len(), 2);
        // Sorted by name.
        assert_eq!(members[0].user_name, "Ada");

        assert!(db
            .is_workspace_member(&WorkspaceId("org_1".into()), &UserId("user_a".into()))
            .unwrap());
        assert!(!db
            .is_workspace_member(&WorkspaceId("org_1".into()), &UserId("stranger".into()))
            .unwrap());

        let workspaces = db
            .list_workspaces_for_user(&UserId("user_a".into()))
            .unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].name, "Org");
    }

    fn seeded_workspace() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_workspace(&Workspace {
            id: WorkspaceId("org_1".into()),
            name: "Org".into(),
            created_at: Utc::now(),
        })
        .unwrap();
        db
    }

    #[test]
    fn invited_member_signs_in_and_claims_the_row() {
        let db = seeded_workspace();
        let ws = WorkspaceId("org_1".into());

        db.add_workspace_member(&WorkspaceMember::invited(
            ws.clone(),
            "Beth",
            "beth@example.com",
        ))
        .unwrap();

        // The real identity-provider id is seen for the first time at
        // sign-in and must resolve through the invited email.
        let beth = UserProfile {
            id: UserId("kinde-beth-123".into()),
            name: "Beth Woods".into(),
            email: "beth@example.com".into(),
            picture: None,
        };
        assert!(db.claim_membership(&ws, &beth).unwrap());

        // The placeholder was upgraded in place, not duplicated.
        let members = db.list_workspace_members(&ws).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, beth.id);
        assert_eq!(members[0].user_name, "Beth Woods");

        // Second sign-in passes as a direct member.
        assert!(db.claim_membership(&ws, &beth).unwrap());
        assert!(db.is_workspace_member(&ws, &beth.id).unwrap());
    }

    #[test]
    fn uninvited_user_cannot_claim_membership() {
        let db = seeded_workspace();
        let ws = WorkspaceId("org_1".into());

        db.add_workspace_member(&WorkspaceMember::invited(
            ws.clone(),
            "Beth",
            "beth@example.com",
        ))
        .unwrap();

        let stranger = UserProfile {
            id: UserId("kinde-mallory".into()),
            name: "Mallory".into(),
            email: "mallory@example.com".into(),
            picture: None,
        };
        assert!(!db.claim_membership(&ws, &stranger).unwrap());
    }

    #[test]
    fn real_member_row_is_not_claimable_by_email() {
        let db = seeded_workspace();
        let ws = WorkspaceId("org_1".into());

        db.add_workspace_member(&member("org_1", "user_a", "Ada"))
            .unwrap();

        // Same email, different identity: must not take over Ada's row.
        let impostor = UserProfile {
            id: UserId("kinde-impostor".into()),
            name: "Ada".into(),
            email: "Ada@example.com".into(),
            picture: None,
        };
        assert!(!db.claim_membership(&ws, &impostor).unwrap());
        assert!(db
            .is_workspace_member(&ws, &UserId("user_a".into()))
            .unwrap());
    }
}
