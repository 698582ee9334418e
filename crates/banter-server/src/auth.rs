//! Bearer-token authentication.
//!
//! Every authenticated route resolves the `Authorization: Bearer <token>`
//! header into a [`SessionContext`] before touching any data.  A missing,
//! malformed, or unknown token is indistinguishable from the caller's
//! point of view.

use std::sync::{Arc, Mutex};

use axum::http::HeaderMap;

use banter_shared::{UserProfile, Workspace};
use banter_store::{Database, StoreError};

use crate::error::ServerError;

/// Shared handle to the SQLite database.  rusqlite connections are not
/// `Sync`, so all access goes through a mutex.
pub type Db = Arc<Mutex<Database>>;

/// The resolved caller: who they are and which workspace they act in.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: UserProfile,
    pub workspace: Workspace,
}

/// Run a closure against the database, mapping lock poisoning to an
/// internal error.
pub fn with_db<T>(
    db: &Db,
    f: impl FnOnce(&Database) -> Result<T, StoreError>,
) -> Result<T, ServerError> {
    let guard = db
        .lock()
        .map_err(|_| ServerError::Internal("Database lock poisoned".into()))?;
    f(&guard).map_err(ServerError::from)
}

/// Resolve the bearer token in `headers` into a [`SessionContext`].
pub fn authenticate(db: &Db, headers: &HeaderMap) -> Result<SessionContext, ServerError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(ServerError::Unauthorized)?;

    let session = with_db(db, |conn| conn.get_session(token)).map_err(|e| match e {
        ServerError::NotFound(_) => ServerError::Unauthorized,
        other => other,
    })?;

    let workspace = with_db(db, |conn| conn.get_workspace(&session.workspace_id))?;

    Ok(SessionContext {
        user: session.user,
        workspace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use banter_shared::{UserId, WorkspaceId};
    use chrono::Utc;

    fn test_db() -> Db {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    fn seed_session(db: &Db) -> String {
        let guard = db.lock().unwrap();
        let workspace = Workspace {
            id: WorkspaceId("ws-1".into()),
            name: "Acme".into(),
            created_at: Utc::now(),
        };
        guard.create_workspace(&workspace).unwrap();
        let user = UserProfile {
            id: UserId("user-1".into()),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            picture: None,
        };
        guard.create_session(&user, &workspace.id).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_valid_token_resolves() {
        let db = test_db();
        let token = seed_session(&db);

        let ctx = authenticate(&db, &bearer(&token)).unwrap();
        assert_eq!(ctx.user.email, "ada@example.com");
        assert_eq!(ctx.workspace.name, "Acme");
    }

    #[test]
    fn test_missing_header_rejected() {
        let db = test_db();
        seed_session(&db);

        let err = authenticate(&db, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized));
    }

    #[test]
    fn test_unknown_token_rejected() {
        let db = test_db();
        seed_session(&db);

        let err = authenticate(&db, &bearer("nope")).unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized));
    }

    #[test]
    fn test_malformed_scheme_rejected() {
        let db = test_db();
        let token = seed_session(&db);

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Basic {token}")).unwrap(),
        );
        let err = authenticate(&db, &headers).unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized));
    }
}
