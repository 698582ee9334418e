use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use banter_shared::{
    avatar, validate, Channel, ChannelId, Cursor, Message, MessageId, MessagePage, UserProfile,
    Workspace, WorkspaceId,
};
use banter_store::workspaces::WorkspaceMember;

use crate::attachments::{content_type_for, AttachmentStore};
use crate::auth::{authenticate, with_db, Db, SessionContext};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter, WriteLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub attachments: Arc<AttachmentStore>,
    pub rate_limiter: RateLimiter,
    pub write_limiter: WriteLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route("/workspaces/members", get(list_members).post(invite_member))
        .route("/channels", get(list_channels).post(create_channel))
        .route("/channels/:id", get(get_channel))
        .route(
            "/channels/:id/messages",
            get(list_messages).post(create_message),
        )
        .route("/attachments", post(upload_attachment))
        .route("/attachments/:name", get(download_attachment))
        .layer(DefaultBodyLimit::max(state.config.max_attachment_size + 64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateSessionRequest {
    user: UserProfile,
    workspace_id: WorkspaceId,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    token: String,
}

/// Exchange an identity (as asserted by the external auth provider) and a
/// workspace for a bearer token.  The caller must be a member of the
/// workspace, either directly or through an invite placeholder matching
/// their email, which is claimed on this first sign-in.
async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ServerError> {
    let is_member = with_db(&state.db, |db| {
        db.claim_membership(&body.workspace_id, &body.user)
    })?;
    if !is_member {
        return Err(ServerError::Unauthorized);
    }

    let token = with_db(&state.db, |db| {
        db.create_session(&body.user, &body.workspace_id)
    })?;

    info!(user = %body.user.id, workspace = %body.workspace_id, "Session created");
    Ok(Json(CreateSessionResponse { token }))
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateWorkspaceRequest {
    name: String,
    user: UserProfile,
}

/// Create a workspace and enroll its creator as the first member.  This is
/// the one route that needs no session, since a new user has no workspace
/// to hold a session in yet.
async fn create_workspace(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<Workspace>), ServerError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ServerError::BadRequest("Workspace name is required".into()));
    }

    let workspace = Workspace {
        id: WorkspaceId::new(),
        name: name.to_string(),
        created_at: Utc::now(),
    };
    let member = WorkspaceMember {
        workspace_id: workspace.id.clone(),
        user_id: body.user.id.clone(),
        user_name: body.user.name.clone(),
        user_email: body.user.email.clone(),
        role: "owner".to_string(),
        joined_at: Utc::now(),
    };

    with_db(&state.db, |db| {
        db.create_workspace(&workspace)?;
        db.add_workspace_member(&member)
    })?;

    info!(workspace = %workspace.id, name = %workspace.name, "Workspace created");
    Ok((StatusCode::CREATED, Json(workspace)))
}

async fn list_workspaces(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Workspace>>, ServerError> {
    let ctx = authenticate(&state.db, &headers)?;
    let workspaces = with_db(&state.db, |db| {
        db.list_workspaces_for_user(&ctx.user.id)
    })?;
    Ok(Json(workspaces))
}

#[derive(Deserialize)]
struct InviteMemberRequest {
    name: String,
    email: String,
}

/// Invite a member into the caller's workspace.  The invitee shows up in
/// the member list immediately as a placeholder row; their first sign-in
/// with the invited email claims it (see `Database::claim_membership`).
async fn invite_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<InviteMemberRequest>,
) -> Result<(StatusCode, Json<WorkspaceMember>), ServerError> {
    let ctx = authenticate(&state.db, &headers)?;
    validate::invite(&body.name, &body.email)?;

    if !state.write_limiter.check(&ctx.user.id).await {
        return Err(ServerError::RateLimited);
    }

    let member = WorkspaceMember::invited(ctx.workspace.id.clone(), &body.name, &body.email);

    with_db(&state.db, |db| db.add_workspace_member(&member))?;

    info!(workspace = %ctx.workspace.id, email = %member.user_email, "Member invited");
    Ok((StatusCode::CREATED, Json(member)))
}

async fn list_members(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<WorkspaceMember>>, ServerError> {
    let ctx = authenticate(&state.db, &headers)?;
    let members = with_db(&state.db, |db| {
        db.list_workspace_members(&ctx.workspace.id)
    })?;
    Ok(Json(members))
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateChannelRequest {
    name: String,
}

async fn create_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), ServerError> {
    let ctx = authenticate(&state.db, &headers)?;
    let name = validate::channel_name(&body.name)?;

    if !state.write_limiter.check(&ctx.user.id).await {
        return Err(ServerError::RateLimited);
    }

    let channel = Channel {
        id: ChannelId::new(),
        name,
        workspace_id: ctx.workspace.id.clone(),
        created_by: ctx.user.id.clone(),
        created_at: Utc::now(),
    };

    with_db(&state.db, |db| db.create_channel(&channel))?;

    info!(channel = %channel.id, name = %channel.name, "Channel created");
    Ok((StatusCode::CREATED, Json(channel)))
}

async fn list_channels(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Channel>>, ServerError> {
    let ctx = authenticate(&state.db, &headers)?;
    let channels = with_db(&state.db, |db| db.list_channels(&ctx.workspace.id))?;
    Ok(Json(channels))
}

async fn get_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Channel>, ServerError> {
    let ctx = authenticate(&state.db, &headers)?;
    let channel = with_db(&state.db, |db| {
        db.get_channel_in_workspace(&ChannelId(id.clone()), &ctx.workspace.id)
    })?;
    Ok(Json(channel))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListMessagesQuery {
    cursor: Option<String>,
    limit: Option<u32>,
}


/// Authorize channel access for the caller.  A channel outside the
/// caller's workspace answers 403 rather than leaking whether it exists.
fn authorized_channel(
    state: &AppState,
    ctx: &SessionContext,
    channel_id: &ChannelId,
) -> Result<Channel, ServerError> {
    with_db(&state.db, |db| {
        db.get_channel_in_workspace(channel_id, &ctx.workspace.id)
    })
    .map_err(|e| match e {
        ServerError::NotFound(_) => {
            ServerError::Forbidden("Channel is not in your workspace".into())
        }
        other => other,
    })
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<MessagePage>, ServerError> {
    let ctx = authenticate(&state.db, &headers)?;
    let channel = authorized_channel(&state, &ctx, &ChannelId(id))?;

    let cursor = query.cursor.map(Cursor);
    let limit = query
        .limit
        .unwrap_or(banter_store::messages::DEFAULT_PAGE_SIZE);

    let page = with_db(&state.db, |db| {
        db.list_messages(&channel.id, cursor.as_ref(), limit)
    })?;
    Ok(Json(page))
}

#[derive(Deserialize)]
struct CreateMessageRequest {
    content: String,
    image_url: Option<String>,
}

async fn create_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let ctx = authenticate(&state.db, &headers)?;
    let channel = authorized_channel(&state, &ctx, &ChannelId(id))?;

    validate::message_content(&body.content)?;
    if let Some(url) = body.image_url.as_deref() {
        validate::image_url(url)?;
    }

    if !state.write_limiter.check(&ctx.user.id).await {
        return Err(ServerError::RateLimited);
    }

    let now = Utc::now();
    let message = Message {
        id: MessageId::new(),
        channel_id: channel.id.clone(),
        author_id: ctx.user.id.clone(),
        author_name: ctx.user.name.clone(),
        author_email: ctx.user.email.clone(),
        author_avatar: avatar::resolve(ctx.user.picture.as_deref(), &ctx.user.email),
        content: body.content,
        image_url: body.image_url,
        created_at: now,
        updated_at: now,
    };

    with_db(&state.db, |db| db.insert_message(&message))?;

    info!(channel = %channel.id, message = %message.id, "Message created");
    Ok((StatusCode::CREATED, Json(message)))
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

async fn upload_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ServerError> {
    let ctx = authenticate(&state.db, &headers)?;

    if !state.write_limiter.check(&ctx.user.id).await {
        return Err(ServerError::RateLimited);
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;

        let name = state.attachments.save(&data, &original_name).await?;
        let url = format!("{}/{}", state.config.attachment_base_url, name);

        return Ok((StatusCode::CREATED, Json(UploadResponse { url })));
    }

    Err(ServerError::BadRequest("Missing 'file' field".into()))
}

async fn download_attachment(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.attachments.read(&name).await?;
    let content_type = content_type_for(&name);
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
