/// Comment endpoints
///
/// Reading and posting require membership in the ticket's project team.
/// Editing and deleting are reserved to the comment's author.
///
/// - `GET /api/comments?ticketId=`
/// - `POST /api/comments`
/// - `PUT|DELETE /api/comments/:id`

use crate::{
    app::AppState,
    error::{parse_id, ApiError, ApiResult},
    extract::{not_blank, ApiQuery, ValidatedJson},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bugtracker_shared::{
    auth::{
        authorization::{authorize_project, require_author, ProjectAction},
        middleware::AuthContext,
    },
    models::{
        comment::{Comment, CreateComment},
        ticket::Ticket,
        MessageResponse,
    },
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsQuery {
    pub ticket_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub ticket_id: String,

    #[validate(custom(function = "not_blank", message = "Comment text is required"))]
    pub text: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(custom(function = "not_blank", message = "Comment text is required"))]
    pub text: String,
}

/// Loads a ticket and checks the caller may discuss it
async fn load_visible_ticket(state: &AppState, auth: &AuthContext, ticket_id: Uuid) -> ApiResult<Ticket> {
    let ticket = Ticket::find_by_id(&state.db, ticket_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;

    authorize_project(&state.db, auth, ticket.project_id, ProjectAction::Comment).await?;
    Ok(ticket)
}

/// Loads a comment the caller wrote
async fn load_own_comment(state: &AppState, auth: &AuthContext, raw_id: &str) -> ApiResult<Comment> {
    let id = parse_id(raw_id, "Comment")?;

    let comment = Comment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    if let Err(err) = require_author(auth, &comment) {
        warn!(comment_id = %comment.id, user_id = %auth.user_id(), "Comment modification denied");
        return Err(err.into());
    }

    Ok(comment)
}

/// List a ticket's comments, oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<ListCommentsQuery>,
) -> ApiResult<Json<Vec<Comment>>> {
    let raw_id = query
        .ticket_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Ticket ID is required".to_string()))?;

    let ticket = load_visible_ticket(&state, &auth, parse_id(&raw_id, "Ticket")?).await?;

    let comments = Comment::list_by_ticket(&state.db, ticket.id).await?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let ticket = load_visible_ticket(&state, &auth, parse_id(&req.ticket_id, "Ticket")?).await?;

    let comment = Comment::create(
        &state.db,
        CreateComment {
            ticket_id: ticket.id,
            user_id: auth.user_id(),
            text: req.text,
        },
    )
    .await?;

    info!(comment_id = %comment.id, ticket_id = %ticket.id, "Comment added");
    Ok(Json(comment))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let comment = load_own_comment(&state, &auth, &id).await?;

    let updated = Comment::update_text(&state.db, comment.id, &req.text)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    info!(comment_id = %updated.id, "Comment updated");
    Ok(Json(updated))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let comment = load_own_comment(&state, &auth, &id).await?;

    if !Comment::delete(&state.db, comment.id).await? {
        return Err(ApiError::not_found("Comment"));
    }

    info!(comment_id = %comment.id, "Comment deleted");
    Ok(Json(MessageResponse::new("Comment removed")))
}
