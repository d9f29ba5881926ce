/// Ticket endpoints
///
/// Every operation requires the caller to be on the team of the ticket's
/// project. Assignees must be team members too.
///
/// - `GET /api/tickets?projectId=&status=&priority=&assignee=&keyword=`
/// - `POST /api/tickets`
/// - `GET|PUT|DELETE /api/tickets/:id`
/// - `PUT /api/tickets/:id/assign`

use crate::{
    app::AppState,
    error::{parse_id, ApiError, ApiResult},
    extract::{
        check_optional_text, double_option, not_blank, ApiJson, ApiQuery, ValidatedJson,
        MAX_TITLE_CHARS,
    },
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bugtracker_shared::{
    auth::{
        authorization::{authorize_project, require_assignable, AuthzError, ProjectAction},
        middleware::AuthContext,
    },
    models::{
        project::Project,
        ticket::{
            AssigneeFilter, CreateTicket, Ticket, TicketFilter, TicketPriority, TicketStatus,
            UpdateTicket,
        },
        user::User,
        MessageResponse,
    },
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Listing query; empty values are treated as absent
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTicketsQuery {
    pub project_id: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub keyword: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ListTicketsQuery {
    /// Splits the query into the project ID and the filter
    fn into_parts(self) -> ApiResult<(Uuid, TicketFilter)> {
        let project_id = present(self.project_id)
            .ok_or_else(|| ApiError::BadRequest("Project ID is required".to_string()))?;
        let project_id = parse_id(&project_id, "Project")?;

        let status = present(self.status)
            .map(|s| s.parse::<TicketStatus>())
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let priority = present(self.priority)
            .map(|p| p.parse::<TicketPriority>())
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let assignee = present(self.assignee)
            .map(|a| a.trim().parse::<AssigneeFilter>())
            .transpose()
            .map_err(|_| ApiError::not_found("User"))?;

        let keyword = present(self.keyword);
        if keyword.as_deref().is_some_and(|k| k.contains('\0')) {
            return Err(ApiError::BadRequest("Keyword contains invalid characters".to_string()));
        }

        Ok((
            project_id,
            TicketFilter {
                status,
                priority,
                assignee,
                keyword,
            },
        ))
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    #[validate(
        custom(function = "not_blank", message = "Title is required"),
        length(max = 255, message = "Title must be at most 255 characters")
    )]
    pub title: String,

    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub project_id: String,

    /// User ID; empty means unassigned
    pub assignee: Option<String>,
}

/// Ticket update; any subset of fields
///
/// `"assignee": null` (or `""`) clears the assignee, omitting it leaves the
/// assignee unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,

    #[serde(default, deserialize_with = "double_option")]
    pub assignee: Option<Option<String>>,
}

impl UpdateTicketRequest {
    fn check_text(&self) -> ApiResult<()> {
        check_optional_text("title", self.title.as_deref(), Some(MAX_TITLE_CHARS))?;
        check_optional_text("description", self.description.as_deref(), None)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub user_id: String,
}

/// Loads a ticket and checks the caller is on its project's team
async fn load_ticket(
    state: &AppState,
    auth: &AuthContext,
    raw_id: &str,
    action: ProjectAction,
) -> ApiResult<Ticket> {
    let id = parse_id(raw_id, "Ticket")?;

    let ticket = Ticket::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;

    authorize_project(&state.db, auth, ticket.project_id, action).await?;
    Ok(ticket)
}

/// Resolves a requested assignee to a user on the project team
///
/// `None` or an empty ID means unassigned.
async fn resolve_assignee(
    state: &AppState,
    project_id: Uuid,
    raw: Option<&str>,
) -> ApiResult<Option<Uuid>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    let user_id = parse_id(raw, "User")?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    require_assignable(&state.db, project_id, user.id).await?;
    Ok(Some(user.id))
}

/// Explains an update that matched no row
///
/// The ticket was deleted, or the new assignee left the team after
/// `resolve_assignee` ran.
async fn unwritten_update(state: &AppState, id: Uuid) -> ApiError {
    match Ticket::find_by_id(&state.db, id).await {
        Ok(Some(_)) => AuthzError::AssigneeNotMember.into(),
        Ok(None) => ApiError::not_found("Ticket"),
        Err(err) => err.into(),
    }
}

/// List a project's tickets, oldest first
///
/// # Errors
///
/// - `400`: Missing project ID, or invalid status/priority filter
/// - `403`: Caller is not a team member
/// - `404`: Project not found
pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<ListTicketsQuery>,
) -> ApiResult<Json<Vec<Ticket>>> {
    let (project_id, filter) = query.into_parts()?;

    if Project::find_by_id(&state.db, project_id).await?.is_none() {
        return Err(ApiError::not_found("Project"));
    }
    authorize_project(&state.db, &auth, project_id, ProjectAction::ViewTickets).await?;

    let tickets = Ticket::list(&state.db, project_id, &filter).await?;
    Ok(Json(tickets))
}

/// Create a ticket
pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    let project_id = parse_id(&req.project_id, "Project")?;
    check_optional_text("description", req.description.as_deref(), None)?;

    if Project::find_by_id(&state.db, project_id).await?.is_none() {
        return Err(ApiError::not_found("Project"));
    }
    authorize_project(&state.db, &auth, project_id, ProjectAction::EditTickets).await?;

    let assignee_id = resolve_assignee(&state, project_id, req.assignee.as_deref()).await?;

    let ticket = Ticket::create(
        &state.db,
        CreateTicket {
            title: req.title,
            description: req.description,
            priority: req.priority.unwrap_or_default(),
            project_id,
            assignee_id,
        },
    )
    .await?;

    info!(ticket_id = %ticket.id, project_id = %project_id, "Ticket created");
    Ok(Json(ticket))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ticket>> {
    let ticket = load_ticket(&state, &auth, &id, ProjectAction::ViewTickets).await?;
    Ok(Json(ticket))
}

/// Update any subset of a ticket's fields
///
/// Status changes are unconstrained: any status may follow any other.
pub async fn update_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    let ticket = load_ticket(&state, &auth, &id, ProjectAction::EditTickets).await?;
    req.check_text()?;

    let assignee = match req.assignee {
        None => None,
        Some(raw) => Some(resolve_assignee(&state, ticket.project_id, raw.as_deref()).await?),
    };

    let update = UpdateTicket {
        title: present(req.title),
        description: req.description,
        priority: req.priority,
        status: req.status,
        assignee,
    };

    let Some(updated) = Ticket::update(&state.db, ticket.id, update).await? else {
        return Err(unwritten_update(&state, ticket.id).await);
    };

    info!(ticket_id = %updated.id, status = %updated.status, "Ticket updated");
    Ok(Json(updated))
}

/// Assign a ticket to a team member
pub async fn assign_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AssignRequest>,
) -> ApiResult<Json<Ticket>> {
    let ticket = load_ticket(&state, &auth, &id, ProjectAction::EditTickets).await?;

    let assignee_id = resolve_assignee(&state, ticket.project_id, Some(req.user_id.as_str()))
        .await?
        .ok_or_else(|| ApiError::BadRequest("User ID is required".to_string()))?;

    let Some(updated) = Ticket::assign(&state.db, ticket.id, assignee_id).await? else {
        return Err(unwritten_update(&state, ticket.id).await);
    };

    info!(ticket_id = %updated.id, assignee_id = %assignee_id, "Ticket assigned");
    Ok(Json(updated))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let ticket = load_ticket(&state, &auth, &id, ProjectAction::EditTickets).await?;

    if !Ticket::delete(&state.db, ticket.id).await? {
        return Err(ApiError::not_found("Ticket"));
    }

    info!(ticket_id = %ticket.id, "Ticket deleted");
    Ok(Json(MessageResponse::new("Ticket removed")))
}
