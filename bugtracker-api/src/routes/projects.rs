/// Project and team endpoints
///
/// - `GET /api/projects` - Projects the caller is a team member of
/// - `POST /api/projects` - Create a project (creator joins its team)
/// - `GET|PUT|DELETE /api/projects/:id` - Team members only
/// - `POST /api/projects/:id/invite` - Add a user by email (team members only)
/// - `DELETE /api/projects/:id/members/:member_id` - Remove a member (Admin only)

use crate::{
    app::AppState,
    error::{parse_id, ApiError, ApiResult},
    extract::{check_optional_text, not_blank, ApiJson, ValidatedJson, MAX_TITLE_CHARS},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bugtracker_shared::{
    auth::{
        authorization::{authorize_project, require_project_creation, ProjectAction},
        middleware::AuthContext,
    },
    models::{
        project::{CreateProject, MemberRemoval, Project, ProjectDetails, UpdateProject},
        user::User,
        MessageResponse,
    },
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(
        custom(function = "not_blank", message = "Title is required"),
        length(max = 255, message = "Title must be at most 255 characters")
    )]
    pub title: String,

    pub description: Option<String>,
}

/// Project update; absent or empty fields keep their current value
#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UpdateProjectRequest {
    fn into_update(self) -> ApiResult<UpdateProject> {
        check_optional_text("title", self.title.as_deref(), Some(MAX_TITLE_CHARS))?;
        check_optional_text("description", self.description.as_deref(), None)?;

        Ok(UpdateProject {
            title: self.title.filter(|t| !t.trim().is_empty()),
            description: self.description.filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(custom(function = "not_blank", message = "User email is required"))]
    pub email: String,
}

/// Loads a project and checks the caller may perform `action` on it
async fn load_project(
    state: &AppState,
    auth: &AuthContext,
    raw_id: &str,
    action: ProjectAction,
) -> ApiResult<Project> {
    let id = parse_id(raw_id, "Project")?;

    let project = Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    authorize_project(&state.db, auth, project.id, action).await?;
    Ok(project)
}

/// List the caller's projects, ordered by title
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ProjectDetails>>> {
    let projects = Project::list_for_member(&state.db, auth.user_id()).await?;
    let details = Project::details_many(&state.db, projects).await?;
    Ok(Json(details))
}

/// Create a project
///
/// When project creation is restricted only admins may call this.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateProjectRequest>,
) -> ApiResult<Json<ProjectDetails>> {
    require_project_creation(&auth, state.config.policy.admin_only_project_creation)?;
    check_optional_text("description", req.description.as_deref(), None)?;

    let project = Project::create(
        &state.db,
        CreateProject {
            title: req.title,
            description: req.description,
            creator_id: auth.user_id(),
        },
    )
    .await?;

    info!(project_id = %project.id, user_id = %auth.user_id(), "Project created");
    Ok(Json(project.details(&state.db).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectDetails>> {
    let project = load_project(&state, &auth, &id, ProjectAction::View).await?;
    Ok(Json(project.details(&state.db).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectDetails>> {
    let project = load_project(&state, &auth, &id, ProjectAction::Edit).await?;

    let updated = Project::update(&state.db, project.id, req.into_update()?)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    info!(project_id = %updated.id, "Project updated");
    Ok(Json(updated.details(&state.db).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let project = load_project(&state, &auth, &id, ProjectAction::Delete).await?;

    if !Project::delete(&state.db, project.id).await? {
        return Err(ApiError::not_found("Project"));
    }

    info!(project_id = %project.id, "Project deleted");
    Ok(Json(MessageResponse::new("Project removed")))
}

/// Add a registered user to the team by email
///
/// # Errors
///
/// - `400`: Missing email, or the user is already a member
/// - `403`: Caller is not a team member
/// - `404`: Project or user not found
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<InviteRequest>,
) -> ApiResult<Json<ProjectDetails>> {
    let project = load_project(&state, &auth, &id, ProjectAction::Invite).await?;

    let invitee = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User with that email not found".to_string()))?;

    if !Project::add_member(&state.db, project.id, invitee.id).await? {
        return Err(ApiError::BadRequest("User is already a team member".to_string()));
    }

    info!(project_id = %project.id, user_id = %invitee.id, "Member invited");
    Ok(Json(project.details(&state.db).await?))
}

/// Remove a member from the team
///
/// Tickets in this project assigned to the removed member become
/// unassigned. The last remaining member can't be removed.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, member_id)): Path<(String, String)>,
) -> ApiResult<Json<ProjectDetails>> {
    let project = load_project(&state, &auth, &id, ProjectAction::RemoveMember).await?;
    let member_id: Uuid = parse_id(&member_id, "Team member")?;

    match Project::remove_member(&state.db, project.id, member_id).await? {
        MemberRemoval::Removed { unassigned_tickets } => {
            info!(
                project_id = %project.id,
                user_id = %member_id,
                unassigned_tickets,
                "Member removed"
            );
            Ok(Json(project.details(&state.db).await?))
        }
        MemberRemoval::NotMember => Err(ApiError::not_found("Team member")),
        MemberRemoval::LastMember => Err(ApiError::BadRequest(
            "Cannot remove the last member of a project".to_string(),
        )),
    }
}
