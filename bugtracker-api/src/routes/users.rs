/// User administration endpoints (Admin only)
///
/// - `GET /api/users` - Every account
/// - `PUT /api/users/:id/role` - Change an account's role

use crate::{
    app::AppState,
    error::{parse_id, ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bugtracker_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::user::{ParseRoleError, User, UserProfile, UserRole},
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    /// Role name; validated against the closed role set
    pub role: String,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    require_admin(&auth)?;

    let users = User::list(&state.db).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// Change a user's role
///
/// # Errors
///
/// - `400`: Unknown role, or an admin changing their own role
/// - `403`: Caller is not an admin
/// - `404`: User not found
pub async fn update_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Json<UserProfile>> {
    require_admin(&auth)?;

    let user_id = parse_id(&id, "User")?;
    let role: UserRole = req
        .role
        .parse()
        .map_err(|e: ParseRoleError| ApiError::BadRequest(e.to_string()))?;

    if user_id == auth.user_id() {
        return Err(ApiError::BadRequest("Admins cannot change their own role".to_string()));
    }

    let user = User::update_role(&state.db, user_id, role)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    info!(user_id = %user.id, role = %role, changed_by = %auth.user_id(), "User role changed");
    Ok(Json(user.into()))
}
