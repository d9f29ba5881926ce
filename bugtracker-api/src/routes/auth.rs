/// Authentication endpoints
///
/// - `POST /api/auth/register` - Create an account and get a token
/// - `POST /api/auth/login` - Exchange credentials for a token
/// - `GET /api/auth/user` - The caller's profile
/// - `DELETE /api/auth/user` - Delete the caller's account

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{not_blank, ValidatedJson},
};
use axum::{extract::State, Extension, Json};
use bugtracker_shared::{
    auth::{
        issue_token,
        middleware::AuthContext,
        password::{hash_password, validate_password_strength, verify_password},
        AuthResponse,
    },
    models::{
        user::{AccountDeletion, CreateUser, User, UserProfile},
        MessageResponse,
    },
};
use serde::Deserialize;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        custom(function = "not_blank", message = "Name is required"),
        length(max = 100, message = "Name must be at most 100 characters")
    )]
    pub name: String,

    #[validate(email(message = "Please include a valid email"))]
    pub email: String,

    #[validate(custom(function = "password_rules"))]
    pub password: String,
}

fn password_rules(password: &str) -> Result<(), ValidationError> {
    validate_password_strength(password)
        .map_err(|message| ValidationError::new("password").with_message(message.into()))
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please include a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Register a new user
///
/// The first account on a fresh installation becomes `Admin`; every later
/// account starts as `Developer`.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or the email is already registered
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let password_hash = hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            name: req.name,
            email: req.email,
            password_hash,
        },
    )
    .await?;

    info!(user_id = %user.id, role = %user.role, "User registered");

    let response = issue_token(&user, state.jwt_secret(), state.token_lifetime())?;
    Ok(Json(response))
}

/// Log in with email and password
///
/// Unknown email and wrong password produce the same 401 so the response
/// doesn't reveal which accounts exist.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let Some(user) = User::find_by_email(&state.db, &req.email).await? else {
        warn!("Login attempt for unknown email");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "Login attempt with wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    info!(user_id = %user.id, "User logged in");

    let response = issue_token(&user, state.jwt_secret(), state.token_lifetime())?;
    Ok(Json(response))
}

/// Current user's profile
pub async fn current_user(Extension(auth): Extension<AuthContext>) -> Json<UserProfile> {
    Json(auth.user)
}

/// Delete the caller's account
///
/// Team memberships and authored comments go with it; tickets assigned to
/// the caller become unassigned. Projects the caller is the only member of
/// are deleted too.
///
/// # Errors
///
/// - `400`: The caller is the last Admin
/// - `404`: The account is already gone
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    match User::delete(&state.db, auth.user_id()).await? {
        AccountDeletion::Deleted { removed_projects } => {
            info!(user_id = %auth.user_id(), removed_projects, "Account deleted");
            Ok(Json(MessageResponse::new("User account deleted successfully")))
        }
        AccountDeletion::LastAdmin => Err(ApiError::BadRequest(
            "The last admin account cannot be deleted".to_string(),
        )),
        AccountDeletion::NotFound => Err(ApiError::not_found("User")),
    }
}
