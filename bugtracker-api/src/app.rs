/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use bugtracker_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use bugtracker_shared::auth::middleware::{bearer_token, resolve_identity};
use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Lifetime of issued access tokens
    pub fn token_lifetime(&self) -> Duration {
        Duration::hours(self.config.jwt.expiration_hours)
    }
}

/// Builds the complete router
///
/// ```text
/// /api
/// ├── GET    /health
/// ├── /auth
/// │   ├── POST   /register
/// │   ├── POST   /login
/// │   ├── GET    /user              (auth)
/// │   └── DELETE /user              (auth)
/// ├── /projects                     (auth)
/// │   ├── GET, POST /
/// │   ├── GET, PUT, DELETE /:id
/// │   ├── POST   /:id/invite
/// │   └── DELETE /:id/members/:member_id
/// ├── /tickets                      (auth)
/// │   ├── GET, POST /
/// │   ├── GET, PUT, DELETE /:id
/// │   └── PUT    /:id/assign
/// ├── /comments                     (auth)
/// │   ├── GET, POST /
/// │   └── PUT, DELETE /:id
/// └── /users                        (auth, admin)
///     ├── GET    /
///     └── PUT    /:id/role
/// ```
pub fn build_router(state: AppState) -> Router {
    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route("/:id/invite", post(routes::projects::invite_member))
        .route(
            "/:id/members/:member_id",
            axum::routing::delete(routes::projects::remove_member),
        );

    let ticket_routes = Router::new()
        .route(
            "/",
            get(routes::tickets::list_tickets).post(routes::tickets::create_ticket),
        )
        .route(
            "/:id",
            get(routes::tickets::get_ticket)
                .put(routes::tickets::update_ticket)
                .delete(routes::tickets::delete_ticket),
        )
        .route("/:id/assign", put(routes::tickets::assign_ticket));

    let comment_routes = Router::new()
        .route(
            "/",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route(
            "/:id",
            put(routes::comments::update_comment).delete(routes::comments::delete_comment),
        );

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users))
        .route("/:id/role", put(routes::users::update_role));

    let protected_routes = Router::new()
        .route(
            "/auth/user",
            get(routes::auth::current_user).delete(routes::auth::delete_account),
        )
        .nest("/projects", project_routes)
        .nest("/tickets", ticket_routes)
        .nest("/comments", comment_routes)
        .nest("/users", user_routes)
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let api_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/auth", public_auth_routes)
        .merge(protected_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Resolves the bearer token to the caller and stores their `AuthContext`
/// in the request extensions
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let auth = resolve_identity(&state.db, state.jwt_secret(), token).await?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}
