/// Health check endpoint
///
/// ```text
/// GET /api/health
/// ```
///
/// ```json
/// {
///   "message": "Server is running",
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected"
/// }
/// ```
///
/// Always answers 200; a lost database connection shows up as
/// `"status": "degraded"`.

use crate::app::AppState;
use axum::{extract::State, Json};
use bugtracker_shared::db::pool;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,

    /// `healthy` or `degraded`
    pub status: String,

    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match pool::health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };

    Json(HealthResponse {
        message: "Server is running".to_string(),
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
    })
}
