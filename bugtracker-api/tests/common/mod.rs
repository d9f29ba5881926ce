/// Common test utilities for integration tests
///
/// Tests talk to the router in-process through `tower::ServiceExt::oneshot`.
/// They need a PostgreSQL database in `DATABASE_URL`; without one
/// `TestContext::new` returns `None` and the test returns early.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bugtracker_api::app::{build_router, AppState};
use bugtracker_api::config::Config;
use bugtracker_shared::db::migrations::run_migrations;
use bugtracker_shared::models::user::{User, UserRole};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-with-32-chars!!";
pub const TEST_PASSWORD: &str = "correct horse 42";

/// A registered user and their token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
}

impl TestContext {
    pub async fn new() -> Option<Self> {
        let database_url = std::env::var("DATABASE_URL").ok()?;

        let vars: HashMap<&str, String> = HashMap::from([
            ("DATABASE_URL", database_url),
            ("JWT_SECRET", TEST_SECRET.to_string()),
            ("ADMIN_ONLY_PROJECT_CREATION", "false".to_string()),
        ]);
        let config = Config::from_vars(|name| vars.get(name).cloned()).ok()?;

        let db = PgPool::connect(&config.database.url).await.ok()?;
        run_migrations(&db).await.ok()?;

        let app = build_router(AppState::new(db.clone(), config));
        Some(Self { db, app })
    }

    /// Sends a request and returns the status with the decoded JSON body
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    /// Registers a fresh user with a unique email
    pub async fn register(&self, name: &str) -> TestUser {
        let email = format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4());

        let (status, body) = self
            .request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": TEST_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);

        TestUser {
            id: body["user"]["id"].as_str().unwrap().to_string(),
            email,
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Registers a user and promotes them to Admin
    pub async fn register_admin(&self, name: &str) -> TestUser {
        let user = self.register(name).await;
        User::update_role(&self.db, user.id.parse().unwrap(), UserRole::Admin)
            .await
            .unwrap()
            .unwrap();
        user
    }

    /// Creates a project owned by `owner` and returns its ID
    pub async fn create_project(&self, owner: &TestUser, title: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/api/projects",
                Some(&owner.token),
                Some(json!({ "title": title })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create project failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn invite(&self, inviter: &TestUser, project_id: &str, invitee: &TestUser) {
        let (status, body) = self
            .request(
                "POST",
                &format!("/api/projects/{}/invite", project_id),
                Some(&inviter.token),
                Some(json!({ "email": invitee.email })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "invite failed: {}", body);
    }

    /// Creates a ticket and returns its JSON
    pub async fn create_ticket(&self, user: &TestUser, project_id: &str, body: Value) -> Value {
        let mut body = body;
        body["projectId"] = json!(project_id);

        let (status, body) = self
            .request("POST", "/api/tickets", Some(&user.token), Some(body))
            .await;
        assert_eq!(status, StatusCode::OK, "create ticket failed: {}", body);
        body
    }
}
