/// REST client for the bug tracker API
///
/// `HttpClient` wraps one method around each endpoint and keeps the login
/// session. Authenticated calls attach the session's bearer token; a 401 or
/// 403 answer clears the session.
///
/// # Example
///
/// ```no_run
/// use bugtracker_client::api::HttpClient;
/// use bugtracker_shared::models::ticket::TicketFilter;
///
/// # async fn example() -> Result<(), bugtracker_client::error::ClientError> {
/// let client = HttpClient::new("http://localhost:5000")?;
/// client.login("ada@example.com", "correct horse 42").await?;
///
/// for project in client.list_projects().await? {
///     let tickets = client.list_tickets(project.id, &TicketFilter::default()).await?;
///     println!("{}: {} tickets", project.title, tickets.len());
/// }
/// # Ok(())
/// # }
/// ```

use crate::{
    error::{ClientError, ClientResult},
    session::Session,
};
use async_trait::async_trait;
use bugtracker_shared::{
    auth::AuthResponse,
    models::{
        comment::Comment,
        project::ProjectDetails,
        ticket::{CreateTicket, Ticket, TicketFilter, TicketStatus, UpdateTicket},
        user::{UserProfile, UserRole},
        MessageResponse,
    },
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the Kanban board depends on
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Tickets of a project matching `filter`
    async fn list_tickets(&self, project_id: Uuid, filter: &TicketFilter) -> ClientResult<Vec<Ticket>>;

    /// Sets a ticket's status and returns the stored ticket
    async fn update_ticket_status(&self, ticket_id: Uuid, status: TicketStatus) -> ClientResult<Ticket>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// JSON body for a ticket update; `Some(None)` assignee is sent as `null`
pub fn update_body(update: &UpdateTicket) -> Value {
    let mut body = Map::new();
    if let Some(title) = &update.title {
        body.insert("title".into(), json!(title));
    }
    if let Some(description) = &update.description {
        body.insert("description".into(), json!(description));
    }
    if let Some(priority) = update.priority {
        body.insert("priority".into(), json!(priority));
    }
    if let Some(status) = update.status {
        body.insert("status".into(), json!(status));
    }
    if let Some(assignee) = update.assignee {
        body.insert("assignee".into(), json!(assignee));
    }
    Value::Object(body)
}

fn create_body(ticket: &CreateTicket) -> Value {
    json!({
        "title": ticket.title,
        "description": ticket.description,
        "priority": ticket.priority,
        "projectId": ticket.project_id,
        "assignee": ticket.assignee_id,
    })
}

#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Mutex<Session>>,
}

impl HttpClient {
    /// Creates an anonymous client for the server at `base_url`
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: Arc::new(Mutex::new(Session::Anonymous)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Builds a request carrying the session's bearer token
    async fn authorized(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.session.lock().await.token()?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(status = status.as_u16(), %message, "Request rejected, clearing session");
            self.session.lock().await.clear();
        } else {
            debug!(status = status.as_u16(), %message, "Request failed");
        }

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.authorized(Method::GET, path).await?;
        self.send(request).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.authorized(Method::DELETE, path).await?;
        self.send(request).await
    }

    async fn with_body<T: DeserializeOwned>(&self, method: Method, path: &str, body: Value) -> ClientResult<T> {
        let request = self.authorized(method, path).await?.json(&body);
        self.send(request).await
    }

    async fn authenticate(&self, path: &str, body: Value) -> ClientResult<UserProfile> {
        let request = self.http.post(self.url(path)).json(&body);
        let response: AuthResponse = self.send(request).await?;

        let user = response.user.clone();
        self.session.lock().await.login_from(response);
        Ok(user)
    }

    // Auth

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ClientResult<UserProfile> {
        self.authenticate(
            "/auth/register",
            json!({ "name": name, "email": email, "password": password }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserProfile> {
        self.authenticate("/auth/login", json!({ "email": email, "password": password }))
            .await
    }

    pub async fn logout(&self) {
        self.session.lock().await.clear();
    }

    pub async fn current_user(&self) -> ClientResult<UserProfile> {
        self.get("/auth/user").await
    }

    /// Deletes the logged-in account and ends the session
    pub async fn delete_account(&self) -> ClientResult<MessageResponse> {
        let response = self.delete("/auth/user").await?;
        self.session.lock().await.clear();
        Ok(response)
    }

    // Projects

    pub async fn list_projects(&self) -> ClientResult<Vec<ProjectDetails>> {
        self.get("/projects").await
    }

    pub async fn create_project(&self, title: &str, description: Option<&str>) -> ClientResult<ProjectDetails> {
        self.with_body(
            Method::POST,
            "/projects",
            json!({ "title": title, "description": description }),
        )
        .await
    }

    pub async fn get_project(&self, project_id: Uuid) -> ClientResult<ProjectDetails> {
        self.get(&format!("/projects/{}", project_id)).await
    }

    pub async fn update_project(
        &self,
        project_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
    ) -> ClientResult<ProjectDetails> {
        self.with_body(
            Method::PUT,
            &format!("/projects/{}", project_id),
            json!({ "title": title, "description": description }),
        )
        .await
    }

    pub async fn delete_project(&self, project_id: Uuid) -> ClientResult<MessageResponse> {
        self.delete(&format!("/projects/{}", project_id)).await
    }

    pub async fn invite_member(&self, project_id: Uuid, email: &str) -> ClientResult<ProjectDetails> {
        self.with_body(
            Method::POST,
            &format!("/projects/{}/invite", project_id),
            json!({ "email": email }),
        )
        .await
    }

    pub async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> ClientResult<ProjectDetails> {
        self.delete(&format!("/projects/{}/members/{}", project_id, user_id))
            .await
    }

    // Tickets

    pub async fn list_tickets(&self, project_id: Uuid, filter: &TicketFilter) -> ClientResult<Vec<Ticket>> {
        let request = self
            .authorized(Method::GET, "/tickets")
            .await?
            .query(&[("projectId", project_id.to_string())])
            .query(&filter.to_query_pairs());
        self.send(request).await
    }

    pub async fn create_ticket(&self, ticket: &CreateTicket) -> ClientResult<Ticket> {
        self.with_body(Method::POST, "/tickets", create_body(ticket)).await
    }

    pub async fn get_ticket(&self, ticket_id: Uuid) -> ClientResult<Ticket> {
        self.get(&format!("/tickets/{}", ticket_id)).await
    }

    pub async fn update_ticket(&self, ticket_id: Uuid, update: &UpdateTicket) -> ClientResult<Ticket> {
        self.with_body(Method::PUT, &format!("/tickets/{}", ticket_id), update_body(update))
            .await
    }

    pub async fn assign_ticket(&self, ticket_id: Uuid, user_id: Uuid) -> ClientResult<Ticket> {
        self.with_body(
            Method::PUT,
            &format!("/tickets/{}/assign", ticket_id),
            json!({ "userId": user_id }),
        )
        .await
    }

    pub async fn delete_ticket(&self, ticket_id: Uuid) -> ClientResult<MessageResponse> {
        self.delete(&format!("/tickets/{}", ticket_id)).await
    }

    // Comments

    pub async fn list_comments(&self, ticket_id: Uuid) -> ClientResult<Vec<Comment>> {
        let request = self
            .authorized(Method::GET, "/comments")
            .await?
            .query(&[("ticketId", ticket_id.to_string())]);
        self.send(request).await
    }

    pub async fn create_comment(&self, ticket_id: Uuid, text: &str) -> ClientResult<Comment> {
        self.with_body(
            Method::POST,
            "/comments",
            json!({ "ticketId": ticket_id, "text": text }),
        )
        .await
    }

    pub async fn update_comment(&self, comment_id: Uuid, text: &str) -> ClientResult<Comment> {
        self.with_body(
            Method::PUT,
            &format!("/comments/{}", comment_id),
            json!({ "text": text }),
        )
        .await
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> ClientResult<MessageResponse> {
        self.delete(&format!("/comments/{}", comment_id)).await
    }

    // Users

    pub async fn list_users(&self) -> ClientResult<Vec<UserProfile>> {
        self.get("/users").await
    }

    pub async fn update_role(&self, user_id: Uuid, role: UserRole) -> ClientResult<UserProfile> {
        self.with_body(
            Method::PUT,
            &format!("/users/{}/role", user_id),
            json!({ "role": role }),
        )
        .await
    }

    /// Server health; needs no session
    pub async fn health(&self) -> ClientResult<Value> {
        let request = self.http.get(self.url("/health"));
        self.send(request).await
    }
}

#[async_trait]
impl TrackerApi for HttpClient {
    async fn list_tickets(&self, project_id: Uuid, filter: &TicketFilter) -> ClientResult<Vec<Ticket>> {
        HttpClient::list_tickets(self, project_id, filter).await
    }

    async fn update_ticket_status(&self, ticket_id: Uuid, status: TicketStatus) -> ClientResult<Ticket> {
        let update = UpdateTicket {
            status: Some(status),
            ..Default::default()
        };
        self.update_ticket(ticket_id, &update).await
    }
}
