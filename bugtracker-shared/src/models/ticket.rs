/// Ticket model, lifecycle enums and filtered listing
///
/// Tickets belong to exactly one project. Status is a flat field: any team
/// member may move a ticket to any status, backwards included, so there is
/// no transition table here. Every read joins the assignee so callers always
/// receive the populated [`UserSummary`].
///
/// # Schema
///
/// ```sql
/// CREATE TYPE ticket_priority AS ENUM ('Low', 'Medium', 'High');
/// CREATE TYPE ticket_status AS ENUM ('To Do', 'In Progress', 'Done');
///
/// CREATE TABLE tickets (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     priority ticket_priority NOT NULL DEFAULT 'Low',
///     status ticket_status NOT NULL DEFAULT 'To Do',
///     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::user::UserSummary;

/// Ticket workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status")]
pub enum TicketStatus {
    #[default]
    #[serde(rename = "To Do")]
    #[sqlx(rename = "To Do")]
    ToDo,

    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,

    #[serde(rename = "Done")]
    #[sqlx(rename = "Done")]
    Done,
}

impl TicketStatus {
    /// Board column order
    pub const ALL: [TicketStatus; 3] = [TicketStatus::ToDo, TicketStatus::InProgress, TicketStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::ToDo => "To Do",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Done => "Done",
        }
    }
}

/// Ticket priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_priority")]
pub enum TicketPriority {
    #[default]
    Low,
    Medium,
    High,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 3] = [TicketPriority::Low, TicketPriority::Medium, TicketPriority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "Low",
            TicketPriority::Medium => "Medium",
            TicketPriority::High => "High",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status, priority or assignee filter can't be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTicketFieldError {
    #[error("Invalid status: {0}")]
    Status(String),

    #[error("Invalid priority: {0}")]
    Priority(String),

    #[error("Invalid assignee: {0}")]
    Assignee(String),
}

impl FromStr for TicketStatus {
    type Err = ParseTicketFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseTicketFieldError::Status(s.to_string()))
    }
}

impl FromStr for TicketPriority {
    type Err = ParseTicketFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketPriority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| ParseTicketFieldError::Priority(s.to_string()))
    }
}

/// Ticket with its assignee populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub assignee: Option<UserSummary>,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// ID of the assigned user, if any
    pub fn assignee_id(&self) -> Option<Uuid> {
        self.assignee.as_ref().map(|a| a.id)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    priority: TicketPriority,
    status: TicketStatus,
    assignee_id: Option<Uuid>,
    assignee_name: Option<String>,
    assignee_email: Option<String>,
    project_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        let assignee = match (row.assignee_id, row.assignee_name, row.assignee_email) {
            (Some(id), Some(name), Some(email)) => Some(UserSummary { id, name, email }),
            _ => None,
        };

        Ticket {
            id: row.id,
            title: row.title,
            description: row.description,
            priority: row.priority,
            status: row.status,
            assignee,
            project_id: row.project_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating a ticket
#[derive(Debug, Clone)]
pub struct CreateTicket {
    pub title: String,
    pub description: Option<String>,
    pub priority: TicketPriority,
    pub project_id: Uuid,
    pub assignee_id: Option<Uuid>,
}

/// Partial ticket update; `None` fields are left untouched
///
/// `assignee` distinguishes "leave as is" (`None`) from "clear"
/// (`Some(None)`) and "assign" (`Some(Some(id))`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateTicket {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub assignee: Option<Option<Uuid>>,
}

impl UpdateTicket {
    /// The assignee this update would set, if it sets one
    pub fn new_assignee(&self) -> Option<Uuid> {
        self.assignee.flatten()
    }
}

/// Assignee filter for ticket listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeFilter {
    /// Only tickets without an assignee
    Unassigned,

    /// Only tickets assigned to this user
    User(Uuid),
}

/// Query-string sentinel selecting unassigned tickets
pub const UNASSIGNED: &str = "unassigned";

impl FromStr for AssigneeFilter {
    type Err = ParseTicketFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == UNASSIGNED {
            return Ok(AssigneeFilter::Unassigned);
        }

        Uuid::parse_str(s)
            .map(AssigneeFilter::User)
            .map_err(|_| ParseTicketFieldError::Assignee(s.to_string()))
    }
}

impl fmt::Display for AssigneeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssigneeFilter::Unassigned => f.write_str(UNASSIGNED),
            AssigneeFilter::User(id) => write!(f, "{}", id),
        }
    }
}

/// Exact-match and keyword filters for listing a project's tickets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assignee: Option<AssigneeFilter>,

    /// Case-insensitive substring matched against title or description
    pub keyword: Option<String>,
}

impl TicketFilter {
    /// Query-string pairs for this filter (project id excluded)
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.to_string()));
        }
        if let Some(assignee) = self.assignee {
            pairs.push(("assignee", assignee.to_string()));
        }
        if let Some(keyword) = self.keyword.as_ref().filter(|k| !k.is_empty()) {
            pairs.push(("keyword", keyword.clone()));
        }
        pairs
    }
}

/// Escapes LIKE wildcards so a keyword only ever matches literally
pub fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const SELECT_TICKET: &str = r#"
    SELECT t.id, t.title, t.description, t.priority, t.status,
           t.assignee_id, u.name AS assignee_name, u.email AS assignee_email,
           t.project_id, t.created_at, t.updated_at
"#;

fn build_list_query(project_id: Uuid, filter: &TicketFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_TICKET);
    builder.push(" FROM tickets t LEFT JOIN users u ON u.id = t.assignee_id WHERE t.project_id = ");
    builder.push_bind(project_id);

    if let Some(status) = filter.status {
        builder.push(" AND t.status = ");
        builder.push_bind(status);
    }

    if let Some(priority) = filter.priority {
        builder.push(" AND t.priority = ");
        builder.push_bind(priority);
    }

    match filter.assignee {
        Some(AssigneeFilter::Unassigned) => {
            builder.push(" AND t.assignee_id IS NULL");
        }
        Some(AssigneeFilter::User(user_id)) => {
            builder.push(" AND t.assignee_id = ");
            builder.push_bind(user_id);
        }
        None => {}
    }

    if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
        let pattern = like_pattern(keyword);
        builder.push(" AND (t.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(r" ESCAPE '\' OR COALESCE(t.description, '') ILIKE ");
        builder.push_bind(pattern);
        builder.push(r" ESCAPE '\')");
    }

    builder.push(" ORDER BY t.created_at ASC, t.id ASC");
    builder
}

impl Ticket {
    /// Creates a ticket and returns it with its assignee populated
    pub async fn create(pool: &PgPool, data: CreateTicket) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            WITH t AS (
                INSERT INTO tickets (title, description, priority, project_id, assignee_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            {SELECT_TICKET}
            FROM t LEFT JOIN users u ON u.id = t.assignee_id
            "#
        );

        let row = sqlx::query_as::<_, TicketRow>(&query)
            .bind(data.title.trim())
            .bind(data.description)
            .bind(data.priority)
            .bind(data.project_id)
            .bind(data.assignee_id)
            .fetch_one(pool)
            .await?;

        Ok(row.into())
    }

    /// Finds a ticket by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "{SELECT_TICKET} FROM tickets t LEFT JOIN users u ON u.id = t.assignee_id WHERE t.id = $1"
        );

        let row = sqlx::query_as::<_, TicketRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Lists a project's tickets matching the filter, oldest first
    pub async fn list(
        pool: &PgPool,
        project_id: Uuid,
        filter: &TicketFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = build_list_query(project_id, filter);

        let rows = builder
            .build_query_as::<TicketRow>()
            .fetch_all(pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Applies a partial update
    ///
    /// A new assignee must be on the ticket's project team when the row is
    /// written. Returns None if the ticket doesn't exist or that check fails;
    /// callers tell the two apart with [`Ticket::find_by_id`].
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTicket,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            WITH t AS (
                UPDATE tickets
                SET title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    priority = COALESCE($4, priority),
                    status = COALESCE($5, status),
                    assignee_id = CASE WHEN $6 THEN $7 ELSE assignee_id END,
                    updated_at = NOW()
                WHERE id = $1
                  AND ($7::uuid IS NULL OR EXISTS (
                      SELECT 1 FROM project_members pm
                      WHERE pm.project_id = tickets.project_id AND pm.user_id = $7
                  ))
                RETURNING *
            )
            {SELECT_TICKET}
            FROM t LEFT JOIN users u ON u.id = t.assignee_id
            "#
        );

        let row = sqlx::query_as::<_, TicketRow>(&query)
            .bind(id)
            .bind(data.title.as_deref().map(str::trim))
            .bind(data.description)
            .bind(data.priority)
            .bind(data.status)
            .bind(data.assignee.is_some())
            .bind(data.assignee.flatten())
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Sets the assignee
    pub async fn assign(
        pool: &PgPool,
        id: Uuid,
        assignee_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        Ticket::update(
            pool,
            id,
            UpdateTicket {
                assignee: Some(Some(assignee_id)),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes a ticket; its comments cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&TicketStatus::ToDo).unwrap(), "\"To Do\"");
        assert_eq!(serde_json::to_string(&TicketStatus::InProgress).unwrap(), "\"In Progress\"");
        assert_eq!(
            serde_json::from_str::<TicketStatus>("\"Done\"").unwrap(),
            TicketStatus::Done
        );
        assert!(serde_json::from_str::<TicketStatus>("\"Closed\"").is_err());
    }

    #[test]
    fn test_status_and_priority_parse() {
        assert_eq!("In Progress".parse::<TicketStatus>(), Ok(TicketStatus::InProgress));
        assert_eq!("High".parse::<TicketPriority>(), Ok(TicketPriority::High));
        assert_eq!(
            "in progress".parse::<TicketStatus>(),
            Err(ParseTicketFieldError::Status("in progress".to_string()))
        );
        assert!("Urgent".parse::<TicketPriority>().is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(TicketStatus::default(), TicketStatus::ToDo);
        assert_eq!(TicketPriority::default(), TicketPriority::Low);
    }

    #[test]
    fn test_assignee_filter_parse() {
        assert_eq!("unassigned".parse::<AssigneeFilter>(), Ok(AssigneeFilter::Unassigned));

        let id = Uuid::new_v4();
        assert_eq!(id.to_string().parse::<AssigneeFilter>(), Ok(AssigneeFilter::User(id)));
        assert!("nobody".parse::<AssigneeFilter>().is_err());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("crash"), "%crash%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\"), "%c:\\\\%");
    }

    #[test]
    fn test_list_query_without_filters() {
        let builder = build_list_query(Uuid::new_v4(), &TicketFilter::default());
        let sql = builder.sql();

        assert!(sql.contains("WHERE t.project_id = $1"));
        assert!(!sql.contains("t.status ="));
        assert!(!sql.contains("ILIKE"));
        assert!(sql.trim_end().ends_with("ORDER BY t.created_at ASC, t.id ASC"));
    }

    #[test]
    fn test_list_query_with_all_filters() {
        let filter = TicketFilter {
            status: Some(TicketStatus::Done),
            priority: Some(TicketPriority::High),
            assignee: Some(AssigneeFilter::User(Uuid::new_v4())),
            keyword: Some("login".to_string()),
        };
        let builder = build_list_query(Uuid::new_v4(), &filter);
        let sql = builder.sql();

        assert!(sql.contains("t.status = $2"));
        assert!(sql.contains("t.priority = $3"));
        assert!(sql.contains("t.assignee_id = $4"));
        assert!(sql.contains("t.title ILIKE $5"));
        assert!(sql.contains("ILIKE $6"));
    }

    #[test]
    fn test_list_query_unassigned_binds_nothing() {
        let filter = TicketFilter {
            assignee: Some(AssigneeFilter::Unassigned),
            ..Default::default()
        };
        let builder = build_list_query(Uuid::new_v4(), &filter);

        assert!(builder.sql().contains("t.assignee_id IS NULL"));
        assert!(!builder.sql().contains("$2"));
    }

    #[test]
    fn test_filter_query_pairs() {
        let filter = TicketFilter {
            status: Some(TicketStatus::InProgress),
            assignee: Some(AssigneeFilter::Unassigned),
            keyword: Some(String::new()),
            ..Default::default()
        };

        assert_eq!(
            filter.to_query_pairs(),
            vec![
                ("status", "In Progress".to_string()),
                ("assignee", "unassigned".to_string()),
            ]
        );
    }

    #[test]
    fn test_ticket_serializes_camel_case() {
        let ticket = Ticket {
            id: Uuid::new_v4(),
            title: "Crash on save".to_string(),
            description: Some("Stack trace attached".to_string()),
            priority: TicketPriority::Medium,
            status: TicketStatus::InProgress,
            assignee: None,
            project_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["status"], "In Progress");
        assert_eq!(json["projectId"], ticket.project_id.to_string());
        assert!(json["assignee"].is_null());
        assert_eq!(ticket.assignee_id(), None);
    }

    #[test]
    fn test_row_without_joined_user_has_no_assignee() {
        let row = TicketRow {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            description: None,
            priority: TicketPriority::Low,
            status: TicketStatus::ToDo,
            assignee_id: None,
            assignee_name: None,
            assignee_email: None,
            project_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let ticket: Ticket = row.into();
        assert!(ticket.assignee.is_none());
    }
}
