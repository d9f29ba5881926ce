/// Ticket comments
///
/// A comment belongs to one ticket and one author. Only the author may edit
/// or delete it; that rule lives in the authorization layer, this module only
/// stores and loads rows with the author populated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::UserSummary;

/// Comment with its author populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user: UserSummary,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn author_id(&self) -> Uuid {
        self.user.id
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    ticket_id: Uuid,
    user_id: Uuid,
    user_name: String,
    user_email: String,
    text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            ticket_id: row.ticket_id,
            user: UserSummary {
                id: row.user_id,
                name: row.user_name,
                email: row.user_email,
            },
            text: row.text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating a comment
#[derive(Debug, Clone)]
pub struct CreateComment {
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
}

const SELECT_COMMENT: &str = r#"
    SELECT c.id, c.ticket_id, c.user_id, u.name AS user_name, u.email AS user_email,
           c.text, c.created_at, c.updated_at
"#;

impl Comment {
    /// Creates a comment and returns it with the author populated
    pub async fn create(pool: &PgPool, data: CreateComment) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            WITH c AS (
                INSERT INTO comments (ticket_id, user_id, text)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            {SELECT_COMMENT}
            FROM c JOIN users u ON u.id = c.user_id
            "#
        );

        let row = sqlx::query_as::<_, CommentRow>(&query)
            .bind(data.ticket_id)
            .bind(data.user_id)
            .bind(data.text.trim())
            .fetch_one(pool)
            .await?;

        Ok(row.into())
    }

    /// Finds a comment by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("{SELECT_COMMENT} FROM comments c JOIN users u ON u.id = c.user_id WHERE c.id = $1");

        let row = sqlx::query_as::<_, CommentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Lists a ticket's comments, oldest first
    pub async fn list_by_ticket(pool: &PgPool, ticket_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            {SELECT_COMMENT}
            FROM comments c JOIN users u ON u.id = c.user_id
            WHERE c.ticket_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#
        );

        let rows = sqlx::query_as::<_, CommentRow>(&query)
            .bind(ticket_id)
            .fetch_all(pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Replaces a comment's text
    ///
    /// Returns the updated comment, or None if it doesn't exist.
    pub async fn update_text(pool: &PgPool, id: Uuid, text: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            WITH c AS (
                UPDATE comments
                SET text = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            {SELECT_COMMENT}
            FROM c JOIN users u ON u.id = c.user_id
            "#
        );

        let row = sqlx::query_as::<_, CommentRow>(&query)
            .bind(id)
            .bind(text.trim())
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Deletes a comment
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
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
    fn test_row_populates_author() {
        let user_id = Uuid::new_v4();
        let row = CommentRow {
            id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            user_id,
            user_name: "Linus".to_string(),
            user_email: "linus@example.com".to_string(),
            text: "Reproduced on main".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let comment: Comment = row.into();
        assert_eq!(comment.author_id(), user_id);

        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["user"]["name"], "Linus");
        assert_eq!(json["ticketId"], comment.ticket_id.to_string());
        assert!(json.get("createdAt").is_some());
    }
}
