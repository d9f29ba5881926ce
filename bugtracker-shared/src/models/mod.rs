/// Database models for the bug tracker
///
/// Each model owns its SQL. Types that leave the server (`UserProfile`,
/// `ProjectDetails`, `Ticket`, `Comment`) serialize to the camelCase wire
/// format, so the client crate deserializes the exact same structs.
///
/// # Models
///
/// - `user`: Accounts and global roles
/// - `project`: Projects and team membership
/// - `ticket`: Tickets, status/priority and filtered listing
/// - `comment`: Ticket discussion
///
/// # Example
///
/// ```no_run
/// use bugtracker_shared::models::project::{CreateProject, Project};
/// use bugtracker_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(creator: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let project = Project::create(&pool, CreateProject {
///     title: "Website".to_string(),
///     description: None,
///     creator_id: creator,
/// }).await?;
///
/// let details = project.details(&pool).await?;
/// assert!(details.has_member(creator));
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};

pub mod comment;
pub mod project;
pub mod ticket;
pub mod user;

/// Plain acknowledgement body (`{"message": "..."}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
