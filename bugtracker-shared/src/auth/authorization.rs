/// Access-control checks
///
/// Two independent axes decide what a caller may do:
///
/// - **Team membership** gates everything inside a project: viewing and
///   editing the project, its tickets and their comments.
/// - **Global role** gates administration: user management, removing team
///   members and, when restricted, creating projects.
///
/// Comment edits additionally require authorship. Every check here either
/// passes or returns an [`AuthzError`] that the API maps to 403 (or 400 for an
/// invalid assignee).
///
/// # Example
///
/// ```no_run
/// use bugtracker_shared::auth::authorization::{authorize_project, ProjectAction};
/// use bugtracker_shared::auth::middleware::AuthContext;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, auth: AuthContext, project_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// authorize_project(&pool, &auth, project_id, ProjectAction::EditTickets).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::comment::Comment;
use crate::models::project::Project;
use crate::models::user::UserRole;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("User is not a member of this project")]
    NotTeamMember,

    #[error("Requires {0} role")]
    RoleRequired(UserRole),

    #[error("Only the author can modify this comment")]
    NotAuthor,

    #[error("Assignee must be a member of the project team")]
    AssigneeNotMember,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Operations performed on or inside a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    View,
    Edit,
    Delete,
    Invite,
    RemoveMember,
    ViewTickets,
    EditTickets,
    Comment,
}

/// What a [`ProjectAction`] demands of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Caller must be on the project team
    TeamMember,

    /// Caller must hold the given global role; membership is not needed
    Role(UserRole),
}

impl ProjectAction {
    pub fn requirement(&self) -> Requirement {
        match self {
            ProjectAction::View
            | ProjectAction::Edit
            | ProjectAction::Delete
            | ProjectAction::Invite
            | ProjectAction::ViewTickets
            | ProjectAction::EditTickets
            | ProjectAction::Comment => Requirement::TeamMember,
            ProjectAction::RemoveMember => Requirement::Role(UserRole::Admin),
        }
    }
}

/// Checks the caller may perform `action` on the project
pub async fn authorize_project(
    pool: &PgPool,
    auth: &AuthContext,
    project_id: Uuid,
    action: ProjectAction,
) -> Result<(), AuthzError> {
    match action.requirement() {
        Requirement::TeamMember => {
            if !Project::is_member(pool, project_id, auth.user_id()).await? {
                return Err(AuthzError::NotTeamMember);
            }
            Ok(())
        }
        Requirement::Role(role) => require_role(auth, role),
    }
}

/// Checks the caller holds `role`
pub fn require_role(auth: &AuthContext, role: UserRole) -> Result<(), AuthzError> {
    if auth.role() != role {
        return Err(AuthzError::RoleRequired(role));
    }
    Ok(())
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if !auth.role().can_manage_users() {
        return Err(AuthzError::RoleRequired(UserRole::Admin));
    }
    Ok(())
}

/// Checks the caller may create projects under the configured policy
pub fn require_project_creation(auth: &AuthContext, admin_only: bool) -> Result<(), AuthzError> {
    if admin_only && !auth.role().can_create_projects() {
        return Err(AuthzError::RoleRequired(UserRole::Admin));
    }
    Ok(())
}

/// Checks the caller wrote the comment
pub fn require_author(auth: &AuthContext, comment: &Comment) -> Result<(), AuthzError> {
    if comment.author_id() != auth.user_id() {
        return Err(AuthzError::NotAuthor);
    }
    Ok(())
}

/// Checks a prospective assignee is on the project team
pub async fn require_assignable(
    pool: &PgPool,
    project_id: Uuid,
    assignee_id: Uuid,
) -> Result<(), AuthzError> {
    if !Project::is_member(pool, project_id, assignee_id).await? {
        return Err(AuthzError::AssigneeNotMember);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{UserProfile, UserSummary};
    use chrono::Utc;

    fn context(role: UserRole) -> AuthContext {
        AuthContext::new(UserProfile {
            id: Uuid::new_v4(),
            name: "Caller".to_string(),
            email: "caller@example.com".to_string(),
            role,
            created_at: Utc::now(),
        })
    }

    fn comment_by(author: Uuid) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            user: UserSummary {
                id: author,
                name: "Author".to_string(),
                email: "author@example.com".to_string(),
            },
            text: "LGTM".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_action_requirements() {
        assert_eq!(ProjectAction::View.requirement(), Requirement::TeamMember);
        assert_eq!(ProjectAction::Invite.requirement(), Requirement::TeamMember);
        assert_eq!(ProjectAction::Comment.requirement(), Requirement::TeamMember);
        assert_eq!(
            ProjectAction::RemoveMember.requirement(),
            Requirement::Role(UserRole::Admin)
        );
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&context(UserRole::Admin)).is_ok());
        assert!(matches!(
            require_admin(&context(UserRole::Developer)),
            Err(AuthzError::RoleRequired(UserRole::Admin))
        ));
        assert!(require_admin(&context(UserRole::Submitter)).is_err());
    }

    #[test]
    fn test_require_project_creation() {
        assert!(require_project_creation(&context(UserRole::Admin), true).is_ok());
        assert!(require_project_creation(&context(UserRole::Developer), true).is_err());
        assert!(require_project_creation(&context(UserRole::Submitter), false).is_ok());
    }

    #[test]
    fn test_require_author() {
        let auth = context(UserRole::Admin);

        assert!(require_author(&auth, &comment_by(auth.user_id())).is_ok());
        assert!(matches!(
            require_author(&auth, &comment_by(Uuid::new_v4())),
            Err(AuthzError::NotAuthor)
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(AuthzError::RoleRequired(UserRole::Admin).to_string(), "Requires Admin role");
        assert!(AuthzError::NotTeamMember.to_string().contains("not a member"));
    }
}
