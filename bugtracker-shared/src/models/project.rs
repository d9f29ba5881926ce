/// Project model and team membership
///
/// A project owns tickets and a team: the set of users allowed to read and
/// modify it. Membership is stored in `project_members`; every write that
/// touches both tables is a single statement so no request needs more than
/// one write.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE project_members (
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::UserSummary;

/// Stored project row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project with its team members populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub team_members: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectDetails {
    /// Whether the given user is on the team
    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.team_members.iter().any(|member| member.id == user_id)
    }
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub title: String,
    pub description: Option<String>,

    /// The creating user, added as the first team member
    pub creator_id: Uuid,
}

/// Partial project update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Outcome of removing a user from a project team
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRemoval {
    /// Member removed; `unassigned_tickets` of their tickets lost their assignee
    Removed { unassigned_tickets: u64 },

    /// The user wasn't on the team
    NotMember,

    /// The user is the only remaining member
    LastMember,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    project_id: Uuid,
    id: Uuid,
    name: String,
    email: String,
}

const PROJECT_COLUMNS: &str = "id, title, description, created_at, updated_at";

impl Project {
    /// Creates a project with its creator as the only team member
    ///
    /// Both rows are written by one statement, so the creator is a member
    /// exactly once and a project never exists without its team.
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            WITH new_project AS (
                INSERT INTO projects (title, description)
                VALUES ($1, $2)
                RETURNING id, title, description, created_at, updated_at
            ), creator AS (
                INSERT INTO project_members (project_id, user_id)
                SELECT id, $3 FROM new_project
            )
            SELECT id, title, description, created_at, updated_at FROM new_project
            "#,
        )
        .bind(data.title.trim())
        .bind(data.description)
        .bind(data.creator_id)
        .fetch_one(pool)
        .await
    }

    /// Finds a project by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists the projects a user is a team member of, ordered by title
    pub async fn list_for_member(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.title, p.description, p.created_at, p.updated_at
            FROM projects p
            JOIN project_members m ON m.project_id = p.id
            WHERE m.user_id = $1
            ORDER BY p.title ASC, p.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Applies a partial update
    ///
    /// Returns the updated project, or None if it doesn't exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE projects
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROJECT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(data.title.as_deref().map(str::trim))
            .bind(data.description)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a project; its tickets, comments and memberships cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Checks whether a user is on a project's team
    pub async fn is_member(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM project_members
                WHERE project_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Lists a project's team members in the order they joined
    pub async fn members(pool: &PgPool, project_id: Uuid) -> Result<Vec<UserSummary>, sqlx::Error> {
        sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.name, u.email
            FROM project_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = $1
            ORDER BY m.added_at ASC, u.name ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Adds a user to the team
    ///
    /// Returns false if the user was already a member.
    pub async fn add_member(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (project_id, user_id) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes a user from the team and unassigns their tickets in this project
    ///
    /// The last remaining member is never removed. Membership removal and
    /// ticket unassignment happen in the same statement, so no ticket is ever
    /// left assigned to someone outside the team.
    pub async fn remove_member(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<MemberRemoval, sqlx::Error> {
        let (was_member, member_count, removed, unassigned): (bool, i64, i64, i64) =
            sqlx::query_as(
                r#"
                WITH team AS (
                    SELECT user_id FROM project_members WHERE project_id = $1
                ), removed AS (
                    DELETE FROM project_members
                    WHERE project_id = $1 AND user_id = $2
                      AND (SELECT COUNT(*) FROM team) > 1
                    RETURNING user_id
                ), unassigned AS (
                    UPDATE tickets
                    SET assignee_id = NULL, updated_at = NOW()
                    WHERE project_id = $1
                      AND assignee_id IN (SELECT user_id FROM removed)
                    RETURNING id
                )
                SELECT
                    EXISTS (SELECT 1 FROM team WHERE user_id = $2),
                    (SELECT COUNT(*) FROM team),
                    (SELECT COUNT(*) FROM removed),
                    (SELECT COUNT(*) FROM unassigned)
                "#,
            )
            .bind(project_id)
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(classify_removal(was_member, member_count, removed, unassigned))
    }

    /// Loads the project together with its populated team
    pub async fn details(self, pool: &PgPool) -> Result<ProjectDetails, sqlx::Error> {
        let team_members = Project::members(pool, self.id).await?;
        Ok(self.with_members(team_members))
    }

    /// Loads populated teams for many projects with a single query
    pub async fn details_many(
        pool: &PgPool,
        projects: Vec<Project>,
    ) -> Result<Vec<ProjectDetails>, sqlx::Error> {
        let ids: Vec<Uuid> = projects.iter().map(|p| p.id).collect();

        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT m.project_id, u.id, u.name, u.email
            FROM project_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = ANY($1)
            ORDER BY m.added_at ASC, u.name ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(pool)
        .await?;

        Ok(projects
            .into_iter()
            .map(|project| {
                let team = rows
                    .iter()
                    .filter(|row| row.project_id == project.id)
                    .map(|row| UserSummary {
                        id: row.id,
                        name: row.name.clone(),
                        email: row.email.clone(),
                    })
                    .collect();
                project.with_members(team)
            })
            .collect())
    }

    fn with_members(self, team_members: Vec<UserSummary>) -> ProjectDetails {
        ProjectDetails {
            id: self.id,
            title: self.title,
            description: self.description,
            team_members,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn classify_removal(was_member: bool, member_count: i64, removed: i64, unassigned: i64) -> MemberRemoval {
    if !was_member {
        MemberRemoval::NotMember
    } else if removed == 0 && member_count <= 1 {
        MemberRemoval::LastMember
    } else {
        MemberRemoval::Removed {
            unassigned_tickets: unassigned.max(0) as u64,
        }
    }
}
