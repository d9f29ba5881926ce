/// User model and database operations
///
/// Accounts carry a single global role. The stored record includes the
/// Argon2id password hash and is never serialized directly; everything that
/// leaves the server goes through [`UserProfile`] or [`UserSummary`].
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('Admin', 'Developer', 'Submitter');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(320) NOT NULL,          -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'Developer',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use bugtracker_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     name: "Ada".to_string(),
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ADA@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Global account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum UserRole {
    /// Manages users, roles, projects and team membership
    Admin,

    /// Works tickets on the projects they belong to
    Developer,

    /// Reports tickets on the projects they belong to
    Submitter,
}

impl UserRole {
    /// All roles, in display order
    pub const ALL: [UserRole; 3] = [UserRole::Admin, UserRole::Developer, UserRole::Submitter];

    /// Converts role to its wire/database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Developer => "Developer",
            UserRole::Submitter => "Submitter",
        }
    }

    /// Can list users and change their roles
    pub fn can_manage_users(&self) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::Developer | UserRole::Submitter => false,
        }
    }

    /// Can remove members from a project team
    pub fn can_manage_teams(&self) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::Developer | UserRole::Submitter => false,
        }
    }

    /// Can create projects when project creation is restricted
    pub fn can_create_projects(&self) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::Developer | UserRole::Submitter => false,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for UserRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}

/// Stored user account (includes the password hash)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address, stored lower-cased
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// Global role
    pub role: UserRole,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Public view of an account: everything but the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Minimal user reference embedded in projects, tickets and comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Display name
    pub name: String,

    /// Email address (normalized to lowercase on insert)
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,
}

/// Outcome of deleting an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountDeletion {
    /// Account deleted along with `removed_projects` it was the only member of
    Deleted { removed_projects: u64 },

    /// No such user
    NotFound,

    /// The user is the only remaining Admin
    LastAdmin,
}

/// Serializes registrations so only one can see an empty `users` table
const REGISTRATION_LOCK: i64 = 0x6275_6774_7261_636b;

/// Normalizes an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

impl User {
    /// Creates a new user
    ///
    /// The first account ever registered becomes `Admin` so the installation
    /// always has someone able to manage roles; every later account starts as
    /// `Developer`. The role is decided inside the INSERT, which runs under
    /// a transaction-scoped advisory lock so concurrent first registrations
    /// can't both become `Admin`.
    ///
    /// # Errors
    ///
    /// Returns a database error carrying the `users_email_key` constraint if
    /// the email is already registered.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES (
                $1, $2, $3,
                CASE WHEN EXISTS (SELECT 1 FROM users)
                     THEN 'Developer'::user_role
                     ELSE 'Admin'::user_role
                END
            )
            RETURNING {USER_COLUMNS}
            "#
        );

        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(REGISTRATION_LOCK)
            .execute(&mut *tx)
            .await?;

        let user = sqlx::query_as::<_, User>(&query)
            .bind(data.name.trim())
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Lists every user, oldest account first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, name ASC");

        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }

    /// Changes a user's role
    ///
    /// Returns the updated user, or None if the user doesn't exist.
    pub async fn update_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a user account
    ///
    /// Team memberships and authored comments cascade; tickets assigned to
    /// the user become unassigned (`ON DELETE SET NULL`). Projects whose only
    /// member is this user are deleted in the same statement, so no project
    /// is left without a team. The last Admin can't be deleted; deleting an
    /// Admin locks every Admin row so two admins leaving at once can't both
    /// succeed.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<AccountDeletion, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (found, last_admin, deleted, removed_projects): (bool, bool, i64, i64) =
            sqlx::query_as(
                r#"
                WITH target AS (
                    SELECT id, role FROM users WHERE id = $1
                ), admins AS (
                    SELECT id FROM users
                    WHERE role = 'Admin'
                      AND EXISTS (SELECT 1 FROM target WHERE role = 'Admin')
                    FOR UPDATE
                ), guard AS (
                    SELECT EXISTS (SELECT 1 FROM target WHERE role = 'Admin')
                           AND (SELECT COUNT(*) FROM admins) <= 1 AS last_admin
                ), orphaned AS (
                    DELETE FROM projects p
                    WHERE NOT (SELECT last_admin FROM guard)
                      AND EXISTS (
                          SELECT 1 FROM project_members m
                          WHERE m.project_id = p.id AND m.user_id = $1
                      )
                      AND NOT EXISTS (
                          SELECT 1 FROM project_members m
                          WHERE m.project_id = p.id AND m.user_id <> $1
                      )
                    RETURNING p.id
                ), deleted AS (
                    DELETE FROM users
                    WHERE id IN (SELECT id FROM target)
                      AND NOT (SELECT last_admin FROM guard)
                    RETURNING id
                )
                SELECT
                    EXISTS (SELECT 1 FROM target),
                    (SELECT last_admin FROM guard),
                    (SELECT COUNT(*) FROM deleted),
                    (SELECT COUNT(*) FROM orphaned)
                "#,
            )
            .bind(id)
            .fetch_one(executor)
            .await?;

        Ok(classify_deletion(found, last_admin, deleted, removed_projects))
    }

    /// Returns the public profile of this user
    pub fn profile(&self) -> UserProfile {
        self.clone().into()
    }

    /// Returns the embedded reference form of this user
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

fn classify_deletion(found: bool, last_admin: bool, deleted: i64, removed_projects: i64) -> AccountDeletion {
    if !found {
        AccountDeletion::NotFound
    } else if last_admin {
        AccountDeletion::LastAdmin
    } else if deleted == 0 {
        AccountDeletion::NotFound
    } else {
        AccountDeletion::Deleted {
            removed_projects: removed_projects.max(0) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_deletion() {
        assert_eq!(classify_deletion(false, false, 0, 0), AccountDeletion::NotFound);
        assert_eq!(classify_deletion(true, true, 0, 0), AccountDeletion::LastAdmin);
        assert_eq!(classify_deletion(true, false, 0, 0), AccountDeletion::NotFound);
        assert_eq!(
            classify_deletion(true, false, 1, 2),
            AccountDeletion::Deleted { removed_projects: 2 }
        );
    }

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: UserRole::Developer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<UserRole>(), Ok(UserRole::Admin));
        assert_eq!("Developer".parse::<UserRole>(), Ok(UserRole::Developer));
        assert_eq!("Submitter".parse::<UserRole>(), Ok(UserRole::Submitter));
        assert!("admin".parse::<UserRole>().is_err());
        assert!("Owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_permissions() {
        assert!(UserRole::Admin.can_manage_users());
        assert!(UserRole::Admin.can_manage_teams());
        assert!(!UserRole::Developer.can_manage_users());
        assert!(!UserRole::Submitter.can_create_projects());
    }

    #[test]
    fn test_role_serializes_as_display_name() {
        let json = serde_json::to_string(&UserRole::Submitter).unwrap();
        assert_eq!(json, "\"Submitter\"");
    }

    #[test]
    fn test_profile_never_contains_password() {
        let user = sample_user();
        let json = serde_json::to_value(user.profile()).unwrap();

        assert_eq!(json["email"], "grace@example.com");
        assert_eq!(json["role"], "Developer");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2id"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Mixed.Case@Example.COM "), "mixed.case@example.com");
    }
}
