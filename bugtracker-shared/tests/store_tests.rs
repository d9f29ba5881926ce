/// Integration tests for the model store operations
///
/// These tests require a running PostgreSQL database and return early when
/// DATABASE_URL is not set. Every test creates its own users and projects
/// with unique emails, so they can share one database.

use bugtracker_shared::auth::authorization::{authorize_project, AuthzError, ProjectAction};
use bugtracker_shared::auth::middleware::AuthContext;
use bugtracker_shared::db::migrations::run_migrations;
use bugtracker_shared::db::pool::{create_pool, DatabaseConfig};
use bugtracker_shared::models::comment::{Comment, CreateComment};
use bugtracker_shared::models::project::{CreateProject, MemberRemoval, Project};
use bugtracker_shared::models::ticket::{
    AssigneeFilter, CreateTicket, Ticket, TicketFilter, TicketPriority, TicketStatus, UpdateTicket,
};
use bugtracker_shared::models::user::{AccountDeletion, CreateUser, User, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = create_pool(DatabaseConfig {
        url,
        max_connections: 5,
        ..Default::default()
    })
    .await
    .expect("Failed to create pool");

    run_migrations(&pool).await.expect("Migrations failed");
    Some(pool)
}

async fn new_user(pool: &PgPool, name: &str) -> User {
    User::create(
        pool,
        CreateUser {
            name: name.to_string(),
            email: format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4()),
            password_hash: "$argon2id$v=19$placeholder".to_string(),
        },
    )
    .await
    .expect("Failed to create user")
}

async fn new_project(pool: &PgPool, creator: &User) -> Project {
    Project::create(
        pool,
        CreateProject {
            title: format!("Project {}", Uuid::new_v4()),
            description: None,
            creator_id: creator.id,
        },
    )
    .await
    .expect("Failed to create project")
}

async fn new_ticket(pool: &PgPool, project: &Project, title: &str, assignee: Option<Uuid>) -> Ticket {
    Ticket::create(
        pool,
        CreateTicket {
            title: title.to_string(),
            description: None,
            priority: TicketPriority::default(),
            project_id: project.id,
            assignee_id: assignee,
        },
    )
    .await
    .expect("Failed to create ticket")
}

#[tokio::test]
async fn test_later_users_start_as_developer() {
    let Some(pool) = test_pool().await else { return };

    new_user(&pool, "Someone").await;
    let later = new_user(&pool, "Later").await;

    assert_eq!(later.role, UserRole::Developer);
}

#[tokio::test]
async fn test_email_lookup_is_case_insensitive_and_unique() {
    let Some(pool) = test_pool().await else { return };

    let user = new_user(&pool, "Case").await;
    let found = User::find_by_email(&pool, &user.email.to_uppercase())
        .await
        .unwrap()
        .expect("user should be found");
    assert_eq!(found.id, user.id);

    let duplicate = User::create(
        &pool,
        CreateUser {
            name: "Dup".to_string(),
            email: user.email.to_uppercase(),
            password_hash: "$argon2id$v=19$placeholder".to_string(),
        },
    )
    .await;

    let err = duplicate.expect_err("duplicate email must be rejected");
    let constraint = err.as_database_error().and_then(|e| e.constraint().map(str::to_string));
    assert_eq!(constraint.as_deref(), Some("users_email_key"));
}

#[tokio::test]
async fn test_creator_is_member_exactly_once() {
    let Some(pool) = test_pool().await else { return };

    let creator = new_user(&pool, "Creator").await;
    let project = new_project(&pool, &creator).await;

    let members = Project::members(&pool, project.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, creator.id);

    assert!(!Project::add_member(&pool, project.id, creator.id).await.unwrap());
    assert_eq!(Project::members(&pool, project.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_member_is_denied() {
    let Some(pool) = test_pool().await else { return };

    let creator = new_user(&pool, "Owner").await;
    let outsider = new_user(&pool, "Outsider").await;
    let project = new_project(&pool, &creator).await;

    let member_auth = AuthContext::new(creator.profile());
    let outsider_auth = AuthContext::new(outsider.profile());

    assert!(authorize_project(&pool, &member_auth, project.id, ProjectAction::View).await.is_ok());
    assert!(matches!(
        authorize_project(&pool, &outsider_auth, project.id, ProjectAction::ViewTickets).await,
        Err(AuthzError::NotTeamMember)
    ));
}

#[tokio::test]
async fn test_remove_member_unassigns_their_tickets() {
    let Some(pool) = test_pool().await else { return };

    let creator = new_user(&pool, "Lead").await;
    let dev = new_user(&pool, "Dev").await;
    let project = new_project(&pool, &creator).await;
    assert!(Project::add_member(&pool, project.id, dev.id).await.unwrap());

    let ticket = new_ticket(&pool, &project, "Flaky test", Some(dev.id)).await;
    assert_eq!(ticket.assignee_id(), Some(dev.id));

    let outcome = Project::remove_member(&pool, project.id, dev.id).await.unwrap();
    assert_eq!(outcome, MemberRemoval::Removed { unassigned_tickets: 1 });

    let reloaded = Ticket::find_by_id(&pool, ticket.id).await.unwrap().unwrap();
    assert!(reloaded.assignee.is_none());

    assert_eq!(
        Project::remove_member(&pool, project.id, dev.id).await.unwrap(),
        MemberRemoval::NotMember
    );
    assert_eq!(
        Project::remove_member(&pool, project.id, creator.id).await.unwrap(),
        MemberRemoval::LastMember
    );
}

#[tokio::test]
async fn test_ticket_filters() {
    let Some(pool) = test_pool().await else { return };

    let creator = new_user(&pool, "Filter").await;
    let project = new_project(&pool, &creator).await;

    let assigned = new_ticket(&pool, &project, "Login fails with 100% CPU", Some(creator.id)).await;
    let unassigned = new_ticket(&pool, &project, "Logout button misaligned", None).await;

    let only_unassigned = Ticket::list(
        &pool,
        project.id,
        &TicketFilter {
            assignee: Some(AssigneeFilter::Unassigned),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(only_unassigned.iter().map(|t| t.id).collect::<Vec<_>>(), vec![unassigned.id]);

    let by_keyword = Ticket::list(
        &pool,
        project.id,
        &TicketFilter {
            keyword: Some("LOG".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(
        by_keyword.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![assigned.id, unassigned.id]
    );

    let literal_percent = Ticket::list(
        &pool,
        project.id,
        &TicketFilter {
            keyword: Some("100%".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(literal_percent.len(), 1);
    assert_eq!(literal_percent[0].id, assigned.id);

    let by_status = Ticket::list(
        &pool,
        project.id,
        &TicketFilter {
            status: Some(TicketStatus::Done),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(by_status.is_empty());
}

#[tokio::test]
async fn test_ticket_update_round_trip() {
    let Some(pool) = test_pool().await else { return };

    let creator = new_user(&pool, "Round").await;
    let project = new_project(&pool, &creator).await;
    let ticket = new_ticket(&pool, &project, "Round trip", Some(creator.id)).await;

    let updated = Ticket::update(
        &pool,
        ticket.id,
        UpdateTicket {
            status: Some(TicketStatus::Done),
            priority: Some(TicketPriority::High),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(updated.status, TicketStatus::Done);
    assert_eq!(updated.priority, TicketPriority::High);
    assert_eq!(updated.assignee_id(), Some(creator.id));
    assert_eq!(updated.title, "Round trip");

    let back = Ticket::update(
        &pool,
        ticket.id,
        UpdateTicket {
            status: Some(TicketStatus::ToDo),
            assignee: Some(None),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(back.status, TicketStatus::ToDo);
    assert!(back.assignee.is_none());

    let fetched = Ticket::find_by_id(&pool, ticket.id).await.unwrap().unwrap();
    assert_eq!(fetched, back);
}

#[tokio::test]
async fn test_comments_ordered_and_cascade_with_ticket() {
    let Some(pool) = test_pool().await else { return };

    let author = new_user(&pool, "Author").await;
    let project = new_project(&pool, &author).await;
    let ticket = new_ticket(&pool, &project, "Discuss", None).await;

    let first = Comment::create(
        &pool,
        CreateComment {
            ticket_id: ticket.id,
            user_id: author.id,
            text: "first".to_string(),
        },
    )
    .await
    .unwrap();
    let second = Comment::create(
        &pool,
        CreateComment {
            ticket_id: ticket.id,
            user_id: author.id,
            text: "second".to_string(),
        },
    )
    .await
    .unwrap();

    let listed = Comment::list_by_ticket(&pool, ticket.id).await.unwrap();
    assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![first.id, second.id]);
    assert_eq!(listed[0].user.name, "Author");

    assert!(Ticket::delete(&pool, ticket.id).await.unwrap());
    assert!(Comment::find_by_id(&pool, first.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_registrations_make_at_most_one_admin() {
    let Some(pool) = test_pool().await else { return };

    let users = register_concurrently(&pool, 8).await;
    let admins = users.iter().filter(|u| u.role == UserRole::Admin).count();
    assert!(admins <= 1, "{} concurrent registrations became Admin", admins);
}

async fn register_concurrently(pool: &PgPool, count: usize) -> Vec<User> {
    let handles: Vec<_> = (0..count)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move { new_user(&pool, &format!("Racer{}", i)).await })
        })
        .collect();

    let mut users = Vec::with_capacity(count);
    for handle in handles {
        users.push(handle.await.expect("registration task panicked"));
    }
    users
}

#[tokio::test]
async fn test_account_deletion_takes_sole_member_projects() {
    let Some(pool) = test_pool().await else { return };

    let keeper = new_user(&pool, "Keeper").await;
    User::update_role(&pool, keeper.id, UserRole::Admin).await.unwrap().unwrap();

    let leaving = new_user(&pool, "Leaving").await;
    let teammate = new_user(&pool, "Teammate").await;

    let solo = new_project(&pool, &leaving).await;
    let shared = new_project(&pool, &leaving).await;
    assert!(Project::add_member(&pool, shared.id, teammate.id).await.unwrap());
    let ticket = new_ticket(&pool, &shared, "Handover", Some(leaving.id)).await;

    let outcome = User::delete(&pool, leaving.id).await.unwrap();
    assert_eq!(outcome, AccountDeletion::Deleted { removed_projects: 1 });

    assert!(Project::find_by_id(&pool, solo.id).await.unwrap().is_none());
    assert!(Project::find_by_id(&pool, shared.id).await.unwrap().is_some());
    assert!(!Project::is_member(&pool, shared.id, leaving.id).await.unwrap());
    assert!(Project::is_member(&pool, shared.id, teammate.id).await.unwrap());

    let reloaded = Ticket::find_by_id(&pool, ticket.id).await.unwrap().unwrap();
    assert!(reloaded.assignee.is_none());

    assert_eq!(
        User::delete(&pool, leaving.id).await.unwrap(),
        AccountDeletion::NotFound
    );
}

#[tokio::test]
async fn test_last_admin_cannot_delete_account() {
    let Some(pool) = test_pool().await else { return };

    let admin = new_user(&pool, "OnlyAdmin").await;
    User::update_role(&pool, admin.id, UserRole::Admin).await.unwrap().unwrap();
    let project = new_project(&pool, &admin).await;

    // Demote every other admin inside a transaction that is rolled back,
    // so tests sharing the database never see it.
    let mut tx = pool.begin().await.unwrap();
    sqlx::query("UPDATE users SET role = 'Developer' WHERE role = 'Admin' AND id <> $1")
        .bind(admin.id)
        .execute(&mut *tx)
        .await
        .unwrap();

    let outcome = User::delete(&mut *tx, admin.id).await.unwrap();
    assert_eq!(outcome, AccountDeletion::LastAdmin);

    let (still_there,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(admin.id)
        .fetch_one(&mut *tx)
        .await
        .unwrap();
    assert!(still_there);

    let (project_kept,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
            .bind(project.id)
            .fetch_one(&mut *tx)
            .await
            .unwrap();
    assert!(project_kept);

    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn test_update_refuses_assignee_outside_team() {
    let Some(pool) = test_pool().await else { return };

    let creator = new_user(&pool, "Owner").await;
    let outsider = new_user(&pool, "Outsider").await;
    let project = new_project(&pool, &creator).await;
    let ticket = new_ticket(&pool, &project, "Guarded", Some(creator.id)).await;

    let refused = Ticket::assign(&pool, ticket.id, outsider.id).await.unwrap();
    assert!(refused.is_none());

    let refused = Ticket::update(
        &pool,
        ticket.id,
        UpdateTicket {
            status: Some(TicketStatus::Done),
            assignee: Some(Some(outsider.id)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(refused.is_none());

    let unchanged = Ticket::find_by_id(&pool, ticket.id).await.unwrap().unwrap();
    assert_eq!(unchanged.assignee_id(), Some(creator.id));
    assert_eq!(unchanged.status, TicketStatus::ToDo);

    assert!(Project::add_member(&pool, project.id, outsider.id).await.unwrap());
    let assigned = Ticket::assign(&pool, ticket.id, outsider.id).await.unwrap().unwrap();
    assert_eq!(assigned.assignee_id(), Some(outsider.id));
}
