/// API route handlers, one module per resource
///
/// - `health`: Liveness and database connectivity
/// - `auth`: Registration, login and the caller's account
/// - `projects`: Projects and their teams
/// - `tickets`: Tickets within a project
/// - `comments`: Discussion on a ticket
/// - `users`: Role administration

pub mod auth;
pub mod comments;
pub mod health;
pub mod projects;
pub mod tickets;
pub mod users;
