/// Custom middleware for the API server
///
/// Authentication lives in `app.rs` because it needs the application state;
/// this module holds the stateless layers.

pub mod security;
