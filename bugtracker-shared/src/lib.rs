//! # Bugtracker Shared Library
//!
//! This crate contains the domain types, store operations and security
//! primitives shared by the Bugtracker API server and its client library.
//!
//! ## Module Organization
//!
//! - `models`: Users, projects, tickets and comments with their database operations
//! - `auth`: Password hashing, JWT tokens, identity resolution and access-control checks
//! - `db`: Connection pool and migration runner

pub mod auth;
pub mod db;
pub mod models;

/// Current version of the Bugtracker shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
