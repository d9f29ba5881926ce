//! # Bug Tracker Client Library
//!
//! Everything a front end needs to talk to the bug tracker API.
//!
//! ## Modules
//!
//! - `api`: REST client and the `TrackerApi` trait
//! - `session`: Login session and token expiry
//! - `kanban`: Board grouped by status with optimistic moves
//! - `error`: Client error types
//!
//! ## Example
//!
//! ```no_run
//! use bugtracker_client::{api::HttpClient, kanban::KanbanBoard};
//! use bugtracker_shared::models::ticket::{TicketFilter, TicketStatus};
//!
//! # async fn example(project_id: uuid::Uuid, ticket_id: uuid::Uuid) -> Result<(), bugtracker_client::error::ClientError> {
//! let client = HttpClient::new("http://localhost:5000")?;
//! client.login("ada@example.com", "correct horse 42").await?;
//!
//! let mut board = KanbanBoard::load(&client, project_id, &TicketFilter::default()).await?;
//! board.move_ticket(&client, ticket_id, TicketStatus::Done).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod kanban;
pub mod session;

pub use api::{HttpClient, TrackerApi};
pub use error::{ClientError, ClientResult};
pub use kanban::{KanbanBoard, MoveOutcome, PendingMove};
pub use session::Session;
