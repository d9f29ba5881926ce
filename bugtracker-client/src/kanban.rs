/// Kanban board state with optimistic moves
///
/// The board shows a project's tickets in three fixed columns, one per
/// status. Dragging a ticket to another column is a two-phase transition:
///
/// ```text
/// apply_move ──> PendingMove ──┬─> confirm_move (server ticket adopted)
///                              └─> revert_move  (previous status restored)
/// ```
///
/// While a move is pending the ticket already shows in its new column but
/// can't be moved again.

use crate::{
    api::TrackerApi,
    error::{ClientError, ClientResult},
};
use bugtracker_shared::models::ticket::{Ticket, TicketFilter, TicketStatus};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One board column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column<'a> {
    pub status: TicketStatus,
    pub tickets: Vec<&'a Ticket>,
}

/// A status change shown locally but not yet acknowledged by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMove {
    pub ticket_id: Uuid,
    pub from: TicketStatus,
    pub to: TicketStatus,
}

/// Result of `KanbanBoard::move_ticket`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Dropped onto its own column; nothing was sent
    Unchanged,

    /// The server stored the move
    Confirmed,

    /// The update failed and the ticket went back to its previous column
    Reverted { error: String },
}

#[derive(Debug, Clone, Default)]
pub struct KanbanBoard {
    project_id: Uuid,
    tickets: Vec<Ticket>,
    pending: HashMap<Uuid, PendingMove>,
    last_error: Option<String>,
}

impl KanbanBoard {
    pub fn new(project_id: Uuid, tickets: Vec<Ticket>) -> Self {
        Self {
            project_id,
            tickets,
            pending: HashMap::new(),
            last_error: None,
        }
    }

    /// Fetches a project's tickets and builds its board
    pub async fn load<A>(api: &A, project_id: Uuid, filter: &TicketFilter) -> ClientResult<Self>
    where
        A: TrackerApi + ?Sized,
    {
        let tickets = api.list_tickets(project_id, filter).await?;
        debug!(project_id = %project_id, count = tickets.len(), "Board loaded");
        Ok(Self::new(project_id, tickets))
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn ticket(&self, ticket_id: Uuid) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == ticket_id)
    }

    /// Tickets in the given column, in board order
    pub fn column(&self, status: TicketStatus) -> Vec<&Ticket> {
        self.tickets.iter().filter(|t| t.status == status).collect()
    }

    /// All columns: To Do, In Progress, Done
    pub fn columns(&self) -> Vec<Column<'_>> {
        TicketStatus::ALL
            .into_iter()
            .map(|status| Column {
                status,
                tickets: self.column(status),
            })
            .collect()
    }

    pub fn is_pending(&self, ticket_id: Uuid) -> bool {
        self.pending.contains_key(&ticket_id)
    }

    pub fn pending_move(&self, ticket_id: Uuid) -> Option<PendingMove> {
        self.pending.get(&ticket_id).copied()
    }

    /// Error of the most recent reverted move
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ticket_mut(&mut self, ticket_id: Uuid) -> Option<&mut Ticket> {
        self.tickets.iter_mut().find(|t| t.id == ticket_id)
    }

    /// Moves a ticket locally and records the move as pending
    ///
    /// Returns `None` when the ticket is already in `to`.
    ///
    /// # Errors
    ///
    /// `InvalidMove` if the ticket isn't on the board or already has a move
    /// in flight.
    pub fn apply_move(&mut self, ticket_id: Uuid, to: TicketStatus) -> ClientResult<Option<PendingMove>> {
        if self.is_pending(ticket_id) {
            return Err(ClientError::InvalidMove {
                ticket_id,
                reason: "a move is already in progress".to_string(),
            });
        }

        let ticket = self.ticket_mut(ticket_id).ok_or_else(|| ClientError::InvalidMove {
            ticket_id,
            reason: "ticket is not on this board".to_string(),
        })?;

        if ticket.status == to {
            return Ok(None);
        }

        let pending = PendingMove {
            ticket_id,
            from: ticket.status,
            to,
        };
        ticket.status = to;
        self.pending.insert(ticket_id, pending);

        Ok(Some(pending))
    }

    /// Settles a pending move with the ticket the server returned
    ///
    /// Returns false if no move was pending for that ticket.
    pub fn confirm_move(&mut self, ticket: Ticket) -> bool {
        if self.pending.remove(&ticket.id).is_none() {
            return false;
        }

        if let Some(local) = self.ticket_mut(ticket.id) {
            *local = ticket;
        }
        true
    }

    /// Undoes a pending move, restoring the ticket's previous status
    pub fn revert_move(&mut self, ticket_id: Uuid, error: impl Into<String>) -> bool {
        let Some(pending) = self.pending.remove(&ticket_id) else {
            return false;
        };

        if let Some(local) = self.ticket_mut(ticket_id) {
            local.status = pending.from;
        }
        self.last_error = Some(error.into());
        true
    }

    /// Drag-and-drop: moves locally, sends the update, then confirms or
    /// reverts depending on the answer
    ///
    /// # Errors
    ///
    /// Only `InvalidMove`; a failed update is reported as
    /// `MoveOutcome::Reverted`.
    pub async fn move_ticket<A>(&mut self, api: &A, ticket_id: Uuid, to: TicketStatus) -> ClientResult<MoveOutcome>
    where
        A: TrackerApi + ?Sized,
    {
        let Some(pending) = self.apply_move(ticket_id, to)? else {
            return Ok(MoveOutcome::Unchanged);
        };

        match api.update_ticket_status(ticket_id, to).await {
            Ok(ticket) => {
                info!(ticket_id = %ticket_id, from = %pending.from, to = %pending.to, "Ticket moved");
                self.confirm_move(ticket);
                self.last_error = None;
                Ok(MoveOutcome::Confirmed)
            }
            Err(e) => {
                warn!(ticket_id = %ticket_id, error = %e, "Ticket move failed, reverting");
                let error = e.to_string();
                self.revert_move(ticket_id, error.clone());
                Ok(MoveOutcome::Reverted { error })
            }
        }
    }
}
