//! Notifications published after a committed card move.

use serde::{Deserialize, Serialize};

use super::models::{Card, Column};

/// A card changed place. Emitted once per committed move, never for an
/// ignored or rolled-back one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardMoved {
    /// The card as persisted after the move.
    pub card: Card,
    pub previous_column: Column,
    pub new_column: Column,
}

impl CardMoved {
    pub fn changed_column(&self) -> bool {
        self.previous_column.id != self.new_column.id
    }
}

/// Fire-and-forget receiver of board events. Implementations must not block
/// and must not fail the operation that emitted the event.
pub trait EventSink: Send + Sync {
    fn card_moved(&self, event: &CardMoved);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn card_moved(&self, event: &CardMoved) {
        tracing::trace!(card_id = event.card.id, "dropping card moved event");
    }
}
