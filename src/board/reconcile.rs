//! Position reconciliation for card moves.
//!
//! Given the ordered card ids of the source column and of the destination
//! column, plus the requested drop index, compute the final placement of every
//! card in the affected column(s). Every produced column is renumbered to a
//! dense `0..n-1` sequence in list order. This module performs no I/O.

use thiserror::Error;

/// A drag-and-drop instruction: put `card_id`, currently in `from_column`,
/// into `to_column` at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub card_id: i64,
    pub from_column: i64,
    pub to_column: i64,
    /// Requested slot in the destination list. Out-of-range values are
    /// clamped, never rejected.
    pub index: i64,
}

impl MoveRequest {
    pub fn is_same_column(&self) -> bool {
        self.from_column == self.to_column
    }
}

/// Final slot of one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub card_id: i64,
    pub column_id: i64,
    pub position: i32,
}

/// All placements for one column, in final order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub column_id: i64,
    pub placements: Vec<Placement>,
}

impl ColumnPlan {
    /// Number `card_ids` densely from 0 in list order.
    pub fn renumber(column_id: i64, card_ids: &[i64]) -> Result<Self, ReconcileError> {
        let placements = card_ids
            .iter()
            .enumerate()
            .map(|(i, &card_id)| {
                position_at(column_id, i, card_ids.len()).map(|position| Placement {
                    card_id,
                    column_id,
                    position,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            column_id,
            placements,
        })
    }

    pub fn card_ids(&self) -> Vec<i64> {
        self.placements.iter().map(|p| p.card_id).collect()
    }

    pub fn position_of(&self, card_id: i64) -> Option<i32> {
        self.placements
            .iter()
            .find(|p| p.card_id == card_id)
            .map(|p| p.position)
    }
}

/// Outcome of reconciling one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub card_id: i64,
    pub new_column: i64,
    /// The destination column, including the moved card.
    pub destination: ColumnPlan,
    /// The source column with the gap closed. `None` for same-column moves.
    pub source: Option<ColumnPlan>,
}

impl Reconciliation {
    /// Column writes in the order they must be persisted.
    ///
    /// The destination goes first: its write carries the moving card out of
    /// the source column, so the source renumbering can then reuse that slot.
    pub fn writes(&self) -> impl Iterator<Item = &ColumnPlan> {
        std::iter::once(&self.destination).chain(self.source.iter())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("card {card_id} is not in source column {column_id}")]
    CardNotInSource { card_id: i64, column_id: i64 },
    #[error("column {column_id} holds {len} cards, more than a position can number")]
    ColumnTooLong { column_id: i64, len: usize },
}

/// Slot `index` of a column of `len` cards as a stored position.
fn position_at(column_id: i64, index: usize, len: usize) -> Result<i32, ReconcileError> {
    i32::try_from(index).map_err(|_| ReconcileError::ColumnTooLong { column_id, len })
}

/// Clamp a requested index into `[0, len]`.
pub fn clamp_index(index: i64, len: usize) -> usize {
    if index <= 0 {
        return 0;
    }
    usize::try_from(index).map_or(len, |i| i.min(len))
}

/// Compute the placements for a move.
///
/// `source` and `destination` are the current card ids of each column ordered
/// by position. For a same-column move `destination` is ignored. A copy of the
/// moving card already sitting in a different destination list is dropped
/// before insertion.
pub fn reconcile(
    request: &MoveRequest,
    source: &[i64],
    destination: &[i64],
) -> Result<Reconciliation, ReconcileError> {
    let mut remaining = source.to_vec();
    let slot = remaining
        .iter()
        .position(|&id| id == request.card_id)
        .ok_or(ReconcileError::CardNotInSource {
            card_id: request.card_id,
            column_id: request.from_column,
        })?;
    remaining.remove(slot);

    if request.is_same_column() {
        let index = clamp_index(request.index, remaining.len());
        remaining.insert(index, request.card_id);
        return Ok(Reconciliation {
            card_id: request.card_id,
            new_column: request.from_column,
            destination: ColumnPlan::renumber(request.from_column, &remaining)?,
            source: None,
        });
    }

    let mut target: Vec<i64> = destination
        .iter()
        .copied()
        .filter(|&id| id != request.card_id)
        .collect();
    let index = clamp_index(request.index, target.len());
    target.insert(index, request.card_id);

    Ok(Reconciliation {
        card_id: request.card_id,
        new_column: request.to_column,
        destination: ColumnPlan::renumber(request.to_column, &target)?,
        source: Some(ColumnPlan::renumber(request.from_column, &remaining)?),
    })
}
