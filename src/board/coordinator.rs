//! Move coordination: validate a drag-and-drop request against one board,
//! reconcile positions, persist them atomically and publish the outcome.

use std::sync::Arc;

use super::events::{CardMoved, EventSink, NullSink};
use super::models::{Board, BoardView, Card, CardView, ColumnView};
use super::reconcile::{MoveRequest, reconcile};
use super::store::{BoardStore, StoreResult};
use super::title::{EntityRegistry, EntityResolver, TitleResolver};
use crate::errors::KanbanError;

/// Collaborators injected into every board operation.
#[derive(Clone)]
pub struct BoardServices {
    pub events: Arc<dyn EventSink>,
    pub titles: TitleResolver,
}

impl BoardServices {
    pub fn new(
        events: Arc<dyn EventSink>,
        entities: Arc<dyn EntityResolver>,
        title_attribute: impl Into<String>,
    ) -> Self {
        Self {
            events,
            titles: TitleResolver::new(entities, title_attribute),
        }
    }

    /// No event delivery and an empty entity registry. Used by the CLI,
    /// where nobody listens for events.
    pub fn detached(title_attribute: impl Into<String>) -> Self {
        Self::new(
            Arc::new(NullSink),
            Arc::new(EntityRegistry::new()),
            title_attribute,
        )
    }
}

/// Result of a move request.
#[derive(Debug, Clone)]
pub enum MoveOutcome {
    /// The move was committed; carries the refreshed board.
    Moved(BoardView),
    /// The card belongs to another board. Nothing was written.
    Ignored,
}

/// Load a board with its columns and cards in display order, titles resolved.
pub fn load_board_view<S: BoardStore>(
    store: &S,
    board_id: i64,
    titles: &TitleResolver,
) -> StoreResult<BoardView> {
    let board = store
        .get_board(board_id)?
        .ok_or(KanbanError::BoardNotFound { id: board_id })?;

    let mut columns = Vec::new();
    for column in store.list_columns(board.id)? {
        let cards = store
            .list_cards(column.id)?
            .into_iter()
            .map(|card| CardView {
                title: titles.title_for(&card),
                card,
            })
            .collect();
        columns.push(ColumnView { column, cards });
    }

    Ok(BoardView { board, columns })
}

fn card_ids(cards: Vec<Card>) -> Vec<i64> {
    cards.into_iter().map(|c| c.id).collect()
}

/// Serves move requests for a single board.
pub struct MoveCoordinator<'a, S: BoardStore> {
    store: &'a S,
    board: Board,
    services: BoardServices,
}

impl<'a, S: BoardStore> MoveCoordinator<'a, S> {
    /// Bind a coordinator to `board_id`.
    pub fn mount(store: &'a S, board_id: i64, services: &BoardServices) -> StoreResult<Self> {
        let board = store
            .get_board(board_id)?
            .ok_or(KanbanError::BoardNotFound { id: board_id })?;
        Ok(Self {
            store,
            board,
            services: services.clone(),
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_view(&self) -> StoreResult<BoardView> {
        load_board_view(self.store, self.board.id, &self.services.titles)
    }

    /// Put `card_id` into `to_column` at `index`.
    ///
    /// `index` is clamped to the destination's bounds. A card from another
    /// board is ignored without touching storage. Every write happens in one
    /// transaction; the event is published only after it commits.
    pub fn move_card(&self, card_id: i64, to_column: i64, index: i64) -> StoreResult<MoveOutcome> {
        let board_id = self.board.id;

        let committed = self.store.transaction(|store| {
            let card = store
                .get_card(card_id)?
                .ok_or(KanbanError::CardNotFound { id: card_id })?;
            if card.board_id != board_id {
                return Ok(None);
            }

            let previous_column = store
                .get_column(card.column_id)?
                .ok_or(KanbanError::ColumnNotFound { id: card.column_id })?;
            let new_column = store
                .get_column(to_column)?
                .filter(|c| c.board_id == board_id)
                .ok_or(KanbanError::ColumnNotFound { id: to_column })?;

            let request = MoveRequest {
                card_id,
                from_column: previous_column.id,
                to_column: new_column.id,
                index,
            };
            let source = card_ids(store.list_cards(previous_column.id)?);
            let destination = if request.is_same_column() {
                source.clone()
            } else {
                card_ids(store.list_cards(new_column.id)?)
            };

            let plan = reconcile(&request, &source, &destination)
                .map_err(|e| KanbanError::Invariant(e.to_string()))?;

            for column in plan.writes() {
                let written = store.set_positions(column.column_id, &column.placements)?;
                if written != column.placements.len() {
                    return Err(KanbanError::ConstraintViolation(format!(
                        "column {} changed during move: expected {} rows, wrote {}",
                        column.column_id,
                        column.placements.len(),
                        written
                    )));
                }
            }

            let card = store
                .get_card(card_id)?
                .ok_or(KanbanError::CardNotFound { id: card_id })?;
            Ok(Some(CardMoved {
                card,
                previous_column,
                new_column,
            }))
        });

        let event = match committed {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!(board_id, card_id, "ignoring move of card from another board");
                return Ok(MoveOutcome::Ignored);
            }
            Err(KanbanError::ConstraintViolation(msg)) => {
                tracing::warn!(board_id, card_id, to_column, "move rolled back: {}", msg);
                return Err(KanbanError::ConstraintViolation(msg));
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            board_id,
            card_id,
            from_column = event.previous_column.id,
            to_column = event.new_column.id,
            position = event.card.position,
            "card moved"
        );
        self.services.events.card_moved(&event);

        Ok(MoveOutcome::Moved(self.board_view()?))
    }
}
