//! Creating and removing the card that stands for an external entity.

use super::models::{Card, EntityRef};
use super::reconcile::ColumnPlan;
use super::store::{BoardStore, StoreResult};
use crate::errors::KanbanError;

#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub board_id: i64,
    pub column_id: i64,
    pub entity: EntityRef,
}

/// Put a new card for `new.entity` at the top of a column.
///
/// Existing cards of the column shift down by one and the new card takes
/// position 0, all in one transaction.
pub fn attach_card<S: BoardStore>(store: &S, new: &NewCard) -> StoreResult<Card> {
    let card = store.transaction(|store| {
        store
            .get_board(new.board_id)?
            .ok_or(KanbanError::BoardNotFound { id: new.board_id })?;
        store
            .get_column(new.column_id)?
            .filter(|c| c.board_id == new.board_id)
            .ok_or(KanbanError::ColumnNotFound { id: new.column_id })?;

        store.shift_column(new.board_id, new.column_id)?;
        store.insert_card(new.board_id, new.column_id, 0, &new.entity)
    });

    match &card {
        Ok(card) => tracing::info!(
            board_id = card.board_id,
            column_id = card.column_id,
            card_id = card.id,
            entity = %card.entity,
            "card attached"
        ),
        Err(KanbanError::ConstraintViolation(msg)) => {
            tracing::warn!(board_id = new.board_id, entity = %new.entity, "attach rejected: {}", msg)
        }
        Err(_) => {}
    }
    card
}

/// The card attached to `entity` on a board, if any.
pub fn card_for_entity<S: BoardStore>(
    store: &S,
    board_id: i64,
    entity: &EntityRef,
) -> StoreResult<Option<Card>> {
    store.find_card_by_entity(board_id, entity)
}

/// Delete a card and close the gap it leaves in its column.
pub fn detach_card<S: BoardStore>(store: &S, card_id: i64) -> StoreResult<Card> {
    let card = store.transaction(|store| {
        let card = store
            .get_card(card_id)?
            .ok_or(KanbanError::CardNotFound { id: card_id })?;
        store.delete_card(card.id)?;

        let remaining: Vec<i64> = store
            .list_cards(card.column_id)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let plan = ColumnPlan::renumber(card.column_id, &remaining)
            .map_err(|e| KanbanError::Invariant(e.to_string()))?;
        let written = store.set_positions(card.column_id, &plan.placements)?;
        if written != plan.placements.len() {
            return Err(KanbanError::ConstraintViolation(format!(
                "column {} changed during detach: expected {} rows, wrote {}",
                card.column_id,
                plan.placements.len(),
                written
            )));
        }
        Ok(card)
    })?;

    tracing::info!(
        board_id = card.board_id,
        column_id = card.column_id,
        card_id = card.id,
        "card detached"
    );
    Ok(card)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::board::db::BoardDb;
    use crate::board::models::{Board, Column};
    use crate::board::store::testing::{Fault, FaultyStore};

    fn setup() -> Result<(BoardDb, Board, Column)> {
        let db = BoardDb::new_in_memory()?;
        let board = db.create_board("Main", None)?;
        let todo = db.create_column(board.id, "Todo", None)?;
        Ok((db, board, todo))
    }

    fn new_card(board: &Board, column: &Column, entity_id: i64) -> NewCard {
        NewCard {
            board_id: board.id,
            column_id: column.id,
            entity: EntityRef::new("task", entity_id),
        }
    }

    fn order(db: &BoardDb, column_id: i64) -> Result<Vec<(i64, i32)>> {
        Ok(db
            .list_cards(column_id)?
            .into_iter()
            .map(|c| (c.id, c.position))
            .collect())
    }

    #[test]
    fn test_attach_prepends_and_shifts() -> Result<()> {
        let (db, board, todo) = setup()?;

        let first = attach_card(&db, &new_card(&board, &todo, 1))?;
        assert_eq!(first.position, 0);

        let second = attach_card(&db, &new_card(&board, &todo, 2))?;
        let third = attach_card(&db, &new_card(&board, &todo, 3))?;

        assert_eq!(
            order(&db, todo.id)?,
            vec![(third.id, 0), (second.id, 1), (first.id, 2)]
        );
        Ok(())
    }

    #[test]
    fn test_attach_leaves_other_columns_alone() -> Result<()> {
        let (db, board, todo) = setup()?;
        let done = db.create_column(board.id, "Done", None)?;
        let parked = attach_card(&db, &new_card(&board, &done, 1))?;

        attach_card(&db, &new_card(&board, &todo, 2))?;
        assert_eq!(order(&db, done.id)?, vec![(parked.id, 0)]);
        Ok(())
    }

    #[test]
    fn test_attach_duplicate_entity_rolls_back() -> Result<()> {
        let (db, board, todo) = setup()?;
        let card = attach_card(&db, &new_card(&board, &todo, 1))?;

        let err = attach_card(&db, &new_card(&board, &todo, 1)).unwrap_err();
        assert!(matches!(err, KanbanError::ConstraintViolation(_)));
        assert_eq!(order(&db, todo.id)?, vec![(card.id, 0)]);
        Ok(())
    }

    #[test]
    fn test_attach_rejects_foreign_or_missing_column() -> Result<()> {
        let (db, board, _todo) = setup()?;
        let other = db.create_board("Other", None)?;
        let foreign = db.create_column(other.id, "Todo", None)?;

        let err = attach_card(&db, &new_card(&board, &foreign, 1)).unwrap_err();
        assert!(matches!(err, KanbanError::ColumnNotFound { id } if id == foreign.id));

        let err = attach_card(
            &db,
            &NewCard {
                board_id: board.id,
                column_id: 9999,
                entity: EntityRef::new("task", 1),
            },
        )
        .unwrap_err();
        assert!(matches!(err, KanbanError::ColumnNotFound { id: 9999 }));

        let err = attach_card(
            &db,
            &NewCard {
                board_id: 9999,
                column_id: foreign.id,
                entity: EntityRef::new("task", 1),
            },
        )
        .unwrap_err();
        assert!(matches!(err, KanbanError::BoardNotFound { id: 9999 }));
        Ok(())
    }

    #[test]
    fn test_card_for_entity() -> Result<()> {
        let (db, board, todo) = setup()?;
        let card = attach_card(&db, &new_card(&board, &todo, 7))?;

        let found = card_for_entity(&db, board.id, &EntityRef::new("task", 7))?;
        assert_eq!(found.map(|c| c.id), Some(card.id));
        assert!(card_for_entity(&db, board.id, &EntityRef::new("task", 8))?.is_none());
        Ok(())
    }

    #[test]
    fn test_detach_closes_gap() -> Result<()> {
        let (db, board, todo) = setup()?;
        let c = attach_card(&db, &new_card(&board, &todo, 3))?;
        let b = attach_card(&db, &new_card(&board, &todo, 2))?;
        let a = attach_card(&db, &new_card(&board, &todo, 1))?;

        let removed = detach_card(&db, b.id)?;
        assert_eq!(removed.id, b.id);
        assert_eq!(order(&db, todo.id)?, vec![(a.id, 0), (c.id, 1)]);
        assert!(db.get_card(b.id)?.is_none());

        let err = detach_card(&db, b.id).unwrap_err();
        assert!(matches!(err, KanbanError::CardNotFound { .. }));
        Ok(())
    }

    #[test]
    fn test_detach_short_write_rolls_back() -> Result<()> {
        let (db, board, todo) = setup()?;
        let b = attach_card(&db, &new_card(&board, &todo, 2))?;
        let a = attach_card(&db, &new_card(&board, &todo, 1))?;
        let store = FaultyStore::new(db, 1, Fault::ShortWrite);

        let err = detach_card(&store, a.id).unwrap_err();
        assert!(matches!(err, KanbanError::ConstraintViolation(_)));
        assert_eq!(store.calls(), 1);
        assert_eq!(order(&store.inner, todo.id)?, vec![(a.id, 0), (b.id, 1)]);
        Ok(())
    }

    #[test]
    fn test_detach_last_card_writes_nothing() -> Result<()> {
        let (db, board, todo) = setup()?;
        let only = attach_card(&db, &new_card(&board, &todo, 1))?;

        detach_card(&db, only.id)?;
        assert!(order(&db, todo.id)?.is_empty());
        Ok(())
    }
}
