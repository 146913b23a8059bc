//! Storage seam for the board domain.
//!
//! The move coordinator and the card-creation helpers only talk to a
//! [`BoardStore`]. [`super::db::BoardDb`] is the SQLite implementation; tests
//! wrap it to inject failures.

use super::models::{Board, Card, Column, EntityRef};
use super::reconcile::Placement;
use crate::errors::KanbanError;

pub type StoreResult<T> = Result<T, KanbanError>;

pub trait BoardStore {
    /// Run `f` inside one write transaction. The transaction commits when `f`
    /// returns `Ok` and rolls back otherwise.
    fn transaction<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Self) -> StoreResult<R>;

    fn get_board(&self, id: i64) -> StoreResult<Option<Board>>;

    fn list_boards(&self) -> StoreResult<Vec<Board>>;

    fn get_column(&self, id: i64) -> StoreResult<Option<Column>>;

    /// Columns of a board ordered by position.
    fn list_columns(&self, board_id: i64) -> StoreResult<Vec<Column>>;

    fn get_card(&self, id: i64) -> StoreResult<Option<Card>>;

    /// Cards of a column ordered by position.
    fn list_cards(&self, column_id: i64) -> StoreResult<Vec<Card>>;

    fn find_card_by_entity(&self, board_id: i64, entity: &EntityRef)
    -> StoreResult<Option<Card>>;

    /// Apply a whole column's placements as one set-based update keyed by
    /// card id, moving every listed card into `column_id`. Returns the
    /// number of rows written.
    fn set_positions(&self, column_id: i64, placements: &[Placement]) -> StoreResult<usize>;

    /// Increment the position of every card in the (board, column) scope.
    fn shift_column(&self, board_id: i64, column_id: i64) -> StoreResult<usize>;

    fn insert_card(
        &self,
        board_id: i64,
        column_id: i64,
        position: i32,
        entity: &EntityRef,
    ) -> StoreResult<Card>;

    fn delete_card(&self, id: i64) -> StoreResult<bool>;
}
