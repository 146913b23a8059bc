use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};

use super::models::*;
use super::reconcile::Placement;
use super::store::{BoardStore, StoreResult};
use crate::errors::KanbanError;

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn run<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&BoardDb) -> StoreResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| KanbanError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct BoardDb {
    conn: Connection,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.conn
            .busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set busy timeout")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS boards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS board_columns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                color TEXT NOT NULL DEFAULT '#000',
                position INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                column_id INTEGER NOT NULL REFERENCES board_columns(id) ON DELETE CASCADE,
                board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (board_id, entity_type, entity_id),
                UNIQUE (column_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_board_columns_board_position ON board_columns(board_id, position);
            CREATE INDEX IF NOT EXISTS idx_cards_column ON cards(column_id);
            ",
        )?;

        Ok(())
    }

    // ── Board CRUD ────────────────────────────────────────────────────

    pub fn create_board(&self, name: &str, description: Option<&str>) -> Result<Board> {
        self.conn
            .execute(
                "INSERT INTO boards (name, description) VALUES (?1, ?2)",
                params![name, description],
            )
            .context("Failed to insert board")?;
        let id = self.conn.last_insert_rowid();
        self.get_board(id)?.context("Board not found after insert")
    }

    pub fn list_boards(&self) -> Result<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, created_at, updated_at FROM boards ORDER BY id")
            .context("Failed to prepare list_boards")?;
        let rows = stmt
            .query_map([], board_from_row)
            .context("Failed to query boards")?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row.context("Failed to read board row")?);
        }
        Ok(boards)
    }

    pub fn get_board(&self, id: i64) -> Result<Option<Board>> {
        self.conn
            .query_row(
                "SELECT id, name, description, created_at, updated_at FROM boards WHERE id = ?1",
                params![id],
                board_from_row,
            )
            .optional()
            .context("Failed to query board")
    }

    // ── Column CRUD ───────────────────────────────────────────────────

    /// Append a column to the right end of a board.
    pub fn create_column(&self, board_id: i64, name: &str, color: Option<&str>) -> Result<Column> {
        let max_pos: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(position), -1) FROM board_columns WHERE board_id = ?1",
                params![board_id],
                |row| row.get(0),
            )
            .context("Failed to get max column position")?;

        self.conn
            .execute(
                "INSERT INTO board_columns (board_id, name, color, position) VALUES (?1, ?2, COALESCE(?3, '#000'), ?4)",
                params![board_id, name, color, max_pos + 1],
            )
            .context("Failed to insert column")?;
        let id = self.conn.last_insert_rowid();
        self.get_column(id)?.context("Column not found after insert")
    }

    pub fn get_column(&self, id: i64) -> Result<Option<Column>> {
        self.conn
            .query_row(
                "SELECT id, board_id, name, color, position, created_at FROM board_columns WHERE id = ?1",
                params![id],
                column_from_row,
            )
            .optional()
            .context("Failed to query column")
    }

    pub fn list_columns(&self, board_id: i64) -> Result<Vec<Column>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, board_id, name, color, position, created_at
                 FROM board_columns WHERE board_id = ?1 ORDER BY position, id",
            )
            .context("Failed to prepare list_columns")?;
        let rows = stmt
            .query_map(params![board_id], column_from_row)
            .context("Failed to query columns")?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.context("Failed to read column row")?);
        }
        Ok(columns)
    }

    // ── Cards ─────────────────────────────────────────────────────────

    pub fn get_card(&self, id: i64) -> Result<Option<Card>> {
        self.conn
            .query_row(
                "SELECT id, board_id, column_id, position, entity_type, entity_id, created_at, updated_at
                 FROM cards WHERE id = ?1",
                params![id],
                card_from_row,
            )
            .optional()
            .context("Failed to query card")
    }

    pub fn list_cards(&self, column_id: i64) -> Result<Vec<Card>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, board_id, column_id, position, entity_type, entity_id, created_at, updated_at
                 FROM cards WHERE column_id = ?1 ORDER BY position",
            )
            .context("Failed to prepare list_cards")?;
        let rows = stmt
            .query_map(params![column_id], card_from_row)
            .context("Failed to query cards")?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row.context("Failed to read card row")?);
        }
        Ok(cards)
    }

    pub fn find_card_by_entity(&self, board_id: i64, entity: &EntityRef) -> Result<Option<Card>> {
        self.conn
            .query_row(
                "SELECT id, board_id, column_id, position, entity_type, entity_id, created_at, updated_at
                 FROM cards WHERE board_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
                params![board_id, entity.entity_type, entity.entity_id],
                card_from_row,
            )
            .optional()
            .context("Failed to query card by entity")
    }

    pub fn insert_card(
        &self,
        board_id: i64,
        column_id: i64,
        position: i32,
        entity: &EntityRef,
    ) -> Result<Card> {
        self.conn
            .execute(
                "INSERT INTO cards (board_id, column_id, position, entity_type, entity_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![board_id, column_id, position, entity.entity_type, entity.entity_id],
            )
            .context("Failed to insert card")?;
        let id = self.conn.last_insert_rowid();
        self.get_card(id)?.context("Card not found after insert")
    }

    pub fn delete_card(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM cards WHERE id = ?1", params![id])
            .context("Failed to delete card")?;
        Ok(count > 0)
    }

    /// Write a column's final order in one set-based statement.
    ///
    /// The `(card_id, position)` mapping travels as a single JSON parameter
    /// read through `json_each`, so the bound-variable count stays constant
    /// however long the column is. The listed rows are first parked on
    /// distinct negative positions, then one `UPDATE … FROM` assigns every
    /// final position and moves the rows into `column_id`. At no point do two
    /// rows of one column share a position, so `UNIQUE (column_id, position)`
    /// holds row by row. Rows on a different board than `column_id` are left
    /// untouched.
    pub fn set_positions(&self, column_id: i64, placements: &[Placement]) -> Result<usize> {
        if placements.is_empty() {
            return Ok(0);
        }
        let mapping: Vec<(i64, i32)> = placements.iter().map(|p| (p.card_id, p.position)).collect();
        let mapping = serde_json::to_string(&mapping).context("Failed to encode card positions")?;

        self.conn
            .execute(
                "UPDATE cards SET position = -1 - position
                 WHERE board_id = (SELECT board_id FROM board_columns WHERE id = ?1)
                   AND id IN (SELECT json_extract(value, '$[0]') FROM json_each(?2))",
                params![column_id, mapping],
            )
            .context("Failed to park card positions")?;

        let written = self
            .conn
            .execute(
                "UPDATE cards
                 SET position = placed.position, column_id = ?1, updated_at = datetime('now')
                 FROM (SELECT json_extract(value, '$[0]') AS card_id,
                              json_extract(value, '$[1]') AS position
                       FROM json_each(?2)) AS placed
                 WHERE cards.id = placed.card_id
                   AND cards.board_id = (SELECT board_id FROM board_columns WHERE id = ?1)",
                params![column_id, mapping],
            )
            .context("Failed to apply card positions")?;
        tracing::debug!(column_id, written, "applied column positions");
        Ok(written)
    }

    /// Shift every card of a (board, column) scope one slot down.
    ///
    /// Done as park-then-restore (`p → -1-p → p+1`) so no intermediate row
    /// lands on a position still held by its neighbour.
    pub fn shift_column(&self, board_id: i64, column_id: i64) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE cards SET position = -1 - position WHERE board_id = ?1 AND column_id = ?2",
                params![board_id, column_id],
            )
            .context("Failed to park column positions")?;
        let shifted = self
            .conn
            .execute(
                "UPDATE cards SET position = -position, updated_at = datetime('now') WHERE board_id = ?1 AND column_id = ?2",
                params![board_id, column_id],
            )
            .context("Failed to shift column positions")?;
        Ok(shifted)
    }
}

impl BoardStore for BoardDb {
    fn transaction<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Self) -> StoreResult<R>,
    {
        // BEGIN IMMEDIATE takes the write lock up front, so overlapping
        // read-modify-write cycles serialize instead of deadlocking on upgrade.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin transaction")
            .map_err(KanbanError::from_db)?;
        let result = f(self)?;
        tx.commit()
            .context("Failed to commit transaction")
            .map_err(KanbanError::from_db)?;
        Ok(result)
    }

    fn get_board(&self, id: i64) -> StoreResult<Option<Board>> {
        BoardDb::get_board(self, id).map_err(KanbanError::from_db)
    }

    fn list_boards(&self) -> StoreResult<Vec<Board>> {
        BoardDb::list_boards(self).map_err(KanbanError::from_db)
    }

    fn get_column(&self, id: i64) -> StoreResult<Option<Column>> {
        BoardDb::get_column(self, id).map_err(KanbanError::from_db)
    }

    fn list_columns(&self, board_id: i64) -> StoreResult<Vec<Column>> {
        BoardDb::list_columns(self, board_id).map_err(KanbanError::from_db)
    }

    fn get_card(&self, id: i64) -> StoreResult<Option<Card>> {
        BoardDb::get_card(self, id).map_err(KanbanError::from_db)
    }

    fn list_cards(&self, column_id: i64) -> StoreResult<Vec<Card>> {
        BoardDb::list_cards(self, column_id).map_err(KanbanError::from_db)
    }

    fn find_card_by_entity(
        &self,
        board_id: i64,
        entity: &EntityRef,
    ) -> StoreResult<Option<Card>> {
        BoardDb::find_card_by_entity(self, board_id, entity).map_err(KanbanError::from_db)
    }

    fn set_positions(&self, column_id: i64, placements: &[Placement]) -> StoreResult<usize> {
        BoardDb::set_positions(self, column_id, placements).map_err(KanbanError::from_db)
    }

    fn shift_column(&self, board_id: i64, column_id: i64) -> StoreResult<usize> {
        BoardDb::shift_column(self, board_id, column_id).map_err(KanbanError::from_db)
    }

    fn insert_card(
        &self,
        board_id: i64,
        column_id: i64,
        position: i32,
        entity: &EntityRef,
    ) -> StoreResult<Card> {
        BoardDb::insert_card(self, board_id, column_id, position, entity)
            .map_err(KanbanError::from_db)
    }

    fn delete_card(&self, id: i64) -> StoreResult<bool> {
        BoardDb::delete_card(self, id).map_err(KanbanError::from_db)
    }
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn column_from_row(row: &Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        position: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        board_id: row.get(1)?,
        column_id: row.get(2)?,
        position: row.get(3)?,
        entity: EntityRef {
            entity_type: row.get(4)?,
            entity_id: row.get(5)?,
        },
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
