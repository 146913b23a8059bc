use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A column (state) of a board. Columns are ordered left to right by
/// `position`; gaps between positions are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub color: String,
    pub position: i32,
    pub created_at: String,
}

/// Opaque reference to the external entity a card stands for: a type tag plus
/// the entity's identifier in its own store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: i64,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.entity_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: i64,
    pub board_id: i64,
    pub column_id: i64,
    pub position: i32,
    #[serde(flatten)]
    pub entity: EntityRef,
    pub created_at: String,
    pub updated_at: String,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub board: Board,
    pub columns: Vec<ColumnView>,
}

impl BoardView {
    /// Find a column of the view by id.
    pub fn column(&self, column_id: i64) -> Option<&ColumnView> {
        self.columns.iter().find(|c| c.column.id == column_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnView {
    pub column: Column,
    pub cards: Vec<CardView>,
}

impl ColumnView {
    pub fn card_ids(&self) -> Vec<i64> {
        self.cards.iter().map(|c| c.card.id).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardView {
    #[serde(flatten)]
    pub card: Card,
    pub title: String,
}
