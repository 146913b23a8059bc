//! Kanban board back-end: boards of ordered columns holding cards that stand
//! for external entities, with atomic drag-and-drop reordering.

pub mod board;
pub mod config;
pub mod errors;
