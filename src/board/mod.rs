//! Kanban board back-end: columns of cards that stand for external entities,
//! reordered by drag-and-drop.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘ WebSocket│         │                                        │
//!                       │         │ MoveCoordinator::move_card()           │
//!                       │         v                                        │
//!                       │  coordinator.rs  (one board, one transaction)    │
//!                       │         │                                        │
//!                       │         │ reconcile() → Reconciliation           │
//!                       │         v                                        │
//!                       │  reconcile.rs  (pure position arithmetic)        │
//!                       │         │                                        │
//!                       │         │ BoardStore::set_positions()            │
//!                       │         v                                        │
//!                       │  store.rs / db.rs  (SQLite, BEGIN IMMEDIATE)     │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                              |
//! |-----------|-------------------------------------------------------------|
//! | `models`  | Shared types: `Board`, `Column`, `Card`, `BoardView`        |
//! | `attach`  | Create a card for an entity at the top of a column          |
//! | `title`   | `EntityResolver` trait and card title fallbacks             |
//! | `events`  | `CardMoved` and the `EventSink` trait                       |
//! | `ws`      | `WsMessage::CardMoved` and the broadcast `EventSink`        |
//!
//! ## Move Flow
//!
//! 1. `PATCH /api/boards/{id}/cards/{card_id}/move` → `api::move_card()`
//! 2. `MoveCoordinator::mount()` binds the board; a card from another board
//!    is ignored.
//! 3. Inside one write transaction the source and destination lists are read,
//!    `reconcile()` computes dense positions and each column is written with
//!    a single update keyed by a JSON id-to-position map, destination first.
//! 4. After commit a `CardMoved` goes to the `EventSink`; the server's sink
//!    forwards it to WebSocket clients as `WsMessage::CardMoved`.

pub mod api;
pub mod attach;
pub mod coordinator;
pub mod db;
pub mod events;
pub mod models;
pub mod reconcile;
pub mod server;
pub mod store;
pub mod title;
pub mod ws;

pub use attach::{NewCard, attach_card, card_for_entity, detach_card};
pub use coordinator::{BoardServices, MoveCoordinator, MoveOutcome, load_board_view};
pub use events::{CardMoved, EventSink, NullSink};
pub use store::BoardStore;
pub use title::{EntityRegistry, EntityResolver, ResolvedEntity, TitleResolver};
