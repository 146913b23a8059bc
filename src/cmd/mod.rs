//! CLI command implementations.
//!
//! | Module   | Commands handled                  |
//! |----------|-----------------------------------|
//! | `serve`  | `Init`, `Serve`                   |
//! | `board`  | `Board`, `Column`, `Card`         |

pub mod board;
pub mod serve;

pub use board::{cmd_board, cmd_card, cmd_column};
pub use serve::{cmd_init, cmd_serve};
