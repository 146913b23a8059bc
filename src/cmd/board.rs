//! Board, column and card commands: `kanban board|column|card`.

use anyhow::{Context, Result};
use std::path::Path;

use kanban::board::db::BoardDb;
use kanban::board::models::{BoardView, EntityRef};
use kanban::board::{
    BoardServices, MoveCoordinator, MoveOutcome, NewCard, attach_card, detach_card,
    load_board_view,
};
use kanban::config::KanbanConfig;

use crate::{BoardCommands, CardCommands, ColumnCommands};

fn open_db(db_path: &Path) -> Result<BoardDb> {
    if !db_path.exists() {
        anyhow::bail!(
            "No database at {}. Run 'kanban init' first.",
            db_path.display()
        );
    }
    BoardDb::new(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

fn print_board(view: &BoardView) {
    println!("Board {}: {}", view.board.id, view.board.name);
    if let Some(description) = &view.board.description {
        println!("  {}", description);
    }
    for column in &view.columns {
        println!(
            "  {} (#{}, {} cards)",
            column.column.name,
            column.column.id,
            column.cards.len()
        );
        for card in &column.cards {
            println!(
                "    {}. {} [card {}, {}]",
                card.card.position, card.title, card.card.id, card.card.entity
            );
        }
    }
}

pub fn cmd_board(config: &KanbanConfig, db_path: &Path, command: BoardCommands) -> Result<()> {
    let db = open_db(db_path)?;
    match command {
        BoardCommands::Create { name, description } => {
            let board = db.create_board(&name, description.as_deref())?;
            println!("Created board {}: {}", board.id, board.name);
        }
        BoardCommands::List => {
            let boards = db.list_boards()?;
            if boards.is_empty() {
                println!("No boards.");
            }
            for board in boards {
                println!("{}\t{}", board.id, board.name);
            }
        }
        BoardCommands::Show { id, json } => {
            let services = BoardServices::detached(config.title_attribute());
            let view = load_board_view(&db, id, &services.titles)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_board(&view);
            }
        }
    }
    Ok(())
}

pub fn cmd_column(db_path: &Path, command: ColumnCommands) -> Result<()> {
    let db = open_db(db_path)?;
    match command {
        ColumnCommands::Add {
            board_id,
            name,
            color,
        } => {
            if db.get_board(board_id)?.is_none() {
                anyhow::bail!("Board {} not found", board_id);
            }
            let column = db.create_column(board_id, &name, color.as_deref())?;
            println!(
                "Added column {} '{}' to board {}",
                column.id, column.name, board_id
            );
        }
    }
    Ok(())
}

pub fn cmd_card(config: &KanbanConfig, db_path: &Path, command: CardCommands) -> Result<()> {
    let db = open_db(db_path)?;
    match command {
        CardCommands::Attach {
            board_id,
            column_id,
            entity_type,
            entity_id,
        } => {
            let card = attach_card(
                &db,
                &NewCard {
                    board_id,
                    column_id,
                    entity: EntityRef::new(entity_type, entity_id),
                },
            )?;
            println!(
                "Attached card {} ({}) to column {}",
                card.id, card.entity, card.column_id
            );
        }
        CardCommands::Move {
            board_id,
            card_id,
            column_id,
            index,
        } => {
            let services = BoardServices::detached(config.title_attribute());
            let coordinator = MoveCoordinator::mount(&db, board_id, &services)?;
            match coordinator.move_card(card_id, column_id, index)? {
                MoveOutcome::Moved(view) => {
                    let position = view
                        .column(column_id)
                        .and_then(|c| c.cards.iter().find(|card| card.card.id == card_id))
                        .map(|card| card.card.position)
                        .unwrap_or_default();
                    println!(
                        "Moved card {} to column {} at position {}",
                        card_id, column_id, position
                    );
                }
                MoveOutcome::Ignored => {
                    println!(
                        "Card {} belongs to another board; nothing moved",
                        card_id
                    );
                }
            }
        }
        CardCommands::Detach { card_id } => {
            let card = detach_card(&db, card_id)?;
            println!("Detached card {} from column {}", card.id, card.column_id);
        }
    }
    Ok(())
}
