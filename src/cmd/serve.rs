//! Project setup and server commands: `kanban init` and `kanban serve`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use kanban::board::db::BoardDb;
use kanban::board::server::start_server;
use kanban::config::KanbanConfig;

pub fn cmd_init(config: &KanbanConfig, db_path: &Path) -> Result<()> {
    if config.write_default()? {
        println!("Created {}", config.config_file().display());
    }
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    BoardDb::new(db_path)?;
    println!("Kanban database initialized at {}", db_path.display());
    Ok(())
}

pub async fn cmd_serve(
    config: &KanbanConfig,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    start_server(config.server_config(port, db_path, dev)).await
}
