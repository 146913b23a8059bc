use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kanban::config::KanbanConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "kanban")]
#[command(version, about = "Kanban board back-end with atomic drag-and-drop reordering")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Database path. Overrides kanban.toml and KANBAN_DB_PATH.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .kanban/kanban.toml and the database
    Init,
    /// Serve the HTTP and WebSocket API
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Manage boards
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },
    /// Manage columns
    Column {
        #[command(subcommand)]
        command: ColumnCommands,
    },
    /// Manage cards
    Card {
        #[command(subcommand)]
        command: CardCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum BoardCommands {
    /// Create a board
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List boards
    List,
    /// Print a board with its columns and cards
    Show {
        id: i64,
        /// Print the board as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum ColumnCommands {
    /// Append a column to a board
    Add {
        board_id: i64,
        name: String,
        #[arg(short, long)]
        color: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum CardCommands {
    /// Attach an entity to a column as a new top card
    Attach {
        board_id: i64,
        column_id: i64,
        entity_type: String,
        entity_id: i64,
    },
    /// Move a card to a column and index
    #[command(allow_negative_numbers = true)]
    Move {
        board_id: i64,
        card_id: i64,
        column_id: i64,
        /// Destination index; out-of-range values are clamped
        #[arg(allow_hyphen_values = true)]
        index: i64,
    },
    /// Remove a card and close the gap it leaves
    Detach { card_id: i64 },
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("kanban=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kanban=info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = KanbanConfig::new(project_dir)?;
    let db_path = config.db_path(cli.db_path.clone());

    match &cli.command {
        Commands::Init => cmd::cmd_init(&config, &db_path)?,
        Commands::Serve { port, dev } => {
            cmd::cmd_serve(&config, *port, cli.db_path.clone(), *dev).await?
        }
        Commands::Board { command } => cmd::cmd_board(&config, &db_path, command.clone())?,
        Commands::Column { command } => cmd::cmd_column(&db_path, command.clone())?,
        Commands::Card { command } => cmd::cmd_card(&config, &db_path, command.clone())?,
    }

    Ok(())
}
