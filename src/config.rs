//! Configuration for the Kanban back-end, read from `.kanban/kanban.toml`.
//!
//! Values are layered file → environment → default, and CLI flags override
//! the result.
//!
//! # Configuration File Format
//!
//! ```toml
//! [board]
//! title_attribute = "title"
//!
//! [server]
//! port = 3141
//! db_path = ".kanban/kanban.db"
//! dev_mode = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::board::server::ServerConfig;

/// Name of the project-local configuration directory.
pub const KANBAN_DIR: &str = ".kanban";
/// File name of the configuration inside [`KANBAN_DIR`].
pub const CONFIG_FILE: &str = "kanban.toml";
/// Database file name inside [`KANBAN_DIR`] when nothing else is configured.
pub const DEFAULT_DB_FILE: &str = "kanban.db";

pub const DB_PATH_ENV: &str = "KANBAN_DB_PATH";
pub const TITLE_ATTRIBUTE_ENV: &str = "KANBAN_TITLE_ATTRIBUTE";

const DEFAULT_TITLE_ATTRIBUTE: &str = "title";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BoardSection {
    /// Entity attribute holding a card's title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_attribute: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database location; relative paths are resolved against the project
    /// directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// Bind on all interfaces and allow any CORS origin.
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: None,
            dev_mode: false,
        }
    }
}

/// The complete kanban.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KanbanToml {
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub server: ServerSection,
}

impl KanbanToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse kanban.toml")
    }

    /// Load configuration from `<kanban_dir>/kanban.toml`.
    /// Returns default configuration if file doesn't exist.
    pub fn load_or_default(kanban_dir: &Path) -> Result<Self> {
        let config_path = kanban_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize kanban.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Title attribute (file → `KANBAN_TITLE_ATTRIBUTE` → `"title"`).
    pub fn title_attribute(&self) -> String {
        self.title_attribute_with(std::env::var(TITLE_ATTRIBUTE_ENV).ok())
    }

    fn title_attribute_with(&self, env: Option<String>) -> String {
        self.board
            .title_attribute
            .clone()
            .or(env)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE_ATTRIBUTE.to_string())
    }

    /// Database path as configured (file → `KANBAN_DB_PATH`), if any.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.db_path_with(std::env::var(DB_PATH_ENV).ok())
    }

    fn db_path_with(&self, env: Option<String>) -> Option<PathBuf> {
        self.server
            .db_path
            .clone()
            .or_else(|| env.filter(|s| !s.is_empty()).map(PathBuf::from))
    }

    /// Sanity-check values; returns human-readable problems.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.server.port == 0 {
            problems.push("server.port must be non-zero".to_string());
        }
        if let Some(attr) = &self.board.title_attribute {
            if attr.trim().is_empty() {
                problems.push("board.title_attribute must not be empty".to_string());
            }
        }
        problems
    }
}

/// Configuration resolved for one project directory.
#[derive(Debug, Clone)]
pub struct KanbanConfig {
    pub project_dir: PathBuf,
    pub kanban_dir: PathBuf,
    pub toml: KanbanToml,
}

impl KanbanConfig {
    /// Read `.kanban/kanban.toml` under `project_dir`, after loading `.env`.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let _ = dotenvy::from_path(project_dir.join(".env"));
        let kanban_dir = project_dir.join(KANBAN_DIR);
        let toml = KanbanToml::load_or_default(&kanban_dir)?;
        for problem in toml.validate() {
            tracing::warn!("kanban.toml: {}", problem);
        }

        Ok(Self {
            project_dir,
            kanban_dir,
            toml,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.kanban_dir.join(CONFIG_FILE)
    }

    /// Database path: CLI → file → env → `.kanban/kanban.db`. Relative paths
    /// are taken from the project directory.
    pub fn db_path(&self, cli: Option<PathBuf>) -> PathBuf {
        let path = cli
            .or_else(|| self.toml.db_path())
            .unwrap_or_else(|| self.kanban_dir.join(DEFAULT_DB_FILE));
        if path.is_absolute() {
            path
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn title_attribute(&self) -> String {
        self.toml.title_attribute()
    }

    /// Server settings with CLI overrides applied.
    pub fn server_config(
        &self,
        port: Option<u16>,
        db_path: Option<PathBuf>,
        dev_mode: bool,
    ) -> ServerConfig {
        ServerConfig {
            port: port.unwrap_or(self.toml.server.port),
            db_path: self.db_path(db_path),
            dev_mode: dev_mode || self.toml.server.dev_mode,
            title_attribute: self.title_attribute(),
        }
    }

    /// Create `.kanban/` and a default `kanban.toml` unless one exists.
    /// Returns true if the file was written.
    pub fn write_default(&self) -> Result<bool> {
        std::fs::create_dir_all(&self.kanban_dir).with_context(|| {
            format!("Failed to create directory: {}", self.kanban_dir.display())
        })?;
        let path = self.config_file();
        if path.exists() {
            return Ok(false);
        }
        let mut toml = KanbanToml::default();
        toml.board.title_attribute = Some(DEFAULT_TITLE_ATTRIBUTE.to_string());
        toml.save(&path)?;
        Ok(true)
    }
}
