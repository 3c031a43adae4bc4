use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{KanbanError, KanbanResult};

const DEFAULT_BOARD_TITLE: &str = "My Kanban Board";
const DEFAULT_NOTIFY_CAPACITY: usize = 16;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file used when no `--db` flag or `KANBAN_DB` is given.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub default_board_title: Option<String>,
    /// Buffer size of the `board.updated` broadcast channel.
    #[serde(default)]
    pub notify_capacity: Option<usize>,
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::home_dir().map(|home| home.join(".config/kanban/config.toml"))
        }
        #[cfg(target_os = "linux")]
        {
            dirs::config_dir().map(|config| config.join("kanban/config.toml"))
        }
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map(|config| config.join("kanban\\config.toml"))
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }

    /// Loads the user config, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .filter(|path| path.exists())
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> KanbanResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| KanbanError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn effective_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(|| dirs::data_dir().map(|data| data.join("kanban").join("board.db")))
    }

    pub fn effective_default_board_title(&self) -> &str {
        self.default_board_title
            .as_deref()
            .unwrap_or(DEFAULT_BOARD_TITLE)
    }

    pub fn effective_notify_capacity(&self) -> usize {
        self.notify_capacity
            .filter(|capacity| *capacity > 0)
            .unwrap_or(DEFAULT_NOTIFY_CAPACITY)
    }
}
