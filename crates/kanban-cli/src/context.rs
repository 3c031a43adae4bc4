use kanban_core::{AppConfig, KanbanError, KanbanResult};
use kanban_persistence::{BroadcastNotifier, OrderingEngine, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Stable id of the board created by `board ensure-default`.
pub const DEFAULT_BOARD_ID: Uuid = Uuid::from_u128(1);

pub struct CliContext {
    pub engine: OrderingEngine,
    pub config: AppConfig,
}

impl CliContext {
    /// Opens the database named by `--db`/`KANBAN_DB`, falling back to the
    /// configured path and then to the platform data directory.
    pub async fn open(db: Option<PathBuf>) -> KanbanResult<Self> {
        let config = AppConfig::load();
        let db_path = db
            .or_else(|| config.effective_database_path())
            .ok_or_else(|| {
                KanbanError::Config(
                    "no database path given and no data directory available".to_string(),
                )
            })?;

        let store = SqliteStore::open(&db_path).await?;
        let notifier = BroadcastNotifier::new(config.effective_notify_capacity());
        tracing::debug!("opened board database at {}", db_path.display());

        Ok(Self {
            engine: OrderingEngine::new(Arc::new(store), Arc::new(notifier)),
            config,
        })
    }
}
