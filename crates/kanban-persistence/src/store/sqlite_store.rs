use crate::traits::{BoardStore, StoreTransaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kanban_core::{KanbanError, KanbanResult};
use kanban_domain::{
    Board, BoardId, BoardView, Card, CardId, Column, ColumnId, PositionScope, PositionShift,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Pool, Row, Sqlite, Transaction};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
// Deferred transactions upgrade to a write lock at the first write, and SQLite
// fails that upgrade with SQLITE_BUSY without waiting.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

const BOARD_COLUMNS: &str = "id, title, created_at, updated_at";
const COLUMN_COLUMNS: &str = "id, board_id, title, position, created_at, updated_at";
const CARD_COLUMNS: &str = "id, column_id, title, description, position, created_at, updated_at";

fn storage_err(e: sqlx::Error) -> KanbanError {
    KanbanError::Storage(e.to_string())
}

fn parse_id(value: &str) -> KanbanResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| KanbanError::Serialization(format!("invalid id {:?}: {}", value, e)))
}

fn parse_timestamp(value: &str) -> KanbanResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| KanbanError::Serialization(format!("invalid timestamp {:?}: {}", value, e)))
}

fn text(row: &SqliteRow, column: &str) -> KanbanResult<String> {
    row.try_get::<String, _>(column).map_err(storage_err)
}

fn row_to_board(row: &SqliteRow) -> KanbanResult<Board> {
    Ok(Board {
        id: parse_id(&text(row, "id")?)?,
        title: text(row, "title")?,
        created_at: parse_timestamp(&text(row, "created_at")?)?,
        updated_at: parse_timestamp(&text(row, "updated_at")?)?,
    })
}

fn row_to_column(row: &SqliteRow) -> KanbanResult<Column> {
    Ok(Column {
        id: parse_id(&text(row, "id")?)?,
        board_id: parse_id(&text(row, "board_id")?)?,
        title: text(row, "title")?,
        position: row.try_get::<i32, _>("position").map_err(storage_err)?,
        created_at: parse_timestamp(&text(row, "created_at")?)?,
        updated_at: parse_timestamp(&text(row, "updated_at")?)?,
    })
}

fn row_to_card(row: &SqliteRow) -> KanbanResult<Card> {
    Ok(Card {
        id: parse_id(&text(row, "id")?)?,
        column_id: parse_id(&text(row, "column_id")?)?,
        title: text(row, "title")?,
        description: text(row, "description")?,
        position: row.try_get::<i32, _>("position").map_err(storage_err)?,
        created_at: parse_timestamp(&text(row, "created_at")?)?,
        updated_at: parse_timestamp(&text(row, "updated_at")?)?,
    })
}

fn count_to_i32(count: i64) -> KanbanResult<i32> {
    i32::try_from(count)
        .map_err(|_| KanbanError::Internal(format!("row count {} overflows", count)))
}

/// SQLite-backed store.
///
/// Write transactions start with `BEGIN IMMEDIATE`, so the database write lock
/// is held from the first read and two movers in the same column never compute
/// shifts from the same stale snapshot. A writer in another process waits for
/// the lock for up to the busy timeout. Writers sharing this store queue on an
/// in-process gate first and never spin on the busy handler.
pub struct SqliteStore {
    path: PathBuf,
    pool: tokio::sync::OnceCell<Pool<Sqlite>>,
    write_gate: Arc<Mutex<()>>,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pool: tokio::sync::OnceCell::new(),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Creates the database file and schema up front.
    pub async fn open(path: impl AsRef<Path>) -> KanbanResult<Self> {
        let store = Self::new(path);
        store.get_pool().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn get_pool(&self) -> KanbanResult<&Pool<Sqlite>> {
        self.pool
            .get_or_try_init(|| async {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }

                let options = SqliteConnectOptions::from_str(&format!(
                    "sqlite://{}?mode=rwc",
                    self.path.display()
                ))
                .map_err(storage_err)?
                .create_if_missing(true)
                .foreign_keys(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(BUSY_TIMEOUT);

                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
                    .map_err(storage_err)?;

                sqlx::raw_sql(SCHEMA)
                    .execute(&pool)
                    .await
                    .map_err(storage_err)?;

                tracing::info!("Opened SQLite database at {}", self.path.display());
                Ok::<_, KanbanError>(pool)
            })
            .await
    }
}

pub struct SqliteTransaction {
    // Declared before the guard so the rollback is queued before the gate opens.
    tx: Option<Transaction<'static, Sqlite>>,
    _write_guard: OwnedMutexGuard<()>,
}

impl SqliteTransaction {
    fn conn(&mut self) -> KanbanResult<&mut SqliteConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| KanbanError::Storage("transaction already finished".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn read_board(&mut self, id: BoardId) -> KanbanResult<Option<Board>> {
        let sql = format!("SELECT {} FROM boards WHERE id = ?", BOARD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.conn()?)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_board).transpose()
    }

    async fn insert_board(&mut self, board: &Board) -> KanbanResult<()> {
        sqlx::query(
            "INSERT INTO boards (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(board.id.to_string())
        .bind(&board.title)
        .bind(board.created_at.to_rfc3339())
        .bind(board.updated_at.to_rfc3339())
        .execute(self.conn()?)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn read_column(&mut self, id: ColumnId) -> KanbanResult<Option<Column>> {
        let sql = format!("SELECT {} FROM columns WHERE id = ?", COLUMN_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.conn()?)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_column).transpose()
    }

    async fn count_columns(&mut self, board_id: BoardId) -> KanbanResult<i32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM columns WHERE board_id = ?")
            .bind(board_id.to_string())
            .fetch_one(self.conn()?)
            .await
            .map_err(storage_err)?;
        count_to_i32(count)
    }

    async fn insert_column(&mut self, column: &Column) -> KanbanResult<()> {
        sqlx::query(
            "INSERT INTO columns (id, board_id, title, position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(column.id.to_string())
        .bind(column.board_id.to_string())
        .bind(&column.title)
        .bind(column.position)
        .bind(column.created_at.to_rfc3339())
        .bind(column.updated_at.to_rfc3339())
        .execute(self.conn()?)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn update_column(&mut self, column: &Column) -> KanbanResult<()> {
        sqlx::query("UPDATE columns SET title = ?, position = ?, updated_at = ? WHERE id = ?")
            .bind(&column.title)
            .bind(column.position)
            .bind(column.updated_at.to_rfc3339())
            .bind(column.id.to_string())
            .execute(self.conn()?)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete_column(&mut self, id: ColumnId) -> KanbanResult<()> {
        sqlx::query("DELETE FROM cards WHERE column_id = ?")
            .bind(id.to_string())
            .execute(self.conn()?)
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM columns WHERE id = ?")
            .bind(id.to_string())
            .execute(self.conn()?)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn read_card(&mut self, id: CardId) -> KanbanResult<Option<Card>> {
        let sql = format!("SELECT {} FROM cards WHERE id = ?", CARD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.conn()?)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_card).transpose()
    }

    async fn count_cards(&mut self, column_id: ColumnId) -> KanbanResult<i32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE column_id = ?")
            .bind(column_id.to_string())
            .fetch_one(self.conn()?)
            .await
            .map_err(storage_err)?;
        count_to_i32(count)
    }

    async fn insert_card(&mut self, card: &Card) -> KanbanResult<()> {
        sqlx::query(
            "INSERT INTO cards (id, column_id, title, description, position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(card.id.to_string())
        .bind(card.column_id.to_string())
        .bind(&card.title)
        .bind(&card.description)
        .bind(card.position)
        .bind(card.created_at.to_rfc3339())
        .bind(card.updated_at.to_rfc3339())
        .execute(self.conn()?)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn update_card(&mut self, card: &Card) -> KanbanResult<()> {
        sqlx::query(
            "UPDATE cards SET column_id = ?, title = ?, description = ?, position = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(card.column_id.to_string())
        .bind(&card.title)
        .bind(&card.description)
        .bind(card.position)
        .bind(card.updated_at.to_rfc3339())
        .bind(card.id.to_string())
        .execute(self.conn()?)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn delete_card(&mut self, id: CardId) -> KanbanResult<()> {
        sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id.to_string())
            .execute(self.conn()?)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn shift_positions(&mut self, shift: &PositionShift) -> KanbanResult<u64> {
        if shift.is_empty() || shift.delta == 0 {
            return Ok(0);
        }
        let (table, parent) = match shift.scope {
            PositionScope::Cards { .. } => ("cards", "column_id"),
            PositionScope::Columns { .. } => ("columns", "board_id"),
        };
        let sql = format!(
            "UPDATE {} SET position = position + ?, updated_at = ?
             WHERE {} = ? AND position >= ? AND position <= ?",
            table, parent
        );
        tracing::debug!(
            table,
            start = shift.start,
            end = shift.end,
            delta = shift.delta,
            "shifting positions"
        );
        let result = sqlx::query(&sql)
            .bind(shift.delta)
            .bind(Utc::now().to_rfc3339())
            .bind(shift.scope.parent_id().to_string())
            .bind(shift.start)
            .bind(shift.end)
            .execute(self.conn()?)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> KanbanResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| KanbanError::Storage("transaction already finished".to_string()))?;
        tx.commit().await.map_err(storage_err)
    }

    async fn rollback(&mut self) -> KanbanResult<()> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(storage_err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BoardStore for SqliteStore {
    async fn begin(&self) -> KanbanResult<Box<dyn StoreTransaction>> {
        let pool = self.get_pool().await?;
        let guard = self.write_gate.clone().lock_owned().await;
        let tx = pool.begin_with(BEGIN_WRITE).await.map_err(storage_err)?;
        Ok(Box::new(SqliteTransaction {
            tx: Some(tx),
            _write_guard: guard,
        }))
    }

    async fn load_board(&self, id: BoardId) -> KanbanResult<Option<BoardView>> {
        let pool = self.get_pool().await?;
        // One read transaction so columns and cards come from the same snapshot.
        let mut tx = pool.begin().await.map_err(storage_err)?;

        let board_sql = format!("SELECT {} FROM boards WHERE id = ?", BOARD_COLUMNS);
        let Some(board_row) = sqlx::query(&board_sql)
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?
        else {
            return Ok(None);
        };
        let board = row_to_board(&board_row)?;

        let column_sql = format!(
            "SELECT {} FROM columns WHERE board_id = ? ORDER BY position",
            COLUMN_COLUMNS
        );
        let columns = sqlx::query(&column_sql)
            .bind(id.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(storage_err)?
            .iter()
            .map(row_to_column)
            .collect::<KanbanResult<Vec<_>>>()?;

        let cards = sqlx::query(
            "SELECT c.id, c.column_id, c.title, c.description, c.position, c.created_at, c.updated_at
             FROM cards c JOIN columns col ON col.id = c.column_id
             WHERE col.board_id = ?
             ORDER BY col.position, c.position",
        )
        .bind(id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_err)?
        .iter()
        .map(row_to_card)
        .collect::<KanbanResult<Vec<_>>>()?;

        tx.commit().await.map_err(storage_err)?;
        Ok(Some(BoardView::new(board, columns, cards)))
    }

    async fn list_boards(&self) -> KanbanResult<Vec<Board>> {
        let pool = self.get_pool().await?;
        let sql = format!("SELECT {} FROM boards ORDER BY created_at", BOARD_COLUMNS);
        sqlx::query(&sql)
            .fetch_all(pool)
            .await
            .map_err(storage_err)?
            .iter()
            .map(row_to_board)
            .collect()
    }

    async fn list_cards(&self, column_id: ColumnId) -> KanbanResult<Vec<Card>> {
        let pool = self.get_pool().await?;
        let sql = format!(
            "SELECT {} FROM cards WHERE column_id = ? ORDER BY position",
            CARD_COLUMNS
        );
        sqlx::query(&sql)
            .bind(column_id.to_string())
            .fetch_all(pool)
            .await
            .map_err(storage_err)?
            .iter()
            .map(row_to_card)
            .collect()
    }
}
