use crate::{Board, BoardId, BoardView, Card, CardId, CardUpdate, Column, ColumnId};
use async_trait::async_trait;
use kanban_core::KanbanResult;

/// Operations the board exposes to its front ends.
///
/// Every mutating call runs as one atomic store transaction and, once it has
/// committed, emits a single `board.updated` notification.
#[async_trait]
pub trait BoardOperations: Send + Sync {
    // Board operations
    async fn create_board(&self, title: String) -> KanbanResult<Board>;
    /// Find-or-create; the flag is `true` when the board was created.
    async fn ensure_board(&self, id: BoardId, title: String) -> KanbanResult<(Board, bool)>;
    async fn get_board(&self, id: BoardId) -> KanbanResult<Option<BoardView>>;
    async fn list_boards(&self) -> KanbanResult<Vec<Board>>;

    // Column operations
    async fn create_column(&self, board_id: BoardId, title: String) -> KanbanResult<Column>;
    async fn rename_column(&self, id: ColumnId, title: String) -> KanbanResult<Column>;
    async fn delete_column(&self, id: ColumnId) -> KanbanResult<()>;

    // Card operations
    async fn append_card(
        &self,
        column_id: ColumnId,
        title: String,
        description: String,
    ) -> KanbanResult<Card>;
    async fn list_cards(&self, column_id: ColumnId) -> KanbanResult<Vec<Card>>;
    async fn update_card(&self, id: CardId, update: CardUpdate) -> KanbanResult<Card>;
    async fn move_card(
        &self,
        id: CardId,
        column_id: ColumnId,
        position: i32,
    ) -> KanbanResult<Card>;
    async fn delete_card(&self, id: CardId) -> KanbanResult<()>;
}

/// Rejects blank titles; returns the trimmed title otherwise.
pub fn validate_title(kind: &str, title: &str) -> KanbanResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(kanban_core::KanbanError::InvalidArgument(format!(
            "{} title must not be empty",
            kind
        )));
    }
    Ok(trimmed.to_string())
}
