use async_trait::async_trait;
use kanban_core::KanbanResult;
use kanban_domain::{
    Board, BoardId, BoardView, Card, CardId, Column, ColumnId, PositionShift,
};
use tokio::sync::broadcast;

/// One atomic unit of work against a store.
///
/// Nothing written through a transaction is visible to readers until
/// [`commit`](StoreTransaction::commit) succeeds. Dropping a transaction that
/// was neither committed nor rolled back discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn read_board(&mut self, id: BoardId) -> KanbanResult<Option<Board>>;
    async fn insert_board(&mut self, board: &Board) -> KanbanResult<()>;

    async fn read_column(&mut self, id: ColumnId) -> KanbanResult<Option<Column>>;
    async fn count_columns(&mut self, board_id: BoardId) -> KanbanResult<i32>;
    async fn insert_column(&mut self, column: &Column) -> KanbanResult<()>;
    async fn update_column(&mut self, column: &Column) -> KanbanResult<()>;
    /// Removes the column together with all of its cards.
    async fn delete_column(&mut self, id: ColumnId) -> KanbanResult<()>;

    async fn read_card(&mut self, id: CardId) -> KanbanResult<Option<Card>>;
    async fn count_cards(&mut self, column_id: ColumnId) -> KanbanResult<i32>;
    async fn insert_card(&mut self, card: &Card) -> KanbanResult<()>;
    /// Writes title, description, placement and `updated_at` of an existing card.
    async fn update_card(&mut self, card: &Card) -> KanbanResult<()>;
    async fn delete_card(&mut self, id: CardId) -> KanbanResult<()>;

    /// Applies a bulk position shift as a single statement.
    /// Returns the number of rows that moved.
    async fn shift_positions(&mut self, shift: &PositionShift) -> KanbanResult<u64>;

    async fn commit(&mut self) -> KanbanResult<()>;
    async fn rollback(&mut self) -> KanbanResult<()>;
}

/// Storage backend for boards, columns and cards.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Opens a write transaction.
    ///
    /// Write transactions on one store are serialized: `begin` waits until
    /// the previous transaction has been committed, rolled back or dropped.
    async fn begin(&self) -> KanbanResult<Box<dyn StoreTransaction>>;

    /// Reads a consistent view of one board.
    async fn load_board(&self, id: BoardId) -> KanbanResult<Option<BoardView>>;

    async fn list_boards(&self) -> KanbanResult<Vec<Board>>;

    /// Cards of one column ordered by position.
    async fn list_cards(&self, column_id: ColumnId) -> KanbanResult<Vec<Card>>;
}

/// Payload-less "something changed, refetch" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardUpdated;

impl BoardUpdated {
    pub const NAME: &'static str = "board.updated";

    pub fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Fan-out of change signals to connected clients.
#[cfg_attr(test, mockall::automock)]
pub trait ChangeNotifier: Send + Sync {
    /// Fire-and-forget; never blocks and never fails.
    fn notify_changed(&self);

    fn subscribe(&self) -> broadcast::Receiver<BoardUpdated>;
}
