use crate::traits::{BoardStore, StoreTransaction};
use async_trait::async_trait;
use kanban_core::{KanbanError, KanbanResult};
use kanban_domain::{
    apply_shift, Board, BoardId, BoardView, Card, CardId, Column, ColumnId, PositionScope,
    PositionShift,
};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    boards: Vec<Board>,
    columns: Vec<Column>,
    cards: Vec<Card>,
}

/// Process-local store for tests and throwaway sessions.
///
/// A write transaction holds the state lock for its whole lifetime and works
/// on a private copy, which replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTransaction {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    working: MemoryState,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> KanbanResult<()> {
        if self.guard.is_none() {
            return Err(KanbanError::Storage(
                "transaction already finished".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn read_board(&mut self, id: BoardId) -> KanbanResult<Option<Board>> {
        self.ensure_open()?;
        Ok(self.working.boards.iter().find(|b| b.id == id).cloned())
    }

    async fn insert_board(&mut self, board: &Board) -> KanbanResult<()> {
        self.ensure_open()?;
        if self.working.boards.iter().any(|b| b.id == board.id) {
            return Err(KanbanError::Storage(format!(
                "board {} already exists",
                board.id
            )));
        }
        self.working.boards.push(board.clone());
        Ok(())
    }

    async fn read_column(&mut self, id: ColumnId) -> KanbanResult<Option<Column>> {
        self.ensure_open()?;
        Ok(self.working.columns.iter().find(|c| c.id == id).cloned())
    }

    async fn count_columns(&mut self, board_id: BoardId) -> KanbanResult<i32> {
        self.ensure_open()?;
        Ok(self
            .working
            .columns
            .iter()
            .filter(|c| c.board_id == board_id)
            .count() as i32)
    }

    async fn insert_column(&mut self, column: &Column) -> KanbanResult<()> {
        self.ensure_open()?;
        if !self.working.boards.iter().any(|b| b.id == column.board_id) {
            return Err(KanbanError::Storage(format!(
                "column {} references missing board {}",
                column.id, column.board_id
            )));
        }
        self.working.columns.push(column.clone());
        Ok(())
    }

    async fn update_column(&mut self, column: &Column) -> KanbanResult<()> {
        self.ensure_open()?;
        if let Some(existing) = self.working.columns.iter_mut().find(|c| c.id == column.id) {
            *existing = column.clone();
        }
        Ok(())
    }

    async fn delete_column(&mut self, id: ColumnId) -> KanbanResult<()> {
        self.ensure_open()?;
        self.working.cards.retain(|c| c.column_id != id);
        self.working.columns.retain(|c| c.id != id);
        Ok(())
    }

    async fn read_card(&mut self, id: CardId) -> KanbanResult<Option<Card>> {
        self.ensure_open()?;
        Ok(self.working.cards.iter().find(|c| c.id == id).cloned())
    }

    async fn count_cards(&mut self, column_id: ColumnId) -> KanbanResult<i32> {
        self.ensure_open()?;
        Ok(self
            .working
            .cards
            .iter()
            .filter(|c| c.column_id == column_id)
            .count() as i32)
    }

    async fn insert_card(&mut self, card: &Card) -> KanbanResult<()> {
        self.ensure_open()?;
        if !self.working.columns.iter().any(|c| c.id == card.column_id) {
            return Err(KanbanError::Storage(format!(
                "card {} references missing column {}",
                card.id, card.column_id
            )));
        }
        self.working.cards.push(card.clone());
        Ok(())
    }

    async fn update_card(&mut self, card: &Card) -> KanbanResult<()> {
        self.ensure_open()?;
        if let Some(existing) = self.working.cards.iter_mut().find(|c| c.id == card.id) {
            *existing = card.clone();
        }
        Ok(())
    }

    async fn delete_card(&mut self, id: CardId) -> KanbanResult<()> {
        self.ensure_open()?;
        self.working.cards.retain(|c| c.id != id);
        Ok(())
    }

    async fn shift_positions(&mut self, shift: &PositionShift) -> KanbanResult<u64> {
        self.ensure_open()?;
        let touched = match shift.scope {
            PositionScope::Cards { .. } => apply_shift(&mut self.working.cards, shift),
            PositionScope::Columns { .. } => apply_shift(&mut self.working.columns, shift),
        };
        Ok(touched as u64)
    }

    async fn commit(&mut self) -> KanbanResult<()> {
        let mut guard = self.guard.take().ok_or_else(|| {
            KanbanError::Storage("transaction already finished".to_string())
        })?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(&mut self) -> KanbanResult<()> {
        self.guard.take();
        self.working = MemoryState::default();
        Ok(())
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn begin(&self) -> KanbanResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard: Some(guard),
            working,
        }))
    }

    async fn load_board(&self, id: BoardId) -> KanbanResult<Option<BoardView>> {
        let state = self.state.lock().await;
        let Some(board) = state.boards.iter().find(|b| b.id == id).cloned() else {
            return Ok(None);
        };
        let columns: Vec<Column> = state
            .columns
            .iter()
            .filter(|c| c.board_id == id)
            .cloned()
            .collect();
        let cards = state
            .cards
            .iter()
            .filter(|card| columns.iter().any(|c| c.id == card.column_id))
            .cloned()
            .collect();
        Ok(Some(BoardView::new(board, columns, cards)))
    }

    async fn list_boards(&self) -> KanbanResult<Vec<Board>> {
        let state = self.state.lock().await;
        let mut boards = state.boards.clone();
        boards.sort_by_key(|b| b.created_at);
        Ok(boards)
    }

    async fn list_cards(&self, column_id: ColumnId) -> KanbanResult<Vec<Card>> {
        let state = self.state.lock().await;
        let mut cards: Vec<Card> = state
            .cards
            .iter()
            .filter(|c| c.column_id == column_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.position);
        Ok(cards)
    }
}
