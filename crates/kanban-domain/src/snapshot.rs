//! Read model for a single board.
//!
//! `BoardView` is what a client refetches after a `board.updated` signal:
//! the board, its columns in display order, and every card ordered by column
//! position and then card position.

use crate::ordering::{check_siblings, OrderingViolation};
use crate::{Board, Card, Column, ColumnId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardView {
    pub board: Board,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl BoardView {
    /// Builds a view, sorting columns and cards into display order.
    pub fn new(board: Board, mut columns: Vec<Column>, mut cards: Vec<Card>) -> Self {
        columns.sort_by_key(|c| c.position);
        let column_rank = |column_id: ColumnId| {
            columns
                .iter()
                .position(|c| c.id == column_id)
                .unwrap_or(usize::MAX)
        };
        cards.sort_by_key(|card| (column_rank(card.column_id), card.position));
        Self {
            board,
            columns,
            cards,
        }
    }

    /// Verifies the ordering of the board's columns and of every column's cards.
    pub fn check_ordering(&self) -> Result<(), OrderingViolation> {
        check_siblings(&self.columns, self.board.id)?;
        for column in &self.columns {
            check_siblings(&self.cards, column.id)?;
        }
        Ok(())
    }
}
