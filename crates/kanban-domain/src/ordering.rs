//! Position reindexing for sibling sets.
//!
//! Cards within a column, and columns within a board, keep a dense zero-based
//! ordering `{0, 1, .., n-1}`. Every mutation is expressed as a handful of
//! [`PositionShift`]s ("add `delta` to every sibling whose position falls in
//! `start..=end`") plus a final write of the moved item. Stores apply the
//! shifts inside one transaction; this module only computes them.

use kanban_core::{KanbanError, KanbanResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::board::BoardId;
use crate::card::{Card, CardId};
use crate::column::ColumnId;

/// An item that occupies a slot in its parent's ordering.
pub trait Positioned {
    fn parent_id(&self) -> Uuid;
    fn position(&self) -> i32;
    fn set_position(&mut self, position: i32);
}

/// The sibling set a shift applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionScope {
    Cards { column_id: ColumnId },
    Columns { board_id: BoardId },
}

impl PositionScope {
    pub fn parent_id(&self) -> Uuid {
        match self {
            Self::Cards { column_id } => *column_id,
            Self::Columns { board_id } => *board_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionShift {
    pub scope: PositionScope,
    /// Inclusive lower bound.
    pub start: i32,
    /// Inclusive upper bound; `i32::MAX` for "to the end of the list".
    pub end: i32,
    pub delta: i32,
}

impl PositionShift {
    /// Pulls every sibling after `removed` one slot towards the front.
    pub fn close_gap(scope: PositionScope, removed: i32) -> Self {
        Self {
            scope,
            start: removed + 1,
            end: i32::MAX,
            delta: -1,
        }
    }

    /// Pushes every sibling at or after `at` one slot towards the back.
    pub fn open_gap(scope: PositionScope, at: i32) -> Self {
        Self {
            scope,
            start: at,
            end: i32::MAX,
            delta: 1,
        }
    }

    pub fn covers(&self, position: i32) -> bool {
        position >= self.start && position <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// Everything a store needs to relocate one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub card_id: CardId,
    pub from_column: ColumnId,
    pub from_position: i32,
    pub to_column: ColumnId,
    pub to_position: i32,
    pub shifts: Vec<PositionShift>,
}

impl MovePlan {
    pub fn is_noop(&self) -> bool {
        self.from_column == self.to_column && self.from_position == self.to_position
    }
}

/// Shift that closes the hole left by deleting `card`.
pub fn plan_removal(card: &Card) -> PositionShift {
    PositionShift::close_gap(
        PositionScope::Cards {
            column_id: card.column_id,
        },
        card.position,
    )
}

/// Plans moving `card` to `new_position` in `dest_column`.
///
/// `dest_count` is the current number of cards in the destination column,
/// counting `card` itself when it already lives there. Positions outside
/// `0..=len` (where `len` excludes the moved card) are rejected.
pub fn plan_move(
    card: &Card,
    dest_column: ColumnId,
    new_position: i32,
    dest_count: i32,
) -> KanbanResult<MovePlan> {
    let same_column = card.column_id == dest_column;
    let max_position = if same_column {
        dest_count - 1
    } else {
        dest_count
    };

    if new_position < 0 || new_position > max_position {
        return Err(KanbanError::InvalidArgument(format!(
            "position {} is outside 0..={} for column {}",
            new_position, max_position, dest_column
        )));
    }

    let old_position = card.position;
    let source = PositionScope::Cards {
        column_id: card.column_id,
    };
    let mut shifts = Vec::with_capacity(2);

    if same_column {
        if new_position > old_position {
            shifts.push(PositionShift {
                scope: source,
                start: old_position + 1,
                end: new_position,
                delta: -1,
            });
        } else if new_position < old_position {
            shifts.push(PositionShift {
                scope: source,
                start: new_position,
                end: old_position - 1,
                delta: 1,
            });
        }
    } else {
        shifts.push(PositionShift::close_gap(source, old_position));
        shifts.push(PositionShift::open_gap(
            PositionScope::Cards {
                column_id: dest_column,
            },
            new_position,
        ));
    }

    Ok(MovePlan {
        card_id: card.id,
        from_column: card.column_id,
        from_position: old_position,
        to_column: dest_column,
        to_position: new_position,
        shifts,
    })
}

/// Applies `shift` to the matching siblings in `items`, returning how many moved.
pub fn apply_shift<T: Positioned>(items: &mut [T], shift: &PositionShift) -> usize {
    let parent = shift.scope.parent_id();
    let mut touched = 0;
    for item in items.iter_mut() {
        if item.parent_id() == parent && shift.covers(item.position()) {
            let position = item.position() + shift.delta;
            item.set_position(position);
            touched += 1;
        }
    }
    touched
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrderingViolation {
    #[error("negative position {0}")]
    Negative(i32),
    #[error("position {0} is used more than once")]
    Duplicate(i32),
    #[error("expected position {expected}, found {found}")]
    Gap { expected: i32, found: i32 },
}

/// Checks that `positions` is exactly `{0, .., n-1}`, in any order.
pub fn check_contiguous(
    positions: impl IntoIterator<Item = i32>,
) -> Result<(), OrderingViolation> {
    let mut sorted: Vec<i32> = positions.into_iter().collect();
    sorted.sort_unstable();

    for (index, &position) in sorted.iter().enumerate() {
        if position < 0 {
            return Err(OrderingViolation::Negative(position));
        }
        if index > 0 && sorted[index - 1] == position {
            return Err(OrderingViolation::Duplicate(position));
        }
        let expected = index as i32;
        if position != expected {
            return Err(OrderingViolation::Gap {
                expected,
                found: position,
            });
        }
    }
    Ok(())
}

/// Checks the ordering of every item whose parent is `parent_id`.
pub fn check_siblings<T: Positioned>(
    items: &[T],
    parent_id: Uuid,
) -> Result<(), OrderingViolation> {
    check_contiguous(
        items
            .iter()
            .filter(|item| item.parent_id() == parent_id)
            .map(Positioned::position),
    )
}
