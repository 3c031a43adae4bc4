pub mod board;
pub mod card;
pub mod column;
pub mod operations;
pub mod ordering;
pub mod snapshot;

pub use board::{Board, BoardId};
pub use card::{Card, CardId, CardUpdate};
pub use column::{Column, ColumnId};
pub use operations::{validate_title, BoardOperations};
pub use ordering::{
    apply_shift, check_contiguous, check_siblings, plan_move, plan_removal, MovePlan,
    OrderingViolation, PositionScope, PositionShift, Positioned,
};
pub use snapshot::BoardView;
