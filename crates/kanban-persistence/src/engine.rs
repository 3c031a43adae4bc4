//! The ordering engine: board operations as single store transactions.
//!
//! Each mutating operation opens one write transaction, reads what it needs,
//! applies the shifts computed by `kanban_domain::ordering`, and commits.
//! Any error rolls the whole transaction back. A `board.updated` signal is
//! emitted only after a successful commit.

use crate::traits::{BoardStore, BoardUpdated, ChangeNotifier, StoreTransaction};
use async_trait::async_trait;
use kanban_core::{KanbanError, KanbanResult};
use kanban_domain::{
    plan_move, plan_removal, validate_title, Board, BoardId, BoardOperations, BoardView, Card,
    CardId, CardUpdate, Column, ColumnId, PositionScope, PositionShift,
};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct OrderingEngine {
    store: Arc<dyn BoardStore>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl OrderingEngine {
    pub fn new(store: Arc<dyn BoardStore>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { store, notifier }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardUpdated> {
        self.notifier.subscribe()
    }

    /// Commits on success and notifies; rolls back on failure.
    async fn finish<T: Send>(
        &self,
        operation: &'static str,
        mut tx: Box<dyn StoreTransaction>,
        outcome: KanbanResult<T>,
    ) -> KanbanResult<T> {
        match outcome {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!(operation, "committed");
                self.notifier.notify_changed();
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(operation, "rollback failed: {}", rollback_err);
                }
                tracing::debug!(operation, "rolled back: {}", err);
                Err(err)
            }
        }
    }
}

async fn require_board(tx: &mut dyn StoreTransaction, id: BoardId) -> KanbanResult<Board> {
    tx.read_board(id)
        .await?
        .ok_or_else(|| KanbanError::not_found("Board", id))
}

async fn require_column(tx: &mut dyn StoreTransaction, id: ColumnId) -> KanbanResult<Column> {
    tx.read_column(id)
        .await?
        .ok_or_else(|| KanbanError::not_found("Column", id))
}

async fn require_card(tx: &mut dyn StoreTransaction, id: CardId) -> KanbanResult<Card> {
    tx.read_card(id)
        .await?
        .ok_or_else(|| KanbanError::not_found("Card", id))
}

async fn create_column_in(
    tx: &mut dyn StoreTransaction,
    board_id: BoardId,
    title: String,
) -> KanbanResult<Column> {
    require_board(tx, board_id).await?;
    let position = tx.count_columns(board_id).await?;
    let column = Column::new(board_id, title, position);
    tx.insert_column(&column).await?;
    Ok(column)
}

async fn rename_column_in(
    tx: &mut dyn StoreTransaction,
    id: ColumnId,
    title: String,
) -> KanbanResult<Column> {
    let mut column = require_column(tx, id).await?;
    column.update_title(title);
    tx.update_column(&column).await?;
    Ok(column)
}

async fn delete_column_in(tx: &mut dyn StoreTransaction, id: ColumnId) -> KanbanResult<()> {
    let column = require_column(tx, id).await?;
    tx.delete_column(id).await?;
    let shift = PositionShift::close_gap(
        PositionScope::Columns {
            board_id: column.board_id,
        },
        column.position,
    );
    tx.shift_positions(&shift).await?;
    Ok(())
}

async fn append_card_in(
    tx: &mut dyn StoreTransaction,
    column_id: ColumnId,
    title: String,
    description: String,
) -> KanbanResult<Card> {
    require_column(tx, column_id).await?;
    // Tail position is computed here, never taken from the caller.
    let position = tx.count_cards(column_id).await?;
    let card = Card::new(column_id, title, description, position);
    tx.insert_card(&card).await?;
    Ok(card)
}

async fn update_card_in(
    tx: &mut dyn StoreTransaction,
    id: CardId,
    update: CardUpdate,
) -> KanbanResult<Card> {
    let mut card = require_card(tx, id).await?;
    card.apply(update);
    tx.update_card(&card).await?;
    Ok(card)
}

async fn move_card_in(
    tx: &mut dyn StoreTransaction,
    id: CardId,
    column_id: ColumnId,
    position: i32,
) -> KanbanResult<Card> {
    let mut card = require_card(tx, id).await?;
    let destination = require_column(tx, column_id).await?;

    if destination.id != card.column_id {
        let source = tx.read_column(card.column_id).await?.ok_or_else(|| {
            KanbanError::Internal(format!(
                "card {} references missing column {}",
                card.id, card.column_id
            ))
        })?;
        if source.board_id != destination.board_id {
            return Err(KanbanError::InvalidArgument(format!(
                "column {} belongs to another board",
                destination.id
            )));
        }
    }

    let dest_count = tx.count_cards(column_id).await?;
    let plan = plan_move(&card, column_id, position, dest_count)?;
    if plan.is_noop() {
        return Ok(card);
    }

    tracing::debug!(
        card = %plan.card_id,
        from_column = %plan.from_column,
        from = plan.from_position,
        to_column = %plan.to_column,
        to = plan.to_position,
        "moving card"
    );
    for shift in &plan.shifts {
        tx.shift_positions(shift).await?;
    }
    card.move_to_column(plan.to_column, plan.to_position);
    tx.update_card(&card).await?;
    Ok(card)
}

async fn delete_card_in(tx: &mut dyn StoreTransaction, id: CardId) -> KanbanResult<()> {
    let card = require_card(tx, id).await?;
    tx.delete_card(id).await?;
    tx.shift_positions(&plan_removal(&card)).await?;
    Ok(())
}

#[async_trait]
impl BoardOperations for OrderingEngine {
    async fn create_board(&self, title: String) -> KanbanResult<Board> {
        let title = validate_title("Board", &title)?;
        let mut tx = self.store.begin().await?;
        let board = Board::new(title);
        let outcome = tx.insert_board(&board).await.map(|_| board);
        self.finish("create_board", tx, outcome).await
    }

    async fn ensure_board(&self, id: BoardId, title: String) -> KanbanResult<(Board, bool)> {
        let title = validate_title("Board", &title)?;
        let mut tx = self.store.begin().await?;
        match tx.read_board(id).await {
            Ok(Some(board)) => {
                // Nothing was written, so there is nothing to announce.
                tx.rollback().await?;
                Ok((board, false))
            }
            Ok(None) => {
                let board = Board::with_id(id, title);
                let outcome = tx.insert_board(&board).await.map(|_| (board, true));
                self.finish("ensure_board", tx, outcome).await
            }
            Err(err) => self.finish("ensure_board", tx, Err(err)).await,
        }
    }

    async fn get_board(&self, id: BoardId) -> KanbanResult<Option<BoardView>> {
        self.store.load_board(id).await
    }

    async fn list_boards(&self) -> KanbanResult<Vec<Board>> {
        self.store.list_boards().await
    }

    async fn create_column(&self, board_id: BoardId, title: String) -> KanbanResult<Column> {
        let title = validate_title("Column", &title)?;
        let mut tx = self.store.begin().await?;
        let outcome = create_column_in(tx.as_mut(), board_id, title).await;
        self.finish("create_column", tx, outcome).await
    }

    async fn rename_column(&self, id: ColumnId, title: String) -> KanbanResult<Column> {
        let title = validate_title("Column", &title)?;
        let mut tx = self.store.begin().await?;
        let outcome = rename_column_in(tx.as_mut(), id, title).await;
        self.finish("rename_column", tx, outcome).await
    }

    async fn delete_column(&self, id: ColumnId) -> KanbanResult<()> {
        let mut tx = self.store.begin().await?;
        let outcome = delete_column_in(tx.as_mut(), id).await;
        self.finish("delete_column", tx, outcome).await
    }

    async fn append_card(
        &self,
        column_id: ColumnId,
        title: String,
        description: String,
    ) -> KanbanResult<Card> {
        let title = validate_title("Card", &title)?;
        let mut tx = self.store.begin().await?;
        let outcome = append_card_in(tx.as_mut(), column_id, title, description).await;
        self.finish("append_card", tx, outcome).await
    }

    async fn list_cards(&self, column_id: ColumnId) -> KanbanResult<Vec<Card>> {
        self.store.list_cards(column_id).await
    }

    async fn update_card(&self, id: CardId, update: CardUpdate) -> KanbanResult<Card> {
        if update.is_empty() {
            return Err(KanbanError::InvalidArgument(
                "card update has no fields to change".to_string(),
            ));
        }
        let update = CardUpdate {
            title: update
                .title
                .map(|title| validate_title("Card", &title))
                .transpose()?,
            description: update.description,
        };
        let mut tx = self.store.begin().await?;
        let outcome = update_card_in(tx.as_mut(), id, update).await;
        self.finish("update_card", tx, outcome).await
    }

    async fn move_card(
        &self,
        id: CardId,
        column_id: ColumnId,
        position: i32,
    ) -> KanbanResult<Card> {
        let mut tx = self.store.begin().await?;
        let outcome = move_card_in(tx.as_mut(), id, column_id, position).await;
        self.finish("move_card", tx, outcome).await
    }

    async fn delete_card(&self, id: CardId) -> KanbanResult<()> {
        let mut tx = self.store.begin().await?;
        let outcome = delete_card_in(tx.as_mut(), id).await;
        self.finish("delete_card", tx, outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::BroadcastNotifier;
    use crate::store::MemoryStore;
    use crate::traits::MockChangeNotifier;
    use kanban_domain::check_siblings;
    use uuid::Uuid;

    fn engine_with(notifier: MockChangeNotifier) -> OrderingEngine {
        OrderingEngine::new(Arc::new(MemoryStore::new()), Arc::new(notifier))
    }

    fn quiet_engine() -> OrderingEngine {
        OrderingEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(BroadcastNotifier::default()),
        )
    }

    async fn board_with_column(engine: &OrderingEngine) -> (Board, Column) {
        let board = engine.create_board("Test Board".to_string()).await.unwrap();
        let column = engine
            .create_column(board.id, "Todo".to_string())
            .await
            .unwrap();
        (board, column)
    }

    async fn append_all(
        engine: &OrderingEngine,
        column_id: ColumnId,
        titles: &[&str],
    ) -> Vec<Card> {
        let mut cards = Vec::new();
        for title in titles {
            cards.push(
                engine
                    .append_card(column_id, title.to_string(), String::new())
                    .await
                    .unwrap(),
            );
        }
        cards
    }

    async fn titles(engine: &OrderingEngine, column_id: ColumnId) -> Vec<(String, i32)> {
        engine
            .list_cards(column_id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.title, c.position))
            .collect()
    }

    fn pairs(expected: &[&str]) -> Vec<(String, i32)> {
        expected
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i as i32))
            .collect()
    }

    #[tokio::test]
    async fn test_append_to_empty_column_gets_position_zero() {
        let engine = quiet_engine();
        let (_, column) = board_with_column(&engine).await;

        let card = engine
            .append_card(column.id, "First".to_string(), String::new())
            .await
            .unwrap();

        assert_eq!(card.position, 0);
        let second = engine
            .append_card(column.id, "Second".to_string(), String::new())
            .await
            .unwrap();
        assert_eq!(second.position, 1);
    }

    #[tokio::test]
    async fn test_delete_closes_gap() {
        let engine = quiet_engine();
        let (_, column) = board_with_column(&engine).await;
        let cards = append_all(&engine, column.id, &["A", "B", "C", "D"]).await;

        engine.delete_card(cards[1].id).await.unwrap();

        assert_eq!(titles(&engine, column.id).await, pairs(&["A", "C", "D"]));
    }

    #[tokio::test]
    async fn test_move_within_column() {
        let engine = quiet_engine();
        let (_, column) = board_with_column(&engine).await;
        let cards = append_all(&engine, column.id, &["A", "B", "C", "D"]).await;

        let moved = engine.move_card(cards[3].id, column.id, 1).await.unwrap();

        assert_eq!(moved.position, 1);
        assert_eq!(
            titles(&engine, column.id).await,
            pairs(&["A", "D", "B", "C"])
        );
    }

    #[tokio::test]
    async fn test_move_across_columns() {
        let engine = quiet_engine();
        let (board, left) = board_with_column(&engine).await;
        let right = engine
            .create_column(board.id, "Done".to_string())
            .await
            .unwrap();
        let cards = append_all(&engine, left.id, &["A", "B"]).await;
        append_all(&engine, right.id, &["X"]).await;

        let moved = engine.move_card(cards[0].id, right.id, 1).await.unwrap();

        assert_eq!(moved.column_id, right.id);
        assert_eq!(titles(&engine, left.id).await, pairs(&["B"]));
        assert_eq!(titles(&engine, right.id).await, pairs(&["X", "A"]));
    }

    #[tokio::test]
    async fn test_append_then_delete_restores_positions() {
        let engine = quiet_engine();
        let (_, column) = board_with_column(&engine).await;
        append_all(&engine, column.id, &["A", "B"]).await;
        let before = titles(&engine, column.id).await;

        let card = engine
            .append_card(column.id, "Temp".to_string(), String::new())
            .await
            .unwrap();
        engine.delete_card(card.id).await.unwrap();

        assert_eq!(titles(&engine, column.id).await, before);
    }

    #[tokio::test]
    async fn test_delete_missing_card_is_not_found_and_silent() {
        let mut notifier = MockChangeNotifier::new();
        // board + column + two appends
        notifier.expect_notify_changed().times(4).return_const(());
        let engine = engine_with(notifier);
        let (_, column) = board_with_column(&engine).await;
        append_all(&engine, column.id, &["A", "B"]).await;

        let err = engine.delete_card(Uuid::new_v4()).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(titles(&engine, column.id).await, pairs(&["A", "B"]));
    }

    #[tokio::test]
    async fn test_one_notification_per_mutation() {
        let mut notifier = MockChangeNotifier::new();
        // board, 2 columns, 2 appends, move, update, rename, delete card, delete column
        notifier.expect_notify_changed().times(10).return_const(());
        let engine = engine_with(notifier);

        let (board, left) = board_with_column(&engine).await;
        let right = engine
            .create_column(board.id, "Done".to_string())
            .await
            .unwrap();
        let cards = append_all(&engine, left.id, &["A", "B"]).await;
        engine.move_card(cards[0].id, right.id, 0).await.unwrap();
        engine
            .update_card(
                cards[1].id,
                CardUpdate {
                    title: Some("B2".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        engine
            .rename_column(left.id, "Doing".to_string())
            .await
            .unwrap();
        engine.delete_card(cards[1].id).await.unwrap();
        engine.delete_column(right.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_move_writes_nothing() {
        let mut notifier = MockChangeNotifier::new();
        notifier.expect_notify_changed().times(5).return_const(());
        let engine = engine_with(notifier);
        let (_, column) = board_with_column(&engine).await;
        let cards = append_all(&engine, column.id, &["A", "B", "C"]).await;

        let too_far = engine.move_card(cards[0].id, column.id, 3).await;
        let negative = engine.move_card(cards[0].id, column.id, -1).await;
        let nowhere = engine.move_card(cards[0].id, Uuid::new_v4(), 0).await;
        let ghost = engine.move_card(Uuid::new_v4(), column.id, 0).await;

        assert!(matches!(too_far, Err(KanbanError::InvalidArgument(_))));
        assert!(matches!(negative, Err(KanbanError::InvalidArgument(_))));
        assert!(nowhere.unwrap_err().is_not_found());
        assert!(ghost.unwrap_err().is_not_found());
        assert_eq!(titles(&engine, column.id).await, pairs(&["A", "B", "C"]));
    }

    #[tokio::test]
    async fn test_move_to_other_board_is_rejected() {
        let engine = quiet_engine();
        let (_, column) = board_with_column(&engine).await;
        let (_, foreign) = board_with_column(&engine).await;
        let cards = append_all(&engine, column.id, &["A"]).await;

        let result = engine.move_card(cards[0].id, foreign.id, 0).await;

        assert!(matches!(result, Err(KanbanError::InvalidArgument(_))));
        assert_eq!(titles(&engine, column.id).await, pairs(&["A"]));
    }

    #[tokio::test]
    async fn test_same_position_move_keeps_order() {
        let engine = quiet_engine();
        let (_, column) = board_with_column(&engine).await;
        let cards = append_all(&engine, column.id, &["A", "B", "C"]).await;

        let card = engine.move_card(cards[1].id, column.id, 1).await.unwrap();

        assert_eq!(card.position, 1);
        assert_eq!(titles(&engine, column.id).await, pairs(&["A", "B", "C"]));
    }

    #[tokio::test]
    async fn test_update_card_keeps_placement() {
        let engine = quiet_engine();
        let (_, column) = board_with_column(&engine).await;
        let cards = append_all(&engine, column.id, &["A", "B"]).await;

        let updated = engine
            .update_card(
                cards[0].id,
                CardUpdate {
                    title: None,
                    description: Some("more detail".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.description, "more detail");
        assert_eq!(updated.position, 0);
        assert!(matches!(
            engine.update_card(cards[0].id, CardUpdate::default()).await,
            Err(KanbanError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine
                .update_card(
                    cards[0].id,
                    CardUpdate {
                        title: Some("  ".to_string()),
                        description: None,
                    },
                )
                .await,
            Err(KanbanError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_column_keeps_columns_contiguous() {
        let engine = quiet_engine();
        let board = engine.create_board("Test Board".to_string()).await.unwrap();
        let mut columns = Vec::new();
        for title in ["Todo", "Doing", "Done"] {
            columns.push(
                engine
                    .create_column(board.id, title.to_string())
                    .await
                    .unwrap(),
            );
        }
        append_all(&engine, columns[1].id, &["A", "B"]).await;

        engine.delete_column(columns[1].id).await.unwrap();

        let view = engine.get_board(board.id).await.unwrap().unwrap();
        let names: Vec<(&str, i32)> = view
            .columns
            .iter()
            .map(|c| (c.title.as_str(), c.position))
            .collect();
        assert_eq!(names, vec![("Todo", 0), ("Done", 1)]);
        assert!(view.cards.is_empty());
        assert!(view.check_ordering().is_ok());
        assert!(engine.delete_column(columns[1].id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_ensure_board_is_find_or_create() {
        let mut notifier = MockChangeNotifier::new();
        notifier.expect_notify_changed().times(1).return_const(());
        let engine = engine_with(notifier);
        let id = Uuid::new_v4();

        let (created, was_created) = engine
            .ensure_board(id, "My Kanban Board".to_string())
            .await
            .unwrap();
        let (found, again) = engine
            .ensure_board(id, "Ignored".to_string())
            .await
            .unwrap();

        assert!(was_created);
        assert!(!again);
        assert_eq!(created.id, id);
        assert_eq!(found.title, "My Kanban Board");
    }

    #[tokio::test]
    async fn test_missing_parents_are_not_found() {
        let engine = quiet_engine();

        assert!(engine
            .create_column(Uuid::new_v4(), "Todo".to_string())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(engine
            .append_card(Uuid::new_v4(), "A".to_string(), String::new())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(engine
            .rename_column(Uuid::new_v4(), "Todo".to_string())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(engine.get_board(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_committed_changes() {
        let engine = quiet_engine();
        let mut rx = engine.subscribe();
        let (_, column) = board_with_column(&engine).await;

        assert_eq!(rx.recv().await.unwrap().name(), BoardUpdated::NAME);
        assert_eq!(rx.recv().await.unwrap(), BoardUpdated);
        let card = engine
            .append_card(column.id, "A".to_string(), String::new())
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), BoardUpdated);

        let _ = engine.move_card(card.id, column.id, 5).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_moves_keep_column_dense() {
        let engine = Arc::new(quiet_engine());
        let (_, column) = board_with_column(&engine).await;
        let cards = append_all(&engine, column.id, &["A", "B", "C", "D", "E", "F"]).await;

        let mut handles = Vec::new();
        for (i, card) in cards.iter().enumerate() {
            let engine = engine.clone();
            let card_id = card.id;
            let column_id = column.id;
            let target = ((i * 7 + 3) % cards.len()) as i32;
            handles.push(tokio::spawn(async move {
                engine.move_card(card_id, column_id, target).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let remaining = engine.list_cards(column.id).await.unwrap();
        assert_eq!(remaining.len(), 6);
        assert!(check_siblings(&remaining, column.id).is_ok());
    }
}
