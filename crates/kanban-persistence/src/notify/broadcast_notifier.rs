use crate::traits::{BoardUpdated, ChangeNotifier};
use tokio::sync::broadcast;

/// In-process `board.updated` fan-out over a tokio broadcast channel.
///
/// Subscribers that fall behind by more than the channel capacity see a
/// `Lagged` error and should simply refetch; the signal carries no data.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<BoardUpdated>,
}

impl BroadcastNotifier {
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn notify_changed(&self) {
        // Err only means nobody is listening.
        match self.tx.send(BoardUpdated) {
            Ok(receivers) => tracing::debug!(receivers, "emitted {}", BoardUpdated::NAME),
            Err(_) => tracing::trace!("no subscribers for {}", BoardUpdated::NAME),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<BoardUpdated> {
        self.tx.subscribe()
    }
}
