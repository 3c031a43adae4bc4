use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BoardId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(title: String) -> Self {
        Self::with_id(Uuid::new_v4(), title)
    }

    /// Builds a board under a caller-chosen id, used by find-or-create.
    pub fn with_id(id: BoardId, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_title(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_id_keeps_id() {
        let id = Uuid::new_v4();
        let board = Board::with_id(id, "Team".to_string());
        assert_eq!(board.id, id);
        assert_eq!(board.created_at, board.updated_at);
    }

    #[test]
    fn test_update_title_touches_timestamp() {
        let mut board = Board::new("Old".to_string());
        let before = board.updated_at;
        board.update_title("New".to_string());
        assert_eq!(board.title, "New");
        assert!(board.updated_at >= before);
    }
}
