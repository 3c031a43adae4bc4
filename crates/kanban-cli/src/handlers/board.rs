use crate::cli::BoardAction;
use crate::context::{CliContext, DEFAULT_BOARD_ID};
use crate::output;
use kanban_domain::{Board, BoardOperations};
use serde::Serialize;

#[derive(Serialize)]
struct EnsuredBoard {
    #[serde(flatten)]
    board: Board,
    created: bool,
}

pub async fn handle(ctx: &CliContext, action: BoardAction) -> anyhow::Result<()> {
    match action {
        BoardAction::Create { title } => {
            let board = ctx.engine.create_board(title).await?;
            output::output_success(&board)
        }
        BoardAction::Ensure { id, title } => {
            let (board, created) = ctx.engine.ensure_board(id, title).await?;
            output::output_success(EnsuredBoard { board, created })
        }
        BoardAction::EnsureDefault => {
            let title = ctx.config.effective_default_board_title().to_string();
            let (board, created) = ctx.engine.ensure_board(DEFAULT_BOARD_ID, title).await?;
            if created {
                tracing::info!("created default board {}", board.id);
            }
            output::output_success(EnsuredBoard { board, created })
        }
        BoardAction::Get { id } => match ctx.engine.get_board(id).await? {
            Some(view) => output::output_success(&view),
            None => output::output_error(&format!("Board not found: {}", id)),
        },
        BoardAction::List => {
            let boards = ctx.engine.list_boards().await?;
            output::output_list(boards)
        }
    }
}
