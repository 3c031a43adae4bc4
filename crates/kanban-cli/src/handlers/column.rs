use crate::cli::ColumnAction;
use crate::context::CliContext;
use crate::output;
use kanban_domain::BoardOperations;

pub async fn handle(ctx: &CliContext, action: ColumnAction) -> anyhow::Result<()> {
    match action {
        ColumnAction::Create { board_id, title } => {
            let column = ctx.engine.create_column(board_id, title).await?;
            output::output_success(&column)
        }
        ColumnAction::Rename { id, title } => {
            let column = ctx.engine.rename_column(id, title).await?;
            output::output_success(&column)
        }
        ColumnAction::Delete { id } => {
            ctx.engine.delete_column(id).await?;
            output::output_success(serde_json::json!({"deleted": id.to_string()}))
        }
    }
}
