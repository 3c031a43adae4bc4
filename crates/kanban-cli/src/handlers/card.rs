use crate::cli::{CardAction, CardUpdateArgs};
use crate::context::CliContext;
use crate::output;
use kanban_domain::{BoardOperations, CardUpdate};

pub async fn handle(ctx: &CliContext, action: CardAction) -> anyhow::Result<()> {
    match action {
        CardAction::Add {
            column_id,
            title,
            description,
        } => {
            let card = ctx.engine.append_card(column_id, title, description).await?;
            output::output_success(&card)
        }
        CardAction::Update(args) => {
            let CardUpdateArgs {
                id,
                title,
                description,
            } = args;
            let card = ctx
                .engine
                .update_card(id, CardUpdate { title, description })
                .await?;
            output::output_success(&card)
        }
        CardAction::Move {
            id,
            column_id,
            position,
        } => {
            let card = ctx.engine.move_card(id, column_id, position).await?;
            output::output_success(&card)
        }
        CardAction::Delete { id } => {
            ctx.engine.delete_card(id).await?;
            output::output_success(serde_json::json!({"deleted": id.to_string()}))
        }
        CardAction::List { column_id } => {
            let cards = ctx.engine.list_cards(column_id).await?;
            output::output_list(cards)
        }
    }
}
