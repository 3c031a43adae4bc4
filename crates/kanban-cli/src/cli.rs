use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "kanban")]
#[command(about = "A collaborative kanban board", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the SQLite database (or set KANBAN_DB env var)
    #[arg(long, global = true, value_name = "PATH", env = "KANBAN_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Board operations
    Board(BoardCommand),
    /// Column operations
    Column(ColumnCommand),
    /// Card operations
    Card(CardCommand),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// Board commands
#[derive(Args)]
pub struct BoardCommand {
    #[command(subcommand)]
    pub action: BoardAction,
}

#[derive(Subcommand)]
pub enum BoardAction {
    /// Create a new board
    Create {
        #[arg(long)]
        title: String,
    },
    /// Find a board by id, creating it if missing
    Ensure {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        title: String,
    },
    /// Make sure the default board exists
    EnsureDefault,
    /// Get a board with its columns and cards
    Get {
        #[arg(long)]
        id: Uuid,
    },
    /// List all boards
    List,
}

// Column commands
#[derive(Args)]
pub struct ColumnCommand {
    #[command(subcommand)]
    pub action: ColumnAction,
}

#[derive(Subcommand)]
pub enum ColumnAction {
    /// Append a column to a board
    Create {
        #[arg(long)]
        board_id: Uuid,
        #[arg(long)]
        title: String,
    },
    /// Rename a column
    Rename {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        title: String,
    },
    /// Delete a column and every card in it
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

// Card commands
#[derive(Args)]
pub struct CardCommand {
    #[command(subcommand)]
    pub action: CardAction,
}

#[derive(Subcommand)]
pub enum CardAction {
    /// Append a card to the end of a column
    Add {
        #[arg(long)]
        column_id: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Edit a card's title or description
    Update(CardUpdateArgs),
    /// Move a card to a position in a column
    Move {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        column_id: Uuid,
        #[arg(long, allow_negative_numbers = true)]
        position: i32,
    },
    /// Delete a card
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// List the cards of a column in order
    List {
        #[arg(long)]
        column_id: Uuid,
    },
}

#[derive(Args)]
pub struct CardUpdateArgs {
    #[arg(long)]
    pub id: Uuid,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}
