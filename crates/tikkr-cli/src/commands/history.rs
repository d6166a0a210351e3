use clap::Subcommand;
use tikkr_core::Database;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Most recent completed work sessions, as JSON
    List {
        /// Maximum number of entries
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Session and task totals
    Stats,
    /// Delete all history entries
    Clear,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { limit } => {
            let entries = db.history(limit)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        HistoryAction::Stats => {
            let stats = db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        HistoryAction::Clear => {
            let removed = db.clear_history()?;
            println!("removed {removed} entries");
        }
    }
    Ok(())
}
