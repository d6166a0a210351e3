use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod notifier;

#[derive(Parser)]
#[command(name = "tikkr", version, about = "Tikkr pomodoro timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive timer
    Run {
        /// Wake-up period in milliseconds
        #[arg(long, default_value_t = tikkr_core::timer::DEFAULT_TICK_MS)]
        tick_ms: u64,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Completed session history
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TIKKR_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { tick_ms } => commands::timer::run(tick_ms),
        Commands::Config { action } => commands::config::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::History { action } => commands::history::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
