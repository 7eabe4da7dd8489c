mod config;
mod help;
mod repl;

use clap::{Parser, Subcommand};
use config::TermpilotConfig;
use repl::{render_stats, session_table, Repl};
use std::path::PathBuf;
use termpilot_session::FileSessionStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "termpilot",
    version,
    about = "termpilot: multi-session terminal with natural-language commands"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "termpilot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive terminal (default)
    Repl,
    /// Inspect and maintain stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List every session
    List,
    /// Show aggregate session statistics
    Stats,
    /// Remove sessions not used for a number of days
    Cleanup {
        /// Maximum age in days (overrides config)
        #[arg(long)]
        days: Option<u32>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("TERMPILOT_LOG_JSON").is_ok_and(|v| v == "1") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = TermpilotConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            let mut repl = Repl::from_config(&config)?;
            repl.run().await?;
        }
        Commands::Sessions { action } => {
            let store = FileSessionStore::new(&config.data_dir)?.without_process_chdir();
            match action {
                SessionAction::List => {
                    let current = store.current_session();
                    println!("{}", session_table(&store, current.as_deref())?);
                }
                SessionAction::Stats => println!(
                    "{}",
                    render_stats(&store.stats()?, &store.history().command_stats())
                ),
                SessionAction::Cleanup { days } => {
                    let days = days.unwrap_or(config.sessions.max_age_days);
                    let removed = store.cleanup_expired(days)?;
                    println!("Removed {removed} session(s) inactive for more than {days} day(s)");
                }
            }
        }
    }

    Ok(())
}
