//! QReserve CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run marketplace database migrations
//! qr-cli migrate
//!
//! # Recompute a user's loyalty tier from their completed reservations
//! qr-cli loyalty recompute --user-id 42
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `loyalty recompute` - Re-run the loyalty tier evaluation for one user

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "qr-cli")]
#[command(author, version, about = "QReserve marketplace CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run marketplace database migrations
    Migrate,
    /// Loyalty discount maintenance
    Loyalty {
        #[command(subcommand)]
        action: LoyaltyAction,
    },
}

#[derive(Subcommand)]
enum LoyaltyAction {
    /// Recompute the loyalty tier for a user
    Recompute {
        /// User ID from the accounts service
        #[arg(short, long)]
        user_id: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::marketplace().await?,
        Commands::Loyalty { action } => match action {
            LoyaltyAction::Recompute { user_id } => {
                commands::loyalty::recompute(user_id).await?;
            }
        },
    }
    Ok(())
}
