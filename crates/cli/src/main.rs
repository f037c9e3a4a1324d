//! Brewline CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run the schema migrations
//! brew-cli migrate
//!
//! # Load categories, option groups and products from YAML
//! brew-cli seed menu -f menu.yaml
//!
//! # Give a signed-up account back office access
//! brew-cli staff grant -e barista@example.com -r staff
//!
//! # Turn it back into a customer account
//! brew-cli staff revoke -e barista@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string (read from `.env` too)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "brew-cli")]
#[command(author, version, about = "Brewline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage back office access
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert the menu from a YAML file
    Menu {
        /// Path to the menu file
        #[arg(short, long)]
        file: String,

        /// Only validate the file, do not touch the database
        #[arg(long)]
        check: bool,
    },
}

#[derive(Subcommand)]
enum StaffAction {
    /// Grant a back office role to an existing account
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Role to grant (`staff` or `admin`)
        #[arg(short, long, default_value = "staff")]
        role: String,
    },
    /// Demote an account back to customer
    Revoke {
        /// Account email address
        #[arg(short, long)]
        email: String,
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Menu { file, check } => commands::seed::menu(&file, check).await?,
        },
        Commands::Staff { action } => match action {
            StaffAction::Grant { email, role } => commands::staff::grant(&email, &role).await?,
            StaffAction::Revoke { email } => commands::staff::revoke(&email).await?,
        },
    }
    Ok(())
}
