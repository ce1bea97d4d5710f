//! Shopfront CLI - Trusted admin management tools.
//!
//! # Usage
//!
//! ```bash
//! # Grant admin privileges to a user
//! shopfront-cli admin grant --user <USER_ID>
//!
//! # Resolve a user's admin status
//! shopfront-cli admin check --user <USER_ID>
//! ```
//!
//! # Commands
//!
//! - `admin grant` - Grant admin privileges with service credentials
//! - `admin check` - Resolve admin status, promoting listed users

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopfront-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage admin privileges
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant admin privileges to an existing user
    Grant {
        /// User ID (the identity provider's uid)
        #[arg(short, long)]
        user: String,
    },
    /// Resolve whether a user is an admin
    Check {
        /// User ID (the identity provider's uid)
        #[arg(short, long)]
        user: String,
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
        Commands::Admin { action } => match action {
            AdminAction::Grant { user } => commands::admin::grant(&user).await?,
            AdminAction::Check { user } => {
                if !commands::admin::check(&user).await? {
                    std::process::exit(2);
                }
            }
        },
    }
    Ok(())
}
