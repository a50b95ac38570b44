//! Portal CLI - terminal client for the internship and course portal
//!
//! Chat with companies or students, manage the admin entity tables and run the
//! same-origin media proxy.

mod api;
mod auth;
mod chat;
mod config;
mod crud;
mod models;
mod proxy;
mod tui;

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth::{LoginMethod, Role};
use models::EntityKind;

/// Environment variable read for the password when `--password` is absent.
const PASSWORD_ENV: &str = "PORTAL_PASSWORD";

#[derive(Parser)]
#[command(name = "portal-cli")]
#[command(about = "Terminal client for the internship and course portal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password, or import an existing token
    Login {
        /// Account email
        #[arg(short, long, conflicts_with = "token")]
        email: Option<String>,

        /// Password (falls back to $PORTAL_PASSWORD, then a prompt)
        #[arg(short, long, requires = "email")]
        password: Option<String>,

        /// Bearer token copied from the web portal
        #[arg(long, requires = "role")]
        token: Option<String>,

        /// Role of the imported token
        #[arg(long, value_enum)]
        role: Option<Role>,

        /// User id of the imported token (used to tell own messages apart)
        #[arg(long, requires = "token")]
        user_id: Option<String>,

        /// Display name of the imported token
        #[arg(long, requires = "token")]
        user_name: Option<String>,
    },

    /// Log out and clear the stored session
    Logout,

    /// Show the API endpoint and session
    Status,

    /// List chat contacts
    Contacts,

    /// Read messages exchanged with a contact
    Read {
        /// Contact ID (from `contacts` output)
        contact_id: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// Contact ID (from `contacts` output)
        #[arg(short, long)]
        to: String,

        /// Message content
        message: String,
    },

    /// Print incoming messages from a contact's chat room until Ctrl-C
    Listen {
        /// Contact ID (from `contacts` output)
        contact_id: String,
    },

    /// Manage skills, perks, cities and the other entity tables
    Entities {
        #[command(subcommand)]
        command: EntityCommand,
    },

    /// Serve the media proxy (`GET /media?url=...`)
    ServeMedia {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8787")]
        addr: SocketAddr,
    },

    /// Launch the chat shell
    Tui,
}

#[derive(Subcommand)]
enum EntityCommand {
    /// List one page of entities
    List {
        #[arg(value_enum)]
        kind: EntityKind,

        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Rows per page (defaults to the config value)
        #[arg(long)]
        per_page: Option<u32>,

        /// Server-side search term
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Create an entity
    Create {
        #[arg(value_enum)]
        kind: EntityKind,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Update an entity
    Update {
        #[arg(value_enum)]
        kind: EntityKind,

        id: String,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete an entity
    Delete {
        #[arg(value_enum)]
        kind: EntityKind,

        id: String,
    },
}

/// Read the password from the environment or prompt for it on stdin.
fn read_password(flag: Option<String>) -> Result<String> {
    if let Some(password) = flag.or_else(|| std::env::var(PASSWORD_ENV).ok()) {
        return Ok(password);
    }
    print!("Password: ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn init_logging(verbose: bool, tui_log: Option<&tui::LogBuffer>) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    match tui_log {
        // Keep log lines off the alternate screen.
        Some(buffer) => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(buffer.clone()),
            )
            .init(),
        None => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let tui_log = matches!(cli.command, Commands::Tui).then(tui::LogBuffer::new);
    init_logging(cli.verbose, tui_log.as_ref());

    match cli.command {
        Commands::Login {
            email,
            password,
            token,
            role,
            user_id,
            user_name,
        } => {
            let method = match (token, role, email) {
                (Some(token), Some(role), _) => LoginMethod::Token {
                    token,
                    role,
                    user_id,
                    user_name,
                },
                (None, _, Some(email)) => LoginMethod::Credentials {
                    email,
                    password: read_password(password)?,
                },
                _ => anyhow::bail!("Pass --email, or --token with --role"),
            };
            tracing::info!("Signing in...");
            auth::login(method).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Contacts => {
            tracing::info!("Fetching contacts...");
            api::list_contacts().await?;
        }
        Commands::Read { contact_id, limit } => {
            api::read_messages(&contact_id, limit).await?;
        }
        Commands::Send { to, message } => {
            tracing::info!("Sending message...");
            api::send_message(&to, &message).await?;
        }
        Commands::Listen { contact_id } => {
            api::listen(&contact_id).await?;
        }
        Commands::Entities { command } => match command {
            EntityCommand::List {
                kind,
                page,
                per_page,
                search,
            } => {
                api::list_entities(kind, page, per_page, search.as_deref()).await?;
            }
            EntityCommand::Create {
                kind,
                name,
                description,
            } => {
                api::create_entity(kind, &name, description).await?;
            }
            EntityCommand::Update {
                kind,
                id,
                name,
                description,
            } => {
                api::update_entity(kind, &id, &name, description).await?;
            }
            EntityCommand::Delete { kind, id } => {
                api::delete_entity(kind, &id).await?;
            }
        },
        Commands::ServeMedia { addr } => {
            proxy::serve(addr).await?;
        }
        Commands::Tui => {
            tui::run(tui_log.unwrap_or_default()).await?;
        }
    }

    Ok(())
}
