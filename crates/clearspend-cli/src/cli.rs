//! CLI argument definitions

use clap::{Parser, Subcommand};

/// Default database location: ~/.local/share/clearspend/clearspend.db,
/// falling back to the working directory
pub fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|dir| {
            dir.join("clearspend")
                .join("clearspend.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| "clearspend.db".to_string())
}

#[derive(Parser)]
#[command(
    name = "clearspend",
    about = "ClearSpend - chat-based expense tracker",
    version
)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, global = true, default_value_t = default_db_path())]
    pub db: String,

    /// Open the database without encryption (not recommended for production)
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the webhook and API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable API authentication (local development only)
        #[arg(long)]
        no_auth: bool,
    },

    /// Show database status
    Status,

    /// Send an outbound message over a configured transport
    Send {
        /// Transport to use (whatsapp or telegram)
        #[arg(long, default_value = "whatsapp")]
        transport: String,

        /// Recipient (phone number or chat id)
        #[arg(long)]
        to: String,

        /// Message text
        #[arg(long)]
        text: String,
    },
}
