//! CLI command implementations

use anyhow::{bail, Context, Result};

use clearspend_core::{Database, OutboundMessenger};
use clearspend_server::ServerConfig;

/// Open the database, creating parent directories as needed
fn open_database(path: &str, no_encrypt: bool) -> Result<Database> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let db = if no_encrypt {
        Database::new_unencrypted(path)?
    } else {
        Database::new(path)?
    };
    Ok(db)
}

pub fn cmd_init(db_path: &str, no_encrypt: bool) -> Result<()> {
    let db = open_database(db_path, no_encrypt)?;
    println!("Database initialized at {}", db.path());
    if db.is_encrypted()? {
        println!("Encryption: enabled");
    } else {
        println!("Encryption: disabled");
    }
    Ok(())
}

pub async fn cmd_serve(
    db_path: &str,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_database(db_path, no_encrypt)?;

    let config = ServerConfig {
        require_auth: !no_auth,
        ..ServerConfig::from_env()
    };

    clearspend_server::serve_with_config(db, host, port, config).await
}

pub fn cmd_status(db_path: &str, no_encrypt: bool) -> Result<()> {
    let db = open_database(db_path, no_encrypt)?;

    println!("Database: {}", db.path());
    println!("Users: {}", db.count_users()?);
    println!("Expenses: {}", db.count_all_expenses()?);

    Ok(())
}

pub async fn cmd_send(transport: &str, to: &str, text: &str) -> Result<()> {
    let messenger = OutboundMessenger::from_env();

    match transport.to_lowercase().as_str() {
        "whatsapp" => messenger.send_whatsapp(to, text).await?,
        "telegram" => messenger.send_telegram(to, text).await?,
        other => bail!("Unknown transport: {} (expected whatsapp or telegram)", other),
    }

    println!("Message sent to {} via {}", to, transport);
    Ok(())
}
