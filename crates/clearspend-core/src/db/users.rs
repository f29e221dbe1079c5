//! User resolution and profile operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::User;

/// Default display name assigned on first contact
pub const DEFAULT_USER_NAME: &str = "New User";

/// Strip a transport tag (`whatsapp:`, `telegram:`) from a raw sender
/// identifier, yielding the stable lookup key.
pub fn strip_transport_prefix(raw: &str) -> &str {
    raw.strip_prefix("whatsapp:")
        .or_else(|| raw.strip_prefix("telegram:"))
        .unwrap_or(raw)
        .trim()
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        telegram_id: row.get(2)?,
        name: row.get(3)?,
        monthly_limit: row.get(4)?,
        sheet_id: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        last_seen_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const USER_COLUMNS: &str =
    "id, phone_number, telegram_id, name, monthly_limit, sheet_id, created_at, last_seen_at";

impl Database {
    /// Resolve an inbound contact to a user row, creating it on first contact.
    ///
    /// Uses a single upsert against the `phone_number` uniqueness constraint so
    /// two near-simultaneous first contacts cannot create two rows. Bumps
    /// `last_seen_at` on every contact.
    pub fn resolve_contact(&self, phone_number: &str) -> Result<User> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO users (phone_number, name)
            VALUES (?1, ?2)
            ON CONFLICT(phone_number) DO UPDATE SET last_seen_at = CURRENT_TIMESTAMP
            "#,
            params![phone_number, DEFAULT_USER_NAME],
        )?;

        let user = conn.query_row(
            &format!("SELECT {} FROM users WHERE phone_number = ?1", USER_COLUMNS),
            params![phone_number],
            row_to_user,
        )?;

        Ok(user)
    }

    /// Look up a user by normalized phone number
    pub fn find_user_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE phone_number = ?1", USER_COLUMNS),
                params![phone_number],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up a user by id
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Set or clear a user's monthly spending limit
    ///
    /// Returns false if the user does not exist.
    pub fn set_monthly_limit(&self, user_id: i64, limit: Option<f64>) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET monthly_limit = ?1 WHERE id = ?2",
            params![limit, user_id],
        )?;
        Ok(changed > 0)
    }

    /// Update a user's display name
    pub fn set_user_name(&self, user_id: i64, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET name = ?1 WHERE id = ?2",
            params![name, user_id],
        )?;
        Ok(changed > 0)
    }

    /// Count users (for status reporting)
    pub fn count_users(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}
