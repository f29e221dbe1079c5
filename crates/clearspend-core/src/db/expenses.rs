//! Expense CRUD and spending aggregation
//!
//! All operations are scoped to the owning user. Reads and writes against an
//! expense another user owns behave exactly like a missing row, so callers
//! cannot distinguish "not yours" from "does not exist".

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    is_valid_category, CategoryTotal, Expense, ExpenseFilter, ExpenseUpdate, NewExpense,
    SpendingStats,
};

fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    let source: String = row.get(6)?;
    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        date: parse_datetime(&row.get::<_, String>(5)?),
        source: source.parse().unwrap_or_default(),
        message_sid: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

const EXPENSE_COLUMNS: &str =
    "id, user_id, amount, category, description, date, source, message_sid, created_at, updated_at";

impl Database {
    /// Insert a new expense for a user
    ///
    /// Validates the amount and category before touching the database; the
    /// write is a single insert with no merge against prior rows.
    pub fn create_expense(&self, user_id: i64, expense: &NewExpense) -> Result<Expense> {
        if !expense.amount.is_finite() || expense.amount < 0.0 {
            return Err(Error::InvalidData(format!(
                "Expense amount must be non-negative, got {}",
                expense.amount
            )));
        }
        if !is_valid_category(&expense.category) {
            return Err(Error::InvalidData(format!(
                "Unknown category: {}",
                expense.category
            )));
        }

        let date = expense.date.unwrap_or_else(Utc::now);
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO expenses (user_id, amount, category, description, date, source, message_sid)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user_id,
                expense.amount,
                expense.category,
                expense.description,
                date.to_rfc3339(),
                expense.source.as_str(),
                expense.message_sid,
            ],
        )?;
        let id = conn.last_insert_rowid();

        let created = conn.query_row(
            &format!("SELECT {} FROM expenses WHERE id = ?1", EXPENSE_COLUMNS),
            params![id],
            row_to_expense,
        )?;
        Ok(created)
    }

    /// Get a single expense, scoped to the owning user
    pub fn get_expense(&self, user_id: i64, id: i64) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        let expense = conn
            .query_row(
                &format!(
                    "SELECT {} FROM expenses WHERE id = ?1 AND user_id = ?2",
                    EXPENSE_COLUMNS
                ),
                params![id, user_id],
                row_to_expense,
            )
            .optional()?;
        Ok(expense)
    }

    /// List a user's expenses, newest occurrence date first
    pub fn list_expenses(
        &self,
        user_id: i64,
        filter: &ExpenseFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Expense>> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?".to_string()];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(ref category) = filter.category {
            conditions.push("category = ?".to_string());
            params_vec.push(Box::new(category.clone()));
        }
        if let Some(from) = filter.from {
            conditions.push("date >= ?".to_string());
            params_vec.push(Box::new(from.to_rfc3339()));
        }
        if let Some(to) = filter.to {
            conditions.push("date <= ?".to_string());
            params_vec.push(Box::new(to.to_rfc3339()));
        }

        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(offset));

        let sql = format!(
            "SELECT {} FROM expenses WHERE {} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
            EXPENSE_COLUMNS,
            conditions.join(" AND ")
        );

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let expenses = stmt
            .query_map(param_refs.as_slice(), row_to_expense)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(expenses)
    }

    /// Count a user's expenses matching a filter
    pub fn count_expenses(&self, user_id: i64, filter: &ExpenseFilter) -> Result<i64> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?".to_string()];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(ref category) = filter.category {
            conditions.push("category = ?".to_string());
            params_vec.push(Box::new(category.clone()));
        }
        if let Some(from) = filter.from {
            conditions.push("date >= ?".to_string());
            params_vec.push(Box::new(from.to_rfc3339()));
        }
        if let Some(to) = filter.to {
            conditions.push("date <= ?".to_string());
            params_vec.push(Box::new(to.to_rfc3339()));
        }

        let sql = format!(
            "SELECT COUNT(*) FROM expenses WHERE {}",
            conditions.join(" AND ")
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let count = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Count all expenses across users (for status reporting)
    pub fn count_all_expenses(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Update an expense, scoped to the owning user
    ///
    /// Returns None when the row is missing or owned by someone else.
    pub fn update_expense(
        &self,
        user_id: i64,
        id: i64,
        update: &ExpenseUpdate,
    ) -> Result<Option<Expense>> {
        if let Some(amount) = update.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(Error::InvalidData(format!(
                    "Expense amount must be non-negative, got {}",
                    amount
                )));
            }
        }
        if let Some(ref category) = update.category {
            if !is_valid_category(category) {
                return Err(Error::InvalidData(format!("Unknown category: {}", category)));
            }
        }

        let existing = match self.get_expense(user_id, id)? {
            Some(expense) => expense,
            None => return Ok(None),
        };

        let amount = update.amount.unwrap_or(existing.amount);
        let category = update.category.clone().unwrap_or(existing.category);
        let description = update.description.clone().unwrap_or(existing.description);
        let date = update.date.unwrap_or(existing.date);

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE expenses
            SET amount = ?1, category = ?2, description = ?3, date = ?4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?5 AND user_id = ?6
            "#,
            params![amount, category, description, date.to_rfc3339(), id, user_id],
        )?;

        self.get_expense(user_id, id)
    }

    /// Delete an expense, scoped to the owning user
    ///
    /// Returns false when the row is missing or owned by someone else.
    pub fn delete_expense(&self, user_id: i64, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(deleted > 0)
    }

    /// Aggregate a user's spending by category, largest total first
    pub fn category_totals(&self, user_id: i64, filter: &ExpenseFilter) -> Result<SpendingStats> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?".to_string()];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(from) = filter.from {
            conditions.push("date >= ?".to_string());
            params_vec.push(Box::new(from.to_rfc3339()));
        }
        if let Some(to) = filter.to {
            conditions.push("date <= ?".to_string());
            params_vec.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = conditions.join(" AND ");
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let (total, count): (f64, i64) = conn.query_row(
            &format!(
                "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM expenses WHERE {}",
                where_clause
            ),
            param_refs.as_slice(),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT category, COALESCE(SUM(amount), 0), COUNT(*)
            FROM expenses
            WHERE {}
            GROUP BY category
            ORDER BY SUM(amount) DESC
            "#,
            where_clause
        ))?;
        let by_category = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok(CategoryTotal {
                    category: row.get(0)?,
                    total: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(SpendingStats {
            total,
            count,
            by_category,
        })
    }
}
