//! Database layer tests

use chrono::{Duration, Utc};

use super::users::strip_transport_prefix;
use super::Database;
use crate::models::{
    ExpenseFilter, ExpenseUpdate, MessageSource, NewExpense, FALLBACK_CATEGORY,
};

fn sample_expense(amount: f64, category: &str, description: &str) -> NewExpense {
    NewExpense {
        amount,
        category: category.to_string(),
        description: description.to_string(),
        date: None,
        source: MessageSource::Whatsapp,
        message_sid: Some("SM123".to_string()),
    }
}

#[test]
fn strip_transport_prefix_variants() {
    assert_eq!(strip_transport_prefix("whatsapp:+14155238886"), "+14155238886");
    assert_eq!(strip_transport_prefix("telegram:12345"), "12345");
    assert_eq!(strip_transport_prefix("+14155238886"), "+14155238886");
}

#[test]
fn resolve_contact_creates_then_reuses() {
    let db = Database::in_memory().unwrap();

    let first = db.resolve_contact("+14155238886").unwrap();
    assert_eq!(first.phone_number, "+14155238886");
    assert_eq!(first.name.as_deref(), Some("New User"));

    let second = db.resolve_contact("+14155238886").unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(db.count_users().unwrap(), 1);
}

#[test]
fn resolve_contact_is_race_safe() {
    let db = Database::in_memory().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            std::thread::spawn(move || db.resolve_contact("+15550001111").unwrap().id)
        })
        .collect();

    let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(db.count_users().unwrap(), 1);
}

#[test]
fn create_expense_rejects_negative_amount() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();

    let result = db.create_expense(user.id, &sample_expense(-5.0, "Groceries", "milk"));
    assert!(result.is_err());
    assert_eq!(
        db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
        0
    );
}

#[test]
fn create_expense_rejects_unknown_category() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();

    let result = db.create_expense(user.id, &sample_expense(5.0, "Spaceships", "rocket"));
    assert!(result.is_err());
}

#[test]
fn create_expense_accepts_fallback_category() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();

    let expense = db
        .create_expense(user.id, &sample_expense(9.99, FALLBACK_CATEGORY, "misc"))
        .unwrap();
    assert_eq!(expense.category, FALLBACK_CATEGORY);
    assert_eq!(expense.message_sid.as_deref(), Some("SM123"));
}

#[test]
fn list_expenses_newest_first() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();

    let now = Utc::now();
    for (offset_days, desc) in [(2, "oldest"), (0, "newest"), (1, "middle")] {
        let mut expense = sample_expense(10.0, "Groceries", desc);
        expense.date = Some(now - Duration::days(offset_days));
        db.create_expense(user.id, &expense).unwrap();
    }

    let listed = db
        .list_expenses(user.id, &ExpenseFilter::default(), 50, 0)
        .unwrap();
    let descriptions: Vec<&str> = listed.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(descriptions, vec!["newest", "middle", "oldest"]);
}

#[test]
fn list_expenses_filters_by_category_and_date() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();

    let now = Utc::now();
    let mut old = sample_expense(10.0, "Travel", "flight");
    old.date = Some(now - Duration::days(30));
    db.create_expense(user.id, &old).unwrap();
    db.create_expense(user.id, &sample_expense(20.0, "Groceries", "food"))
        .unwrap();

    let filter = ExpenseFilter {
        category: Some("Groceries".to_string()),
        ..Default::default()
    };
    let listed = db.list_expenses(user.id, &filter, 50, 0).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "food");

    let filter = ExpenseFilter {
        from: Some(now - Duration::days(7)),
        ..Default::default()
    };
    let listed = db.list_expenses(user.id, &filter, 50, 0).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].category, "Groceries");
}

#[test]
fn expense_access_is_owner_scoped() {
    let db = Database::in_memory().unwrap();
    let owner = db.resolve_contact("+1000").unwrap();
    let other = db.resolve_contact("+2000").unwrap();

    let expense = db
        .create_expense(owner.id, &sample_expense(15.0, "Groceries", "food"))
        .unwrap();

    // Reads, updates, and deletes from the other user look like not-found
    assert!(db.get_expense(other.id, expense.id).unwrap().is_none());
    assert!(db
        .update_expense(
            other.id,
            expense.id,
            &ExpenseUpdate {
                amount: Some(1.0),
                ..Default::default()
            }
        )
        .unwrap()
        .is_none());
    assert!(!db.delete_expense(other.id, expense.id).unwrap());

    // The owner still sees the original row
    let unchanged = db.get_expense(owner.id, expense.id).unwrap().unwrap();
    assert_eq!(unchanged.amount, 15.0);
}

#[test]
fn update_expense_changes_selected_fields() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();
    let expense = db
        .create_expense(user.id, &sample_expense(15.0, "Groceries", "food"))
        .unwrap();

    let updated = db
        .update_expense(
            user.id,
            expense.id,
            &ExpenseUpdate {
                amount: Some(18.5),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated.amount, 18.5);
    assert_eq!(updated.category, "Groceries");
    assert_eq!(updated.description, "food");
}

#[test]
fn category_totals_aggregates_per_category() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();

    db.create_expense(user.id, &sample_expense(10.0, "Groceries", "a"))
        .unwrap();
    db.create_expense(user.id, &sample_expense(5.5, "Groceries", "b"))
        .unwrap();
    db.create_expense(user.id, &sample_expense(20.0, "Travel", "c"))
        .unwrap();

    let stats = db
        .category_totals(user.id, &ExpenseFilter::default())
        .unwrap();
    assert_eq!(stats.count, 3);
    assert!((stats.total - 35.5).abs() < f64::EPSILON);
    assert_eq!(stats.by_category[0].category, "Travel");
    let groceries = stats
        .by_category
        .iter()
        .find(|c| c.category == "Groceries")
        .unwrap();
    assert!((groceries.total - 15.5).abs() < f64::EPSILON);
    assert_eq!(groceries.count, 2);
}

#[test]
fn category_totals_excludes_other_users() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();
    let other = db.resolve_contact("+2000").unwrap();

    db.create_expense(user.id, &sample_expense(10.0, "Groceries", "a"))
        .unwrap();
    db.create_expense(other.id, &sample_expense(99.0, "Travel", "b"))
        .unwrap();

    let stats = db
        .category_totals(user.id, &ExpenseFilter::default())
        .unwrap();
    assert_eq!(stats.count, 1);
    assert!((stats.total - 10.0).abs() < f64::EPSILON);
}

#[test]
fn monthly_limit_round_trip() {
    let db = Database::in_memory().unwrap();
    let user = db.resolve_contact("+1000").unwrap();
    assert!(user.monthly_limit.is_none());

    assert!(db.set_monthly_limit(user.id, Some(500.0)).unwrap());
    let reloaded = db.get_user(user.id).unwrap().unwrap();
    assert_eq!(reloaded.monthly_limit, Some(500.0));

    assert!(db.set_monthly_limit(user.id, None).unwrap());
    let reloaded = db.get_user(user.id).unwrap().unwrap();
    assert!(reloaded.monthly_limit.is_none());

    assert!(!db.set_monthly_limit(9999, Some(1.0)).unwrap());
}
