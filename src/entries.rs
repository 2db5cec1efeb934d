use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FinwiseError, Result};
use crate::models::{Category, Expense, Income};
use crate::session::SessionContext;
use crate::store::{doc_path, DocumentStore};

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub date: String,
    pub amount: f64,
    pub category: Category,
    /// Expense description or income source.
    pub description: String,
}

impl NewEntry {
    fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(FinwiseError::Other(format!(
                "Amount must be greater than zero (got {})",
                self.amount
            )));
        }
        chrono::NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|_| {
            FinwiseError::Other(format!("Invalid date '{}': expected YYYY-MM-DD", self.date))
        })?;
        Ok(())
    }
}

fn collection(uid: &str, name: &str) -> String {
    doc_path(&["users", uid, name])
}

pub fn add_expense(session: &SessionContext, entry: NewEntry) -> Result<Expense> {
    entry.validate()?;
    let user = session.require_user()?;
    let store = &session.require_services()?.store;
    let mut expense = Expense {
        id: String::new(),
        user_id: user.uid.clone(),
        date: entry.date,
        amount: entry.amount,
        category: entry.category,
        description: entry.description,
    };
    expense.id = add_record(store.as_ref(), &collection(&user.uid, "expenses"), &expense)
        .inspect_err(|e| log::error!("Could not save expense: {e}"))?;
    log::info!("Added expense {}", expense.id);
    Ok(expense)
}

pub fn add_income(session: &SessionContext, entry: NewEntry) -> Result<Income> {
    entry.validate()?;
    let user = session.require_user()?;
    let store = &session.require_services()?.store;
    let mut income = Income {
        id: String::new(),
        user_id: user.uid.clone(),
        date: entry.date,
        amount: entry.amount,
        category: entry.category,
        source: entry.description,
        description: None,
    };
    income.id = add_record(store.as_ref(), &collection(&user.uid, "incomes"), &income)
        .inspect_err(|e| log::error!("Could not save income: {e}"))?;
    log::info!("Added income {}", income.id);
    Ok(income)
}

/// The store assigns the id; it lives in the document path, not the body.
fn add_record<T: Serialize>(store: &dyn DocumentStore, collection: &str, record: &T) -> Result<String> {
    let mut data = serde_json::to_value(record)?;
    if let Some(fields) = data.as_object_mut() {
        fields.remove("id");
    }
    store.add(collection, data)
}

pub fn list_expenses(store: &dyn DocumentStore, uid: &str) -> Result<Vec<Expense>> {
    list_sorted(store, &collection(uid, "expenses"), |e: &Expense| e.date.clone())
}

pub fn list_incomes(store: &dyn DocumentStore, uid: &str) -> Result<Vec<Income>> {
    list_sorted(store, &collection(uid, "incomes"), |i: &Income| i.date.clone())
}

fn list_sorted<T, F>(store: &dyn DocumentStore, collection: &str, date: F) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    F: Fn(&T) -> String,
{
    let mut rows = Vec::new();
    for (id, mut data) in store.list(collection)? {
        if let Some(fields) = data.as_object_mut() {
            fields.insert("id".into(), Value::String(id.clone()));
        }
        match serde_json::from_value::<T>(data) {
            Ok(row) => rows.push(row),
            Err(e) => log::warn!("Skipping unreadable entry {collection}/{id}: {e}"),
        }
    }
    rows.sort_by_key(|r| std::cmp::Reverse(date(r)));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::services::{ExecutionContext, ServiceInitializer};

    fn signed_in_session(dir: &std::path::Path) -> SessionContext {
        let config = BackendConfig {
            api_key: Some("key".into()),
            project_id: Some("entries-test".into()),
            ..Default::default()
        };
        let handles = ServiceInitializer::new(config, ExecutionContext::Client, dir.join("data"))
            .initialize()
            .unwrap();
        handles
            .auth
            .create_user_with_email_and_password("ada@example.com", "secret123")
            .unwrap();
        let mut session = SessionContext::mount(Some(handles));
        session.sync();
        session
    }

    fn entry(date: &str, amount: f64, category: Category, description: &str) -> NewEntry {
        NewEntry {
            date: date.into(),
            amount,
            category,
            description: description.into(),
        }
    }

    #[test]
    fn test_entries_are_stamped_with_session_user() {
        let dir = tempfile::tempdir().unwrap();
        let session = signed_in_session(dir.path());
        let uid = session.user().unwrap().uid.clone();

        let expense = add_expense(&session, entry("2025-01-02", 12.5, Category::Food, "Lunch")).unwrap();
        let income = add_income(&session, entry("2025-01-01", 900.0, Category::Salary, "ACME")).unwrap();
        assert_eq!(expense.user_id, uid);
        assert_eq!(income.user_id, uid);
        assert_eq!(income.source, "ACME");

        let store = session.services().unwrap().store.clone();
        let doc = store
            .get(&doc_path(&["users", &uid, "expenses", &expense.id]))
            .unwrap()
            .unwrap();
        assert_eq!(doc["description"], "Lunch");
        assert!(doc.get("id").is_none());
        assert_eq!(list_expenses(store.as_ref(), &uid).unwrap(), vec![expense]);
        assert_eq!(list_incomes(store.as_ref(), &uid).unwrap(), vec![income]);
    }

    #[test]
    fn test_listing_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let session = signed_in_session(dir.path());
        let uid = session.user().unwrap().uid.clone();
        add_expense(&session, entry("2025-01-02", 1.0, Category::Food, "a")).unwrap();
        add_expense(&session, entry("2025-03-02", 2.0, Category::Food, "b")).unwrap();
        let store = session.services().unwrap().store.clone();
        let dates: Vec<String> = list_expenses(store.as_ref(), &uid)
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec!["2025-03-02", "2025-01-02"]);
    }

    #[test]
    fn test_invalid_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = signed_in_session(dir.path());
        assert!(add_expense(&session, entry("2025-01-02", 0.0, Category::Food, "x")).is_err());
        assert!(add_expense(&session, entry("2025-01-02", -3.0, Category::Food, "x")).is_err());
        assert!(add_income(&session, entry("01/02/2025", 3.0, Category::Salary, "x")).is_err());
    }

    #[test]
    fn test_requires_signed_in_user() {
        let mut session = SessionContext::mount(None);
        session.sync();
        let err = add_expense(&session, entry("2025-01-02", 1.0, Category::Food, "x")).unwrap_err();
        assert!(matches!(err, FinwiseError::NotSignedIn));
    }
}
