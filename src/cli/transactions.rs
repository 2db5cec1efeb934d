use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::analysis::recent_transactions;
use crate::entries::{add_expense, add_income, list_expenses, list_incomes, NewEntry};
use crate::error::{FinwiseError, Result};
use crate::fmt::money;
use crate::models::{Category, TransactionType, ALL_CATEGORIES};
use crate::session::SessionContext;

pub fn add(
    session: &SessionContext,
    kind: &str,
    amount: f64,
    category: &str,
    date: Option<String>,
    description: String,
) -> Result<()> {
    let kind = TransactionType::from_name(kind)
        .ok_or_else(|| FinwiseError::Other(format!("Unknown type '{kind}': use income or expense")))?;
    let category = Category::from_name(category).ok_or_else(|| {
        let names: Vec<&str> = ALL_CATEGORIES.iter().map(|c| c.name()).collect();
        FinwiseError::Other(format!(
            "Unknown category '{category}'. Choose one of: {}",
            names.join(", ")
        ))
    })?;
    let entry = NewEntry {
        date: date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
        amount,
        category,
        description: description.trim().to_string(),
    };
    match kind {
        TransactionType::Income => {
            let income = add_income(session, entry)?;
            println!("Added income {} ({})", money(income.amount), income.category);
        }
        TransactionType::Expense => {
            let expense = add_expense(session, entry)?;
            println!("Added expense {} ({})", money(expense.amount), expense.category);
        }
    }
    Ok(())
}

pub fn list(session: &SessionContext, limit: usize) -> Result<()> {
    let store = &session.require_services()?.store;
    let user = session.require_user()?;
    let incomes = list_incomes(store.as_ref(), &user.uid)?;
    let expenses = list_expenses(store.as_ref(), &user.uid)?;
    let rows = recent_transactions(&incomes, &expenses, limit);
    if rows.is_empty() {
        println!("No transactions recorded. Add one with `finwise transactions add`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Type", "Category", "Description", "Amount"]);
    for t in rows {
        let (label, amount) = match t.kind {
            TransactionType::Income => ("income".green(), money(t.amount).green()),
            TransactionType::Expense => ("expense".red(), money(t.amount).red()),
        };
        table.add_row(vec![
            Cell::new(t.date),
            Cell::new(label),
            Cell::new(t.category.name()),
            Cell::new(t.description.unwrap_or_default()),
            Cell::new(amount),
        ]);
    }
    println!("Transactions\n{table}");
    Ok(())
}
