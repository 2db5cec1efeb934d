use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::analysis::{category_breakdown, monthly_overview, recent_transactions, summarize, Summary};
use crate::error::{FinwiseError, Result};
use crate::extractor::extractor_for;
use crate::fmt::{money, month_label, percent};
use crate::models::{TransactionType, UploadHistoryItem};
use crate::session::{self, SessionContext};
use crate::upload::{get_upload, list_uploads, upload_statement};

const RECENT_ROWS: usize = 10;

pub fn format_summary(summary: &Summary) -> String {
    let mut table = Table::new();
    table.set_header(vec!["", "Amount"]);
    let balance = if summary.total_balance >= 0.0 {
        "Total Balance".green().bold()
    } else {
        "Total Balance".red().bold()
    };
    table.add_row(vec![Cell::new(balance), Cell::new(money(summary.total_balance))]);
    table.add_row(vec![
        Cell::new("Total Income".green()),
        Cell::new(money(summary.total_income)),
    ]);
    table.add_row(vec![
        Cell::new("Total Expenses".red()),
        Cell::new(money(summary.total_expenses)),
    ]);
    table.add_row(vec![
        Cell::new("Savings Rate".bold()),
        Cell::new(percent(summary.savings_rate)),
    ]);
    format!("Summary\n{table}")
}

fn format_breakdown(summary: &Summary) -> Option<String> {
    let rows = category_breakdown(&summary.expenses);
    if rows.is_empty() {
        return None;
    }
    let mut table = Table::new();
    table.set_header(vec!["Category", "Spent", "Share"]);
    for (category, total) in rows {
        let share = if summary.total_expenses > 0.0 {
            total / summary.total_expenses * 100.0
        } else {
            0.0
        };
        table.add_row(vec![
            Cell::new(category.name()),
            Cell::new(money(total)),
            Cell::new(percent(share)),
        ]);
    }
    Some(format!("Expenses by Category\n{table}"))
}

fn format_monthly(summary: &Summary) -> Option<String> {
    let months = monthly_overview(&summary.incomes, &summary.expenses);
    if months.len() < 2 {
        return None;
    }
    let mut table = Table::new();
    table.set_header(vec!["Month", "Income", "Expenses", "Net"]);
    for m in months {
        table.add_row(vec![
            Cell::new(month_label(&m.month)),
            Cell::new(money(m.income)),
            Cell::new(money(m.expenses)),
            Cell::new(money(m.income - m.expenses)),
        ]);
    }
    Some(format!("Monthly Overview\n{table}"))
}

fn format_recent(summary: &Summary) -> Option<String> {
    let rows = recent_transactions(&summary.incomes, &summary.expenses, RECENT_ROWS);
    if rows.is_empty() {
        return None;
    }
    let mut table = Table::new();
    table.set_header(vec!["Date", "Description", "Category", "Amount"]);
    for t in rows {
        let amount = match t.kind {
            TransactionType::Income => format!("+{}", money(t.amount)).green(),
            TransactionType::Expense => format!("-{}", money(t.amount)).red(),
        };
        table.add_row(vec![
            Cell::new(t.date),
            Cell::new(t.description.unwrap_or_default()),
            Cell::new(t.category.name()),
            Cell::new(amount),
        ]);
    }
    Some(format!("Recent Transactions\n{table}"))
}

/// Full analysis report for one extracted set.
pub fn format_analysis(summary: &Summary) -> String {
    let mut sections = vec![format_summary(summary)];
    sections.extend(format_monthly(summary));
    sections.extend(format_breakdown(summary));
    sections.extend(format_recent(summary));
    sections.join("\n\n")
}

pub fn format_history(items: &[UploadHistoryItem]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "File", "Type", "Uploaded", "Transactions"]);
    for item in items {
        table.add_row(vec![
            Cell::new(&item.id),
            Cell::new(&item.file_name),
            Cell::new(item.file_type.key().to_uppercase()),
            Cell::new(item.upload_date.get(..16).unwrap_or(item.upload_date.as_str()).replace('T', " ")),
            Cell::new(item.transaction_count),
        ]);
    }
    format!("Upload History\n{table}")
}

pub fn upload(session: &SessionContext, file: &str, extractor_url: Option<&str>) -> Result<()> {
    let extractor = extractor_for(extractor_url);
    let item = upload_statement(session, extractor.as_ref(), Path::new(file))?;
    println!(
        "Uploaded {}: {} transactions extracted.",
        item.file_name, item.transaction_count
    );
    println!();
    let summary = summarize(Some(&item.transactions), session.user());
    println!("{}", format_analysis(&summary));
    Ok(())
}

pub fn history(session: &SessionContext) -> Result<()> {
    let store = session::store(Some(session)).ok_or(FinwiseError::ServicesUnavailable)?;
    let user = session.require_user()?;
    let items = list_uploads(store.as_ref(), &user.uid)?;
    if items.is_empty() {
        println!("No uploads yet. Run `finwise upload <file>` to analyze a statement.");
        return Ok(());
    }
    println!("{}", format_history(&items));
    Ok(())
}

pub fn analysis(session: &SessionContext, id: &str) -> Result<()> {
    let store = &session.require_services()?.store;
    let user = session.require_user()?;
    let item = get_upload(store.as_ref(), &user.uid, id)?;
    println!("{} (uploaded {})", item.file_name, item.upload_date);
    println!();
    let summary = summarize(Some(&item.transactions), Some(user));
    println!("{}", format_analysis(&summary));
    Ok(())
}
