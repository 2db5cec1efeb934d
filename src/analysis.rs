use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::{AuthUser, Category, Expense, ExtractedTransaction, Income, Transaction, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Form,
    History,
    Analysis,
}

/// Which of the three dashboard views is showing, and the transaction set
/// the analysis view is built from.
#[derive(Debug, Clone)]
pub struct UploadDashboard {
    view: ViewState,
    analyzed: Option<Vec<ExtractedTransaction>>,
}

impl Default for UploadDashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadDashboard {
    pub fn new() -> Self {
        Self {
            view: ViewState::Form,
            analyzed: None,
        }
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn analyzed(&self) -> Option<&[ExtractedTransaction]> {
        self.analyzed.as_deref()
    }

    pub fn on_upload_success(&mut self, transactions: Vec<ExtractedTransaction>) {
        self.transition(ViewState::Analysis);
        self.analyzed = Some(transactions);
    }

    pub fn view_history(&mut self) {
        self.transition(ViewState::History);
    }

    /// Open a past upload from the history list.
    pub fn view_analysis(&mut self, transactions: Vec<ExtractedTransaction>) {
        self.transition(ViewState::Analysis);
        self.analyzed = Some(transactions);
    }

    pub fn back_to_form(&mut self) {
        self.transition(ViewState::Form);
    }

    /// Leave the analysis view and drop the extracted set.
    pub fn reset(&mut self) {
        self.analyzed = None;
        self.transition(ViewState::Form);
    }

    pub fn summary(&self, user: Option<&AuthUser>) -> Summary {
        summarize(self.analyzed(), user)
    }

    fn transition(&mut self, next: ViewState) {
        if self.view != next {
            log::debug!("dashboard view {:?} -> {:?}", self.view, next);
            self.view = next;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub total_balance: f64,
    /// Percentage of income kept, 0 when there is no income.
    pub savings_rate: f64,
    pub incomes: Vec<Income>,
    pub expenses: Vec<Expense>,
}

/// Split an extracted set into user-owned incomes and expenses and total them.
pub fn summarize(transactions: Option<&[ExtractedTransaction]>, user: Option<&AuthUser>) -> Summary {
    let (Some(transactions), Some(user)) = (transactions, user) else {
        return Summary::default();
    };

    let mut incomes = Vec::new();
    let mut expenses = Vec::new();
    for t in transactions {
        let description = t.description.as_str();
        match t.kind {
            TransactionType::Income => incomes.push(Income {
                id: Uuid::new_v4().to_string(),
                user_id: user.uid.clone(),
                date: t.date.clone(),
                amount: t.amount,
                category: t.category,
                source: non_empty_or(description, "No source"),
                description: (!description.is_empty()).then(|| description.to_string()),
            }),
            TransactionType::Expense => expenses.push(Expense {
                id: Uuid::new_v4().to_string(),
                user_id: user.uid.clone(),
                date: t.date.clone(),
                amount: t.amount,
                category: t.category,
                description: non_empty_or(description, "No description"),
            }),
        }
    }

    let total_income: f64 = incomes.iter().map(|i| i.amount).sum();
    let total_expenses: f64 = expenses.iter().map(|e| e.amount).sum();
    let total_balance = total_income - total_expenses;
    let savings_rate = if total_income > 0.0 {
        total_balance / total_income * 100.0
    } else {
        0.0
    };

    Summary {
        total_income,
        total_expenses,
        total_balance,
        savings_rate,
        incomes,
        expenses,
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Presentation helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonthTotals {
    /// `YYYY-MM`
    pub month: String,
    pub income: f64,
    pub expenses: f64,
}

/// Income and expense totals per calendar month, oldest first.
pub fn monthly_overview(incomes: &[Income], expenses: &[Expense]) -> Vec<MonthTotals> {
    let mut months: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for i in incomes {
        months.entry(month_key(&i.date)).or_default().0 += i.amount;
    }
    for e in expenses {
        months.entry(month_key(&e.date)).or_default().1 += e.amount;
    }
    months
        .into_iter()
        .map(|(month, (income, expenses))| MonthTotals {
            month,
            income,
            expenses,
        })
        .collect()
}

fn month_key(date: &str) -> String {
    date.get(..7).unwrap_or(date).to_string()
}

/// The `limit` most recent rows across both sides, newest first.
pub fn recent_transactions(incomes: &[Income], expenses: &[Expense], limit: usize) -> Vec<Transaction> {
    let mut rows: Vec<Transaction> = incomes
        .iter()
        .map(|i| Transaction {
            id: i.id.clone(),
            date: i.date.clone(),
            amount: i.amount,
            kind: TransactionType::Income,
            category: i.category,
            description: Some(i.source.clone()),
        })
        .chain(expenses.iter().map(|e| Transaction {
            id: e.id.clone(),
            date: e.date.clone(),
            amount: e.amount,
            kind: TransactionType::Expense,
            category: e.category,
            description: Some(e.description.clone()),
        }))
        .collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows.truncate(limit);
    rows
}

/// Expense totals per category, largest first.
pub fn category_breakdown(expenses: &[Expense]) -> Vec<(Category, f64)> {
    let mut totals: BTreeMap<Category, f64> = BTreeMap::new();
    for e in expenses {
        *totals.entry(e.category).or_default() += e.amount;
    }
    let mut rows: Vec<(Category, f64)> = totals.into_iter().collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));
    rows
}
