use regex::Regex;

use crate::models::{Category, TransactionType};

use Category::*;
use MatchType::{Contains, Regex as Re, StartsWith};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Contains,
    StartsWith,
    Regex,
}

pub struct Rule {
    pub pattern: &'static str,
    pub match_type: MatchType,
    pub category: Category,
    /// Restrict the rule to one side of the ledger.
    pub applies_to: Option<TransactionType>,
}

const fn rule(
    pattern: &'static str,
    match_type: MatchType,
    category: Category,
    applies_to: Option<TransactionType>,
) -> Rule {
    Rule {
        pattern,
        match_type,
        category,
        applies_to,
    }
}

const INCOME: Option<TransactionType> = Some(TransactionType::Income);
const EXPENSE: Option<TransactionType> = Some(TransactionType::Expense);

// First match wins, so more specific patterns come first.
pub const DEFAULT_RULES: &[Rule] = &[
    // Income
    rule("PAYROLL", Contains, Salary, INCOME),
    rule("SALARY", Contains, Salary, INCOME),
    rule(r"DIRECT\s*DEP", Re, Salary, INCOME),
    rule("DIVIDEND", Contains, Investments, INCOME),
    rule("INTEREST", Contains, Investments, INCOME),
    rule("BROKERAGE", Contains, Investments, INCOME),
    // Expenses
    rule("UBER EATS", Contains, Food, EXPENSE),
    rule("DOORDASH", Contains, Food, EXPENSE),
    rule("GRUBHUB", Contains, Food, EXPENSE),
    rule("WHOLE FOODS", Contains, Groceries, EXPENSE),
    rule("TRADER JOE", Contains, Groceries, EXPENSE),
    rule("KROGER", Contains, Groceries, EXPENSE),
    rule("SAFEWAY", Contains, Groceries, EXPENSE),
    rule("ALDI", StartsWith, Groceries, EXPENSE),
    rule("GROCER", Contains, Groceries, EXPENSE),
    rule("SUPERMARKET", Contains, Groceries, EXPENSE),
    rule("STARBUCKS", Contains, Food, EXPENSE),
    rule("MCDONALD", Contains, Food, EXPENSE),
    rule("RESTAURANT", Contains, Food, EXPENSE),
    rule("CAFE", Contains, Food, EXPENSE),
    rule("COFFEE", Contains, Food, EXPENSE),
    rule("PIZZA", Contains, Food, EXPENSE),
    rule("AIRLINE", Contains, Travel, EXPENSE),
    rule("AIRBNB", Contains, Travel, EXPENSE),
    rule("HOTEL", Contains, Travel, EXPENSE),
    rule("MARRIOTT", Contains, Travel, EXPENSE),
    rule("EXPEDIA", Contains, Travel, EXPENSE),
    rule("UBER", Contains, Transport, EXPENSE),
    rule("LYFT", Contains, Transport, EXPENSE),
    rule("SHELL", StartsWith, Transport, EXPENSE),
    rule("CHEVRON", Contains, Transport, EXPENSE),
    rule("EXXON", Contains, Transport, EXPENSE),
    rule("PARKING", Contains, Transport, EXPENSE),
    rule("TRANSIT", Contains, Transport, EXPENSE),
    rule("FUEL", Contains, Transport, EXPENSE),
    rule("NETFLIX", Contains, Entertainment, EXPENSE),
    rule("SPOTIFY", Contains, Entertainment, EXPENSE),
    rule("HULU", Contains, Entertainment, EXPENSE),
    rule("CINEMA", Contains, Entertainment, EXPENSE),
    rule("STEAM", StartsWith, Entertainment, EXPENSE),
    rule("PHARMACY", Contains, Health, EXPENSE),
    rule("CVS", StartsWith, Health, EXPENSE),
    rule("WALGREENS", Contains, Health, EXPENSE),
    rule("DENTAL", Contains, Health, EXPENSE),
    rule("CLINIC", Contains, Health, EXPENSE),
    rule("HOSPITAL", Contains, Health, EXPENSE),
    rule("GYM", Contains, Health, EXPENSE),
    rule("TUITION", Contains, Education, EXPENSE),
    rule("UDEMY", Contains, Education, EXPENSE),
    rule("COURSERA", Contains, Education, EXPENSE),
    rule("UNIVERSITY", Contains, Education, EXPENSE),
    rule("BOOKSTORE", Contains, Education, EXPENSE),
    rule(r"\bRENT\b", Re, Rent, EXPENSE),
    rule("LANDLORD", Contains, Rent, EXPENSE),
    rule("PROPERTY MGMT", Contains, Rent, EXPENSE),
    rule("ELECTRIC", Contains, BillsAndUtilities, EXPENSE),
    rule("UTILIT", Contains, BillsAndUtilities, EXPENSE),
    rule("COMCAST", Contains, BillsAndUtilities, EXPENSE),
    rule("VERIZON", Contains, BillsAndUtilities, EXPENSE),
    rule("AT&T", Contains, BillsAndUtilities, EXPENSE),
    rule("WATER", Contains, BillsAndUtilities, EXPENSE),
    rule("INSURANCE", Contains, BillsAndUtilities, EXPENSE),
    rule("AMAZON", Contains, Shopping, EXPENSE),
    rule("TARGET", Contains, Shopping, EXPENSE),
    rule("WALMART", Contains, Shopping, EXPENSE),
    rule("BEST BUY", Contains, Shopping, EXPENSE),
    rule("EBAY", Contains, Shopping, EXPENSE),
    rule("ROBINHOOD", Contains, Investments, EXPENSE),
    rule("VANGUARD", Contains, Investments, EXPENSE),
];

fn matches(description: &str, pattern: &str, match_type: MatchType) -> bool {
    let desc_upper = description.to_uppercase();
    let pat_upper = pattern.to_uppercase();
    match match_type {
        MatchType::Contains => desc_upper.contains(&pat_upper),
        MatchType::StartsWith => desc_upper.starts_with(&pat_upper),
        MatchType::Regex => Regex::new(&format!("(?i){pattern}"))
            .map(|re| re.is_match(description))
            .unwrap_or(false),
    }
}

/// Pick a category for a statement line. Falls back to `Other`.
pub fn categorize(description: &str, kind: TransactionType) -> Category {
    categorize_with(DEFAULT_RULES, description, kind)
}

pub fn categorize_with(rules: &[Rule], description: &str, kind: TransactionType) -> Category {
    rules
        .iter()
        .filter(|r| r.applies_to.map_or(true, |k| k == kind))
        .find(|r| matches(description, r.pattern, r.match_type))
        .map(|r| r.category)
        .unwrap_or(Category::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_rule() {
        assert_eq!(categorize("ADOBE * NETFLIX.COM", TransactionType::Expense), Entertainment);
        assert_eq!(categorize("Whole Foods Market #123", TransactionType::Expense), Groceries);
    }

    #[test]
    fn test_specific_pattern_beats_general() {
        assert_eq!(categorize("UBER EATS ORDER", TransactionType::Expense), Food);
        assert_eq!(categorize("UBER TRIP 8812", TransactionType::Expense), Transport);
    }

    #[test]
    fn test_starts_with_rule() {
        assert_eq!(categorize("SHELL OIL 5541", TransactionType::Expense), Transport);
        assert_eq!(categorize("SEASHELL GIFTS", TransactionType::Expense), Other);
    }

    #[test]
    fn test_regex_rule() {
        assert_eq!(categorize("ACME CORP DIRECT DEP", TransactionType::Income), Salary);
        assert_eq!(categorize("Monthly rent payment", TransactionType::Expense), Rent);
        assert_eq!(categorize("PARENT TEACHER ASSOC", TransactionType::Expense), Other);
    }

    #[test]
    fn test_rules_respect_transaction_type() {
        assert_eq!(categorize("ACME PAYROLL", TransactionType::Income), Salary);
        assert_eq!(categorize("ACME PAYROLL", TransactionType::Expense), Other);
        assert_eq!(categorize("INTEREST PAID", TransactionType::Income), Investments);
    }

    #[test]
    fn test_unmatched_falls_back_to_other() {
        assert_eq!(categorize("RANDOM VENDOR XYZ", TransactionType::Expense), Other);
        assert_eq!(categorize("VENMO FROM JO", TransactionType::Income), Other);
    }

    #[test]
    fn test_custom_rules() {
        let rules = [rule("GUITAR", Contains, Entertainment, None)];
        assert_eq!(categorize_with(&rules, "Guitar Center", TransactionType::Expense), Entertainment);
        assert_eq!(categorize_with(&rules, "Whole Foods", TransactionType::Expense), Other);
    }
}
