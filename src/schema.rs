use crate::fx::FxTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the actuals or budget table, normalized at load time: period is
/// the first day of its month and currency is an upper-case ISO code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub period: NaiveDate,
    pub entity: Option<String>,
    /// Hierarchical account name, e.g. "Revenue" or "Opex:Marketing".
    pub account: String,
    pub currency: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub period: NaiveDate,
    pub currency: String,
    pub rate_to_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashBalance {
    pub period: NaiveDate,
    pub currency: String,
    pub amount: f64,
}

/// The session's working set. Loaded once, never mutated afterwards, so it can
/// be shared read-only across queries without locking.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub actuals: Vec<FinancialRecord>,
    pub budget: Vec<FinancialRecord>,
    pub fx: FxTable,
    pub cash: Vec<CashBalance>,
}

/// Account taxonomy predicates. Matching is case-insensitive and deliberately
/// loose about naming conventions ("Revenue", "Product Sales", "Cost of Goods
/// Sold", "Opex:Marketing", "Operating Expenses - Rent" all resolve).
pub fn is_revenue(account: &str) -> bool {
    let lower = account.to_lowercase();
    lower == "revenue" || word_match(&lower, "sales")
}

pub fn is_cogs(account: &str) -> bool {
    let lower = account.to_lowercase();
    lower == "cogs" || lower.contains("cost of goods")
}

pub fn is_opex(account: &str) -> bool {
    let lower = account.to_lowercase();
    lower.starts_with("opex") || lower.contains("operating expense")
}

/// Category for opex grouping: the substring after the "Opex:" prefix. A bare
/// "Opex" account with no subcategory keeps its own name, so every opex row
/// lands in exactly one category and breakdown totals match the opex total.
pub fn opex_category(account: &str) -> String {
    let trimmed = account.trim();
    match trimmed.split_once(':') {
        Some((prefix, rest)) if prefix.trim().eq_ignore_ascii_case("opex") => {
            rest.trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}

fn word_match(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == word)
}
