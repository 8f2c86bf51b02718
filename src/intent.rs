//! Keyword-rule intent classification. A single stateless pass over the
//! lower-cased query walks an ordered rule table; the first matching rule
//! wins, so more specific phrasings are declared before general ones (the
//! bare "revenue" fallback is last). Classification never fails: anything
//! unmatched becomes [`Intent::Unknown`] and the engine is never invoked.

use crate::metrics::DEFAULT_RUNWAY_LOOKBACK;
use crate::utils::month_start;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TREND_LOOKBACK: usize = 3;
const DEFAULT_GROWTH_LOOKBACK: usize = 12;
const DEFAULT_TOP_EXPENSES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    RevenueVsBudget {
        period: Option<NaiveDate>,
    },
    GrossMarginTrend {
        lookback_months: usize,
    },
    EbitdaTrend,
    OpexBreakdown {
        period: Option<NaiveDate>,
        category: Option<String>,
    },
    CashRunway {
        lookback_months: usize,
    },
    BurnRate,
    BudgetVariance {
        period: Option<NaiveDate>,
    },
    PnlStatement {
        period: Option<NaiveDate>,
    },
    MonthlyComparison,
    QuarterlySummary,
    RevenueGrowth {
        lookback_months: usize,
    },
    TopExpenses {
        limit: usize,
    },
    Dashboard,
    Unknown {
        query: String,
    },
}

lazy_static! {
    static ref MONTH_YEAR: Regex = Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{4})\b"
    )
    .unwrap();
    static ref ISO_MONTH: Regex = Regex::new(r"\b(\d{4})-(\d{2})\b").unwrap();
    static ref LAST_N_MONTHS: Regex = Regex::new(r"(?i)\blast\s+(\d{1,2})\s+months?\b").unwrap();
    static ref OPEX_CATEGORY: Regex =
        Regex::new(r"(?i)\bopex[:\s]+([a-z][a-z&]*)\b").unwrap();
}

/// Ordered (predicate, constructor) rule table. Declaration order is the
/// precedence order and is pinned by tests.
static RULES: &[(fn(&str) -> bool, fn(&str) -> Intent)] = &[
    (
        |q| q.contains("cash runway") || (q.contains("runway") && q.contains("cash")),
        |q| Intent::CashRunway {
            lookback_months: extract_lookback(q, DEFAULT_RUNWAY_LOOKBACK),
        },
    ),
    (
        |q| q.contains("revenue") && q.contains("budget"),
        |q| Intent::RevenueVsBudget {
            period: extract_period(q),
        },
    ),
    (
        |q| q.contains("gross margin") && (q.contains("trend") || q.contains("last")),
        |q| Intent::GrossMarginTrend {
            lookback_months: extract_lookback(q, DEFAULT_TREND_LOOKBACK),
        },
    ),
    (
        |q| q.contains("ebitda") || q.contains("earnings"),
        |_| Intent::EbitdaTrend,
    ),
    (
        |q| {
            q.contains("month over month")
                || q.contains("monthly comparison")
                || q.split_whitespace().any(|w| w == "mom")
        },
        |_| Intent::MonthlyComparison,
    ),
    (
        |q| {
            (q.contains("profit and loss") || q.contains("p&l") || q.contains("income statement"))
                && !q.contains("trend")
        },
        |q| Intent::PnlStatement {
            period: extract_period(q),
        },
    ),
    (
        |q| (q.contains("variance") || q.contains("vs budget")) && !q.contains("revenue"),
        |q| Intent::BudgetVariance {
            period: extract_period(q),
        },
    ),
    (
        |q| q.split_whitespace().any(|w| w.starts_with("quarter")),
        |_| Intent::QuarterlySummary,
    ),
    (
        |q| q.contains("burn rate") || q.contains("monthly burn") || q.contains("spending rate"),
        |_| Intent::BurnRate,
    ),
    (
        |q| {
            q.contains("financial health")
                || q.contains("key metrics")
                || q.contains("kpi")
                || q.contains("financial summary")
                || q.contains("performance metrics")
        },
        |_| Intent::QuarterlySummary,
    ),
    (
        |q| {
            q.contains("top expenses")
                || q.contains("biggest costs")
                || q.contains("largest expenses")
        },
        |_| Intent::TopExpenses {
            limit: DEFAULT_TOP_EXPENSES,
        },
    ),
    (
        |q| q.contains("revenue growth") || q.contains("growth rate") || q.contains("revenue trend"),
        |q| Intent::RevenueGrowth {
            lookback_months: extract_lookback(q, DEFAULT_GROWTH_LOOKBACK),
        },
    ),
    (
        |q| {
            (q.contains("opex") || q.contains("operating expense"))
                && (q.contains("breakdown") || q.contains("by category") || q.contains("break down"))
        },
        |q| Intent::OpexBreakdown {
            period: extract_period(q),
            category: extract_category(q),
        },
    ),
    (
        |q| q.contains("dashboard") || q.contains("overview") || q.contains("summary"),
        |_| Intent::Dashboard,
    ),
    // Bare "revenue" catch-all stays last among the matchers.
    (
        |q| q.contains("revenue"),
        |q| Intent::RevenueVsBudget {
            period: extract_period(q),
        },
    ),
];

pub fn classify(query: &str) -> Intent {
    let lower = query.to_lowercase();
    for (matches, build) in RULES {
        if matches(&lower) {
            return build(&lower);
        }
    }
    Intent::Unknown {
        query: query.trim().to_string(),
    }
}

/// Pulls a month mention out of the query: "June 2025" or "2025-06".
fn extract_period(query: &str) -> Option<NaiveDate> {
    if let Some(caps) = MONTH_YEAR.captures(query) {
        let month = crate::utils::month_number_from_name(&caps[1])?;
        let year: i32 = caps[2].parse().ok()?;
        return month_start(year, month).ok();
    }
    if let Some(caps) = ISO_MONTH.captures(query) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return month_start(year, month).ok();
    }
    None
}

fn extract_lookback(query: &str, default: usize) -> usize {
    LAST_N_MONTHS
        .captures(query)
        .and_then(|caps| caps[1].parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// "opex marketing breakdown" -> Some("marketing"). Generic words that follow
/// "opex" in ordinary phrasings are not categories.
fn extract_category(query: &str) -> Option<String> {
    let caps = OPEX_CATEGORY.captures(query)?;
    let word = caps[1].to_string();
    const GENERIC: &[&str] = &[
        "breakdown", "by", "for", "in", "category", "categories", "trend", "spend", "spending",
    ];
    if GENERIC.contains(&word.as_str()) {
        None
    } else {
        Some(word)
    }
}
