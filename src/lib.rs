//! # CFO Copilot
//!
//! A library that answers natural-language FP&A questions ("What was June
//! 2025 revenue vs budget?", "What is our cash runway right now?") over
//! tabular financial data.
//!
//! ## Core Concepts
//!
//! - **Dataset**: actuals, budget, FX rates, and cash balances loaded once
//!   per session from CSV files and never mutated afterwards
//! - **Intent Classification**: an ordered keyword-rule table maps a free-text
//!   query to a metric intent plus extracted parameters (period, lookback,
//!   category); unmatched queries become a defined `Unknown` fallback
//! - **Metric Engine**: pure functions computing revenue-vs-budget variance,
//!   gross margin, EBITDA, opex breakdown, burn rate, cash runway and more,
//!   always over USD-converted amounts
//! - **Report Payloads**: every result flattens into labeled values plus time
//!   series for an external report/PDF renderer
//!
//! ## Example
//!
//! ```rust,ignore
//! use cfo_copilot::Copilot;
//! use std::path::Path;
//!
//! let copilot = Copilot::load(
//!     Path::new("fixtures/actuals.csv"),
//!     Path::new("fixtures/budget.csv"),
//!     Path::new("fixtures/fx.csv"),
//!     Path::new("fixtures/cash.csv"),
//! )?;
//!
//! match copilot.answer("What is our cash runway right now?")? {
//!     cfo_copilot::Answer::Metric(result) => println!("{}", result.to_report().to_json()?),
//!     cfo_copilot::Answer::Unknown { query } => println!("Can't help with '{}'", query),
//! }
//! ```

pub mod error;
pub mod fx;
pub mod intent;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod schema;
pub mod utils;

pub use error::{CopilotError, Result};
pub use fx::FxTable;
pub use intent::{classify, Intent};
pub use loader::{load_dataset, read_cash_balances, read_fx_rates, read_records};
pub use metrics::{Engine, MetricResult, DEFAULT_RUNWAY_LOOKBACK};
pub use report::{LabeledValue, ReportPayload, Series, SeriesPoint, Unit};
pub use schema::{CashBalance, Dataset, FinancialRecord, FxRate};

use log::{debug, info};
use metrics::DashboardSummary;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of a query: either a computed metric, or the unknown-intent
/// fallback the presentation layer turns into a help response. The engine is
/// never invoked for unknown intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    Metric(MetricResult),
    Unknown { query: String },
}

/// A query session over an immutable dataset. Queries are independent and
/// stateless, so a `Copilot` can be shared read-only across callers.
pub struct Copilot {
    dataset: Dataset,
}

impl Copilot {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    pub fn load(
        actuals_path: &Path,
        budget_path: &Path,
        fx_path: &Path,
        cash_path: &Path,
    ) -> Result<Self> {
        let dataset = load_dataset(actuals_path, budget_path, fx_path, cash_path)?;
        info!(
            "Copilot session ready ({} actuals rows)",
            dataset.actuals.len()
        );
        Ok(Self::new(dataset))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Classifies the query and dispatches to the metric engine.
    pub fn answer(&self, query: &str) -> Result<Answer> {
        let intent = classify(query);
        debug!("Classified query '{}' as {:?}", query, intent);

        let engine = Engine::new(&self.dataset);
        let result = match intent {
            Intent::RevenueVsBudget { period } => {
                MetricResult::RevenueVsBudget(engine.revenue_vs_budget(period)?)
            }
            Intent::GrossMarginTrend { lookback_months } => MetricResult::GrossMarginTrend {
                points: engine.gross_margin_trend(lookback_months)?,
            },
            Intent::EbitdaTrend => MetricResult::EbitdaTrend {
                points: engine.ebitda_trend()?,
            },
            Intent::OpexBreakdown { period, category } => {
                let mut breakdown = engine.opex_breakdown(period)?;
                if let Some(category) = category {
                    breakdown
                        .categories
                        .retain(|c| c.category.eq_ignore_ascii_case(&category));
                    breakdown.total = breakdown.categories.iter().map(|c| c.amount).sum();
                }
                MetricResult::OpexBreakdown(breakdown)
            }
            Intent::CashRunway { lookback_months } => {
                MetricResult::CashRunway(engine.cash_runway(lookback_months)?)
            }
            Intent::BurnRate => MetricResult::BurnRate {
                points: engine.burn_rate_trend()?,
            },
            Intent::BudgetVariance { period } => {
                MetricResult::BudgetVariance(engine.budget_variance(period)?)
            }
            Intent::PnlStatement { period } => {
                MetricResult::PnlStatement(engine.pnl_statement(period)?)
            }
            Intent::MonthlyComparison => {
                MetricResult::MonthlyComparison(engine.monthly_comparison()?)
            }
            Intent::QuarterlySummary => MetricResult::QuarterlySummary {
                quarters: engine.quarterly_summary()?,
            },
            Intent::RevenueGrowth { lookback_months } => MetricResult::RevenueGrowth {
                points: engine.revenue_growth(lookback_months)?,
            },
            Intent::TopExpenses { limit } => MetricResult::TopExpenses {
                expenses: engine.top_expenses(limit)?,
            },
            Intent::Dashboard => MetricResult::Dashboard(engine.dashboard()?),
            Intent::Unknown { query } => return Ok(Answer::Unknown { query }),
        };

        Ok(Answer::Metric(result))
    }

    /// Convenience for the export collaborator: full dashboard summary.
    pub fn dashboard(&self) -> Result<DashboardSummary> {
        Engine::new(&self.dataset).dashboard()
    }
}
