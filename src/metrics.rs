//! Pure metric functions over a loaded [`Dataset`]. Every monetary output is
//! in USD; conversion happens per record before aggregation so mixed-currency
//! sums can never occur. All functions are deterministic and side-effect-free.

use crate::error::{CopilotError, Result};
use crate::schema::{is_cogs, is_opex, is_revenue, opex_category, Dataset, FinancialRecord};
use crate::utils::{add_months, months_between};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_RUNWAY_LOOKBACK: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueVsBudget {
    pub period: NaiveDate,
    pub actual: f64,
    pub budget: f64,
    /// None when budget is zero; variance is undefined, not a division error.
    pub variance_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginPoint {
    pub period: NaiveDate,
    /// None when the period has no revenue.
    pub margin_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbitdaPoint {
    pub period: NaiveDate,
    pub revenue: f64,
    pub cogs: f64,
    pub opex: f64,
    pub ebitda: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpexBreakdown {
    pub period: NaiveDate,
    /// Sorted by magnitude, largest first. Amounts sum to `total`.
    pub categories: Vec<CategoryAmount>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnPoint {
    pub period: NaiveDate,
    pub revenue: f64,
    pub expenses: f64,
    /// (COGS + Opex) - Revenue. Negative means net cash generation.
    pub net_burn: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashRunway {
    pub as_of: NaiveDate,
    pub cash_usd: f64,
    pub avg_burn_usd: f64,
    pub lookback_months: usize,
    /// None when average burn <= 0: the company funds itself, runway is
    /// effectively infinite.
    pub months: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub category: String,
    pub actual: f64,
    pub budget: f64,
    pub variance: f64,
    pub variance_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetVariance {
    pub period: NaiveDate,
    pub lines: Vec<VarianceLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlStatement {
    pub period: NaiveDate,
    pub revenue: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub gross_margin_pct: Option<f64>,
    pub opex: Vec<CategoryAmount>,
    pub total_opex: f64,
    pub ebitda: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub period: NaiveDate,
    pub revenue: f64,
    /// None for the first month on record or when the prior month was zero.
    pub mom_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseTotal {
    pub account: String,
    pub total: f64,
    pub share_pct: f64,
}

/// One month of headline figures for the month-over-month comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub period: NaiveDate,
    pub revenue: f64,
    pub cogs: f64,
    pub opex: f64,
    pub gross_margin_pct: Option<f64>,
    pub ebitda: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyComparison {
    pub previous: ComparisonRow,
    pub latest: ComparisonRow,
    pub revenue_change_pct: Option<f64>,
    pub opex_change_pct: Option<f64>,
    pub ebitda_change_pct: Option<f64>,
    /// Difference in margin percentage points, not a relative change.
    pub gross_margin_change_pts: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterRow {
    /// First month of the calendar quarter.
    pub quarter_start: NaiveDate,
    /// "Q2 2025".
    pub label: String,
    pub revenue: f64,
    pub cogs: f64,
    pub opex: f64,
    pub gross_profit: f64,
    pub gross_margin_pct: Option<f64>,
    pub ebitda: f64,
    pub ebitda_margin_pct: Option<f64>,
    /// None for the first quarter on record or a zero base.
    pub revenue_qoq_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub revenue: RevenueVsBudget,
    pub gross_margin_pct: Option<f64>,
    pub ebitda: f64,
    pub runway: CashRunway,
}

/// Tagged union of everything the engine can answer with; the presentation
/// layer consumes it either directly or flattened into a report payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum MetricResult {
    RevenueVsBudget(RevenueVsBudget),
    GrossMarginTrend { points: Vec<MarginPoint> },
    EbitdaTrend { points: Vec<EbitdaPoint> },
    OpexBreakdown(OpexBreakdown),
    BurnRate { points: Vec<BurnPoint> },
    CashRunway(CashRunway),
    BudgetVariance(BudgetVariance),
    PnlStatement(PnlStatement),
    MonthlyComparison(MonthlyComparison),
    QuarterlySummary { quarters: Vec<QuarterRow> },
    RevenueGrowth { points: Vec<GrowthPoint> },
    TopExpenses { expenses: Vec<ExpenseTotal> },
    Dashboard(DashboardSummary),
}

/// Borrows the immutable dataset for the duration of a query.
pub struct Engine<'a> {
    data: &'a Dataset,
}

impl<'a> Engine<'a> {
    pub fn new(data: &'a Dataset) -> Self {
        Self { data }
    }

    /// Chronologically ordered distinct periods present in actuals.
    fn periods(&self) -> Vec<NaiveDate> {
        let mut periods: Vec<NaiveDate> = self.data.actuals.iter().map(|r| r.period).collect();
        periods.sort();
        periods.dedup();
        periods
    }

    fn latest_period(&self) -> Result<NaiveDate> {
        self.data
            .actuals
            .iter()
            .map(|r| r.period)
            .max()
            .ok_or_else(|| CopilotError::InsufficientData("no actuals loaded".to_string()))
    }

    fn resolve_period(&self, period: Option<NaiveDate>) -> Result<NaiveDate> {
        match period {
            Some(p) => Ok(p),
            None => self.latest_period(),
        }
    }

    fn sum_usd<F>(&self, rows: &[FinancialRecord], period: NaiveDate, pred: F) -> Result<f64>
    where
        F: Fn(&str) -> bool,
    {
        let mut total = 0.0;
        for record in rows.iter().filter(|r| r.period == period && pred(&r.account)) {
            total += self.data.fx.convert_record(record)?;
        }
        Ok(total)
    }

    pub fn revenue_vs_budget(&self, period: Option<NaiveDate>) -> Result<RevenueVsBudget> {
        let period = self.resolve_period(period)?;
        let actual = self.sum_usd(&self.data.actuals, period, is_revenue)?;
        let budget = self.sum_usd(&self.data.budget, period, is_revenue)?;
        Ok(RevenueVsBudget {
            period,
            actual,
            budget,
            variance_pct: variance_pct(actual, budget),
        })
    }

    /// Lazy per-period gross margin series, ordered chronologically. Each item
    /// is computed only when pulled.
    pub fn gross_margin_series(&self) -> impl Iterator<Item = Result<MarginPoint>> + '_ {
        self.periods().into_iter().map(move |period| {
            let revenue = self.sum_usd(&self.data.actuals, period, is_revenue)?;
            let cogs = self.sum_usd(&self.data.actuals, period, is_cogs)?;
            let margin_pct = if revenue == 0.0 {
                None
            } else {
                Some((revenue - cogs) / revenue * 100.0)
            };
            Ok(MarginPoint { period, margin_pct })
        })
    }

    pub fn gross_margin_trend(&self, lookback_months: usize) -> Result<Vec<MarginPoint>> {
        let mut points = self.gross_margin_series().collect::<Result<Vec<_>>>()?;
        if points.is_empty() {
            return Err(CopilotError::InsufficientData(
                "no periods available for gross margin trend".to_string(),
            ));
        }
        if lookback_months > 0 && points.len() > lookback_months {
            points.drain(..points.len() - lookback_months);
        }
        Ok(points)
    }

    fn ebitda_for(&self, period: NaiveDate) -> Result<EbitdaPoint> {
        let revenue = self.sum_usd(&self.data.actuals, period, is_revenue)?;
        let cogs = self.sum_usd(&self.data.actuals, period, is_cogs)?;
        let opex = self.sum_usd(&self.data.actuals, period, is_opex)?;
        Ok(EbitdaPoint {
            period,
            revenue,
            cogs,
            opex,
            ebitda: revenue - cogs - opex,
        })
    }

    pub fn ebitda_trend(&self) -> Result<Vec<EbitdaPoint>> {
        let periods = self.periods();
        if periods.is_empty() {
            return Err(CopilotError::InsufficientData(
                "no periods available for EBITDA trend".to_string(),
            ));
        }
        periods.into_iter().map(|p| self.ebitda_for(p)).collect()
    }

    pub fn opex_breakdown(&self, period: Option<NaiveDate>) -> Result<OpexBreakdown> {
        let period = self.resolve_period(period)?;
        let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
        for record in self
            .data
            .actuals
            .iter()
            .filter(|r| r.period == period && is_opex(&r.account))
        {
            let usd = self.data.fx.convert_record(record)?;
            *by_category.entry(opex_category(&record.account)).or_insert(0.0) += usd;
        }

        let total = by_category.values().sum();
        let mut categories: Vec<CategoryAmount> = by_category
            .into_iter()
            .map(|(category, amount)| CategoryAmount { category, amount })
            .collect();
        categories.sort_by(|a, b| {
            b.amount
                .abs()
                .partial_cmp(&a.amount.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(OpexBreakdown {
            period,
            categories,
            total,
        })
    }

    pub fn burn_rate_trend(&self) -> Result<Vec<BurnPoint>> {
        Ok(self
            .ebitda_trend()?
            .into_iter()
            .map(|point| BurnPoint {
                period: point.period,
                revenue: point.revenue,
                expenses: point.cogs + point.opex,
                net_burn: point.cogs + point.opex - point.revenue,
            })
            .collect())
    }

    pub fn burn_rate(&self, period: Option<NaiveDate>) -> Result<BurnPoint> {
        let period = self.resolve_period(period)?;
        let point = self.ebitda_for(period)?;
        Ok(BurnPoint {
            period,
            revenue: point.revenue,
            expenses: point.cogs + point.opex,
            net_burn: point.cogs + point.opex - point.revenue,
        })
    }

    /// Latest cash balance divided by average net burn over the trailing
    /// window. `months: None` means no runway risk (burn <= 0).
    pub fn cash_runway(&self, lookback_months: usize) -> Result<CashRunway> {
        let lookback_months = lookback_months.max(1);
        let burn = self.burn_rate_trend()?;
        let latest = burn
            .last()
            .map(|p| p.period)
            .ok_or_else(|| CopilotError::InsufficientData("no burn periods".to_string()))?;
        // Trailing window in calendar months, so gaps in the data never pull
        // older periods into the average.
        let window_start = add_months(latest, -(lookback_months as i32) + 1);
        let window: Vec<f64> = burn
            .iter()
            .filter(|p| p.period >= window_start)
            .map(|p| p.net_burn)
            .collect();
        let avg_burn_usd = window.iter().sum::<f64>() / window.len() as f64;

        let latest_cash = self
            .data
            .cash
            .iter()
            .max_by_key(|c| c.period)
            .ok_or_else(|| {
                CopilotError::InsufficientData("no cash balances loaded".to_string())
            })?;
        let cash_usd = self.data.fx.convert_cash(latest_cash)?;

        let months = if avg_burn_usd > 0.0 {
            Some(cash_usd / avg_burn_usd)
        } else {
            None
        };

        Ok(CashRunway {
            as_of: latest_cash.period,
            cash_usd,
            avg_burn_usd,
            lookback_months,
            months,
        })
    }

    pub fn budget_variance(&self, period: Option<NaiveDate>) -> Result<BudgetVariance> {
        let period = self.resolve_period(period)?;
        let a_rev = self.sum_usd(&self.data.actuals, period, is_revenue)?;
        let b_rev = self.sum_usd(&self.data.budget, period, is_revenue)?;
        let a_cogs = self.sum_usd(&self.data.actuals, period, is_cogs)?;
        let b_cogs = self.sum_usd(&self.data.budget, period, is_cogs)?;
        let a_opex = self.sum_usd(&self.data.actuals, period, is_opex)?;
        let b_opex = self.sum_usd(&self.data.budget, period, is_opex)?;

        let lines = vec![
            variance_line("Revenue", a_rev, b_rev),
            variance_line("COGS", a_cogs, b_cogs),
            variance_line("Operating Expenses", a_opex, b_opex),
            variance_line("Gross Profit", a_rev - a_cogs, b_rev - b_cogs),
            variance_line("EBITDA", a_rev - a_cogs - a_opex, b_rev - b_cogs - b_opex),
        ];

        Ok(BudgetVariance { period, lines })
    }

    pub fn pnl_statement(&self, period: Option<NaiveDate>) -> Result<PnlStatement> {
        let period = self.resolve_period(period)?;
        let revenue = self.sum_usd(&self.data.actuals, period, is_revenue)?;
        let cogs = self.sum_usd(&self.data.actuals, period, is_cogs)?;
        let breakdown = self.opex_breakdown(Some(period))?;
        let gross_profit = revenue - cogs;
        let gross_margin_pct = if revenue == 0.0 {
            None
        } else {
            Some(gross_profit / revenue * 100.0)
        };

        Ok(PnlStatement {
            period,
            revenue,
            cogs,
            gross_profit,
            gross_margin_pct,
            total_opex: breakdown.total,
            ebitda: gross_profit - breakdown.total,
            opex: breakdown.categories,
        })
    }

    pub fn revenue_growth(&self, lookback_months: usize) -> Result<Vec<GrowthPoint>> {
        let periods = self.periods();
        if periods.is_empty() {
            return Err(CopilotError::InsufficientData(
                "no periods available for revenue growth".to_string(),
            ));
        }

        let mut points = Vec::with_capacity(periods.len());
        let mut prev: Option<(NaiveDate, f64)> = None;
        for period in periods {
            let revenue = self.sum_usd(&self.data.actuals, period, is_revenue)?;
            // Growth is only month-over-month when the months are actually
            // adjacent; a gap in the data yields None, not a bogus jump.
            let mom_growth_pct = match prev {
                Some((prev_period, base))
                    if base != 0.0 && months_between(prev_period, period) == 1 =>
                {
                    Some((revenue - base) / base * 100.0)
                }
                _ => None,
            };
            points.push(GrowthPoint {
                period,
                revenue,
                mom_growth_pct,
            });
            prev = Some((period, revenue));
        }

        if lookback_months > 0 && points.len() > lookback_months {
            points.drain(..points.len() - lookback_months);
        }
        Ok(points)
    }

    /// All-time expense totals (COGS + opex) per account, largest first, with
    /// each account's share of total spend.
    pub fn top_expenses(&self, limit: usize) -> Result<Vec<ExpenseTotal>> {
        let mut by_account: BTreeMap<String, f64> = BTreeMap::new();
        for record in self
            .data
            .actuals
            .iter()
            .filter(|r| is_cogs(&r.account) || is_opex(&r.account))
        {
            let usd = self.data.fx.convert_record(record)?;
            *by_account.entry(record.account.clone()).or_insert(0.0) += usd;
        }

        let grand_total: f64 = by_account.values().sum();
        let mut expenses: Vec<ExpenseTotal> = by_account
            .into_iter()
            .map(|(account, total)| ExpenseTotal {
                account,
                total,
                share_pct: if grand_total == 0.0 {
                    0.0
                } else {
                    total / grand_total * 100.0
                },
            })
            .collect();
        expenses.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if limit > 0 {
            expenses.truncate(limit);
        }
        Ok(expenses)
    }

    /// Latest month against the one before it across the headline figures.
    pub fn monthly_comparison(&self) -> Result<MonthlyComparison> {
        let points = self.ebitda_trend()?;
        if points.len() < 2 {
            return Err(CopilotError::InsufficientData(
                "need at least two months for a month-over-month comparison".to_string(),
            ));
        }
        let previous = comparison_row(&points[points.len() - 2]);
        let latest = comparison_row(&points[points.len() - 1]);

        Ok(MonthlyComparison {
            revenue_change_pct: pct_change(previous.revenue, latest.revenue),
            opex_change_pct: pct_change(previous.opex, latest.opex),
            ebitda_change_pct: pct_change(previous.ebitda, latest.ebitda),
            gross_margin_change_pts: match (previous.gross_margin_pct, latest.gross_margin_pct) {
                (Some(prev), Some(curr)) => Some(curr - prev),
                _ => None,
            },
            previous,
            latest,
        })
    }

    /// Calendar-quarter aggregates with quarter-over-quarter revenue growth.
    pub fn quarterly_summary(&self) -> Result<Vec<QuarterRow>> {
        let points = self.ebitda_trend()?;
        let mut by_quarter: BTreeMap<NaiveDate, (f64, f64, f64)> = BTreeMap::new();
        for point in &points {
            let totals = by_quarter
                .entry(quarter_start(point.period))
                .or_insert((0.0, 0.0, 0.0));
            totals.0 += point.revenue;
            totals.1 += point.cogs;
            totals.2 += point.opex;
        }

        let mut quarters = Vec::with_capacity(by_quarter.len());
        let mut prev_revenue: Option<f64> = None;
        for (start, (revenue, cogs, opex)) in by_quarter {
            let gross_profit = revenue - cogs;
            let ebitda = gross_profit - opex;
            quarters.push(QuarterRow {
                quarter_start: start,
                label: quarter_label(start),
                revenue,
                cogs,
                opex,
                gross_profit,
                gross_margin_pct: ratio_pct(gross_profit, revenue),
                ebitda,
                ebitda_margin_pct: ratio_pct(ebitda, revenue),
                revenue_qoq_pct: prev_revenue.and_then(|base| pct_change(base, revenue)),
            });
            prev_revenue = Some(revenue);
        }
        Ok(quarters)
    }

    /// Headline summary for the executive dashboard: latest revenue vs
    /// budget, latest gross margin, latest EBITDA, and runway.
    pub fn dashboard(&self) -> Result<DashboardSummary> {
        let revenue = self.revenue_vs_budget(None)?;
        let margin = self.gross_margin_trend(1)?;
        let ebitda = self.ebitda_trend()?;
        let runway = self.cash_runway(DEFAULT_RUNWAY_LOOKBACK)?;

        Ok(DashboardSummary {
            revenue,
            gross_margin_pct: margin.last().and_then(|p| p.margin_pct),
            ebitda: ebitda.last().map(|p| p.ebitda).unwrap_or(0.0),
            runway,
        })
    }
}

fn comparison_row(point: &EbitdaPoint) -> ComparisonRow {
    ComparisonRow {
        period: point.period,
        revenue: point.revenue,
        cogs: point.cogs,
        opex: point.opex,
        gross_margin_pct: ratio_pct(point.revenue - point.cogs, point.revenue),
        ebitda: point.ebitda,
    }
}

fn quarter_start(period: NaiveDate) -> NaiveDate {
    let month = (period.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(period.year(), month, 1).unwrap_or(period)
}

fn quarter_label(quarter_start: NaiveDate) -> String {
    format!(
        "Q{} {}",
        quarter_start.month0() / 3 + 1,
        quarter_start.year()
    )
}

fn ratio_pct(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator * 100.0)
    }
}

fn pct_change(base: f64, current: f64) -> Option<f64> {
    if base == 0.0 {
        None
    } else {
        Some((current - base) / base * 100.0)
    }
}

fn variance_pct(actual: f64, budget: f64) -> Option<f64> {
    if budget == 0.0 {
        None
    } else {
        Some((actual - budget) / budget * 100.0)
    }
}

fn variance_line(category: &str, actual: f64, budget: f64) -> VarianceLine {
    VarianceLine {
        category: category.to_string(),
        actual,
        budget,
        variance: actual - budget,
        variance_pct: variance_pct(actual, budget),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::FxTable;
    use crate::schema::{CashBalance, FxRate};

    fn period(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    fn record(p: NaiveDate, account: &str, currency: &str, amount: f64) -> FinancialRecord {
        FinancialRecord {
            period: p,
            entity: None,
            account: account.to_string(),
            currency: currency.to_string(),
            amount,
        }
    }

    /// Three months of USD actuals: steady revenue, COGS, two opex lines, and
    /// one budget row per month.
    fn dataset() -> Dataset {
        let months = [period(2025, 4), period(2025, 5), period(2025, 6)];
        let mut actuals = Vec::new();
        let mut budget = Vec::new();
        for (i, p) in months.iter().enumerate() {
            let scale = 1.0 + i as f64 * 0.1;
            actuals.push(record(*p, "Revenue", "USD", 100_000.0 * scale));
            actuals.push(record(*p, "COGS", "USD", 40_000.0 * scale));
            actuals.push(record(*p, "Opex:Marketing", "USD", 50_000.0));
            actuals.push(record(*p, "Opex:Payroll", "USD", 80_000.0));
            budget.push(record(*p, "Revenue", "USD", 100_000.0));
        }
        Dataset {
            actuals,
            budget,
            fx: FxTable::new(),
            cash: vec![CashBalance {
                period: period(2025, 6),
                currency: "USD".to_string(),
                amount: 300_000.0,
            }],
        }
    }

    #[test]
    fn test_revenue_vs_budget_explicit_period() {
        let data = dataset();
        let result = Engine::new(&data)
            .revenue_vs_budget(Some(period(2025, 6)))
            .unwrap();
        assert!((result.actual - 120_000.0).abs() < 1e-6);
        assert!((result.budget - 100_000.0).abs() < 1e-6);
        assert!((result.variance_pct.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_revenue_vs_budget_defaults_to_latest_period() {
        let data = dataset();
        let result = Engine::new(&data).revenue_vs_budget(None).unwrap();
        assert_eq!(result.period, period(2025, 6));
    }

    #[test]
    fn test_zero_budget_variance_is_none() {
        let mut data = dataset();
        data.budget.clear();
        let result = Engine::new(&data).revenue_vs_budget(None).unwrap();
        assert_eq!(result.budget, 0.0);
        assert_eq!(result.variance_pct, None);
    }

    #[test]
    fn test_gross_margin_with_no_cogs_is_100() {
        let mut data = dataset();
        data.actuals.retain(|r| !is_cogs(&r.account));
        let points = Engine::new(&data).gross_margin_trend(3).unwrap();
        for point in points {
            assert!((point.margin_pct.unwrap() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gross_margin_with_no_revenue_is_none() {
        let mut data = dataset();
        data.actuals.retain(|r| !is_revenue(&r.account));
        let points = Engine::new(&data).gross_margin_trend(3).unwrap();
        assert!(points.iter().all(|p| p.margin_pct.is_none()));
    }

    #[test]
    fn test_gross_margin_trend_ordered_and_truncated() {
        let data = dataset();
        let points = Engine::new(&data).gross_margin_trend(2).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].period, period(2025, 5));
        assert_eq!(points[1].period, period(2025, 6));
    }

    #[test]
    fn test_ebitda_composition() {
        let data = dataset();
        let points = Engine::new(&data).ebitda_trend().unwrap();
        let june = points.last().unwrap();
        // 120000 - 48000 - 130000
        assert!((june.ebitda - -58_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_opex_breakdown_sums_to_total() {
        let data = dataset();
        let breakdown = Engine::new(&data).opex_breakdown(None).unwrap();
        let sum: f64 = breakdown.categories.iter().map(|c| c.amount).sum();
        assert!((sum - breakdown.total).abs() < 1e-9);
        assert_eq!(breakdown.categories[0].category, "Payroll");
        assert_eq!(breakdown.categories[1].category, "Marketing");
    }

    #[test]
    fn test_bare_opex_account_not_double_counted() {
        let mut data = dataset();
        data.actuals
            .push(record(period(2025, 6), "Opex", "USD", 1_000.0));
        let breakdown = Engine::new(&data).opex_breakdown(None).unwrap();
        let sum: f64 = breakdown.categories.iter().map(|c| c.amount).sum();
        assert!((sum - breakdown.total).abs() < 1e-9);
        assert!((breakdown.total - 131_000.0).abs() < 1e-6);
        assert!(breakdown.categories.iter().any(|c| c.category == "Opex"));
    }

    #[test]
    fn test_burn_rate_sign() {
        let data = dataset();
        let june = Engine::new(&data).burn_rate(None).unwrap();
        // Expenses 178000 vs revenue 120000: burning cash.
        assert!((june.net_burn - 58_000.0).abs() < 1e-6);

        let mut profitable = dataset();
        for r in profitable.actuals.iter_mut().filter(|r| is_revenue(&r.account)) {
            r.amount = 500_000.0;
        }
        let june = Engine::new(&profitable).burn_rate(None).unwrap();
        assert!(june.net_burn < 0.0);
    }

    #[test]
    fn test_cash_runway_months() {
        let mut data = dataset();
        // Force a flat 50k burn: expenses 150k vs revenue 100k each month.
        data.actuals.clear();
        for p in [period(2025, 4), period(2025, 5), period(2025, 6)] {
            data.actuals.push(record(p, "Revenue", "USD", 100_000.0));
            data.actuals.push(record(p, "COGS", "USD", 70_000.0));
            data.actuals.push(record(p, "Opex:Payroll", "USD", 80_000.0));
        }
        let runway = Engine::new(&data).cash_runway(3).unwrap();
        assert!((runway.avg_burn_usd - 50_000.0).abs() < 1e-6);
        assert!((runway.months.unwrap() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_cash_runway_infinite_when_profitable() {
        let mut data = dataset();
        for r in data.actuals.iter_mut().filter(|r| is_revenue(&r.account)) {
            r.amount = 500_000.0;
        }
        let runway = Engine::new(&data).cash_runway(3).unwrap();
        assert!(runway.avg_burn_usd < 0.0);
        assert_eq!(runway.months, None);
    }

    #[test]
    fn test_cash_runway_requires_data() {
        let empty = Dataset::default();
        match Engine::new(&empty).cash_runway(3) {
            Err(CopilotError::InsufficientData(_)) => {}
            other => panic!("Expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fx_rate_surfaces_per_metric() {
        let mut data = dataset();
        data.actuals
            .push(record(period(2025, 6), "Revenue", "GBP", 10_000.0));
        match Engine::new(&data).revenue_vs_budget(None) {
            Err(CopilotError::MissingFxRate { currency, .. }) => assert_eq!(currency, "GBP"),
            other => panic!("Expected MissingFxRate, got {:?}", other),
        }
    }

    #[test]
    fn test_fx_converted_before_aggregation() {
        let mut data = dataset();
        data.fx.insert(FxRate {
            period: period(2025, 6),
            currency: "EUR".to_string(),
            rate_to_usd: 1.085,
        });
        data.actuals
            .push(record(period(2025, 6), "Revenue", "EUR", 1_000.0));
        let result = Engine::new(&data)
            .revenue_vs_budget(Some(period(2025, 6)))
            .unwrap();
        assert!((result.actual - 121_085.0).abs() < 1e-6);
    }

    #[test]
    fn test_budget_variance_lines() {
        let data = dataset();
        let variance = Engine::new(&data).budget_variance(None).unwrap();
        assert_eq!(variance.lines.len(), 5);
        let revenue = &variance.lines[0];
        assert_eq!(revenue.category, "Revenue");
        assert!((revenue.variance - 20_000.0).abs() < 1e-6);
        // No opex was budgeted, so the pct is undefined rather than a panic.
        let opex = &variance.lines[2];
        assert_eq!(opex.variance_pct, None);
    }

    #[test]
    fn test_pnl_statement_consistency() {
        let data = dataset();
        let pnl = Engine::new(&data).pnl_statement(None).unwrap();
        assert!((pnl.gross_profit - (pnl.revenue - pnl.cogs)).abs() < 1e-9);
        let opex_sum: f64 = pnl.opex.iter().map(|c| c.amount).sum();
        assert!((opex_sum - pnl.total_opex).abs() < 1e-9);
        assert!((pnl.ebitda - (pnl.gross_profit - pnl.total_opex)).abs() < 1e-9);
    }

    #[test]
    fn test_revenue_growth_first_month_is_none() {
        let data = dataset();
        let points = Engine::new(&data).revenue_growth(12).unwrap();
        assert_eq!(points[0].mom_growth_pct, None);
        assert!((points[1].mom_growth_pct.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_expenses_shares_sum_to_100() {
        let data = dataset();
        let expenses = Engine::new(&data).top_expenses(0).unwrap();
        let total_share: f64 = expenses.iter().map(|e| e.share_pct).sum();
        assert!((total_share - 100.0).abs() < 1e-9);
        assert!(expenses[0].total >= expenses[1].total);
    }

    #[test]
    fn test_cash_runway_window_is_calendar_months() {
        // One stale January month plus May and June: a 3-month lookback
        // covers April through June, so January must not dilute the average.
        let mut data = dataset();
        data.actuals.clear();
        for (p, revenue) in [
            (period(2025, 1), 1_000_000.0),
            (period(2025, 5), 100_000.0),
            (period(2025, 6), 100_000.0),
        ] {
            data.actuals.push(record(p, "Revenue", "USD", revenue));
            data.actuals.push(record(p, "COGS", "USD", 70_000.0));
            data.actuals.push(record(p, "Opex:Payroll", "USD", 80_000.0));
        }
        let runway = Engine::new(&data).cash_runway(3).unwrap();
        assert!((runway.avg_burn_usd - 50_000.0).abs() < 1e-6);
        assert!((runway.months.unwrap() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_revenue_growth_skips_gap_months() {
        let mut data = dataset();
        data.actuals.clear();
        for (p, revenue) in [
            (period(2025, 1), 100_000.0),
            (period(2025, 5), 100_000.0),
            (period(2025, 6), 110_000.0),
        ] {
            data.actuals.push(record(p, "Revenue", "USD", revenue));
        }
        let points = Engine::new(&data).revenue_growth(12).unwrap();
        assert_eq!(points[0].mom_growth_pct, None);
        // January to May is not month-over-month.
        assert_eq!(points[1].mom_growth_pct, None);
        assert!((points[2].mom_growth_pct.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_comparison_changes() {
        let data = dataset();
        let comparison = Engine::new(&data).monthly_comparison().unwrap();
        assert_eq!(comparison.previous.period, period(2025, 5));
        assert_eq!(comparison.latest.period, period(2025, 6));
        // Revenue 110000 -> 120000.
        assert!((comparison.revenue_change_pct.unwrap() - 9.090_909_090_909_092).abs() < 1e-9);
        // Opex is flat month to month.
        assert!((comparison.opex_change_pct.unwrap()).abs() < 1e-9);
        assert!(comparison.gross_margin_change_pts.is_some());
    }

    #[test]
    fn test_monthly_comparison_needs_two_months() {
        let mut data = dataset();
        data.actuals.retain(|r| r.period == period(2025, 6));
        match Engine::new(&data).monthly_comparison() {
            Err(CopilotError::InsufficientData(_)) => {}
            other => panic!("Expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_quarterly_summary_aggregates() {
        // Feb+Mar land in Q1, Apr in Q2.
        let mut data = dataset();
        data.actuals.clear();
        for (p, revenue) in [
            (period(2025, 2), 100_000.0),
            (period(2025, 3), 100_000.0),
            (period(2025, 4), 250_000.0),
        ] {
            data.actuals.push(record(p, "Revenue", "USD", revenue));
            data.actuals.push(record(p, "COGS", "USD", 40_000.0));
            data.actuals.push(record(p, "Opex:Payroll", "USD", 50_000.0));
        }
        let quarters = Engine::new(&data).quarterly_summary().unwrap();
        assert_eq!(quarters.len(), 2);

        let q1 = &quarters[0];
        assert_eq!(q1.label, "Q1 2025");
        assert!((q1.revenue - 200_000.0).abs() < 1e-6);
        assert!((q1.ebitda - 20_000.0).abs() < 1e-6);
        assert_eq!(q1.revenue_qoq_pct, None);

        let q2 = &quarters[1];
        assert_eq!(q2.label, "Q2 2025");
        assert!((q2.revenue - 250_000.0).abs() < 1e-6);
        assert!((q2.revenue_qoq_pct.unwrap() - 25.0).abs() < 1e-9);
        assert!((q2.gross_margin_pct.unwrap() - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_dashboard_headlines() {
        let data = dataset();
        let summary = Engine::new(&data).dashboard().unwrap();
        assert_eq!(summary.revenue.period, period(2025, 6));
        assert!(summary.gross_margin_pct.is_some());
    }
}
