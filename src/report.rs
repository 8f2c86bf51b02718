//! Flat, serializable report payloads for the external report/PDF generator.
//! The core knows nothing about rendering: a payload is just labeled headline
//! values plus named time series.

use crate::error::Result;
use crate::metrics::MetricResult;
use crate::utils::format_month_label;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Usd,
    Percent,
    Months,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledValue {
    pub label: String,
    /// Raw figure; None when the value is undefined (zero-budget variance)
    /// or a no-risk sentinel (infinite runway).
    pub value: Option<f64>,
    pub unit: Unit,
    /// Pre-formatted display text ("$1.2M", "20.0%", "∞").
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub period: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub unit: Unit,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub title: String,
    pub period_label: Option<String>,
    pub headline: Vec<LabeledValue>,
    pub series: Vec<Series>,
}

impl ReportPayload {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// "$1.2M" / "$350K" style labels, matching what the report renderer expects.
pub fn format_usd(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("${:.1}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("${:.1}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("${:.0}K", value / 1e3)
    } else {
        format!("${:.0}", value)
    }
}

pub fn format_pct(value: f64) -> String {
    format!("{:.1}%", value)
}

fn display_text(value: Option<f64>, unit: Unit) -> String {
    match (value, unit) {
        (Some(v), Unit::Usd) => format_usd(v),
        (Some(v), Unit::Percent) => format_pct(v),
        (Some(v), Unit::Months) => format!("{:.1} months", v),
        (None, Unit::Months) => "∞".to_string(),
        (None, _) => "n/a".to_string(),
    }
}

fn value(label: &str, v: f64, unit: Unit) -> LabeledValue {
    LabeledValue {
        label: label.to_string(),
        value: Some(v),
        unit,
        text: display_text(Some(v), unit),
    }
}

fn optional(label: &str, v: Option<f64>, unit: Unit) -> LabeledValue {
    LabeledValue {
        label: label.to_string(),
        value: v,
        unit,
        text: display_text(v, unit),
    }
}

fn series(name: &str, unit: Unit, points: Vec<SeriesPoint>) -> Series {
    Series {
        name: name.to_string(),
        unit,
        points,
    }
}

impl MetricResult {
    /// Flattens any metric result into the renderer-facing payload.
    pub fn to_report(&self) -> ReportPayload {
        match self {
            MetricResult::RevenueVsBudget(r) => ReportPayload {
                title: "Revenue vs Budget".to_string(),
                period_label: Some(format_month_label(r.period)),
                headline: vec![
                    value("Actual", r.actual, Unit::Usd),
                    value("Budget", r.budget, Unit::Usd),
                    optional("Variance", r.variance_pct, Unit::Percent),
                ],
                series: vec![],
            },
            MetricResult::GrossMarginTrend { points } => ReportPayload {
                title: "Gross Margin Trend".to_string(),
                period_label: None,
                headline: points
                    .last()
                    .map(|p| vec![optional("Latest Gross Margin", p.margin_pct, Unit::Percent)])
                    .unwrap_or_default(),
                series: vec![series(
                    "Gross Margin %",
                    Unit::Percent,
                    points
                        .iter()
                        .map(|p| SeriesPoint {
                            period: p.period,
                            value: p.margin_pct,
                        })
                        .collect(),
                )],
            },
            MetricResult::EbitdaTrend { points } => ReportPayload {
                title: "EBITDA Trend".to_string(),
                period_label: None,
                headline: points
                    .last()
                    .map(|p| vec![value("Latest EBITDA", p.ebitda, Unit::Usd)])
                    .unwrap_or_default(),
                series: vec![
                    series(
                        "EBITDA",
                        Unit::Usd,
                        points
                            .iter()
                            .map(|p| SeriesPoint {
                                period: p.period,
                                value: Some(p.ebitda),
                            })
                            .collect(),
                    ),
                    series(
                        "Revenue",
                        Unit::Usd,
                        points
                            .iter()
                            .map(|p| SeriesPoint {
                                period: p.period,
                                value: Some(p.revenue),
                            })
                            .collect(),
                    ),
                ],
            },
            MetricResult::OpexBreakdown(b) => ReportPayload {
                title: "Opex Breakdown".to_string(),
                period_label: Some(format_month_label(b.period)),
                headline: std::iter::once(value("Total Opex", b.total, Unit::Usd))
                    .chain(
                        b.categories
                            .iter()
                            .map(|c| value(&c.category, c.amount, Unit::Usd)),
                    )
                    .collect(),
                series: vec![],
            },
            MetricResult::BurnRate { points } => ReportPayload {
                title: "Burn Rate".to_string(),
                period_label: None,
                headline: points
                    .last()
                    .map(|p| vec![value("Latest Net Burn", p.net_burn, Unit::Usd)])
                    .unwrap_or_default(),
                series: vec![series(
                    "Net Burn",
                    Unit::Usd,
                    points
                        .iter()
                        .map(|p| SeriesPoint {
                            period: p.period,
                            value: Some(p.net_burn),
                        })
                        .collect(),
                )],
            },
            MetricResult::CashRunway(r) => ReportPayload {
                title: "Cash Runway".to_string(),
                period_label: Some(format_month_label(r.as_of)),
                headline: vec![
                    value("Cash", r.cash_usd, Unit::Usd),
                    value("Avg Net Burn", r.avg_burn_usd, Unit::Usd),
                    optional("Runway", r.months, Unit::Months),
                ],
                series: vec![],
            },
            MetricResult::BudgetVariance(v) => ReportPayload {
                title: "Budget Variance".to_string(),
                period_label: Some(format_month_label(v.period)),
                headline: v
                    .lines
                    .iter()
                    .map(|line| value(&line.category, line.variance, Unit::Usd))
                    .collect(),
                series: vec![],
            },
            MetricResult::PnlStatement(p) => ReportPayload {
                title: "P&L Statement".to_string(),
                period_label: Some(format_month_label(p.period)),
                headline: vec![
                    value("Revenue", p.revenue, Unit::Usd),
                    value("COGS", -p.cogs, Unit::Usd),
                    value("Gross Profit", p.gross_profit, Unit::Usd),
                    optional("Gross Margin", p.gross_margin_pct, Unit::Percent),
                ]
                .into_iter()
                .chain(p.opex.iter().map(|c| value(&c.category, -c.amount, Unit::Usd)))
                .chain([
                    value("Total Operating Expenses", -p.total_opex, Unit::Usd),
                    value("EBITDA", p.ebitda, Unit::Usd),
                ])
                .collect(),
                series: vec![],
            },
            MetricResult::MonthlyComparison(c) => ReportPayload {
                title: "Month-over-Month Comparison".to_string(),
                period_label: Some(format_month_label(c.latest.period)),
                headline: vec![
                    value("Revenue", c.latest.revenue, Unit::Usd),
                    optional("Revenue MoM", c.revenue_change_pct, Unit::Percent),
                    value("Opex", c.latest.opex, Unit::Usd),
                    optional("Opex MoM", c.opex_change_pct, Unit::Percent),
                    value("EBITDA", c.latest.ebitda, Unit::Usd),
                    optional("EBITDA MoM", c.ebitda_change_pct, Unit::Percent),
                    optional("Gross Margin Change", c.gross_margin_change_pts, Unit::Percent),
                ],
                series: vec![
                    series(
                        "Revenue",
                        Unit::Usd,
                        [&c.previous, &c.latest]
                            .iter()
                            .map(|r| SeriesPoint {
                                period: r.period,
                                value: Some(r.revenue),
                            })
                            .collect(),
                    ),
                    series(
                        "EBITDA",
                        Unit::Usd,
                        [&c.previous, &c.latest]
                            .iter()
                            .map(|r| SeriesPoint {
                                period: r.period,
                                value: Some(r.ebitda),
                            })
                            .collect(),
                    ),
                ],
            },
            MetricResult::QuarterlySummary { quarters } => ReportPayload {
                title: "Quarterly Summary".to_string(),
                period_label: quarters.last().map(|q| q.label.clone()),
                headline: quarters
                    .last()
                    .map(|q| {
                        vec![
                            value("Revenue", q.revenue, Unit::Usd),
                            value("Gross Profit", q.gross_profit, Unit::Usd),
                            optional("Gross Margin", q.gross_margin_pct, Unit::Percent),
                            value("EBITDA", q.ebitda, Unit::Usd),
                            optional("EBITDA Margin", q.ebitda_margin_pct, Unit::Percent),
                            optional("Revenue QoQ", q.revenue_qoq_pct, Unit::Percent),
                        ]
                    })
                    .unwrap_or_default(),
                series: vec![
                    series(
                        "Revenue",
                        Unit::Usd,
                        quarters
                            .iter()
                            .map(|q| SeriesPoint {
                                period: q.quarter_start,
                                value: Some(q.revenue),
                            })
                            .collect(),
                    ),
                    series(
                        "EBITDA",
                        Unit::Usd,
                        quarters
                            .iter()
                            .map(|q| SeriesPoint {
                                period: q.quarter_start,
                                value: Some(q.ebitda),
                            })
                            .collect(),
                    ),
                ],
            },
            MetricResult::RevenueGrowth { points } => ReportPayload {
                title: "Revenue Growth".to_string(),
                period_label: None,
                headline: points
                    .last()
                    .map(|p| vec![optional("Latest MoM Growth", p.mom_growth_pct, Unit::Percent)])
                    .unwrap_or_default(),
                series: vec![
                    series(
                        "Revenue",
                        Unit::Usd,
                        points
                            .iter()
                            .map(|p| SeriesPoint {
                                period: p.period,
                                value: Some(p.revenue),
                            })
                            .collect(),
                    ),
                    series(
                        "MoM Growth %",
                        Unit::Percent,
                        points
                            .iter()
                            .map(|p| SeriesPoint {
                                period: p.period,
                                value: p.mom_growth_pct,
                            })
                            .collect(),
                    ),
                ],
            },
            MetricResult::TopExpenses { expenses } => ReportPayload {
                title: "Top Expenses".to_string(),
                period_label: None,
                headline: expenses
                    .iter()
                    .map(|e| value(&e.account, e.total, Unit::Usd))
                    .collect(),
                series: vec![],
            },
            MetricResult::Dashboard(d) => ReportPayload {
                title: "Executive Dashboard".to_string(),
                period_label: Some(format_month_label(d.revenue.period)),
                headline: vec![
                    value("Latest Revenue", d.revenue.actual, Unit::Usd),
                    optional("Revenue vs Budget", d.revenue.variance_pct, Unit::Percent),
                    optional("Gross Margin", d.gross_margin_pct, Unit::Percent),
                    value("Latest EBITDA", d.ebitda, Unit::Usd),
                    optional("Cash Runway", d.runway.months, Unit::Months),
                ],
                series: vec![],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CashRunway, RevenueVsBudget};

    fn june() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(1_200_000_000.0), "$1.2B");
        assert_eq!(format_usd(1_250_000.0), "$1.2M");
        assert_eq!(format_usd(350_000.0), "$350K");
        assert_eq!(format_usd(42.0), "$42");
        assert_eq!(format_usd(-58_000.0), "$-58K");
    }

    #[test]
    fn test_revenue_payload_flattens() {
        let result = MetricResult::RevenueVsBudget(RevenueVsBudget {
            period: june(),
            actual: 120_000.0,
            budget: 100_000.0,
            variance_pct: Some(20.0),
        });
        let payload = result.to_report();
        assert_eq!(payload.period_label.as_deref(), Some("June 2025"));
        assert_eq!(payload.headline.len(), 3);
        assert_eq!(payload.headline[2].value, Some(20.0));
        assert_eq!(payload.headline[0].text, "$120K");
        assert_eq!(payload.headline[2].text, "20.0%");
    }

    #[test]
    fn test_undefined_variance_renders_as_na() {
        let result = MetricResult::RevenueVsBudget(RevenueVsBudget {
            period: june(),
            actual: 120_000.0,
            budget: 0.0,
            variance_pct: None,
        });
        let payload = result.to_report();
        assert_eq!(payload.headline[2].value, None);
        assert_eq!(payload.headline[2].text, "n/a");
    }

    #[test]
    fn test_infinite_runway_serializes_as_null() {
        let result = MetricResult::CashRunway(CashRunway {
            as_of: june(),
            cash_usd: 300_000.0,
            avg_burn_usd: -10_000.0,
            lookback_months: 3,
            months: None,
        });
        let payload = result.to_report();
        assert_eq!(payload.headline[2].text, "∞");
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"value\": null"));
    }

    #[test]
    fn test_finite_runway_renders_months() {
        let result = MetricResult::CashRunway(CashRunway {
            as_of: june(),
            cash_usd: 300_000.0,
            avg_burn_usd: 50_000.0,
            lookback_months: 3,
            months: Some(6.0),
        });
        let payload = result.to_report();
        assert_eq!(payload.headline[2].text, "6.0 months");
    }
}
