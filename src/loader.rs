//! CSV ingestion. Column names are matched case-insensitively against an
//! alias table per entity type, resolved once per file, so downstream code
//! only ever sees the canonical typed records.

use crate::error::{CopilotError, Result};
use crate::fx::FxTable;
use crate::schema::{CashBalance, Dataset, FinancialRecord, FxRate};
use crate::utils::parse_period_text;
use csv::StringRecord;
use log::info;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const PERIOD_ALIASES: &[&str] = &["period", "date", "month", "month_year", "time"];
const ACCOUNT_ALIASES: &[&str] = &[
    "account",
    "account_name",
    "gl_account",
    "line_item",
    "category",
    "acct",
    "account_category",
];
const AMOUNT_ALIASES: &[&str] = &[
    "amount",
    "value",
    "amount_usd",
    "total",
    "net",
    "balance",
    "amt",
];
const CURRENCY_ALIASES: &[&str] = &["currency", "ccy", "curr"];
const ENTITY_ALIASES: &[&str] = &["entity", "company", "business_unit", "bu", "division"];
const RATE_ALIASES: &[&str] = &["rate_to_usd", "rate"];

/// Header names normalized the same way aliases are declared: trimmed,
/// lower-cased, spaces collapsed to underscores ("Account Name" -> "account_name").
fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

fn resolve_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
    aliases
        .iter()
        .find_map(|alias| normalized.iter().position(|h| h == alias))
}

fn require_column(table: &str, headers: &StringRecord, aliases: &[&str]) -> Result<usize> {
    resolve_column(headers, aliases).ok_or_else(|| CopilotError::DataFormat {
        table: table.to_string(),
        details: format!(
            "Missing required column (looked for any of: {}); found: {}",
            aliases.join(", "),
            headers.iter().collect::<Vec<_>>().join(", ")
        ),
    })
}

fn parse_amount(table: &str, row: usize, raw: &str) -> Result<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' '))
        .collect();
    cleaned.parse::<f64>().map_err(|_| CopilotError::DataFormat {
        table: table.to_string(),
        details: format!("Row {}: unparseable amount '{}'", row, raw),
    })
}

fn parse_period(table: &str, row: usize, raw: &str) -> Result<chrono::NaiveDate> {
    parse_period_text(raw).map_err(|e| CopilotError::DataFormat {
        table: table.to_string(),
        details: format!("Row {}: {}", row, e),
    })
}

/// Reads an actuals or budget table. Required columns: period/date, account,
/// amount. Optional: currency (defaults USD), entity.
pub fn read_records<R: Read>(table: &str, reader: R) -> Result<Vec<FinancialRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let period_col = require_column(table, &headers, PERIOD_ALIASES)?;
    let account_col = require_column(table, &headers, ACCOUNT_ALIASES)?;
    let amount_col = require_column(table, &headers, AMOUNT_ALIASES)?;
    let currency_col = resolve_column(&headers, CURRENCY_ALIASES);
    let entity_col = resolve_column(&headers, ENTITY_ALIASES);

    let mut records = Vec::new();
    for (idx, row) in csv_reader.records().enumerate() {
        let row = row?;
        // Header is line 1; data rows are 1-based after it.
        let line = idx + 2;
        let currency = currency_col
            .and_then(|c| row.get(c))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("USD")
            .to_uppercase();
        let entity = entity_col
            .and_then(|c| row.get(c))
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        records.push(FinancialRecord {
            period: parse_period(table, line, row.get(period_col).unwrap_or(""))?,
            entity,
            account: row.get(account_col).unwrap_or("").trim().to_string(),
            currency,
            amount: parse_amount(table, line, row.get(amount_col).unwrap_or(""))?,
        });
    }
    Ok(records)
}

/// Reads the FX table. Required columns: period/date, currency, rate.
pub fn read_fx_rates<R: Read>(reader: R) -> Result<Vec<FxRate>> {
    let table = "fx";
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let period_col = require_column(table, &headers, PERIOD_ALIASES)?;
    let currency_col = require_column(table, &headers, CURRENCY_ALIASES)?;
    let rate_col = require_column(table, &headers, RATE_ALIASES)?;

    let mut rates = Vec::new();
    for (idx, row) in csv_reader.records().enumerate() {
        let row = row?;
        let line = idx + 2;
        rates.push(FxRate {
            period: parse_period(table, line, row.get(period_col).unwrap_or(""))?,
            currency: row
                .get(currency_col)
                .unwrap_or("")
                .trim()
                .to_uppercase(),
            rate_to_usd: parse_amount(table, line, row.get(rate_col).unwrap_or(""))?,
        });
    }
    Ok(rates)
}

/// Reads cash balances. Required columns: period/date, amount/balance.
/// Currency is optional and defaults to USD.
pub fn read_cash_balances<R: Read>(reader: R) -> Result<Vec<CashBalance>> {
    let table = "cash";
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let period_col = require_column(table, &headers, PERIOD_ALIASES)?;
    let amount_col = require_column(table, &headers, AMOUNT_ALIASES)?;
    let currency_col = resolve_column(&headers, CURRENCY_ALIASES);

    let mut balances = Vec::new();
    for (idx, row) in csv_reader.records().enumerate() {
        let row = row?;
        let line = idx + 2;
        let currency = currency_col
            .and_then(|c| row.get(c))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("USD")
            .to_uppercase();
        balances.push(CashBalance {
            period: parse_period(table, line, row.get(period_col).unwrap_or(""))?,
            currency,
            amount: parse_amount(table, line, row.get(amount_col).unwrap_or(""))?,
        });
    }
    Ok(balances)
}

/// Loads the four session tables from disk into an immutable Dataset.
pub fn load_dataset(
    actuals_path: &Path,
    budget_path: &Path,
    fx_path: &Path,
    cash_path: &Path,
) -> Result<Dataset> {
    let actuals = read_records("actuals", File::open(actuals_path)?)?;
    let budget = read_records("budget", File::open(budget_path)?)?;
    let fx = FxTable::from_rates(read_fx_rates(File::open(fx_path)?)?);
    let cash = read_cash_balances(File::open(cash_path)?)?;

    info!(
        "Loaded dataset: {} actuals, {} budget rows, {} fx rates, {} cash balances",
        actuals.len(),
        budget.len(),
        fx.len(),
        cash.len()
    );

    Ok(Dataset {
        actuals,
        budget,
        fx,
        cash,
    })
}
