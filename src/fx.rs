use crate::error::{CopilotError, Result};
use crate::schema::{CashBalance, FinancialRecord, FxRate};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Date-indexed FX rate table. Keyed by (month, upper-case currency code);
/// USD never needs a row. Small enough to live entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct FxTable {
    rates: HashMap<(NaiveDate, String), f64>,
}

impl FxTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rates(rates: Vec<FxRate>) -> Self {
        let mut table = Self::new();
        for rate in rates {
            table.insert(rate);
        }
        table
    }

    pub fn insert(&mut self, rate: FxRate) {
        self.rates
            .insert((rate.period, rate.currency.to_uppercase()), rate.rate_to_usd);
    }

    pub fn rate_to_usd(&self, period: NaiveDate, currency: &str) -> Option<f64> {
        if currency.eq_ignore_ascii_case("USD") {
            return Some(1.0);
        }
        self.rates.get(&(period, currency.to_uppercase())).copied()
    }

    /// Converts an amount to USD. A non-USD currency with no rate for that
    /// period is a hard error; defaulting the rate would misstate financials.
    pub fn convert(&self, period: NaiveDate, currency: &str, amount: f64) -> Result<f64> {
        if currency.eq_ignore_ascii_case("USD") {
            return Ok(amount);
        }
        match self.rates.get(&(period, currency.to_uppercase())) {
            Some(rate) => Ok(amount * rate),
            None => Err(CopilotError::MissingFxRate {
                period,
                currency: currency.to_uppercase(),
            }),
        }
    }

    pub fn convert_record(&self, record: &FinancialRecord) -> Result<f64> {
        self.convert(record.period, &record.currency, record.amount)
    }

    pub fn convert_cash(&self, balance: &CashBalance) -> Result<f64> {
        self.convert(balance.period, &balance.currency, balance.amount)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
