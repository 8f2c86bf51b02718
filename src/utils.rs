use crate::error::{CopilotError, Result};
use chrono::{Datelike, NaiveDate};

/// Normalizes any date to the first day of its month, the canonical period
/// representation used throughout the crate.
pub fn truncate_to_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

pub fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CopilotError::DateError(format!("Invalid year/month: {}-{}", year, month)))
}

pub fn add_months(period: NaiveDate, delta: i32) -> NaiveDate {
    let total = period.year() * 12 + period.month0() as i32 + delta;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(period)
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}

/// "June 2025", for headlines and report labels.
pub fn format_month_label(period: NaiveDate) -> String {
    period.format("%B %Y").to_string()
}

pub fn month_number_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().trim_end_matches('.').to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    let idx = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| lower.starts_with(m))?;
    Some(idx as u32 + 1)
}

/// Parses the period forms the input tables and queries use: ISO dates
/// ("2025-06-01"), "YYYY-MM", "YYYYMM", and textual "Month YYYY" / "Mon YYYY".
/// The result is always truncated to the first of the month.
pub fn parse_period_text(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(truncate_to_month(date));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Ok(truncate_to_month(date));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d") {
        return Ok(date);
    }
    if trimmed.len() == 6 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = trimmed[..4].parse().unwrap_or(0);
        let month: u32 = trimmed[4..].parse().unwrap_or(0);
        return month_start(year, month);
    }

    // "June 2025" / "Jun 2025"
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() == 2 {
        if let (Some(month), Ok(year)) = (month_number_from_name(parts[0]), parts[1].parse::<i32>())
        {
            return month_start(year, month);
        }
    }

    Err(CopilotError::DateError(format!(
        "Unrecognized period: '{}'. Expected an ISO date, YYYY-MM, or 'Month YYYY'",
        text
    )))
}
