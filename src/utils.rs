use crate::error::{BillingSummaryError, Result};
use chrono::{Datelike, Days, NaiveDate};

pub const CURRENCY_PREFIX: &str = "R$ ";

/// The fixed month domain of the monthly view, in calendar order.
pub const MONTH_TOKENS: [&str; 12] = [
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12",
];

/// Zero-padded two character label for a calendar month.
/// Returns `None` outside 1..=12.
pub fn month_token(month: u32) -> Option<String> {
    if (1..=12).contains(&month) {
        Some(format!("{:02}", month))
    } else {
        None
    }
}

/// Formats an amount the Brazilian way: `1234.5` becomes `"R$ 1.234,50"`.
///
/// Two fixed decimals, `.` between thousands, `,` before the cents and the sign
/// placed after the prefix (`"R$ -50,00"`).
pub fn format_brl(value: f64) -> String {
    if value.is_nan() {
        return format!("{}nan", CURRENCY_PREFIX);
    }
    if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{}{}inf", CURRENCY_PREFIX, sign);
    }

    // -0.0 prints as zero
    let value = if value == 0.0 { 0.0 } else { value };
    let fixed = format!("{:.2}", value);

    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (integer, cents) = digits.split_once('.').unwrap_or((digits, "00"));

    format!(
        "{}{}{},{}",
        CURRENCY_PREFIX,
        sign,
        group_thousands(integer, '.'),
        cents
    )
}

fn group_thousands(integer: &str, separator: char) -> String {
    let len = integer.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped
}

/// Sums amounts starting from positive zero, so an empty group reads `0,00`.
pub fn sum_revenue<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().fold(0.0, |acc, v| acc + v)
}

/// Rounds to whole centavos. Sums of credit notes and sales that cancel leave
/// float residue like `5.55e-17`; this maps them back to an exact `0.0`.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| {
            BillingSummaryError::DateError(format!("No such month: {}-{:02}", year, month))
        })
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (first day of the first month, last day of the last month)
pub fn parse_period_string(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    let (first, last) = match parts.as_slice() {
        [single] => (*single, *single),
        [first, last] => (*first, *last),
        _ => {
            return Err(BillingSummaryError::DateError(format!(
                "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
                period
            )))
        }
    };

    let start = parse_month_start(first)?;
    let end_ref = parse_month_start(last)?;
    let end = last_day_of_month(end_ref.year(), end_ref.month())?;

    Ok((start, end))
}

fn parse_month_start(part: &str) -> Result<NaiveDate> {
    let text = format!("{}-01", part.trim());
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| {
        BillingSummaryError::DateError(format!(
            "Invalid date format in period: {}. Expected YYYY-MM",
            part
        ))
    })
}
