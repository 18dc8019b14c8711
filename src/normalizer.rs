use crate::schema::{BillingRecord, DateRange, RawBillingRecord, RawDate, RecordDate};
use crate::utils::month_token;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// The canonical in-memory table every aggregation reads from.
///
/// Build one per refresh cycle and run all views against it; the views borrow
/// from it, so they always see the same snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    records: Vec<BillingRecord>,
}

impl NormalizedTable {
    pub fn new(records: Vec<BillingRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[BillingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest known billing dates; the dashboard's default window.
    pub fn date_span(&self) -> Option<DateRange> {
        let mut dates = self.records.iter().filter_map(|r| r.billing_date.known());
        let first = dates.next()?;
        let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(DateRange { start, end })
    }

    pub fn unknown_billing_dates(&self) -> usize {
        self.records
            .iter()
            .filter(|r| !r.billing_date.is_known())
            .count()
    }
}

/// Reads a source date loosely. Anything unreadable becomes `Unknown`.
pub fn parse_record_date(raw: Option<&RawDate>) -> RecordDate {
    match raw {
        None => RecordDate::Unknown,
        Some(RawDate::Native(date)) => RecordDate::Known(*date),
        Some(RawDate::Timestamp(ts)) => RecordDate::Known(ts.date()),
        Some(RawDate::Text(text)) => parse_date_text(text)
            .map(RecordDate::Known)
            .unwrap_or(RecordDate::Unknown),
        Some(RawDate::Other(_)) => RecordDate::Unknown,
    }
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts.date());
        }
    }

    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.date_naive())
}

fn normalize_record(raw: &RawBillingRecord) -> BillingRecord {
    let negotiation_date = parse_record_date(raw.negotiation_date.as_ref());
    let billing_date = parse_record_date(raw.billing_date.as_ref());
    let entry_date = parse_record_date(raw.entry_date.as_ref());

    let month_token = raw
        .month
        .and_then(month_token)
        .or_else(|| billing_date.known().and_then(|d| month_token(d.month())));

    BillingRecord {
        invoice_number: raw.invoice_number.clone(),
        negotiation_date,
        billing_date,
        entry_date,
        year: raw.year,
        month: raw.month,
        month_token,
        partner_code: raw.partner_code.clone(),
        partner_name: raw.partner_name.clone(),
        operation_type: raw.operation_type.clone(),
        revenue: raw.revenue,
        product_code: raw.product_code.clone(),
        product_description: raw.product_description.clone(),
        cfop: raw.cfop.clone(),
        ncm: raw.ncm.clone(),
        quantity: raw.quantity,
        unit: raw.unit.clone(),
    }
}

/// Turns fetched rows into a [`NormalizedTable`] with the same number of rows.
///
/// A bad date never fails the load: the field becomes [`RecordDate::Unknown`]
/// and the row is kept.
pub fn normalize(raw_rows: &[RawBillingRecord]) -> NormalizedTable {
    let records: Vec<BillingRecord> = raw_rows.iter().map(normalize_record).collect();

    let mut unknown_billing = 0;
    let mut missing_token = 0;
    for record in &records {
        if !record.billing_date.is_known() {
            unknown_billing += 1;
            debug!(
                "Invoice {}: billing date could not be parsed, kept as unknown",
                record.invoice_number
            );
        }
        if record.month_token.is_none() {
            missing_token += 1;
            debug!(
                "Invoice {}: no valid month (got {:?}), left out of the monthly view",
                record.invoice_number, record.month
            );
        }
    }

    info!("Normalized {} billing records", records.len());
    if unknown_billing > 0 {
        warn!(
            "{} of {} records have an unknown billing date and are excluded from date-filtered views",
            unknown_billing,
            records.len()
        );
    }
    if missing_token > 0 {
        warn!("{} records have no derivable month token", missing_token);
    }

    NormalizedTable::new(records)
}
