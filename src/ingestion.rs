use crate::error::{BillingSummaryError, Result};
use crate::schema::{RawBillingRecord, RawDate};
use log::{info, warn};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Where raw billing rows come from.
///
/// A failed fetch is fatal for the render cycle and surfaces as
/// [`BillingSummaryError::DataUnavailable`]. Retries and caching belong to the
/// implementation, not to the aggregation core.
pub trait DataSource {
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<Vec<RawBillingRecord>>;
}

impl DataSource for Vec<RawBillingRecord> {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn fetch(&self) -> Result<Vec<RawBillingRecord>> {
        Ok(self.clone())
    }
}

// Every column arrives as text so a stray value in a date or month column
// degrades that field instead of the whole file.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "numero_nf")]
    invoice_number: String,
    #[serde(default, alias = "data_negociacao")]
    negotiation_date: Option<String>,
    #[serde(default, alias = "data_faturamento")]
    billing_date: Option<String>,
    #[serde(default, alias = "data_entrada")]
    entry_date: Option<String>,
    #[serde(default, alias = "ano")]
    year: Option<String>,
    #[serde(default, alias = "mes")]
    month: Option<String>,
    #[serde(default, alias = "cod_parceiro")]
    partner_code: Option<String>,
    #[serde(alias = "parceiro")]
    partner_name: String,
    #[serde(default, alias = "operacao")]
    operation_type: Option<String>,
    #[serde(alias = "receita")]
    revenue: String,
    #[serde(default, alias = "cod_produto")]
    product_code: Option<String>,
    #[serde(default, alias = "produto")]
    product_description: Option<String>,
    #[serde(default)]
    cfop: Option<String>,
    #[serde(default)]
    ncm: Option<String>,
    #[serde(default, alias = "quantidade")]
    quantity: Option<String>,
    #[serde(default, alias = "unidade")]
    unit: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reads "1234.56", "1.234,56", "1234,56" or "1,234.56". Whichever of `.` or
/// `,` comes last is the decimal separator; a separator repeated more than
/// once only groups thousands.
pub fn parse_amount(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let decimal = match (text.rfind(','), text.rfind('.')) {
        (Some(comma), Some(dot)) => {
            if comma > dot {
                ','
            } else {
                '.'
            }
        }
        (Some(_), None) => ',',
        (None, Some(_)) => '.',
        (None, None) => return text.parse::<f64>().ok(),
    };
    let grouping = if decimal == ',' { '.' } else { ',' };

    let normalized: String = if text.matches(decimal).count() > 1 {
        // "1.234.567"
        text.chars().filter(|c| *c != decimal && *c != grouping).collect()
    } else {
        text.chars()
            .filter(|c| *c != grouping)
            .map(|c| if c == decimal { '.' } else { c })
            .collect()
    };
    normalized.parse::<f64>().ok()
}

impl CsvRow {
    fn into_raw(self, line: usize) -> Result<RawBillingRecord> {
        let revenue = if self.revenue.trim().is_empty() {
            warn!(
                "Row {} (invoice {}) has no revenue, counting it as zero",
                line, self.invoice_number
            );
            0.0
        } else {
            parse_amount(&self.revenue).ok_or_else(|| BillingSummaryError::InvalidRecord {
                line,
                details: format!("unreadable revenue '{}'", self.revenue),
            })?
        };

        Ok(RawBillingRecord {
            invoice_number: self.invoice_number,
            negotiation_date: non_blank(self.negotiation_date).map(RawDate::Text),
            billing_date: non_blank(self.billing_date).map(RawDate::Text),
            entry_date: non_blank(self.entry_date).map(RawDate::Text),
            year: self.year.and_then(|y| y.trim().parse().ok()),
            month: self.month.and_then(|m| m.trim().parse().ok()),
            partner_code: non_blank(self.partner_code),
            partner_name: self.partner_name,
            operation_type: non_blank(self.operation_type),
            revenue,
            product_code: non_blank(self.product_code),
            product_description: non_blank(self.product_description),
            cfop: non_blank(self.cfop),
            ncm: non_blank(self.ncm),
            quantity: self.quantity.as_deref().and_then(parse_amount),
            unit: non_blank(self.unit),
        })
    }
}

/// Decodes CSV billing rows from any reader. Headers may use either the
/// English field names or the source system's Portuguese columns.
pub fn read_csv<R: Read>(reader: R, delimiter: u8) -> Result<Vec<RawBillingRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (idx, result) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        rows.push(row.into_raw(idx + 1)?);
    }
    Ok(rows)
}

pub struct CsvDataSource {
    path: PathBuf,
    name: String,
    delimiter: u8,
}

impl CsvDataSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl DataSource for CsvDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<RawBillingRecord>> {
        let file = File::open(&self.path)
            .map_err(|e| BillingSummaryError::data_unavailable(&self.name, e))?;
        let rows = read_csv(BufReader::new(file), self.delimiter)
            .map_err(|e| BillingSummaryError::data_unavailable(&self.name, e))?;

        info!("Fetched {} billing rows from CSV {}", rows.len(), self.name);
        Ok(rows)
    }
}

/// A JSON array of [`RawBillingRecord`] objects.
pub struct JsonDataSource {
    path: PathBuf,
    name: String,
}

impl JsonDataSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
        }
    }
}

impl DataSource for JsonDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<RawBillingRecord>> {
        let file = File::open(&self.path)
            .map_err(|e| BillingSummaryError::data_unavailable(&self.name, e))?;
        let rows: Vec<RawBillingRecord> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| BillingSummaryError::data_unavailable(&self.name, e))?;

        info!("Fetched {} billing rows from JSON {}", rows.len(), self.name);
        Ok(rows)
    }
}
