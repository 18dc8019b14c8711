use crate::error::{BillingSummaryError, Result};
use crate::utils::parse_period_string;
use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// A date as delivered by the data source, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawDate {
    #[schemars(description = "Calendar date in YYYY-MM-DD format")]
    Native(NaiveDate),

    #[schemars(description = "Timestamp in YYYY-MM-DDTHH:MM:SS format; the time part is dropped")]
    Timestamp(NaiveDateTime),

    #[schemars(description = "Free-form text such as '05/01/2024' or '2024-01-05 10:00:00'")]
    Text(String),

    #[schemars(description = "Anything else the source produced; always normalizes to Unknown")]
    Other(serde_json::Value),
}

impl From<NaiveDate> for RawDate {
    fn from(date: NaiveDate) -> Self {
        Self::Native(date)
    }
}

impl From<&str> for RawDate {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// One billing line item exactly as the data source yields it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawBillingRecord {
    #[serde(alias = "numero_nf")]
    #[schemars(description = "Invoice number; repeated across negotiation revisions")]
    pub invoice_number: String,

    #[serde(default, alias = "data_negociacao")]
    pub negotiation_date: Option<RawDate>,

    #[serde(default, alias = "data_faturamento")]
    #[schemars(description = "The date every date-range filter compares against")]
    pub billing_date: Option<RawDate>,

    #[serde(default, alias = "data_entrada")]
    pub entry_date: Option<RawDate>,

    #[serde(default, alias = "ano")]
    pub year: Option<i32>,

    #[serde(default, alias = "mes")]
    #[schemars(description = "Calendar month, 1 = January")]
    pub month: Option<u32>,

    #[serde(default, alias = "cod_parceiro")]
    pub partner_code: Option<String>,

    #[serde(alias = "parceiro")]
    pub partner_name: String,

    #[serde(default, alias = "operacao")]
    #[schemars(description = "Operation type; null is kept as its own category")]
    pub operation_type: Option<String>,

    #[serde(alias = "receita")]
    #[schemars(description = "Revenue amount; negative for credit notes")]
    pub revenue: f64,

    #[serde(default, alias = "cod_produto")]
    pub product_code: Option<String>,

    #[serde(default, alias = "produto")]
    pub product_description: Option<String>,

    #[serde(default)]
    pub cfop: Option<String>,

    #[serde(default)]
    pub ncm: Option<String>,

    #[serde(default, alias = "quantidade")]
    pub quantity: Option<f64>,

    #[serde(default, alias = "unidade")]
    pub unit: Option<String>,
}

/// A parsed date, or the explicit marker that the source value could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum RecordDate {
    Known(NaiveDate),
    Unknown,
}

impl RecordDate {
    pub fn known(&self) -> Option<NaiveDate> {
        match self {
            Self::Known(date) => Some(*date),
            Self::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl fmt::Display for RecordDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(date) => write!(f, "{}", date.format("%d/%m/%Y")),
            Self::Unknown => f.write_str("-"),
        }
    }
}

/// A normalized billing line item. Built once per fetch and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BillingRecord {
    pub invoice_number: String,
    pub negotiation_date: RecordDate,
    pub billing_date: RecordDate,
    pub entry_date: RecordDate,
    pub year: Option<i32>,
    pub month: Option<u32>,
    #[schemars(description = "Zero-padded month label '01'..'12', absent when no month can be derived")]
    pub month_token: Option<String>,
    pub partner_code: Option<String>,
    pub partner_name: String,
    pub operation_type: Option<String>,
    pub revenue: f64,
    pub product_code: Option<String>,
    pub product_description: Option<String>,
    pub cfop: Option<String>,
    pub ncm: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

/// A grouping value. `Missing` stands for a null source value and sorts last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    Value(String),
    Missing,
}

impl Category {
    pub fn from_option(value: Option<&str>) -> Self {
        match value {
            Some(v) => Self::Value(v.to_string()),
            None => Self::Missing,
        }
    }

    pub fn label(&self, missing_label: &str) -> String {
        match self {
            Self::Value(v) => v.clone(),
            Self::Missing => missing_label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum CategoryKey {
    #[schemars(description = "Group by the operation type (null is its own group)")]
    OperationType,

    #[schemars(description = "Group by the business partner name")]
    PartnerName,
}

impl CategoryKey {
    pub fn category_of(&self, record: &BillingRecord) -> Category {
        match self {
            Self::OperationType => Category::from_option(record.operation_type.as_deref()),
            Self::PartnerName => Category::Value(record.partner_name.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum SortOrder {
    #[schemars(description = "Smallest revenue first; horizontal bars then draw the largest on top")]
    Ascending,

    #[default]
    #[schemars(description = "Largest revenue first")]
    Descending,
}

/// Inclusive window over billing dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(BillingSummaryError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whole months, "YYYY-MM" or "YYYY-MM:YYYY-MM".
    pub fn from_period(period: &str) -> Result<Self> {
        let (start, end) = parse_period_string(period)?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Everything a caller can narrow a view by. Empty means "all rows".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryFilter {
    #[serde(default)]
    #[schemars(description = "When set, rows with an unknown billing date are dropped")]
    pub date_range: Option<DateRange>,

    #[serde(default)]
    pub operation_types: Option<BTreeSet<Category>>,

    #[serde(default)]
    pub partners: Option<BTreeSet<String>>,
}

impl SummaryFilter {
    pub fn with_date_range(date_range: DateRange) -> Self {
        Self {
            date_range: Some(date_range),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &BillingRecord) -> bool {
        if let Some(range) = &self.date_range {
            match record.billing_date.known() {
                Some(date) if range.contains(date) => {}
                _ => return false,
            }
        }

        if let Some(operations) = &self.operation_types {
            let category = CategoryKey::OperationType.category_of(record);
            if !operations.contains(&category) {
                return false;
            }
        }

        if let Some(partners) = &self.partners {
            if !partners.contains(&record.partner_name) {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummaryConfig {
    #[serde(default = "default_top_n")]
    #[schemars(description = "How many partners the ranking keeps")]
    pub top_n: usize,

    #[serde(default = "default_operation_order")]
    pub operation_order: SortOrder,

    #[serde(default)]
    pub partner_order: SortOrder,

    #[serde(default = "default_missing_category_label")]
    #[schemars(description = "Display label for rows without an operation type")]
    pub missing_category_label: String,

    #[serde(default = "default_export_sheet_name")]
    pub export_sheet_name: String,
}

fn default_top_n() -> usize {
    10
}

fn default_operation_order() -> SortOrder {
    SortOrder::Ascending
}

fn default_missing_category_label() -> String {
    "Sem operação".to_string()
}

fn default_export_sheet_name() -> String {
    "Faturamento".to_string()
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            operation_order: default_operation_order(),
            partner_order: SortOrder::Descending,
            missing_category_label: default_missing_category_label(),
            export_sheet_name: default_export_sheet_name(),
        }
    }
}

impl SummaryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.missing_category_label.trim().is_empty() {
            return Err(BillingSummaryError::InvalidConfig(
                "missing_category_label must not be empty".to_string(),
            ));
        }

        // Excel caps worksheet names at 31 characters
        let sheet_len = self.export_sheet_name.chars().count();
        if sheet_len == 0 || sheet_len > 31 {
            return Err(BillingSummaryError::InvalidConfig(format!(
                "export_sheet_name must have 1 to 31 characters, got {}",
                sheet_len
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyTotal {
    #[schemars(description = "Month label '01'..'12'")]
    pub month_token: String,
    pub revenue: f64,
    pub revenue_fmt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryTotal {
    pub category: Category,
    #[schemars(description = "Display label; the configured placeholder for a missing category")]
    pub label: String,
    pub revenue: f64,
    pub revenue_fmt: String,
    #[schemars(description = "Share of the summed revenue, 0..100; 0 for every row when the total is zero")]
    pub percent_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PartnerTotal {
    pub partner_name: String,
    pub revenue: f64,
    pub revenue_fmt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetailRow {
    pub billing_date: RecordDate,
    pub partner_name: String,
    pub invoice_number: String,
    #[schemars(description = "Unformatted amount for numeric sorting and export")]
    pub revenue: f64,
    pub revenue_fmt: String,
}
