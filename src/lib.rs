//! # Billing Summary
//!
//! A library for turning a flat table of billing line items into the summary
//! views a revenue dashboard renders.
//!
//! ## Core Concepts
//!
//! - **Data Source**: anything that yields [`RawBillingRecord`]s (CSV, JSON, a database query)
//! - **Normalization**: loose dates become [`RecordDate::Known`] or [`RecordDate::Unknown`],
//!   every row gets a zero-padded month token, no row is dropped
//! - **Filtering**: an explicit [`SummaryFilter`] (inclusive billing-date window, operation
//!   types, partners); there is no ambient filter state
//! - **Views**: monthly totals over the fixed `"01".."12"` domain, per-category totals with
//!   percentages, a top-N partner ranking and a newest-first detail table
//! - **Export**: the detail table (or the filtered records) as an `.xlsx` byte stream
//!
//! ## Example
//!
//! ```rust,ignore
//! use billing_summary::*;
//!
//! let source = CsvDataSource::new("faturamento.csv").with_delimiter(b';');
//! let config = SummaryConfig::default();
//! let filter = SummaryFilter::with_date_range(DateRange::from_period("2024-01:2024-06")?);
//!
//! let summary = process_billing_summary(&source, &filter, &config)?;
//! for month in &summary.monthly {
//!     println!("{}: {}", month.month_token, month.revenue_fmt);
//! }
//!
//! let xlsx = XlsxExporter::new(&config.export_sheet_name)
//!     .export(&ExportTable::from_detail(&summary.detail))?;
//! ```

pub mod engine;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod normalizer;
pub mod schema;
pub mod utils;

pub use engine::{
    categorical_totals, detail_table, filter_by_date, monthly_totals, top_n, FilteredTable,
};
pub use error::{BillingSummaryError, Result};
pub use export::{ExportCell, ExportTable, Exporter, XlsxExporter};
pub use ingestion::{read_csv, CsvDataSource, DataSource, JsonDataSource};
pub use normalizer::{normalize, NormalizedTable};
pub use schema::*;
pub use utils::{format_brl, month_token, MONTH_TOKENS};

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Every view of one render cycle, computed from a single normalized snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BillingSummary {
    #[schemars(description = "The filter the views were computed with")]
    pub filter: SummaryFilter,

    #[schemars(description = "Rows that passed the filter")]
    pub record_count: usize,

    pub total_revenue: f64,
    pub total_revenue_fmt: String,

    #[schemars(description = "Exactly twelve entries, '01' to '12', zero where no row matched")]
    pub monthly: Vec<MonthlyTotal>,

    pub by_operation: Vec<CategoryTotal>,
    pub by_partner: Vec<CategoryTotal>,

    #[schemars(description = "Highest-revenue partners, largest first, at most top_n entries")]
    pub top_partners: Vec<PartnerTotal>,

    #[schemars(description = "Filtered rows, newest billing date first")]
    pub detail: Vec<DetailRow>,
}

impl BillingSummary {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BillingSummary)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

pub struct BillingSummaryProcessor;

impl BillingSummaryProcessor {
    /// Computes all views against one table. Never fails: degenerate input
    /// yields zero-filled and empty views.
    pub fn summarize(
        table: &NormalizedTable,
        filter: &SummaryFilter,
        config: &SummaryConfig,
    ) -> BillingSummary {
        let filtered = table.filter(filter);

        debug!("Applying filter {:?}", filter);
        info!(
            "Summarizing {} of {} billing records",
            filtered.len(),
            table.len()
        );

        let total_revenue = filtered.total_revenue();

        BillingSummary {
            filter: filter.clone(),
            record_count: filtered.len(),
            total_revenue,
            total_revenue_fmt: format_brl(total_revenue),
            monthly: monthly_totals(&filtered),
            by_operation: categorical_totals(
                &filtered,
                CategoryKey::OperationType,
                config.operation_order,
                &config.missing_category_label,
            ),
            by_partner: categorical_totals(
                &filtered,
                CategoryKey::PartnerName,
                config.partner_order,
                &config.missing_category_label,
            ),
            top_partners: top_n(&filtered, config.top_n),
            detail: detail_table(&filtered),
        }
    }

    /// Fetches, normalizes and summarizes. A fetch failure is returned as-is and
    /// no partial summary is produced.
    pub fn process<S: DataSource + ?Sized>(
        source: &S,
        filter: &SummaryFilter,
        config: &SummaryConfig,
    ) -> Result<BillingSummary> {
        config.validate()?;

        info!("Loading billing records from {}", source.name());
        let raw_rows = source.fetch()?;
        let table = normalize(&raw_rows);

        Ok(Self::summarize(&table, filter, config))
    }
}

pub fn process_billing_summary<S: DataSource + ?Sized>(
    source: &S,
    filter: &SummaryFilter,
    config: &SummaryConfig,
) -> Result<BillingSummary> {
    BillingSummaryProcessor::process(source, filter, config)
}
