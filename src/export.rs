// Spreadsheet export of the detail view or of the filtered records.
//
// The core hands over typed cells; formatting (widths, number formats,
// alignment) is decided here and nowhere else.

use crate::error::Result;
use crate::schema::{BillingRecord, DetailRow, RecordDate};
use chrono::{Datelike, NaiveDate};
use log::debug;
use rust_xlsxwriter::{ExcelDateTime, Format, FormatAlign, Workbook, Worksheet};

const CURRENCY_NUM_FORMAT: &str = "#,##0.00";
const DATE_NUM_FORMAT: &str = "dd/mm/yyyy";
const DATE_DISPLAY_FORMAT: &str = "%d/%m/%Y";
const MIN_COLUMN_WIDTH: usize = 8;
const COLUMN_PADDING: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ExportCell {
    Text(String),
    Date(NaiveDate),
    Currency(f64),
    Number(f64),
    Empty,
}

impl ExportCell {
    /// Characters the cell occupies when rendered, for column sizing.
    fn display_width(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::Date(_) => 10,
            // digits, separators and two decimals
            Self::Currency(value) | Self::Number(value) => {
                let integer_digits = format!("{:.0}", value.abs().trunc()).len();
                let separators = integer_digits.saturating_sub(1) / 3;
                let sign = usize::from(*value < 0.0);
                sign + integer_digits + separators + 3
            }
            Self::Empty => 0,
        }
    }
}

impl From<RecordDate> for ExportCell {
    fn from(date: RecordDate) -> Self {
        match date {
            RecordDate::Known(date) => Self::Date(date),
            RecordDate::Unknown => Self::Empty,
        }
    }
}

impl From<Option<&String>> for ExportCell {
    fn from(text: Option<&String>) -> Self {
        match text {
            Some(text) => Self::Text(text.clone()),
            None => Self::Empty,
        }
    }
}

/// A single worksheet worth of data: one header row, then typed cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<ExportCell>>,
}

impl ExportTable {
    /// The dashboard's sales table: Data, Cliente, NF, Receita.
    pub fn from_detail(rows: &[DetailRow]) -> Self {
        Self {
            headers: ["Data", "Cliente", "NF", "Receita"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: rows
                .iter()
                .map(|row| {
                    vec![
                        ExportCell::from(row.billing_date),
                        ExportCell::Text(row.partner_name.clone()),
                        ExportCell::Text(row.invoice_number.clone()),
                        ExportCell::Currency(row.revenue),
                    ]
                })
                .collect(),
        }
    }

    /// Every field of the given records, descriptive columns included.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a BillingRecord>,
    {
        let headers = [
            "NF",
            "Data Negociação",
            "Data Faturamento",
            "Data Entrada",
            "Ano",
            "Mês",
            "Cód. Parceiro",
            "Cliente",
            "Operação",
            "Cód. Produto",
            "Produto",
            "CFOP",
            "NCM",
            "Quantidade",
            "Unidade",
            "Receita",
        ];

        let rows = records
            .into_iter()
            .map(|r| {
                vec![
                    ExportCell::Text(r.invoice_number.clone()),
                    ExportCell::from(r.negotiation_date),
                    ExportCell::from(r.billing_date),
                    ExportCell::from(r.entry_date),
                    r.year
                        .map(|y| ExportCell::Number(f64::from(y)))
                        .unwrap_or(ExportCell::Empty),
                    ExportCell::from(r.month_token.as_ref()),
                    ExportCell::from(r.partner_code.as_ref()),
                    ExportCell::Text(r.partner_name.clone()),
                    ExportCell::from(r.operation_type.as_ref()),
                    ExportCell::from(r.product_code.as_ref()),
                    ExportCell::from(r.product_description.as_ref()),
                    ExportCell::from(r.cfop.as_ref()),
                    ExportCell::from(r.ncm.as_ref()),
                    r.quantity.map(ExportCell::Number).unwrap_or(ExportCell::Empty),
                    ExportCell::from(r.unit.as_ref()),
                    ExportCell::Currency(r.revenue),
                ]
            })
            .collect();

        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    /// Widest rendered cell per column, header included.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (col, cell) in row.iter().enumerate() {
                let width = cell.display_width();
                match widths.get_mut(col) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }
        widths
    }
}

/// Serializes an [`ExportTable`] into spreadsheet bytes.
pub trait Exporter {
    fn export(&self, table: &ExportTable) -> Result<Vec<u8>>;
}

pub struct XlsxExporter {
    sheet_name: String,
}

impl XlsxExporter {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    fn write_cell(
        worksheet: &mut Worksheet,
        row: u32,
        col: u16,
        cell: &ExportCell,
        formats: &CellFormats,
    ) -> Result<()> {
        match cell {
            ExportCell::Text(text) => {
                worksheet.write_string_with_format(row, col, text.as_str(), &formats.text)?;
            }
            ExportCell::Date(date) => match excel_date(date) {
                Some(serial) => {
                    worksheet.write_datetime_with_format(row, col, &serial, &formats.date)?;
                }
                // outside Excel's 1900..=9999 calendar
                None => {
                    let text = date.format(DATE_DISPLAY_FORMAT).to_string();
                    worksheet.write_string_with_format(row, col, text, &formats.text)?;
                }
            },
            ExportCell::Currency(value) => {
                worksheet.write_number_with_format(row, col, *value, &formats.currency)?;
            }
            ExportCell::Number(value) => {
                worksheet.write_number_with_format(row, col, *value, &formats.number)?;
            }
            ExportCell::Empty => {}
        }
        Ok(())
    }
}

fn excel_date(date: &NaiveDate) -> Option<ExcelDateTime> {
    let year = u16::try_from(date.year()).ok()?;
    ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8).ok()
}

struct CellFormats {
    header: Format,
    text: Format,
    date: Format,
    currency: Format,
    number: Format,
}

impl CellFormats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            text: Format::new(),
            date: Format::new()
                .set_num_format(DATE_NUM_FORMAT)
                .set_align(FormatAlign::Center),
            currency: Format::new()
                .set_num_format(CURRENCY_NUM_FORMAT)
                .set_align(FormatAlign::Right),
            number: Format::new().set_align(FormatAlign::Right),
        }
    }
}

impl Default for XlsxExporter {
    fn default() -> Self {
        Self::new("Faturamento")
    }
}

impl Exporter for XlsxExporter {
    fn export(&self, table: &ExportTable) -> Result<Vec<u8>> {
        let formats = CellFormats::new();
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(self.sheet_name.as_str())?;

        for (col, header) in table.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header.as_str(), &formats.header)?;
        }

        for (idx, row) in table.rows.iter().enumerate() {
            let excel_row = idx as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                Self::write_cell(worksheet, excel_row, col as u16, cell, &formats)?;
            }
        }

        for (col, width) in table.column_widths().into_iter().enumerate() {
            let width = width.max(MIN_COLUMN_WIDTH) + COLUMN_PADDING;
            worksheet.set_column_width(col as u16, width as f64)?;
        }

        let bytes = workbook.save_to_buffer()?;
        debug!(
            "Exported {} rows to sheet '{}' ({} bytes)",
            table.rows.len(),
            self.sheet_name,
            bytes.len()
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(date: Option<NaiveDate>, partner: &str, invoice: &str, revenue: f64) -> DetailRow {
        DetailRow {
            billing_date: date.map(RecordDate::Known).unwrap_or(RecordDate::Unknown),
            partner_name: partner.to_string(),
            invoice_number: invoice.to_string(),
            revenue,
            revenue_fmt: crate::utils::format_brl(revenue),
        }
    }

    #[test]
    fn test_table_from_detail() {
        let rows = vec![
            detail(NaiveDate::from_ymd_opt(2024, 2, 1), "ACME Indústria", "1001", 1234.5),
            detail(None, "Beta", "1002", -50.0),
        ];
        let table = ExportTable::from_detail(&rows);

        assert_eq!(table.headers, vec!["Data", "Cliente", "NF", "Receita"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][3], ExportCell::Currency(1234.5));
        assert_eq!(table.rows[1][0], ExportCell::Empty);
    }

    #[test]
    fn test_column_widths_follow_content() {
        let rows = vec![detail(
            NaiveDate::from_ymd_opt(2024, 2, 1),
            "A Very Long Partner Name",
            "1",
            1_234_567.0,
        )];
        let widths = ExportTable::from_detail(&rows).column_widths();

        assert_eq!(widths[0], 10);
        assert_eq!(widths[1], "A Very Long Partner Name".len());
        assert_eq!(widths[2], 2);
        // "1.234.567,00"
        assert_eq!(widths[3], 12);
    }

    #[test]
    fn test_xlsx_export_produces_zip_bytes() {
        let rows = vec![
            detail(NaiveDate::from_ymd_opt(2024, 2, 1), "ACME", "1001", 10.0),
            detail(NaiveDate::from_ymd_opt(2024, 1, 1), "Beta", "1002", 20.0),
        ];
        let bytes = XlsxExporter::default()
            .export(&ExportTable::from_detail(&rows))
            .unwrap();

        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_dates_convert_to_excel_serials() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(excel_date(&date).is_some());

        let too_early = NaiveDate::from_ymd_opt(1850, 1, 1).unwrap();
        assert!(excel_date(&too_early).is_none());
    }

    #[test]
    fn test_xlsx_export_with_unrepresentable_date() {
        let rows = vec![
            detail(NaiveDate::from_ymd_opt(1850, 1, 1), "Antiga", "1", 10.0),
            detail(NaiveDate::from_ymd_opt(2024, 1, 1), "Beta", "2", 20.0),
        ];
        let bytes = XlsxExporter::default()
            .export(&ExportTable::from_detail(&rows))
            .unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_xlsx_export_of_empty_table() {
        let bytes = XlsxExporter::new("Vazio")
            .export(&ExportTable::from_detail(&[]))
            .unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_invalid_sheet_name_is_an_export_error() {
        let result = XlsxExporter::new("bad/name").export(&ExportTable::default());
        assert!(matches!(
            result,
            Err(crate::error::BillingSummaryError::ExportError(_))
        ));
    }
}
