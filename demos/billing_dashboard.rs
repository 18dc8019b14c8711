use billing_summary::*;
use chrono::NaiveDate;

fn line(
    invoice: &str,
    date: &str,
    month: u32,
    partner: &str,
    operation: Option<&str>,
    revenue: f64,
) -> RawBillingRecord {
    RawBillingRecord {
        invoice_number: invoice.to_string(),
        billing_date: Some(RawDate::from(date)),
        month: Some(month),
        partner_name: partner.to_string(),
        operation_type: operation.map(str::to_string),
        revenue,
        ..Default::default()
    }
}

fn main() {
    println!("📊 Billing Dashboard Demo\n");

    let rows = vec![
        line("1001", "2024-01-05", 1, "Metalúrgica Alfa", Some("Venda"), 12_500.0),
        line("1002", "2024-01-19", 1, "Usinagem Beta", Some("Venda"), 4_320.75),
        line("1003", "2024-02-02", 2, "Metalúrgica Alfa", Some("Devolução"), -1_200.0),
        line("1004", "2024-04-11", 4, "Comercial Gama", None, 8_900.0),
        line("1005", "sem data", 4, "Delta Peças", Some("Venda"), 2_000.0),
        line("1006", "2024-06-30", 6, "Usinagem Beta", Some("Remessa"), 650.0),
    ];

    let table = normalize(&rows);
    let Some(span) = table.date_span() else {
        eprintln!("❌ No billing dates to build a window from");
        return;
    };

    println!(
        "🗓️  Window: {} to {} ({} rows, {} without billing date)\n",
        span.start,
        span.end,
        table.len(),
        table.unknown_billing_dates()
    );

    let config = SummaryConfig::default();
    let summary =
        BillingSummaryProcessor::summarize(&table, &SummaryFilter::with_date_range(span), &config);

    println!("Monthly revenue:");
    for month in &summary.monthly {
        println!("  {}: {:>16}", month.month_token, month.revenue_fmt);
    }

    println!("\nBy operation:");
    for category in &summary.by_operation {
        println!(
            "  {:<14} {:>16} {:>6.1}%",
            category.label, category.revenue_fmt, category.percent_of_total
        );
    }

    println!("\nTop partners:");
    for (rank, partner) in summary.top_partners.iter().enumerate() {
        println!("  {}. {:<18} {:>16}", rank + 1, partner.partner_name, partner.revenue_fmt);
    }

    println!("\nSales table:");
    for row in &summary.detail {
        println!(
            "  {}  {:<18} NF {:<6} {:>16}",
            row.billing_date, row.partner_name, row.invoice_number, row.revenue_fmt
        );
    }

    let q1 = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
    )
    .expect("Q1 bounds are ordered");
    let q1_total = filter_by_date(&table, q1.start, q1.end).total_revenue();
    println!("\n✅ Q1 total: {}", format_brl(q1_total));

    match XlsxExporter::new(&config.export_sheet_name)
        .export(&ExportTable::from_detail(&summary.detail))
    {
        Ok(bytes) => println!("✅ Spreadsheet export: {} bytes", bytes.len()),
        Err(e) => eprintln!("❌ Export failed: {}", e),
    }
}
