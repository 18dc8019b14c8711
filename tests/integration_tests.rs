use billing_summary::*;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

const SOURCE_CSV: &str = "\
numero_nf;data_negociacao;data_faturamento;data_entrada;ano;mes;cod_parceiro;parceiro;operacao;cod_produto;produto;cfop;ncm;quantidade;receita
5001;2024-01-02;2024-01-05;2024-01-03;2024;1;C01;Metalúrgica Alfa;Venda;P-10;Eixo;5101;8483;10;1.500,00
5002;2024-01-10;2024-01-18;2024-01-11;2024;1;C02;Usinagem Beta;Venda;P-11;Bucha;5101;8483;4;320,50
5003;2024-02-01;2024-02-20;2024-02-02;2024;2;C01;Metalúrgica Alfa;Devolução;P-10;Eixo;1201;8483;-1;-150,00
5004;2024-03-01;2024-03-15;;2024;3;C03;Comercial Gama;;P-12;Polia;5102;8483;2;800,00
5005;2024-03-09;data ruim;2024-03-10;2024;3;C02;Usinagem Beta;Venda;P-11;Bucha;5101;8483;1;75,00
5006;2023-12-20;2023-12-28;2023-12-21;2023;12;C04;Delta Peças;Venda;P-13;Mancal;5101;8483;3;999,99
";

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn load_table(dir: &tempfile::TempDir) -> NormalizedTable {
    let path = write_source(dir, "faturamento.csv", SOURCE_CSV);
    let rows = CsvDataSource::new(&path)
        .with_delimiter(b';')
        .fetch()
        .unwrap();
    normalize(&rows)
}

#[test]
fn test_csv_to_summary_for_first_quarter() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_source(&dir, "faturamento.csv", SOURCE_CSV);
    let source = CsvDataSource::new(&path).with_delimiter(b';');

    let filter = SummaryFilter::with_date_range(DateRange::from_period("2024-01:2024-03")?);
    let summary = process_billing_summary(&source, &filter, &SummaryConfig::default())?;

    // 5005 has an unreadable billing date, 5006 is outside the window
    assert_eq!(summary.record_count, 4);
    assert!((summary.total_revenue - 2470.5).abs() < 1e-6);
    assert_eq!(summary.total_revenue_fmt, "R$ 2.470,50");

    let monthly: Vec<(&str, f64)> = summary
        .monthly
        .iter()
        .map(|m| (m.month_token.as_str(), m.revenue))
        .collect();
    assert_eq!(monthly.len(), 12);
    assert_eq!(monthly[0].0, "01");
    assert!((monthly[0].1 - 1820.5).abs() < 1e-6);
    assert!((monthly[1].1 + 150.0).abs() < 1e-6);
    assert!((monthly[2].1 - 800.0).abs() < 1e-6);
    assert!(monthly[3..].iter().all(|(_, revenue)| *revenue == 0.0));
    assert_eq!(summary.monthly[1].revenue_fmt, "R$ -150,00");

    let labels: Vec<&str> = summary
        .by_operation
        .iter()
        .map(|c| c.label.as_str())
        .collect();
    assert_eq!(labels, vec!["Devolução", "Sem operação", "Venda"]);

    let percent: f64 = summary.by_operation.iter().map(|c| c.percent_of_total).sum();
    assert!((percent - 100.0).abs() < 1e-6);

    let top: Vec<&str> = summary
        .top_partners
        .iter()
        .map(|p| p.partner_name.as_str())
        .collect();
    assert_eq!(top, vec!["Metalúrgica Alfa", "Comercial Gama", "Usinagem Beta"]);

    let detail: Vec<&str> = summary
        .detail
        .iter()
        .map(|r| r.invoice_number.as_str())
        .collect();
    assert_eq!(detail, vec!["5004", "5003", "5002", "5001"]);
    assert_eq!(summary.detail[3].revenue_fmt, "R$ 1.500,00");

    Ok(())
}

#[test]
fn test_conservation_across_views() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_table(&dir);
    let span = table.date_span().unwrap();
    assert_eq!(span.start, ymd(2023, 12, 28));
    assert_eq!(span.end, ymd(2024, 3, 15));

    let filtered = filter_by_date(&table, span.start, span.end);
    assert_eq!(filtered.len(), table.len() - table.unknown_billing_dates());

    let direct = filtered.total_revenue();
    let monthly: f64 = monthly_totals(&filtered).iter().map(|m| m.revenue).sum();
    let by_operation: f64 = categorical_totals(
        &filtered,
        CategoryKey::OperationType,
        SortOrder::Descending,
        "Sem operação",
    )
    .iter()
    .map(|c| c.revenue)
    .sum();
    let by_partner: f64 = categorical_totals(
        &filtered,
        CategoryKey::PartnerName,
        SortOrder::Descending,
        "Sem operação",
    )
    .iter()
    .map(|c| c.revenue)
    .sum();

    assert!((monthly - direct).abs() < 1e-6);
    assert!((by_operation - direct).abs() < 1e-6);
    assert!((by_partner - direct).abs() < 1e-6);
}

#[test]
fn test_unfiltered_view_keeps_unknown_dates() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_table(&dir);

    let summary = BillingSummaryProcessor::summarize(
        &table,
        &SummaryFilter::default(),
        &SummaryConfig::default(),
    );

    assert_eq!(summary.record_count, 6);
    assert_eq!(summary.detail.last().unwrap().invoice_number, "5005");
    assert_eq!(summary.detail.last().unwrap().billing_date, RecordDate::Unknown);
}

#[test]
fn test_categorical_filter() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_table(&dir);

    let filter = SummaryFilter {
        operation_types: Some(BTreeSet::from([Category::Missing])),
        ..SummaryFilter::default()
    };
    let summary = BillingSummaryProcessor::summarize(&table, &filter, &SummaryConfig::default());
    assert_eq!(summary.record_count, 1);
    assert_eq!(summary.by_operation[0].category, Category::Missing);
    assert!((summary.by_operation[0].percent_of_total - 100.0).abs() < 1e-9);

    let filter = SummaryFilter {
        date_range: Some(DateRange::new(ymd(2024, 1, 1), ymd(2024, 12, 31)).unwrap()),
        partners: Some(BTreeSet::from(["Usinagem Beta".to_string()])),
        ..SummaryFilter::default()
    };
    let summary = BillingSummaryProcessor::summarize(&table, &filter, &SummaryConfig::default());
    assert_eq!(summary.record_count, 1);
    assert_eq!(summary.detail[0].invoice_number, "5002");
}

#[test]
fn test_empty_window_is_degenerate_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_table(&dir);

    let filter = SummaryFilter::with_date_range(DateRange::from_period("2030-01").unwrap());
    let summary = BillingSummaryProcessor::summarize(&table, &filter, &SummaryConfig::default());

    assert_eq!(summary.record_count, 0);
    assert_eq!(summary.monthly.len(), 12);
    assert!(summary.monthly.iter().all(|m| m.revenue_fmt == "R$ 0,00"));
    assert!(summary.by_operation.is_empty());
    assert!(summary.by_partner.is_empty());
    assert!(summary.top_partners.is_empty());
    assert!(summary.detail.is_empty());
}

#[test]
fn test_json_source_with_mixed_dates() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let json = r#"[
        {"numero_nf": "1", "data_faturamento": "2024-05-02", "mes": 5, "parceiro": "A", "operacao": "Venda", "receita": 10.0},
        {"numero_nf": "2", "data_faturamento": "2024-05-03T08:15:00", "mes": 5, "parceiro": "B", "operacao": "Venda", "receita": 20.0},
        {"numero_nf": "3", "data_faturamento": "03/05/2024", "mes": 5, "parceiro": "C", "operacao": null, "receita": 30.0},
        {"numero_nf": "4", "data_faturamento": 45000, "mes": 5, "parceiro": "D", "receita": 40.0}
    ]"#;
    let path = write_source(&dir, "faturamento.json", json);

    let filter = SummaryFilter::with_date_range(DateRange::from_period("2024-05")?);
    let summary = process_billing_summary(
        &JsonDataSource::new(&path),
        &filter,
        &SummaryConfig::default(),
    )?;

    assert_eq!(summary.record_count, 3);
    assert!((summary.monthly[4].revenue - 60.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_broken_json_is_data_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "faturamento.json", "[{\"numero_nf\": ");

    let result = process_billing_summary(
        &JsonDataSource::new(&path),
        &SummaryFilter::default(),
        &SummaryConfig::default(),
    );
    assert!(matches!(
        result,
        Err(BillingSummaryError::DataUnavailable { .. })
    ));
}

#[test]
fn test_config_file_drives_top_n() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = write_source(
        &dir,
        "config.json",
        r#"{"top_n": 2, "partner_order": "Ascending", "export_sheet_name": "Vendas"}"#,
    );
    let config = SummaryConfig::from_json_file(&config_path)?;
    let table = load_table(&dir);

    let summary = BillingSummaryProcessor::summarize(&table, &SummaryFilter::default(), &config);
    assert_eq!(summary.top_partners.len(), 2);
    assert!(summary.by_partner.windows(2).all(|w| w[0].revenue <= w[1].revenue));

    Ok(())
}

#[test]
fn test_detail_and_record_exports() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let table = load_table(&dir);
    let filter = SummaryFilter::with_date_range(DateRange::from_period("2024-01:2024-03")?);
    let config = SummaryConfig::default();
    let summary = BillingSummaryProcessor::summarize(&table, &filter, &config);

    let exporter = XlsxExporter::new(config.export_sheet_name.as_str());

    let detail = ExportTable::from_detail(&summary.detail);
    assert_eq!(detail.rows.len(), 4);
    let bytes = exporter.export(&detail)?;
    assert_eq!(&bytes[..2], b"PK");

    let records = ExportTable::from_records(table.filter(&filter).records().iter().copied());
    assert_eq!(records.headers.len(), 16);
    assert_eq!(records.rows.len(), 4);
    let bytes = exporter.export(&records)?;
    assert_eq!(&bytes[..2], b"PK");

    let out = dir.path().join("faturamento.xlsx");
    fs::write(&out, &bytes)?;
    assert!(fs::metadata(&out)?.len() > 0);

    Ok(())
}
