use crate::normalizer::NormalizedTable;
use crate::schema::{
    BillingRecord, Category, CategoryKey, CategoryTotal, DateRange, DetailRow, MonthlyTotal,
    PartnerTotal, SortOrder, SummaryFilter,
};
use crate::utils::{format_brl, round_to_cents, sum_revenue, MONTH_TOKENS};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// The rows of a [`NormalizedTable`] that passed a filter, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredTable<'a> {
    records: Vec<&'a BillingRecord>,
}

impl<'a> FilteredTable<'a> {
    pub fn records(&self) -> &[&'a BillingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_revenue(&self) -> f64 {
        sum_revenue(self.records.iter().map(|r| r.revenue))
    }
}

impl NormalizedTable {
    pub fn filter(&self, filter: &SummaryFilter) -> FilteredTable<'_> {
        FilteredTable {
            records: self.records().iter().filter(|r| filter.matches(r)).collect(),
        }
    }

    /// Every row, unknown billing dates included.
    pub fn unfiltered(&self) -> FilteredTable<'_> {
        FilteredTable {
            records: self.records().iter().collect(),
        }
    }
}

/// Keeps rows with `start <= billing_date <= end`. Unknown dates never match,
/// and an inverted window simply matches nothing.
pub fn filter_by_date(
    table: &NormalizedTable,
    start: NaiveDate,
    end: NaiveDate,
) -> FilteredTable<'_> {
    table.filter(&SummaryFilter::with_date_range(DateRange { start, end }))
}

/// Revenue per month token, always twelve entries "01".."12" in order.
pub fn monthly_totals(table: &FilteredTable<'_>) -> Vec<MonthlyTotal> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for record in table.records() {
        if let Some(token) = record.month_token.as_deref() {
            *sums.entry(token).or_insert(0.0) += record.revenue;
        }
    }

    MONTH_TOKENS
        .iter()
        .map(|token| {
            let revenue = sums.get(token).copied().unwrap_or(0.0);
            MonthlyTotal {
                month_token: token.to_string(),
                revenue,
                revenue_fmt: format_brl(revenue),
            }
        })
        .collect()
}

/// Groups by `key` in category order. Missing sorts after every named value.
fn group_revenue(table: &FilteredTable<'_>, key: CategoryKey) -> Vec<(Category, f64)> {
    let mut sums: BTreeMap<Category, f64> = BTreeMap::new();
    for record in table.records() {
        *sums.entry(key.category_of(record)).or_insert(0.0) += record.revenue;
    }
    sums.into_iter().collect()
}

fn by_revenue(order: SortOrder) -> impl Fn(&(Category, f64), &(Category, f64)) -> Ordering {
    move |a, b| {
        let ord = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

/// Revenue per category with its share of the total.
///
/// Null keys form their own category labelled `missing_label`. Ties keep
/// category order because the sort is stable.
pub fn categorical_totals(
    table: &FilteredTable<'_>,
    key: CategoryKey,
    order: SortOrder,
    missing_label: &str,
) -> Vec<CategoryTotal> {
    let mut groups = group_revenue(table, key);
    groups.sort_by(by_revenue(order));

    // cancelling sales and credit notes must read as a zero total
    let total = round_to_cents(sum_revenue(groups.iter().map(|(_, revenue)| *revenue)));

    groups
        .into_iter()
        .map(|(category, revenue)| {
            let percent_of_total = if total == 0.0 {
                0.0
            } else {
                revenue / total * 100.0
            };
            CategoryTotal {
                label: category.label(missing_label),
                category,
                revenue,
                revenue_fmt: format_brl(revenue),
                percent_of_total,
            }
        })
        .collect()
}

/// The `n` partners with the highest revenue, largest first.
///
/// Equal revenues rank by partner name ascending. Credit notes count, so a
/// partner's total may be negative.
pub fn top_n(table: &FilteredTable<'_>, n: usize) -> Vec<PartnerTotal> {
    let mut groups = group_revenue(table, CategoryKey::PartnerName);
    groups.sort_by(by_revenue(SortOrder::Descending));

    groups
        .into_iter()
        .take(n)
        .map(|(category, revenue)| PartnerTotal {
            partner_name: category.label(""),
            revenue,
            revenue_fmt: format_brl(revenue),
        })
        .collect()
}

/// Newest first by billing date; rows with the same date keep source order and
/// unknown dates go last.
pub fn detail_table(table: &FilteredTable<'_>) -> Vec<DetailRow> {
    let mut rows: Vec<DetailRow> = table
        .records()
        .iter()
        .map(|record| DetailRow {
            billing_date: record.billing_date,
            partner_name: record.partner_name.clone(),
            invoice_number: record.invoice_number.clone(),
            revenue: record.revenue,
            revenue_fmt: format_brl(record.revenue),
        })
        .collect();

    rows.sort_by(|a, b| match (a.billing_date.known(), b.billing_date.known()) {
        (Some(da), Some(db)) => db.cmp(&da),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    rows
}
