//! CSV loading for the configured source exports.
//!
//! Column names come from the rule table, never hard-coded; a missing
//! column is an error, a malformed cell is not. Dates in the exports are
//! inconsistent (datetime, date-only, underscored times, dates buried in
//! free text), so parsing is deliberately forgiving.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::{GroupBuySource, PaymentSource, RankingSource, ReviewSource};
use crate::error::EngineError;
use crate::model::{CellValue, Ledger, RawRecord};

/// Rows that survived the source filters, plus the count that did not.
#[derive(Debug, Default)]
pub struct SourceRows {
    pub rows: Vec<RawRecord>,
    pub skipped: usize,
}

/// One row of the payment-method export.
#[derive(Debug, Clone)]
pub struct PaymentRow {
    pub method: String,
    pub amount: CellValue,
}

/// Review columns of one redemption row.
#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub redeemed_at: Option<NaiveDate>,
    pub platform: String,
    pub customer_tail: String,
}

fn read_headers(data: &str) -> Result<(csv::Reader<&[u8]>, Vec<String>), EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    Ok((reader, headers))
}

fn resolve(headers: &[String], source: &str, column: &str) -> Result<usize, EngineError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| EngineError::MissingColumn {
            source: source.into(),
            column: column.into(),
        })
}

fn field(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").trim().to_string()
}

/// Load the item-ranking export: one record per row, no filtering.
pub fn load_ranking_rows(data: &str, src: &RankingSource) -> Result<Vec<RawRecord>, EngineError> {
    let (mut reader, headers) = read_headers(data)?;
    let name_at = resolve(&headers, "ranking", &src.name)?;
    let qty_at = resolve(&headers, "ranking", &src.quantity)?;
    let channel_at = resolve(&headers, "ranking", &src.channel)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Io(e.to_string()))?;
        rows.push(RawRecord {
            name: field(&record, name_at),
            quantity: CellValue::from_field(&field(&record, qty_at)),
            channel_tag: field(&record, channel_at),
            redeemed_at: None,
            site: None,
        });
    }
    Ok(rows)
}

/// Load the group-buy redemption export, scoped to one day and one site.
///
/// Rows whose redemption date cannot be parsed, falls on another day, or
/// whose site does not match the configured substring are skipped and
/// counted. Quantity defaults to 1 per redemption.
pub fn load_group_buy_rows(
    data: &str,
    src: &GroupBuySource,
    target_date: Option<NaiveDate>,
) -> Result<SourceRows, EngineError> {
    let (mut reader, headers) = read_headers(data)?;
    let name_at = resolve(&headers, "group-buy", &src.name)?;
    let date_at = resolve(&headers, "group-buy", &src.redeemed_at)?;
    let site_at = match (&src.site, &src.site_contains) {
        (Some(column), Some(_)) => Some(resolve(&headers, "group-buy", column)?),
        _ => None,
    };

    let mut out = SourceRows::default();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Io(e.to_string()))?;

        let redeemed_at = parse_flexible_date(&field(&record, date_at));
        if let Some(target) = target_date {
            match redeemed_at {
                Some(date) if date == target => {}
                _ => {
                    out.skipped += 1;
                    continue;
                }
            }
        }

        let site = site_at.map(|i| field(&record, i));
        if let (Some(site), Some(wanted)) = (&site, &src.site_contains) {
            if !site.contains(wanted.as_str()) {
                out.skipped += 1;
                continue;
            }
        }

        out.rows.push(RawRecord {
            name: field(&record, name_at),
            quantity: CellValue::Number(1.0),
            channel_tag: src.channel_tag.clone(),
            redeemed_at,
            site,
        });
    }
    Ok(out)
}

/// Sum the redemption amounts over the same day/site scope as
/// [`load_group_buy_rows`]. Returns 0.0 when no amount column is configured.
pub fn sum_group_buy_amount(
    data: &str,
    src: &GroupBuySource,
    target_date: Option<NaiveDate>,
) -> Result<f64, EngineError> {
    let amount_column = match &src.amount {
        Some(column) => column,
        None => return Ok(0.0),
    };
    let (mut reader, headers) = read_headers(data)?;
    let date_at = resolve(&headers, "group-buy", &src.redeemed_at)?;
    let amount_at = resolve(&headers, "group-buy", amount_column)?;
    let site_at = match (&src.site, &src.site_contains) {
        (Some(column), Some(_)) => Some(resolve(&headers, "group-buy", column)?),
        _ => None,
    };

    let mut sum = 0.0;
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Io(e.to_string()))?;
        if let Some(target) = target_date {
            match parse_flexible_date(&field(&record, date_at)) {
                Some(date) if date == target => {}
                _ => continue,
            }
        }
        if let (Some(i), Some(wanted)) = (site_at, &src.site_contains) {
            if !field(&record, i).contains(wanted.as_str()) {
                continue;
            }
        }
        sum += CellValue::from_field(&field(&record, amount_at)).as_quantity();
    }
    Ok(sum)
}

/// Load the payment-method export: method label + collected amount.
pub fn load_payment_rows(data: &str, src: &PaymentSource) -> Result<Vec<PaymentRow>, EngineError> {
    let (mut reader, headers) = read_headers(data)?;
    let method_at = resolve(&headers, "payment", &src.method)?;
    let amount_at = resolve(&headers, "payment", &src.amount)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Io(e.to_string()))?;
        rows.push(PaymentRow {
            method: field(&record, method_at),
            amount: CellValue::from_field(&field(&record, amount_at)),
        });
    }
    Ok(rows)
}

/// Load the review columns of the group-buy export.
pub fn load_review_rows(data: &str, src: &ReviewSource) -> Result<Vec<ReviewRow>, EngineError> {
    let (mut reader, headers) = read_headers(data)?;
    let date_at = resolve(&headers, "review", &src.redeemed_at)?;
    let platform_at = resolve(&headers, "review", &src.platform)?;
    let tail_at = resolve(&headers, "review", &src.customer_tail)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Io(e.to_string()))?;
        rows.push(ReviewRow {
            redeemed_at: parse_flexible_date(&field(&record, date_at)),
            platform: field(&record, platform_at),
            customer_tail: field(&record, tail_at),
        });
    }
    Ok(rows)
}

/// Load a two-column ledger export (product, value), preserving row order
/// and accumulating repeated products.
pub fn load_ledger_rows(
    data: &str,
    name_column: &str,
    value_column: &str,
) -> Result<Ledger, EngineError> {
    let (mut reader, headers) = read_headers(data)?;
    let name_at = resolve(&headers, "ledger", name_column)?;
    let value_at = resolve(&headers, "ledger", value_column)?;

    let mut ledger = Ledger::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Io(e.to_string()))?;
        let name = field(&record, name_at);
        if name.is_empty() {
            continue;
        }
        let value = CellValue::from_field(&field(&record, value_at)).as_quantity();
        ledger.insert(name, value);
    }
    Ok(ledger)
}

const DATETIME_LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H_%M_%S",
    "%Y/%m/%d %H_%M_%S",
];

const DATE_LAYOUTS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parse a date from the formats the exports actually use. As a last
/// resort, pull the first date-shaped run out of free text.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for layout in DATETIME_LAYOUTS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt.date());
        }
    }
    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, layout) {
            return Some(date);
        }
    }
    static EMBEDDED: OnceLock<Regex> = OnceLock::new();
    let pattern = EMBEDDED.get_or_init(|| {
        Regex::new(r"\d{4}[-/]\d{1,2}[-/]\d{1,2}").expect("embedded date pattern")
    });
    let found = pattern.find(raw)?;
    let normalized = found.as_str().replace('/', "-");
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()
}
