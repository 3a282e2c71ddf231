use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// A raw quantity or amount cell as it arrives from a tabular export.
///
/// Sources disagree on representation: the ranking export carries numbers,
/// the group-buy export carries text, and a workbook saved without a recalc
/// pass leaves an unevaluated formula placeholder behind. Coercion never
/// fails; anything unusable becomes zero.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
    Formula,
}

impl CellValue {
    /// Classify a CSV field. Numeric fields become `Number`, a leading `=`
    /// marks a formula placeholder, blank fields are `Empty`.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else if trimmed.starts_with('=') {
            Self::Formula
        } else if let Ok(n) = trimmed.parse::<f64>() {
            Self::Number(n)
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Coerce to a quantity. Numbers pass through; text is parsed directly,
    /// then retried with non-numeric decoration stripped; blank and formula
    /// cells are zero.
    pub fn as_quantity(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => {
                if let Ok(n) = s.trim().parse::<f64>() {
                    return n;
                }
                let stripped: String = s
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.')
                    .collect();
                stripped.parse().unwrap_or(0.0)
            }
            Self::Empty | Self::Formula => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single normalized row from any sales export.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Free-text product label, exactly as the source wrote it.
    pub name: String,
    pub quantity: CellValue,
    /// Free-text channel tag; matched against channel markers during
    /// aggregation. Empty means unattributed.
    pub channel_tag: String,
    /// Redemption date for date-scoped sources.
    pub redeemed_at: Option<NaiveDate>,
    /// Site/store label for sources that mix several stores.
    pub site: Option<String>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Per-run aggregate: grand totals, named channel buckets, and the diversion
/// accumulator. The retail/unattributed remainder is never stored — it is
/// derived on demand so late or missing channel tags cannot double count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationResult {
    /// Canonical product → grand total quantity.
    pub totals: BTreeMap<String, f64>,
    /// Canonical product → named channel bucket → quantity.
    pub channels: BTreeMap<String, BTreeMap<String, f64>>,
    /// Canonical product → quantity routed past channel classification.
    pub diverted: BTreeMap<String, f64>,
    /// Rows dropped because both name and quantity were absent.
    pub skipped_rows: usize,
}

impl AggregationResult {
    pub fn total(&self, product: &str) -> f64 {
        self.totals.get(product).copied().unwrap_or(0.0)
    }

    pub fn channel(&self, product: &str, bucket: &str) -> f64 {
        self.channels
            .get(product)
            .and_then(|m| m.get(bucket))
            .copied()
            .unwrap_or(0.0)
    }

    /// Derived remainder: grand total minus every named bucket.
    pub fn remainder(&self, product: &str) -> f64 {
        let named: f64 = self
            .channels
            .get(product)
            .map(|m| m.values().sum())
            .unwrap_or(0.0);
        self.total(product) - named
    }

    pub fn diverted_total(&self) -> f64 {
        self.diverted.values().sum()
    }
}

// ---------------------------------------------------------------------------
// Reference ledger
// ---------------------------------------------------------------------------

/// The independently maintained reference side of a comparison.
///
/// Keys keep first-encounter order so discrepancy output is stable across
/// runs; duplicate keys accumulate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: Vec<(String, f64)>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut ledger = Self::new();
        for (name, value) in pairs {
            ledger.insert(name, value);
        }
        ledger
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 += value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Discrepancies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Reference key absent from the computed side.
    MissingInTarget,
    /// Computed key absent from the reference side.
    ExtraInSource,
    /// Both sides present, values differ beyond epsilon.
    ValueMismatch,
    /// A summary or conversion pre-rule failed its single comparison.
    SummaryMismatch,
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingInTarget => write!(f, "missing_in_target"),
            Self::ExtraInSource => write!(f, "extra_in_source"),
            Self::ValueMismatch => write!(f, "value_mismatch"),
            Self::SummaryMismatch => write!(f, "summary_mismatch"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    pub product: String,
    pub kind: DiscrepancyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Discrepancy {
    /// Absolute difference, when both sides carry a value.
    pub fn difference(&self) -> Option<f64> {
        match (self.reference, self.computed) {
            (Some(r), Some(c)) => Some((r - c).abs()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_value_classification() {
        assert_eq!(CellValue::from_field("12.5"), CellValue::Number(12.5));
        assert_eq!(CellValue::from_field("  3 "), CellValue::Number(3.0));
        assert_eq!(CellValue::from_field(""), CellValue::Empty);
        assert_eq!(CellValue::from_field("   "), CellValue::Empty);
        assert_eq!(CellValue::from_field("=SUM(E3:I3)"), CellValue::Formula);
        assert_eq!(
            CellValue::from_field("two"),
            CellValue::Text("two".into())
        );
    }

    #[test]
    fn coercion_never_fails() {
        assert_eq!(CellValue::Number(4.5).as_quantity(), 4.5);
        assert_eq!(CellValue::Text("12.5 cups".into()).as_quantity(), 12.5);
        assert_eq!(CellValue::Text("-2".into()).as_quantity(), -2.0);
        assert_eq!(CellValue::Text("n/a".into()).as_quantity(), 0.0);
        assert_eq!(CellValue::Empty.as_quantity(), 0.0);
        assert_eq!(CellValue::Formula.as_quantity(), 0.0);
    }

    #[test]
    fn ledger_keeps_encounter_order_and_accumulates() {
        let mut ledger = Ledger::new();
        ledger.insert("pudding", 3.0);
        ledger.insert("banana milk", 2.0);
        ledger.insert("pudding", 1.0);

        let keys: Vec<&str> = ledger.iter().map(|(n, _)| n).collect();
        assert_eq!(keys, vec!["pudding", "banana milk"]);
        assert_eq!(ledger.get("pudding"), Some(4.0));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn derived_remainder() {
        let mut result = AggregationResult::default();
        result.totals.insert("pudding".into(), 10.0);
        result
            .channels
            .entry("pudding".into())
            .or_default()
            .insert("group-buy".into(), 3.0);
        result
            .channels
            .entry("pudding".into())
            .or_default()
            .insert("platform-a-delivery".into(), 2.5);

        assert_eq!(result.remainder("pudding"), 4.5);
        assert_eq!(result.remainder("unknown"), 0.0);
    }

    #[test]
    fn discrepancy_difference() {
        let d = Discrepancy {
            product: "pudding".into(),
            kind: DiscrepancyKind::ValueMismatch,
            reference: Some(100.0),
            computed: Some(99.5),
            note: None,
        };
        assert_eq!(d.difference(), Some(0.5));

        let missing = Discrepancy {
            product: "pudding".into(),
            kind: DiscrepancyKind::MissingInTarget,
            reference: Some(1.0),
            computed: None,
            note: None,
        };
        assert_eq!(missing.difference(), None);
    }
}
