//! Top-level aggregation pipeline: canonicalize, extract, classify.

use crate::channel::ChannelAggregator;
use crate::config::RuleBook;
use crate::model::{AggregationResult, RawRecord};
use crate::{canonical, quantity};

/// Run the full pipeline over pre-loaded records.
///
/// Rows with a blank name and an empty quantity cell are counted as skipped.
/// Diverted rows land in the side accumulator and never touch a channel.
pub fn run(rules: &RuleBook, records: &[RawRecord]) -> AggregationResult {
    let mut agg = ChannelAggregator::new(&rules.channels);
    for record in records {
        if record.name.trim().is_empty() && record.quantity.is_empty() {
            agg.skip();
            continue;
        }
        let canonical = canonical::canonicalize(rules, &record.name);
        let (qty, diverted) = quantity::extract(rules, &record.name, &canonical, &record.quantity);
        if diverted {
            agg.divert(&canonical, qty);
        } else {
            agg.ingest(&canonical, qty, &record.channel_tag);
        }
    }
    agg.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    fn record(name: &str, qty: CellValue, tag: &str) -> RawRecord {
        RawRecord {
            name: name.to_string(),
            quantity: qty,
            channel_tag: tag.to_string(),
            redeemed_at: None,
            site: None,
        }
    }

    fn book(extra: &str) -> RuleBook {
        RuleBook::from_toml(&format!(
            r#"
name = "Pipeline"

[[canonical.rules]]
all_of = ["fresh-milk"]
name = "fresh-milk"

[[quantity.rules]]
family = ["fresh-milk"]
effect = "unit_multiplier"

[[channels]]
name = "platform-a-delivery"
marker = "unmapped platform-a"
{extra}
"#
        ))
        .unwrap()
    }

    #[test]
    fn pipeline_end_to_end() {
        let rules = book("");
        let records = vec![
            record(
                "[promo] fresh-milk 3-pack",
                CellValue::Number(2.0),
                "unmapped platform-a order",
            ),
            record("fresh-milk", CellValue::Number(1.0), "walk-in"),
            record("pudding", CellValue::Text("4".into()), "walk-in"),
        ];
        let result = run(&rules, &records);
        assert_eq!(result.total("fresh-milk"), 7.0);
        assert_eq!(result.channel("fresh-milk", "platform-a-delivery"), 6.0);
        assert_eq!(result.total("pudding"), 4.0);
        assert_eq!(result.skipped_rows, 0);
        assert_eq!(result.remainder("fresh-milk"), 1.0);
    }

    #[test]
    fn blank_rows_are_counted_skipped() {
        let rules = book("");
        let records = vec![
            record("", CellValue::Empty, ""),
            record("   ", CellValue::Empty, ""),
            record("pudding", CellValue::Number(1.0), ""),
        ];
        let result = run(&rules, &records);
        assert_eq!(result.skipped_rows, 2);
        assert_eq!(result.total("pudding"), 1.0);
    }

    #[test]
    fn named_row_with_empty_cell_still_counts() {
        let rules = book("");
        let result = run(&rules, &[record("pudding", CellValue::Empty, "")]);
        assert_eq!(result.skipped_rows, 0);
        assert_eq!(result.total("pudding"), 0.0);
        assert!(result.totals.contains_key("pudding"));
    }

    #[test]
    fn diverted_rows_bypass_channels() {
        let rules = book(
            r#"
[[quantity.rules]]
family = ["pudding"]
raw_contains = ["favorite"]
effect = "fixed_divert"
factor = 2.0
"#,
        );
        let result = run(
            &rules,
            &[record(
                "favorite pudding",
                CellValue::Number(3.0),
                "unmapped platform-a order",
            )],
        );
        assert_eq!(result.diverted.get("favorite pudding"), Some(&6.0));
        assert!(result.totals.is_empty());
        assert!(result.channels.is_empty());
    }
}
