//! Channel attribution: grand totals, named buckets, and the diversion
//! accumulator.
//!
//! Named buckets are mutually exclusive partitions of a subset of each
//! product's total; the retail/unattributed remainder is always derived,
//! never summed from source tags.

use std::collections::BTreeMap;

use crate::config::ChannelSpec;
use crate::model::AggregationResult;

pub struct ChannelAggregator<'a> {
    specs: &'a [ChannelSpec],
    totals: BTreeMap<String, f64>,
    channels: BTreeMap<String, BTreeMap<String, f64>>,
    diverted: BTreeMap<String, f64>,
    skipped: usize,
}

impl<'a> ChannelAggregator<'a> {
    pub fn new(specs: &'a [ChannelSpec]) -> Self {
        Self {
            specs,
            totals: BTreeMap::new(),
            channels: BTreeMap::new(),
            diverted: BTreeMap::new(),
            skipped: 0,
        }
    }

    /// Accumulate a classified row. The quantity always reaches the grand
    /// total; it additionally reaches the first named bucket whose marker is
    /// contained in the tag. Unmatched tags stay in the implicit remainder.
    pub fn ingest(&mut self, product: &str, quantity: f64, channel_tag: &str) {
        *self.totals.entry(product.to_string()).or_insert(0.0) += quantity;

        if let Some(spec) = self
            .specs
            .iter()
            .find(|s| channel_tag.contains(s.marker.as_str()))
        {
            *self
                .channels
                .entry(product.to_string())
                .or_default()
                .entry(spec.name.clone())
                .or_insert(0.0) += quantity;
        }
    }

    /// Route a diverted row into the side accumulator only. It must not
    /// appear in the grand total or any named bucket.
    pub fn divert(&mut self, product: &str, quantity: f64) {
        *self.diverted.entry(product.to_string()).or_insert(0.0) += quantity;
    }

    /// Record a row dropped because both name and quantity were absent.
    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn into_result(self) -> AggregationResult {
        AggregationResult {
            totals: self.totals,
            channels: self.channels,
            diverted: self.diverted,
            skipped_rows: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelSpec;

    fn specs() -> Vec<ChannelSpec> {
        vec![
            ChannelSpec {
                name: "platform-a-delivery".into(),
                marker: "unmapped platform-a".into(),
            },
            ChannelSpec {
                name: "platform-b-delivery".into(),
                marker: "unmapped platform-b".into(),
            },
            ChannelSpec {
                name: "group-buy".into(),
                marker: "group-buy".into(),
            },
        ]
    }

    #[test]
    fn marker_routing() {
        let specs = specs();
        let mut agg = ChannelAggregator::new(&specs);
        agg.ingest("pudding", 3.0, "unmapped platform-a item");
        agg.ingest("pudding", 2.0, "group-buy redemption");
        agg.ingest("pudding", 5.0, "walk-in");

        let result = agg.into_result();
        assert_eq!(result.total("pudding"), 10.0);
        assert_eq!(result.channel("pudding", "platform-a-delivery"), 3.0);
        assert_eq!(result.channel("pudding", "group-buy"), 2.0);
        assert_eq!(result.remainder("pudding"), 5.0);
    }

    #[test]
    fn unknown_tag_reaches_grand_total_only() {
        let specs = specs();
        let mut agg = ChannelAggregator::new(&specs);
        agg.ingest("pudding", 4.0, "late-arriving tag");

        let result = agg.into_result();
        assert_eq!(result.total("pudding"), 4.0);
        assert!(result.channels.get("pudding").is_none());
        assert_eq!(result.remainder("pudding"), 4.0);
    }

    #[test]
    fn diverted_rows_bypass_channels() {
        let specs = specs();
        let mut agg = ChannelAggregator::new(&specs);
        agg.divert("family-pack mixed-dessert", 2.0);

        let result = agg.into_result();
        assert_eq!(result.total("family-pack mixed-dessert"), 0.0);
        assert_eq!(result.diverted["family-pack mixed-dessert"], 2.0);
        assert_eq!(result.diverted_total(), 2.0);
    }

    #[test]
    fn channel_partition_plus_remainder_equals_total() {
        let specs = specs();
        let mut agg = ChannelAggregator::new(&specs);
        agg.ingest("banana milk", 7.0, "unmapped platform-b");
        agg.ingest("banana milk", 1.5, "group-buy");
        agg.ingest("banana milk", 2.5, "");
        let result = agg.into_result();

        let named: f64 = result.channels["banana milk"].values().sum();
        assert!((named + result.remainder("banana milk") - result.total("banana milk")).abs() < 0.01);
    }
}
