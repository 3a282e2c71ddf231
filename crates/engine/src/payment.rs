//! Payment-lane summarization and the end-of-day receipts/sales sheet.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::PaymentConfig;
use crate::loader::PaymentRow;

/// Collected amounts per configured lane bucket. Methods with no matching
/// lane are ignored rather than invented.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct PaymentSummary {
    pub lanes: BTreeMap<String, f64>,
}

impl PaymentSummary {
    /// Route rows to lanes by exact method label.
    pub fn summarize(rows: &[PaymentRow], cfg: &PaymentConfig) -> Self {
        let mut lanes: BTreeMap<String, f64> = BTreeMap::new();
        for row in rows {
            if let Some(lane) = cfg.lanes.iter().find(|l| l.label == row.method) {
                *lanes.entry(lane.bucket.clone()).or_insert(0.0) += row.amount.as_quantity();
            }
        }
        Self { lanes }
    }

    pub fn lane(&self, bucket: &str) -> f64 {
        self.lanes.get(bucket).copied().unwrap_or(0.0)
    }

    /// Over-the-counter total, derived from the configured retail lanes.
    pub fn retail(&self, cfg: &PaymentConfig) -> f64 {
        cfg.retail_lanes.iter().map(|b| self.lane(b)).sum()
    }
}

/// Amounts the register cannot see, keyed in by hand each evening.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualEntries {
    pub stored_value: f64,
    pub pass_card_value: f64,
    pub platform_b: f64,
    pub short_video: f64,
}

/// The two end-of-day figures.
///
/// Receipts is money that actually arrived today, so stored-value and
/// pass-card top-ups count and balance/coupon spending does not. Sales is
/// goods that left today, so the opposite holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayTotals {
    pub retail: f64,
    pub receipts: f64,
    pub sales: f64,
}

pub fn day_totals(
    summary: &PaymentSummary,
    cfg: &PaymentConfig,
    manual: &ManualEntries,
    group_buy_amount: f64,
) -> DayTotals {
    let retail = summary.retail(cfg);
    let platform = cfg
        .platform_lane
        .as_deref()
        .map(|b| summary.lane(b))
        .unwrap_or(0.0);
    let balance = cfg
        .balance_lane
        .as_deref()
        .map(|b| summary.lane(b))
        .unwrap_or(0.0);
    let coupon = cfg
        .coupon_lane
        .as_deref()
        .map(|b| summary.lane(b))
        .unwrap_or(0.0);

    let shared = retail + manual.platform_b + platform + group_buy_amount + manual.short_video;
    DayTotals {
        retail,
        receipts: shared + manual.stored_value + manual.pass_card_value,
        sales: shared + balance + coupon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleBook;
    use crate::model::CellValue;

    fn cfg() -> PaymentConfig {
        RuleBook::from_toml(
            r#"
name = "Payments"

[payment]
retail_lanes = ["cash", "mobile-a", "mobile-b"]
platform_lane = "platform-a"
balance_lane = "member-balance"
coupon_lane = "coupon-credit"

[[payment.lanes]]
bucket = "cash"
label = "cash"

[[payment.lanes]]
bucket = "mobile-a"
label = "wechat-pay"

[[payment.lanes]]
bucket = "mobile-b"
label = "alipay"

[[payment.lanes]]
bucket = "platform-a"
label = "platform-a"

[[payment.lanes]]
bucket = "member-balance"
label = "stored-balance"

[[payment.lanes]]
bucket = "coupon-credit"
label = "coupon-credit"
"#,
        )
        .unwrap()
        .payment
    }

    fn row(method: &str, amount: f64) -> PaymentRow {
        PaymentRow {
            method: method.to_string(),
            amount: CellValue::Number(amount),
        }
    }

    #[test]
    fn exact_labels_route_and_accumulate() {
        let rows = vec![
            row("cash", 100.0),
            row("cash", 20.5),
            row("wechat-pay", 50.0),
            row("gift-card", 999.0),
        ];
        let summary = PaymentSummary::summarize(&rows, &cfg());
        assert_eq!(summary.lane("cash"), 120.5);
        assert_eq!(summary.lane("mobile-a"), 50.0);
        assert_eq!(summary.lane("mobile-b"), 0.0);
        // Unknown methods are dropped, not bucketed.
        assert_eq!(summary.lanes.len(), 2);
    }

    #[test]
    fn retail_is_derived_from_configured_lanes() {
        let rows = vec![
            row("cash", 100.0),
            row("wechat-pay", 50.0),
            row("alipay", 30.0),
            row("stored-balance", 40.0),
        ];
        let summary = PaymentSummary::summarize(&rows, &cfg());
        assert_eq!(summary.retail(&cfg()), 180.0);
    }

    #[test]
    fn receipts_and_sales_split_prepaid_from_spent() {
        let cfg = cfg();
        let rows = vec![
            row("cash", 100.0),
            row("wechat-pay", 50.0),
            row("alipay", 30.0),
            row("platform-a", 70.0),
            row("stored-balance", 25.0),
            row("coupon-credit", 5.0),
        ];
        let summary = PaymentSummary::summarize(&rows, &cfg);
        let manual = ManualEntries {
            stored_value: 200.0,
            pass_card_value: 60.0,
            platform_b: 40.0,
            short_video: 10.0,
        };
        let totals = day_totals(&summary, &cfg, &manual, 33.0);
        assert_eq!(totals.retail, 180.0);
        // retail + platform_b + platform-a + group-buy + short-video = 333
        assert_eq!(totals.receipts, 333.0 + 200.0 + 60.0);
        assert_eq!(totals.sales, 333.0 + 25.0 + 5.0);
    }
}
