//! `tally payment` — lane totals and the receipts/sales day sheet.

use std::path::PathBuf;

use serde::Serialize;

use tallybook_engine::loader::{load_payment_rows, sum_group_buy_amount};
use tallybook_engine::payment::{day_totals, DayTotals, ManualEntries, PaymentSummary};

use crate::output::fmt_qty;
use crate::{load_rules, read_source, resolve_date, CliError};

/// Hand-keyed amounts from the command line.
pub struct Manual {
    pub stored_value: f64,
    pub pass_card: f64,
    pub platform_b: f64,
    pub short_video: f64,
}

#[derive(Serialize)]
struct PaymentReport {
    summary: PaymentSummary,
    group_buy_amount: f64,
    totals: DayTotals,
}

pub fn cmd_payment(
    payments: Option<PathBuf>,
    group_buy: Option<PathBuf>,
    rules_path: Option<PathBuf>,
    date: Option<String>,
    manual: Manual,
    json: bool,
) -> Result<(), CliError> {
    let rules = load_rules(rules_path.as_ref())?;
    let target_date = resolve_date(date.as_deref())?;

    let payments_path = payments.or_else(|| {
        rules
            .sources
            .payment
            .as_ref()
            .map(|s| PathBuf::from(&s.file))
    });
    let src = rules.sources.payment.as_ref().ok_or_else(|| {
        CliError::rules(tallybook_engine::EngineError::UnknownSource("payment".into()).to_string())
    })?;
    let path = payments_path
        .ok_or_else(|| CliError::usage("no payment export given").with_hint("pass --payments <file>"))?;
    let rows =
        load_payment_rows(&read_source(&path)?, src).map_err(|e| CliError::source(e.to_string()))?;
    let summary = PaymentSummary::summarize(&rows, &rules.payment);

    let explicit_group_buy = group_buy.is_some();
    let group_buy_path = group_buy.or_else(|| {
        rules
            .sources
            .group_buy
            .as_ref()
            .map(|s| PathBuf::from(&s.file))
    });
    let group_buy_amount = match (group_buy_path, rules.sources.group_buy.as_ref()) {
        (Some(path), Some(src)) if explicit_group_buy || path.exists() => {
            sum_group_buy_amount(&read_source(&path)?, src, Some(target_date))
                .map_err(|e| CliError::source(e.to_string()))?
        }
        _ => 0.0,
    };

    let entries = ManualEntries {
        stored_value: manual.stored_value,
        pass_card_value: manual.pass_card,
        platform_b: manual.platform_b,
        short_video: manual.short_video,
    };
    let totals = day_totals(&summary, &rules.payment, &entries, group_buy_amount);

    if json {
        let report = PaymentReport {
            summary,
            group_buy_amount,
            totals,
        };
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        for (bucket, &amount) in &summary.lanes {
            println!("{bucket:<16} {}", fmt_qty(amount));
        }
        println!("{:<16} {}", "group-buy", fmt_qty(group_buy_amount));
        println!("{:<16} {}", "retail", fmt_qty(totals.retail));
        println!("{:<16} {}", "receipts", fmt_qty(totals.receipts));
        println!("{:<16} {}", "sales", fmt_qty(totals.sales));
    }
    Ok(())
}
