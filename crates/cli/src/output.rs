//! Human-readable rendering for command output. JSON paths serialize the
//! engine types directly.

use tallybook_engine::{AggregationResult, Discrepancy};

/// Quantities are fractional in principle but integral in practice; print
/// whole numbers without a trailing ".0".
pub fn fmt_qty(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

pub fn render_aggregate(result: &AggregationResult, channel_names: &[String]) -> String {
    let mut out = String::new();

    let width = result
        .totals
        .keys()
        .chain(result.diverted.keys())
        .map(|n| n.len())
        .max()
        .unwrap_or(0)
        .max("product".len());

    out.push_str(&format!("{:<width$}  {:>8}", "product", "total"));
    for name in channel_names {
        out.push_str(&format!("  {name:>18}"));
    }
    out.push_str(&format!("  {:>8}\n", "walk-in"));

    for (product, &total) in &result.totals {
        out.push_str(&format!("{product:<width$}  {:>8}", fmt_qty(total)));
        for name in channel_names {
            out.push_str(&format!("  {:>18}", fmt_qty(result.channel(product, name))));
        }
        out.push_str(&format!("  {:>8}\n", fmt_qty(result.remainder(product))));
    }

    for (product, &qty) in &result.diverted {
        out.push_str(&format!("{product:<width$}  {:>8}  (diverted)\n", fmt_qty(qty)));
    }

    if result.skipped_rows > 0 {
        out.push_str(&format!("({} blank rows skipped)\n", result.skipped_rows));
    }
    out
}

pub fn render_discrepancy(d: &Discrepancy) -> String {
    let mut line = format!("{}: {}", d.kind, d.product);
    match (d.reference, d.computed) {
        (Some(r), Some(c)) => {
            line.push_str(&format!(" (reference {}, computed {}", fmt_qty(r), fmt_qty(c)));
            if let Some(diff) = d.difference() {
                line.push_str(&format!(", diff {}", fmt_qty(diff)));
            }
            line.push(')');
        }
        (Some(r), None) => line.push_str(&format!(" (reference {})", fmt_qty(r))),
        (None, Some(c)) => line.push_str(&format!(" (computed {})", fmt_qty(c))),
        (None, None) => {}
    }
    if let Some(note) = &d.note {
        line.push_str(&format!(" [{note}]"));
    }
    line
}
