//! Quantity adjustment: cell coercion plus per-family multiplier and
//! diversion rules.

use crate::config::{QuantityEffect, RuleBook};
use crate::model::CellValue;

/// Coerce a raw quantity cell and apply the first matching quantity rule.
///
/// Returns the adjusted quantity and a diversion flag; diverted rows must
/// bypass channel classification entirely.
pub fn extract(
    rules: &RuleBook,
    raw_name: &str,
    canonical: &str,
    cell: &CellValue,
) -> (f64, bool) {
    let base = cell.as_quantity();
    for rule in &rules.quantity.rules {
        if !rule.matches(raw_name, canonical) {
            continue;
        }
        return match rule.effect {
            QuantityEffect::UnitMultiplier => {
                // The count lives in the raw label ("3-pack"); absence means
                // the base quantity already is the unit count.
                match rules.quantity.unit_multiplier(raw_name) {
                    Some(n) => (base * f64::from(n), false),
                    None => (base, false),
                }
            }
            QuantityEffect::Fixed => (base * rule.factor, false),
            QuantityEffect::FixedDivert => (base * rule.factor, true),
        };
    }
    (base, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleBook;

    fn book() -> RuleBook {
        RuleBook::from_toml(
            r#"
name = "Quantity Test"

[[quantity.rules]]
family = ["mixed-dessert"]
raw_contains = ["favorite"]
effect = "fixed_divert"
factor = 2.0

[[quantity.rules]]
family = ["mixed-dessert"]
effect = "fixed"
factor = 10.0

[[quantity.rules]]
family = ["fresh-milk"]
effect = "unit_multiplier"
"#,
        )
        .unwrap()
    }

    #[test]
    fn unit_multiplier_from_raw_label() {
        let b = book();
        let (qty, diverted) = extract(
            &b,
            "fresh-milk, 3-pack",
            "fresh-milk",
            &CellValue::Number(2.0),
        );
        assert_eq!(qty, 6.0);
        assert!(!diverted);
    }

    #[test]
    fn unit_multiplier_without_count_passes_through() {
        let b = book();
        let (qty, _) = extract(&b, "fresh-milk", "fresh-milk", &CellValue::Number(2.0));
        assert_eq!(qty, 2.0);
    }

    #[test]
    fn fixed_factor() {
        let b = book();
        let (qty, diverted) = extract(
            &b,
            "mixed-dessert deal",
            "family-pack mixed-dessert",
            &CellValue::Number(1.0),
        );
        assert_eq!(qty, 10.0);
        assert!(!diverted);
    }

    #[test]
    fn favorite_variant_diverts() {
        let b = book();
        let (qty, diverted) = extract(
            &b,
            "favorite-variant mixed-dessert",
            "family-pack mixed-dessert",
            &CellValue::Number(1.0),
        );
        assert_eq!(qty, 2.0);
        assert!(diverted);
    }

    #[test]
    fn rule_order_is_total() {
        // The divert rule precedes the fixed rule; a favorite row must never
        // see the x10 factor.
        let b = book();
        let (qty, diverted) = extract(
            &b,
            "favorite mixed-dessert, 10-piece",
            "family-pack mixed-dessert",
            &CellValue::Number(3.0),
        );
        assert_eq!(qty, 6.0);
        assert!(diverted);
    }

    #[test]
    fn unmatched_family_passes_through() {
        let b = book();
        let (qty, diverted) = extract(&b, "pudding", "pudding", &CellValue::Number(4.0));
        assert_eq!(qty, 4.0);
        assert!(!diverted);
    }

    #[test]
    fn coercion_degrades_to_zero() {
        let b = book();
        let (qty, _) = extract(&b, "pudding", "pudding", &CellValue::Formula);
        assert_eq!(qty, 0.0);
        let (qty, _) = extract(&b, "pudding", "pudding", &CellValue::Text("n/a".into()));
        assert_eq!(qty, 0.0);
    }
}
