//! Reconciliation: computed aggregates against an independently maintained
//! reference ledger.
//!
//! Special rules run first and consume the entries they cover; the generic
//! forward and reverse passes then report everything left over. Zero
//! discrepancies is the success state.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ReconRule, ReconcileConfig};
use crate::model::{Discrepancy, DiscrepancyKind, Ledger};

/// Compare a computed totals map against a reference ledger.
///
/// Output order is deterministic: special-rule discrepancies in declaration
/// order, forward-pass discrepancies in reference encounter order, then
/// reverse-pass discrepancies in computed key order.
pub fn compare(
    reference: &Ledger,
    computed: &BTreeMap<String, f64>,
    cfg: &ReconcileConfig,
) -> Vec<Discrepancy> {
    let reference = apply_aliases_ledger(reference, cfg);
    let computed = apply_aliases_map(computed, cfg);

    let mut discrepancies = Vec::new();
    let mut excluded: BTreeSet<String> = BTreeSet::new();

    // Phase 1: summary and conversion pre-rules, declaration order.
    for rule in &cfg.rules {
        match rule {
            ReconRule::Summary {
                label,
                select_contains,
                select_excludes,
                reference: ref_key,
            } => {
                let mut selected: Vec<&str> = Vec::new();
                let mut sum = 0.0;
                for (name, value) in &computed {
                    let wanted = select_contains.iter().all(|s| name.contains(s.as_str()))
                        && select_excludes.iter().all(|s| !name.contains(s.as_str()));
                    if wanted {
                        selected.push(name.as_str());
                        sum += value;
                    }
                }
                for name in &selected {
                    excluded.insert((*name).to_string());
                }
                excluded.insert(ref_key.clone());

                let ref_value = reference.get(ref_key).unwrap_or(0.0);
                if (sum - ref_value).abs() > cfg.epsilon {
                    discrepancies.push(Discrepancy {
                        product: label.clone(),
                        kind: DiscrepancyKind::SummaryMismatch,
                        reference: Some(ref_value),
                        computed: Some(sum),
                        note: Some(format!("sum of {}", selected.join(" + "))),
                    });
                }
            }
            ReconRule::Conversion {
                label,
                base,
                scaled,
                ratio,
                reference: ref_key,
            } => {
                let base_value = computed.get(base).copied().unwrap_or(0.0);
                let scaled_value = computed.get(scaled).copied().unwrap_or(0.0);
                let combined = base_value + scaled_value * ratio;

                excluded.insert(base.clone());
                excluded.insert(scaled.clone());
                excluded.insert(ref_key.clone());

                let ref_value = reference.get(ref_key).unwrap_or(0.0);
                if (combined - ref_value).abs() > cfg.epsilon {
                    discrepancies.push(Discrepancy {
                        product: label.clone(),
                        kind: DiscrepancyKind::SummaryMismatch,
                        reference: Some(ref_value),
                        computed: Some(combined),
                        note: Some(format!("{base} + {scaled} * {ratio}")),
                    });
                }
            }
        }
    }

    // Phase 2: forward pass over reference keys.
    for (name, ref_value) in reference.iter() {
        if excluded.contains(name) {
            continue;
        }
        match computed.get(name) {
            None => discrepancies.push(Discrepancy {
                product: name.to_string(),
                kind: DiscrepancyKind::MissingInTarget,
                reference: Some(ref_value),
                computed: None,
                note: None,
            }),
            Some(&value) if (ref_value - value).abs() > cfg.epsilon => {
                discrepancies.push(Discrepancy {
                    product: name.to_string(),
                    kind: DiscrepancyKind::ValueMismatch,
                    reference: Some(ref_value),
                    computed: Some(value),
                    note: None,
                });
            }
            Some(_) => {}
        }
    }

    // Phase 3: reverse pass over computed keys.
    for (name, &value) in &computed {
        if excluded.contains(name.as_str()) || reference.get(name).is_some() {
            continue;
        }
        if cfg.ignore_contains.iter().any(|p| name.contains(p.as_str())) {
            continue;
        }
        discrepancies.push(Discrepancy {
            product: name.clone(),
            kind: DiscrepancyKind::ExtraInSource,
            reference: None,
            computed: Some(value),
            note: None,
        });
    }

    discrepancies
}

fn apply_aliases_ledger(ledger: &Ledger, cfg: &ReconcileConfig) -> Ledger {
    if cfg.aliases.is_empty() {
        return ledger.clone();
    }
    let mut out = Ledger::new();
    for (name, value) in ledger.iter() {
        out.insert(resolve_alias(name, cfg), value);
    }
    out
}

fn apply_aliases_map(map: &BTreeMap<String, f64>, cfg: &ReconcileConfig) -> BTreeMap<String, f64> {
    if cfg.aliases.is_empty() {
        return map.clone();
    }
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    for (name, value) in map {
        *out.entry(resolve_alias(name, cfg)).or_insert(0.0) += value;
    }
    out
}

fn resolve_alias(name: &str, cfg: &ReconcileConfig) -> String {
    cfg.aliases
        .get(name)
        .cloned()
        .unwrap_or_else(|| name.to_string())
}
