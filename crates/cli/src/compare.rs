//! `tally compare` — reference ledger vs computed ledger.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tallybook_engine::compare::compare;
use tallybook_engine::loader::load_ledger_rows;

use crate::exit_codes::EXIT_COMPARE_DIFFS;
use crate::output::render_discrepancy;
use crate::{load_rules, read_source, CliError};

pub fn cmd_compare(
    reference: PathBuf,
    computed: PathBuf,
    rules_path: Option<PathBuf>,
    name_column: &str,
    value_column: &str,
    json: bool,
) -> Result<(), CliError> {
    let rules = load_rules(rules_path.as_ref())?;

    let reference_data = read_source(&reference)?;
    let reference = load_ledger_rows(&reference_data, name_column, value_column)
        .map_err(|e| CliError::source(e.to_string()))?;

    let computed_data = read_source(&computed)?;
    let computed_ledger = load_ledger_rows(&computed_data, name_column, value_column)
        .map_err(|e| CliError::source(e.to_string()))?;
    let computed: BTreeMap<String, f64> = computed_ledger
        .iter()
        .map(|(n, v)| (n.to_string(), v))
        .collect();

    let discrepancies = compare(&reference, &computed, &rules.reconcile);

    if json {
        let json_str = serde_json::to_string_pretty(&discrepancies)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        for d in &discrepancies {
            println!("{}", render_discrepancy(d));
        }
    }

    if discrepancies.is_empty() {
        eprintln!("clean: both sides agree");
        Ok(())
    } else {
        Err(CliError {
            code: EXIT_COMPARE_DIFFS,
            message: format!("{} discrepancies", discrepancies.len()),
            hint: None,
        })
    }
}
