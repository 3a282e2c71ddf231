//! `tally aggregate` — the day's per-product, per-channel totals.

use std::path::PathBuf;

use tallybook_engine::loader::{load_group_buy_rows, load_ranking_rows};
use tallybook_engine::{engine, RawRecord, RuleBook};

use crate::output::render_aggregate;
use crate::{load_rules, read_source, resolve_date, CliError};

pub fn cmd_aggregate(
    ranking: Option<PathBuf>,
    group_buy: Option<PathBuf>,
    rules_path: Option<PathBuf>,
    date: Option<String>,
    mut site: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let rules = load_rules(rules_path.as_ref())?;
    let target_date = resolve_date(date.as_deref())?;

    let mut records: Vec<RawRecord> = Vec::new();
    let mut source_skipped = 0usize;

    let ranking_path = ranking.or_else(|| {
        rules
            .sources
            .ranking
            .as_ref()
            .map(|s| PathBuf::from(&s.file))
    });
    let ranking_src = rules.sources.ranking.as_ref();
    match (ranking_path, ranking_src) {
        (Some(path), Some(src)) => {
            let data = read_source(&path)?;
            records.extend(
                load_ranking_rows(&data, src).map_err(|e| CliError::source(e.to_string()))?,
            );
        }
        (Some(_), None) => {
            return Err(CliError::rules(
                tallybook_engine::EngineError::UnknownSource("ranking".into()).to_string(),
            ));
        }
        (None, _) => {
            return Err(
                CliError::usage("no ranking export given").with_hint("pass --ranking <file>")
            );
        }
    }

    let explicit_group_buy = group_buy.is_some();
    let group_buy_path = group_buy.or_else(|| {
        rules
            .sources
            .group_buy
            .as_ref()
            .map(|s| PathBuf::from(&s.file))
    });
    if let (Some(path), Some(src)) = (group_buy_path, rules.sources.group_buy.as_ref()) {
        // A defaulted path that is simply absent is not an error.
        if explicit_group_buy || path.exists() {
            let mut src = src.clone();
            if let Some(wanted) = site.take() {
                src.site_contains = Some(wanted);
            }
            let data = read_source(&path)?;
            let loaded = load_group_buy_rows(&data, &src, Some(target_date))
                .map_err(|e| CliError::source(e.to_string()))?;
            source_skipped += loaded.skipped;
            records.extend(loaded.rows);
        }
    }
    if site.is_some() {
        return Err(
            CliError::usage("--site given but no group-buy source is in scope").with_hint(
                "declare [sources.group_buy] in the rule table or pass --group-buy <file>",
            ),
        );
    }

    let result = engine::run(&rules, &records);

    if json {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        print!("{}", render_aggregate(&result, &channel_names(&rules)));
        if source_skipped > 0 {
            eprintln!("({source_skipped} out-of-scope redemption rows skipped)");
        }
    }
    Ok(())
}

fn channel_names(rules: &RuleBook) -> Vec<String> {
    rules.channels.iter().map(|c| c.name.clone()).collect()
}
