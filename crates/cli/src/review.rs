//! `tally review` — distinct review-platform customers for the day.

use std::path::PathBuf;

use serde::Serialize;

use tallybook_engine::loader::load_review_rows;
use tallybook_engine::review::{count_distinct_reviewers, reviewable};

use crate::{load_rules, read_source, resolve_date, CliError};

#[derive(Serialize)]
struct ReviewReport {
    distinct_customers: usize,
    reviewable: u32,
}

pub fn cmd_review(
    redemptions: Option<PathBuf>,
    rules_path: Option<PathBuf>,
    date: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let rules = load_rules(rules_path.as_ref())?;
    let target_date = resolve_date(date.as_deref())?;

    let src = rules.sources.review.as_ref().ok_or_else(|| {
        CliError::rules(tallybook_engine::EngineError::UnknownSource("review".into()).to_string())
    })?;
    let path = redemptions
        .unwrap_or_else(|| PathBuf::from(&src.file));
    let rows =
        load_review_rows(&read_source(&path)?, src).map_err(|e| CliError::source(e.to_string()))?;

    let count = count_distinct_reviewers(&rows, &rules.review, target_date);
    let eligible = reviewable(count, &rules.review);

    if json {
        let report = ReviewReport {
            distinct_customers: count,
            reviewable: eligible,
        };
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        println!(
            "{count} distinct {} customers on {target_date}, {eligible} reviewable",
            rules.review.platform
        );
    }
    Ok(())
}
