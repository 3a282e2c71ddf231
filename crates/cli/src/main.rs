// tallybook CLI - day-sheet aggregation, reconciliation, payments, reviews.

mod aggregate;
mod compare;
mod exit_codes;
mod output;
mod payment;
mod review;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use exit_codes::{EXIT_ERROR, EXIT_RULES_INVALID, EXIT_SOURCE_PARSE, EXIT_SUCCESS, EXIT_USAGE};
use tallybook_engine::RuleBook;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Day-sheet aggregation and reconciliation for shop exports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the day's sales per product and channel
    #[command(after_help = "\
Examples:
  tally aggregate --ranking item-ranking.csv
  tally aggregate --ranking item-ranking.csv --group-buy group-buy.csv --date 2026-03-05
  tally aggregate --rules shop.toml --json")]
    Aggregate {
        /// Item-ranking export (defaults to the rule table's source file)
        #[arg(long)]
        ranking: Option<PathBuf>,

        /// Group-buy redemption export
        #[arg(long)]
        group_buy: Option<PathBuf>,

        /// Rule table TOML (defaults to the shipped table)
        #[arg(long, env = "TALLY_RULES")]
        rules: Option<PathBuf>,

        /// Day to scope date-filtered sources to (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,

        /// Override the rule table's site filter substring
        #[arg(long)]
        site: Option<String>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Compare a reference ledger against a computed ledger
    #[command(after_help = "\
Examples:
  tally compare reference.csv computed.csv
  tally compare reference.csv computed.csv --rules shop.toml --json

Exits 1 when discrepancies exist, like diff(1).")]
    Compare {
        /// Reference-side ledger CSV
        reference: PathBuf,

        /// Computed-side ledger CSV
        computed: PathBuf,

        /// Rule table TOML (defaults to the shipped table)
        #[arg(long, env = "TALLY_RULES")]
        rules: Option<PathBuf>,

        /// Header of the product column in both files
        #[arg(long, default_value = "product")]
        name_column: String,

        /// Header of the value column in both files
        #[arg(long, default_value = "value")]
        value_column: String,

        /// Output JSON instead of one line per discrepancy
        #[arg(long)]
        json: bool,
    },

    /// Summarize payment lanes and the day's receipts/sales figures
    #[command(after_help = "\
Examples:
  tally payment --payments payments.csv
  tally payment --payments payments.csv --group-buy group-buy.csv \\
      --stored-value 200 --platform-b 55 --date 2026-03-05")]
    Payment {
        /// Payment-method export (defaults to the rule table's source file)
        #[arg(long)]
        payments: Option<PathBuf>,

        /// Group-buy redemption export, for the redeemed-amount line
        #[arg(long)]
        group_buy: Option<PathBuf>,

        /// Rule table TOML (defaults to the shipped table)
        #[arg(long, env = "TALLY_RULES")]
        rules: Option<PathBuf>,

        /// Day to scope the group-buy amounts to (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,

        /// Stored-value top-ups keyed in by hand
        #[arg(long, default_value_t = 0.0)]
        stored_value: f64,

        /// Pass-card top-ups keyed in by hand
        #[arg(long, default_value_t = 0.0)]
        pass_card: f64,

        /// Second delivery platform's income, keyed in by hand
        #[arg(long, default_value_t = 0.0)]
        platform_b: f64,

        /// Short-video channel income, keyed in by hand
        #[arg(long, default_value_t = 0.0)]
        short_video: f64,

        /// Output JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Count distinct review-platform customers for the day
    #[command(after_help = "\
Examples:
  tally review --redemptions group-buy.csv --date 2026-03-05")]
    Review {
        /// Redemption export carrying platform and customer-tail columns
        #[arg(long)]
        redemptions: Option<PathBuf>,

        /// Rule table TOML (defaults to the shipped table)
        #[arg(long, env = "TALLY_RULES")]
        rules: Option<PathBuf>,

        /// Day to count (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,

        /// Output JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Aggregate {
            ranking,
            group_buy,
            rules,
            date,
            site,
            json,
        } => aggregate::cmd_aggregate(ranking, group_buy, rules, date, site, json),
        Commands::Compare {
            reference,
            computed,
            rules,
            name_column,
            value_column,
            json,
        } => compare::cmd_compare(reference, computed, rules, &name_column, &value_column, json),
        Commands::Payment {
            payments,
            group_buy,
            rules,
            date,
            stored_value,
            pass_card,
            platform_b,
            short_video,
            json,
        } => payment::cmd_payment(
            payments,
            group_buy,
            rules,
            date,
            payment::Manual {
                stored_value,
                pass_card,
                platform_b,
                short_video,
            },
            json,
        ),
        Commands::Review {
            redemptions,
            rules,
            date,
            json,
        } => review::cmd_review(redemptions, rules, date, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_USAGE,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_ERROR,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn rules(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_RULES_INVALID,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_SOURCE_PARSE,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Load the rule table from a file, or fall back to the shipped one.
pub fn load_rules(path: Option<&PathBuf>) -> Result<RuleBook, CliError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::usage(format!("cannot read {}: {e}", path.display())))?;
            RuleBook::from_toml(&text).map_err(|e| CliError::rules(e.to_string()))
        }
        None => Ok(RuleBook::standard()),
    }
}

/// Resolve the --date flag: explicit day or today.
pub fn resolve_date(flag: Option<&str>) -> Result<NaiveDate, CliError> {
    match flag {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| CliError::usage(format!("invalid --date {raw:?}, expected YYYY-MM-DD"))),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

pub fn read_source(path: &PathBuf) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::source(format!("cannot read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn date_flag_parses_or_rejects() {
        let date = resolve_date(Some("2026-03-05")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());

        let err = resolve_date(Some("03/05/2026")).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }

    #[test]
    fn missing_rules_file_is_usage_error() {
        let err = load_rules(Some(&PathBuf::from("/nonexistent/shop.toml"))).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }

    #[test]
    fn invalid_rules_file_gets_its_own_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"bad\"\n[reconcile]\nepsilon = -1.0").unwrap();
        let err = load_rules(Some(&file.path().to_path_buf())).unwrap_err();
        assert_eq!(err.code, EXIT_RULES_INVALID);
    }

    #[test]
    fn no_rules_flag_uses_shipped_table() {
        let rules = load_rules(None).unwrap();
        assert_eq!(rules.name, "standard");
        assert!(!rules.channels.is_empty());
    }
}
