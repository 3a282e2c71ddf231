//! `tallybook-engine` — Multi-source sales aggregation and reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded records, returns plain aggregate and
//! discrepancy data. No file discovery, no prompts, no network.

pub mod canonical;
pub mod channel;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod payment;
pub mod quantity;
pub mod review;

pub use config::RuleBook;
pub use engine::run;
pub use error::EngineError;
pub use model::{AggregationResult, Discrepancy, DiscrepancyKind, Ledger, RawRecord};
