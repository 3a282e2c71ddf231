use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Top-level rule table
// ---------------------------------------------------------------------------

/// The immutable rule table for a run: canonicalization rules, quantity
/// rules, channel markers, reconciliation rules, payment lanes, and source
/// column mappings. Loaded once from TOML, passed by reference everywhere.
#[derive(Debug, Deserialize)]
pub struct RuleBook {
    pub name: String,
    #[serde(default)]
    pub canonical: CanonicalConfig,
    #[serde(default)]
    pub quantity: QuantityConfig,
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl RuleBook {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let book: RuleBook =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        book.validate()?;
        Ok(book)
    }

    /// The shipped shop taxonomy. Kept as data so tests and deployments can
    /// substitute their own table.
    pub fn standard() -> Self {
        static STANDARD: OnceLock<RuleBook> = OnceLock::new();
        STANDARD
            .get_or_init(|| {
                RuleBook::from_toml(include_str!("../rules/standard.toml"))
                    .expect("shipped rule table is valid")
            })
            .clone_table()
    }

    // RuleBook holds OnceLock caches, so a structural clone rebuilds them
    // lazily instead of deriving Clone.
    fn clone_table(&self) -> Self {
        Self {
            name: self.name.clone(),
            canonical: CanonicalConfig {
                strip_units: self.canonical.strip_units.clone(),
                rules: self.canonical.rules.clone(),
                strip_pattern: OnceLock::new(),
            },
            quantity: QuantityConfig {
                unit_tokens: self.quantity.unit_tokens.clone(),
                rules: self.quantity.rules.clone(),
                unit_pattern: OnceLock::new(),
            },
            channels: self.channels.clone(),
            reconcile: self.reconcile.clone(),
            payment: self.payment.clone(),
            review: self.review.clone(),
            sources: self.sources.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for rule in &self.canonical.rules {
            if rule.name.trim().is_empty() {
                return Err(EngineError::ConfigValidation(
                    "canonical rule with empty target name".into(),
                ));
            }
            if rule.all_of.is_empty() && rule.any_of.is_empty() {
                return Err(EngineError::ConfigValidation(format!(
                    "canonical rule '{}' has no predicate",
                    rule.name
                )));
            }
        }

        CanonicalConfig::build_strip_pattern(&self.canonical.strip_units)
            .map_err(|e| EngineError::ConfigValidation(format!("strip pattern: {e}")))?;
        QuantityConfig::build_unit_pattern(&self.quantity.unit_tokens)
            .map_err(|e| EngineError::ConfigValidation(format!("unit pattern: {e}")))?;

        for rule in &self.quantity.rules {
            if rule.family.is_empty() && rule.raw_contains.is_empty() {
                return Err(EngineError::ConfigValidation(
                    "quantity rule with no predicate".into(),
                ));
            }
            if matches!(rule.effect, QuantityEffect::Fixed | QuantityEffect::FixedDivert)
                && (!rule.factor.is_finite() || rule.factor <= 0.0)
            {
                return Err(EngineError::ConfigValidation(format!(
                    "quantity rule factor must be positive, got {}",
                    rule.factor
                )));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for spec in &self.channels {
            if spec.name.trim().is_empty() || spec.marker.trim().is_empty() {
                return Err(EngineError::ConfigValidation(
                    "channel with empty name or marker".into(),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(EngineError::ConfigValidation(format!(
                    "duplicate channel '{}'",
                    spec.name
                )));
            }
        }

        if !self.reconcile.epsilon.is_finite() || self.reconcile.epsilon <= 0.0 {
            return Err(EngineError::ConfigValidation(format!(
                "epsilon must be positive, got {}",
                self.reconcile.epsilon
            )));
        }
        for rule in &self.reconcile.rules {
            match rule {
                ReconRule::Summary {
                    label,
                    select_contains,
                    reference,
                    ..
                } => {
                    if select_contains.is_empty() {
                        return Err(EngineError::ConfigValidation(format!(
                            "summary rule '{label}' selects nothing"
                        )));
                    }
                    if reference.trim().is_empty() {
                        return Err(EngineError::ConfigValidation(format!(
                            "summary rule '{label}' has no reference key"
                        )));
                    }
                }
                ReconRule::Conversion {
                    label,
                    ratio,
                    reference,
                    ..
                } => {
                    if !ratio.is_finite() {
                        return Err(EngineError::ConfigValidation(format!(
                            "conversion rule '{label}' has non-finite ratio"
                        )));
                    }
                    if reference.trim().is_empty() {
                        return Err(EngineError::ConfigValidation(format!(
                            "conversion rule '{label}' has no reference key"
                        )));
                    }
                }
            }
        }

        for lane in &self.payment.retail_lanes {
            if !self.payment.lanes.iter().any(|l| &l.bucket == lane) {
                return Err(EngineError::ConfigValidation(format!(
                    "retail lane '{lane}' is not a declared payment lane"
                )));
            }
        }

        if self.review.divisor == 0 {
            return Err(EngineError::ConfigValidation(
                "review divisor must be positive".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Canonicalization
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CanonicalConfig {
    /// Count-unit words stripped from labels before rule matching
    /// ("10-piece", "3 servings", ...).
    #[serde(default = "default_strip_units")]
    pub strip_units: Vec<String>,
    #[serde(default)]
    pub rules: Vec<CanonicalRule>,
    #[serde(skip)]
    strip_pattern: OnceLock<Regex>,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            strip_units: default_strip_units(),
            rules: Vec::new(),
            strip_pattern: OnceLock::new(),
        }
    }
}

fn default_strip_units() -> Vec<String> {
    ["piece", "pieces", "serving", "servings", "pack", "packs"]
        .map(String::from)
        .to_vec()
}

impl CanonicalConfig {
    fn build_strip_pattern(units: &[String]) -> Result<Regex, regex::Error> {
        // Bracketed decoration in either width, plus leading/trailing
        // count-unit tokens like "10-piece".
        let mut parts = vec![
            r"\[[^\]]*\]".to_string(),
            r"【[^】]*】".to_string(),
            r"\([^)]*\)".to_string(),
            r"（[^）]*）".to_string(),
        ];
        if !units.is_empty() {
            let alternates: Vec<String> = units.iter().map(|u| regex::escape(u)).collect();
            parts.push(format!(r"\d+\s*-?\s*(?:{})\b", alternates.join("|")));
        }
        Regex::new(&parts.join("|"))
    }

    /// Compiled decoration-stripping pattern. Validated at load time.
    pub(crate) fn strip_pattern(&self) -> &Regex {
        self.strip_pattern.get_or_init(|| {
            Self::build_strip_pattern(&self.strip_units).expect("validated at load")
        })
    }
}

/// One ordered canonicalization rule: substring-containment predicate over
/// the cleaned label, first satisfied rule wins.
#[derive(Debug, Clone, Deserialize)]
pub struct CanonicalRule {
    #[serde(default)]
    pub all_of: Vec<String>,
    #[serde(default)]
    pub any_of: Vec<String>,
    #[serde(default)]
    pub none_of: Vec<String>,
    pub name: String,
}

impl CanonicalRule {
    pub fn matches(&self, cleaned: &str) -> bool {
        self.all_of.iter().all(|s| cleaned.contains(s.as_str()))
            && (self.any_of.is_empty()
                || self.any_of.iter().any(|s| cleaned.contains(s.as_str())))
            && self.none_of.iter().all(|s| !cleaned.contains(s.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Quantity adjustment
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct QuantityConfig {
    /// Unit words recognized after an integer in a raw label ("3-pack").
    #[serde(default = "default_unit_tokens")]
    pub unit_tokens: Vec<String>,
    #[serde(default)]
    pub rules: Vec<QuantityRule>,
    #[serde(skip)]
    unit_pattern: OnceLock<Regex>,
}

impl Default for QuantityConfig {
    fn default() -> Self {
        Self {
            unit_tokens: default_unit_tokens(),
            rules: Vec::new(),
            unit_pattern: OnceLock::new(),
        }
    }
}

fn default_unit_tokens() -> Vec<String> {
    [
        "pack", "packs", "serving", "servings", "time", "times", "piece", "pieces", "pc",
    ]
    .map(String::from)
    .to_vec()
}

impl QuantityConfig {
    fn build_unit_pattern(tokens: &[String]) -> Result<Regex, regex::Error> {
        let alternates: Vec<String> = tokens.iter().map(|t| regex::escape(t)).collect();
        Regex::new(&format!(r"(\d+)\s*-?\s*(?:{})\b", alternates.join("|")))
    }

    /// Extract the integer from the first "N-pack" style token in a raw
    /// label, if any.
    pub(crate) fn unit_multiplier(&self, raw: &str) -> Option<u32> {
        let pattern = self.unit_pattern.get_or_init(|| {
            Self::build_unit_pattern(&self.unit_tokens).expect("validated at load")
        });
        pattern
            .captures(raw)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityEffect {
    /// Multiply by the integer captured next to a unit token in the raw label.
    UnitMultiplier,
    /// Multiply by the rule's fixed factor.
    Fixed,
    /// Multiply by the fixed factor and divert the row past channel
    /// classification.
    FixedDivert,
}

/// Ordered quantity rule. Matches when every `family` substring appears in
/// the canonical name and every `raw_contains` substring appears in the raw
/// label.
#[derive(Debug, Clone, Deserialize)]
pub struct QuantityRule {
    #[serde(default)]
    pub family: Vec<String>,
    #[serde(default)]
    pub raw_contains: Vec<String>,
    pub effect: QuantityEffect,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_factor() -> f64 {
    1.0
}

impl QuantityRule {
    pub fn matches(&self, raw: &str, canonical: &str) -> bool {
        self.family.iter().all(|s| canonical.contains(s.as_str()))
            && self.raw_contains.iter().all(|s| raw.contains(s.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// A named channel bucket and the marker phrase that routes rows into it.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub marker: String,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Spelling variants folded onto ledger keys before comparison.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Computed keys containing any of these are skipped by the reverse
    /// pass (families known to be rolled up elsewhere).
    #[serde(default)]
    pub ignore_contains: Vec<String>,
    #[serde(default)]
    pub rules: Vec<ReconRule>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            aliases: BTreeMap::new(),
            ignore_contains: Vec::new(),
            rules: Vec::new(),
        }
    }
}

fn default_epsilon() -> f64 {
    0.01
}

/// A pre-comparison rule, evaluated in declaration order. Entries it
/// consumes are excluded from the generic passes.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconRule {
    /// Sum the computed entries selected by substring predicate, compare
    /// against one reference key.
    Summary {
        label: String,
        select_contains: Vec<String>,
        #[serde(default)]
        select_excludes: Vec<String>,
        reference: String,
    },
    /// Combine two computed entries as `base + scaled * ratio`, compare
    /// against one reference key.
    Conversion {
        label: String,
        base: String,
        scaled: String,
        ratio: f64,
        reference: String,
    },
}

// ---------------------------------------------------------------------------
// Payment lanes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub lanes: Vec<PaymentLane>,
    /// Buckets summed into the derived retail total.
    #[serde(default)]
    pub retail_lanes: Vec<String>,
    /// Lane counted as platform income in day totals.
    #[serde(default)]
    pub platform_lane: Option<String>,
    /// Stored-balance lane: a sale but not a receipt.
    #[serde(default)]
    pub balance_lane: Option<String>,
    /// Coupon-credit lane: a sale but not a receipt.
    #[serde(default)]
    pub coupon_lane: Option<String>,
}

/// Exact-label routing from a payment-method string to a lane bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLane {
    pub bucket: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Review dedup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    /// Exact platform label counted for reviews.
    #[serde(default = "default_review_platform")]
    pub platform: String,
    /// Redemptions per eligible review.
    #[serde(default = "default_review_divisor")]
    pub divisor: u32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            platform: default_review_platform(),
            divisor: default_review_divisor(),
        }
    }
}

fn default_review_platform() -> String {
    "review-site".into()
}

fn default_review_divisor() -> u32 {
    3
}

// ---------------------------------------------------------------------------
// Source column mappings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub ranking: Option<RankingSource>,
    #[serde(default)]
    pub group_buy: Option<GroupBuySource>,
    #[serde(default)]
    pub payment: Option<PaymentSource>,
    #[serde(default)]
    pub review: Option<ReviewSource>,
}

/// Item-ranking export: one row per product per channel, quantity column.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingSource {
    pub file: String,
    pub name: String,
    pub quantity: String,
    pub channel: String,
}

/// Group-buy redemption export: one row per redemption, date-scoped,
/// multi-store.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupBuySource {
    pub file: String,
    pub name: String,
    pub redeemed_at: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub site_contains: Option<String>,
    /// Tag stamped on every loaded row.
    #[serde(default = "default_group_buy_tag")]
    pub channel_tag: String,
    /// Redemption amount column, used by the payment day sheet.
    #[serde(default)]
    pub amount: Option<String>,
}

fn default_group_buy_tag() -> String {
    "group-buy".into()
}

/// Payment-method export: method label + collected amount.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSource {
    pub file: String,
    pub method: String,
    pub amount: String,
}

/// Review columns of the group-buy export.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSource {
    pub file: String,
    pub redeemed_at: String,
    pub platform: String,
    pub customer_tail: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
