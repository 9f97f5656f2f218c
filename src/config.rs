//! Engine and rule configuration
//!
//! Construction-time engine parameters plus declarative rule definitions.
//! Rule specs are plain serde structs so adapters can load them from YAML;
//! compiling a spec performs the full validation of the configuration
//! error taxonomy (unknown metric/action, non-positive threshold, window
//! narrower than its bucket count).

use crate::actions::ActionKind;
use crate::dimension::DimensionMask;
use crate::error::ConfigError;
use crate::events::EventKind;
use crate::metric::Metric;
use crate::order_index::DEFAULT_ORDER_INDEX_CAPACITY;
use crate::rules::{RateLimitParams, RateLimitRule, Rule, ThresholdParams, ThresholdRule};
use crate::sharded::DEFAULT_SHARDS;
use crate::window::DEFAULT_BUCKETS;
use serde::{Deserialize, Serialize};

// ============================================================
// ENGINE CONFIG
// ============================================================

/// Construction-time engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Statistics shard count; must be a power of two.
    pub num_shards: usize,
    /// Default ring bucket count for rate-limit rules.
    pub default_buckets: usize,
    /// Order index capacity (FIFO eviction beyond this).
    pub order_index_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_shards: DEFAULT_SHARDS,
            default_buckets: DEFAULT_BUCKETS,
            order_index_capacity: DEFAULT_ORDER_INDEX_CAPACITY,
        }
    }
}

// ============================================================
// LOGGING CONFIG
// ============================================================

/// Logging setup parameters (see [`crate::logging::init_logging`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Empty disables file logging (stdout only).
    pub log_dir: String,
    pub log_file: String,
    /// "hourly", "daily", or anything else for a single file
    pub rotation: String,
    pub log_level: String,
    pub use_json: bool,
    /// Lift the clamp on per-event hot-path targets. At 10^6 events/sec
    /// this floods the writer; keep off outside debugging sessions.
    #[serde(default)]
    pub trace_hot_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            log_file: "riskgate.log".to_string(),
            rotation: "daily".to_string(),
            log_level: "info".to_string(),
            use_json: false,
            trace_hot_path: false,
        }
    }
}

// ============================================================
// RULE SPECS
// ============================================================

/// Declarative rule definition, loadable from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    /// "threshold" or "rate-limit"
    pub kind: String,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub window_ns: Option<u64>,
    /// Convenience alternative to `window_ns`.
    #[serde(default)]
    pub window_secs: Option<u64>,
    #[serde(default)]
    pub buckets: Option<usize>,
    #[serde(default)]
    pub dimensions: DimensionMask,
    /// Threshold rule: actions emitted on breach.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Rate-limit rule: actions on the suspend / resume transitions.
    #[serde(default)]
    pub suspend_actions: Vec<String>,
    #[serde(default)]
    pub resume_actions: Vec<String>,
    /// Threshold rule: event kinds it applies to (default: all).
    #[serde(default)]
    pub applies_to: Vec<EventKind>,
}

impl RuleSpec {
    fn parse_actions(names: &[String]) -> Result<Vec<ActionKind>, ConfigError> {
        names.iter().map(|s| ActionKind::parse(s)).collect()
    }

    fn window_ns(&self) -> Result<u64, ConfigError> {
        match (self.window_ns, self.window_secs) {
            (Some(ns), _) => Ok(ns),
            (None, Some(secs)) => Ok(secs * 1_000_000_000),
            (None, None) => Err(ConfigError::Parse(format!(
                "rule {}: missing window_ns/window_secs",
                self.id
            ))),
        }
    }

    /// Compile into a [`Rule`], validating every parameter.
    pub fn compile(&self, default_buckets: usize) -> Result<Rule, ConfigError> {
        match self.kind.as_str() {
            "threshold" => {
                let metric_name = self.metric.as_ref().ok_or_else(|| {
                    ConfigError::Parse(format!("rule {}: missing metric", self.id))
                })?;
                let threshold = self.threshold.ok_or_else(|| {
                    ConfigError::Parse(format!("rule {}: missing threshold", self.id))
                })?;
                let applies_to = if self.applies_to.is_empty() {
                    vec![EventKind::Order, EventKind::Trade, EventKind::Cancel]
                } else {
                    self.applies_to.clone()
                };
                let rule = ThresholdRule::new(ThresholdParams {
                    rule_id: self.id.clone(),
                    metric: Metric::parse(metric_name)?,
                    threshold,
                    actions: Self::parse_actions(&self.actions)?,
                    dimensions: self.dimensions,
                    applies_to,
                })?;
                Ok(Rule::Threshold(rule))
            }
            "rate-limit" => {
                let threshold = self.threshold.ok_or_else(|| {
                    ConfigError::Parse(format!("rule {}: missing threshold", self.id))
                })?;
                if threshold.fract() != 0.0 || threshold < 0.0 {
                    return Err(ConfigError::Parse(format!(
                        "rule {}: rate-limit threshold must be a non-negative integer",
                        self.id
                    )));
                }
                let rule = RateLimitRule::new(RateLimitParams {
                    rule_id: self.id.clone(),
                    threshold: threshold as u64,
                    window_ns: self.window_ns()?,
                    buckets: self.buckets.unwrap_or(default_buckets),
                    dimensions: self.dimensions,
                    suspend_actions: Self::parse_actions(&self.suspend_actions)?,
                    resume_actions: Self::parse_actions(&self.resume_actions)?,
                })?;
                Ok(Rule::RateLimit(rule))
            }
            other => Err(ConfigError::UnknownRuleKind(other.to_string())),
        }
    }
}

/// Top-level rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    pub rules: Vec<RuleSpec>,
}

impl RulesFile {
    pub fn from_yaml_str(s: &str) -> Result<RulesFile, ConfigError> {
        serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn compile_all(&self, default_buckets: usize) -> Result<Vec<Rule>, ConfigError> {
        self.rules
            .iter()
            .map(|spec| spec.compile(default_buckets))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
rules:
  - id: vol-limit
    kind: threshold
    metric: trade-volume
    threshold: 1000
    dimensions: { account: true, product: true }
    actions: [suspend-account-trading]
    applies_to: [trade]
  - id: order-rate
    kind: rate-limit
    threshold: 50
    window_secs: 1
    dimensions: { account: true }
    suspend_actions: [suspend-ordering]
    resume_actions: [resume-ordering]
"#;

    #[test]
    fn test_yaml_load_and_compile() {
        let file = RulesFile::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(file.rules.len(), 2);

        let rules = file.compile_all(DEFAULT_BUCKETS).unwrap();
        assert_eq!(rules[0].id(), "vol-limit");
        assert_eq!(rules[1].id(), "order-rate");
        assert!(matches!(rules[0], Rule::Threshold(_)));
        assert!(matches!(rules[1], Rule::RateLimit(_)));
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let mut file = RulesFile::from_yaml_str(SAMPLE).unwrap();
        file.rules[0].metric = Some("open-interest".to_string());
        assert!(matches!(
            file.compile_all(DEFAULT_BUCKETS),
            Err(ConfigError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let mut file = RulesFile::from_yaml_str(SAMPLE).unwrap();
        file.rules[0].actions = vec!["halt-everything".to_string()];
        assert!(matches!(
            file.compile_all(DEFAULT_BUCKETS),
            Err(ConfigError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_missing_window_rejected() {
        let mut file = RulesFile::from_yaml_str(SAMPLE).unwrap();
        file.rules[1].window_secs = None;
        assert!(matches!(
            file.compile_all(DEFAULT_BUCKETS),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_fractional_rate_threshold_rejected() {
        let mut file = RulesFile::from_yaml_str(SAMPLE).unwrap();
        file.rules[1].threshold = Some(50.5);
        assert!(matches!(
            file.compile_all(DEFAULT_BUCKETS),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_rule_kind_rejected() {
        let mut file = RulesFile::from_yaml_str(SAMPLE).unwrap();
        file.rules[0].kind = "ml-anomaly".to_string();
        assert!(matches!(
            file.compile_all(DEFAULT_BUCKETS),
            Err(ConfigError::UnknownRuleKind(_))
        ));
    }
}
