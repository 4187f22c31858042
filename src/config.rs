//! Run configuration for pwmfit
//!
//! Settings are layered: defaults, then an optional TOML or JSON file, then
//! `PWMFIT_*` environment variables, then command-line flags (applied by the
//! binary). The result is validated before a run starts.

use crate::error::{PwmError, Result};
use crate::logging::{LogLevel, LoggingConfig};
use crate::pwm::Order;
use crate::score::{ScoreParams, DEFAULT_PSEUDOCOUNT_EXPONENT};
use crate::weights::WeightMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use validator::Validate;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub logging: LoggingConfig,
    pub scoring: ScoringSettings,
    pub weighting: WeightingSettings,
}

/// PWM construction and scoring settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct ScoringSettings {
    /// Highest correlation order; every order up to it is scored
    #[validate(range(min = 1, max = 4))]
    pub order: usize,

    /// Pseudocount is `10^-pseudocount_exponent`
    #[validate(range(min = 0.0, max = 300.0))]
    pub pseudocount_exponent: f64,

    /// Score mutants incrementally against the reference
    pub wild_type_relative: bool,

    /// Normalize by global symbol frequency
    pub bias: bool,

    /// Orders at which `bias` applies
    pub bias_orders: Vec<usize>,

    /// Build PWMs and score on the rayon pool
    pub threads: bool,

    /// Size of a dedicated pool (0 = rayon default)
    #[validate(range(max = 1024))]
    pub num_threads: usize,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            order: 2,
            pseudocount_exponent: DEFAULT_PSEUDOCOUNT_EXPONENT,
            wild_type_relative: false,
            bias: false,
            bias_orders: vec![1, 2],
            threads: false,
            num_threads: 0,
        }
    }
}

impl ScoringSettings {
    pub fn order(&self) -> Result<Order> {
        Order::new(self.order)
    }

    pub fn pseudocount(&self) -> f64 {
        10f64.powf(-self.pseudocount_exponent)
    }

    /// Scoring parameters for one order, with bias only where configured
    pub fn params_for(&self, order: Order) -> ScoreParams {
        ScoreParams::new(self.pseudocount()).with_bias(self.bias && self.bias_orders.contains(&order.get()))
    }
}

/// Sequence reweighting settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct WeightingSettings {
    pub mode: WeightMode,

    /// Identity threshold in percent for similarity weighting
    #[validate(range(min = 1, max = 100))]
    pub similarity: u32,
}

impl Default for WeightingSettings {
    fn default() -> Self {
        Self {
            mode: WeightMode::None,
            similarity: 80,
        }
    }
}

impl RunConfig {
    /// Load configuration from a `.toml` or `.json` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: RunConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| PwmError::config(format!("TOML parse error: {}", e)))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| PwmError::config(format!("JSON parse error: {}", e)))?,
            _ => {
                return Err(PwmError::config(
                    "Unsupported config file format. Use .toml or .json",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration, format chosen by extension
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| PwmError::config(format!("TOML serialize error: {}", e)))?,
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| PwmError::config(format!("JSON serialize error: {}", e)))?,
            _ => {
                return Err(PwmError::config(
                    "Unsupported config file format. Use .toml or .json",
                ))
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override values from `PWMFIT_*` environment variables
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Override values from any `PWMFIT_*` key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(order) = lookup("PWMFIT_ORDER") {
            self.scoring.order = parse_var("PWMFIT_ORDER", &order)?;
        }
        if let Some(exponent) = lookup("PWMFIT_PSEUDOCOUNT") {
            self.scoring.pseudocount_exponent = parse_var("PWMFIT_PSEUDOCOUNT", &exponent)?;
        }
        if let Some(threads) = lookup("PWMFIT_THREADS") {
            self.scoring.num_threads = parse_var("PWMFIT_THREADS", &threads)?;
            self.scoring.threads = true;
        }
        if let Some(level) = lookup("PWMFIT_LOG_LEVEL") {
            self.logging.level = level.parse::<LogLevel>()?;
        }
        if let Some(json_logs) = lookup("PWMFIT_JSON_LOGS") {
            self.logging.json_format = parse_var("PWMFIT_JSON_LOGS", &json_logs)?;
        }

        self.validate()
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.scoring
            .validate()
            .map_err(|e| PwmError::config(format!("Configuration validation failed: {}", e)))?;
        self.weighting
            .validate()
            .map_err(|e| PwmError::config(format!("Configuration validation failed: {}", e)))?;

        if let Some(&bad) = self.scoring.bias_orders.iter().find(|&&k| Order::new(k).is_err()) {
            return Err(PwmError::config(format!(
                "bias_orders contains {}, orders must be between 1 and 4",
                bad
            )));
        }
        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PwmError::config(format!("Invalid {}: {}", key, e)))
}
