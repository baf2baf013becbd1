//! Validation engine configuration
//!
//! A [`ValidationConfig`] is built explicitly and handed to the orchestrator;
//! nothing in the engine reads configuration from global state. Values start
//! from the preset of the declared [`Environment`] and are overridden by
//! whatever a TOML file specifies.

mod presets;

use crate::error::ConfigError;
use crate::types::ValidationDomain;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Deployment environment selecting the base threshold table
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationConfig {
    pub environment: Environment,
    pub orchestrator: OrchestratorConfig,
    pub event_tracking: EventTrackingConfig,
    pub ab_testing: AbTestingConfig,
    pub conversion_funnel: FunnelConfig,
    pub performance: PerformanceConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    /// Upper bound on a single validator invocation
    pub validator_timeout_secs: u64,
    /// Alerts kept in memory; the oldest are dropped first
    pub max_alerts: usize,
    /// Alert deliveries allowed per minute across all channels
    pub alert_rate_limit_per_minute: usize,
    /// A last run older than this marks the system as degraded
    pub stale_run_minutes: i64,
    /// More recent unresolved alerts than this marks the system as degraded
    pub recent_failure_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventTrackingConfig {
    pub enabled: bool,
    pub required_events: Vec<String>,
    pub sample_size: usize,
    /// Percentage of problematic events tolerated before failing
    pub error_threshold: f64,
    pub duplicate_detection: bool,
    /// How far in the future a timestamp may lie, in milliseconds
    pub timestamp_tolerance_ms: i64,
    /// Explicit per-type volume baselines; types without one use an even share
    #[serde(default)]
    pub expected_volumes: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EffectSizeBounds {
    pub minimum: f64,
    pub maximum: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SampleRatioMismatchConfig {
    pub enabled: bool,
    /// Maximum tolerated deviation from the intended split, in percent
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbTestingConfig {
    pub enabled: bool,
    pub minimum_sample_size: u64,
    pub max_p_value: f64,
    pub effect_size: EffectSizeBounds,
    pub sample_ratio_mismatch: SampleRatioMismatchConfig,
    /// Power below this produces an advisory recommendation
    pub min_power: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunnelConfig {
    pub enabled: bool,
    pub minimum_users_per_step: u64,
    /// Drop-off ceiling in percent
    pub max_drop_off_rate: f64,
    pub required_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceConfig {
    pub enabled: bool,
    /// Milliseconds
    pub page_load_time: f64,
    /// Milliseconds
    pub api_response_time: f64,
    /// Percent
    pub error_rate: f64,
    /// Percent
    pub memory_usage: f64,
    /// Percent
    pub cpu_usage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardConfig {
    pub enabled: bool,
    /// Minutes
    pub stale_data_threshold: u64,
    pub data_consistency_checks: bool,
    pub cache_validation: bool,
    pub refresh_interval_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl ValidationConfig {
    /// Base configuration for an environment
    pub fn for_environment(environment: Environment) -> Self {
        presets::preset(environment)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` when the file cannot be read, a parse
    /// error for malformed TOML, and `ConfigError::ValidationError` when a value
    /// is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading validation config from: {}", path.display());
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    ///
    /// Keys missing from the text keep the value of the declared environment's
    /// preset (production when no environment is declared).
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let overrides: toml::Value = toml::from_str(contents)?;

        let environment = match overrides.get("environment") {
            Some(value) => value.clone().try_into::<Environment>().map_err(|e| {
                ConfigError::ParseError(format!("invalid environment: {}", e))
            })?,
            None => Environment::default(),
        };
        debug!("Using {:?} preset as configuration base", environment);

        let mut merged = toml::Value::try_from(Self::for_environment(environment))
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        merge_toml(&mut merged, overrides);

        let config: ValidationConfig = merged.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no validator could work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::ValidationError(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )))
            }
        }

        let orchestrator = &self.orchestrator;
        if orchestrator.validator_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.validator_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if orchestrator.max_alerts == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_alerts must be greater than zero".to_string(),
            ));
        }

        positive("event_tracking.error_threshold", self.event_tracking.error_threshold)?;
        if self.event_tracking.timestamp_tolerance_ms < 0 {
            return Err(ConfigError::ValidationError(
                "event_tracking.timestamp_tolerance_ms must not be negative".to_string(),
            ));
        }

        let ab = &self.ab_testing;
        if !(ab.max_p_value > 0.0 && ab.max_p_value < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "ab_testing.max_p_value must lie in (0, 1), got {}",
                ab.max_p_value
            )));
        }
        if ab.effect_size.minimum < 0.0 || ab.effect_size.minimum > ab.effect_size.maximum {
            return Err(ConfigError::ValidationError(format!(
                "ab_testing.effect_size bounds are inconsistent: minimum {} maximum {}",
                ab.effect_size.minimum, ab.effect_size.maximum
            )));
        }
        positive(
            "ab_testing.sample_ratio_mismatch.threshold",
            ab.sample_ratio_mismatch.threshold,
        )?;

        let funnel = &self.conversion_funnel;
        if !(funnel.max_drop_off_rate > 0.0 && funnel.max_drop_off_rate <= 100.0) {
            return Err(ConfigError::ValidationError(format!(
                "conversion_funnel.max_drop_off_rate must lie in (0, 100], got {}",
                funnel.max_drop_off_rate
            )));
        }

        let performance = &self.performance;
        positive("performance.page_load_time", performance.page_load_time)?;
        positive("performance.api_response_time", performance.api_response_time)?;
        positive("performance.error_rate", performance.error_rate)?;
        positive("performance.memory_usage", performance.memory_usage)?;
        positive("performance.cpu_usage", performance.cpu_usage)?;

        if self.dashboard.stale_data_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "dashboard.stale_data_threshold must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the given domain takes part in full runs
    pub fn is_enabled(&self, domain: ValidationDomain) -> bool {
        match domain {
            ValidationDomain::EventTracking => self.event_tracking.enabled,
            ValidationDomain::AbTesting => self.ab_testing.enabled,
            ValidationDomain::ConversionFunnel => self.conversion_funnel.enabled,
            ValidationDomain::Performance => self.performance.enabled,
            ValidationDomain::Dashboard => self.dashboard.enabled,
        }
    }

    /// Enabled domains in enumeration order
    pub fn enabled_domains(&self) -> Vec<ValidationDomain> {
        ValidationDomain::ALL
            .into_iter()
            .filter(|domain| self.is_enabled(*domain))
            .collect()
    }

    pub fn validator_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator.validator_timeout_secs)
    }
}

/// Recursively overlay `overlay` onto `base`; tables merge, everything else replaces
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
