//! Core result types shared by validators, the orchestrator and the alert manager
//!
//! Serialized field names follow the camelCase shape the presentation layer
//! already consumes (`generatedAt`, `validationResultId`, ...).

use crate::error::EngineError;
use crate::statistics::ValidationStatistics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type for consistent time handling across the engine
pub type Timestamp = DateTime<Utc>;

/// One of the five validation areas
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum ValidationDomain {
    EventTracking,
    AbTesting,
    ConversionFunnel,
    Performance,
    Dashboard,
}

impl ValidationDomain {
    /// All domains in enumeration order; batches preserve this order
    pub const ALL: [ValidationDomain; 5] = [
        ValidationDomain::EventTracking,
        ValidationDomain::AbTesting,
        ValidationDomain::ConversionFunnel,
        ValidationDomain::Performance,
        ValidationDomain::Dashboard,
    ];

    /// Stable camelCase key, identical to the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationDomain::EventTracking => "eventTracking",
            ValidationDomain::AbTesting => "abTesting",
            ValidationDomain::ConversionFunnel => "conversionFunnel",
            ValidationDomain::Performance => "performance",
            ValidationDomain::Dashboard => "dashboard",
        }
    }

    /// Human readable label used in alert titles and messages
    pub fn label(&self) -> &'static str {
        match self {
            ValidationDomain::EventTracking => "Event tracking",
            ValidationDomain::AbTesting => "A/B testing",
            ValidationDomain::ConversionFunnel => "Conversion funnel",
            ValidationDomain::Performance => "Performance",
            ValidationDomain::Dashboard => "Dashboard",
        }
    }
}

impl fmt::Display for ValidationDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationDomain {
    type Err = EngineError;

    /// Accepts the camelCase key as well as snake_case and kebab-case spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "eventtracking" | "events" => Ok(ValidationDomain::EventTracking),
            "abtesting" | "experiments" => Ok(ValidationDomain::AbTesting),
            "conversionfunnel" | "funnel" | "funnels" => Ok(ValidationDomain::ConversionFunnel),
            "performance" => Ok(ValidationDomain::Performance),
            "dashboard" | "dashboards" => Ok(ValidationDomain::Dashboard),
            _ => Err(EngineError::UnknownValidationType(s.to_string())),
        }
    }
}

/// Outcome of a single validator invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Warning,
    Failed,
}

/// Qualitative rank attached to results and individual findings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One validator's outcome; immutable once built
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub id: String,
    pub domain: ValidationDomain,
    pub status: ValidationStatus,
    pub severity: Severity,
    pub timestamp: Timestamp,
    /// Wall-clock time spent in the validator, in milliseconds
    pub duration: u64,
    pub message: String,
    /// Domain-specific structured payload
    pub details: serde_json::Value,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    pub fn new(
        domain: ValidationDomain,
        status: ValidationStatus,
        severity: Severity,
        duration: u64,
        message: impl Into<String>,
        details: serde_json::Value,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            domain,
            status,
            severity,
            timestamp: Utc::now(),
            duration,
            message: message.into(),
            details,
            recommendations,
        }
    }

    /// Build the synthetic failed/critical result used whenever a validator
    /// could not produce a real outcome (bad input, timeout, crash, missing snapshot)
    pub fn errored(domain: ValidationDomain, duration: u64, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            domain,
            ValidationStatus::Failed,
            Severity::Critical,
            duration,
            format!("{} validation could not complete: {}", domain.label(), error),
            serde_json::json!({ "error": error }),
            vec![format!(
                "Investigate the {} data pipeline before trusting its numbers",
                domain.label().to_lowercase()
            )],
        )
    }

    pub fn is_failed(&self) -> bool {
        self.status == ValidationStatus::Failed
    }

    /// Error message carried in `details.error`, if this is a synthetic result
    pub fn error(&self) -> Option<&str> {
        self.details.get("error").and_then(|value| value.as_str())
    }
}

/// Time span covered by a report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReportPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Current-batch deltas against the fixed 85% baseline, in percentage points
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationTrends {
    pub accuracy_trend: f64,
    pub performance_trend: f64,
    pub issues_trend: f64,
}

/// Output of one orchestration run; never mutated after it is returned
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub id: String,
    pub generated_at: Timestamp,
    pub period: ReportPeriod,
    /// Copy of the rolling statistics at generation time
    pub summary: ValidationStatistics,
    pub results: Vec<ValidationResult>,
    pub trends: ValidationTrends,
    pub recommendations: Vec<String>,
    /// Set only when the run failed before any validator could execute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.results.iter().any(ValidationResult::is_failed)
    }

    pub fn result_for(&self, domain: ValidationDomain) -> Option<&ValidationResult> {
        self.results.iter().find(|result| result.domain == domain)
    }
}
